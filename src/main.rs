use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use std::{env, fs};

use log::LevelFilter;
use simple_logger::SimpleLogger;

use stacklang::bytecode::RESULT_SLOT;
use stacklang::bytecode::disasm::print_bc;
use stacklang::frontend::token_dumper::TokenDumper;
use stacklang::{CodeObject, ExecOutcome, Vm, compile_source, parse, run_source, tokenize};

fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Warn).env().init() {
        eprintln!("failed to initialise logger: {}", e);
    }

    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let tokens_only = args.contains(&"--tokens".to_string());
    let no_color = args.contains(&"--no-color".to_string());
    let pretty = args.contains(&"--pretty".to_string());
    let ast = args.contains(&"--ast".to_string());
    let bytecode = args.contains(&"--bc".to_string());
    let load = args.contains(&"--load".to_string());
    let repl_mode = args.iter().any(|a| a == "--repl" || a == "-i");

    let emit_index = args.iter().position(|a| a == "--emit");
    let emit_path = emit_index.and_then(|i| args.get(i + 1));

    // first non-flag argument (other than the --emit target) is the filename
    let filename = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(i, a)| !a.starts_with('-') && Some(*i) != emit_index.map(|e| e + 1))
        .map(|(_, a)| a);

    if emit_index.is_some() && emit_path.is_none() {
        eprintln!("Error: --emit needs an output path");
        std::process::exit(1);
    }

    match filename {
        Some(filename) if load => run_bytecode_file(filename, bytecode),
        Some(filename) => {
            let source = match fs::read_to_string(filename) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("Failed to read '{}': {}", filename, e);
                    std::process::exit(1);
                }
            };

            if tokens_only {
                dump_tokens(&source, no_color, pretty);
            } else if ast {
                dump_ast(&source);
            } else if let Some(out) = emit_path {
                emit_bytecode(&source, out);
            } else {
                run_program(&source, bytecode);
            }
        }
        None if repl_mode || args.len() == 1 => repl(),
        None => print_usage(),
    }
}

fn print_usage() {
    println!("STACKLANG - integer expression language on a stack VM");
    println!();
    println!("Usage:");
    println!("  stacklang                       Start interactive REPL");
    println!("  stacklang <file>                Run a program");
    println!("  stacklang --repl, -i            Start interactive REPL");
    println!("  stacklang --tokens <file>       Show tokens only (--no-color, --pretty)");
    println!("  stacklang --ast <file>          Show the parsed AST");
    println!("  stacklang --bc <file>           Show bytecode, then run");
    println!("  stacklang --emit <out> <file>   Compile to a bytecode file");
    println!("  stacklang --load <file>         Run a compiled bytecode file");
    println!("  stacklang --help, -h            Show this help");
    println!();
    println!("Set RUST_LOG=debug or RUST_LOG=trace for pipeline and VM tracing.");
}

fn dump_tokens(source: &str, no_color: bool, pretty: bool) {
    match tokenize(source) {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();

            if no_color {
                dumper = dumper.no_color();
            }
            if pretty {
                dumper = dumper.pretty();
            }

            dumper.dump(&tokens);
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            std::process::exit(1);
        }
    }
}

fn dump_ast(source: &str) {
    let tokens = match tokenize(source) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            std::process::exit(1);
        }
    };

    match parse(tokens) {
        Ok(statements) => println!("{:#?}", statements),
        Err(e) => {
            eprintln!("Parse error: {}", e);
            std::process::exit(1);
        }
    }
}

fn compile_or_exit(source: &str) -> CodeObject {
    match compile_source(source) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn emit_bytecode(source: &str, out: &str) {
    let code = compile_or_exit(source);

    let bytes = match code.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to encode bytecode: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = fs::write(out, &bytes) {
        eprintln!("Failed to write '{}': {}", out, e);
        std::process::exit(1);
    }

    log::info!("wrote {} instructions ({} bytes) to {}", code.len(), bytes.len(), out);
}

fn run_program(source: &str, bytecode: bool) {
    let code = compile_or_exit(source);
    execute_or_exit(&code, bytecode);
}

fn run_bytecode_file(filename: &str, bytecode: bool) {
    let bytes = match fs::read(filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            std::process::exit(1);
        }
    };

    let code = match CodeObject::from_bytes(&bytes) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Invalid bytecode file '{}': {}", filename, e);
            std::process::exit(1);
        }
    };

    execute_or_exit(&code, bytecode);
}

fn execute_or_exit(code: &CodeObject, bytecode: bool) {
    if bytecode {
        print_bc(code);
        println!();
    }

    let mut vm = Vm::new();
    match vm.execute(code) {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("  stack: {:?}", e.stack);
            if !e.call_stack.is_empty() {
                eprintln!("  call stack: {:?}", e.call_stack);
            }
            std::process::exit(1);
        }
    }
}

fn print_outcome(outcome: &ExecOutcome) {
    println!("globals: {:?}", visible_globals(&outcome.globals));
    println!("stack:   {:?}", outcome.stack);
}

fn repl() {
    println!("stacklang REPL - globals persist between lines, `return <expr>` shows a value, Ctrl-D to exit");

    let mut vm = Vm::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Failed to read input: {}", e);
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match run_source(&mut vm, &line) {
            Ok(outcome) => {
                if !outcome.stack.is_empty() {
                    println!("{:?}", outcome.stack);
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }

    println!();
    println!("globals: {:?}", visible_globals(vm.globals()));
}

/// Sorted user globals, without the compiler's call-result slot.
fn visible_globals(globals: &HashMap<String, i64>) -> BTreeMap<&String, &i64> {
    globals
        .iter()
        .filter(|(name, _)| name.as_str() != RESULT_SLOT)
        .collect()
}
