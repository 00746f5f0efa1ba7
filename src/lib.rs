//! # stacklang
//!
//! A small compiler and stack virtual machine for an integer-only
//! imperative language:
//!
//! ```text
//! source ──tokenize──► tokens ──parse──► AST ──generate──► bytecode ──Vm::execute──► (stack, globals)
//! ```
//!
//! ```
//! use stacklang::{Vm, generate, parse, tokenize};
//!
//! let mut vm = Vm::new();
//! let code = generate(&parse(tokenize("x = 5 + 2 * 3").unwrap()).unwrap()).unwrap();
//! let outcome = vm.execute(&code).unwrap();
//! assert_eq!(outcome.globals["x"], 11);
//! ```

pub mod bytecode;
pub mod error;
pub mod frontend;
pub mod lang;
pub mod runtime;

pub use bytecode::{CodeGenError, CodeObject, Op};
pub use error::Error;
pub use frontend::{LexError, ParseError, Spanned, Token};
pub use lang::{Expr, Stmt};
pub use runtime::{ExecOutcome, Vm, VmConfig, VmError, VmErrorKind};

/// Splits source text into tokens, ending with `Token::Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexError> {
    frontend::Lexer::new(source).tokenize()
}

/// Parses a token sequence into top-level statements.
pub fn parse(tokens: Vec<Spanned>) -> Result<Vec<Stmt>, ParseError> {
    frontend::Parser::new(tokens).parse()
}

/// Lowers statements to bytecode.
pub fn generate(statements: &[Stmt]) -> Result<CodeObject, CodeGenError> {
    bytecode::Compiler::new().compile_program(statements)
}

/// Runs the front end and code generator over `source`.
pub fn compile_source(source: &str) -> Result<CodeObject, Error> {
    let tokens = tokenize(source)?;
    let statements = parse(tokens)?;
    Ok(generate(&statements)?)
}

/// Compiles `source` and runs it on `vm`, keeping the VM's globals.
pub fn run_source(vm: &mut Vm, source: &str) -> Result<ExecOutcome, Error> {
    let code = compile_source(source)?;
    Ok(vm.execute(&code)?)
}
