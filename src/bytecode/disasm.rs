use crate::bytecode::{CodeObject, Op};
use std::fmt::Write;

/// Print disassembly of a code object to stdout.
pub fn print_bc(code: &CodeObject) {
    println!("=== BYTECODE ===\n");
    print!("{}", disassemble_to_string(code));
}

/// Return disassembly as a String.
///
/// ```text
/// 0000   JMP         3            ↓ (→ 0003)
///       ┌─ fn double/1
/// 0001 ► STORE       x
/// ```
pub fn disassemble_to_string(code: &CodeObject) -> String {
    let jump_targets = collect_jump_targets(&code.ops);
    let mut output = String::new();

    for (ip, op) in code.ops.iter().enumerate() {
        for function in code.functions.iter().filter(|f| f.entry == ip) {
            let _ = writeln!(output, "      ┌─ fn {}/{}", function.name, function.arity);
        }

        let marker = if jump_targets.contains(&ip) { "►" } else { " " };
        let _ = writeln!(output, "{:04} {} {}", ip, marker, format_op(op, ip));
    }

    // Jumps to the end of the stream halt the machine.
    if jump_targets.contains(&code.ops.len()) {
        let _ = writeln!(output, "{:04} ► <end>", code.ops.len());
    }

    output
}

fn collect_jump_targets(ops: &[Op]) -> Vec<usize> {
    let mut targets = Vec::new();

    for op in ops {
        if let Some(target) = op.target() {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    targets
}

fn format_op(op: &Op, ip: usize) -> String {
    match op {
        Op::Push(v) => format!("{:<11} {}", op.mnemonic(), v),
        Op::Load(name) | Op::Store(name) => format!("{:<11} {}", op.mnemonic(), name),
        Op::Jmp(target) | Op::Jz(target) | Op::Call(target) => {
            let direction = if *target <= ip { "↑" } else { "↓" };
            format!("{:<11} {:<12} {} (→ {:04})", op.mnemonic(), target, direction, target)
        }
        Op::Pop => format!("{:<11} ; ( a -- )", op.mnemonic()),
        Op::Add | Op::Sub | Op::Mul | Op::Div => format!("{:<11} ; ( a b -- c )", op.mnemonic()),
        Op::Ret => op.mnemonic().to_string(),
    }
}
