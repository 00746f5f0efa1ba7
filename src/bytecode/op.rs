use serde::{Deserialize, Serialize};

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

/// One stack-machine instruction.
///
/// Jump and call targets are absolute indices into the instruction
/// sequence. A target equal to the sequence length means "halt".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // literals
    Push(i64),

    // globals
    Load(String),
    Store(String),

    // stack ops
    Pop,

    // arithmetic ( a b -- a∘b )
    Add,
    Sub,
    Mul,
    Div,

    // control flow
    /// Unconditional jump.
    Jmp(usize),
    /// Pop a value, jump if it is zero.
    Jz(usize),
    /// Push the return address onto the call stack and jump.
    Call(usize),
    /// Return to the last call site, or halt when the call stack is empty.
    Ret,
}

impl Op {
    /// Upper-case mnemonic used by the disassembler and in error messages.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Push(_) => "PUSH",
            Op::Load(_) => "LOAD",
            Op::Store(_) => "STORE",
            Op::Pop => "POP",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Jmp(_) => "JMP",
            Op::Jz(_) => "JZ",
            Op::Call(_) => "CALL",
            Op::Ret => "RET",
        }
    }

    /// The absolute target of a jump or call.
    pub fn target(&self) -> Option<usize> {
        match self {
            Op::Jmp(t) | Op::Jz(t) | Op::Call(t) => Some(*t),
            _ => None,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Push(v) => write!(f, "{} {}", self.mnemonic(), v),
            Op::Load(name) | Op::Store(name) => write!(f, "{} {}", self.mnemonic(), name),
            Op::Jmp(t) | Op::Jz(t) | Op::Call(t) => write!(f, "{} {}", self.mnemonic(), t),
            _ => write!(f, "{}", self.mnemonic()),
        }
    }
}
