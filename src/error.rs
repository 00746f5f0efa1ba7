use crate::{bytecode::CodeGenError, frontend::LexError, frontend::ParseError, runtime::VmError};

/// Any failure of the source-to-result pipeline. Each stage fails fast, so
/// exactly one stage error is reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("lexer error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    CodeGen(#[from] CodeGenError),
    #[error("{0}")]
    Vm(#[from] VmError),
}
