/// A failed `Vm::execute`, with a snapshot of the machine at the point of
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("runtime error: {kind} (at instruction {ip})")]
pub struct VmError {
    pub kind: VmErrorKind,
    /// Index of the instruction that failed.
    pub ip: usize,
    /// Operand stack before the failing instruction ran.
    pub stack: Vec<i64>,
    /// Pending return addresses, innermost last.
    pub call_stack: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmErrorKind {
    #[error("stack underflow in {op}")]
    StackUnderflow { op: &'static str },

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid jump target {target} (program has {len} instructions)")]
    InvalidJumpTarget { target: usize, len: usize },

    #[error("integer overflow in {op}")]
    IntegerOverflow { op: &'static str },

    #[error("stack size limit exceeded ({limit})")]
    StackOverflow { limit: usize },

    #[error("call depth limit exceeded ({limit}) - possible infinite recursion")]
    CallDepthExceeded { limit: usize },

    #[error("execution step limit exceeded ({limit})")]
    StepLimitExceeded { limit: usize },
}
