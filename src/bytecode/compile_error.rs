#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeGenError {
    /// A call names a function that is never defined.
    #[error("compile error: call to undefined function '{name}'")]
    UnresolvedFunction { name: String },

    /// Two function definitions share a name.
    #[error("compile error: function '{name}' is already defined")]
    DuplicateFunction { name: String },

    /// A call passes the wrong number of arguments.
    #[error("compile error: function '{name}' takes {expected} argument(s), {found} given")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Internal compiler error: a placeholder jump was never patched.
    #[error("compile error: unpatched jump placeholder at instruction {at}")]
    UnpatchedJump { at: usize },

    /// Internal compiler error: a jump patch landed on a non-jump instruction.
    #[error("compile error: instruction {at} is not a jump")]
    NotAJump { at: usize },
}
