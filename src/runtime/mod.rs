pub mod runtime_error;
pub mod vm;

pub use runtime_error::{VmError, VmErrorKind};
pub use vm::{ExecOutcome, Vm, VmConfig};
