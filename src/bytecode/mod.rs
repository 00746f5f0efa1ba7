pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;

pub use compile::{Compiler, RESULT_SLOT};
pub use compile_error::CodeGenError;
pub use ir::{CodeObject, FunctionInfo};
pub use op::Op;
