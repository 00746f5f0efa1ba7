//! # Abstract Syntax Tree
//!
//! The AST is produced by the parser and consumed by the bytecode compiler.
//! It is a plain tree: no sharing, no cycles, and it can be dropped once
//! the compiler has lowered it.

pub mod node;

pub use node::{BinaryOp, Expr, Stmt, UnaryOp};
