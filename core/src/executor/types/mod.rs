//! Type definitions for the executor
//!
//! - AST nodes (Stmt, Expr)
//! - Runtime values (Value, Class, Method)
//! - Control flow (Control, Frame)

pub mod ast;
pub mod control;
pub mod values;

pub use ast::{Expr, Stmt};
pub use control::{Control, Flow, Frame};
pub use values::{ClassRef, Method, MethodBody, NativeFn, Value};
