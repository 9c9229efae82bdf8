//! # Executor - tree-walking interpreter for Annex
//!
//! Hosts the code merged in by the extension loader.
//!
//! ## Core Principles
//!
//! 1. **Open classes**: every class, builtins included, can be reopened and
//!    have methods, constants and class-level state added at any time
//! 2. **Frames**: each method call, class body and file runs in its own
//!    `Frame`, carrying `self`, the definition target and the source file
//! 3. **Centralized control flow**: `Control` carries `return` and raised
//!    errors up to the nearest frame boundary
//! 4. **Attribution**: every `def` records the file and line it came from

pub mod expressions;
pub mod runtime;
pub mod statements;
pub mod stdlib;
pub mod types;

#[cfg(test)]
mod tests;

pub use runtime::{Builtins, Runtime, RuntimeBuilder};
pub use types::{ClassRef, Control, Expr, Method, Stmt, Value};
