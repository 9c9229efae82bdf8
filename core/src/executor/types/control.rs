//! Control flow and execution frame types

use std::collections::HashMap;
use std::path::PathBuf;

use super::values::{ClassRef, Value};
use crate::errors::{Error, RuntimeError, SourceLocation};

/* ===================== Control Flow ===================== */

/// Non-local exit from a statement
///
/// `Return` unwinds to the enclosing method (or file) frame, `Throw` unwinds to
/// the host. Neither escapes `Runtime`'s public API.
#[derive(Debug)]
pub enum Control {
    Return(Value),
    Throw(Error),
}

/// Result of executing a statement or evaluating an expression
pub type Flow<T> = Result<T, Control>;

impl From<Error> for Control {
    fn from(err: Error) -> Self {
        Control::Throw(err)
    }
}

impl From<RuntimeError> for Control {
    fn from(err: RuntimeError) -> Self {
        Control::Throw(Error::Runtime(err))
    }
}

/* ===================== Frames ===================== */

/// Execution frame: one per method call, class body, or evaluated file
#[derive(Debug, Clone)]
pub struct Frame {
    pub self_val: Value,
    /// Where `def` puts new methods
    pub definee: ClassRef,
    /// Lexical class nesting, outermost first
    pub cref: Vec<ClassRef>,
    pub locals: HashMap<String, Value>,
    /// File being executed, `None` for `(eval)` code
    pub file: Option<PathBuf>,
    /// 1-based line of the statement currently executing
    pub line: usize,
}

impl Frame {
    pub fn new(self_val: Value, definee: ClassRef, cref: Vec<ClassRef>, file: Option<PathBuf>) -> Self {
        Self {
            self_val,
            definee,
            cref,
            locals: HashMap::new(),
            file,
            line: 1,
        }
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.file.clone(), self.line)
    }
}
