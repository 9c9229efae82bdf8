//! Error types
//!
//! Loader and runtime failures surface unwrapped: I/O errors stay raw
//! `std::io::Error`s so callers can match on `ErrorKind::NotFound`, parse errors
//! carry the file and line they were found at, and evaluation errors carry the
//! Annex exception class name.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::ParseError;

/// Exception class of a runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NameError,
    NoMethodError,
    ArgumentError,
    TypeError,
    FrozenError,
    ZeroDivisionError,
    IndexError,
    RuntimeError,
    SystemStackError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NameError => "NameError",
            ErrorKind::NoMethodError => "NoMethodError",
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::FrozenError => "FrozenError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::SystemStackError => "SystemStackError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn all() -> [ErrorKind; 9] {
        [
            ErrorKind::NameError,
            ErrorKind::NoMethodError,
            ErrorKind::ArgumentError,
            ErrorKind::TypeError,
            ErrorKind::FrozenError,
            ErrorKind::ZeroDivisionError,
            ErrorKind::IndexError,
            ErrorKind::RuntimeError,
            ErrorKind::SystemStackError,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File and line a method was defined at, or an error was raised at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: Option<PathBuf>,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: Option<PathBuf>, line: usize) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file.display(), self.line),
            None => write!(f, "(eval):{}", self.line),
        }
    }
}

/// An exception raised while evaluating Annex code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Where the error was raised, filled in by the statement that raised it
    pub location: Option<SourceLocation>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for RuntimeError {}

/// Top-level error for loading and evaluation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn runtime(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Runtime(RuntimeError::new(kind, message))
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::ArgumentError, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(ErrorKind::TypeError, message)
    }

    /// True for a missing extension file or directory entry
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Exception class, for runtime errors
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Runtime(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::Runtime(e) => e.message.clone(),
            other => other.to_string(),
        }
    }
}
