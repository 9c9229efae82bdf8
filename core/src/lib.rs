//! Annex: convention-based class extensions
//!
//! A class body stays small while its behaviour lives in per-concern files
//! under `<class dir>/<class name>/extensions/`. Calling `load_extensions`
//! from the class merges those files in, each exactly once, with source
//! locations that point at the extension files themselves.
//!
//! The files are written in Annex, a small Ruby-flavoured language hosted by
//! [`Runtime`].

pub mod config;
pub mod errors;
pub mod executor;
pub mod loader;
pub mod parser;

pub use config::Config;
pub use errors::{Error, ErrorKind, RuntimeError, SourceLocation};
pub use executor::{ClassRef, Runtime, RuntimeBuilder, Value};
pub use loader::{classify, ExtensionLoader, FileShape, LoadLedger, LoadReport, PathResolver};
pub use parser::{ParseError, Pragmas};
