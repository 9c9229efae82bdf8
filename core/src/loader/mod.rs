//! Extension loading
//!
//! Merges files from a class's extension directory into the class:
//!
//! 1. Resolve paths: every file in the directory, or one file per key in the
//!    order given
//! 2. Read and classify each file
//! 3. A reopening (`class Post ... end`) is `require`d as top-level code, so
//!    the runtime's require cache keeps it to one execution
//! 4. A fragment is claimed in the [`LoadLedger`], then evaluated inside the
//!    class body with its own path and line numbers as the origin
//!
//! Claiming before evaluation makes loading re-entrant: a fragment may call
//! `load_extensions :other` (hoisting), or even name itself, and everything it
//! asks for finishes before its next statement runs.

mod classify;
mod ledger;
mod resolver;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::config::Config;
use crate::errors::Error;
use crate::executor::{ClassRef, Runtime};

pub use classify::{classify, FileShape};
pub use ledger::LoadLedger;
pub use resolver::PathResolver;

/// Outcome of loading one extension file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Canonical path of the file
    pub path: PathBuf,
    pub shape: FileShape,
    /// `false` when the file had already been loaded and was skipped
    pub executed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExtensionLoader {
    resolver: PathResolver,
    ledger: LoadLedger,
}

impl ExtensionLoader {
    pub fn new(resolver: PathResolver, ledger: LoadLedger) -> Self {
        Self { resolver, ledger }
    }

    pub fn from_config(config: &Config, ledger: LoadLedger) -> Self {
        Self::new(PathResolver::from_config(config), ledger)
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn ledger(&self) -> &LoadLedger {
        &self.ledger
    }

    /// Load `keys` (or the whole directory when empty) into `class`
    ///
    /// Stops at the first failure. A missing file surfaces as the raw
    /// `io::Error`; parse and evaluation errors surface unchanged.
    pub fn load(&self, rt: &mut Runtime, class: &ClassRef, keys: &[&str]) -> Result<Vec<LoadReport>, Error> {
        let class_name = class.borrow().name.clone();
        let span = info_span!("load_extensions", class = %class_name, keys = ?keys);
        let _enter = span.enter();

        let base = rt.extension_base(class);
        let paths = if keys.is_empty() {
            self.resolver.all_paths(&base, &class_name)?
        } else {
            keys.iter()
                .map(|key| self.resolver.path_for(&base, &class_name, key))
                .collect()
        };
        debug!(base = %base.display(), count = paths.len(), "resolved extension paths");

        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.load_path(rt, class, &class_name, &path)?);
        }
        Ok(reports)
    }

    fn load_path(&self, rt: &mut Runtime, class: &ClassRef, class_name: &str, path: &Path) -> Result<LoadReport, Error> {
        let source = fs::read_to_string(path)?;
        let path = fs::canonicalize(path)?;
        let shape = classify(&source, class_name);
        debug!(path = %path.display(), ?shape, "classified extension");

        let executed = match shape {
            FileShape::Reopening => rt.require(&path)?,
            FileShape::Fragment => {
                if self.ledger.claim(&path) {
                    debug!(path = %path.display(), "evaluating fragment");
                    rt.class_eval(class, &source, &path, 1)?;
                    true
                } else {
                    debug!(path = %path.display(), "fragment already loaded, skipping");
                    false
                }
            }
        };

        Ok(LoadReport { path, shape, executed })
    }
}
