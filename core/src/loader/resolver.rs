//! Extension path resolution
//!
//! For a class `Foo::Bar` declared in `app/models/bar.ext`, extensions live in
//! `app/models/bar/extensions/*.ext`. Only the last namespace segment is used.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    extensions_dir: String,
    suffix: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PathResolver {
    pub fn new(extensions_dir: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            extensions_dir: extensions_dir.into(),
            suffix: suffix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.extensions_dir.clone(), config.extension_suffix.clone())
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// `<base>/<last segment, lowercased>/<extensions dir>`; no I/O
    pub fn directory_for(&self, base: &Path, class_name: &str) -> PathBuf {
        let simple = class_name.rsplit("::").next().unwrap_or(class_name);
        base.join(simple.to_lowercase()).join(&self.extensions_dir)
    }

    /// Path of extension `key`, whether or not it exists
    pub fn path_for(&self, base: &Path, class_name: &str, key: &str) -> PathBuf {
        self.directory_for(base, class_name)
            .join(format!("{}.{}", key, self.suffix))
    }

    /// Every file in the extension directory carrying the suffix
    ///
    /// Entries come back in the order the filesystem lists them; callers that
    /// need a particular order load by key instead. A missing directory is an
    /// empty list.
    pub fn all_paths(&self, base: &Path, class_name: &str) -> io::Result<Vec<PathBuf>> {
        let dir = self.directory_for(base, class_name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == self.suffix.as_str()) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}
