//! Load-once ledger for fragment extensions

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Process-wide ledger, for hosts that want a single one
static GLOBAL_LEDGER: OnceLock<LoadLedger> = OnceLock::new();

/// Canonical paths of fragments that have started executing
///
/// Clones share the same set. Paths are claimed before their body runs and
/// are never released, so a fragment runs at most once per ledger even when
/// it is requested again while it is still executing.
#[derive(Debug, Clone, Default)]
pub struct LoadLedger {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl LoadLedger {
    /// A fresh, empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// The ledger shared by the whole process
    pub fn global() -> Self {
        GLOBAL_LEDGER.get_or_init(LoadLedger::new).clone()
    }

    /// Record `path`; `false` if it was already recorded
    pub fn claim(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Recorded paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock().iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Whether both handles refer to the same set
    pub fn shares_with(&self, other: &LoadLedger) -> bool {
        Arc::ptr_eq(&self.paths, &other.paths)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
