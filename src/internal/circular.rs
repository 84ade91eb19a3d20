//! Circular dependency detection over an explicit resolution path.
//!
//! Every resolution carries the chain of keys that led to it. The chain is
//! owned by the resolution itself rather than by the thread, so it stays
//! correct when asynchronous resolutions suspend and resume on other threads.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Default bound on nested resolutions.
pub(crate) const MAX_DEPTH: usize = 1024;

/// Immutable chain of keys from the root request to the current resolution.
#[derive(Clone, Default)]
pub(crate) struct ResolutionPath {
    keys: Arc<Vec<Key>>,
}

impl ResolutionPath {
    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Extends the path with `key`.
    ///
    /// Fails with `Circular` when `key` is already on the path and `detect` is
    /// set, and with `DepthExceeded` when the path would grow past `max_depth`.
    pub(crate) fn push(&self, key: Key, detect: bool, max_depth: usize) -> DiResult<ResolutionPath> {
        if detect && self.contains(&key) {
            let mut cycle: Vec<&'static str> = self.keys.iter().map(Key::display_name).collect();
            cycle.push(key.display_name());
            return Err(DiError::Circular(cycle));
        }
        if self.keys.len() >= max_depth {
            return Err(DiError::DepthExceeded(self.keys.len()));
        }
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.extend_from_slice(&self.keys);
        keys.push(key);
        Ok(ResolutionPath { keys: Arc::new(keys) })
    }

    /// Display names along the path, root first.
    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.keys.iter().map(Key::display_name).collect()
    }
}

impl std::fmt::Debug for ResolutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
