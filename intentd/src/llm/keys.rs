//! Credential pool with round-robin rotation

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::config::GeminiConfig;

/// Ordered pool of API keys with a shared rotation cursor.
///
/// The pool contents are fixed at construction; only the cursor moves.
/// Rotation spreads quota usage across keys - it is a load-distribution
/// heuristic, not a correctness-critical resource, so the cursor uses
/// relaxed atomics and a benign double-read under concurrency is fine.
pub struct KeyRing {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRing {
    /// Create a ring over the given keys, cursor at zero
    pub fn new(keys: Vec<String>) -> Self {
        debug!(key_count = keys.len(), "KeyRing::new: called");
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Build the ring from the environment variables named in config.
    ///
    /// Unset variables are skipped; an empty ring is not an error until a
    /// generation is actually attempted.
    pub fn from_config(config: &GeminiConfig) -> Self {
        let keys = config.load_keys();
        debug!(key_count = keys.len(), "KeyRing::from_config: loaded keys from environment");
        Self::new(keys)
    }

    /// Number of keys in the pool
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no credentials were configured
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Take the next key in rotation, advancing the shared cursor.
    ///
    /// Returns `None` when the pool is empty.
    pub fn next(&self) -> Option<String> {
        if self.keys.is_empty() {
            debug!("KeyRing::next: pool is empty");
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        debug!(%idx, "KeyRing::next: selected key");
        Some(self.keys[idx].clone())
    }
}
