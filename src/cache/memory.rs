//! In-process cache backend

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::CacheBackend;
use crate::{Result, RigError};

/// Map-backed cache that can be switched to "unreachable".
///
/// Clones share the same storage, so a test can keep one handle to flip
/// reachability while the loop owns another.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
    reachable: Arc<AtomicBool>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), reachable: Arc::new(AtomicBool::new(true)) }
    }

    /// Simulate the store going away or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Read an entry regardless of reachability.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Write an entry regardless of reachability.
    pub fn insert(&self, key: &str, value: impl Into<String>) {
        self.entries.lock().insert(key.to_string(), value.into());
    }

    fn check(&self, operation: &str, key: &str) -> Result<()> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(RigError::cache_unreachable(operation, key, "connection refused"))
        }
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryBackend {
    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.check("set", key)?;
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check("get", key)?;
        Ok(self.entries.lock().get(key).cloned())
    }
}
