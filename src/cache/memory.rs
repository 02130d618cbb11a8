/// In-process `CacheClient`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::cache::CacheClient;
use crate::error::CacheError;

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// HashMap-backed cache with per-entry expiry. Counts gets and sets.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        matches!(self.get_live(key), Ok(Some(_)))
    }

    fn get_live(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Protocol("memory cache lock poisoned".to_string()))?;

        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) => entry.expires_at.is_some_and(|t| Instant::now() >= t),
        };

        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|e| e.value.clone()))
    }
}

impl CacheClient for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.get_live(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Protocol("memory cache lock poisoned".to_string()))?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }
}
