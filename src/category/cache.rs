use super::{CategoryId, ResolutionError};
use ahash::AHashMap;
use std::fmt;
use tracing::trace;

/// Key under which a resolution outcome is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Path(String),
    IdNumber(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheKey::Path(flattened) => write!(f, "path:{}", flattened),
            CacheKey::IdNumber(idnumber) => write!(f, "idnumber:{}", idnumber),
        }
    }
}

/// A cached outcome. `Unresolved` is a sentinel meaning the lookup already
/// ran and failed, as opposed to the key being absent from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Resolved(CategoryId),
    Unresolved(ResolutionError),
}

/// Run-scoped cache of path and idnumber resolutions. Entries never expire;
/// the owning context is reset between runs.
#[derive(Debug, Default)]
pub struct PathCache {
    entries: AHashMap<CacheKey, CacheEntry>,
    hits: usize,
    misses: usize,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<&CacheEntry> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                trace!("Cache hit for {}", key);
                Some(entry)
            }
            None => {
                self.misses += 1;
                trace!("Cache miss for {}", key);
                None
            }
        }
    }

    /// Look at an entry without counting it as a hit or miss.
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn invalidate(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}
