//! In-memory response cache with a byte budget and LRU eviction.
//!
//! Entries never expire on a timer; only budget pressure, an explicit
//! [`ResponseCache::clear`] or disabling the cache removes them.

use bytes::Bytes;
use lru::LruCache;
use tokio::time::Instant;

use crate::error::CacheError;

/// The subset of `Cache-Control` the session honors when storing responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub no_cache: bool,
    pub no_store: bool,
}

impl CacheControl {
    pub fn parse(header: &str) -> Self {
        let mut control = Self::default();

        for directive in header.split(',') {
            let directive = directive.trim();

            if directive.eq_ignore_ascii_case("no-cache") {
                control.no_cache = true;
            } else if directive.eq_ignore_ascii_case("no-store") {
                control.no_store = true;
            }
        }

        control
    }

    /// Responses that must be revalidated or must not be stored are skipped,
    /// since the cache never revalidates.
    pub fn is_cacheable(&self) -> bool { !self.no_store && !self.no_cache }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key:          String,
    pub body:         Bytes,
    pub content_type: String,
    pub stored_at:    Instant,
    pub size:         u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries:    usize,
    pub used_bytes: u64,
    pub budget:     u64,
    pub hits:       u64,
    pub misses:     u64,
    pub evictions:  u64,
}

/// Keyed response store whose summed entry size never exceeds its budget.
#[derive(Debug)]
pub struct ResponseCache {
    entries:    LruCache<String, CacheEntry>,
    enabled:    bool,
    budget:     u64,
    used_bytes: u64,
    hits:       u64,
    misses:     u64,
    evictions:  u64,
}

impl ResponseCache {
    pub fn new(enabled: bool, budget: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            enabled,
            budget,
            used_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn is_enabled(&self) -> bool { self.enabled }

    pub fn budget(&self) -> u64 { self.budget }

    pub fn used_bytes(&self) -> u64 { self.used_bytes }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Look up an entry and mark it most recently used.
    pub fn lookup(&mut self, key: &str) -> Option<&CacheEntry> {
        if !self.enabled {
            return None;
        }
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Look up an entry without touching recency or counters.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> { self.entries.peek(key) }

    /// Store a response body, evicting least-recently-used entries until it
    /// fits.
    ///
    /// Returns `Ok(false)` when the cache is disabled. An entry larger than
    /// the whole budget is rejected and nothing is evicted.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        body: Bytes,
        content_type: impl Into<String>,
        now: Instant,
    ) -> Result<bool, CacheError> {
        if !self.enabled {
            return Ok(false);
        }

        let size = body.len() as u64;
        if size > self.budget {
            return Err(CacheError::EntryTooLarge {
                size,
                budget: self.budget,
            });
        }

        let key = key.into();
        if let Some(previous) = self.entries.pop(&key) {
            self.used_bytes -= previous.size;
        }

        self.evict_until(self.budget - size);

        let entry = CacheEntry {
            key: key.clone(),
            body,
            content_type: content_type.into(),
            stored_at: now,
            size,
        };
        self.entries.put(key, entry);
        self.used_bytes += size;

        Ok(true)
    }

    /// Change the budget, evicting down to it if it shrank.
    pub fn set_budget(&mut self, budget: u64) {
        self.budget = budget;
        self.evict_until(budget);
    }

    /// Disabling drops every entry.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled && !enabled {
            self.clear();
        }
        self.enabled = enabled;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.used_bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries:    self.entries.len(),
            used_bytes: self.used_bytes,
            budget:     self.budget,
            hits:       self.hits,
            misses:     self.misses,
            evictions:  self.evictions,
        }
    }

    fn evict_until(&mut self, limit: u64) {
        while self.used_bytes > limit {
            match self.entries.pop_lru() {
                Some((_, evicted)) => {
                    self.used_bytes -= evicted.size;
                    self.evictions += 1;
                }
                None => break,
            }
        }
    }
}
