// Parsed expression cache
//
// Bounded, optionally time-limited map from source text to parsed AST with
// least-recently-used eviction and hit/miss accounting. Safe to share between
// threads: lookups go through the concurrent map's shard locks, and only the
// insert/evict path is serialized.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::ast::Expression;
use crate::config::CacheConfig;
use crate::parser::ParserError;

#[derive(Debug)]
struct CacheEntry {
    expression: Arc<Expression>,
    created_at: Instant,
    /// Logical clock value of the most recent access
    last_access: u64,
    access_count: u64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before any lookup
    pub hit_rate: f64,
}

#[derive(Debug)]
pub struct ExpressionCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
    ttl: Option<Duration>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    write_lock: Mutex<()>,
}

impl ExpressionCache {
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        ExpressionCache {
            entries: DashMap::new(),
            max_entries,
            ttl,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl())
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `source` currently has an entry, expired or not.
    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    /// Number of times the entry for `source` has been served from the cache.
    pub fn access_count(&self, source: &str) -> Option<u64> {
        self.entries.get(source).map(|entry| entry.access_count)
    }

    /// Return the cached AST for `source`, parsing and inserting it on a miss.
    ///
    /// Parse failures count as a miss and are returned without being cached.
    pub fn get_or_parse<F>(&self, source: &str, parse: F) -> Result<Arc<Expression>, ParserError>
    where
        F: FnOnce(&str) -> Result<Expression, ParserError>,
    {
        if let Some(expression) = self.lookup(source) {
            return Ok(expression);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(source, "expression cache miss");

        let expression = Arc::new(parse(source)?);
        if self.max_entries == 0 {
            return Ok(expression);
        }

        let _guard = self.write_lock.lock();

        // Another caller may have inserted the same source while we parsed
        if let Some(mut existing) = self.entries.get_mut(source) {
            if !self.is_expired(&existing) {
                self.touch(&mut existing);
                return Ok(Arc::clone(&existing.expression));
            }
        }

        while self.entries.len() >= self.max_entries && !self.entries.contains_key(source) {
            if !self.evict_lru() {
                break;
            }
        }

        self.entries.insert(
            source.to_string(),
            CacheEntry {
                expression: Arc::clone(&expression),
                created_at: Instant::now(),
                last_access: self.tick(),
                access_count: 0,
            },
        );
        Ok(expression)
    }

    fn lookup(&self, source: &str) -> Option<Arc<Expression>> {
        let expired = match self.entries.get_mut(source) {
            None => return None,
            Some(mut entry) => {
                if self.is_expired(&entry) {
                    true
                } else {
                    self.touch(&mut entry);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    trace!(source, "expression cache hit");
                    return Some(Arc::clone(&entry.expression));
                }
            }
        };

        if expired && self.entries.remove_if(source, |_, entry| self.is_expired(entry)).is_some() {
            debug!(source, "dropped expired expression");
        }
        None
    }

    /// Remove the entry with the oldest access; false when empty.
    fn evict_lru(&self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_access)
            .map(|entry| entry.key().clone());

        match victim {
            Some(key) => {
                self.entries.remove(&key);
                debug!(source = %key, "evicted least recently used expression");
                true
            }
            None => false,
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.created_at.elapsed() > ttl)
    }

    fn touch(&self, entry: &mut CacheEntry) {
        entry.last_access = self.tick();
        entry.access_count += 1;
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove every expired entry; returns how many were dropped.
    ///
    /// Expiry is otherwise only noticed lazily on lookup, so long-lived
    /// engines should call this periodically.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let _guard = self.write_lock.lock();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !self.is_expired(entry);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            debug!(removed, "purged expired expressions");
        }
        removed
    }

    /// Drop all entries and reset the hit/miss counters.
    ///
    /// Inserts and purges are held off while clearing, but lookups are not:
    /// a hit racing with `clear` may be counted after the reset.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries: self.entries.len(),
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
