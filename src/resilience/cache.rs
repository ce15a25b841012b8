use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A value served from the cache, with its staleness flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue<T> {
    pub data: T,
    /// True iff the entry was served past its TTL. Only the outage
    /// fallback path does this; fresh reads never see it set.
    pub stale: bool,
}

#[derive(Debug)]
struct CacheEntry<T> {
    data: T,
    created: Instant,
    last_access: Instant,
    /// Zero means the entry never expires.
    ttl: Duration,
    hits: u64,
}

impl<T> CacheEntry<T> {
    fn expired(&self, now: Instant) -> bool {
        !self.ttl.is_zero() && now.duration_since(self.created) > self.ttl
    }
}

/// Aggregate counters, mostly useful in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Named cache entries with per-entry TTL and stale-fallback reads.
#[derive(Debug)]
pub struct TtlCache<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    default_ttl: Duration,
    misses: AtomicU64,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            misses: AtomicU64::new(0),
        }
    }

    pub fn insert(&self, key: &str, data: T) {
        self.insert_with_ttl(key, data, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: &str, data: T, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry {
            data,
            created: now,
            last_access: now,
            ttl,
            hits: 0,
        };
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key.to_string(), entry);
    }

    /// A hit only while within TTL. Expired entries count as misses but
    /// are left in place for [`TtlCache::get_allow_expired`].
    pub fn get_fresh(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) if !entry.expired(now) => {
                entry.last_access = now;
                entry.hits += 1;
                Some(entry.data.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Outage fallback: also serves expired entries, flagged stale.
    /// Never used for the duplicate-vote decision.
    pub fn get_allow_expired(&self, key: &str) -> Option<CachedValue<T>> {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                entry.hits += 1;
                Some(CachedValue {
                    data: entry.data.clone(),
                    stale: entry.expired(now),
                })
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(key);
    }

    /// Evict expired entries. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired(now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().expect("cache lock poisoned");
        CacheStats {
            entries: entries.len(),
            hits: entries.values().map(|e| e.hits).sum(),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("electionStatus", 42);
        assert_eq!(cache.get_fresh("electionStatus"), Some(42));
    }

    #[test]
    fn miss_on_absent_key() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get_fresh("settings"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn expired_entry_is_not_fresh_but_serves_stale() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("electionStatus", 42, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.get_fresh("electionStatus"), None);
        let fallback = cache.get_allow_expired("electionStatus").unwrap();
        assert_eq!(fallback.data, 42);
        assert!(fallback.stale);
    }

    #[test]
    fn fresh_read_is_not_flagged_stale() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("electionStatus", 42);
        let value = cache.get_allow_expired("electionStatus").unwrap();
        assert!(!value.stale);
    }

    #[test]
    fn zero_ttl_never_expires() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("settings", 7, Duration::ZERO);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get_fresh("settings"), Some(7));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("results:1", 5);
        cache.invalidate("results:1");
        assert_eq!(cache.get_allow_expired("results:1"), None);
    }

    #[test]
    fn sweep_evicts_only_expired_entries() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("old", 1, Duration::from_millis(5));
        cache.insert("new", 2);
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.get_fresh("new"), Some(2));
        assert_eq!(cache.get_allow_expired("old"), None);
    }

    #[test]
    fn hit_counters_accumulate() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("electionStatus", 1);
        cache.get_fresh("electionStatus");
        cache.get_fresh("electionStatus");
        cache.get_fresh("missing");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }
}
