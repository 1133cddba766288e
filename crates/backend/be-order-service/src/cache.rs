//! Small in-process TTL cache for hot, rarely-changing rows.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, self.ttl, Instant::now());
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.insert_at(key, value, ttl, Instant::now());
    }

    fn insert_at(&self, key: K, value: V, ttl: Duration, now: Instant) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            Self::make_room(&mut entries, self.max_entries, now);
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Drops expired entries, then the soonest-expiring fifth if still full.
    fn make_room(entries: &mut HashMap<K, Entry<V>>, max_entries: usize, now: Instant) {
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.len() < max_entries {
            return;
        }

        let mut by_expiry: Vec<(K, Instant)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.expires_at))
            .collect();
        by_expiry.sort_by_key(|(_, expires_at)| *expires_at);

        let evict = (max_entries / 5).max(1);
        for (key, _) in by_expiry.into_iter().take(evict) {
            entries.remove(&key);
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of entries dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Purges expired entries every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<()>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, remaining = cache.len(), "Cache sweep");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::debug!("Cache sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        let start = Instant::now();
        cache.insert_at("a", 1, Duration::from_secs(60), start);

        assert_eq!(cache.get_at(&"a", start + Duration::from_secs(59)), Some(1));
        assert_eq!(cache.get_at(&"a", start + Duration::from_secs(61)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_prefers_dropping_expired_entries() {
        let cache = TtlCache::new(Duration::from_secs(60), 3);
        let start = Instant::now();
        cache.insert_at(1, "short", Duration::from_secs(1), start);
        cache.insert_at(2, "long", Duration::from_secs(100), start);
        cache.insert_at(3, "long", Duration::from_secs(100), start);

        cache.insert_at(4, "new", Duration::from_secs(100), start + Duration::from_secs(5));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get_at(&2, start + Duration::from_secs(5)), Some("long"));
        assert_eq!(cache.get_at(&4, start + Duration::from_secs(5)), Some("new"));
    }

    #[test]
    fn full_cache_evicts_soonest_expiring_fifth() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        let start = Instant::now();
        for i in 0..10u64 {
            cache.insert_at(i, i, Duration::from_secs(100 + i), start);
        }

        cache.insert_at(99, 99, Duration::from_secs(500), start);

        // two evicted, one inserted
        assert_eq!(cache.len(), 9);
        assert_eq!(cache.get_at(&0, start), None);
        assert_eq!(cache.get_at(&1, start), None);
        assert_eq!(cache.get_at(&2, start), Some(2));
        assert_eq!(cache.get_at(&99, start), Some(99));
    }

    #[test]
    fn purge_counts_removed_entries() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        let start = Instant::now();
        cache.insert_at("a", 1, Duration::from_secs(1), start);
        cache.insert_at("b", 2, Duration::from_secs(1), start);
        cache.insert_at("c", 3, Duration::from_secs(60), start);

        assert_eq!(cache.purge_expired_at(start + Duration::from_secs(2)), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown() {
        let cache: Arc<TtlCache<u32, u32>> = Arc::new(TtlCache::default());
        let (tx, rx) = watch::channel(());
        let handle = cache.spawn_sweeper(Duration::from_millis(10), rx);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
