use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::data_capture::InteractionCodec;
use crate::error_handling::types::StoreError;

use super::record::CorrelationRecord;
use super::types::{StoreMetrics, StoreSettings};

/// Concurrent, capacity- and TTL-bounded map from session id to its
/// interaction log.
///
/// Sessions live in an LRU cache; when it is full the least recently used
/// session is dropped to make room for a new registration. Pinned buckets
/// (operator token, root domain) sit beside the cache, never expire and are
/// never evicted.
///
/// The map lock only covers lookups and membership changes. Appends and
/// drains work on the record's own lock, so unrelated sessions never wait on
/// each other, and all compression happens outside any lock.
pub struct CorrelationStore {
    sessions: Mutex<LruCache<String, Arc<CorrelationRecord>>>,
    buckets: HashMap<String, Arc<CorrelationRecord>>,
    codec: InteractionCodec,
    ttl: Duration,
    evicted: AtomicUsize,
}

impl CorrelationStore {
    pub fn new(settings: StoreSettings) -> Self {
        let buckets: HashMap<String, Arc<CorrelationRecord>> = settings
            .pinned_buckets
            .iter()
            .map(|key| (key.clone(), Arc::new(CorrelationRecord::pinned())))
            .collect();

        let session_capacity = NonZeroUsize::new(settings.capacity.saturating_sub(buckets.len()))
            .unwrap_or(NonZeroUsize::MIN);

        info!(
            "Interaction store ready: capacity={}, ttl={:?}, pinned buckets={}",
            settings.capacity,
            settings.ttl,
            buckets.len()
        );

        Self {
            sessions: Mutex::new(LruCache::new(session_capacity)),
            buckets,
            codec: InteractionCodec::new(settings.pool_size),
            ttl: settings.ttl,
            evicted: AtomicUsize::new(0),
        }
    }

    /// Creates an empty record for `session_id` bound to `secret`.
    ///
    /// A full store drops its least recently used session first.
    pub fn register(&self, session_id: &str, secret: &str) -> Result<(), StoreError> {
        if self.buckets.contains_key(session_id) {
            return Err(StoreError::DuplicateSession);
        }

        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.peek(session_id) {
            if !existing.is_expired(now) {
                return Err(StoreError::DuplicateSession);
            }
            sessions.pop(session_id);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }

        let record = Arc::new(CorrelationRecord::session(secret, now.checked_add(self.ttl)));
        if let Some((dropped, _)) = sessions.push(session_id.to_string(), record) {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            debug!("Store full, evicted least recently used session {}", dropped);
        }
        Ok(())
    }

    /// Compresses `payload` and appends it to the session's log.
    pub fn append(&self, session_id: &str, payload: &[u8]) -> Result<(), StoreError> {
        let record = self
            .lookup_session(session_id)
            .ok_or(StoreError::UnknownSession)?;
        let item = self.codec.compress(payload)?;
        record.push(item);
        Ok(())
    }

    /// Appends to a pinned bucket.
    pub fn append_to_bucket(&self, bucket: &str, payload: &[u8]) -> Result<(), StoreError> {
        let record = self.buckets.get(bucket).ok_or(StoreError::UnknownSession)?;
        let item = self.codec.compress(payload)?;
        record.push(item);
        Ok(())
    }

    /// Takes everything appended to the session since the last drain, in
    /// append order. An empty log drains to an empty vector.
    pub fn drain(&self, session_id: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let record = self
            .lookup_session(session_id)
            .ok_or(StoreError::UnknownSession)?;
        Ok(self.codec.decompress_all(record.take_log()))
    }

    /// Like [`drain`](Self::drain), but only for the holder of the secret
    /// the session was registered with.
    pub fn drain_with_secret(
        &self,
        session_id: &str,
        secret: &str,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let record = self
            .lookup_session(session_id)
            .ok_or(StoreError::UnknownSession)?;
        if !record.secret_matches(secret) {
            return Err(StoreError::SecretMismatch);
        }
        Ok(self.codec.decompress_all(record.take_log()))
    }

    pub fn drain_bucket(&self, bucket: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let record = self.buckets.get(bucket).ok_or(StoreError::UnknownSession)?;
        Ok(self.codec.decompress_all(record.take_log()))
    }

    /// Deletes the session and any undrained data once `secret` matches.
    pub fn remove(&self, session_id: &str, secret: &str) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let record = match sessions.peek(session_id) {
            Some(record) if !record.is_expired(now) => record.clone(),
            _ => return Err(StoreError::UnknownSession),
        };
        if !record.secret_matches(secret) {
            return Err(StoreError::SecretMismatch);
        }
        sessions.pop(session_id);
        drop(sessions);

        let discarded = record.take_log();
        debug!(
            "Removed session {} ({} undrained interaction(s) discarded)",
            session_id,
            discarded.len()
        );
        Ok(())
    }

    /// Whether `session_id` names a live session or a pinned bucket.
    pub fn contains(&self, session_id: &str) -> bool {
        if self.buckets.contains_key(session_id) {
            return true;
        }
        let now = Instant::now();
        matches!(self.sessions.lock().peek(session_id), Some(record) if !record.is_expired(now))
    }

    /// Removes every session whose TTL has run out and returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, record)| record.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.pop(id.as_str());
        }
        drop(sessions);

        self.evicted.fetch_add(expired.len(), Ordering::Relaxed);
        expired.len()
    }

    pub fn metrics(&self) -> StoreMetrics {
        StoreMetrics {
            active: self.sessions.lock().len() + self.buckets.len(),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    /// Number of interactions waiting in a session or bucket.
    pub fn pending(&self, session_id: &str) -> Option<usize> {
        match self.buckets.get(session_id) {
            Some(bucket) => Some(bucket.pending()),
            None => self.lookup_session(session_id).map(|r| r.pending()),
        }
    }

    /// Fetches a live session record, marking it recently used. An expired
    /// record found here is dropped on the spot.
    fn lookup_session(&self, session_id: &str) -> Option<Arc<CorrelationRecord>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        match sessions.get(session_id) {
            Some(record) if !record.is_expired(now) => return Some(record.clone()),
            Some(_) => {}
            None => return None,
        }
        sessions.pop(session_id);
        self.evicted.fetch_add(1, Ordering::Relaxed);
        debug!("Dropped expired session {} on access", session_id);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    const TTL: Duration = Duration::from_secs(60);

    fn store() -> CorrelationStore {
        CorrelationStore::new(StoreSettings::new(100, TTL))
    }

    #[test]
    fn register_then_duplicate() {
        let store = store();
        store.register("session-a", "secret").unwrap();
        assert!(matches!(
            store.register("session-a", "other"),
            Err(StoreError::DuplicateSession)
        ));
        assert!(store.contains("session-a"));
    }

    #[test]
    fn append_to_unknown_session_creates_nothing() {
        let store = store();
        assert!(matches!(
            store.append("ghost", b"payload"),
            Err(StoreError::UnknownSession)
        ));
        assert!(!store.contains("ghost"));
        assert_eq!(store.metrics().active, 0);
    }

    #[test]
    fn drain_returns_payload_once() {
        let store = store();
        store.register("session-a", "secret").unwrap();
        store.append("session-a", b"first interaction").unwrap();

        let drained = store.drain("session-a").unwrap();
        assert_eq!(drained, vec![b"first interaction".to_vec()]);

        let again = store.drain("session-a").unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn drain_preserves_append_order() {
        let store = store();
        store.register("session-a", "secret").unwrap();
        for i in 0..5 {
            store.append("session-a", format!("item-{}", i).as_bytes()).unwrap();
        }
        assert_eq!(store.pending("session-a"), Some(5));

        let drained: Vec<String> = store
            .drain("session-a")
            .unwrap()
            .into_iter()
            .map(|raw| String::from_utf8(raw).unwrap())
            .collect();
        assert_eq!(drained, vec!["item-0", "item-1", "item-2", "item-3", "item-4"]);
    }

    #[test]
    fn drain_unknown_session() {
        let store = store();
        assert!(matches!(store.drain("ghost"), Err(StoreError::UnknownSession)));
    }

    #[test]
    fn concurrent_appends_are_neither_lost_nor_duplicated() {
        let store = Arc::new(store());
        store.register("busy", "secret").unwrap();

        let writers: Vec<_> = (0..16)
            .map(|w| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let payload = format!("{}-{}", w, i);
                        store.append("busy", payload.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let drained: Vec<String> = store
            .drain("busy")
            .unwrap()
            .into_iter()
            .map(|raw| String::from_utf8(raw).unwrap())
            .collect();
        assert_eq!(drained.len(), 16 * 50);
        let unique: HashSet<&String> = drained.iter().collect();
        assert_eq!(unique.len(), 16 * 50);

        // Each writer's own appends come back in the order it made them.
        for w in 0..16 {
            let prefix = format!("{}-", w);
            let sequence: Vec<usize> = drained
                .iter()
                .filter_map(|item| item.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(sequence, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn drains_racing_appends_see_every_item_once() {
        let store = Arc::new(store());
        store.register("raced", "secret").unwrap();

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    store.append("raced", format!("{}", i).as_bytes()).unwrap();
                }
            })
        };

        let mut seen = Vec::new();
        while !writer.is_finished() {
            seen.extend(store.drain("raced").unwrap());
        }
        writer.join().unwrap();
        seen.extend(store.drain("raced").unwrap());

        let values: Vec<usize> = seen
            .iter()
            .map(|raw| std::str::from_utf8(raw).unwrap().parse().unwrap())
            .collect();
        assert_eq!(values, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn remove_requires_matching_secret() {
        let store = store();
        store.register("session-a", "secret").unwrap();
        store.append("session-a", b"undrained").unwrap();

        assert!(matches!(
            store.remove("session-a", "wrong"),
            Err(StoreError::SecretMismatch)
        ));
        assert!(store.contains("session-a"));

        store.remove("session-a", "secret").unwrap();
        assert!(!store.contains("session-a"));
        assert!(matches!(
            store.remove("session-a", "secret"),
            Err(StoreError::UnknownSession)
        ));
        // The id is free again.
        store.register("session-a", "new-secret").unwrap();
        assert!(store.drain("session-a").unwrap().is_empty());
    }

    #[test]
    fn drain_with_secret_checks_secret() {
        let store = store();
        store.register("session-a", "secret").unwrap();
        store.append("session-a", b"data").unwrap();

        assert!(matches!(
            store.drain_with_secret("session-a", "nope"),
            Err(StoreError::SecretMismatch)
        ));
        // A rejected poll leaves the data in place.
        assert_eq!(
            store.drain_with_secret("session-a", "secret").unwrap(),
            vec![b"data".to_vec()]
        );
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = CorrelationStore::new(StoreSettings::new(2, TTL));
        store.register("old", "s").unwrap();
        store.register("hot", "s").unwrap();
        // Touch `old` so `hot` becomes the eviction candidate.
        store.append("old", b"keep me").unwrap();

        store.register("new", "s").unwrap();
        assert!(store.contains("old"));
        assert!(!store.contains("hot"));
        assert!(store.contains("new"));
        assert_eq!(store.metrics(), StoreMetrics { active: 2, evicted: 1 });
    }

    #[test]
    fn pinned_buckets_count_but_never_evict() {
        let settings = StoreSettings::new(2, TTL).with_pinned_bucket("operator-token");
        let store = CorrelationStore::new(settings);
        store.register("one", "s").unwrap();
        store.register("two", "s").unwrap();

        assert!(store.contains("operator-token"));
        assert!(!store.contains("one"));
        assert_eq!(store.metrics().active, 2);

        store.append_to_bucket("operator-token", b"aux").unwrap();
        assert_eq!(store.drain_bucket("operator-token").unwrap(), vec![b"aux".to_vec()]);
        assert!(matches!(
            store.register("operator-token", "s"),
            Err(StoreError::DuplicateSession)
        ));
    }

    #[test]
    fn unknown_bucket() {
        let store = store();
        assert!(matches!(
            store.append_to_bucket("missing", b"x"),
            Err(StoreError::UnknownSession)
        ));
        assert!(matches!(store.drain_bucket("missing"), Err(StoreError::UnknownSession)));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_expires_sessions_after_ttl() {
        let store = CorrelationStore::new(StoreSettings::new(10, Duration::from_secs(1)));
        store.register("short-lived", "s").unwrap();
        store.append("short-lived", b"pending").unwrap();

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(store.sweep_expired(), 0);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(store.sweep_expired(), 1);
        assert!(matches!(
            store.drain("short-lived"),
            Err(StoreError::UnknownSession)
        ));
        assert_eq!(store.metrics(), StoreMetrics { active: 0, evicted: 1 });

        // An expired id can be registered again.
        store.register("short-lived", "s").unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_counts_from_registration_not_access() {
        let store = CorrelationStore::new(StoreSettings::new(10, Duration::from_secs(10)));
        store.register("polled", "s").unwrap();

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(3)).await;
            store.drain("polled").unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(store.drain("polled"), Err(StoreError::UnknownSession)));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_can_be_reregistered_before_sweep() {
        let store = CorrelationStore::new(StoreSettings::new(10, Duration::from_secs(1)));
        store.register("reused", "first").unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        store.register("reused", "second").unwrap();
        assert!(matches!(
            store.remove("reused", "first"),
            Err(StoreError::SecretMismatch)
        ));
        assert_eq!(store.metrics().evicted, 1);
    }
}
