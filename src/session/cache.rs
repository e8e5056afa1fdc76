//! Bounded LRU session cache with idle-age cleanup

use super::{Clock, Session, SystemClock};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

struct Entry {
    session: Session,
    tick: u64,
}

/// Bounded, time-aware session store
///
/// Recency is tracked with a monotonically increasing tick per access, so the
/// least-recently-used entry is always the smallest key in `recency`.
///
/// A cache with capacity zero stores nothing: `set` is a no-op.
///
/// The cache itself is not synchronized; share it through [`SessionStore`].
pub struct SessionCache {
    capacity: usize,
    entries: HashMap<String, Entry>,
    recency: BTreeMap<u64, String>,
    next_tick: u64,
    clock: Arc<dyn Clock>,
}

impl SessionCache {
    /// Create a cache using the system clock
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            clock,
        }
    }

    /// Maximum number of live sessions
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a session, marking it most recently used
    ///
    /// Returns `None` on a miss.
    pub fn get(&mut self, id: &str) -> Option<Session> {
        let now = self.clock.now();
        let tick = self.bump_tick();
        let entry = self.entries.get_mut(id)?;

        self.recency.remove(&entry.tick);
        self.recency.insert(tick, id.to_string());
        entry.tick = tick;
        entry.session.touch(now);

        Some(entry.session.clone())
    }

    /// Insert or replace a session
    ///
    /// Replacing keeps the stored `created_at`. Inserting a new key into a full
    /// cache evicts the least recently used entry first.
    pub fn set(&mut self, id: &str, mut session: Session) {
        if self.capacity == 0 {
            tracing::debug!(session.id = id, "Session cache has zero capacity, ignoring set");
            return;
        }

        let now = self.clock.now();
        let tick = self.bump_tick();
        session.id = id.to_string();

        if let Some(existing) = self.entries.remove(id) {
            self.recency.remove(&existing.tick);
            session.created_at = existing.session.created_at;
            if existing.session.last_activity > session.last_activity {
                session.last_activity = existing.session.last_activity;
            }
        } else if self.entries.len() >= self.capacity {
            self.evict_lru();
        }

        session.touch(now);
        self.recency.insert(tick, id.to_string());
        self.entries.insert(id.to_string(), Entry { session, tick });
    }

    /// Remove a session, returning it if present
    pub fn delete(&mut self, id: &str) -> Option<Session> {
        let entry = self.entries.remove(id)?;
        self.recency.remove(&entry.tick);
        Some(entry.session)
    }

    /// Remove every session
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    /// Number of live sessions
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Remove sessions idle for longer than `max_age`
    ///
    /// Applies regardless of how full the cache is.
    ///
    /// # Returns
    ///
    /// Returns the number of sessions removed
    pub fn cleanup_stale(&mut self, max_age: Duration) -> usize {
        let max_age = match chrono::Duration::from_std(max_age) {
            Ok(age) => age,
            Err(_) => return 0,
        };
        // An age reaching past the representable range makes nothing stale
        let Some(cutoff) = self.clock.now().checked_sub_signed(max_age) else {
            return 0;
        };

        let stale: Vec<(String, u64)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.session.last_activity < cutoff)
            .map(|(id, entry)| (id.clone(), entry.tick))
            .collect();

        for (id, tick) in &stale {
            self.entries.remove(id);
            self.recency.remove(tick);
        }

        if !stale.is_empty() {
            tracing::debug!(
                session.event = "cleanup_stale",
                removed = stale.len(),
                remaining = self.entries.len(),
                "Removed stale sessions"
            );
        }

        stale.len()
    }

    fn bump_tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn evict_lru(&mut self) {
        if let Some((_, victim)) = self.recency.pop_first() {
            self.entries.remove(&victim);
            tracing::debug!(session.id = %victim, "Evicted least recently used session");
        }
    }
}

/// Thread-safe handle to a shared [`SessionCache`]
///
/// Clones refer to the same cache. Every operation takes the lock for its
/// full duration.
///
/// # Examples
///
/// ```
/// use clonar::session::{Session, SessionCache, SessionStore};
///
/// let store = SessionStore::new(SessionCache::new(2));
/// store.set("a", Session::new("a", chrono::Utc::now()));
/// assert!(store.get("a").is_some());
/// assert!(store.get("missing").is_none());
/// ```
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<SessionCache>>,
}

impl SessionStore {
    /// Wrap a cache for shared use
    pub fn new(cache: SessionCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Build a store from session settings
    ///
    /// The cache is bounded by `config.capacity`; the sweeper started with
    /// [`StaleSweeper::from_config`](super::StaleSweeper::from_config) applies
    /// `ttl_seconds`.
    pub fn from_config(config: &crate::config::SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(SessionCache::with_clock(config.capacity, clock))
    }

    fn lock(&self) -> MutexGuard<'_, SessionCache> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// See [`SessionCache::get`]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.lock().get(id)
    }

    /// See [`SessionCache::set`]
    pub fn set(&self, id: &str, session: Session) {
        self.lock().set(id, session)
    }

    /// See [`SessionCache::delete`]
    pub fn delete(&self, id: &str) -> Option<Session> {
        self.lock().delete(id)
    }

    /// See [`SessionCache::clear`]
    pub fn clear(&self) {
        self.lock().clear()
    }

    /// See [`SessionCache::size`]
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    /// See [`SessionCache::cleanup_stale`]
    pub fn cleanup_stale(&self, max_age: Duration) -> usize {
        self.lock().cleanup_stale(max_age)
    }
}
