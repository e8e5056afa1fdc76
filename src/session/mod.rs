//! Per-conversation session state
//!
//! A bounded, time-aware LRU cache of [`Session`] values, a thread-safe
//! [`SessionStore`] handle around it, and a background [`StaleSweeper`].
//! Time is read through the [`Clock`] trait so tests can advance it by hand.

pub mod cache;
pub mod sweeper;

pub use cache::{SessionCache, SessionStore};
pub use sweeper::{StaleSweeper, SweeperHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Source of the current time for the session cache
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
///
/// Clones share the same underlying instant.
///
/// # Examples
///
/// ```
/// use clonar::session::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::default();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(90));
/// assert_eq!((clock.now() - start).num_seconds(), 90);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: std::time::Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += step;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// State kept for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique session identifier
    pub id: String,
    /// Owning user, when known
    pub user_id: Option<String>,
    /// Creation time; never changes once the session is cached
    pub created_at: DateTime<Utc>,
    /// Last get or set; never decreases
    pub last_activity: DateTime<Utc>,
    /// Opaque conversation/response state
    pub payload: serde_json::Value,
}

/// Generate a fresh opaque session id
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

impl Session {
    /// Create a session stamped at `now`
    ///
    /// # Examples
    ///
    /// ```
    /// use clonar::session::Session;
    ///
    /// let session = Session::new("s-1", chrono::Utc::now());
    /// assert_eq!(session.created_at, session.last_activity);
    /// assert!(session.payload.is_null());
    /// ```
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            created_at: now,
            last_activity: now,
            payload: serde_json::Value::Null,
        }
    }

    /// Attach an owning user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Bump `last_activity` to `now` unless it is already later
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_session_ids_are_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::default();
        let other = clock.clone();
        let start = clock.now();
        other.advance(Duration::from_secs(5));
        assert_eq!((clock.now() - start).num_seconds(), 5);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let now = Utc::now();
        let mut session = Session::new("a", now);
        session.touch(now - chrono::Duration::seconds(30));
        assert_eq!(session.last_activity, now);
        session.touch(now + chrono::Duration::seconds(30));
        assert_eq!(session.last_activity, now + chrono::Duration::seconds(30));
    }

    #[test]
    fn test_session_builders() {
        let session = Session::new("a", Utc::now())
            .with_user("u-1")
            .with_payload(serde_json::json!({"turns": 2}));
        assert_eq!(session.user_id.as_deref(), Some("u-1"));
        assert_eq!(session.payload["turns"], 2);
    }
}
