//! Background staleness sweep for the session store

use super::SessionStore;
use crate::config::SessionConfig;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Periodic `cleanup_stale` driver
///
/// Runs on a fixed period independent of request traffic until stopped.
pub struct StaleSweeper;

impl StaleSweeper {
    /// Spawn the sweep task on the current tokio runtime
    ///
    /// The first sweep happens one full `period` after start.
    ///
    /// # Arguments
    ///
    /// * `store` - Shared session store to sweep
    /// * `period` - Time between sweeps
    /// * `max_age` - Idle age after which a session is removed
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use clonar::session::{SessionCache, SessionStore, StaleSweeper};
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let store = SessionStore::new(SessionCache::new(1000));
    /// let sweeper = StaleSweeper::start(store, Duration::from_secs(600), Duration::from_secs(3600));
    /// sweeper.stop();
    /// sweeper.join().await;
    /// # }
    /// ```
    pub fn start(store: SessionStore, period: Duration, max_age: Duration) -> SweeperHandle {
        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                sweeper.event = "start",
                period_secs = period.as_secs(),
                max_age_secs = max_age.as_secs(),
                "Session sweeper started"
            );

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.cleanup_stale(max_age);
                        tracing::debug!(
                            sweeper.event = "sweep",
                            removed,
                            remaining = store.size(),
                            "Session sweep complete"
                        );
                    }
                }
            }

            tracing::info!(sweeper.event = "stop", "Session sweeper stopped");
        });

        SweeperHandle {
            token,
            task: Some(task),
        }
    }
}

impl StaleSweeper {
    /// Spawn the sweep task with the configured period and idle age
    pub fn from_config(store: SessionStore, config: &SessionConfig) -> SweeperHandle {
        Self::start(store, config.sweep_interval(), config.ttl())
    }
}

/// Handle to a running [`StaleSweeper`]
pub struct SweeperHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal the sweep task to stop after its current iteration
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Returns true until the sweep task has exited
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the sweep task to exit
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Session sweeper task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Clock, ManualClock, Session, SessionCache};
    use std::sync::Arc;

    fn store_with_clock() -> (SessionStore, ManualClock) {
        let clock = ManualClock::default();
        let cache = SessionCache::with_clock(10, Arc::new(clock.clone()));
        (SessionStore::new(cache), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_stale_sessions_each_period() {
        let (store, clock) = store_with_clock();
        store.set("old", Session::new("old", clock.now()));

        let period = Duration::from_secs(600);
        let handle = StaleSweeper::start(store.clone(), period, Duration::from_secs(3600));

        clock.advance(Duration::from_secs(2 * 3600));
        store.set("fresh", Session::new("fresh", clock.now()));

        tokio::time::sleep(period + Duration::from_millis(10)).await;

        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_waits_a_full_period_before_first_sweep() {
        let (store, clock) = store_with_clock();
        store.set("a", Session::new("a", clock.now()));
        clock.advance(Duration::from_secs(2 * 3600));

        let period = Duration::from_secs(600);
        let handle = StaleSweeper::start(store.clone(), period, Duration::from_secs(3600));

        tokio::time::sleep(period / 2).await;
        assert_eq!(store.size(), 1);

        tokio::time::sleep(period).await;
        assert_eq!(store.size(), 0);

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config_uses_configured_ttl_and_interval() {
        let clock = ManualClock::default();
        let config = SessionConfig {
            capacity: 10,
            ttl_seconds: 120,
            sweep_interval_seconds: 30,
        };
        let store = SessionStore::from_config(&config, Arc::new(clock.clone()));
        store.set("idle", Session::new("idle", clock.now()));
        clock.advance(Duration::from_secs(60));
        store.set("recent", Session::new("recent", clock.now()));

        let handle = StaleSweeper::from_config(store.clone(), &config);

        // Idle for 90s: under the ttl at the first sweep
        clock.advance(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.size(), 2);

        // Idle for 150s at the second sweep
        clock.advance(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.get("idle").is_none());
        assert!(store.get("recent").is_some());

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_sweeper_no_longer_sweeps() {
        let (store, clock) = store_with_clock();
        let period = Duration::from_secs(60);
        let handle = StaleSweeper::start(store.clone(), period, Duration::from_secs(60));

        handle.stop();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!handle.is_running());

        store.set("a", Session::new("a", clock.now()));
        clock.advance(Duration::from_secs(3600));
        tokio::time::sleep(period * 3).await;

        assert_eq!(store.size(), 1);
        handle.join().await;
    }
}
