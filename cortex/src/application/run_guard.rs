// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run-level serialization primitives shared by the stores and the generator.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// At most one whole-store run (generation, dedup, compression, maintenance)
/// holds this at a time. Cloning shares the same lock.
#[derive(Clone, Default)]
pub struct RunGuard {
    lock: Arc<AsyncMutex<()>>,
}

/// Held for the duration of a run; dropping it lets the next run in.
pub struct RunPermit {
    _guard: OwnedMutexGuard<()>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for any active run to finish, then start ours.
    pub async fn acquire(&self) -> RunPermit {
        RunPermit {
            _guard: self.lock.clone().lock_owned().await,
        }
    }

    /// Start a run only if none is active.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.lock
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| RunPermit { _guard: guard })
    }

    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// "Last run started" timestamp. The slot covers runs in this process; the
/// caller passes the start persisted in the store so separate processes
/// share one window. Triggers inside the window are rejected, never queued.
#[derive(Debug)]
pub struct Cooldown {
    window: Duration,
    last_start: Mutex<Option<DateTime<Utc>>>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_start: Mutex::new(None),
        }
    }

    /// Record a run start at `now`, or return the time left in the window.
    pub fn try_begin(&self, persisted: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<(), Duration> {
        let mut last_start = self.last_start.lock();
        let latest = match (*last_start, persisted) {
            (Some(local), Some(stored)) => Some(local.max(stored)),
            (local, stored) => local.or(stored),
        };
        if let Some(remaining) = latest.and_then(|started| self.remaining(started, now)) {
            return Err(remaining);
        }
        *last_start = Some(now);
        Ok(())
    }

    pub fn reset(&self) {
        *self.last_start.lock() = None;
    }

    fn remaining(&self, started: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        if self.window.is_zero() {
            return None;
        }
        match (now - started).to_std() {
            Ok(elapsed) if elapsed < self.window => Some(self.window - elapsed),
            Ok(_) => None,
            // Start recorded ahead of our clock: hold the full window unless
            // the skew is larger than the window itself.
            Err(_) => match (started - now).to_std() {
                Ok(ahead) if ahead <= self.window => Some(self.window),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_guard_serializes() {
        let guard = RunGuard::new();
        let permit = guard.acquire().await;
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.clone().try_acquire().is_some());
    }

    #[test]
    fn test_cooldown_rejects_inside_window() {
        let cooldown = Cooldown::new(Duration::from_secs(60));
        let now = Utc::now();
        assert!(cooldown.try_begin(None, now).is_ok());
        let remaining = cooldown
            .try_begin(None, now + chrono::Duration::seconds(5))
            .unwrap_err();
        assert_eq!(remaining, Duration::from_secs(55));

        cooldown.reset();
        assert!(cooldown.try_begin(None, now + chrono::Duration::seconds(6)).is_ok());
    }

    #[test]
    fn test_persisted_start_blocks_fresh_instance() {
        let now = Utc::now();
        let cooldown = Cooldown::new(Duration::from_secs(30));
        let remaining = cooldown
            .try_begin(Some(now - chrono::Duration::seconds(10)), now)
            .unwrap_err();
        assert_eq!(remaining, Duration::from_secs(20));

        assert!(cooldown
            .try_begin(Some(now - chrono::Duration::seconds(31)), now)
            .is_ok());
    }

    #[test]
    fn test_future_start_beyond_window_is_ignored() {
        let now = Utc::now();
        let cooldown = Cooldown::new(Duration::from_secs(30));
        assert_eq!(
            cooldown.try_begin(Some(now + chrono::Duration::seconds(5)), now),
            Err(Duration::from_secs(30))
        );
        assert!(cooldown
            .try_begin(Some(now + chrono::Duration::hours(2)), now)
            .is_ok());
    }

    #[test]
    fn test_zero_window_never_blocks() {
        let cooldown = Cooldown::new(Duration::ZERO);
        let now = Utc::now();
        assert!(cooldown.try_begin(None, now).is_ok());
        assert!(cooldown.try_begin(Some(now), now).is_ok());
    }
}
