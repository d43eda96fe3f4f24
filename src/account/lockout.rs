//! Account lockout policy.
//!
//! Pure state machine over `(attempt_count, lock_until)`. `is_locked` is the
//! sole authority on lock status; the attempt counter alone never blocks a
//! login. Callers persist the returned state, they never mutate the fields
//! directly.

use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCK_DURATION_SECONDS: i64 = 30 * 60;

/// Lockout fields as read from, and written back to, the credential store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutState {
    pub attempt_count: i32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempt_count: 0,
            lock_until: None,
        }
    }
}

impl Default for LockoutState {
    fn default() -> Self {
        Self::new()
    }
}

/// Policy parameters. Defaults: 5 attempts, 30 minute lock.
#[derive(Clone, Copy, Debug)]
pub struct LockoutPolicy {
    max_attempts: u32,
    lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock_duration: Duration::seconds(DEFAULT_LOCK_DURATION_SECONDS),
        }
    }
}

impl LockoutPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, lock_duration: Duration) -> Self {
        Self {
            max_attempts,
            lock_duration,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn lock_duration(&self) -> Duration {
        self.lock_duration
    }

    /// True iff a lock is set and has not yet passed. An expired lock is
    /// treated as absent even when the field is still physically set.
    #[must_use]
    pub fn is_locked(&self, state: &LockoutState, now: DateTime<Utc>) -> bool {
        state.lock_until.is_some_and(|until| now < until)
    }

    /// Time left on an active lock, `None` when not locked.
    #[must_use]
    pub fn remaining(&self, state: &LockoutState, now: DateTime<Utc>) -> Option<Duration> {
        state
            .lock_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// Account a failed password attempt.
    ///
    /// A stale lock (set, but already expired) means the previous window is
    /// over: the counter restarts at 1 and the lock clears. Otherwise the
    /// counter increments, and crossing `max_attempts` sets the lock once;
    /// the threshold is not re-armed while a lock is already active.
    #[must_use]
    pub fn record_failure(&self, state: &LockoutState, now: DateTime<Utc>) -> LockoutState {
        if let Some(until) = state.lock_until {
            if now >= until {
                return LockoutState {
                    attempt_count: 1,
                    lock_until: None,
                };
            }
        }

        let attempt_count = state.attempt_count.saturating_add(1);
        let mut lock_until = state.lock_until;
        let threshold = i32::try_from(self.max_attempts).unwrap_or(i32::MAX);
        if attempt_count >= threshold && !self.is_locked(state, now) {
            lock_until = Some(now + self.lock_duration);
        }

        LockoutState {
            attempt_count,
            lock_until,
        }
    }

    /// Account a fully completed authentication: counter to zero, lock
    /// cleared. Only called once every required factor has passed.
    #[must_use]
    pub fn record_success(&self) -> LockoutState {
        LockoutState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn fresh_state_is_not_locked() {
        let policy = LockoutPolicy::default();
        assert!(!policy.is_locked(&LockoutState::new(), at(0)));
        assert_eq!(policy.remaining(&LockoutState::new(), at(0)), None);
    }

    #[test]
    fn failures_below_threshold_only_increment() {
        let policy = LockoutPolicy::default();
        let mut state = LockoutState::new();
        for expected in 1..=4 {
            state = policy.record_failure(&state, at(0));
            assert_eq!(state.attempt_count, expected);
            assert_eq!(state.lock_until, None);
            assert!(!policy.is_locked(&state, at(0)));
        }
    }

    #[test]
    fn fifth_failure_locks_for_exactly_lock_duration() {
        let policy = LockoutPolicy::default();
        let mut state = LockoutState {
            attempt_count: 4,
            lock_until: None,
        };
        state = policy.record_failure(&state, at(0));
        assert_eq!(state.attempt_count, 5);
        assert_eq!(state.lock_until, Some(at(30 * 60)));
        assert!(policy.is_locked(&state, at(0)));
        assert!(policy.is_locked(&state, at(30 * 60 - 1)));
        assert!(!policy.is_locked(&state, at(30 * 60)));
    }

    #[test]
    fn remaining_counts_down() {
        let policy = LockoutPolicy::default();
        let state = LockoutState {
            attempt_count: 5,
            lock_until: Some(at(30 * 60)),
        };
        assert_eq!(
            policy.remaining(&state, at(10 * 60)),
            Some(Duration::minutes(20))
        );
    }

    #[test]
    fn stale_lock_resets_to_fresh_window() {
        let policy = LockoutPolicy::default();
        let state = LockoutState {
            attempt_count: 5,
            lock_until: Some(at(30 * 60)),
        };
        // A failure after the lock has passed starts a new window at 1.
        let updated = policy.record_failure(&state, at(30 * 60 + 1));
        assert_eq!(updated.attempt_count, 1);
        assert_eq!(updated.lock_until, None);
    }

    #[test]
    fn lock_is_not_rearmed_while_active() {
        let policy = LockoutPolicy::default();
        let state = LockoutState {
            attempt_count: 5,
            lock_until: Some(at(30 * 60)),
        };
        let updated = policy.record_failure(&state, at(60));
        assert_eq!(updated.attempt_count, 6);
        // Expiry stays where the threshold crossing put it.
        assert_eq!(updated.lock_until, Some(at(30 * 60)));
    }

    #[test]
    fn success_resets_counter_and_lock() {
        let policy = LockoutPolicy::default();
        let state = policy.record_success();
        assert_eq!(state, LockoutState::new());
    }

    #[test]
    fn custom_policy_threshold() {
        let policy = LockoutPolicy::new(2, Duration::minutes(5));
        let mut state = LockoutState::new();
        state = policy.record_failure(&state, at(0));
        assert_eq!(state.lock_until, None);
        state = policy.record_failure(&state, at(0));
        assert_eq!(state.lock_until, Some(at(5 * 60)));
    }
}
