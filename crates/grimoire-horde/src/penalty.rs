//! Failure and reward accounting for the embedded worker.
//!
//! Cluster failures accumulate; every fifth one escalates the exit level and
//! pauses the worker for an exponentially growing interval. Sustained
//! success slowly walks the level back down, but never below one once it has
//! escalated. Level ten is terminal.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

/// Failures tolerated before an escalation.
const PUNISH_THRESHOLD: u32 = 5;

/// Successful submits needed to walk the exit level down one step.
const REWARD_THRESHOLD: u32 = 50;

/// Exit level at which the worker shuts down for good.
pub const EXIT_CEILING: i64 = 10;

/// What the main loop should do after checking accumulated failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Keep going.
    Proceed,
    /// Pause for the given interval, then resume.
    Pause(Duration),
    /// Terminal; stop the worker.
    Shutdown,
}

/// Shared penalty counters. The submit tasks record outcomes concurrently
/// with the main loop, so everything is atomic.
#[derive(Debug)]
pub struct PenaltyState {
    punish: AtomicU32,
    reward: AtomicU32,
    /// Shared with the HTTP layer, which surfaces it on the perf endpoint.
    exit_level: Arc<AtomicI64>,
}

impl PenaltyState {
    #[must_use]
    pub fn new(exit_level: Arc<AtomicI64>) -> Self {
        exit_level.store(0, Ordering::Relaxed);
        Self {
            punish: AtomicU32::new(0),
            reward: AtomicU32::new(0),
            exit_level,
        }
    }

    /// A cluster call failed (pop or submit).
    pub fn record_failure(&self) {
        self.punish.fetch_add(1, Ordering::Relaxed);
    }

    /// A job was submitted and rewarded. Enough of these in a row undo one
    /// escalation step, but the level never drops back to zero.
    pub fn record_reward(&self) {
        let rewards = self.reward.fetch_add(1, Ordering::Relaxed) + 1;
        if rewards > REWARD_THRESHOLD {
            self.reward.store(0, Ordering::Relaxed);
            let _ = self
                .exit_level
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |level| {
                    (level > 1).then_some(level - 1)
                });
        }
    }

    /// Consume accumulated failures and decide how to continue.
    pub fn escalate_if_needed(&self) -> Escalation {
        if self.punish.load(Ordering::Relaxed) < PUNISH_THRESHOLD {
            return Escalation::Proceed;
        }
        self.punish.store(0, Ordering::Relaxed);
        let level = self.exit_level.fetch_add(1, Ordering::Relaxed) + 1;
        if level < EXIT_CEILING {
            // 2^level minutes: 2, 4, 8, ... capped by the ceiling check.
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let minutes = 1u64 << (level as u32).min(62);
            Escalation::Pause(Duration::from_secs(60 * minutes))
        } else {
            Escalation::Shutdown
        }
    }

    #[must_use]
    pub fn exit_level(&self) -> i64 {
        self.exit_level.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exit_level() >= EXIT_CEILING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> PenaltyState {
        PenaltyState::new(Arc::new(AtomicI64::new(0)))
    }

    #[test]
    fn five_failures_pause_for_two_minutes() {
        let penalties = fresh();
        for _ in 0..4 {
            penalties.record_failure();
            assert_eq!(penalties.escalate_if_needed(), Escalation::Proceed);
        }
        penalties.record_failure();
        assert_eq!(
            penalties.escalate_if_needed(),
            Escalation::Pause(Duration::from_secs(120))
        );
        assert_eq!(penalties.exit_level(), 1);
    }

    #[test]
    fn pause_doubles_with_each_escalation() {
        let penalties = fresh();
        for _ in 0..PUNISH_THRESHOLD {
            penalties.record_failure();
        }
        assert_eq!(
            penalties.escalate_if_needed(),
            Escalation::Pause(Duration::from_secs(120))
        );
        for _ in 0..PUNISH_THRESHOLD {
            penalties.record_failure();
        }
        assert_eq!(
            penalties.escalate_if_needed(),
            Escalation::Pause(Duration::from_secs(240))
        );
    }

    #[test]
    fn tenth_escalation_is_terminal() {
        let penalties = fresh();
        for round in 0..10 {
            for _ in 0..PUNISH_THRESHOLD {
                penalties.record_failure();
            }
            let escalation = penalties.escalate_if_needed();
            if round < 9 {
                assert!(matches!(escalation, Escalation::Pause(_)));
            } else {
                assert_eq!(escalation, Escalation::Shutdown);
            }
        }
        assert!(penalties.is_exhausted());
    }

    #[test]
    fn sustained_success_walks_the_level_down_to_one() {
        let penalties = fresh();
        // Escalate twice.
        for _ in 0..2 {
            for _ in 0..PUNISH_THRESHOLD {
                penalties.record_failure();
            }
            penalties.escalate_if_needed();
        }
        assert_eq!(penalties.exit_level(), 2);

        for _ in 0..=REWARD_THRESHOLD {
            penalties.record_reward();
        }
        assert_eq!(penalties.exit_level(), 1);

        // A second streak cannot drop below one.
        for _ in 0..=REWARD_THRESHOLD {
            penalties.record_reward();
        }
        assert_eq!(penalties.exit_level(), 1);
    }
}
