//! Cancellation tracker.
//!
//! Clients may cancel either the currently-running job or a job still
//! waiting for admission. Cancelling a waiting job cannot reach the engine
//! (nothing is running for it yet), so the key is remembered as a *deferred
//! abort* and applied immediately before that job would begin generating.
//!
//! Only one deferred key is remembered at a time; a second deferred abort
//! overwrites the first (last-wins). This is an accepted limitation of the
//! protocol, not something to mask.

use std::sync::Mutex;

use tracing::info;

use crate::domain::GenKey;
use crate::ports::TextEngine;

/// Outcome of an abort request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOutcome {
    /// An abort was forwarded to the engine immediately.
    /// `hit` reports whether anything was actually running.
    Accepted { hit: bool },
    /// The key belongs to a queued job; remembered for later.
    Deferred,
    /// The key matched nothing cancellable.
    Rejected,
}

/// Tracks the current generation key and at most one pending abort key.
#[derive(Debug, Default)]
pub struct CancelTracker {
    current: Mutex<GenKey>,
    pending_abort: Mutex<GenKey>,
}

impl CancelTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the key of the job about to generate. Called exactly once per
    /// admitted job, before the blocking engine call begins; overwrites the
    /// previous current key.
    pub fn record_current(&self, genkey: &GenKey) {
        *self.lock_current() = genkey.clone();
    }

    /// The key of the job currently holding the engine.
    #[must_use]
    pub fn current(&self) -> GenKey {
        self.lock_current().clone()
    }

    /// Handle an out-of-band abort request.
    ///
    /// `queued` is the number of requests currently waiting for admission;
    /// it decides whether a non-matching key can plausibly refer to a queued
    /// job (deferred) or refers to nothing (rejected).
    pub fn abort(&self, genkey: &GenKey, queued: usize, engine: &dyn TextEngine) -> AbortOutcome {
        let current = self.current();
        if (genkey.is_none() && queued == 0) || (!genkey.is_none() && *genkey == current) {
            let hit = engine.abort();
            info!(genkey = %genkey, hit, "generation abort issued");
            return AbortOutcome::Accepted { hit };
        }
        if !genkey.is_none() && queued > 0 {
            // Last-wins: a newer deferred abort replaces an unconsumed one.
            *self.lock_pending() = genkey.clone();
            info!(genkey = %genkey, "abort deferred for queued request");
            return AbortOutcome::Deferred;
        }
        AbortOutcome::Rejected
    }

    /// Consume the pending abort key if it matches `genkey`.
    ///
    /// Checked immediately before a queued job would begin generating; a
    /// match means the job is skipped without ever calling the engine, and
    /// the key is cleared exactly once.
    pub fn take_deferred(&self, genkey: &GenKey) -> bool {
        if genkey.is_none() {
            return false;
        }
        let mut pending = self.lock_pending();
        if *pending == *genkey {
            info!(genkey = %genkey, "deferred abort consumed, skipping generation");
            *pending = GenKey::none();
            true
        } else {
            false
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, GenKey> {
        self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, GenKey> {
        self.pending_abort
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::text_engine::MockTextEngine;

    #[test]
    fn abort_of_current_key_reaches_engine_once() {
        let tracker = CancelTracker::new();
        tracker.record_current(&GenKey::from("job-1"));

        let mut engine = MockTextEngine::new();
        engine.expect_abort().times(1).return_const(true);

        let outcome = tracker.abort(&GenKey::from("job-1"), 3, &engine);
        assert_eq!(outcome, AbortOutcome::Accepted { hit: true });
    }

    #[test]
    fn legacy_empty_key_aborts_only_when_queue_is_empty() {
        let tracker = CancelTracker::new();
        let mut engine = MockTextEngine::new();
        engine.expect_abort().times(1).return_const(false);

        assert_eq!(
            tracker.abort(&GenKey::none(), 0, &engine),
            AbortOutcome::Accepted { hit: false }
        );
        assert_eq!(
            tracker.abort(&GenKey::none(), 2, &engine),
            AbortOutcome::Rejected
        );
    }

    #[test]
    fn queued_key_is_deferred_and_consumed_exactly_once() {
        let tracker = CancelTracker::new();
        tracker.record_current(&GenKey::from("running"));
        let engine = MockTextEngine::new();

        let outcome = tracker.abort(&GenKey::from("queued"), 1, &engine);
        assert_eq!(outcome, AbortOutcome::Deferred);

        assert!(!tracker.take_deferred(&GenKey::from("other")));
        assert!(tracker.take_deferred(&GenKey::from("queued")));
        assert!(!tracker.take_deferred(&GenKey::from("queued")));
    }

    #[test]
    fn second_deferred_abort_overwrites_the_first() {
        let tracker = CancelTracker::new();
        tracker.record_current(&GenKey::from("running"));
        let engine = MockTextEngine::new();

        tracker.abort(&GenKey::from("first"), 2, &engine);
        tracker.abort(&GenKey::from("second"), 2, &engine);

        assert!(!tracker.take_deferred(&GenKey::from("first")));
        assert!(tracker.take_deferred(&GenKey::from("second")));
    }

    #[test]
    fn unknown_key_with_empty_queue_is_rejected() {
        let tracker = CancelTracker::new();
        tracker.record_current(&GenKey::from("running"));
        let engine = MockTextEngine::new();

        assert_eq!(
            tracker.abort(&GenKey::from("stranger"), 0, &engine),
            AbortOutcome::Rejected
        );
    }
}
