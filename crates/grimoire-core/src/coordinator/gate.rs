//! Exclusive engine gate.
//!
//! Serializes all access to the single-flight engine with a soft admission
//! queue, so bursts of concurrent clients degrade into short waits instead
//! of immediate failures. The busy flag is a one-permit semaphore; a permit
//! is released when its [`GatePermit`] drops, which covers every exit path
//! (success, error, client disconnect) exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::debug;

/// Queue capacity used when the multiuser limit is exactly 1, preserving
/// compatibility with older clients that enable queueing without a count
/// (up to 7 requests in flight: one running, six waiting).
const LEGACY_QUEUE_CAPACITY: usize = 6;

/// Outcome of an admission attempt.
///
/// `Rejected` is a first-class outcome, not an error: the caller translates
/// it into a "service busy" response.
#[derive(Debug)]
pub enum Admission {
    Admitted(GatePermit),
    Rejected,
}

/// Exclusive hold on the engine. Dropping it releases the gate.
#[derive(Debug)]
pub struct GatePermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Mutual exclusion plus a bounded wait queue over the engine.
#[derive(Debug)]
pub struct EngineGate {
    busy: Arc<Semaphore>,
    waiting: AtomicUsize,
    capacity: usize,
}

/// A claimed wait-queue slot. Dropping it gives the slot back, so a waiter
/// whose future is cancelled mid-wait still releases its reservation.
#[derive(Debug)]
struct QueueSlot<'a> {
    waiting: &'a AtomicUsize,
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::AcqRel);
    }
}

impl EngineGate {
    /// Build a gate from the configured multiuser limit: 0 disables queueing
    /// entirely, 1 selects the legacy default capacity, N > 1 allows N - 1
    /// waiters.
    #[must_use]
    pub fn new(multiuser_limit: u32) -> Self {
        let capacity = match multiuser_limit {
            0 => 0,
            1 => LEGACY_QUEUE_CAPACITY,
            n => (n - 1) as usize,
        };
        Self {
            busy: Arc::new(Semaphore::new(1)),
            waiting: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Attempt admission.
    ///
    /// With `allow_wait` and spare queue capacity the caller is counted into
    /// the wait queue and blocks until the engine frees up; the queue slot is
    /// given back once admission succeeds, before generation begins — the
    /// slot represents *waiting*, not *running*. Otherwise this degenerates
    /// to a non-blocking try-acquire.
    pub async fn admit(&self, allow_wait: bool) -> Admission {
        if allow_wait {
            if let Some(slot) = self.try_reserve_queue_slot() {
                let acquired = self.busy.clone().acquire_owned().await;
                drop(slot);
                return match acquired {
                    Ok(permit) => Admission::Admitted(GatePermit { _permit: permit }),
                    // The semaphore is never closed; treat it as contention.
                    Err(_) => Admission::Rejected,
                };
            }
        }
        match self.busy.clone().try_acquire_owned() {
            Ok(permit) => Admission::Admitted(GatePermit { _permit: permit }),
            Err(_) => {
                debug!(waiting = self.waiting(), "admission rejected, engine busy");
                Admission::Rejected
            }
        }
    }

    /// Count of requests currently waiting for admission.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    /// True while a generation holds the gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.available_permits() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Atomically claim a queue slot if one is free.
    fn try_reserve_queue_slot(&self) -> Option<QueueSlot<'_>> {
        self.waiting
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < self.capacity).then_some(count + 1)
            })
            .ok()
            .map(|_| QueueSlot {
                waiting: &self.waiting,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn zero_limit_rejects_second_concurrent_request() {
        let gate = EngineGate::new(0);
        let first = gate.admit(true).await;
        assert!(matches!(&first, Admission::Admitted(_)));
        assert!(matches!(gate.admit(true).await, Admission::Rejected));
        drop(first);
        assert!(matches!(gate.admit(true).await, Admission::Admitted(_)));
    }

    #[tokio::test]
    async fn waiter_is_admitted_when_holder_leaves() {
        let gate = Arc::new(EngineGate::new(2));
        let held = gate.admit(true).await;
        let waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.admit(true).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.waiting(), 1);
        drop(held);
        let admitted = waiter.await.expect("waiter task");
        assert!(matches!(admitted, Admission::Admitted(_)));
        assert_eq!(gate.waiting(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_releases_its_queue_slot() {
        // Limit 2 => capacity 1. A waiter whose task dies mid-wait must give
        // the slot back, or queueing stays disabled for everyone after.
        let gate = Arc::new(EngineGate::new(2));
        let held = gate.admit(true).await;
        assert!(matches!(&held, Admission::Admitted(_)));

        let waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.admit(true).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.waiting(), 1);

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(gate.waiting(), 0);

        // The freed slot is usable again.
        let next = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.admit(true).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.waiting(), 1);
        drop(held);
        assert!(matches!(
            next.await.expect("waiter task"),
            Admission::Admitted(_)
        ));
        assert_eq!(gate.waiting(), 0);
    }

    #[tokio::test]
    async fn queue_overflow_is_rejected_not_queued() {
        // Limit 2 => capacity 1: one running, one waiting, third rejected.
        let gate = Arc::new(EngineGate::new(2));
        let held = gate.admit(true).await;
        assert!(matches!(&held, Admission::Admitted(_)));

        let waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.admit(true).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(gate.admit(true).await, Admission::Rejected));

        drop(held);
        assert!(matches!(
            waiter.await.expect("waiter task"),
            Admission::Admitted(_)
        ));
    }

    #[tokio::test]
    async fn legacy_limit_uses_default_capacity() {
        let gate = EngineGate::new(1);
        assert_eq!(gate.capacity(), 6);
        let gate = EngineGate::new(5);
        assert_eq!(gate.capacity(), 4);
    }

    #[tokio::test]
    async fn mutual_exclusion_under_concurrent_attempts() {
        let gate = Arc::new(EngineGate::new(8));
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let gate = Arc::clone(&gate);
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                if let Admission::Admitted(permit) = gate.admit(true).await {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                }
            }));
        }
        for task in tasks {
            task.await.expect("admission task");
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
