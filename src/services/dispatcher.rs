//! Generation request dispatch.
//!
//! Inference shares one scarce resource (in the observed deployment, a
//! single accelerator). The dispatcher puts a hard upper bound on
//! concurrent executions no matter how many requests are concurrently
//! authorized: each generation must hold an execution slot, requests beyond
//! the limit wait in a bounded queue for a bounded time, and anything past
//! that receives an explicit busy signal instead of hanging. The slot is an
//! RAII guard, so it is released unconditionally on completion, failure, or
//! a caller abandoning the request.

use crate::error::AppError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds concurrent inference executions.
///
/// Overload policy: queue with a bounded wait. A request first tries to
/// take a slot immediately, then joins the waiting queue if there is room
/// (`max_waiting`, 0 = unlimited), and waits up to `max_wait` for a slot.
/// A full queue or an expired wait both surface as `AppError::Busy`.
#[derive(Debug)]
pub struct GenerationDispatcher {
    /// Semaphore holding the execution slots
    slots: Arc<Semaphore>,
    /// Current number of requests waiting for a slot
    waiting_count: AtomicUsize,
    /// Maximum allowed waiting requests (None = unlimited)
    max_waiting: Option<usize>,
    /// Maximum time to wait for a slot
    max_wait: Duration,
}

impl GenerationDispatcher {
    /// Create a dispatcher with `max_concurrent` execution slots.
    ///
    /// A `max_concurrent` of 0 is clamped to 1: the dispatcher exists to
    /// bound the resource, not to disable it. `max_waiting` of 0 means an
    /// unlimited waiting queue.
    pub fn new(max_concurrent: usize, max_waiting: usize, max_wait: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            waiting_count: AtomicUsize::new(0),
            max_waiting: if max_waiting == 0 {
                None
            } else {
                Some(max_waiting)
            },
            max_wait,
        }
    }

    /// Acquire an execution slot using the configured wait budget.
    pub async fn acquire(&self) -> Result<ExecutionSlot, AppError> {
        self.acquire_within(self.max_wait).await
    }

    /// Acquire an execution slot, waiting at most `max_wait`.
    ///
    /// Returns `Ok(ExecutionSlot)` if a slot is free or becomes free within
    /// the wait budget. Returns `Err(Busy)` if the waiting queue is full or
    /// the budget expires first. A caller that drops the future while
    /// waiting leaves the queue without side effects; a caller that drops
    /// the returned slot frees it.
    pub async fn acquire_within(&self, max_wait: Duration) -> Result<ExecutionSlot, AppError> {
        // Fast path: a slot is free right now
        if let Ok(permit) = self.slots.clone().try_acquire_owned() {
            return Ok(ExecutionSlot { _permit: permit });
        }

        // Join the waiting queue. The guard decrements on drop, which also
        // covers a caller abandoning this future mid-wait.
        let position = WaitingGuard::join(&self.waiting_count);
        if let Some(max_waiting) = self.max_waiting
            && position.joined_at >= max_waiting
        {
            return Err(AppError::Busy(
                "Generation queue is full. Please retry later.".to_string(),
            ));
        }

        // A slot may have freed between the first try and joining the
        // queue; take it without waiting if so
        if let Ok(permit) = self.slots.clone().try_acquire_owned() {
            return Ok(ExecutionSlot { _permit: permit });
        }

        if max_wait.is_zero() {
            // Zero budget: reject rather than wait
            return Err(AppError::Busy(
                "Generation in progress. Please retry later.".to_string(),
            ));
        }

        match tokio::time::timeout(max_wait, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(ExecutionSlot { _permit: permit }),
            Ok(Err(_)) => {
                // Semaphore closed (shouldn't happen in normal operation)
                Err(AppError::Busy(
                    "Generation service temporarily unavailable.".to_string(),
                ))
            }
            Err(_) => Err(AppError::Busy(
                "Timed out waiting for a generation slot. Please retry later.".to_string(),
            )),
        }
    }
}

/// Occupies one waiting-queue position for as long as it lives.
///
/// Dropping the guard leaves the queue, whether the wait ended in a slot,
/// a timeout, or the caller abandoning the request.
struct WaitingGuard<'a> {
    count: &'a AtomicUsize,
    /// Number of requests that were already waiting when this one joined
    joined_at: usize,
}

impl<'a> WaitingGuard<'a> {
    fn join(count: &'a AtomicUsize) -> Self {
        let joined_at = count.fetch_add(1, Ordering::SeqCst);
        Self { count, joined_at }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// RAII guard for one inference execution.
///
/// Holds an owned permit so it can live across await points and move into
/// the blocking inference task; dropping it frees the slot.
#[must_use]
pub struct ExecutionSlot {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_message(result: Result<ExecutionSlot, AppError>) -> String {
        match result {
            Err(AppError::Busy(message)) => message,
            Ok(_) => panic!("expected Busy, got a slot"),
            Err(other) => panic!("expected Busy, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn acquires_up_to_the_limit() {
        let dispatcher = GenerationDispatcher::new(2, 8, Duration::from_secs(5));

        let slot1 = dispatcher.acquire().await;
        assert!(slot1.is_ok());

        let slot2 = dispatcher.acquire().await;
        assert!(slot2.is_ok());
    }

    #[tokio::test]
    async fn second_request_queues_then_runs() {
        let dispatcher = Arc::new(GenerationDispatcher::new(1, 8, Duration::from_secs(5)));

        let slot1 = dispatcher.acquire().await.unwrap();

        let waiter = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.acquire().await })
        };

        // Give time for the waiter to start waiting
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(slot1);

        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn full_queue_is_rejected_immediately() {
        let dispatcher = Arc::new(GenerationDispatcher::new(1, 1, Duration::from_secs(60)));

        let _slot = dispatcher.acquire().await.unwrap();

        // First waiter occupies the only queue position
        let _waiter = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let message = busy_message(dispatcher.acquire().await);
        assert!(message.contains("queue is full"));
    }

    #[tokio::test]
    async fn wait_budget_expires_into_busy() {
        let dispatcher = GenerationDispatcher::new(1, 8, Duration::from_millis(200));

        let _slot = dispatcher.acquire().await.unwrap();

        let start = std::time::Instant::now();
        let message = busy_message(dispatcher.acquire().await);
        assert!(message.contains("Timed out"));
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn caller_supplied_budget_overrides_the_default() {
        let dispatcher = GenerationDispatcher::new(1, 8, Duration::from_secs(60));

        let _slot = dispatcher.acquire().await.unwrap();

        let start = std::time::Instant::now();
        let message = busy_message(dispatcher.acquire_within(Duration::from_millis(100)).await);
        assert!(message.contains("Timed out"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_wait_rejects_without_waiting() {
        let dispatcher = GenerationDispatcher::new(1, 8, Duration::ZERO);

        let _slot = dispatcher.acquire().await.unwrap();

        let start = std::time::Instant::now();
        let message = busy_message(dispatcher.acquire().await);
        assert!(message.contains("in progress"));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn dropping_the_slot_frees_it() {
        let dispatcher = GenerationDispatcher::new(1, 8, Duration::from_millis(100));

        {
            let _slot = dispatcher.acquire().await.unwrap();
        }

        assert!(dispatcher.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn abandoned_waiter_leaves_the_queue() {
        let dispatcher = Arc::new(GenerationDispatcher::new(1, 1, Duration::from_secs(60)));

        let slot = dispatcher.acquire().await.unwrap();

        // Waiter takes the single queue position, then is abandoned
        let waiter = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        waiter.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Queue position is free again for a new waiter
        let second = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(slot);

        assert!(second.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped_to_one() {
        let dispatcher = GenerationDispatcher::new(0, 8, Duration::from_secs(1));
        assert!(dispatcher.acquire().await.is_ok());
    }
}
