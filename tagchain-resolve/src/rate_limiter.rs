//! Per-service rate limiter
//!
//! Callers enqueue a oneshot sender and wait on the receiver. A single drain
//! task per limiter pops the queue head once at least `interval` has passed
//! since the previous grant, so concurrent callers are released one at a
//! time in arrival order.
//!
//! A caller that stops waiting drops its receiver; the drain task skips it
//! without spending a slot.
//!
//! If the drain task itself is dropped mid-flight (its runtime shut down),
//! it resets the limiter and drops every queued sender. Live waiters see
//! their receiver close and queue again, starting a fresh drain.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// FIFO rate limiter for one upstream service
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    service: &'static str,
    interval: Duration,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    last_granted: Option<Instant>,
    waiters: VecDeque<oneshot::Sender<()>>,
    draining: bool,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        // Every mutation is a single push/pop/assignment; poison is harmless
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RateLimiter {
    /// Limiter allowing one grant per `interval`
    pub fn new(service: &'static str, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                interval,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn service(&self) -> &'static str {
        self.inner.service
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Number of callers currently queued
    pub fn queued(&self) -> usize {
        self.inner.lock_state().waiters.len()
    }

    /// Wait until it is this caller's turn to contact the service
    pub async fn wait_for_slot(&self) {
        loop {
            let (tx, rx) = oneshot::channel();

            let start_drain = {
                let mut state = self.inner.lock_state();
                state.waiters.push_back(tx);
                !std::mem::replace(&mut state.draining, true)
            };

            if start_drain {
                tokio::spawn(drain(Arc::clone(&self.inner)));
            }

            if rx.await.is_ok() {
                return;
            }
            warn!(service = self.inner.service, "Rate limiter drain stopped, queueing again");
        }
    }
}

/// Resets the limiter if the drain task is dropped before it finishes
struct DrainGuard {
    inner: Arc<Inner>,
    armed: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.inner.lock_state();
            state.draining = false;
            state.waiters.clear();
        }
    }
}

/// Grant queued waiters one per interval until the queue is empty
async fn drain(inner: Arc<Inner>) {
    let mut guard = DrainGuard {
        inner: Arc::clone(&inner),
        armed: true,
    };

    loop {
        let remaining = {
            let mut state = inner.lock_state();
            if state.waiters.is_empty() {
                state.draining = false;
                guard.armed = false;
                return;
            }

            let now = Instant::now();
            let remaining = state
                .last_granted
                .map(|last| inner.interval.saturating_sub(now.duration_since(last)))
                .unwrap_or(Duration::ZERO);

            if remaining.is_zero() {
                while let Some(waiter) = state.waiters.pop_front() {
                    if waiter.send(()).is_ok() {
                        state.last_granted = Some(now);
                        break;
                    }
                    debug!(service = inner.service, "Skipping abandoned rate limit waiter");
                }
                continue;
            }

            remaining
        };

        debug!(
            service = inner.service,
            wait_ms = remaining.as_millis() as u64,
            queued = inner.lock_state().waiters.len(),
            "Rate limiting: waiting for next slot"
        );
        tokio::time::sleep(remaining).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new("AcoustID", Duration::from_millis(334));
        assert_eq!(limiter.interval(), Duration::from_millis(334));
        assert_eq!(limiter.service(), "AcoustID");
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test]
    async fn test_first_grant_is_immediate() {
        let limiter = RateLimiter::new("test", Duration::from_millis(500));
        let start = Instant::now();
        limiter.wait_for_slot().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_sequential_grants_are_spaced() {
        let limiter = RateLimiter::new("test", Duration::from_millis(100));

        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait_for_slot().await;
        }
        let elapsed = start.elapsed();

        // Two full intervals between three grants
        assert!(elapsed >= Duration::from_millis(195), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(600), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_idle_limiter_restarts_drain() {
        let limiter = RateLimiter::new("test", Duration::from_millis(20));
        limiter.wait_for_slot().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let start = Instant::now();
        limiter.wait_for_slot().await;
        assert!(start.elapsed() < Duration::from_millis(15));
        assert_eq!(limiter.queued(), 0);
    }
}
