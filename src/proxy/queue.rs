use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

// Serialises upstream calls: at most `max_concurrency` in flight, and no
// two departures closer than `min_interval`. Admission is FIFO (tokio's
// semaphore queues waiters fairly). Dropping the returned permit — on
// completion, failure, or client disconnect — frees the slot.
pub struct DispatchQueue {
    slots: Arc<Semaphore>,
    last_departure: Mutex<Option<Instant>>,
    min_interval: Duration,
    waiting: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
}

pub struct DispatchPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for DispatchPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

struct WaitGuard(Arc<AtomicUsize>);

impl WaitGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct QueueSnapshot {
    pub waiting: usize,
    pub in_flight: usize,
    pub max_concurrency: usize,
    pub min_interval_ms: u64,
}

impl DispatchQueue {
    pub fn new(max_concurrency: usize, min_interval_ms: u64) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrency.max(1))),
            last_departure: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
            waiting: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    // Blocks until a slot is free and the spacing window has elapsed. A
    // caller cancelled while waiting (future dropped) never consumes a slot
    // and never advances the departure clock.
    pub async fn admit(&self) -> DispatchPermit {
        let _waiting = WaitGuard::new(&self.waiting);

        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect("dispatch semaphore is never closed");

        // The pacing lock is held across the sleep so departures serialise.
        let mut last = self.last_departure.lock().await;
        if let Some(previous) = *last {
            let since = previous.elapsed();
            if since < self.min_interval {
                tokio::time::sleep(self.min_interval - since).await;
            }
        }
        *last = Some(Instant::now());
        drop(last);

        self.in_flight.fetch_add(1, Ordering::Relaxed);
        DispatchPermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            waiting: self.waiting.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            max_concurrency: self.slots.available_permits()
                + self.in_flight.load(Ordering::Relaxed),
            min_interval_ms: self.min_interval.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    #[tokio::test]
    async fn permits_release_on_drop() {
        let queue = Arc::new(DispatchQueue::new(1, 0));

        let permit = queue.admit().await;
        assert_eq!(queue.snapshot().in_flight, 1);
        drop(permit);
        assert_eq!(queue.snapshot().in_flight, 0);

        // The slot is reusable after release.
        let _again = queue.admit().await;
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let queue = Arc::new(DispatchQueue::new(3, 0));
        let peak = Arc::new(StdAtomicUsize::new(0));
        let current = Arc::new(StdAtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let queue = queue.clone();
            let peak = peak.clone();
            let current = current.clone();
            handles.push(tokio::spawn(async move {
                let _permit = queue.admit().await;
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn departures_are_spaced_by_minimum_interval() {
        let queue = Arc::new(DispatchQueue::new(3, 50));
        let departures = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let queue = queue.clone();
            let departures = departures.clone();
            handles.push(tokio::spawn(async move {
                let _permit = queue.admit().await;
                departures.lock().await.push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut times = departures.lock().await.clone();
        times.sort();
        for pair in times.windows(2) {
            let gap = pair[1].duration_since(pair[0]);
            // Timer granularity headroom below the configured 50ms.
            assert!(gap >= Duration::from_millis(45), "gap was {:?}", gap);
        }
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_hold_a_slot() {
        let queue = Arc::new(DispatchQueue::new(1, 0));
        let held = queue.admit().await;

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let _p = queue.admit().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.snapshot().waiting, 1);

        waiter.abort();
        let _ = waiter.await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.snapshot().waiting, 0);

        drop(held);
        // The abandoned wait must not have consumed the freed slot.
        let _next = queue.admit().await;
    }
}
