//! Per-domain politeness limiter
//!
//! This module handles:
//! - A concurrency ceiling per target domain, shared by every category of a run
//! - A cooldown each worker slot observes after its request (fixed delay plus
//!   random jitter) before the slot is handed to the next request

use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limits in-flight requests and paces worker slots per domain
#[derive(Debug)]
pub struct DomainLimiter {
    /// Maximum concurrent requests per domain
    max_concurrent: usize,

    /// Fixed part of the slot cooldown
    delay: Duration,

    /// Upper bound of the random part of the slot cooldown
    jitter: Duration,

    /// One semaphore per domain, created on first use
    domains: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// A worker slot for one domain
///
/// Dropping the slot frees it immediately; [`DomainSlot::release`] waits out
/// the cooldown first.
#[derive(Debug)]
pub struct DomainSlot {
    _permit: OwnedSemaphorePermit,
    cooldown: Duration,
}

impl DomainSlot {
    /// The pause this slot observes before it is reused
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Sleeps for the cooldown, then frees the slot
    pub async fn release(self) {
        tokio::time::sleep(self.cooldown).await;
    }
}

impl DomainLimiter {
    /// Creates a new limiter
    ///
    /// # Arguments
    ///
    /// * `max_concurrent` - In-flight request ceiling per domain (at least 1)
    /// * `delay` - Fixed cooldown after each request
    /// * `jitter` - Maximum random cooldown added to `delay`
    pub fn new(max_concurrent: usize, delay: Duration, jitter: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            delay,
            jitter,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for a free slot on `domain`
    ///
    /// Returns `None` only if the domain's semaphore has been closed.
    pub async fn acquire(&self, domain: &str) -> Option<DomainSlot> {
        let semaphore = self.semaphore_for(domain);
        let permit = semaphore.acquire_owned().await.ok()?;

        Some(DomainSlot {
            _permit: permit,
            cooldown: self.next_cooldown(),
        })
    }

    /// Number of slots currently free for `domain`
    pub fn available_slots(&self, domain: &str) -> usize {
        self.semaphore_for(domain).available_permits()
    }

    /// Picks the cooldown for the next slot: `delay + rand(0..=jitter)`
    pub fn next_cooldown(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }

        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.delay + Duration::from_millis(extra)
    }

    fn semaphore_for(&self, domain: &str) -> Arc<Semaphore> {
        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_concurrent)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cooldown_within_bounds() {
        let limiter = DomainLimiter::new(4, Duration::from_millis(100), Duration::from_millis(50));

        for _ in 0..200 {
            let cooldown = limiter.next_cooldown();
            assert!(cooldown >= Duration::from_millis(100));
            assert!(cooldown <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_cooldown_without_jitter_is_fixed() {
        let limiter = DomainLimiter::new(4, Duration::from_millis(250), Duration::ZERO);
        assert_eq!(limiter.next_cooldown(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let limiter = DomainLimiter::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(limiter.available_slots("cookpad.com"), 1);
    }

    #[tokio::test]
    async fn test_slots_are_per_domain() {
        let limiter = DomainLimiter::new(2, Duration::ZERO, Duration::ZERO);

        let _a1 = limiter.acquire("a.example.com").await.unwrap();
        let _a2 = limiter.acquire("a.example.com").await.unwrap();
        assert_eq!(limiter.available_slots("a.example.com"), 0);
        assert_eq!(limiter.available_slots("b.example.com"), 2);
    }

    #[tokio::test]
    async fn test_dropping_slot_frees_it() {
        let limiter = DomainLimiter::new(1, Duration::from_secs(60), Duration::ZERO);

        let slot = limiter.acquire("cookpad.com").await.unwrap();
        assert_eq!(limiter.available_slots("cookpad.com"), 0);
        drop(slot);
        assert_eq!(limiter.available_slots("cookpad.com"), 1);
    }

    #[tokio::test]
    async fn test_release_waits_for_cooldown() {
        let limiter = DomainLimiter::new(1, Duration::from_millis(30), Duration::ZERO);

        let slot = limiter.acquire("cookpad.com").await.unwrap();
        let started = std::time::Instant::now();
        slot.release().await;

        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(limiter.available_slots("cookpad.com"), 1);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_respected() {
        let limiter = Arc::new(DomainLimiter::new(3, Duration::ZERO, Duration::ZERO));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let slot = limiter.acquire("cookpad.com").await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                slot.release().await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.available_slots("cookpad.com"), 3);
    }
}
