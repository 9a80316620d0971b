//! Admission primitives gating raw input before it becomes commands.
//!
//! Two policies, selected per input class by the dispatcher:
//!
//! - [`Debounce`] for discrete buttons: minimum spacing between presses.
//! - [`TokenBucket`] for repeat-capable classes (held volume buttons):
//!   bursts are allowed up to the bucket capacity, then capped at the
//!   refill rate.
//!
//! Both use the tokio clock, so paused-time tests can drive them
//! deterministically.

use std::time::Duration;

use tokio::time::Instant;

/// Minimum-spacing admission with cool-down semantics.
///
/// Every call moves the reference point to "now", admitted or not. A burst
/// of rapid presses therefore keeps pushing its own deadline out instead of
/// sliding through after `min_interval` from the first press.
#[derive(Debug)]
pub struct Debounce {
    min_interval: Duration,
    last_check: Option<Instant>,
}

impl Debounce {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_check: None,
        }
    }

    /// Returns true when the call is admitted. The first call after
    /// startup is always admitted.
    pub fn admit(&mut self) -> bool {
        let now = Instant::now();
        let admitted = match self.last_check {
            None => true,
            Some(previous) => now - previous > self.min_interval,
        };
        self.last_check = Some(now);
        admitted
    }
}

/// Continuous-refill token bucket.
///
/// Refills at `capacity / refill_period` tokens per second, capped at
/// `capacity`. Admission deducts one token; rejection deducts nothing but
/// still advances the refill reference point.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_period: Duration,
    fill: f64,
    last_check: Instant,
}

impl TokenBucket {
    /// A fresh bucket starts full, so a burst of `capacity` presses is
    /// admitted before the refill rate takes over.
    pub fn new(capacity: u32, refill_period: Duration) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_period,
            fill: f64::from(capacity),
            last_check: Instant::now(),
        }
    }

    pub fn admit(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now - self.last_check;
        self.last_check = now;

        let rate = self.capacity / self.refill_period.as_secs_f64();
        self.fill = (self.fill + elapsed.as_secs_f64() * rate).min(self.capacity);

        if self.fill < 1.0 {
            return false;
        }
        self.fill -= 1.0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bucket_admits_then_rejects_back_to_back_calls() {
        let mut bucket = TokenBucket::new(1, Duration::from_millis(175));
        assert!(bucket.admit());
        assert!(!bucket.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_readmits_after_one_refill_period() {
        let mut bucket = TokenBucket::new(1, Duration::from_millis(175));
        assert!(bucket.admit());
        tokio::time::advance(Duration::from_millis(176)).await;
        assert!(bucket.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_allows_burst_up_to_capacity() {
        let mut bucket = TokenBucket::new(3, Duration::from_millis(525));
        assert!(bucket.admit());
        assert!(bucket.admit());
        assert!(bucket.admit());
        assert!(!bucket.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_rejection_does_not_deduct() {
        let mut bucket = TokenBucket::new(1, Duration::from_millis(100));
        assert!(bucket.admit());
        // Half a refill accumulates across rejected checks and is not
        // consumed by them.
        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(!bucket.admit());
        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(bucket.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_admits_first_call() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        assert!(debounce.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_enforces_minimum_spacing() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        assert!(debounce.admit());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!debounce.admit());
        tokio::time::advance(Duration::from_millis(301)).await;
        assert!(debounce.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_rejected_calls_push_the_deadline_out() {
        let mut debounce = Debounce::new(Duration::from_millis(300));
        assert!(debounce.admit());
        // 200ms spacing keeps every press inside the interval measured
        // from the previous press, admitted or not.
        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(200)).await;
            assert!(!debounce.admit());
        }
        tokio::time::advance(Duration::from_millis(301)).await;
        assert!(debounce.admit());
    }
}
