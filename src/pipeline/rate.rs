//! Token-bucket pacing for generation requests.
//!
//! Free-tier LLM endpoints cap requests per minute. Every generation attempt
//! takes one ticket from a shared [`RateLimiter`]; tickets refill at
//! `requests_per_interval` per `interval`. The bucket starts with a single
//! ticket, so the first request goes out immediately and, with the defaults
//! (1 per second), no two requests start less than a second apart, however
//! many chunks run concurrently.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// A shared token bucket.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    /// Time to mint one ticket.
    period: Duration,
    state: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tickets: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Allow `requests` acquisitions per `interval` on average.
    ///
    /// `requests` is clamped to at least 1. A zero `interval` disables pacing.
    pub fn new(requests: u32, interval: Duration) -> Self {
        let capacity = requests.max(1);
        Self {
            capacity,
            period: interval / capacity,
            state: Mutex::new(Bucket {
                tickets: 1.0,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.period.is_zero()
    }

    /// Wait until a ticket is available, then take it.
    ///
    /// Waiters are served in FIFO order: the bucket lock is held while
    /// sleeping, so no later caller can jump the queue.
    pub async fn acquire(&self) {
        if self.is_unlimited() {
            return;
        }

        let mut bucket = self.state.lock().await;
        self.refill(&mut bucket);

        if bucket.tickets < 1.0 {
            let missing = 1.0 - bucket.tickets;
            let wait = self.period.mul_f64(missing);
            debug!("Rate limiter: waiting {:?} for next ticket", wait);
            sleep_until(Instant::now() + wait).await;
            self.refill(&mut bucket);
            // Rounding can leave us a hair short; the sleep already paid for it.
            bucket.tickets = bucket.tickets.max(1.0);
        }

        bucket.tickets -= 1.0;
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);
        let minted = elapsed.as_secs_f64() / self.period.as_secs_f64();
        bucket.tickets = (bucket.tickets + minted).min(self.capacity as f64);
        bucket.last_refill = now;
    }
}
