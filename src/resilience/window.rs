//! Rolling success/failure counts over a bucketed time window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: Instant,
    successes: u64,
    failures: u64,
}

/// Health counts for the most recent `window`.
#[derive(Debug)]
pub struct RollingWindow {
    buckets: VecDeque<Bucket>,
    bucket_width: Duration,
    window: Duration,
}

/// Snapshot of the window totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthCounts {
    pub successes: u64,
    pub failures: u64,
}

impl HealthCounts {
    pub fn total(&self) -> u64 {
        self.successes + self.failures
    }

    /// Failure share as a whole percentage (0 when empty).
    pub fn error_percent(&self) -> u64 {
        match self.total() {
            0 => 0,
            total => self.failures * 100 / total,
        }
    }
}

impl RollingWindow {
    pub fn new(window: Duration, buckets: u32) -> Self {
        let buckets = buckets.max(1);
        Self {
            buckets: VecDeque::with_capacity(buckets as usize),
            bucket_width: window / buckets,
            window,
        }
    }

    pub fn record_success(&mut self) {
        self.current().successes += 1;
    }

    pub fn record_failure(&mut self) {
        self.current().failures += 1;
    }

    pub fn counts(&mut self) -> HealthCounts {
        self.expire(Instant::now());
        self.buckets.iter().fold(HealthCounts::default(), |acc, b| HealthCounts {
            successes: acc.successes + b.successes,
            failures: acc.failures + b.failures,
        })
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
    }

    fn current(&mut self) -> &mut Bucket {
        let now = Instant::now();
        self.expire(now);
        let needs_bucket = match self.buckets.back() {
            Some(last) => now.duration_since(last.start) >= self.bucket_width,
            None => true,
        };
        if needs_bucket {
            self.buckets.push_back(Bucket {
                start: now,
                successes: 0,
                failures: 0,
            });
        }
        // A bucket was pushed above if none existed.
        let last = self.buckets.len() - 1;
        &mut self.buckets[last]
    }

    fn expire(&mut self, now: Instant) {
        while let Some(first) = self.buckets.front() {
            if now.duration_since(first.start) >= self.window {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_accumulate() {
        tokio::time::pause();
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);
        window.record_success();
        window.record_failure();
        tokio::time::advance(Duration::from_secs(3)).await;
        window.record_failure();

        let counts = window.counts();
        assert_eq!(counts, HealthCounts { successes: 1, failures: 2 });
        assert_eq!(counts.error_percent(), 66);
    }

    #[tokio::test]
    async fn test_old_buckets_roll_off() {
        tokio::time::pause();
        let mut window = RollingWindow::new(Duration::from_secs(10), 10);
        window.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        window.record_success();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(window.counts(), HealthCounts { successes: 1, failures: 0 });
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(window.counts().total(), 0);
    }

    #[test]
    fn test_empty_error_percent() {
        assert_eq!(HealthCounts::default().error_percent(), 0);
    }
}
