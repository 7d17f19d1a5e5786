//! Exponential backoff with jitter for worker respawns.

use std::time::Duration;

use rand::Rng;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Tracks consecutive crashes of the pool and spaces out replacements.
///
/// The first crash is replaced immediately. A worker that lived at least
/// `stable` resets the count.
#[derive(Debug, Clone)]
pub struct CrashBackoff {
    base_ms: u64,
    max_ms: u64,
    stable: Duration,
    crashes: u32,
}

impl CrashBackoff {
    pub fn new(base_ms: u64, max_ms: u64, stable_secs: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            stable: Duration::from_secs(stable_secs),
            crashes: 0,
        }
    }

    /// Delay before replacing a worker that lived for `lived`.
    pub fn next_delay(&mut self, lived: Duration) -> Duration {
        if lived >= self.stable {
            self.crashes = 0;
        }
        self.crashes = self.crashes.saturating_add(1);
        calculate_backoff(self.crashes - 1, self.base_ms, self.max_ms)
    }

    pub fn crashes(&self) -> u32 {
        self.crashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() < 1100);
    }

    #[test]
    fn first_crash_is_immediate_then_grows() {
        let mut backoff = CrashBackoff::new(100, 5_000, 10);
        let quick = Duration::from_millis(50);

        assert_eq!(backoff.next_delay(quick), Duration::ZERO);
        assert!(backoff.next_delay(quick) >= Duration::from_millis(100));
        assert!(backoff.next_delay(quick) >= Duration::from_millis(200));
        assert_eq!(backoff.crashes(), 3);
    }

    #[test]
    fn stable_worker_resets_the_count() {
        let mut backoff = CrashBackoff::new(100, 5_000, 10);
        backoff.next_delay(Duration::ZERO);
        backoff.next_delay(Duration::ZERO);

        assert_eq!(backoff.next_delay(Duration::from_secs(11)), Duration::ZERO);
        assert_eq!(backoff.crashes(), 1);
    }
}
