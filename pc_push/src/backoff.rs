//! ABOUTME: Jittered exponential backoff between retry rounds
//! ABOUTME: Delay doubles every round up to a cap, with a random jitter band

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Backoff parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Base delay before the first retry, before jitter
    pub initial_delay_ms: u64,
    /// Upper bound on the base delay
    pub max_delay_ms: u64,
    /// Share of the base delay (0..=100) that is randomised
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 1_024_000,
            jitter_percent: 50,
        }
    }
}

/// Backoff state for one logical send call
#[derive(Debug, Clone)]
pub struct Backoff {
    current_ms: u64,
    max_delay_ms: u64,
    jitter_percent: u64,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            current_ms: config.initial_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter_percent: u64::from(config.jitter_percent.min(100)),
        }
    }

    /// Base delay the next call to [`Backoff::next_delay`] will jitter
    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Draw the delay for the upcoming round and advance the base delay.
    ///
    /// The result lies in `[b - b*J/100, b)` for base delay `b` and jitter
    /// `J`, or is exactly `b` when the jitter band is empty.
    pub fn next_delay<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let base = self.current_ms;
        let fixed = base.saturating_mul(100 - self.jitter_percent) / 100;
        let band = base.saturating_mul(self.jitter_percent) / 100;
        let jitter = if band == 0 { 0 } else { rng.gen_range(0..band) };

        self.current_ms = base.saturating_mul(2).min(self.max_delay_ms);
        Duration::from_millis(fixed + jitter)
    }

    /// Sleep for the next jittered delay
    pub async fn wait(&mut self) -> Duration {
        let delay = self.next_delay(&mut rand::thread_rng());
        debug!(
            delay_ms = delay.as_millis() as u64,
            next_base_ms = self.current_ms,
            "Backing off before retry round"
        );
        tokio::time::sleep(delay).await;
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_first_delay_within_jitter_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut backoff = Backoff::new(&BackoffConfig::default());
            let delay = backoff.next_delay(&mut rng);
            assert!(delay >= Duration::from_millis(500), "{:?}", delay);
            assert!(delay < Duration::from_millis(1000), "{:?}", delay);
        }
    }

    #[test]
    fn test_base_doubles_then_caps() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut backoff = Backoff::new(&BackoffConfig::default());
        let mut bases = Vec::new();
        for _ in 0..13 {
            bases.push(backoff.current().as_millis() as u64);
            backoff.next_delay(&mut rng);
        }
        assert_eq!(&bases[..4], &[1000, 2000, 4000, 8000]);
        assert_eq!(bases[10], 1_024_000);
        assert_eq!(bases[11], 1_024_000);
        assert_eq!(bases[12], 1_024_000);
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut backoff = Backoff::new(&BackoffConfig {
            initial_delay_ms: 300,
            max_delay_ms: 1000,
            jitter_percent: 0,
        });
        assert_eq!(backoff.next_delay(&mut rng), Duration::from_millis(300));
        assert_eq!(backoff.next_delay(&mut rng), Duration::from_millis(600));
        assert_eq!(backoff.next_delay(&mut rng), Duration::from_millis(1000));
    }

    #[test]
    fn test_tiny_base_does_not_panic() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut backoff = Backoff::new(&BackoffConfig {
            initial_delay_ms: 1,
            max_delay_ms: 1,
            jitter_percent: 50,
        });
        assert_eq!(backoff.next_delay(&mut rng), Duration::from_millis(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_drawn_delay() {
        let mut backoff = Backoff::new(&BackoffConfig::default());
        let start = tokio::time::Instant::now();
        let delay = backoff.wait().await;
        assert!(start.elapsed() >= delay);
        assert_eq!(backoff.current(), Duration::from_millis(2000));
    }
}
