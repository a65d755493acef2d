//! Retry policy for UDP requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How often a timed-out request is re-sent and how long to wait between
/// attempts.
#[derive(Clone, Debug, PartialEq)]
pub struct Retry {
    /// Re-sends after the first attempt; 0 sends once.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Backoff {
    #[default]
    None,
    Fixed { delay: Duration },
    /// `initial * 2^attempt` capped at `max`, scaled by a factor in
    /// `[1 - jitter, 1 + jitter]`.
    Exponential {
        initial: Duration,
        max: Duration,
        jitter: f64,
    },
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }
}

impl Retry {
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: Backoff::None,
        }
    }

    /// Immediate re-sends, the policy used for hint-driven retries.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::None,
        }
    }

    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub fn exponential(attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Exponential {
                initial,
                max,
                jitter: 0.25,
            },
        }
    }

    /// Delay before re-send number `attempt + 1`.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                initial,
                max,
                jitter,
            } => {
                let multiplier = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                let capped = initial.saturating_mul(multiplier).min(*max);
                Duration::from_secs_f64(capped.as_secs_f64() * jitter_factor(*jitter))
            }
        }
    }
}

static JITTER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Pseudo-random factor in `[1 - jitter, 1 + jitter]` from a hashed counter.
fn jitter_factor(jitter: f64) -> f64 {
    if jitter <= 0.0 {
        return 1.0;
    }
    let counter = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let hash = counter.wrapping_mul(0x5851f42d4c957f2d);
    let random = (hash >> 11) as f64 / ((1u64 << 53) as f64);
    1.0 + (random - 0.5) * 2.0 * jitter.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_and_none_delays() {
        assert_eq!(Retry::none().compute_delay(3), Duration::ZERO);
        let retry = Retry::fixed(2, Duration::from_millis(150));
        assert_eq!(retry.compute_delay(0), Duration::from_millis(150));
        assert_eq!(retry.compute_delay(5), Duration::from_millis(150));
    }

    #[test]
    fn exponential_delay_is_capped() {
        let retry = Retry::exponential(10, Duration::from_millis(100), Duration::from_secs(1));
        for attempt in 0..10 {
            let delay = retry.compute_delay(attempt);
            assert!(delay <= Duration::from_millis(1250), "attempt {attempt}: {delay:?}");
        }
        assert!(retry.compute_delay(0) >= Duration::from_millis(75));
    }
}
