//! Retry delays for ledger requests.

use rand::{Rng, RngCore};
use std::time::Duration;

/// Doubling delay between attempts of one ledger request, capped at `max`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Jittered delay before the next attempt. Each call doubles the base up to the cap.
    pub(crate) fn next_delay(&mut self, rng: &mut impl RngCore) -> Duration {
        let delay = jittered(rng, self.next);
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }
}

/// Randomize `backoff` into `[backoff/2, backoff]`.
fn jittered(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = backoff.as_millis() as u64;
    if backoff_ms <= 1 {
        return backoff;
    }
    let half_ms = backoff_ms / 2;
    Duration::from_millis(half_ms.saturating_add(rng.gen_range(0..=half_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_delays_double_up_to_cap() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));
        let bases = [100, 200, 350, 350];
        for base in bases {
            let delay = backoff.next_delay(&mut rng);
            assert!(delay >= Duration::from_millis(base / 2), "{delay:?} < {base}/2");
            assert!(delay <= Duration::from_millis(base), "{delay:?} > {base}");
        }
    }

    #[test]
    fn test_initial_above_cap_is_clamped() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_millis(40));
        assert!(backoff.next_delay(&mut rng) <= Duration::from_millis(40));
        let mut none = Backoff::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(none.next_delay(&mut rng), Duration::ZERO);
    }
}
