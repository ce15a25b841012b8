use std::time::Duration;

use rand::Rng;

/// Delay before reconnect attempt `attempt` (1-based): the base delay
/// doubles per attempt, capped, then jittered by +/-20% so that many
/// instances losing the same storage do not retry in lockstep.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let doubled = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    jitter(doubled.min(cap))
}

fn jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    if millis == 0 {
        return delay;
    }
    let spread = millis / 5;
    Duration::from_millis(rand::thread_rng().gen_range(millis - spread..=millis + spread))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const CAP: Duration = Duration::from_millis(1000);

    fn bounds(expected_millis: u64) -> (Duration, Duration) {
        (
            Duration::from_millis(expected_millis - expected_millis / 5),
            Duration::from_millis(expected_millis + expected_millis / 5),
        )
    }

    #[test]
    fn delay_doubles_per_attempt() {
        for (attempt, expected) in [(1, 100), (2, 200), (3, 400), (4, 800)] {
            let (low, high) = bounds(expected);
            for _ in 0..50 {
                let delay = backoff_delay(attempt, BASE, CAP);
                assert!(
                    delay >= low && delay <= high,
                    "attempt {attempt}: {delay:?} outside [{low:?}, {high:?}]"
                );
            }
        }
    }

    #[test]
    fn delay_is_capped() {
        let (low, high) = bounds(1000);
        for attempt in [5, 6, 10, 31] {
            let delay = backoff_delay(attempt, BASE, CAP);
            assert!(delay >= low && delay <= high);
        }
    }

    #[test]
    fn jitter_varies_the_delay() {
        let samples: Vec<_> = (0..100).map(|_| backoff_delay(4, BASE, CAP)).collect();
        assert!(samples.iter().any(|d| d != &samples[0]));
    }
}
