// Exponential backoff with jitter for controller/transport connectivity
// errors: retried on lock refresh and message poll. Job-body failures
// are never retried by this policy, since a job that threw has had
// its chance and is finished either way.

/// Deterministic backoff policy: `delay = base * factor^attempt`, jittered
/// by ±10% seeded from a caller-supplied string so repeated calls for the
/// same logical operation (e.g. the same lock id) don't all retry in
/// lockstep.
pub struct Backoff {
    base_delay_ms: i64,
    factor: f64,
    max_attempts: u32,
}

impl Backoff {
    pub fn new(base_delay_ms: i64, factor: f64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            factor,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt number `attempt` (0-indexed), jittered using
    /// `seed` for determinism.
    pub fn delay_ms(&self, attempt: u32, seed: &str) -> i64 {
        let base = self.base_delay_ms as f64 * self.factor.powi(attempt as i32);
        let jitter_seed = seed.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9..=1.1
        (base * jitter_factor) as i64
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            crate::application::worker::constants::DEFAULT_RETRY_BASE_DELAY_MS,
            2.0,
            5,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially() {
        let b = Backoff::new(1000, 2.0, 5);
        let d0 = b.delay_ms(0, "seed");
        let d1 = b.delay_ms(1, "seed");
        assert!(d1 > d0);
    }
}
