use std::time::Duration;

use rand::Rng;

use crate::config::RetryPolicyConfig;

/// Bounded exponential backoff with jitter (spec 4.2). `next_delay(attempt)`
/// grows from `min_delay` to `max_delay`, multiplied by a uniform factor in
/// `[0.5, 1.5)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    min_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(cfg: RetryPolicyConfig) -> Self {
        Self {
            min_delay: cfg.min_delay,
            max_delay: cfg.max_delay,
        }
    }

    /// `attempt` is zero-based: the delay before the first retry (i.e. after
    /// the first dispatch failure) is `next_delay(0)`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.min_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let base = base.min(self.max_delay.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64(base * jitter)
    }
}
