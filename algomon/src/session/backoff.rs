use std::time::Duration;

use algomon_core::BackoffConfig;
use rand::Rng;

/// `base_ms` plus a random jitter of up to `jitter_percent` percent.
pub fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms + rng.random_range(0..jitter_range)
}

/// Delay before retry number `attempt` (1-based): exponential from the
/// minimum, capped at the maximum, plus jitter.
pub fn retry_delay(cfg: &BackoffConfig, attempt: u32) -> Duration {
    let factor = u64::from(cfg.factor.max(1));
    let mut base = cfg.min_backoff_ms;
    for _ in 1..attempt {
        base = base.saturating_mul(factor);
        if base >= cfg.max_backoff_ms {
            break;
        }
    }
    let base = base.min(cfg.max_backoff_ms);
    Duration::from_millis(jitter_wait(base, u32::from(cfg.jitter_percent)))
}
