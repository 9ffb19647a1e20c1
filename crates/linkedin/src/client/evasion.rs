use std::time::Duration;

use rand::RngExt;
use tracing::trace;

use crate::config::EvasionConfig;

impl EvasionConfig {
    /// Draw a delay from `[min_delay_ms, max_delay_ms]`, or `None` when disabled.
    pub fn sample_delay(&self) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let (lo, hi) = if self.min_delay_ms <= self.max_delay_ms {
            (self.min_delay_ms, self.max_delay_ms)
        } else {
            (self.max_delay_ms, self.min_delay_ms)
        };
        let ms = if lo == hi {
            lo
        } else {
            rand::rng().random_range(lo..=hi)
        };
        Some(Duration::from_millis(ms))
    }
}

/// Sleep for a random, bounded interval before a request.
pub async fn evade(config: &EvasionConfig) {
    if let Some(delay) = config.sample_delay() {
        trace!(delay_ms = delay.as_millis() as u64, "Evasion delay");
        tokio::time::sleep(delay).await;
    }
}
