use std::time::Duration;
use voicechat_core::config::PollConfig;

/// Backoff schedule for run-status polling, bounded by an overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff_milli: u32,
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn from_config(cfg: &PollConfig) -> Self {
        Self {
            initial_interval: cfg.initial_interval(),
            max_interval: cfg.max_interval(),
            backoff_milli: cfg.backoff_milli,
            max_wait: cfg.max_wait(),
        }
    }

    pub fn next_interval(&self, current: Duration) -> Duration {
        // Factors below 1.0 would shrink the interval; treat them as a fixed schedule.
        let milli = u128::from(self.backoff_milli.max(1_000));
        let grown = current.as_millis().saturating_mul(milli) / 1_000;
        let grown = Duration::from_millis(u64::try_from(grown).unwrap_or(u64::MAX));
        grown.min(self.max_interval).max(current.min(self.max_interval))
    }
}

pub fn ms(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}
