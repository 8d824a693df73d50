use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::ConfirmerError;

/// Callback invoked with a transaction hash after a lifecycle event.
pub type TxHook = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

/// Callback invoked with a transaction hash and the error that ended its
/// tracking.
pub type ErrHook = Arc<dyn Fn(&str, &ConfirmerError) + Send + Sync>;

/// Engine tunables. Built once, never mutated after the confirmer starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmerConfig {
    /// Depth passed through to every status check.
    #[serde(default = "ConfirmerConfig::default_confirmation_blocks")]
    pub confirmation_blocks: u64,

    /// Minimum wait between two status checks of the same transaction.
    /// Independent of how often workers wake; `0` checks on every dequeue.
    #[serde(default = "ConfirmerConfig::default_confirmation_interval_ms")]
    pub confirmation_interval_ms: u64,

    /// Number of concurrent polling workers.
    #[serde(default = "ConfirmerConfig::default_workers")]
    pub workers: usize,

    /// How often each worker wakes to attempt a dequeue.
    #[serde(default = "ConfirmerConfig::default_worker_interval_ms")]
    pub worker_interval_ms: u64,

    /// Deadline applied to each send / status check against the node.
    #[serde(default = "ConfirmerConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ConfirmerConfig {
    fn default_confirmation_blocks() -> u64 {
        2
    }
    fn default_confirmation_interval_ms() -> u64 {
        1_000
    }
    fn default_worker_interval_ms() -> u64 {
        10
    }
    fn default_timeout_secs() -> u64 {
        60
    }
    fn default_workers() -> usize {
        // Resolved here, once, instead of through process-wide mutable state.
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(2))
            .unwrap_or(1)
            .max(1)
    }

    pub fn confirmation_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_interval_ms)
    }

    pub fn worker_interval(&self) -> Duration {
        Duration::from_millis(self.worker_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rejects values the worker pool cannot run with. Called by
    /// `Confirmer::start` before any worker is spawned.
    pub fn validate(&self) -> Result<(), ConfirmerError> {
        if self.workers == 0 {
            return Err(ConfirmerError::Config("workers must be positive".to_string()));
        }
        if self.worker_interval_ms == 0 {
            return Err(ConfirmerError::Config("worker interval must be positive".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfirmerError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for ConfirmerConfig {
    fn default() -> Self {
        Self {
            confirmation_blocks: Self::default_confirmation_blocks(),
            confirmation_interval_ms: Self::default_confirmation_interval_ms(),
            workers: Self::default_workers(),
            worker_interval_ms: Self::default_worker_interval_ms(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// Lifecycle callbacks, stored next to the config and immutable after start.
///
/// `on_tx_sent` and `on_tx_confirmed` default to no-ops. `on_error` defaults
/// to a panic: a terminal confirmation failure nobody handles should be loud.
/// Callers wanting graceful degradation must supply their own error hook.
#[derive(Clone)]
pub struct Hooks {
    pub on_tx_sent: TxHook,
    pub on_tx_confirmed: TxHook,
    pub on_error: ErrHook,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            on_tx_sent: Arc::new(|_| Ok(())),
            on_tx_confirmed: Arc::new(|_| Ok(())),
            on_error: Arc::new(|tx_hash, err| {
                panic!("unhandled confirmation failure for {tx_hash}: {err}")
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConfirmerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.confirmation_blocks, 2);
        assert_eq!(config.confirmation_interval(), Duration::from_secs(1));
        assert!(config.workers >= 1);
    }

    #[test]
    fn validate_rejects_non_positive_values() {
        let config = ConfirmerConfig { workers: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfirmerError::Config(_))));

        let config = ConfirmerConfig { worker_interval_ms: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfirmerError::Config(_))));

        let config = ConfirmerConfig { timeout_secs: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfirmerError::Config(_))));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ConfirmerConfig = toml::from_str("workers = 3").unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.confirmation_blocks, 2);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn zero_confirmation_interval_is_allowed() {
        let config = ConfirmerConfig { confirmation_interval_ms: 0, ..Default::default() };
        config.validate().unwrap();
    }
}
