use std::time::Duration;

use thiserror::Error;

/// Errors produced while submitting or confirming a transaction.
///
/// The confirmation workers only ever retry the variants for which
/// [`ConfirmerError::is_retryable`] returns true; everything else is a
/// terminal outcome for the transaction involved.
#[derive(Debug, Error)]
pub enum ConfirmerError {
    /// The node has no record of the transaction yet.
    #[error("tx not found")]
    TxNotFound,

    /// Mined, but not yet buried under the required number of blocks.
    #[error("tx confirm pending")]
    ConfirmPending,

    /// The transaction was mined and reverted.
    #[error("tx failed on chain")]
    TxFailed,

    /// A send or status check exceeded the per-check deadline.
    #[error("chain call timed out after {0:?}")]
    Timeout(Duration),

    /// The retry queue is bounded and already at capacity.
    #[error("queue is full")]
    QueueFull,

    /// A lifecycle hook refused the transaction.
    #[error("{hook} hook failed: {reason}")]
    Hook {
        hook: &'static str,
        reason: anyhow::Error,
    },

    /// Engine configuration the worker pool cannot run with.
    #[error("invalid config: {0}")]
    Config(String),

    /// Any other failure talking to the node. Not retried.
    #[error("rpc: {0}")]
    Rpc(String),
}

impl ConfirmerError {
    /// Whether the entry should go back on the queue for another check.
    ///
    /// Timeouts are retried: a slow node is indistinguishable from a pending
    /// transaction at this layer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConfirmerError::TxNotFound | ConfirmerError::ConfirmPending | ConfirmerError::Timeout(_)
        )
    }
}

/// A failed dequeue-check cycle, paired with the transaction it concerned so
/// the worker can route it to the error hook.
#[derive(Debug, Error)]
#[error("confirmation cycle for {tx_hash} failed: {source}")]
pub struct PollError {
    pub tx_hash: String,
    #[source]
    pub source: ConfirmerError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ConfirmerError::TxNotFound.is_retryable());
        assert!(ConfirmerError::ConfirmPending.is_retryable());
        assert!(ConfirmerError::Timeout(Duration::from_secs(1)).is_retryable());

        assert!(!ConfirmerError::TxFailed.is_retryable());
        assert!(!ConfirmerError::QueueFull.is_retryable());
        assert!(!ConfirmerError::Rpc("boom".to_string()).is_retryable());
    }

    #[test]
    fn poll_error_names_the_tx() {
        let err = PollError {
            tx_hash: "0xabc".to_string(),
            source: ConfirmerError::TxFailed,
        };
        assert!(format!("{}", err).contains("0xabc"));
    }
}
