use async_trait::async_trait;

use super::errors::ConfirmerError;

/// Defines the capability the confirmer needs from a chain backend: broadcast
/// a transaction and check how deep it is buried.
///
/// Production and test backends are two implementations of the same trait;
/// the engine never looks past it.
#[async_trait]
pub trait TxClient: Send + Sync {
    /// Opaque payload handed to [`TxClient::send_tx`]. The confirmer never
    /// inspects it; a backend typically uses a signed raw transaction here.
    type Tx: Send + Sync;

    /// Broadcasts the transaction and returns its hash.
    async fn send_tx(&self, tx: &Self::Tx) -> Result<String, ConfirmerError>;

    /// Checks whether `tx_hash` is final at `confirmation_blocks` depth.
    ///
    /// `Ok(())` means confirmed. [`ConfirmerError::TxNotFound`] and
    /// [`ConfirmerError::ConfirmPending`] mean "check again later"; any other
    /// error is terminal for this transaction.
    async fn confirm_tx(&self, tx_hash: &str, confirmation_blocks: u64)
        -> Result<(), ConfirmerError>;
}
