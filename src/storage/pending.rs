use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Metadata for one submitted transaction, keyed by its hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTx {
    pub tx_hash: String,
    pub status: TxStatus,
    pub updated_at: DateTime<Utc>,
}

impl PendingTx {
    pub fn new(tx_hash: impl Into<String>) -> Self {
        Self { tx_hash: tx_hash.into(), status: TxStatus::Pending, updated_at: Utc::now() }
    }
}

/// In-memory record of submitted transactions, meant to be driven from the
/// confirmer's hooks: insert on sent, mark or remove on the terminal event.
/// Durable storage stays with the caller.
#[derive(Default)]
pub struct PendingTxStore {
    txs: RwLock<HashMap<String, PendingTx>>,
}

impl PendingTxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record for `tx.tx_hash`.
    pub fn insert(&self, tx: PendingTx) {
        self.txs.write().insert(tx.tx_hash.clone(), tx);
    }

    /// Updates a record's status and timestamp. Returns false when the hash
    /// was never tracked.
    pub fn mark(&self, tx_hash: &str, status: TxStatus) -> bool {
        let mut txs = self.txs.write();
        match txs.get_mut(tx_hash) {
            Some(tx) => {
                tx.status = status;
                tx.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, tx_hash: &str) -> Option<PendingTx> {
        self.txs.write().remove(tx_hash)
    }

    pub fn get(&self, tx_hash: &str) -> Option<PendingTx> {
        self.txs.read().get(tx_hash).cloned()
    }

    /// Hashes still awaiting a terminal event, e.g. for resubmission after a
    /// process restart.
    pub fn pending_hashes(&self) -> Vec<String> {
        self.txs
            .read()
            .values()
            .filter(|tx| tx.status == TxStatus::Pending)
            .map(|tx| tx.tx_hash.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.txs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_status_transitions() {
        let store = PendingTxStore::new();
        store.insert(PendingTx::new("0x01"));

        let tx = store.get("0x01").unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
        let inserted_at = tx.updated_at;

        assert!(store.mark("0x01", TxStatus::Confirmed));
        let tx = store.get("0x01").unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
        assert!(tx.updated_at >= inserted_at);
    }

    #[test]
    fn mark_unknown_hash_is_a_miss() {
        let store = PendingTxStore::new();
        assert!(!store.mark("0xmissing", TxStatus::Failed));
    }

    #[test]
    fn pending_hashes_skips_resolved_txs() {
        let store = PendingTxStore::new();
        store.insert(PendingTx::new("0x01"));
        store.insert(PendingTx::new("0x02"));
        store.insert(PendingTx::new("0x03"));
        store.mark("0x02", TxStatus::Confirmed);
        store.mark("0x03", TxStatus::Failed);

        assert_eq!(store.pending_hashes(), vec!["0x01".to_string()]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn remove_returns_the_record() {
        let store = PendingTxStore::new();
        store.insert(PendingTx::new("0x01"));

        let removed = store.remove("0x01").unwrap();
        assert_eq!(removed.tx_hash, "0x01");
        assert!(store.is_empty());
        assert!(store.remove("0x01").is_none());
    }
}
