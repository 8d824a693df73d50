use std::sync::atomic::{AtomicU64, Ordering};

use ethers::providers::JsonRpcClient;
use ethers::types::Address;

use super::ethereum::EthereumClient;
use crate::confirm::ConfirmerError;

/// Tracks the next usable nonce for one account locally, so a batch of
/// transfers can be signed without a chain round-trip per transaction.
pub struct NonceManager {
    current: AtomicU64,
}

impl NonceManager {
    pub fn new(initial: u64) -> Self {
        Self { current: AtomicU64::new(initial) }
    }

    /// Seeds the manager from the account's on-chain transaction count.
    pub async fn init<P>(
        client: &EthereumClient<P>,
        address: Address,
    ) -> Result<Self, ConfirmerError>
    where
        P: JsonRpcClient + Clone + Send + Sync,
    {
        let current = client.nonce_at(address).await?;
        Ok(Self::new(current))
    }

    /// Returns the nonce to use and advances the counter.
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    /// Rewinds after a dropped or replaced transaction.
    pub fn reset(&self, nonce: u64) {
        self.current.store(nonce, Ordering::SeqCst);
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn next_returns_then_advances() {
        let nonce = NonceManager::new(7);
        assert_eq!(nonce.next(), 7);
        assert_eq!(nonce.next(), 8);
        assert_eq!(nonce.current(), 9);

        nonce.reset(3);
        assert_eq!(nonce.next(), 3);
    }

    #[test]
    fn concurrent_nexts_never_collide() {
        let nonce = Arc::new(NonceManager::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let nonce = Arc::clone(&nonce);
            handles.push(std::thread::spawn(move || {
                (0..100).map(|_| nonce.next()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for n in handle.join().unwrap() {
                assert!(seen.insert(n), "nonce handed out twice");
            }
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(nonce.current(), 400);
    }
}
