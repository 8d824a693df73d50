use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use ethers::{
    providers::{Http, JsonRpcClient, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, H256, U256, U64},
};
use tracing::{debug, info};

use crate::confirm::{ConfirmerError, TxClient};

/// Gas for a plain value transfer.
const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Ethereum backend for the confirmer, speaking JSON-RPC through `ethers`.
#[derive(Clone)]
pub struct EthereumClient<P: JsonRpcClient + Clone = Http> {
    provider: Provider<P>,
    chain_id: u64,
}

impl EthereumClient<Http> {
    /// Connects to `rpc_url` and resolves the chain id from the node.
    pub async fn new(rpc_url: &str) -> Result<Self> {
        let provider = Self::build_provider(rpc_url)?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| anyhow::anyhow!("failed to get chain id from '{}': {}", rpc_url, e))?
            .as_u64();

        info!(chain_id, rpc_url, "connected to Ethereum node");
        Ok(Self { provider, chain_id })
    }

    /// Connects without probing the node for its chain id.
    pub fn new_with_chain_id(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = Self::build_provider(rpc_url)?;
        info!(chain_id, rpc_url, "connected to Ethereum node");
        Ok(Self { provider, chain_id })
    }

    fn build_provider(rpc_url: &str) -> Result<Provider<Http>> {
        let parsed_url = reqwest::Url::parse(rpc_url.trim())
            .map_err(|e| anyhow::anyhow!("invalid RPC URL '{}': {}", rpc_url, e))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {}", e))?;

        Ok(Provider::new(Http::new_with_client(parsed_url, client)))
    }
}

impl<P> EthereumClient<P>
where
    P: JsonRpcClient + Clone + Send + Sync,
{
    /// Wraps an existing provider. Useful for tests with a `MockProvider`.
    pub fn new_with_provider(provider: Provider<P>, chain_id: u64) -> Self {
        Self { provider, chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub async fn gas_price(&self) -> Result<U256, ConfirmerError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ConfirmerError::Rpc(format!("get gas price: {e}")))
    }

    pub async fn latest_block_number(&self) -> Result<u64, ConfirmerError> {
        let block_number = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| ConfirmerError::Rpc(format!("get block number: {e}")))?;
        Ok(block_number.as_u64())
    }

    /// On-chain transaction count for `address`, i.e. its next nonce.
    pub async fn nonce_at(&self, address: Address) -> Result<u64, ConfirmerError> {
        let nonce = self
            .provider
            .get_transaction_count(address, None)
            .await
            .map_err(|e| ConfirmerError::Rpc(format!("get nonce: {e}")))?;
        debug!(address = %hex::encode(address), nonce = nonce.as_u64(), "fetched nonce");
        Ok(nonce.as_u64())
    }

    /// Signs a plain value transfer and returns the raw RLP payload ready for
    /// [`TxClient::send_tx`]. Purely local; no chain round-trip.
    pub async fn build_transfer(
        &self,
        wallet: &LocalWallet,
        nonce: u64,
        to: Address,
        amount_wei: U256,
        gas_price: U256,
    ) -> Result<Bytes> {
        let request = TransactionRequest::new()
            .chain_id(self.chain_id)
            .nonce(nonce)
            .to(to)
            .value(amount_wei)
            .gas(TRANSFER_GAS_LIMIT)
            .gas_price(gas_price);

        let tx: TypedTransaction = request.into();
        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| anyhow::anyhow!("failed to sign transfer: {}", e))?;

        Ok(tx.rlp_signed(&signature))
    }
}

#[async_trait]
impl<P> TxClient for EthereumClient<P>
where
    P: JsonRpcClient + Clone + Send + Sync + 'static,
{
    type Tx = Bytes;

    async fn send_tx(&self, tx: &Bytes) -> Result<String, ConfirmerError> {
        let pending = self
            .provider
            .send_raw_transaction(tx.clone())
            .await
            .map_err(|e| ConfirmerError::Rpc(format!("send raw transaction: {e}")))?;

        let tx_hash = format!("0x{}", hex::encode(pending.tx_hash().as_bytes()));
        info!(%tx_hash, "transaction sent");
        Ok(tx_hash)
    }

    async fn confirm_tx(
        &self,
        tx_hash: &str,
        confirmation_blocks: u64,
    ) -> Result<(), ConfirmerError> {
        let hash = H256::from_str(tx_hash)
            .map_err(|e| ConfirmerError::Rpc(format!("invalid tx hash '{tx_hash}': {e}")))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ConfirmerError::Rpc(format!("get receipt: {e}")))?
            .ok_or(ConfirmerError::TxNotFound)?;

        if receipt.status != Some(U64::from(1)) {
            return Err(ConfirmerError::TxFailed);
        }

        // A receipt without a block number is still in flight.
        let mined_block = match receipt.block_number {
            Some(number) => number.as_u64(),
            None => return Err(ConfirmerError::ConfirmPending),
        };

        let latest = self.latest_block_number().await?;
        if mined_block + confirmation_blocks > latest {
            return Err(ConfirmerError::ConfirmPending);
        }

        debug!(%tx_hash, mined_block, latest, "tx is buried deep enough");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ethers::providers::MockProvider;
    use ethers::types::TransactionReceipt;

    use super::*;

    fn mocked_client() -> (EthereumClient<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        (EthereumClient::new_with_provider(provider, 1), mock)
    }

    const TX_HASH: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";

    #[tokio::test]
    async fn confirm_tx_rejects_malformed_hash() {
        let (client, _mock) = mocked_client();
        let err = client.confirm_tx("not-a-hash", 2).await.unwrap_err();
        assert!(matches!(err, ConfirmerError::Rpc(_)));
    }

    #[tokio::test]
    async fn missing_receipt_is_not_found() {
        let (client, mock) = mocked_client();
        mock.push::<Option<TransactionReceipt>, _>(None).unwrap();

        let err = client.confirm_tx(TX_HASH, 2).await.unwrap_err();
        assert!(matches!(err, ConfirmerError::TxNotFound));
    }

    #[tokio::test]
    async fn reverted_receipt_is_terminal() {
        let (client, mock) = mocked_client();
        let receipt =
            TransactionReceipt { status: Some(U64::from(0)), ..Default::default() };
        mock.push(receipt).unwrap();

        let err = client.confirm_tx(TX_HASH, 2).await.unwrap_err();
        assert!(matches!(err, ConfirmerError::TxFailed));
    }

    #[tokio::test]
    async fn shallow_receipt_is_pending() {
        let (client, mock) = mocked_client();
        let receipt = TransactionReceipt {
            status: Some(U64::from(1)),
            block_number: Some(U64::from(100)),
            ..Default::default()
        };
        // responses pop in reverse order of the calls made
        mock.push(U64::from(101)).unwrap();
        mock.push(receipt).unwrap();

        let err = client.confirm_tx(TX_HASH, 2).await.unwrap_err();
        assert!(matches!(err, ConfirmerError::ConfirmPending));
    }

    #[tokio::test]
    async fn buried_receipt_confirms() {
        let (client, mock) = mocked_client();
        let receipt = TransactionReceipt {
            status: Some(U64::from(1)),
            block_number: Some(U64::from(100)),
            ..Default::default()
        };
        mock.push(U64::from(102)).unwrap();
        mock.push(receipt).unwrap();

        client.confirm_tx(TX_HASH, 2).await.unwrap();
    }

    #[tokio::test]
    async fn build_transfer_signs_offline() {
        let (client, _mock) = mocked_client();
        let wallet = LocalWallet::from_str(
            "0x1111111111111111111111111111111111111111111111111111111111111111",
        )
        .unwrap();
        let to = Address::from_str("0x742d35Cc6634C0532925a3b8D400e8B78fFe4860").unwrap();

        let raw = client
            .build_transfer(&wallet, 0, to, U256::from(1_000u64), U256::from(1u64))
            .await
            .unwrap();
        assert!(!raw.is_empty());
    }
}
