use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    providers::{Provider, ProviderBuilder},
    rpc::types::{TransactionInput, TransactionRequest},
    sol_types::SolCall,
};
use async_trait::async_trait;
use std::time::Duration;

use crate::constants::*;
use crate::error::DispatchError;
use crate::services::wallet_pool::WalletHandle;

// Airdrop contract entry point called by the hot wallets
alloy::sol! {
    function claimFor(address recipient, uint256 fid);
}

/// Sends a claim transaction from a leased wallet.
#[async_trait]
pub trait ChainSubmitter: Send + Sync {
    async fn submit_claim(&self, wallet: &WalletHandle, recipient: Address, fid: u64) -> Result<String, DispatchError>;
}

#[derive(Debug, Clone)]
pub struct ContractService {
    rpc_url: String,
}

impl ContractService {
    pub fn new(rpc_url: String) -> anyhow::Result<Self> {
        // Fail at startup rather than on the first claim
        let _: reqwest::Url = rpc_url.parse()?;
        Ok(Self { rpc_url })
    }

    /// Network gas price with a 10% buffer for faster inclusion.
    async fn gas_price<P: Provider>(&self, provider: &P) -> Result<u128, DispatchError> {
        let network_gas_price = provider
            .get_gas_price()
            .await
            .map_err(|e| DispatchError::Chain(format!("Failed to fetch gas price: {}", e)))?;
        let buffered_price = network_gas_price * 11 / 10;
        tracing::debug!("Using network gas price with buffer: {} gwei", buffered_price / 1_000_000_000);
        Ok(buffered_price)
    }
}

#[async_trait]
impl ChainSubmitter for ContractService {
    async fn submit_claim(&self, wallet: &WalletHandle, recipient: Address, fid: u64) -> Result<String, DispatchError> {
        let url: reqwest::Url = self
            .rpc_url
            .parse()
            .map_err(|e| DispatchError::Chain(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new()
            .wallet(wallet.signer.clone())
            .connect_http(url);

        tracing::info!(
            "Submitting claim for fid {} to {} from wallet {}",
            fid,
            recipient,
            wallet.address
        );

        let call_data = claimForCall {
            recipient,
            fid: U256::from(fid),
        }
        .abi_encode();

        let gas_price = self.gas_price(&provider).await?;
        let tx_nonce = provider
            .get_transaction_count(wallet.address)
            .await
            .map_err(|e| DispatchError::from_chain_message(e.to_string()))?;

        let mut tx_base = TransactionRequest::default()
            .to(wallet.contract_address)
            .nonce(tx_nonce)
            .value(U256::ZERO)
            .input(TransactionInput::new(Bytes::from(call_data)))
            .gas_limit(2_000_000u64); // High limit for estimation
        tx_base.set_gas_price(gas_price);

        let estimated_gas = match tokio::time::timeout(
            Duration::from_secs(GAS_ESTIMATE_TIMEOUT_SECS),
            provider.estimate_gas(tx_base.clone()),
        )
        .await
        {
            Ok(Ok(gas)) => gas,
            Ok(Err(e)) => return Err(DispatchError::from_chain_message(format!("Gas estimation failed: {}", e))),
            Err(_) => return Err(DispatchError::Chain("Gas estimation timed out".to_string())),
        };

        // Add buffer to gas estimate (1.2x)
        let gas_with_buffer = estimated_gas * 6 / 5;
        let final_tx = tx_base.gas_limit(gas_with_buffer);

        let pending_tx = provider
            .send_transaction(final_tx)
            .await
            .map_err(|e| DispatchError::from_chain_message(e.to_string()))?;
        let tx_hash = *pending_tx.tx_hash();
        tracing::info!("Claim transaction sent with hash: 0x{:x} (nonce {})", tx_hash, tx_nonce);

        let receipt_future = pending_tx
            .with_required_confirmations(1)
            .with_timeout(Some(Duration::from_secs(CLAIM_RECEIPT_TIMEOUT_SECS)))
            .get_receipt();

        match tokio::time::timeout(Duration::from_secs(CLAIM_RECEIPT_TIMEOUT_SECS), receipt_future).await {
            Ok(Ok(receipt)) if receipt.status() => {
                tracing::info!("Claim transaction confirmed: 0x{:x}", receipt.transaction_hash);
            }
            Ok(Ok(receipt)) => {
                tracing::error!("Claim transaction reverted: 0x{:x}", receipt.transaction_hash);
                return Err(DispatchError::Chain(format!("Transaction 0x{:x} reverted", tx_hash)));
            }
            Ok(Err(e)) => {
                tracing::warn!("Error waiting for claim confirmation: {}", e);
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for claim confirmation: 0x{:x}", tx_hash);
            }
        }

        Ok(format!("0x{:x}", tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_call_encoding() {
        let recipient: Address = "0x59888BE579194C701F16a9425f57ECce3906AF4b".parse().unwrap();
        let data = claimForCall { recipient, fid: U256::from(42u64) }.abi_encode();
        // selector + two 32-byte words
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], claimForCall::SELECTOR.as_slice());
        assert_eq!(data[4 + 63], 42);
    }

    #[test]
    fn test_rejects_bad_rpc_url() {
        assert!(ContractService::new("not a url".to_string()).is_err());
        assert!(ContractService::new("https://mainnet.base.org".to_string()).is_ok());
    }
}
