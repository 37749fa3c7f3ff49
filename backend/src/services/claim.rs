use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::models::{ClaimReceipt, WalletPurpose};
use crate::services::contract::ChainSubmitter;
use crate::services::retry::RetryPolicy;
use crate::services::tokens::TokenService;
use crate::services::wallet_pool::WalletPool;

/// Claim deduplication, kept outside the lock store so it survives restarts.
///
/// A fid is reserved before anything is sent. Only the caller that created
/// the reservation may submit; everyone else sees it as already claimed.
#[async_trait]
pub trait ClaimLedger: Send + Sync {
    /// Atomically create a pending claim. Returns false if the fid already
    /// has one, pending or sent.
    async fn reserve_claim(&self, fid: u64, address: &str, purpose: WalletPurpose) -> anyhow::Result<bool>;

    /// Attach the sent transaction to the reservation.
    async fn record_claim(&self, receipt: &ClaimReceipt, purpose: WalletPurpose) -> anyhow::Result<()>;

    /// Drop a pending reservation whose send definitely failed.
    async fn release_claim(&self, fid: u64) -> anyhow::Result<()>;
}

pub struct ClaimService {
    tokens: Arc<TokenService>,
    pool: Arc<WalletPool>,
    submitter: Arc<dyn ChainSubmitter>,
    ledger: Arc<dyn ClaimLedger>,
    retry: RetryPolicy,
}

impl ClaimService {
    pub fn new(
        tokens: Arc<TokenService>,
        pool: Arc<WalletPool>,
        submitter: Arc<dyn ChainSubmitter>,
        ledger: Arc<dyn ClaimLedger>,
    ) -> Self {
        Self {
            tokens,
            pool,
            submitter,
            ledger,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Verify the one-time token, then send the airdrop from a pooled wallet.
    pub async fn claim(&self, token: &str, purpose: WalletPurpose) -> Result<ClaimReceipt, DispatchError> {
        let identity = self.tokens.verify(token).await?;

        let recipient: Address = identity
            .address
            .parse()
            .map_err(|e| DispatchError::Chain(format!("Invalid recipient address '{}': {}", identity.address, e)))?;

        let fid = identity.fid;
        if !self
            .ledger
            .reserve_claim(fid, &identity.address, purpose)
            .await
            .map_err(|e| DispatchError::Ledger(e.to_string()))?
        {
            tracing::info!("fid {} already claimed, rejecting", fid);
            return Err(DispatchError::AlreadyClaimed { fid });
        }

        let sent = self
            .retry
            .run(move || async move {
                self.pool
                    .with_wallet(Some(purpose), move |wallet| async move {
                        let tx_hash = self.submitter.submit_claim(&wallet, recipient, fid).await?;
                        Ok::<_, DispatchError>((tx_hash, wallet.address))
                    })
                    .await
            })
            .await;

        let (tx_hash, wallet_address) = match sent {
            Ok(sent) => sent,
            Err(e) if e.may_have_sent() => {
                tracing::warn!("Claim for fid {} may already be on chain, keeping reservation: {}", fid, e);
                return Err(e);
            }
            Err(e) => {
                if let Err(release_err) = self.ledger.release_claim(fid).await {
                    tracing::error!("Failed to release claim reservation for fid {}: {}", fid, release_err);
                }
                return Err(e);
            }
        };

        let receipt = ClaimReceipt {
            fid,
            address: identity.address,
            tx_hash,
            wallet_address: wallet_address.to_string(),
        };

        // Transaction is already sent; ledger failures are logged, not returned
        if let Err(e) = self.ledger.record_claim(&receipt, purpose).await {
            tracing::error!(
                "Claim for fid {} sent in {} but ledger write failed: {}",
                fid,
                receipt.tx_hash,
                e
            );
        }

        tracing::info!("✅ Claim for fid {} dispatched in {}", fid, receipt.tx_hash);
        Ok(receipt)
    }
}
