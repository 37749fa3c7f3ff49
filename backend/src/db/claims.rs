use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::constants::{CLAIM_STATUS_PENDING, CLAIM_STATUS_SENT};
use crate::models::{ClaimReceipt, ClaimRecord, WalletPurpose};
use crate::services::claim::ClaimLedger;

#[derive(Debug, Clone)]
pub struct PgClaimLedger {
    pool: PgPool,
}

impl PgClaimLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert a pending claim for `fid`. Returns false when the fid already has a
/// row; an existing claim is never overwritten.
pub async fn reserve_claim(pool: &PgPool, fid: i64, address: &str, purpose: WalletPurpose) -> Result<bool> {
    let reserved = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO airdrop_claims (fid, address, purpose, status)
        VALUES ($1, LOWER($2), $3, $4)
        ON CONFLICT (fid) DO NOTHING
        RETURNING fid
        "#
    )
    .bind(fid)
    .bind(address)
    .bind(purpose.as_str())
    .bind(CLAIM_STATUS_PENDING)
    .fetch_optional(pool)
    .await?;

    Ok(reserved.is_some())
}

/// Record the transaction on a pending reservation.
pub async fn mark_claim_sent(pool: &PgPool, receipt: &ClaimReceipt) -> Result<ClaimRecord> {
    let record = sqlx::query_as::<_, ClaimRecord>(
        r#"
        UPDATE airdrop_claims
        SET status = $2, tx_hash = $3, wallet_address = $4, updated_at = NOW()
        WHERE fid = $1 AND status = $5
        RETURNING fid, address, purpose, status, tx_hash, wallet_address, created_at, updated_at
        "#
    )
    .bind(receipt.fid as i64)
    .bind(CLAIM_STATUS_SENT)
    .bind(&receipt.tx_hash)
    .bind(&receipt.wallet_address)
    .bind(CLAIM_STATUS_PENDING)
    .fetch_optional(pool)
    .await?;

    record.ok_or_else(|| anyhow::anyhow!("No pending claim reservation for fid {}", receipt.fid))
}

/// Delete a reservation that never produced a transaction.
pub async fn delete_pending_claim(pool: &PgPool, fid: i64) -> Result<()> {
    sqlx::query("DELETE FROM airdrop_claims WHERE fid = $1 AND status = $2")
        .bind(fid)
        .bind(CLAIM_STATUS_PENDING)
        .execute(pool)
        .await?;

    Ok(())
}

#[async_trait]
impl ClaimLedger for PgClaimLedger {
    async fn reserve_claim(&self, fid: u64, address: &str, purpose: WalletPurpose) -> Result<bool> {
        reserve_claim(&self.pool, fid as i64, address, purpose).await
    }

    async fn record_claim(&self, receipt: &ClaimReceipt, purpose: WalletPurpose) -> Result<()> {
        let record = mark_claim_sent(&self.pool, receipt).await?;
        tracing::debug!("Recorded {} claim for fid {} ({})", purpose, record.fid, record.status);
        Ok(())
    }

    async fn release_claim(&self, fid: u64) -> Result<()> {
        delete_pending_claim(&self.pool, fid as i64).await
    }
}
