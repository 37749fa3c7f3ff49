use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub fid: i64,
    pub address: String,
    pub purpose: String,
    /// `pending` until the transaction hash is recorded, then `sent`
    pub status: String,
    pub tx_hash: Option<String>,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a successfully dispatched claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub fid: u64,
    pub address: String,
    pub tx_hash: String,
    pub wallet_address: String,
}
