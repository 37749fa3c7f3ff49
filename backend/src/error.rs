use thiserror::Error;

use crate::models::WalletPurpose;

/// Failures talking to the lock store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lock store backend error: {0}")]
    Backend(String),

    #[error("failed to (de)serialize stored value: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum WalletPoolError {
    #[error("no wallets configured")]
    NoWalletsConfigured,

    #[error("no wallet configured for purpose {0}")]
    NoWalletForPurpose(WalletPurpose),

    #[error("wallet {0} is not part of the pool")]
    UnknownWallet(String),

    /// A specific wallet is currently locked by another operation.
    #[error("wallet {address} is busy")]
    WalletBusy { address: String },

    #[error("all wallets busy after {attempts} attempts, try again later{}", last_error_suffix(.last_error))]
    Exhausted {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {})", e),
        None => String::new(),
    }
}

/// Rejections from the one-time token verifier. None of these are retried.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("token already used or unknown")]
    AlreadyUsedOrUnknown,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token data mismatch")]
    DataMismatch,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("signer {fid} lacks {permission} permission")]
    MissingPermission { fid: u64, permission: String },

    #[error("social API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("social API request failed: {0}")]
    Network(String),
}

impl From<reqwest::Error> for EngagementError {
    fn from(e: reqwest::Error) -> Self {
        EngagementError::Network(e.to_string())
    }
}

/// Errors surfaced by the claim dispatch flow.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("fid {fid} has already claimed")]
    AlreadyClaimed { fid: u64 },

    #[error(transparent)]
    Pool(#[from] WalletPoolError),

    /// The chain rejected the transaction because the wallet nonce is in use.
    #[error("wallet nonce already in use: {0}")]
    NonceConflict(String),

    /// The node already holds this exact signed transaction, so the send
    /// may have gone through. Never retried.
    #[error("transaction already known to the node: {0}")]
    AlreadyKnown(String),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("claim ledger error: {0}")]
    Ledger(String),
}

impl DispatchError {
    /// Map raw RPC error text into a typed error. Nonce races are the only
    /// chain failures worth retrying with another attempt.
    pub fn from_chain_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("already known") {
            DispatchError::AlreadyKnown(message)
        } else if lower.contains("nonce too low") || lower.contains("replacement transaction underpriced") {
            DispatchError::NonceConflict(message)
        } else {
            DispatchError::Chain(message)
        }
    }

    /// Whether a transaction may have reached the chain despite the error.
    pub fn may_have_sent(&self) -> bool {
        matches!(self, DispatchError::AlreadyKnown(_))
    }
}
