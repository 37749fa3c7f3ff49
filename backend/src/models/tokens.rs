use serde::{Deserialize, Serialize};

/// Signed portion of a one-time token. Field order is the signing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub fid: u64,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_fid: Option<u64>,
    pub timestamp: i64,
    pub nonce: String,
}

/// Token as transported (base64 of this JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(flatten)]
    pub payload: TokenPayload,
    pub signature: String,
}

/// Server-side single-use registry entry, keyed by nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceRecord {
    pub fid: u64,
    pub address: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub fid: u64,
    pub address: String,
    pub username: Option<String>,
    pub client_fid: Option<u64>,
}
