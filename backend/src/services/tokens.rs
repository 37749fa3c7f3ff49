use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::constants::*;
use crate::error::{StoreError, TokenError};
use crate::models::{AuthToken, NonceRecord, TokenPayload, VerifiedIdentity};
use crate::store::LockStore;

type HmacSha256 = Hmac<Sha256>;

/// Issues and consumes single-use bearer tokens binding a FID to an address.
///
/// A token is valid if its HMAC matches, it is younger than five minutes and
/// its nonce is still present in the lock store. Successful verification
/// deletes the nonce, so each token verifies at most once.
pub struct TokenService {
    secret: Vec<u8>,
    store: Arc<dyn LockStore>,
}

impl TokenService {
    pub fn new(secret: impl Into<Vec<u8>>, store: Arc<dyn LockStore>) -> anyhow::Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(anyhow::anyhow!("Token HMAC secret must not be empty"));
        }
        Ok(Self { secret, store })
    }

    pub async fn issue(
        &self,
        fid: u64,
        address: &str,
        username: Option<String>,
        client_fid: Option<u64>,
    ) -> Result<String, TokenError> {
        self.issue_at(fid, address, username, client_fid, Utc::now().timestamp_millis())
            .await
    }

    /// Issue with an explicit timestamp in unix milliseconds.
    pub async fn issue_at(
        &self,
        fid: u64,
        address: &str,
        username: Option<String>,
        client_fid: Option<u64>,
        timestamp: i64,
    ) -> Result<String, TokenError> {
        let payload = TokenPayload {
            fid,
            address: address.to_string(),
            username,
            client_fid,
            timestamp,
            nonce: generate_nonce(),
        };
        let signature = self.sign(&payload)?;

        let record = NonceRecord {
            fid,
            address: payload.address.clone(),
            timestamp,
        };
        self.store
            .set(
                &nonce_key(&payload.nonce),
                &serde_json::to_string(&record).map_err(StoreError::from)?,
                Some(TOKEN_TTL_SECS),
            )
            .await?;

        let token = AuthToken { payload, signature };
        let json = serde_json::to_vec(&token).map_err(StoreError::from)?;

        tracing::debug!("Issued one-time token for fid {} ({})", fid, address);
        Ok(STANDARD.encode(json))
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, TokenError> {
        self.verify_at(token, Utc::now().timestamp_millis()).await
    }

    /// Verify against an explicit "now" in unix milliseconds.
    pub async fn verify_at(&self, token: &str, now_ms: i64) -> Result<VerifiedIdentity, TokenError> {
        let token = decode_token(token)?;
        let payload = &token.payload;

        // The timestamp is unauthenticated at this point
        let age_ms = now_ms
            .checked_sub(payload.timestamp)
            .ok_or(TokenError::Malformed)?;
        if age_ms > TOKEN_MAX_AGE_MS {
            tracing::info!("Rejected expired token for fid {}", payload.fid);
            return Err(TokenError::Expired);
        }

        let key = nonce_key(&payload.nonce);
        let record = match self.store.get(&key).await? {
            Some(raw) => serde_json::from_str::<NonceRecord>(&raw).map_err(StoreError::from)?,
            None => {
                tracing::info!("Rejected used or unknown token for fid {}", payload.fid);
                return Err(TokenError::AlreadyUsedOrUnknown);
            }
        };

        self.check_signature(payload, &token.signature)?;

        if record.fid != payload.fid || !record.address.eq_ignore_ascii_case(&payload.address) {
            tracing::warn!(
                "Token data mismatch for nonce {}: registry fid {} vs token fid {}",
                payload.nonce,
                record.fid,
                payload.fid
            );
            return Err(TokenError::DataMismatch);
        }

        // Only the caller whose delete removed the nonce may succeed
        if !self.store.delete(&key).await? {
            tracing::info!("Token for fid {} consumed concurrently, rejecting", payload.fid);
            return Err(TokenError::AlreadyUsedOrUnknown);
        }

        Ok(VerifiedIdentity {
            fid: payload.fid,
            address: payload.address.clone(),
            username: payload.username.clone(),
            client_fid: payload.client_fid,
        })
    }

    fn mac(&self, payload: &TokenPayload) -> Result<HmacSha256, TokenError> {
        let message = serde_json::to_vec(payload).map_err(StoreError::from)?;
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::InvalidSignature)?;
        mac.update(&message);
        Ok(mac)
    }

    fn sign(&self, payload: &TokenPayload) -> Result<String, TokenError> {
        Ok(hex::encode(self.mac(payload)?.finalize().into_bytes()))
    }

    fn check_signature(&self, payload: &TokenPayload, signature: &str) -> Result<(), TokenError> {
        let provided = hex::decode(signature).map_err(|_| TokenError::InvalidSignature)?;
        self.mac(payload)?
            .verify_slice(&provided)
            .map_err(|_| TokenError::InvalidSignature)
    }
}

fn decode_token(token: &str) -> Result<AuthToken, TokenError> {
    let bytes = STANDARD.decode(token.trim()).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

fn nonce_key(nonce: &str) -> String {
    format!("{}{}", TOKEN_NONCE_PREFIX, nonce)
}

fn generate_nonce() -> String {
    let bytes: [u8; TOKEN_NONCE_BYTES] = rand::random();
    hex::encode(bytes)
}
