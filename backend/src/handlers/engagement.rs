use axum::{extract::State, http::{HeaderMap, StatusCode}, response::Json};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{api_error, require_internal, ApiError, AppState};
use crate::models::{ActionType, Signer};
use crate::services::BatchReport;

static CAST_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("cast hash pattern is valid"));

#[derive(Debug, Deserialize)]
pub struct EnqueueBatchRequest {
    pub cast_hash: String,
    pub action_type: ActionType,
    pub target_fid: Option<u64>,
    pub signers: Vec<Signer>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueBatchResponse {
    pub batch_id: String,
    pub signer_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub processed: usize,
    pub batches: Vec<BatchReport>,
}

fn is_valid_cast_hash(cast_hash: &str) -> bool {
    CAST_HASH_RE.is_match(cast_hash)
}

pub async fn enqueue_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EnqueueBatchRequest>,
) -> Result<Json<EnqueueBatchResponse>, ApiError> {
    require_internal(&headers, &state)?;

    if !is_valid_cast_hash(&req.cast_hash) {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid cast hash"));
    }

    let (batch_id, signer_count) = state
        .batches
        .enqueue(&req.cast_hash, req.action_type, req.target_fid, req.signers)
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist batch for cast {}: {}", req.cast_hash, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to persist batch")
        })?;

    if signer_count == 0 {
        tracing::warn!("Batch {} for cast {} has no approved signers", batch_id, req.cast_hash);
    }

    Ok(Json(EnqueueBatchResponse { batch_id, signer_count }))
}

/// Scheduler trigger: advances every pending batch by one window.
pub async fn process_batches(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProcessResponse>, ApiError> {
    require_internal(&headers, &state)?;

    let batches = state.batches.run_pass().await.map_err(|e| {
        tracing::error!("Failed to list pending batches: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list pending batches")
    })?;

    Ok(Json(ProcessResponse {
        processed: batches.len(),
        batches,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cast_hash() {
        assert!(is_valid_cast_hash("0x71d5225f77e0164388b1d4c120825f3a2c1f131c"));
        assert!(is_valid_cast_hash("0x71D5225F77E0164388B1D4C120825F3A2C1F131C"));
    }

    #[test]
    fn test_invalid_cast_hash() {
        assert!(!is_valid_cast_hash("71d5225f77e0164388b1d4c120825f3a2c1f131c"));
        assert!(!is_valid_cast_hash("0x71d5225f"));
        assert!(!is_valid_cast_hash("0xzzd5225f77e0164388b1d4c120825f3a2c1f131c"));
    }
}
