use axum::{extract::State, response::Json};
use serde::Deserialize;

use super::{api_error, dispatch_status, ApiError, AppState};
use crate::models::{ClaimReceipt, WalletPurpose};

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub token: String,
    /// Defaults to the main airdrop wallets
    pub purpose: Option<WalletPurpose>,
}

pub async fn claim_airdrop(
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<ClaimReceipt>, ApiError> {
    let purpose = req.purpose.unwrap_or(WalletPurpose::MainAirdrop);

    match state.claims.claim(&req.token, purpose).await {
        Ok(receipt) => Ok(Json(receipt)),
        Err(e) => {
            let status = dispatch_status(&e);
            if status.is_server_error() {
                tracing::error!("Claim failed ({}): {}", purpose, e);
            } else {
                tracing::info!("Claim rejected ({}): {}", purpose, e);
            }
            Err(api_error(status, e.to_string()))
        }
    }
}
