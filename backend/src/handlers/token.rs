use axum::{extract::State, http::{HeaderMap, StatusCode}, response::Json};
use serde::{Deserialize, Serialize};

use super::{api_error, require_internal, ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    pub fid: u64,
    pub address: String,
    pub username: Option<String>,
    pub client_fid: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub token: String,
}

/// Called by the identity verifier once it has proven the FID controls the address.
pub async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IssueTokenRequest>,
) -> Result<Json<IssueTokenResponse>, ApiError> {
    require_internal(&headers, &state)?;

    if req.address.parse::<alloy::primitives::Address>().is_err() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid wallet address format"));
    }

    let token = state
        .tokens
        .issue(req.fid, &req.address, req.username, req.client_fid)
        .await
        .map_err(|e| {
            tracing::error!("Failed to issue token for fid {}: {}", req.fid, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to issue token")
        })?;

    Ok(Json(IssueTokenResponse { token }))
}
