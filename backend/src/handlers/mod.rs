pub mod claim;
pub mod engagement;
pub mod token;

use axum::{http::{HeaderMap, StatusCode}, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::constants::INTERNAL_SECRET_HEADER;
use crate::error::{DispatchError, TokenError, WalletPoolError};
use crate::services::{BatchProcessor, ClaimService, TokenService};

pub use claim::claim_airdrop;
pub use engagement::{enqueue_batch, process_batches};
pub use token::issue_token;

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub claims: Arc<ClaimService>,
    pub batches: Arc<BatchProcessor>,
    pub internal_api_secret: Arc<str>,
}

pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Internal endpoints require the shared secret header.
pub fn require_internal(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let provided = headers
        .get(INTERNAL_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !provided.is_empty() && provided == state.internal_api_secret.as_ref() {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

pub fn dispatch_status(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::Token(TokenError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        DispatchError::Token(_) => StatusCode::UNAUTHORIZED,
        DispatchError::AlreadyClaimed { .. } => StatusCode::CONFLICT,
        DispatchError::Pool(WalletPoolError::Exhausted { .. })
        | DispatchError::Pool(WalletPoolError::WalletBusy { .. })
        | DispatchError::NonceConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
