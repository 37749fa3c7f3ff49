use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::constants::*;
use crate::error::EngagementError;
use crate::models::Reaction;

/// Social actions the batch processor performs on behalf of a signer.
#[async_trait]
pub trait EngagementApi: Send + Sync {
    async fn react(
        &self,
        signer_uuid: &str,
        reaction: Reaction,
        cast_hash: &str,
        target_fid: Option<u64>,
    ) -> Result<(), EngagementError>;
}

#[derive(Debug, Serialize)]
struct ReactionRequest<'a> {
    signer_uuid: &'a str,
    reaction_type: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_author_fid: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NeynarClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NeynarClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: NEYNAR_API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EngagementApi for NeynarClient {
    async fn react(
        &self,
        signer_uuid: &str,
        reaction: Reaction,
        cast_hash: &str,
        target_fid: Option<u64>,
    ) -> Result<(), EngagementError> {
        let url = format!("{}/reaction", self.base_url);
        let body = ReactionRequest {
            signer_uuid,
            reaction_type: reaction.as_str(),
            target: cast_hash,
            target_author_fid: target_fid,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(Duration::from_secs(NEYNAR_REQUEST_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("{} on {} by signer {} succeeded", reaction, cast_hash, signer_uuid);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(EngagementError::Api {
            status: status.as_u16(),
            body,
        })
    }
}
