//! Resumable like/recast batches persisted in the lock store.
//!
//! Each driver pass advances every persisted batch by one window of signers,
//! checkpointing `currentIndex` after the window. A batch whose index reaches
//! the end gets a summary row and its key deleted.
//!
//! Several drivers may run at once (the HTTP trigger and `batch_driver`), so
//! a batch is only advanced under a short lease in the lock store.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::constants::*;
use crate::error::{EngagementError, StoreError};
use crate::models::{ActionType, BatchState, BatchSummary, Signer};
use crate::services::neynar::EngagementApi;
use crate::store::LockStore;

/// Durable destination for completed batch summaries.
#[async_trait]
pub trait BatchLogSink: Send + Sync {
    async fn record_summary(&self, summary: &BatchSummary) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// State already gone (completed or garbage-collected).
    Missing,
    /// Another driver holds this batch's lease; skipped this pass.
    InProgress,
    Advanced { current_index: usize, total: usize },
    Completed { summary: BatchSummary },
    /// Pass abandoned; the next pass retries from the persisted state.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

pub struct BatchProcessor {
    store: Arc<dyn LockStore>,
    api: Arc<dyn EngagementApi>,
    log_sink: Arc<dyn BatchLogSink>,
    window_size: usize,
    signer_delay: Duration,
}

pub fn batch_key(batch_id: &str) -> String {
    format!("{}{}", BATCH_KEY_PREFIX, batch_id)
}

pub fn batch_lease_key(batch_id: &str) -> String {
    format!("{}{}", BATCH_LEASE_PREFIX, batch_id)
}

impl BatchProcessor {
    pub fn new(store: Arc<dyn LockStore>, api: Arc<dyn EngagementApi>, log_sink: Arc<dyn BatchLogSink>) -> Self {
        Self {
            store,
            api,
            log_sink,
            window_size: BATCH_WINDOW_SIZE,
            signer_delay: Duration::from_millis(BATCH_SIGNER_DELAY_MS),
        }
    }

    pub fn with_signer_delay(mut self, delay: Duration) -> Self {
        self.signer_delay = delay;
        self
    }

    /// Persist a new batch for the approved signers. Returns the batch id and
    /// the number of signers kept.
    pub async fn enqueue(
        &self,
        cast_hash: &str,
        action_type: ActionType,
        target_fid: Option<u64>,
        signers: Vec<Signer>,
    ) -> Result<(String, usize), StoreError> {
        let offered = signers.len();
        let signers: Vec<Signer> = signers
            .into_iter()
            .filter(|s| s.status.eq_ignore_ascii_case(SIGNER_STATUS_APPROVED))
            .collect();
        let kept = signers.len();

        let batch_id = uuid::Uuid::new_v4().to_string();
        let state = BatchState::new(cast_hash.to_string(), action_type, target_fid, signers);
        self.save(&batch_id, &state).await?;

        tracing::info!(
            "Enqueued batch {} for cast {} with {} of {} signers",
            batch_id,
            cast_hash,
            kept,
            offered
        );
        Ok((batch_id, kept))
    }

    /// One driver invocation: advance every persisted batch by one window.
    pub async fn run_pass(&self) -> Result<Vec<BatchReport>, StoreError> {
        let keys = self.store.keys_with_prefix(BATCH_KEY_PREFIX).await?;
        if keys.is_empty() {
            tracing::debug!("No engagement batches pending");
        }

        let mut reports = Vec::with_capacity(keys.len());
        for key in keys {
            let batch_id = key.trim_start_matches(BATCH_KEY_PREFIX);
            reports.push(self.process_batch(batch_id).await);
        }
        Ok(reports)
    }

    pub async fn process_batch(&self, batch_id: &str) -> BatchReport {
        let outcome = match self.advance(batch_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Batch {} pass abandoned: {}", batch_id, e);
                BatchOutcome::Failed { reason: e.to_string() }
            }
        };
        BatchReport {
            batch_id: batch_id.to_string(),
            outcome,
        }
    }

    async fn advance(&self, batch_id: &str) -> anyhow::Result<BatchOutcome> {
        let lease_key = batch_lease_key(batch_id);
        if !self.store.set_if_absent(&lease_key, "1", BATCH_LEASE_TTL_SECS).await? {
            tracing::info!("Batch {} is being advanced by another driver, skipping", batch_id);
            return Ok(BatchOutcome::InProgress);
        }

        let outcome = self.advance_leased(batch_id).await;

        if let Err(e) = self.store.delete(&lease_key).await {
            tracing::warn!("Failed to release lease for batch {}: {} (TTL will clear it)", batch_id, e);
        }
        outcome
    }

    async fn advance_leased(&self, batch_id: &str) -> anyhow::Result<BatchOutcome> {
        let Some(mut state) = self.load(batch_id).await? else {
            tracing::info!("Batch {} state missing, treating as complete", batch_id);
            return Ok(BatchOutcome::Missing);
        };

        if !state.is_complete() {
            let start = state.current_index;
            let end = (start + self.window_size).min(state.signers.len());
            let window: Vec<Signer> = state.signers[start..end].to_vec();

            tracing::info!(
                "Batch {}: processing signers {}..{} of {}",
                batch_id,
                start,
                end,
                state.signers.len()
            );

            for (i, signer) in window.iter().enumerate() {
                self.engage(&mut state, signer).await;
                if i + 1 < window.len() && !self.signer_delay.is_zero() {
                    sleep(self.signer_delay).await;
                }
            }

            state.current_index = end;
            self.save(batch_id, &state).await?;
        }

        if !state.is_complete() {
            return Ok(BatchOutcome::Advanced {
                current_index: state.current_index,
                total: state.signers.len(),
            });
        }

        let summary = BatchSummary::from_state(batch_id, &state);
        self.log_sink.record_summary(&summary).await?;
        self.store.delete(&batch_key(batch_id)).await?;

        tracing::info!(
            "✅ Batch {} complete: {} successful, {} failed across {} signers",
            batch_id,
            summary.successful,
            summary.failed,
            summary.signer_count
        );
        Ok(BatchOutcome::Completed { summary })
    }

    async fn engage(&self, state: &mut BatchState, signer: &Signer) {
        for &reaction in state.action_type.reactions() {
            let permission = reaction.required_permission();
            if !signer.has_permission(permission) {
                let error = EngagementError::MissingPermission {
                    fid: signer.fid,
                    permission: permission.to_string(),
                };
                state.results.record_failure(signer.fid, reaction, error.to_string());
                continue;
            }

            match self
                .api
                .react(&signer.signer_uuid, reaction, &state.cast_hash, state.target_fid)
                .await
            {
                Ok(()) => state.results.record_success(signer.fid, reaction),
                Err(e) => {
                    tracing::warn!("{} by fid {} failed: {}", reaction, signer.fid, e);
                    state.results.record_failure(signer.fid, reaction, e.to_string());
                }
            }
        }
    }

    async fn load(&self, batch_id: &str) -> anyhow::Result<Option<BatchState>> {
        match self.store.get(&batch_key(batch_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, batch_id: &str, state: &BatchState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(state)?;
        self.store
            .set(&batch_key(batch_id), &raw, Some(BATCH_STATE_TTL_SECS))
            .await
    }
}
