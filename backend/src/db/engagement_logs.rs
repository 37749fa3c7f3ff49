use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::BatchSummary;
use crate::services::batch::BatchLogSink;

#[derive(Debug, Clone)]
pub struct PgBatchLogSink {
    pool: PgPool,
}

impl PgBatchLogSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn insert_batch_summary(pool: &PgPool, summary: &BatchSummary) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO likes_recasts_logs
            (batch_id, cast_hash, action_type, signer_count, successful, failed, errors)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (batch_id) DO NOTHING
        "#
    )
    .bind(&summary.batch_id)
    .bind(&summary.cast_hash)
    .bind(summary.action_type.as_str())
    .bind(summary.signer_count as i32)
    .bind(summary.successful as i32)
    .bind(summary.failed as i32)
    .bind(serde_json::to_value(&summary.errors)?)
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl BatchLogSink for PgBatchLogSink {
    async fn record_summary(&self, summary: &BatchSummary) -> Result<()> {
        insert_batch_summary(&self.pool, summary).await
    }
}
