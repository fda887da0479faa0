//! Turnaround-time metrics hook
//!
//! The metric formulas live with storage; the gateway only signals that a
//! qualifying agent reply happened. Invoked fire-and-forget from the
//! message relay's side-effect task.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use deskhub_shared::StoreError;

/// Updater for conversation turnaround-time metrics
#[async_trait]
pub trait TatMetrics: Send + Sync {
    /// Record a qualifying agent reply on a conversation
    async fn record_agent_reply(&self, conversation_id: Uuid) -> Result<(), StoreError>;
}

/// Postgres-backed updater; stamps first-response fields once and keeps
/// the last-reply marker fresh
pub struct PgTatMetrics {
    pool: PgPool,
}

impl PgTatMetrics {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TatMetrics for PgTatMetrics {
    async fn record_agent_reply(&self, conversation_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET first_response_at = COALESCE(first_response_at, NOW()),
                first_response_seconds = COALESCE(
                    first_response_seconds,
                    CAST(EXTRACT(EPOCH FROM (NOW() - created_at)) AS BIGINT)
                ),
                last_agent_reply_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
