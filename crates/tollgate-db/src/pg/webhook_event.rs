//! PostgreSQL idempotency ledger implementation
//!
//! Insert-unless-present against the `event_id` uniqueness constraint; a
//! conflicting insert identifies a duplicate delivery and the caller
//! short-circuits without touching any profile.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::DbResult;
use crate::models::WebhookEventRow;
use crate::repo::{IngestOutcome, WebhookEventRepository};

/// PostgreSQL idempotency ledger
#[derive(Clone)]
pub struct PgWebhookEventRepository {
    pool: PgPool,
}

impl PgWebhookEventRepository {
    /// Create a new webhook event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for PgWebhookEventRepository {
    async fn record_if_new(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> DbResult<IngestOutcome> {
        let result = sqlx::query(
            "INSERT INTO webhook_events (event_id, event_type, payload) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(IngestOutcome::New)
        } else {
            Ok(IngestOutcome::Duplicate)
        }
    }

    async fn find_by_event_id(&self, event_id: &str) -> DbResult<Option<WebhookEventRow>> {
        let row = sqlx::query_as::<_, WebhookEventRow>(
            "SELECT event_id, event_type, payload, received_at \
             FROM webhook_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
