//! PostgreSQL alert repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tollgate_types::AlertDraft;

use crate::error::DbResult;
use crate::models::AlertRow;
use crate::repo::AlertRepository;

/// PostgreSQL alert repository
#[derive(Clone)]
pub struct PgAlertRepository {
    pool: PgPool,
}

impl PgAlertRepository {
    /// Create a new alert repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for PgAlertRepository {
    async fn create(&self, alert: &AlertDraft) -> DbResult<AlertRow> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            INSERT INTO alerts (id, alert_type, severity, message, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, alert_type, severity, message, metadata, resolved, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&alert.alert_type)
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(&alert.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_unresolved(&self, limit: i64) -> DbResult<Vec<AlertRow>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT id, alert_type, severity, message, metadata, resolved, created_at \
             FROM alerts WHERE resolved = FALSE \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
