//! PostgreSQL subscription profile repository implementation

use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::ProfileRow;
use crate::repo::{ProfileChanges, ProfileRepository};

const PROFILE_COLUMNS: &str = "subscriber_id, plan_id, active, cancel_at_period_end, \
     pending_plan_change, target_plan_id, subscription_status, external_customer_ref, \
     external_subscription_ref, current_period_end, usage_count, last_checkout_at, \
     version, created_at, updated_at";

/// PostgreSQL subscription profile repository
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn find_by_subscriber_id(&self, subscriber_id: Uuid) -> DbResult<Option<ProfileRow>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE subscriber_id = $1"
        ))
        .bind(subscriber_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> DbResult<Option<ProfileRow>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE external_subscription_ref = $1"
        ))
        .bind(subscription_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_customer_ref(&self, customer_ref: &str) -> DbResult<Option<ProfileRow>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE external_customer_ref = $1"
        ))
        .bind(customer_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn ensure_exists(&self, subscriber_id: Uuid) -> DbResult<ProfileRow> {
        sqlx::query(
            "INSERT INTO profiles (subscriber_id) VALUES ($1) \
             ON CONFLICT (subscriber_id) DO NOTHING",
        )
        .bind(subscriber_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE subscriber_id = $1"
        ))
        .bind(subscriber_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn apply_changes(
        &self,
        subscriber_id: Uuid,
        changes: &ProfileChanges,
        expected_version: i64,
    ) -> DbResult<bool> {
        if changes.is_empty() {
            return Ok(true);
        }

        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("UPDATE profiles SET version = version + 1, updated_at = NOW()");

        if let Some(v) = &changes.plan_id {
            qb.push(", plan_id = ").push_bind(*v);
        }
        if let Some(v) = changes.active {
            qb.push(", active = ").push_bind(v);
        }
        if let Some(v) = changes.cancel_at_period_end {
            qb.push(", cancel_at_period_end = ").push_bind(v);
        }
        if let Some(v) = changes.pending_plan_change {
            qb.push(", pending_plan_change = ").push_bind(v);
        }
        if let Some(v) = &changes.target_plan_id {
            qb.push(", target_plan_id = ").push_bind(*v);
        }
        if let Some(v) = &changes.subscription_status {
            qb.push(", subscription_status = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.external_customer_ref {
            qb.push(", external_customer_ref = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.external_subscription_ref {
            qb.push(", external_subscription_ref = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.current_period_end {
            qb.push(", current_period_end = ").push_bind(*v);
        }
        if let Some(v) = changes.usage_count {
            qb.push(", usage_count = ").push_bind(v);
        }
        if let Some(v) = changes.last_checkout_at {
            qb.push(", last_checkout_at = ").push_bind(v);
        }

        qb.push(" WHERE subscriber_id = ").push_bind(subscriber_id);
        qb.push(" AND version = ").push_bind(expected_version);

        let result = qb.build().execute(&self.pool).await?;

        Ok(result.rows_affected() == 1)
    }
}
