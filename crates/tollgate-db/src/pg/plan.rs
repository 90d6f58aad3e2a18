//! PostgreSQL plan catalog repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::{PlanRow, ResolvedPlan};
use crate::repo::PlanRepository;

/// PostgreSQL plan catalog repository
#[derive(Clone)]
pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    /// Create a new plan repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>> {
        let plan = sqlx::query_as::<_, PlanRow>(
            "SELECT id, name, created_at FROM plans WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn find_by_name(&self, name: &str) -> DbResult<Option<PlanRow>> {
        let plan = sqlx::query_as::<_, PlanRow>(
            "SELECT id, name, created_at FROM plans WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn resolve_by_price_ref(&self, price_ref: &str) -> DbResult<Option<ResolvedPlan>> {
        let resolved = sqlx::query_as::<_, ResolvedPlan>(
            r#"
            SELECT p.id AS plan_id, p.name, pp.currency, pp.price_ref, pp.usage_limit
            FROM plans p
            JOIN plan_prices pp ON pp.plan_id = p.id
            WHERE pp.price_ref = $1
            "#,
        )
        .bind(price_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(resolved)
    }

    async fn resolve_by_name(
        &self,
        name: &str,
        currency: &str,
    ) -> DbResult<Option<ResolvedPlan>> {
        let resolved = sqlx::query_as::<_, ResolvedPlan>(
            r#"
            SELECT p.id AS plan_id, p.name, pp.currency, pp.price_ref, pp.usage_limit
            FROM plans p
            JOIN plan_prices pp ON pp.plan_id = p.id
            WHERE p.name = $1 AND pp.currency = $2
            "#,
        )
        .bind(name)
        .bind(currency)
        .fetch_optional(&self.pool)
        .await?;

        Ok(resolved)
    }

    async fn limit_for(&self, plan_id: Uuid, currency: &str) -> DbResult<Option<i64>> {
        let limit: Option<(i64,)> = sqlx::query_as(
            "SELECT usage_limit FROM plan_prices WHERE plan_id = $1 AND currency = $2",
        )
        .bind(plan_id)
        .bind(currency)
        .fetch_optional(&self.pool)
        .await?;

        Ok(limit.map(|(l,)| l))
    }

    async fn prices_for_plan(&self, plan_id: Uuid) -> DbResult<Vec<ResolvedPlan>> {
        let prices = sqlx::query_as::<_, ResolvedPlan>(
            r#"
            SELECT p.id AS plan_id, p.name, pp.currency, pp.price_ref, pp.usage_limit
            FROM plans p
            JOIN plan_prices pp ON pp.plan_id = p.id
            WHERE p.id = $1
            ORDER BY pp.currency
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(prices)
    }
}
