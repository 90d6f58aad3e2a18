//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription profile row from the database
///
/// One per subscriber; mutated only through the state machine's field deltas
/// applied by `ProfileRepository::apply_changes`. The `version` column backs
/// the compare-and-swap that serializes concurrent mutations.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub subscriber_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub active: bool,
    pub cancel_at_period_end: bool,
    pub pending_plan_change: bool,
    pub target_plan_id: Option<Uuid>,
    pub subscription_status: Option<String>,
    pub external_customer_ref: Option<String>,
    pub external_subscription_ref: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub usage_count: i64,
    pub last_checkout_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    /// Convert to domain SubscriberId
    pub fn subscriber_id(&self) -> tollgate_types::SubscriberId {
        tollgate_types::SubscriberId(self.subscriber_id)
    }
}

/// Plan row from the database
#[derive(Debug, Clone, FromRow)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A plan resolved together with one of its per-currency prices
///
/// Produced by joining `plans` and `plan_prices`; this is what both the
/// catalog resolver and the state machine work with.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ResolvedPlan {
    pub plan_id: Uuid,
    pub name: String,
    pub currency: String,
    pub price_ref: String,
    pub usage_limit: i64,
}

/// Webhook event row from the idempotency ledger
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEventRow {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Alert row from the database
#[derive(Debug, Clone, FromRow)]
pub struct AlertRow {
    pub id: Uuid,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}
