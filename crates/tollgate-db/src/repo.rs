//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// Field delta produced by a state-machine transition.
///
/// Outer `Option` means "leave unchanged"; inner `Option` (for nullable
/// columns) carries the new value, including clearing to NULL.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfileChanges {
    pub plan_id: Option<Option<Uuid>>,
    pub active: Option<bool>,
    pub cancel_at_period_end: Option<bool>,
    pub pending_plan_change: Option<bool>,
    pub target_plan_id: Option<Option<Uuid>>,
    pub subscription_status: Option<Option<String>>,
    pub external_customer_ref: Option<Option<String>>,
    pub external_subscription_ref: Option<Option<String>>,
    pub current_period_end: Option<Option<DateTime<Utc>>>,
    pub usage_count: Option<i64>,
    pub last_checkout_at: Option<DateTime<Utc>>,
}

impl ProfileChanges {
    /// True when the delta would not touch any column
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply this delta to an in-memory row, bumping the version.
    ///
    /// Mirrors the SQL `UPDATE` built by the Postgres repository; used by
    /// in-memory test repositories and by callers that need the post-write
    /// view without a re-read.
    pub fn apply_to(&self, row: &mut ProfileRow) {
        if let Some(v) = &self.plan_id {
            row.plan_id = *v;
        }
        if let Some(v) = self.active {
            row.active = v;
        }
        if let Some(v) = self.cancel_at_period_end {
            row.cancel_at_period_end = v;
        }
        if let Some(v) = self.pending_plan_change {
            row.pending_plan_change = v;
        }
        if let Some(v) = &self.target_plan_id {
            row.target_plan_id = *v;
        }
        if let Some(v) = &self.subscription_status {
            row.subscription_status = v.clone();
        }
        if let Some(v) = &self.external_customer_ref {
            row.external_customer_ref = v.clone();
        }
        if let Some(v) = &self.external_subscription_ref {
            row.external_subscription_ref = v.clone();
        }
        if let Some(v) = &self.current_period_end {
            row.current_period_end = *v;
        }
        if let Some(v) = self.usage_count {
            row.usage_count = v;
        }
        if let Some(v) = self.last_checkout_at {
            row.last_checkout_at = Some(v);
        }
        row.version += 1;
        row.updated_at = Utc::now();
    }
}

/// Subscription profile repository trait
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Find a profile by subscriber ID
    async fn find_by_subscriber_id(&self, subscriber_id: Uuid) -> DbResult<Option<ProfileRow>>;

    /// Find a profile by external subscription reference
    async fn find_by_subscription_ref(&self, subscription_ref: &str)
        -> DbResult<Option<ProfileRow>>;

    /// Find a profile by external customer reference
    async fn find_by_customer_ref(&self, customer_ref: &str) -> DbResult<Option<ProfileRow>>;

    /// Ensure a profile row exists for the subscriber, returning it.
    ///
    /// Inserts a default (no-access) row unless one is already present.
    async fn ensure_exists(&self, subscriber_id: Uuid) -> DbResult<ProfileRow>;

    /// Apply a field delta as a single conditional write.
    ///
    /// The write succeeds only if the row's `version` still equals
    /// `expected_version`; returns `false` when a concurrent mutation won.
    async fn apply_changes(
        &self,
        subscriber_id: Uuid,
        changes: &ProfileChanges,
        expected_version: i64,
    ) -> DbResult<bool>;
}

/// Plan catalog repository trait
///
/// Plans are immutable reference data.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Find a plan by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>>;

    /// Find a plan by display name
    async fn find_by_name(&self, name: &str) -> DbResult<Option<PlanRow>>;

    /// Resolve a plan from an external price reference
    async fn resolve_by_price_ref(&self, price_ref: &str) -> DbResult<Option<ResolvedPlan>>;

    /// Resolve a plan from its display name and a currency
    async fn resolve_by_name(&self, name: &str, currency: &str)
        -> DbResult<Option<ResolvedPlan>>;

    /// Usage limit of a plan in a given currency
    async fn limit_for(&self, plan_id: Uuid, currency: &str) -> DbResult<Option<i64>>;

    /// All per-currency prices of a plan, ordered by currency
    async fn prices_for_plan(&self, plan_id: Uuid) -> DbResult<Vec<ResolvedPlan>>;
}

/// Outcome of recording an event in the idempotency ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First time this event ID was seen
    New,
    /// Duplicate delivery; caller must short-circuit
    Duplicate,
}

/// Idempotency ledger repository trait
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Record an event unless its ID was already seen.
    ///
    /// Atomic insert-unless-present backed by a uniqueness constraint; a
    /// conflicting insert is evidence of a duplicate delivery.
    async fn record_if_new(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> DbResult<IngestOutcome>;

    /// Find a previously recorded event by ID
    async fn find_by_event_id(&self, event_id: &str) -> DbResult<Option<WebhookEventRow>>;
}

/// Alert repository trait
///
/// Append-only; resolution is an out-of-band operator action.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Persist an alert
    async fn create(&self, alert: &tollgate_types::AlertDraft) -> DbResult<AlertRow>;

    /// List unresolved alerts, newest first
    async fn list_unresolved(&self, limit: i64) -> DbResult<Vec<AlertRow>>;
}
