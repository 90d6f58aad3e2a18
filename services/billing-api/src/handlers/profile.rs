//! Billing profile handler

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiResult;
use crate::extractors::Subscriber;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub subscriber_id: String,
    pub active: bool,
    pub plan: Option<PlanView>,
    pub subscription_status: Option<String>,
    pub cancel_at_period_end: bool,
    pub pending_plan_change: bool,
    pub current_period_end: Option<String>,
    pub usage_count: i64,
    pub customer_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanView {
    pub name: String,
    pub usage_limit: i64,
}

/// GET /api/v1/billing/profile
///
/// A subscriber who has never touched billing gets the default inactive
/// view rather than a 404; not having a profile row is a normal state.
pub async fn get_profile(
    State(state): State<AppState>,
    Subscriber(subscriber_id): Subscriber,
) -> ApiResult<Json<ProfileResponse>> {
    let start = Instant::now();

    let response = match state.billing.get_profile(subscriber_id).await? {
        Some(snapshot) => ProfileResponse {
            subscriber_id: subscriber_id.to_string(),
            active: snapshot.profile.active,
            plan: snapshot.plan.map(|p| PlanView {
                name: p.name,
                usage_limit: p.usage_limit,
            }),
            subscription_status: snapshot.profile.subscription_status,
            cancel_at_period_end: snapshot.profile.cancel_at_period_end,
            pending_plan_change: snapshot.profile.pending_plan_change,
            current_period_end: snapshot
                .profile
                .current_period_end
                .map(|t| t.to_rfc3339()),
            usage_count: snapshot.profile.usage_count,
            customer_ref: snapshot.profile.external_customer_ref,
        },
        None => ProfileResponse {
            subscriber_id: subscriber_id.to_string(),
            active: false,
            plan: None,
            subscription_status: None,
            cancel_at_period_end: false,
            pending_plan_change: false,
            current_period_end: None,
            usage_count: 0,
            customer_ref: None,
        },
    };

    metrics::histogram!("billing_operation_duration_seconds", "operation" => "get_profile")
        .record(start.elapsed().as_secs_f64());

    Ok(Json(response))
}
