//! Checkout handler

use std::time::Instant;

use axum::extract::State;
use axum::response::Redirect;
use axum::Form;
use serde::Deserialize;

use tollgate_billing_core::CheckoutOutcome;

use crate::error::{ApiError, ApiResult};
use crate::extractors::Subscriber;
use crate::state::AppState;

/// Maximum length for user-provided form fields
const MAX_FIELD_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub plan: String,
    pub currency: String,
}

/// Validate a plan name from the checkout form.
///
/// Plan names are catalog keys: short, lowercase, no whitespace. Rejecting
/// everything else keeps arbitrary user input out of logs and metrics
/// labels.
pub fn validate_plan_name(plan: &str) -> Result<(), ApiError> {
    if plan.is_empty() {
        return Err(ApiError::BadRequest("Plan cannot be empty".into()));
    }
    if plan.len() > MAX_FIELD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Plan too long (max {MAX_FIELD_LEN} chars)"
        )));
    }
    if !plan
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(ApiError::BadRequest(
            "Plan contains invalid characters (use lowercase alphanumeric, _, -)".into(),
        ));
    }
    Ok(())
}

/// Validate an ISO 4217-shaped currency code (three ASCII letters)
pub fn validate_currency(currency: &str) -> Result<(), ApiError> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::BadRequest(format!(
            "Invalid currency code: {currency}"
        )));
    }
    Ok(())
}

/// POST /api/v1/billing/checkout
///
/// Initiate a subscription or plan change and redirect the subscriber to
/// the next step: the processor's hosted payment page for a new
/// subscription, or the internal pending page for an in-place change.
pub async fn create_checkout(
    State(state): State<AppState>,
    Subscriber(subscriber_id): Subscriber,
    Form(form): Form<CheckoutForm>,
) -> ApiResult<Redirect> {
    let start = Instant::now();

    validate_plan_name(&form.plan)?;
    validate_currency(&form.currency)?;
    let currency = form.currency.to_ascii_lowercase();

    let outcome = state
        .billing
        .initiate_checkout(subscriber_id, &form.plan, &currency)
        .await?;

    metrics::counter!("billing_checkouts_created_total").increment(1);
    metrics::histogram!("billing_operation_duration_seconds", "operation" => "create_checkout")
        .record(start.elapsed().as_secs_f64());

    tracing::info!(subscriber_id = %subscriber_id, plan = %form.plan, "Checkout initiated");

    let redirect_url = match outcome {
        CheckoutOutcome::HostedCheckout { redirect_url } => redirect_url,
        CheckoutOutcome::ChangePending { redirect_url } => redirect_url,
    };
    Ok(Redirect::to(&redirect_url))
}
