//! Payment processor webhook handler

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use tollgate_billing_core::WebhookOutcome;

use crate::state::AppState;

/// POST /webhooks/stripe
///
/// Ingest a processor event. Acknowledgement contract: 400 only for
/// signature or envelope failures (processor should not retry a payload we
/// cannot authenticate), 500 only when the event could not be durably
/// recorded (processor should redeliver), 200 for everything else including
/// duplicates.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();

    let Some(sig_header) = headers.get("stripe-signature") else {
        tracing::warn!("Missing Stripe-Signature header");
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Ok(signature) = sig_header.to_str() else {
        tracing::warn!("Invalid Stripe-Signature header encoding");
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.billing.process_webhook(&body, signature).await {
        Ok(outcome) => {
            let status = match outcome {
                WebhookOutcome::Processed => "processed",
                WebhookOutcome::Duplicate => "duplicate",
            };
            metrics::counter!("billing_webhooks_processed_total", "status" => status).increment(1);
            metrics::histogram!(
                "billing_operation_duration_seconds",
                "operation" => "process_webhook"
            )
            .record(start.elapsed().as_secs_f64());

            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(e) if e.is_signature_error() => {
            tracing::warn!(error = %e, "Webhook rejected");
            metrics::counter!("billing_webhooks_processed_total", "status" => "rejected")
                .increment(1);
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(e) => {
            // Only a ledger write failure reaches here; ask for redelivery.
            tracing::error!(error = %e, "Webhook could not be recorded");
            metrics::counter!("billing_webhooks_processed_total", "status" => "error").increment(1);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
