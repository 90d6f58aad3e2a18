//! Webhook ingestion gateway
//!
//! Verifies inbound event authenticity against the shared signing secret and
//! decodes the envelope into typed event data for the reconciliation
//! pipeline. Signature and decode failures are the only webhook failures the
//! processor should redeliver for.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use tollgate_types::SubscriberId;

use crate::error::BillingError;
use crate::period::extract_period_end;

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Hosted checkout flow completed
    CheckoutCompleted,
    /// Subscription created at the processor
    SubscriptionCreated,
    /// Subscription updated at the processor
    SubscriptionUpdated,
    /// Subscription deleted at the processor
    SubscriptionDeleted,
    /// Invoice payment succeeded (new billing period)
    InvoicePaymentSucceeded,
    /// Invoice payment failed
    InvoicePaymentFailed,
    /// Unknown event type
    Unknown(String),
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.payment_succeeded" | "invoice.paid" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Parsed webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Event ID (idempotency key)
    pub id: String,
    /// Parsed event kind
    pub kind: EventKind,
    /// Raw event type string as delivered
    pub raw_type: String,
    /// Typed event data
    pub data: EventData,
    /// Full envelope, retained for the idempotency ledger
    pub payload: Value,
    /// When the event was created at the processor (Unix timestamp)
    pub created: i64,
}

/// Typed webhook event data
#[derive(Debug, Clone)]
pub enum EventData {
    /// Checkout session data
    Checkout(CheckoutSessionData),
    /// Subscription data
    Subscription(SubscriptionData),
    /// Invoice data
    Invoice(InvoiceData),
    /// Raw object for unknown events
    Raw(Value),
}

/// Checkout-flow-completed data
#[derive(Debug, Clone)]
pub struct CheckoutSessionData {
    /// Session ID
    pub session_id: String,
    /// External customer reference
    pub customer_ref: Option<String>,
    /// External subscription reference
    pub subscription_ref: Option<String>,
    /// Subscriber correlated via session metadata
    pub subscriber_id: Option<SubscriberId>,
    /// Line-item price reference, when present in the payload
    pub price_ref: Option<String>,
}

/// Subscription event data
#[derive(Debug, Clone)]
pub struct SubscriptionData {
    /// External subscription reference
    pub subscription_ref: String,
    /// External customer reference
    pub customer_ref: Option<String>,
    /// Raw processor status
    pub status: String,
    /// Whether the subscription cancels at period end
    pub cancel_at_period_end: bool,
    /// First item's price reference
    pub price_ref: Option<String>,
    /// Current billing period end
    pub current_period_end: Option<DateTime<Utc>>,
    /// Subscriber from event metadata, when present
    pub subscriber_id: Option<SubscriberId>,
}

/// Invoice event data
#[derive(Debug, Clone)]
pub struct InvoiceData {
    /// External invoice reference
    pub invoice_ref: String,
    /// External customer reference
    pub customer_ref: Option<String>,
    /// External subscription reference
    pub subscription_ref: Option<String>,
    /// Next scheduled payment retry; `None` means this was the final attempt
    pub next_payment_attempt: Option<DateTime<Utc>>,
    /// Billing period end covered by this invoice
    pub period_end: Option<DateTime<Utc>>,
    /// Subscriber from event metadata, when present
    pub subscriber_id: Option<SubscriberId>,
}

/// Webhook handler for verifying and decoding processor events
#[derive(Clone)]
pub struct WebhookHandler {
    webhook_secret: String,
}

impl WebhookHandler {
    /// Create a new webhook handler
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Verify and parse a webhook payload
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError> {
        self.verify_signature(payload, signature)?;

        let envelope: Value = serde_json::from_slice(payload)
            .map_err(|e| BillingError::Signature(format!("invalid envelope: {e}")))?;

        let raw_event: RawEvent = serde_json::from_value(envelope.clone())
            .map_err(|e| BillingError::Signature(format!("invalid envelope: {e}")))?;

        debug!(event_id = %raw_event.id, event_type = %raw_event.event_type, "Parsed webhook event");

        let kind = EventKind::from(raw_event.event_type.as_str());
        let data = parse_event_data(&kind, raw_event.data.object)?;

        Ok(WebhookEvent {
            id: raw_event.id,
            kind,
            raw_type: raw_event.event_type,
            data,
            payload: envelope,
            created: raw_event.created,
        })
    }

    /// Verify the webhook signature header (`t=<ts>,v1=<hex hmac>`)
    fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<(), BillingError> {
        let mut timestamp: Option<&str> = None;
        let mut sig_v1: Option<&str> = None;

        for part in signature.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => sig_v1 = Some(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            warn!("Missing timestamp in webhook signature");
            BillingError::Signature("missing timestamp".to_string())
        })?;

        let sig_v1 = sig_v1.ok_or_else(|| {
            warn!("Missing v1 signature in webhook signature");
            BillingError::Signature("missing signature".to_string())
        })?;

        let signed_payload = format!(
            "{}.{}",
            timestamp,
            std::str::from_utf8(payload)
                .map_err(|_| BillingError::Signature("invalid payload encoding".to_string()))?
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| BillingError::Internal("HMAC error".to_string()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if !constant_time_eq(sig_v1.as_bytes(), expected.as_bytes()) {
            warn!("Webhook signature verification failed");
            return Err(BillingError::Signature(
                "signature verification failed".to_string(),
            ));
        }

        // Freshness window: 5 minutes
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| BillingError::Signature("invalid timestamp format".to_string()))?;
        let now = Utc::now().timestamp();
        if (now - ts).abs() > 300 {
            warn!(timestamp = ts, now = now, "Webhook timestamp too old");
            return Err(BillingError::Signature("timestamp too old".to_string()));
        }

        Ok(())
    }
}

/// Parse event data based on kind
fn parse_event_data(kind: &EventKind, object: Value) -> Result<EventData, BillingError> {
    match kind {
        EventKind::CheckoutCompleted => {
            let session: RawCheckoutSession = serde_json::from_value(object.clone())
                .map_err(|e| BillingError::Signature(format!("invalid checkout session: {e}")))?;
            let price_ref = object
                .pointer("/line_items/data/0/price/id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .or_else(|| metadata_str(&object, "price_ref"));
            Ok(EventData::Checkout(CheckoutSessionData {
                session_id: session.id,
                customer_ref: session.customer,
                subscription_ref: session.subscription,
                subscriber_id: metadata_subscriber(&object),
                price_ref,
            }))
        }
        EventKind::SubscriptionCreated
        | EventKind::SubscriptionUpdated
        | EventKind::SubscriptionDeleted => {
            let sub: RawSubscription = serde_json::from_value(object.clone())
                .map_err(|e| BillingError::Signature(format!("invalid subscription: {e}")))?;
            let price_ref = object
                .pointer("/items/data/0/price/id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .or_else(|| {
                    object
                        .pointer("/plan/id")
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                });
            Ok(EventData::Subscription(SubscriptionData {
                subscription_ref: sub.id,
                customer_ref: sub.customer,
                status: sub.status,
                cancel_at_period_end: sub.cancel_at_period_end,
                price_ref,
                current_period_end: extract_period_end(&object),
                subscriber_id: metadata_subscriber(&object),
            }))
        }
        EventKind::InvoicePaymentSucceeded | EventKind::InvoicePaymentFailed => {
            let inv: RawInvoice = serde_json::from_value(object.clone())
                .map_err(|e| BillingError::Signature(format!("invalid invoice: {e}")))?;
            Ok(EventData::Invoice(InvoiceData {
                invoice_ref: inv.id,
                customer_ref: inv.customer,
                subscription_ref: inv.subscription,
                next_payment_attempt: inv
                    .next_payment_attempt
                    .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
                period_end: extract_period_end(&object),
                subscriber_id: metadata_subscriber(&object),
            }))
        }
        EventKind::Unknown(_) => Ok(EventData::Raw(object)),
    }
}

/// Read a string out of the object's metadata map
fn metadata_str(object: &Value, key: &str) -> Option<String> {
    object
        .pointer(&format!("/metadata/{key}"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Explicit subscriber correlation carried in event metadata
fn metadata_subscriber(object: &Value) -> Option<SubscriberId> {
    metadata_str(object, "subscriber_id").and_then(|s| SubscriberId::parse(&s).ok())
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Raw envelope types for parsing

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubscription {
    id: String,
    customer: Option<String>,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
    next_payment_attempt: Option<i64>,
}
