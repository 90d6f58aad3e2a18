//! Tollgate Billing Core - Billing state reconciliation engine
//!
//! Keeps the internally-held subscription profile consistent with an
//! external payment processor whose truth arrives asynchronously,
//! out-of-order, and at-least-once, while accepting synchronous
//! user-initiated plan changes that race those confirmations.
//!
//! # Example
//!
//! ```rust,ignore
//! use tollgate_billing_core::{BillingConfig, BillingService};
//!
//! let config = BillingConfig::new("sk_test_...", "whsec_...");
//! let service = BillingService::new(profiles, plans, ledger, alerts, provider, config);
//!
//! // Asynchronous path: processor confirmations
//! service.process_webhook(&body, signature).await?;
//!
//! // Synchronous path: user-initiated plan change
//! let outcome = service.initiate_checkout(subscriber_id, "pro", "usd").await?;
//! ```

pub mod alert;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod period;
pub mod provider;
pub mod service;
pub mod state;
pub mod stripe;
pub mod webhook;

pub use alert::{AlertNotifier, AlertSink, WebhookNotifier};
pub use catalog::PlanResolver;
pub use config::BillingConfig;
pub use error::BillingError;
pub use provider::{HostedCheckout, HostedCheckoutRequest, PaymentProvider, RemoteSubscription};
pub use service::{BillingService, CheckoutOutcome, ProfileSnapshot, WebhookOutcome};
pub use state::{evaluate, PlanResolution, Transition, TransitionContext};
pub use stripe::StripeProvider;
pub use webhook::{EventData, EventKind, WebhookEvent, WebhookHandler};
