//! Payment provider abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tollgate_types::{PlanId, SubscriberId};

use crate::error::BillingError;

/// Request to open a hosted checkout flow
#[derive(Debug, Clone)]
pub struct HostedCheckoutRequest {
    /// Subscriber initiating the checkout, carried in session metadata
    pub subscriber_id: SubscriberId,
    /// Target plan, carried in session metadata
    pub plan_id: PlanId,
    /// Processor price reference for the target plan
    pub price_ref: String,
    /// Existing processor customer to reuse, if any
    pub customer_ref: Option<String>,
    /// Redirect target on success
    pub success_url: String,
    /// Redirect target on abandonment
    pub cancel_url: String,
}

/// Hosted checkout session created at the processor
#[derive(Debug, Clone)]
pub struct HostedCheckout {
    /// Session ID
    pub session_id: String,
    /// URL the subscriber is redirected to
    pub url: String,
}

/// Subscription state as reported by the processor
#[derive(Debug, Clone)]
pub struct RemoteSubscription {
    /// Subscription reference
    pub subscription_ref: String,
    /// First subscription item's reference, needed for price changes
    pub item_ref: Option<String>,
    /// First item's price reference
    pub price_ref: Option<String>,
    /// Processor status
    pub status: String,
    /// Current billing period end
    pub current_period_end: Option<DateTime<Utc>>,
    /// Whether the subscription cancels at period end
    pub cancel_at_period_end: bool,
}

/// Payment provider trait
///
/// Abstracts the external processor so the reconciliation pipeline and
/// checkout flow can be exercised against a fake in tests.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a hosted checkout session for a new subscription
    async fn create_checkout_session(
        &self,
        request: &HostedCheckoutRequest,
    ) -> Result<HostedCheckout, BillingError>;

    /// Retrieve a subscription's current state from the processor
    async fn get_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<RemoteSubscription, BillingError>;

    /// Switch an active subscription to a different price in place.
    ///
    /// The change is prorated; the billing cycle anchor stays put.
    async fn update_subscription_price(
        &self,
        subscription_ref: &str,
        price_ref: &str,
        plan_id: PlanId,
    ) -> Result<RemoteSubscription, BillingError>;
}
