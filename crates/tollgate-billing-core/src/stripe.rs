//! Stripe payment provider implementation

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{HostedCheckout, HostedCheckoutRequest, PaymentProvider, RemoteSubscription};
use tollgate_types::PlanId;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe payment provider
#[derive(Clone)]
pub struct StripeProvider {
    client: Client,
    secret_key: String,
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(config: &BillingConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.stripe_secret_key.clone(),
        }
    }

    /// Make authenticated request to Stripe
    async fn stripe_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        form: Option<&[(&str, &str)]>,
    ) -> Result<T, BillingError> {
        let url = format!("{STRIPE_API_BASE}{endpoint}");

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.secret_key, Option::<&str>::None);

        if let Some(form_data) = form {
            request = request.form(form_data);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Stripe API request failed");
            BillingError::ExternalService(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Stripe API error");
            return Err(BillingError::ExternalService(format!(
                "Stripe API error: {status}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            BillingError::Internal(e.to_string())
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    #[instrument(skip(self, request), fields(subscriber_id = %request.subscriber_id))]
    async fn create_checkout_session(
        &self,
        request: &HostedCheckoutRequest,
    ) -> Result<HostedCheckout, BillingError> {
        debug!(price_ref = %request.price_ref, "Creating checkout session");

        let subscriber = request.subscriber_id.to_string();
        let plan = request.plan_id.to_string();
        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "subscription"),
            ("success_url", &request.success_url),
            ("cancel_url", &request.cancel_url),
            ("line_items[0][price]", &request.price_ref),
            ("line_items[0][quantity]", "1"),
            ("metadata[subscriber_id]", &subscriber),
            ("metadata[plan_id]", &plan),
            ("subscription_data[metadata][subscriber_id]", &subscriber),
            ("subscription_data[metadata][plan_id]", &plan),
        ];
        if let Some(customer) = &request.customer_ref {
            form.push(("customer", customer));
        }

        let session: StripeCheckoutSession = self
            .stripe_request(reqwest::Method::POST, "/checkout/sessions", Some(&form))
            .await?;

        let url = session.url.ok_or_else(|| {
            BillingError::ExternalService("checkout session has no URL".to_string())
        })?;

        Ok(HostedCheckout {
            session_id: session.id,
            url,
        })
    }

    #[instrument(skip(self))]
    async fn get_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<RemoteSubscription, BillingError> {
        debug!(subscription_ref = %subscription_ref, "Getting Stripe subscription");

        let sub: StripeSubscription = self
            .stripe_request(
                reqwest::Method::GET,
                &format!("/subscriptions/{subscription_ref}"),
                None,
            )
            .await?;

        Ok(sub.into())
    }

    #[instrument(skip(self))]
    async fn update_subscription_price(
        &self,
        subscription_ref: &str,
        price_ref: &str,
        plan_id: PlanId,
    ) -> Result<RemoteSubscription, BillingError> {
        debug!(subscription_ref = %subscription_ref, price_ref = %price_ref, "Updating subscription price");

        // The item to swap must be addressed by its own id, so retrieve first.
        let current: StripeSubscription = self
            .stripe_request(
                reqwest::Method::GET,
                &format!("/subscriptions/{subscription_ref}"),
                None,
            )
            .await?;

        let item_ref = current
            .items
            .data
            .first()
            .map(|item| item.id.clone())
            .ok_or_else(|| {
                BillingError::ExternalService("subscription has no items".to_string())
            })?;

        let plan = plan_id.to_string();
        let form = [
            ("items[0][id]", item_ref.as_str()),
            ("items[0][price]", price_ref),
            ("proration_behavior", "create_prorations"),
            ("billing_cycle_anchor", "unchanged"),
            ("metadata[plan_id]", &plan),
        ];

        let updated: StripeSubscription = self
            .stripe_request(
                reqwest::Method::POST,
                &format!("/subscriptions/{subscription_ref}"),
                Some(&form),
            )
            .await?;

        Ok(updated.into())
    }
}

// Stripe API response types

#[derive(Debug, Clone, Deserialize)]
struct StripeSubscription {
    id: String,
    status: String,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    items: StripeList<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct StripeSubscriptionItem {
    id: String,
    price: Option<StripePrice>,
    current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct StripePrice {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StripeList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl From<StripeSubscription> for RemoteSubscription {
    fn from(sub: StripeSubscription) -> Self {
        let first = sub.items.data.first();
        // Newer API shapes carry the period end on the item instead of the
        // subscription.
        let period_end = sub
            .current_period_end
            .or_else(|| first.and_then(|item| item.current_period_end))
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
        Self {
            subscription_ref: sub.id,
            item_ref: first.map(|item| item.id.clone()),
            price_ref: first.and_then(|item| item.price.as_ref().map(|p| p.id.clone())),
            status: sub.status,
            current_period_end: period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
        }
    }
}
