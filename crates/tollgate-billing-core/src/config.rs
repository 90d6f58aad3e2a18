//! Billing configuration

use std::time::Duration;

/// Billing service configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Payment processor secret key
    pub stripe_secret_key: String,
    /// Webhook signing secret shared with the processor
    pub stripe_webhook_secret: String,
    /// Redirect target after a successful hosted checkout
    pub success_url: String,
    /// Redirect target after an abandoned hosted checkout
    pub cancel_url: String,
    /// Internal location shown while an in-place change awaits confirmation
    pub change_pending_url: String,
    /// Minimum interval between checkout initiations per subscriber
    pub checkout_cooldown: Duration,
}

impl BillingConfig {
    /// Create a new billing config with default URLs and a 60s cooldown
    pub fn new(
        stripe_secret_key: impl Into<String>,
        stripe_webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            stripe_secret_key: stripe_secret_key.into(),
            stripe_webhook_secret: stripe_webhook_secret.into(),
            success_url: "https://app.example.com/billing/success".to_string(),
            cancel_url: "https://app.example.com/billing/cancel".to_string(),
            change_pending_url: "https://app.example.com/billing/pending".to_string(),
            checkout_cooldown: Duration::from_secs(60),
        }
    }

    /// Set redirect URLs
    pub fn with_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
        change_pending_url: impl Into<String>,
    ) -> Self {
        self.success_url = success_url.into();
        self.cancel_url = cancel_url.into();
        self.change_pending_url = change_pending_url.into();
        self
    }

    /// Set the checkout cooldown window
    pub fn with_checkout_cooldown(mut self, cooldown: Duration) -> Self {
        self.checkout_cooldown = cooldown;
        self
    }
}
