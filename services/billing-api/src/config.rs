//! Configuration for the Billing API service.

use std::time::Duration;

use tollgate_billing_core::BillingConfig;

/// Billing API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Billing core configuration
    pub billing: BillingConfig,
    /// Optional webhook URL for critical alert notifications
    pub alert_webhook_url: Option<String>,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Database
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        // Server port
        let http_port = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8081".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        // Payment processor configuration
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?;

        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?;

        // Redirect URLs
        let success_url = std::env::var("BILLING_SUCCESS_URL")
            .unwrap_or_else(|_| "https://app.example.com/billing/success".to_string());

        let cancel_url = std::env::var("BILLING_CANCEL_URL")
            .unwrap_or_else(|_| "https://app.example.com/billing/cancel".to_string());

        let change_pending_url = std::env::var("BILLING_CHANGE_PENDING_URL")
            .unwrap_or_else(|_| "https://app.example.com/billing/pending".to_string());

        // Checkout cooldown
        let checkout_cooldown_secs: u64 = std::env::var("CHECKOUT_COOLDOWN_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("CHECKOUT_COOLDOWN_SECS"))?;

        // Alerting
        let alert_webhook_url = std::env::var("ALERT_WEBHOOK_URL").ok();

        // Request timeout
        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        // Metrics
        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let billing = BillingConfig::new(&stripe_secret_key, &stripe_webhook_secret)
            .with_urls(&success_url, &cancel_url, &change_pending_url)
            .with_checkout_cooldown(Duration::from_secs(checkout_cooldown_secs));

        Ok(Self {
            http_port,
            database_url,
            billing,
            alert_webhook_url,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
