//! Operator alerting
//!
//! Alerts are durable breadcrumbs for manual reconciliation. Recording one
//! must never fail the pipeline that raised it; a lost alert is logged, the
//! event that produced it is still acknowledged.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{error, warn};

use tollgate_db::AlertRepository;
use tollgate_types::{AlertDraft, Severity};

use crate::error::BillingError;

/// Outbound alert notification channel
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Push an alert to the external channel
    async fn notify(&self, alert: &AlertDraft) -> Result<(), BillingError>;
}

/// Notifier that POSTs alerts to a webhook URL as JSON
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier for the given webhook URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn notify(&self, alert: &AlertDraft) -> Result<(), BillingError> {
        let body = json!({
            "alert_type": alert.alert_type,
            "severity": alert.severity.as_str(),
            "message": alert.message,
            "metadata": alert.metadata,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BillingError::ExternalService(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BillingError::ExternalService(format!(
                "alert webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Alert sink: persists alerts and fans critical ones out to the notifier
#[derive(Clone)]
pub struct AlertSink {
    alerts: Arc<dyn AlertRepository>,
    notifier: Option<Arc<dyn AlertNotifier>>,
}

impl AlertSink {
    /// Create a sink over the alert repository
    pub fn new(alerts: Arc<dyn AlertRepository>, notifier: Option<Arc<dyn AlertNotifier>>) -> Self {
        Self { alerts, notifier }
    }

    /// Attach an outbound notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Record an alert.
    ///
    /// Persistence failures are logged and swallowed. Critical alerts are
    /// additionally pushed to the notifier off the request path.
    pub async fn record(&self, alert: AlertDraft) {
        warn!(
            alert_type = %alert.alert_type,
            severity = %alert.severity.as_str(),
            message = %alert.message,
            "Billing alert raised"
        );

        if let Err(e) = self.alerts.create(&alert).await {
            error!(error = %e, alert_type = %alert.alert_type, "Failed to persist alert");
        }

        if alert.severity == Severity::Critical {
            if let Some(notifier) = &self.notifier {
                let notifier = Arc::clone(notifier);
                tokio::spawn(async move {
                    if let Err(e) = notifier.notify(&alert).await {
                        warn!(error = %e, "Alert notification failed");
                    }
                });
            }
        }
    }

    /// Record every alert in a transition
    pub async fn record_all(&self, alerts: Vec<AlertDraft>) {
        for alert in alerts {
            self.record(alert).await;
        }
    }
}
