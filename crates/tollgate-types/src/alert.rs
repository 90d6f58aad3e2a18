//! Operational alert types

use serde::{Deserialize, Serialize};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Requires operator attention; forwarded to the notification channel
    Critical,
    /// Degraded or suspicious, no immediate action required
    Warning,
    /// Informational
    Info,
}

impl Severity {
    /// Database/string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert to be recorded by the alerting sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDraft {
    /// Machine-readable alert type (e.g. `plan_resolution_failed`)
    pub alert_type: String,
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Structured context (event id, refs, etc.)
    pub metadata: serde_json::Value,
}

impl AlertDraft {
    /// Create a critical alert
    pub fn critical(
        alert_type: impl Into<String>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            alert_type: alert_type.into(),
            severity: Severity::Critical,
            message: message.into(),
            metadata,
        }
    }

    /// Create a warning alert
    pub fn warning(
        alert_type: impl Into<String>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            alert_type: alert_type.into(),
            severity: Severity::Warning,
            message: message.into(),
            metadata,
        }
    }

    /// Create an info alert
    pub fn info(
        alert_type: impl Into<String>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            alert_type: alert_type.into(),
            severity: Severity::Info,
            message: message.into(),
            metadata,
        }
    }
}
