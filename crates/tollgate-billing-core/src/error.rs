//! Billing errors

use thiserror::Error;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Caller is not an authenticated principal
    #[error("authentication required")]
    Authentication,

    /// Request failed a precondition (bad plan, currency, same plan)
    #[error("{0}")]
    Validation(String),

    /// A plan change is already awaiting confirmation
    #[error("a plan change is already in progress")]
    Conflict,

    /// Checkout attempted within the cooldown window
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimit {
        /// Seconds until the cooldown expires
        retry_after_secs: u64,
    },

    /// External payment processor call failed
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Durable store failure
    #[error("persistence error: {0}")]
    Persistence(#[from] tollgate_db::DbError),

    /// Webhook signature or envelope verification failed
    #[error("signature error: {0}")]
    Signature(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// True for failures of webhook authenticity or envelope decoding.
    ///
    /// These are the only webhook failures that should be surfaced as a
    /// non-2xx so the processor redelivers.
    pub fn is_signature_error(&self) -> bool {
        matches!(self, Self::Signature(_))
    }
}
