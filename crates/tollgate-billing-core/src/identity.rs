//! Subscriber identity resolution
//!
//! Maps an inbound event to the internal profile it concerns. Resolution is
//! a precedence chain; an unresolvable event is a normal outcome (`Ok(None)`),
//! not an error, since the processor may deliver events for subscriptions
//! this deployment never created.

use std::sync::Arc;

use tracing::debug;

use tollgate_db::{DbResult, ProfileRepository, ProfileRow};

use crate::webhook::{EventData, WebhookEvent};

/// Resolve the profile an event concerns.
///
/// Precedence:
/// 1. explicit `subscriber_id` carried in event metadata
/// 2. external subscription reference
/// 3. external customer reference
pub async fn resolve_profile(
    profiles: &Arc<dyn ProfileRepository>,
    event: &WebhookEvent,
) -> DbResult<Option<ProfileRow>> {
    let (subscriber_id, subscription_ref, customer_ref) = match &event.data {
        EventData::Checkout(data) => (
            data.subscriber_id,
            data.subscription_ref.as_deref(),
            data.customer_ref.as_deref(),
        ),
        EventData::Subscription(data) => (
            data.subscriber_id,
            Some(data.subscription_ref.as_str()),
            data.customer_ref.as_deref(),
        ),
        EventData::Invoice(data) => (
            data.subscriber_id,
            data.subscription_ref.as_deref(),
            data.customer_ref.as_deref(),
        ),
        EventData::Raw(_) => (None, None, None),
    };

    if let Some(id) = subscriber_id {
        if let Some(profile) = profiles.find_by_subscriber_id(id.into_inner()).await? {
            return Ok(Some(profile));
        }
        debug!(subscriber_id = %id, "Metadata subscriber has no profile, falling back to refs");
    }

    if let Some(sub_ref) = subscription_ref {
        if let Some(profile) = profiles.find_by_subscription_ref(sub_ref).await? {
            return Ok(Some(profile));
        }
    }

    if let Some(cus_ref) = customer_ref {
        if let Some(profile) = profiles.find_by_customer_ref(cus_ref).await? {
            return Ok(Some(profile));
        }
    }

    Ok(None)
}
