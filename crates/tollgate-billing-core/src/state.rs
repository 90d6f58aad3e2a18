//! Subscription state machine
//!
//! Pure transition function: (profile, event, context) -> (field delta,
//! alerts). No I/O happens here; the atomic profile updater applies the
//! delta and the alerting sink records the alerts. Upgrade vs downgrade is
//! classified strictly by usage-limit comparison, never by price, since the
//! limit is the access-control quantity that matters.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use tollgate_db::{ProfileChanges, ProfileRow, ResolvedPlan};
use tollgate_types::AlertDraft;

use crate::webhook::{EventData, EventKind, WebhookEvent};

/// Processor statuses that grant access
const ACTIVE_STATUSES: &[&str] = &["active", "trialing"];

/// Outcome of resolving the event's price against the plan catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanResolution {
    /// Price matched a catalog plan
    Resolved(ResolvedPlan),
    /// Event carried a price (or should have) but no plan matched
    Unresolved,
    /// Event kind does not reference a price
    NotApplicable,
}

/// Context assembled by the pipeline before evaluating a transition
#[derive(Debug, Clone)]
pub struct TransitionContext {
    /// Plan resolved from the event's price reference
    pub plan: PlanResolution,
    /// Usage limit of the profile's current plan, for upgrade/downgrade
    /// classification
    pub current_plan_limit: Option<i64>,
    /// Evaluation instant, for grace-period decisions
    pub now: DateTime<Utc>,
}

/// Result of a transition: a field delta plus alerts to record
#[derive(Debug, Clone, Default)]
pub struct Transition {
    /// Field changes for the atomic profile updater
    pub changes: ProfileChanges,
    /// Alerts for the alerting sink
    pub alerts: Vec<AlertDraft>,
}

/// Evaluate a single event against a profile.
///
/// Pure: identical inputs always yield the identical transition.
pub fn evaluate(profile: &ProfileRow, event: &WebhookEvent, ctx: &TransitionContext) -> Transition {
    match (&event.kind, &event.data) {
        (EventKind::CheckoutCompleted, EventData::Checkout(data)) => {
            let mut t = Transition::default();

            // External refs are recorded on both branches; losing them would
            // orphan every later event for this subscription.
            if let Some(customer) = &data.customer_ref {
                t.changes.external_customer_ref = Some(Some(customer.clone()));
            }
            if let Some(subscription) = &data.subscription_ref {
                t.changes.external_subscription_ref = Some(Some(subscription.clone()));
            }

            match &ctx.plan {
                PlanResolution::Resolved(plan) => {
                    t.changes.plan_id = Some(Some(plan.plan_id));
                    t.changes.active = Some(true);
                    clear_pending(&mut t.changes);
                }
                _ => {
                    // Never default to granting access.
                    t.changes.active = Some(false);
                    t.alerts.push(AlertDraft::critical(
                        "plan_resolution_failed",
                        "checkout completed but line-item price matched no plan",
                        json!({
                            "event_id": event.id,
                            "session_id": data.session_id,
                            "price_ref": data.price_ref,
                        }),
                    ));
                }
            }
            t
        }

        (EventKind::SubscriptionCreated, EventData::Subscription(data)) => {
            let mut t = Transition::default();
            match &ctx.plan {
                PlanResolution::Resolved(plan) => {
                    t.changes.plan_id = Some(Some(plan.plan_id));
                    t.changes.active = Some(is_active_status(&data.status));
                    t.changes.subscription_status = Some(Some(data.status.clone()));
                    t.changes.cancel_at_period_end = Some(data.cancel_at_period_end);
                    if data.current_period_end.is_some() {
                        t.changes.current_period_end = Some(data.current_period_end);
                    }
                    if let Some(customer) = &data.customer_ref {
                        t.changes.external_customer_ref = Some(Some(customer.clone()));
                    }
                    t.changes.external_subscription_ref =
                        Some(Some(data.subscription_ref.clone()));
                    clear_pending(&mut t.changes);
                }
                _ => {
                    t.alerts.push(AlertDraft::critical(
                        "plan_resolution_failed",
                        "subscription created with a price matching no plan",
                        json!({
                            "event_id": event.id,
                            "subscription_ref": data.subscription_ref,
                            "price_ref": data.price_ref,
                        }),
                    ));
                }
            }
            t
        }

        (EventKind::SubscriptionUpdated, EventData::Subscription(data)) => {
            let mut t = Transition::default();
            t.changes.subscription_status = Some(Some(data.status.clone()));
            if data.current_period_end.is_some() {
                t.changes.current_period_end = Some(data.current_period_end);
            }

            if let PlanResolution::Resolved(plan) = &ctx.plan {
                // Downgrade iff the new limit is strictly below the old one;
                // a downgrade resets consumption, an upgrade preserves it.
                let is_downgrade = ctx
                    .current_plan_limit
                    .is_some_and(|old_limit| plan.usage_limit < old_limit);
                if is_downgrade {
                    t.changes.usage_count = Some(0);
                }
                t.changes.plan_id = Some(Some(plan.plan_id));
                t.changes.active = Some(is_active_status(&data.status));
                t.changes.cancel_at_period_end = Some(data.cancel_at_period_end);
                clear_pending(&mut t.changes);
            }
            t
        }

        (EventKind::SubscriptionDeleted, EventData::Subscription(data)) => {
            let mut t = Transition::default();
            let period_end = data.current_period_end.or(profile.current_period_end);

            match period_end {
                // Grace period: access was already paid for; never revoke it
                // before the period ends.
                Some(end) if end > ctx.now => {
                    t.changes.cancel_at_period_end = Some(true);
                    t.changes.subscription_status = Some(Some(data.status.clone()));
                }
                // Immediate end.
                _ => {
                    t.changes.plan_id = Some(None);
                    t.changes.active = Some(false);
                    t.changes.usage_count = Some(0);
                    t.changes.cancel_at_period_end = Some(false);
                    t.changes.subscription_status = Some(Some(data.status.clone()));
                    clear_pending(&mut t.changes);
                }
            }
            t
        }

        (EventKind::InvoicePaymentSucceeded, EventData::Invoice(data)) => {
            // New billing period: consumption resets and access is restored.
            // A pending cancellation is deliberately left untouched: this may
            // be the final payment preceding the scheduled cancellation, and
            // the processor's un-cancel signal is a subscription update with
            // cancel_at_period_end=false.
            let mut t = Transition::default();
            t.changes.usage_count = Some(0);
            t.changes.active = Some(true);
            if data.period_end.is_some() {
                t.changes.current_period_end = Some(data.period_end);
            }
            t
        }

        (EventKind::InvoicePaymentFailed, EventData::Invoice(data)) => {
            let mut t = Transition::default();
            if data.next_payment_attempt.is_some() {
                // Processor will retry; no state change yet.
                debug!(event_id = %event.id, "Payment failed with retries remaining");
            } else {
                t.changes.active = Some(false);
                t.changes.plan_id = Some(None);
                t.changes.subscription_status = Some(Some("unpaid".to_string()));
                t.alerts.push(AlertDraft::warning(
                    "payment_failed_final",
                    "final payment attempt failed, access revoked",
                    json!({
                        "event_id": event.id,
                        "invoice_ref": data.invoice_ref,
                        "subscription_ref": data.subscription_ref,
                    }),
                ));
            }
            t
        }

        _ => {
            debug!(event_id = %event.id, event_type = %event.raw_type, "Ignoring unhandled event");
            Transition::default()
        }
    }
}

fn is_active_status(status: &str) -> bool {
    ACTIVE_STATUSES.contains(&status)
}

/// Confirmation arrived (or the subscription ended): the outstanding
/// user-initiated change is no longer pending.
fn clear_pending(changes: &mut ProfileChanges) {
    changes.pending_plan_change = Some(false);
    changes.target_plan_id = Some(None);
}
