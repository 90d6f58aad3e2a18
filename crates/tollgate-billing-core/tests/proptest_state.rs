//! Property-based tests for the subscription state machine
//!
//! These verify structural invariants over arbitrary inputs:
//! - Determinism: same inputs, same transition
//! - Access is only ever granted alongside a resolved plan
//! - The pending marker and its target are set and cleared together
//! - Usage only resets, never jumps to an arbitrary value

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

use tollgate_billing_core::webhook::{EventData, EventKind, SubscriptionData, WebhookEvent};
use tollgate_billing_core::{evaluate, PlanResolution, TransitionContext};
use tollgate_db::{ProfileRow, ResolvedPlan};

// ============================================================================
// Strategies
// ============================================================================

fn arb_status() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("active".to_string()),
        Just("trialing".to_string()),
        Just("past_due".to_string()),
        Just("incomplete".to_string()),
        Just("canceled".to_string()),
        Just("unpaid".to_string()),
    ]
}

fn arb_event_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("customer.subscription.created".to_string()),
        Just("customer.subscription.updated".to_string()),
        Just("customer.subscription.deleted".to_string()),
    ]
}

fn arb_profile() -> impl Strategy<Value = ProfileRow> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        0i64..10_000,
        proptest::option::of(-30i64..365),
    )
        .prop_map(|(active, cancel, pending, usage, period_offset)| {
            let now = Utc::now();
            ProfileRow {
                subscriber_id: Uuid::new_v4(),
                plan_id: active.then(Uuid::new_v4),
                active,
                cancel_at_period_end: cancel,
                pending_plan_change: pending,
                target_plan_id: pending.then(Uuid::new_v4),
                subscription_status: None,
                external_customer_ref: Some("cus_p".to_string()),
                external_subscription_ref: Some("sub_p".to_string()),
                current_period_end: period_offset.map(|d| now + Duration::days(d)),
                usage_count: usage,
                last_checkout_at: None,
                version: 0,
                created_at: now,
                updated_at: now,
            }
        })
}

fn arb_resolution() -> impl Strategy<Value = PlanResolution> {
    prop_oneof![
        (1i64..10_000).prop_map(|limit| PlanResolution::Resolved(ResolvedPlan {
            plan_id: Uuid::new_v4(),
            name: "generated".to_string(),
            currency: "usd".to_string(),
            price_ref: "price_generated".to_string(),
            usage_limit: limit,
        })),
        Just(PlanResolution::Unresolved),
        Just(PlanResolution::NotApplicable),
    ]
}

fn arb_subscription_event() -> impl Strategy<Value = WebhookEvent> {
    (
        arb_event_type(),
        arb_status(),
        any::<bool>(),
        proptest::option::of(-30i64..365),
    )
        .prop_map(|(event_type, status, cancel, period_offset)| {
            let period_end = period_offset
                .map(|d| Utc.timestamp_opt((Utc::now() + Duration::days(d)).timestamp(), 0))
                .and_then(|r| r.single());
            WebhookEvent {
                id: "evt_prop".to_string(),
                kind: EventKind::from(event_type.as_str()),
                raw_type: event_type,
                data: EventData::Subscription(SubscriptionData {
                    subscription_ref: "sub_p".to_string(),
                    customer_ref: Some("cus_p".to_string()),
                    status,
                    cancel_at_period_end: cancel,
                    price_ref: Some("price_generated".to_string()),
                    subscriber_id: None,
                    current_period_end: period_end,
                }),
                payload: json!({}),
                created: Utc::now().timestamp(),
            }
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn evaluation_is_deterministic(
        profile in arb_profile(),
        event in arb_subscription_event(),
        resolution in arb_resolution(),
        limit in proptest::option::of(1i64..10_000),
    ) {
        let ctx = TransitionContext {
            plan: resolution,
            current_plan_limit: limit,
            now: Utc::now(),
        };
        let first = evaluate(&profile, &event, &ctx);
        let second = evaluate(&profile, &event, &ctx);
        prop_assert_eq!(first.changes, second.changes);
        prop_assert_eq!(first.alerts.len(), second.alerts.len());
    }

    #[test]
    fn access_is_never_granted_without_a_resolved_plan(
        profile in arb_profile(),
        event in arb_subscription_event(),
        limit in proptest::option::of(1i64..10_000),
    ) {
        for resolution in [PlanResolution::Unresolved, PlanResolution::NotApplicable] {
            let ctx = TransitionContext {
                plan: resolution,
                current_plan_limit: limit,
                now: Utc::now(),
            };
            let t = evaluate(&profile, &event, &ctx);
            // Subscription events without a resolved plan may revoke or keep
            // access, but never grant it, and never assign a plan.
            prop_assert_ne!(t.changes.active, Some(true));
            prop_assert!(t.changes.plan_id.is_none() || t.changes.plan_id == Some(None));
        }
    }

    #[test]
    fn pending_marker_and_target_move_together(
        profile in arb_profile(),
        event in arb_subscription_event(),
        resolution in arb_resolution(),
        limit in proptest::option::of(1i64..10_000),
    ) {
        let ctx = TransitionContext {
            plan: resolution,
            current_plan_limit: limit,
            now: Utc::now(),
        };
        let t = evaluate(&profile, &event, &ctx);
        match t.changes.pending_plan_change {
            Some(false) => prop_assert_eq!(t.changes.target_plan_id.clone(), Some(None)),
            Some(true) => prop_assert!(matches!(t.changes.target_plan_id, Some(Some(_)))),
            None => prop_assert_eq!(t.changes.target_plan_id, None),
        }
    }

    #[test]
    fn usage_only_ever_resets(
        profile in arb_profile(),
        event in arb_subscription_event(),
        resolution in arb_resolution(),
        limit in proptest::option::of(1i64..10_000),
    ) {
        let ctx = TransitionContext {
            plan: resolution,
            current_plan_limit: limit,
            now: Utc::now(),
        };
        let t = evaluate(&profile, &event, &ctx);
        if let Some(usage) = t.changes.usage_count {
            prop_assert_eq!(usage, 0);
        }
    }
}
