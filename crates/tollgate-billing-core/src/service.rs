//! Billing service
//!
//! Orchestrates the two entry points of the reconciliation engine: the
//! asynchronous webhook pipeline (processor confirmations) and the
//! synchronous checkout flow (user-initiated plan changes). Per-subscriber
//! serialization rests on the profile row's version counter; a lost
//! conditional write is retried from a fresh read.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use tollgate_db::{
    AlertRepository, IngestOutcome, PlanRepository, ProfileChanges, ProfileRepository, ProfileRow,
    ResolvedPlan, WebhookEventRepository,
};
use tollgate_types::{AlertDraft, PlanId, SubscriberId};

use crate::alert::AlertSink;
use crate::catalog::PlanResolver;
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::identity::resolve_profile;
use crate::provider::{HostedCheckoutRequest, PaymentProvider};
use crate::state::{evaluate, PlanResolution, TransitionContext};
use crate::webhook::{EventData, WebhookEvent, WebhookHandler};

/// Conditional-write attempts before the pipeline gives up on an event
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Outcome of processing a webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event was new and has been reconciled (or alerted on)
    Processed,
    /// Event ID was already in the ledger; nothing was re-applied
    Duplicate,
}

/// Outcome of a checkout initiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Subscriber must complete a hosted checkout flow
    HostedCheckout {
        /// Processor-hosted payment page
        redirect_url: String,
    },
    /// Existing subscription was changed in place; confirmation is pending
    ChangePending {
        /// Internal page showing the pending change
        redirect_url: String,
    },
}

/// A profile joined with its resolved plan for display
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    /// The stored profile row
    pub profile: ProfileRow,
    /// Current plan details, when the profile has a plan
    pub plan: Option<ResolvedPlan>,
}

/// Billing service
pub struct BillingService {
    profiles: Arc<dyn ProfileRepository>,
    plans: PlanResolver,
    ledger: Arc<dyn WebhookEventRepository>,
    alerts: AlertSink,
    provider: Arc<dyn PaymentProvider>,
    webhooks: WebhookHandler,
    config: BillingConfig,
}

impl BillingService {
    /// Create a new billing service
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        plans: Arc<dyn PlanRepository>,
        ledger: Arc<dyn WebhookEventRepository>,
        alerts: Arc<dyn AlertRepository>,
        provider: Arc<dyn PaymentProvider>,
        config: BillingConfig,
    ) -> Self {
        Self {
            profiles,
            plans: PlanResolver::new(plans),
            ledger,
            alerts: AlertSink::new(alerts, None),
            provider,
            webhooks: WebhookHandler::new(config.stripe_webhook_secret.clone()),
            config,
        }
    }

    /// Attach an outbound notifier for critical alerts
    pub fn with_notifier(mut self, notifier: Arc<dyn crate::alert::AlertNotifier>) -> Self {
        self.alerts = self.alerts.with_notifier(notifier);
        self
    }

    // ------------------------------------------------------------------
    // Asynchronous path: webhook reconciliation
    // ------------------------------------------------------------------

    /// Verify, ledger, and reconcile a webhook delivery.
    ///
    /// Error contract: a returned `Err` means the processor should
    /// redeliver. That is limited to signature/envelope failures and a
    /// ledger write failure. Every failure after the event is durably
    /// ledgered is converted into a critical alert and acknowledged, since
    /// redelivery would only replay the same failure.
    #[instrument(skip(self, payload, signature))]
    pub async fn process_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, BillingError> {
        let event = self.webhooks.verify_and_parse(payload, signature)?;

        match self
            .ledger
            .record_if_new(&event.id, &event.raw_type, &event.payload)
            .await?
        {
            IngestOutcome::Duplicate => {
                debug!(event_id = %event.id, "Duplicate delivery, skipping");
                return Ok(WebhookOutcome::Duplicate);
            }
            IngestOutcome::New => {}
        }

        if let Err(e) = self.apply_event(&event).await {
            error!(event_id = %event.id, error = %e, "Event reconciliation failed");
            self.alerts
                .record(AlertDraft::critical(
                    "reconciliation_failed",
                    "ledgered event could not be applied to the profile",
                    json!({
                        "event_id": event.id,
                        "event_type": event.raw_type,
                        "error": e.to_string(),
                    }),
                ))
                .await;
        }

        Ok(WebhookOutcome::Processed)
    }

    /// Reconcile a single ledgered event against its profile
    async fn apply_event(&self, event: &WebhookEvent) -> Result<(), BillingError> {
        let Some(mut profile) = resolve_profile(&self.profiles, event).await? else {
            if matches!(event.data, EventData::Raw(_)) {
                info!(event_id = %event.id, event_type = %event.raw_type, "Ignoring unhandled event type");
                return Ok(());
            }
            warn!(event_id = %event.id, "Event matched no profile");
            self.alerts
                .record(AlertDraft::warning(
                    "identity_unresolved",
                    "event could not be correlated with any subscriber",
                    json!({ "event_id": event.id, "event_type": event.raw_type }),
                ))
                .await;
            return Ok(());
        };

        let price_ref = self.event_price_ref(event).await?;
        let resolution = self.plans.resolve_event(event, price_ref.as_deref()).await?;

        for attempt in 0..MAX_WRITE_ATTEMPTS {
            let currency_hint = match &resolution {
                PlanResolution::Resolved(plan) => plan.currency.as_str(),
                _ => "usd",
            };
            let current_limit = self
                .plans
                .current_limit(profile.plan_id, currency_hint)
                .await?;

            let ctx = TransitionContext {
                plan: resolution.clone(),
                current_plan_limit: current_limit,
                now: Utc::now(),
            };
            let transition = evaluate(&profile, event, &ctx);

            if transition.changes.is_empty() {
                self.alerts.record_all(transition.alerts).await;
                return Ok(());
            }

            if self
                .profiles
                .apply_changes(profile.subscriber_id, &transition.changes, profile.version)
                .await?
            {
                // Alerts belong to the transition that landed; a superseded
                // evaluation's alerts are discarded with it.
                self.alerts.record_all(transition.alerts).await;
                info!(
                    event_id = %event.id,
                    subscriber_id = %profile.subscriber_id,
                    "Profile reconciled"
                );
                return Ok(());
            }

            // Lost the conditional write; re-read and re-evaluate.
            warn!(
                event_id = %event.id,
                attempt = attempt + 1,
                "Concurrent profile mutation, retrying"
            );
            profile = self
                .profiles
                .find_by_subscriber_id(profile.subscriber_id)
                .await?
                .ok_or_else(|| {
                    BillingError::Internal("profile vanished during reconciliation".to_string())
                })?;
        }

        Err(BillingError::Internal(format!(
            "conditional write lost {MAX_WRITE_ATTEMPTS} times"
        )))
    }

    /// Price reference an event carries, fetching from the processor when a
    /// checkout payload omits its line items
    async fn event_price_ref(&self, event: &WebhookEvent) -> Result<Option<String>, BillingError> {
        match &event.data {
            EventData::Subscription(data) => Ok(data.price_ref.clone()),
            EventData::Checkout(data) => {
                if data.price_ref.is_some() {
                    return Ok(data.price_ref.clone());
                }
                let Some(sub_ref) = &data.subscription_ref else {
                    return Ok(None);
                };
                debug!(event_id = %event.id, "Checkout payload lacks line items, fetching subscription");
                let remote = self.provider.get_subscription(sub_ref).await?;
                Ok(remote.price_ref)
            }
            _ => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Synchronous path: user-initiated plan change
    // ------------------------------------------------------------------

    /// Initiate a plan change or first subscription for a subscriber.
    ///
    /// Preconditions are checked in order: the plan must exist, it must be
    /// priced in the requested currency, the subscriber must be outside the
    /// checkout cooldown, must have no pending change, and must not already
    /// be on the requested plan.
    #[instrument(skip(self), fields(subscriber_id = %subscriber_id))]
    pub async fn initiate_checkout(
        &self,
        subscriber_id: SubscriberId,
        plan_name: &str,
        currency: &str,
    ) -> Result<CheckoutOutcome, BillingError> {
        let plan = self.plans.resolve_for_checkout(plan_name, currency).await?;
        let profile = self.profiles.ensure_exists(subscriber_id.into_inner()).await?;

        let now = Utc::now();
        if let Some(last) = profile.last_checkout_at {
            let elapsed = (now - last).num_seconds().max(0) as u64;
            let cooldown = self.config.checkout_cooldown.as_secs();
            if elapsed < cooldown {
                return Err(BillingError::RateLimit {
                    retry_after_secs: cooldown - elapsed,
                });
            }
        }

        if profile.pending_plan_change {
            return Err(BillingError::Conflict);
        }

        if profile.active && profile.plan_id == Some(plan.plan_id) {
            return Err(BillingError::Validation(format!(
                "already subscribed to plan '{plan_name}'"
            )));
        }

        if profile.active {
            if let Some(sub_ref) = &profile.external_subscription_ref {
                return self
                    .change_plan_in_place(&profile, sub_ref, &plan, now)
                    .await;
            }
        }
        self.start_hosted_checkout(&profile, subscriber_id, &plan, now)
            .await
    }

    /// Switch an existing processor subscription to the new price
    async fn change_plan_in_place(
        &self,
        profile: &ProfileRow,
        subscription_ref: &str,
        plan: &ResolvedPlan,
        now: chrono::DateTime<Utc>,
    ) -> Result<CheckoutOutcome, BillingError> {
        self.provider
            .update_subscription_price(subscription_ref, &plan.price_ref, PlanId::from(plan.plan_id))
            .await?;

        // The change is only provisional until the processor's confirmation
        // event lands; mark it pending so a second change cannot race it.
        let changes = ProfileChanges {
            pending_plan_change: Some(true),
            target_plan_id: Some(Some(plan.plan_id)),
            last_checkout_at: Some(now),
            ..Default::default()
        };
        self.mark_pending(profile, &changes).await?;

        info!(
            subscriber_id = %profile.subscriber_id,
            plan = %plan.name,
            "Plan change submitted, awaiting confirmation"
        );
        Ok(CheckoutOutcome::ChangePending {
            redirect_url: self.config.change_pending_url.clone(),
        })
    }

    /// Open a hosted checkout session for a subscriber without an active
    /// processor subscription
    async fn start_hosted_checkout(
        &self,
        profile: &ProfileRow,
        subscriber_id: SubscriberId,
        plan: &ResolvedPlan,
        now: chrono::DateTime<Utc>,
    ) -> Result<CheckoutOutcome, BillingError> {
        let request = HostedCheckoutRequest {
            subscriber_id,
            plan_id: PlanId::from(plan.plan_id),
            price_ref: plan.price_ref.clone(),
            customer_ref: profile.external_customer_ref.clone(),
            success_url: self.config.success_url.clone(),
            cancel_url: self.config.cancel_url.clone(),
        };
        let session = self.provider.create_checkout_session(&request).await?;

        let changes = ProfileChanges {
            pending_plan_change: Some(true),
            target_plan_id: Some(Some(plan.plan_id)),
            last_checkout_at: Some(now),
            ..Default::default()
        };
        self.mark_pending(profile, &changes).await?;

        info!(
            subscriber_id = %profile.subscriber_id,
            plan = %plan.name,
            session_id = %session.session_id,
            "Hosted checkout session created"
        );
        Ok(CheckoutOutcome::HostedCheckout {
            redirect_url: session.url,
        })
    }

    /// Record the pending marker; a lost write means a concurrent mutation
    /// (usually the confirmation itself) and surfaces as a conflict
    async fn mark_pending(
        &self,
        profile: &ProfileRow,
        changes: &ProfileChanges,
    ) -> Result<(), BillingError> {
        let applied = self
            .profiles
            .apply_changes(profile.subscriber_id, changes, profile.version)
            .await?;
        if !applied {
            warn!(
                subscriber_id = %profile.subscriber_id,
                "Profile changed while initiating checkout"
            );
            return Err(BillingError::Conflict);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Profile with resolved plan details for display
    pub async fn get_profile(
        &self,
        subscriber_id: SubscriberId,
    ) -> Result<Option<ProfileSnapshot>, BillingError> {
        let Some(profile) = self
            .profiles
            .find_by_subscriber_id(subscriber_id.into_inner())
            .await?
        else {
            return Ok(None);
        };

        let plan = match profile.plan_id {
            Some(plan_id) => self.plans.snapshot_plan(plan_id).await?,
            None => None,
        };
        Ok(Some(ProfileSnapshot { profile, plan }))
    }
}
