//! Plan catalog resolution
//!
//! Thin layer over the plan repository that turns raw price references and
//! plan names into `PlanResolution` values for the state machine, and keeps
//! the distinction between "plan does not exist" and "plan exists but not in
//! this currency" for checkout validation.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use tollgate_db::{PlanRepository, ResolvedPlan};

use crate::error::BillingError;
use crate::state::PlanResolution;
use crate::webhook::{EventData, WebhookEvent};

/// Plan catalog resolver
#[derive(Clone)]
pub struct PlanResolver {
    plans: Arc<dyn PlanRepository>,
}

impl PlanResolver {
    /// Create a new resolver over the plan repository
    pub fn new(plans: Arc<dyn PlanRepository>) -> Self {
        Self { plans }
    }

    /// Resolve the plan an event's price reference points at.
    ///
    /// Events without a price dimension yield `NotApplicable`; events that
    /// should carry a price but whose price matches no plan yield
    /// `Unresolved` so the state machine takes its conservative branch.
    pub async fn resolve_event(
        &self,
        event: &WebhookEvent,
        price_ref: Option<&str>,
    ) -> Result<PlanResolution, BillingError> {
        let carries_price = matches!(
            event.data,
            EventData::Checkout(_) | EventData::Subscription(_)
        );
        if !carries_price {
            return Ok(PlanResolution::NotApplicable);
        }

        let Some(price_ref) = price_ref else {
            warn!(event_id = %event.id, "Event carries no price reference");
            return Ok(PlanResolution::Unresolved);
        };

        match self.plans.resolve_by_price_ref(price_ref).await? {
            Some(plan) => Ok(PlanResolution::Resolved(plan)),
            None => {
                warn!(event_id = %event.id, price_ref, "Price matched no catalog plan");
                Ok(PlanResolution::Unresolved)
            }
        }
    }

    /// Resolve a plan for checkout from its name and a currency.
    ///
    /// Distinguishes an unknown plan from a plan that exists but has no
    /// price in the requested currency.
    pub async fn resolve_for_checkout(
        &self,
        plan_name: &str,
        currency: &str,
    ) -> Result<ResolvedPlan, BillingError> {
        if let Some(plan) = self.plans.resolve_by_name(plan_name, currency).await? {
            return Ok(plan);
        }
        match self.plans.find_by_name(plan_name).await? {
            Some(_) => Err(BillingError::Validation(format!(
                "plan '{plan_name}' is not available in currency '{currency}'"
            ))),
            None => Err(BillingError::Validation(format!(
                "unknown plan '{plan_name}'"
            ))),
        }
    }

    /// Resolve a plan for display from its ID, using any available price
    pub async fn snapshot_plan(
        &self,
        plan_id: Uuid,
    ) -> Result<Option<ResolvedPlan>, BillingError> {
        let prices = self.plans.prices_for_plan(plan_id).await?;
        Ok(prices.into_iter().next())
    }

    /// Usage limit of the profile's current plan.
    ///
    /// Prefers the requested currency and falls back to any price of the
    /// plan, since the limit is currency-independent in practice.
    pub async fn current_limit(
        &self,
        plan_id: Option<Uuid>,
        currency: &str,
    ) -> Result<Option<i64>, BillingError> {
        let Some(plan_id) = plan_id else {
            return Ok(None);
        };
        if let Some(limit) = self.plans.limit_for(plan_id, currency).await? {
            return Ok(Some(limit));
        }
        let prices = self.plans.prices_for_plan(plan_id).await?;
        Ok(prices.first().map(|p| p.usage_limit))
    }
}
