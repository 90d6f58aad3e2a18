//! Shared test fixtures: in-memory repositories and a scripted payment
//! provider.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use tollgate_billing_core::{
    BillingConfig, BillingError, BillingService, HostedCheckout, HostedCheckoutRequest,
    PaymentProvider, RemoteSubscription,
};
use tollgate_db::{
    AlertRepository, AlertRow, DbResult, IngestOutcome, PlanRepository, PlanRow, ProfileChanges,
    ProfileRepository, ProfileRow, ResolvedPlan, WebhookEventRepository, WebhookEventRow,
};
use tollgate_types::{AlertDraft, PlanId, SubscriberId};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const STRIPE_KEY: &str = "sk_test_key";

/// In-memory profile repository
#[derive(Default, Clone)]
pub struct MockProfileRepository {
    profiles: Arc<DashMap<Uuid, ProfileRow>>,
}

impl MockProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: ProfileRow) {
        self.profiles.insert(profile.subscriber_id, profile);
    }

    pub fn get(&self, subscriber_id: Uuid) -> Option<ProfileRow> {
        self.profiles.get(&subscriber_id).map(|r| r.value().clone())
    }
}

pub fn blank_profile(subscriber_id: Uuid) -> ProfileRow {
    ProfileRow {
        subscriber_id,
        plan_id: None,
        active: false,
        cancel_at_period_end: false,
        pending_plan_change: false,
        target_plan_id: None,
        subscription_status: None,
        external_customer_ref: None,
        external_subscription_ref: None,
        current_period_end: None,
        usage_count: 0,
        last_checkout_at: None,
        version: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl ProfileRepository for MockProfileRepository {
    async fn find_by_subscriber_id(&self, subscriber_id: Uuid) -> DbResult<Option<ProfileRow>> {
        Ok(self.get(subscriber_id))
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> DbResult<Option<ProfileRow>> {
        Ok(self
            .profiles
            .iter()
            .find(|r| r.external_subscription_ref.as_deref() == Some(subscription_ref))
            .map(|r| r.value().clone()))
    }

    async fn find_by_customer_ref(&self, customer_ref: &str) -> DbResult<Option<ProfileRow>> {
        Ok(self
            .profiles
            .iter()
            .find(|r| r.external_customer_ref.as_deref() == Some(customer_ref))
            .map(|r| r.value().clone()))
    }

    async fn ensure_exists(&self, subscriber_id: Uuid) -> DbResult<ProfileRow> {
        let row = self
            .profiles
            .entry(subscriber_id)
            .or_insert_with(|| blank_profile(subscriber_id));
        Ok(row.value().clone())
    }

    async fn apply_changes(
        &self,
        subscriber_id: Uuid,
        changes: &ProfileChanges,
        expected_version: i64,
    ) -> DbResult<bool> {
        let Some(mut row) = self.profiles.get_mut(&subscriber_id) else {
            return Ok(false);
        };
        if row.version != expected_version {
            return Ok(false);
        }
        changes.apply_to(row.value_mut());
        Ok(true)
    }
}

/// Profile repository wrapper that loses a set number of conditional writes
/// before delegating, simulating a concurrent writer winning the version race
#[derive(Clone)]
pub struct ContendedProfileRepository {
    inner: MockProfileRepository,
    losses_left: Arc<AtomicU32>,
}

impl ContendedProfileRepository {
    pub fn losing_first(inner: MockProfileRepository, losses: u32) -> Self {
        Self {
            inner,
            losses_left: Arc::new(AtomicU32::new(losses)),
        }
    }
}

#[async_trait]
impl ProfileRepository for ContendedProfileRepository {
    async fn find_by_subscriber_id(&self, subscriber_id: Uuid) -> DbResult<Option<ProfileRow>> {
        self.inner.find_by_subscriber_id(subscriber_id).await
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> DbResult<Option<ProfileRow>> {
        self.inner.find_by_subscription_ref(subscription_ref).await
    }

    async fn find_by_customer_ref(&self, customer_ref: &str) -> DbResult<Option<ProfileRow>> {
        self.inner.find_by_customer_ref(customer_ref).await
    }

    async fn ensure_exists(&self, subscriber_id: Uuid) -> DbResult<ProfileRow> {
        self.inner.ensure_exists(subscriber_id).await
    }

    async fn apply_changes(
        &self,
        subscriber_id: Uuid,
        changes: &ProfileChanges,
        expected_version: i64,
    ) -> DbResult<bool> {
        if self
            .losses_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(false);
        }
        self.inner
            .apply_changes(subscriber_id, changes, expected_version)
            .await
    }
}

/// In-memory plan catalog
#[derive(Default, Clone)]
pub struct MockPlanRepository {
    plans: Arc<DashMap<Uuid, PlanRow>>,
    prices: Arc<DashMap<String, ResolvedPlan>>,
}

impl MockPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a plan with one price
    pub fn seed(&self, name: &str, currency: &str, price_ref: &str, usage_limit: i64) -> Uuid {
        // Look up in its own statement so the iterator's shard guard is
        // dropped before the insert below takes a write lock on the same map.
        let existing = self.plans.iter().find(|p| p.name == name).map(|p| p.id);
        let plan_id = existing.unwrap_or_else(|| {
            let id = Uuid::new_v4();
            self.plans.insert(
                id,
                PlanRow {
                    id,
                    name: name.to_string(),
                    created_at: Utc::now(),
                },
            );
            id
        });
        self.prices.insert(
            price_ref.to_string(),
            ResolvedPlan {
                plan_id,
                name: name.to_string(),
                currency: currency.to_string(),
                price_ref: price_ref.to_string(),
                usage_limit,
            },
        );
        plan_id
    }
}

#[async_trait]
impl PlanRepository for MockPlanRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PlanRow>> {
        Ok(self.plans.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_name(&self, name: &str) -> DbResult<Option<PlanRow>> {
        Ok(self
            .plans
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value().clone()))
    }

    async fn resolve_by_price_ref(&self, price_ref: &str) -> DbResult<Option<ResolvedPlan>> {
        Ok(self.prices.get(price_ref).map(|r| r.value().clone()))
    }

    async fn resolve_by_name(&self, name: &str, currency: &str) -> DbResult<Option<ResolvedPlan>> {
        Ok(self
            .prices
            .iter()
            .find(|p| p.name == name && p.currency == currency)
            .map(|p| p.value().clone()))
    }

    async fn limit_for(&self, plan_id: Uuid, currency: &str) -> DbResult<Option<i64>> {
        Ok(self
            .prices
            .iter()
            .find(|p| p.plan_id == plan_id && p.currency == currency)
            .map(|p| p.usage_limit))
    }

    async fn prices_for_plan(&self, plan_id: Uuid) -> DbResult<Vec<ResolvedPlan>> {
        let mut prices: Vec<ResolvedPlan> = self
            .prices
            .iter()
            .filter(|p| p.plan_id == plan_id)
            .map(|p| p.value().clone())
            .collect();
        prices.sort_by(|a, b| a.currency.cmp(&b.currency));
        Ok(prices)
    }
}

/// In-memory idempotency ledger
#[derive(Default, Clone)]
pub struct MockWebhookEventRepository {
    events: Arc<DashMap<String, WebhookEventRow>>,
}

impl MockWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[async_trait]
impl WebhookEventRepository for MockWebhookEventRepository {
    async fn record_if_new(
        &self,
        event_id: &str,
        event_type: &str,
        payload: &Value,
    ) -> DbResult<IngestOutcome> {
        use dashmap::mapref::entry::Entry;
        match self.events.entry(event_id.to_string()) {
            Entry::Occupied(_) => Ok(IngestOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(WebhookEventRow {
                    event_id: event_id.to_string(),
                    event_type: event_type.to_string(),
                    payload: payload.clone(),
                    received_at: Utc::now(),
                });
                Ok(IngestOutcome::New)
            }
        }
    }

    async fn find_by_event_id(&self, event_id: &str) -> DbResult<Option<WebhookEventRow>> {
        Ok(self.events.get(event_id).map(|r| r.value().clone()))
    }
}

/// In-memory alert repository
#[derive(Default, Clone)]
pub struct MockAlertRepository {
    alerts: Arc<Mutex<Vec<AlertRow>>>,
}

impl MockAlertRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<AlertRow> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertRepository for MockAlertRepository {
    async fn create(&self, alert: &AlertDraft) -> DbResult<AlertRow> {
        let row = AlertRow {
            id: Uuid::new_v4(),
            alert_type: alert.alert_type.clone(),
            severity: alert.severity.as_str().to_string(),
            message: alert.message.clone(),
            metadata: alert.metadata.clone(),
            resolved: false,
            created_at: Utc::now(),
        };
        self.alerts.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_unresolved(&self, limit: i64) -> DbResult<Vec<AlertRow>> {
        let mut rows = self.alerts.lock().unwrap().clone();
        rows.reverse();
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

/// Scripted payment provider that records its calls
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    pub remote: Arc<Mutex<Option<RemoteSubscription>>>,
    pub checkout_calls: Arc<Mutex<Vec<HostedCheckoutRequest>>>,
    pub price_updates: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_remote(&self, remote: RemoteSubscription) {
        *self.remote.lock().unwrap() = Some(remote);
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &HostedCheckoutRequest,
    ) -> Result<HostedCheckout, BillingError> {
        self.checkout_calls.lock().unwrap().push(request.clone());
        Ok(HostedCheckout {
            session_id: "cs_test_1".to_string(),
            url: "https://checkout.example.com/cs_test_1".to_string(),
        })
    }

    async fn get_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<RemoteSubscription, BillingError> {
        self.remote
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BillingError::ExternalService(format!("no such {subscription_ref}")))
    }

    async fn update_subscription_price(
        &self,
        subscription_ref: &str,
        price_ref: &str,
        _plan_id: PlanId,
    ) -> Result<RemoteSubscription, BillingError> {
        self.price_updates
            .lock()
            .unwrap()
            .push((subscription_ref.to_string(), price_ref.to_string()));
        self.remote
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BillingError::ExternalService(format!("no such {subscription_ref}")))
    }
}

/// Everything a pipeline test needs, wired together
pub struct Harness {
    pub service: BillingService,
    pub profiles: MockProfileRepository,
    pub plans: MockPlanRepository,
    pub ledger: MockWebhookEventRepository,
    pub alerts: MockAlertRepository,
    pub provider: MockPaymentProvider,
}

impl Harness {
    pub fn new() -> Self {
        let profiles = MockProfileRepository::new();
        let plans = MockPlanRepository::new();
        let ledger = MockWebhookEventRepository::new();
        let alerts = MockAlertRepository::new();
        let provider = MockPaymentProvider::new();

        let service = BillingService::new(
            Arc::new(profiles.clone()),
            Arc::new(plans.clone()),
            Arc::new(ledger.clone()),
            Arc::new(alerts.clone()),
            Arc::new(provider.clone()),
            BillingConfig::new(STRIPE_KEY, WEBHOOK_SECRET),
        );

        Self {
            service,
            profiles,
            plans,
            ledger,
            alerts,
            provider,
        }
    }

    /// Seed a subscriber already on a plan with an active subscription
    pub fn seed_active_subscriber(&self, plan_id: Uuid, sub_ref: &str) -> SubscriberId {
        let subscriber_id = Uuid::new_v4();
        let mut profile = blank_profile(subscriber_id);
        profile.plan_id = Some(plan_id);
        profile.active = true;
        profile.external_customer_ref = Some("cus_test".to_string());
        profile.external_subscription_ref = Some(sub_ref.to_string());
        self.profiles.insert(profile);
        SubscriberId(subscriber_id)
    }
}

/// Sign a payload the way the processor does
pub fn sign(payload: &[u8], timestamp: i64) -> String {
    let signed = format!(
        "{}.{}",
        timestamp,
        std::str::from_utf8(payload).expect("utf8 payload")
    );
    let mut mac =
        Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("hmac key");
    mac.update(signed.as_bytes());
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Build a signed envelope around an event object
pub fn envelope(event_id: &str, event_type: &str, object: Value) -> (Vec<u8>, String) {
    let payload = serde_json::to_vec(&json!({
        "id": event_id,
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": { "object": object },
    }))
    .expect("serialize envelope");
    let sig = sign(&payload, Utc::now().timestamp());
    (payload, sig)
}
