//! PostgreSQL repository implementations

mod alert;
mod plan;
mod profile;
mod webhook_event;

pub use alert::PgAlertRepository;
pub use plan::PgPlanRepository;
pub use profile::PgProfileRepository;
pub use webhook_event::PgWebhookEventRepository;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub profiles: PgProfileRepository,
    pub plans: PgPlanRepository,
    pub webhook_events: PgWebhookEventRepository,
    pub alerts: PgAlertRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            profiles: PgProfileRepository::new(pool.clone()),
            plans: PgPlanRepository::new(pool.clone()),
            webhook_events: PgWebhookEventRepository::new(pool.clone()),
            alerts: PgAlertRepository::new(pool),
        }
    }
}
