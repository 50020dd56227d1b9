mod availability;
mod error;
mod mutations;
mod pricing;
mod queries;
mod substitution;

pub use availability::AvailabilityIndex;
pub use error::EngineError;
pub use pricing::{price, unit_price, PricingConfig};
pub use substitution::{ReassignSummary, SubstitutionEngine};

use std::sync::Arc;

use crate::clock::Clock;
use crate::model::Ms;
use crate::notify::{NotificationSink, RecordSink};
use crate::repo::{
    CategoryRepo, CustomerRepo, InMemoryCategories, InMemoryCustomers, InMemoryInvoices,
    InMemoryItems, InMemoryMaintenance, InMemoryNotifications, InMemoryReservations,
    InMemoryStaff, InvoiceRepo, ItemRepo, MaintenanceRepo, NotificationRepo, ReservationRepo,
    StaffRepo,
};

/// Collaborators injected into the engine. One instance wires the whole
/// component tree; tests swap in fakes per repository.
#[derive(Clone)]
pub struct Deps {
    pub items: Arc<dyn ItemRepo>,
    pub categories: Arc<dyn CategoryRepo>,
    pub customers: Arc<dyn CustomerRepo>,
    pub staff: Arc<dyn StaffRepo>,
    pub reservations: Arc<dyn ReservationRepo>,
    pub maintenance: Arc<dyn MaintenanceRepo>,
    pub invoices: Arc<dyn InvoiceRepo>,
    pub notifications: Arc<dyn NotificationRepo>,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn NotificationSink>,
}

impl Deps {
    /// In-memory wiring with the record-persisting notification sink.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let notifications = Arc::new(InMemoryNotifications::default());
        let sink = Arc::new(RecordSink::new(notifications.clone(), clock.clone()));
        Self {
            items: Arc::new(InMemoryItems::default()),
            categories: Arc::new(InMemoryCategories::default()),
            customers: Arc::new(InMemoryCustomers::default()),
            staff: Arc::new(InMemoryStaff::default()),
            reservations: Arc::new(InMemoryReservations::default()),
            maintenance: Arc::new(InMemoryMaintenance::default()),
            invoices: Arc::new(InMemoryInvoices::default()),
            notifications,
            clock,
            sink,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Days past a reservation's end before its items are proactively freed
    /// for upcoming bookings.
    pub grace_days: i64,
    pub pricing: PricingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { grace_days: 2, pricing: PricingConfig::default() }
    }
}

/// Facade over the availability, pricing, substitution, and lifecycle
/// components. All consistency relies on re-checking at commit time and on
/// state predicates; no component takes locks of its own.
pub struct Engine {
    pub(crate) deps: Deps,
    pub(crate) availability: AvailabilityIndex,
    pub(crate) substitution: SubstitutionEngine,
    pub(crate) config: EngineConfig,
}

impl Engine {
    pub fn new(deps: Deps, config: EngineConfig) -> Self {
        let availability = AvailabilityIndex::new(
            deps.reservations.clone(),
            deps.maintenance.clone(),
            deps.items.clone(),
            config.pricing,
        );
        let substitution = SubstitutionEngine::new(
            availability.clone(),
            deps.items.clone(),
            deps.reservations.clone(),
            deps.maintenance.clone(),
        );
        Self { deps, availability, substitution, config }
    }

    pub fn availability(&self) -> &AvailabilityIndex {
        &self.availability
    }

    pub fn substitution(&self) -> &SubstitutionEngine {
        &self.substitution
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> Ms {
        self.deps.clock.now()
    }
}
