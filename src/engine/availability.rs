use std::sync::Arc;

use ulid::Ulid;

use crate::model::{DateRange, Item, ItemCondition};
use crate::repo::{ItemRepo, MaintenanceRepo, ReservationRepo};

use super::pricing::{self, PricingConfig};
use super::EngineError;

/// Decides whether an item is busy over an interval by consulting outstanding
/// reservations and open maintenance windows.
#[derive(Clone)]
pub struct AvailabilityIndex {
    reservations: Arc<dyn ReservationRepo>,
    maintenance: Arc<dyn MaintenanceRepo>,
    items: Arc<dyn ItemRepo>,
    pricing: PricingConfig,
}

impl AvailabilityIndex {
    pub fn new(
        reservations: Arc<dyn ReservationRepo>,
        maintenance: Arc<dyn MaintenanceRepo>,
        items: Arc<dyn ItemRepo>,
        pricing: PricingConfig,
    ) -> Self {
        Self { reservations, maintenance, items, pricing }
    }

    /// Inclusive-overlap occupancy. `exclude` lets a modification check
    /// against every reservation but its own prior record.
    pub async fn is_occupied(
        &self,
        item: &Ulid,
        range: &DateRange,
        exclude: Option<&Ulid>,
    ) -> Result<bool, EngineError> {
        for reservation in self.reservations.active_referencing(item).await? {
            if exclude.is_some_and(|x| *x == reservation.id) {
                continue;
            }
            if reservation.period.overlaps(range) {
                return Ok(true);
            }
        }
        for record in self.maintenance.open_for_item(item).await? {
            if record.blocks(range) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every item of the (single-type) category that is in service and free
    /// over the range.
    pub async fn get_available(
        &self,
        category: &Ulid,
        range: &DateRange,
        exclude: Option<&Ulid>,
    ) -> Result<Vec<Item>, EngineError> {
        let mut free = Vec::new();
        for item in self.items.by_category(category).await? {
            if item.condition == ItemCondition::NotAvailable {
                continue;
            }
            if !self.is_occupied(&item.id, range, exclude).await? {
                free.push(item);
            }
        }
        Ok(free)
    }

    /// Cheapest candidate by single-item pricing. Ties keep the first
    /// encountered; an empty slice means no candidate, never a price.
    pub fn cheapest<'a>(&self, items: &'a [Item], range: &DateRange) -> Option<&'a Item> {
        let mut best: Option<(&Item, i64)> = None;
        for item in items {
            let quote = pricing::price(std::slice::from_ref(item), range, &self.pricing);
            match best {
                Some((_, cheapest)) if quote >= cheapest => {}
                _ => best = Some((item, quote)),
            }
        }
        best.map(|(item, _)| item)
    }
}
