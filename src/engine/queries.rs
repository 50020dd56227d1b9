use ulid::Ulid;

use crate::model::*;
use crate::repo::{
    CategoryRepo, CustomerRepo, InvoiceRepo, MaintenanceRepo, NotificationRepo, ReservationRepo,
};

use super::{pricing, Engine, EngineError};

impl Engine {
    pub async fn get_reservation(&self, id: &Ulid) -> Result<Reservation, EngineError> {
        self.deps
            .reservations
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(*id))
    }

    pub async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> Result<Vec<Reservation>, EngineError> {
        let mut rows = self.deps.reservations.list().await?;
        rows.retain(|r| filter.matches(r));
        Ok(rows)
    }

    /// Can the category be fulfilled over the range, and at what price? Picks
    /// the cheapest free item per composition slot, the same selection a
    /// booking made from this quote would receive.
    pub async fn query_availability(
        &self,
        category: &Ulid,
        range: &DateRange,
        exclude: Option<&Ulid>,
    ) -> Result<AvailabilityQuote, EngineError> {
        if range.start > range.end {
            return Err(EngineError::InvalidInterval { start: range.start, end: range.end });
        }
        let category = self
            .deps
            .categories
            .get(category)
            .await?
            .ok_or(EngineError::NotFound(*category))?;

        let mut chosen: Vec<Item> = Vec::new();
        for slot in category.component_slots() {
            let mut candidates = self.availability.get_available(&slot, range, exclude).await?;
            // A bundle must not hand the same unit to two slots.
            candidates.retain(|c| chosen.iter().all(|taken| taken.id != c.id));
            match self.availability.cheapest(&candidates, range) {
                None => {
                    return Ok(AvailabilityQuote { available: false, items: vec![], price: 0 });
                }
                Some(item) => chosen.push(item.clone()),
            }
        }

        let price = pricing::price(&chosen, range, &self.config.pricing);
        Ok(AvailabilityQuote { available: true, items: chosen, price })
    }

    pub async fn list_reparations(
        &self,
        filter: &ReparationFilter,
    ) -> Result<Vec<MaintenanceRecord>, EngineError> {
        let mut rows = self.deps.maintenance.list().await?;
        rows.retain(|r| filter.matches(r));
        Ok(rows)
    }

    pub async fn unchecked_notifications(
        &self,
        customer: &Ulid,
    ) -> Result<Vec<Notification>, EngineError> {
        if !self.deps.customers.exists(customer).await? {
            return Err(EngineError::NotFound(*customer));
        }
        Ok(self.deps.notifications.unchecked_for(customer).await?)
    }

    pub async fn get_invoice(&self, id: &Ulid) -> Result<Invoice, EngineError> {
        self.deps
            .invoices
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(*id))
    }

    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, EngineError> {
        Ok(self.deps.invoices.list().await?)
    }
}
