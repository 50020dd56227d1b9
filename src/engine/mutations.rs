use std::collections::HashMap;

use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotificationSink;
use crate::observability::{
    INVOICES_CREATED_TOTAL, PRICE_MISMATCHES_TOTAL, RESERVATIONS_CREATED_TOTAL,
    RESERVATION_CONFLICTS_TOTAL,
};
use crate::repo::{
    CategoryRepo, CustomerRepo, InvoiceRepo, ItemRepo, NotificationRepo, ReservationRepo,
    StaffRepo,
};

use super::{pricing, Engine, EngineError};

/// Penalty rates applied at termination, as fractions of the relevant price.
const DAMAGED_ITEM: f64 = 0.20;
const BROKEN_ITEM: f64 = 0.80;
const DELAYED_RENT: f64 = 0.20;

impl Engine {
    pub async fn create_reservation(
        &self,
        request: ReservationRequest,
    ) -> Result<Reservation, EngineError> {
        if request.period.start > request.period.end {
            return Err(EngineError::InvalidInterval {
                start: request.period.start,
                end: request.period.end,
            });
        }
        if !self.deps.customers.exists(&request.customer).await? {
            return Err(EngineError::NotFound(request.customer));
        }
        let category = self
            .deps
            .categories
            .get(&request.category)
            .await?
            .ok_or(EngineError::NotFound(request.category))?;

        let items = self.fetch_items(&request.items).await?;
        validate_composition(&category, &items)?;

        for item in &items {
            if item.condition == ItemCondition::NotAvailable
                || self.availability.is_occupied(&item.id, &request.period, None).await?
            {
                metrics::counter!(RESERVATION_CONFLICTS_TOTAL).increment(1);
                return Err(EngineError::Conflict(item.id));
            }
        }

        let computed = pricing::price(&items, &request.period, &self.config.pricing);
        if computed != request.price {
            metrics::counter!(PRICE_MISMATCHES_TOTAL).increment(1);
            return Err(EngineError::PriceChanged { quoted: request.price, computed });
        }

        let staff = match request.staff {
            Some(staff) => {
                if !self.deps.staff.exists(&staff).await? {
                    return Err(EngineError::NotFound(staff));
                }
                staff
            }
            None => self.least_loaded_staff().await?,
        };

        let reservation = Reservation {
            id: Ulid::new(),
            customer: request.customer,
            staff,
            items: request.items,
            category: category.id,
            price: request.price,
            period: request.period,
            state: ReservationState::NotStarted,
        };
        self.deps.reservations.insert(reservation.clone()).await?;
        metrics::counter!(RESERVATIONS_CREATED_TOTAL).increment(1);
        info!("reservation {} created for customer {}", reservation.id, reservation.customer);
        Ok(reservation)
    }

    pub async fn modify_reservation(
        &self,
        id: &Ulid,
        patch: ReservationPatch,
    ) -> Result<Reservation, EngineError> {
        let current = self
            .deps
            .reservations
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(*id))?;

        let item_ids = match patch.items {
            Some(items) if !items.is_empty() => items,
            _ => current.items.clone(),
        };
        let period = DateRange {
            start: patch.start.unwrap_or(current.period.start),
            end: patch.end.unwrap_or(current.period.end),
        };
        if period.start > period.end {
            return Err(EngineError::InvalidInterval { start: period.start, end: period.end });
        }
        let price = patch.price.unwrap_or(current.price);

        let category = self
            .deps
            .categories
            .get(&current.category)
            .await?
            .ok_or(EngineError::NotFound(current.category))?;
        let items = self.fetch_items(&item_ids).await?;
        validate_composition(&category, &items)?;

        for item in &items {
            if item.condition == ItemCondition::NotAvailable
                || self.availability.is_occupied(&item.id, &period, Some(id)).await?
            {
                metrics::counter!(RESERVATION_CONFLICTS_TOTAL).increment(1);
                return Err(EngineError::Conflict(item.id));
            }
        }

        let computed = pricing::price(&items, &period, &self.config.pricing);
        if computed != price {
            metrics::counter!(PRICE_MISMATCHES_TOTAL).increment(1);
            return Err(EngineError::PriceChanged { quoted: price, computed });
        }

        // State is never caller-settable; it only moves through the explicit
        // transition operations.
        let updated = Reservation { items: item_ids, period, price, ..current };
        self.deps
            .reservations
            .update(updated.clone())
            .await?
            .ok_or(EngineError::NotFound(*id))?;
        info!("reservation {id} modified");
        Ok(updated)
    }

    pub async fn start_reservation(&self, id: &Ulid) -> Result<Reservation, EngineError> {
        let reservation = self
            .deps
            .reservations
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(*id))?;
        if reservation.state != ReservationState::NotStarted {
            return Err(EngineError::InvalidTransition(reservation.state));
        }
        let now = self.now();
        // One day of grace after the nominal end to pick the rental up.
        if now < reservation.period.start || now > reservation.period.end + DAY_MS {
            return Err(EngineError::InvalidTransition(reservation.state));
        }

        let prior = self
            .deps
            .reservations
            .set_state_if(id, &[ReservationState::NotStarted], ReservationState::InProgress)
            .await?
            .ok_or(EngineError::InvalidTransition(reservation.state))?;

        let mut started = prior;
        started.state = ReservationState::InProgress;
        self.deps
            .sink
            .emit(started.customer, started.id, ReservationState::InProgress)
            .await?;
        info!("reservation {id} started");
        Ok(started)
    }

    pub async fn terminate_reservation(
        &self,
        id: &Ulid,
        returns: &HashMap<Ulid, ReturnedItem>,
        notes: Option<String>,
    ) -> Result<Invoice, EngineError> {
        let reservation = self
            .deps
            .reservations
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(*id))?;
        if !matches!(
            reservation.state,
            ReservationState::InProgress | ReservationState::Delayed
        ) {
            return Err(EngineError::InvalidTransition(reservation.state));
        }

        // Validate the whole return set before mutating anything.
        for item_id in &reservation.items {
            let returned = returns
                .get(item_id)
                .ok_or(EngineError::ReturnedItemsMismatch(*item_id))?;
            if returned.condition.out_of_service() {
                match returned.reparation {
                    Some(window) if window.start <= window.end => {}
                    _ => return Err(EngineError::MissingReparationWindow(*item_id)),
                }
            }
        }

        // The conditional state write is the commit point; a concurrent
        // terminate loses here and never double-invoices.
        let prior = self
            .deps
            .reservations
            .set_state_if(
                id,
                &[ReservationState::InProgress, ReservationState::Delayed],
                ReservationState::Terminated,
            )
            .await?
            .ok_or(EngineError::InvalidTransition(reservation.state))?;

        let mut penalties = 0.0;
        for item_id in &prior.items {
            // A concurrent modify may have swapped an item in since the
            // validation read; bill only what the caller declared.
            let Some(returned) = returns.get(item_id) else {
                continue;
            };
            let item = self
                .deps
                .items
                .get(item_id)
                .await?
                .ok_or(EngineError::NotFound(*item_id))?;
            if item.condition == returned.condition {
                continue;
            }
            if returned.condition.out_of_service() {
                penalties += item.base_price as f64 * BROKEN_ITEM;
                if let Some(window) = returned.reparation {
                    self.substitution
                        .take_out_of_service(
                            item_id,
                            returned.condition,
                            window.start,
                            Some(window.end),
                        )
                        .await?;
                }
            } else {
                self.deps.items.set_condition(item_id, returned.condition).await?;
                if returned.condition.severity() > item.condition.severity() {
                    penalties += item.base_price as f64 * DAMAGED_ITEM;
                }
            }
        }

        if prior.state == ReservationState::Delayed {
            let days_late =
                ((self.now() - prior.period.end) as f64 / DAY_MS as f64).abs().round();
            penalties += days_late * prior.price as f64 * DELAYED_RENT;
        }

        let invoice = Invoice {
            id: Ulid::new(),
            reservation: prior.id,
            customer: prior.customer,
            staff: prior.staff,
            price: (prior.price as f64 + penalties).floor() as Amount,
            period: prior.period,
            returned: returns.iter().map(|(id, r)| (*id, r.condition)).collect(),
            notes,
        };
        self.deps.invoices.insert(invoice.clone()).await?;
        metrics::counter!(INVOICES_CREATED_TOTAL).increment(1);

        self.deps
            .sink
            .emit(prior.customer, prior.id, ReservationState::Terminated)
            .await?;
        info!("reservation {id} terminated, invoice {} at {}", invoice.id, invoice.price);
        Ok(invoice)
    }

    /// Administrative removal: any state, no invoice, no condition rollback.
    pub async fn delete_reservation(&self, id: &Ulid) -> Result<Reservation, EngineError> {
        let removed = self
            .deps
            .reservations
            .remove(id)
            .await?
            .ok_or(EngineError::NotFound(*id))?;
        info!("reservation {id} deleted");
        Ok(removed)
    }

    /// Items referenced by any reservation stay; the booking history points
    /// at them.
    pub async fn delete_item(&self, id: &Ulid) -> Result<Item, EngineError> {
        if self.deps.reservations.references_item(id).await? {
            return Err(EngineError::Referenced(*id));
        }
        self.deps
            .items
            .remove(id)
            .await?
            .ok_or(EngineError::NotFound(*id))
    }

    pub async fn delete_category(&self, id: &Ulid) -> Result<Category, EngineError> {
        if !self.deps.items.by_category(id).await?.is_empty() {
            return Err(EngineError::Referenced(*id));
        }
        self.deps
            .categories
            .remove(id)
            .await?
            .ok_or(EngineError::NotFound(*id))
    }

    pub async fn check_notification(&self, id: &Ulid) -> Result<Notification, EngineError> {
        self.deps
            .notifications
            .set_checked(id)
            .await?
            .ok_or(EngineError::NotFound(*id))
    }

    async fn fetch_items(&self, ids: &[Ulid]) -> Result<Vec<Item>, EngineError> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            items.push(
                self.deps
                    .items
                    .get(id)
                    .await?
                    .ok_or(EngineError::NotFound(*id))?,
            );
        }
        Ok(items)
    }

    /// Round-robin by current load: the staff member carrying the fewest
    /// reservations wins, first id on ties.
    async fn least_loaded_staff(&self) -> Result<Ulid, EngineError> {
        let ids = self.deps.staff.ids().await?;
        let mut best: Option<(Ulid, usize)> = None;
        for id in ids {
            let count = self.deps.reservations.count_for_staff(&id).await?;
            match best {
                Some((_, min)) if count >= min => {}
                _ => best = Some((id, count)),
            }
        }
        best.map(|(id, _)| id).ok_or(EngineError::NoStaffAvailable)
    }
}

/// A single-type category takes exactly one item of its own type; a bundle
/// consumes each declared component exactly once.
fn validate_composition(category: &Category, items: &[Item]) -> Result<(), EngineError> {
    match &category.kind {
        CategoryKind::Single => {
            if items.len() != 1 || items[0].category != category.id {
                return Err(EngineError::InvalidCategory(category.id));
            }
        }
        CategoryKind::Bundle { components } => {
            if items.len() != components.len() {
                return Err(EngineError::InvalidCategory(category.id));
            }
            // One physical unit cannot fill two slots.
            for (i, item) in items.iter().enumerate() {
                if items[..i].iter().any(|earlier| earlier.id == item.id) {
                    return Err(EngineError::InvalidCategory(category.id));
                }
            }
            let mut remaining = components.clone();
            for item in items {
                let Some(slot) = remaining.iter().position(|c| *c == item.category) else {
                    return Err(EngineError::InvalidCategory(category.id));
                };
                remaining.swap_remove(slot);
            }
        }
    }
    Ok(())
}
