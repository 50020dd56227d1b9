use std::sync::Arc;

use tracing::{info, warn};
use ulid::Ulid;

use crate::model::{DateRange, ItemCondition, MaintenanceRecord, Ms, Reservation, ReservationState};
use crate::observability::SUBSTITUTIONS_TOTAL;
use crate::repo::{ItemRepo, MaintenanceRepo, ReservationRepo};

use super::availability::AvailabilityIndex;
use super::EngineError;

/// Outcome counts of one repair sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassignSummary {
    pub substituted: usize,
    pub cancelled: usize,
    pub failed: usize,
}

/// Repairs outstanding reservations when an item leaves service or overruns
/// its return date.
#[derive(Clone)]
pub struct SubstitutionEngine {
    availability: AvailabilityIndex,
    items: Arc<dyn ItemRepo>,
    reservations: Arc<dyn ReservationRepo>,
    maintenance: Arc<dyn MaintenanceRepo>,
}

impl SubstitutionEngine {
    pub fn new(
        availability: AvailabilityIndex,
        items: Arc<dyn ItemRepo>,
        reservations: Arc<dyn ReservationRepo>,
        maintenance: Arc<dyn MaintenanceRepo>,
    ) -> Self {
        Self { availability, items, reservations, maintenance }
    }

    /// Marks the item with its new condition and repairs every affected
    /// reservation. A supplied `end` creates the maintenance window
    /// `[start, end]`; without one the item is out indefinitely and every
    /// reservation from `start` onwards is affected.
    ///
    /// Occupancy is governed by the record's own interval, so repeated calls
    /// for overlapping windows do not compound.
    pub async fn take_out_of_service(
        &self,
        item: &Ulid,
        condition: ItemCondition,
        start: Ms,
        end: Option<Ms>,
    ) -> Result<ReassignSummary, EngineError> {
        self.items
            .set_condition(item, condition)
            .await?
            .ok_or(EngineError::NotFound(*item))?;
        if let Some(end) = end {
            self.maintenance
                .insert(MaintenanceRecord {
                    id: Ulid::new(),
                    items: vec![*item],
                    start,
                    end: Some(end),
                    completed: false,
                })
                .await?;
        }
        info!("item {item} out of service ({condition}) from {start}");
        self.reassign(item, start, end, true).await
    }

    /// Frees upcoming reservations from a late item without touching its
    /// condition. The window end is exclusive: the item is expected back by
    /// then, so a reservation starting on the return day keeps it.
    pub async fn free_window(
        &self,
        item: &Ulid,
        window: &DateRange,
    ) -> Result<ReassignSummary, EngineError> {
        self.reassign(item, window.start, Some(window.end), false).await
    }

    async fn reassign(
        &self,
        item: &Ulid,
        start: Ms,
        end: Option<Ms>,
        inclusive_end: bool,
    ) -> Result<ReassignSummary, EngineError> {
        let mut summary = ReassignSummary::default();
        for reservation in self.reservations.active_referencing(item).await? {
            let hits_end = match end {
                None => true,
                Some(end) if inclusive_end => reservation.period.start <= end,
                Some(end) => reservation.period.start < end,
            };
            if !hits_end || reservation.period.end < start {
                continue;
            }
            // One reservation failing must not abort the sweep.
            match self.substitute(&reservation, item).await {
                Ok(true) => {
                    summary.substituted += 1;
                    metrics::counter!(SUBSTITUTIONS_TOTAL, "outcome" => "substituted").increment(1);
                }
                Ok(false) => {
                    summary.cancelled += 1;
                    metrics::counter!(SUBSTITUTIONS_TOTAL, "outcome" => "cancelled").increment(1);
                }
                Err(e) => {
                    summary.failed += 1;
                    metrics::counter!(SUBSTITUTIONS_TOTAL, "outcome" => "failed").increment(1);
                    warn!("substitution failed for reservation {}: {e}", reservation.id);
                }
            }
        }
        Ok(summary)
    }

    /// Swap the cheapest equivalent item into the reservation, or cancel it
    /// when the category has no candidate. Returns whether a swap happened.
    async fn substitute(
        &self,
        reservation: &Reservation,
        item: &Ulid,
    ) -> Result<bool, EngineError> {
        let unusable = self
            .items
            .get(item)
            .await?
            .ok_or(EngineError::NotFound(*item))?;
        let mut candidates = self
            .availability
            .get_available(&unusable.category, &reservation.period, Some(&reservation.id))
            .await?;
        // Excluding the reservation's own occupancy makes its other items look
        // free; a unit it already holds is not a replacement.
        candidates.retain(|c| !reservation.items.contains(&c.id));

        match self.availability.cheapest(&candidates, &reservation.period) {
            None => {
                self.reservations
                    .set_state_if(
                        &reservation.id,
                        &[
                            ReservationState::NotStarted,
                            ReservationState::InProgress,
                            ReservationState::Delayed,
                        ],
                        ReservationState::Cancelled,
                    )
                    .await?;
                info!(
                    "no substitute for item {item}: reservation {} cancelled",
                    reservation.id
                );
                Ok(false)
            }
            Some(replacement) => {
                let mut updated = self
                    .reservations
                    .get(&reservation.id)
                    .await?
                    .ok_or(EngineError::NotFound(reservation.id))?;
                if let Some(slot) = updated.items.iter_mut().find(|slot| *slot == item) {
                    *slot = replacement.id;
                }
                let replacement_id = replacement.id;
                self.reservations.update(updated).await?;
                info!(
                    "reservation {}: item {item} replaced by {replacement_id}",
                    reservation.id
                );
                Ok(true)
            }
        }
    }
}
