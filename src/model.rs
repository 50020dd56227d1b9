use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. All dates and instants use this type.
pub type Ms = i64;

/// Integer currency units. Prices are floored to whole units.
pub type Amount = i64;

pub const DAY_MS: Ms = 86_400_000;

/// Inclusive interval `[start, end]`. A rental covers both endpoint days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Ms,
    pub end: Ms,
}

impl DateRange {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// Inclusive-endpoint overlap: two rentals touching on a shared day clash.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t <= self.end
    }

    /// Whole rental days, both endpoints included.
    pub fn days(&self) -> i64 {
        ((self.end - self.start) as f64 / DAY_MS as f64).round() as i64 + 1
    }
}

/// Physical state of a rentable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    Perfect,
    Good,
    Suitable,
    Broken,
    NotAvailable,
}

impl ItemCondition {
    /// Total wear order; a return at higher severity than before is a downgrade.
    pub fn severity(self) -> u8 {
        match self {
            ItemCondition::Perfect => 0,
            ItemCondition::Good => 1,
            ItemCondition::Suitable => 2,
            ItemCondition::Broken => 3,
            ItemCondition::NotAvailable => 4,
        }
    }

    /// Broken and withdrawn items cannot be handed out.
    pub fn out_of_service(self) -> bool {
        matches!(self, ItemCondition::Broken | ItemCondition::NotAvailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemCondition::Perfect => "perfect",
            ItemCondition::Good => "good",
            ItemCondition::Suitable => "suitable",
            ItemCondition::Broken => "broken",
            ItemCondition::NotAvailable => "not_available",
        }
    }
}

impl std::fmt::Display for ItemCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single physical rentable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Ulid,
    pub name: String,
    /// Single-type category this unit belongs to.
    pub category: Ulid,
    pub base_price: Amount,
    pub condition: ItemCondition,
}

/// A rentable product: one item type, or a fixed bundle of component types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Single,
    Bundle { components: Vec<Ulid> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Ulid,
    pub name: String,
    pub kind: CategoryKind,
}

impl Category {
    /// One slot per item the category composition requires. A single-type
    /// category is its own (only) slot.
    pub fn component_slots(&self) -> Vec<Ulid> {
        match &self.kind {
            CategoryKind::Single => vec![self.id],
            CategoryKind::Bundle { components } => components.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    NotStarted,
    InProgress,
    Delayed,
    Terminated,
    Cancelled,
}

impl ReservationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReservationState::Terminated | ReservationState::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationState::NotStarted => "not_started",
            ReservationState::InProgress => "in_progress",
            ReservationState::Delayed => "delayed",
            ReservationState::Terminated => "terminated",
            ReservationState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking of one or more items for a date interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub customer: Ulid,
    pub staff: Ulid,
    /// Item ids, one per category composition slot.
    pub items: Vec<Ulid>,
    pub category: Ulid,
    /// Snapshotted at creation, re-validated against the recomputed price.
    pub price: Amount,
    pub period: DateRange,
    pub state: ReservationState,
}

/// A window during which items are out of service. `end` is open for
/// permanently withdrawn items; an open record blocks from `start` onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: Ulid,
    pub items: Vec<Ulid>,
    pub start: Ms,
    pub end: Option<Ms>,
    pub completed: bool,
}

impl MaintenanceRecord {
    pub fn blocks(&self, range: &DateRange) -> bool {
        if self.completed {
            return false;
        }
        self.start <= range.end && self.end.is_none_or(|end| end >= range.start)
    }
}

/// Final bill, written exactly once when a reservation terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Ulid,
    pub reservation: Ulid,
    pub customer: Ulid,
    pub staff: Ulid,
    /// Reservation price plus penalties.
    pub price: Amount,
    pub period: DateRange,
    pub returned: HashMap<Ulid, ItemCondition>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Ulid,
    pub customer: Ulid,
    pub reservation: Ulid,
    pub state: ReservationState,
    pub checked: bool,
    pub at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Ulid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: Ulid,
    pub name: String,
}

// ── Operation inputs and results ─────────────────────────────────

/// Booking request as quoted to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub customer: Ulid,
    /// Assigned to the least-loaded staff member when unset.
    pub staff: Option<Ulid>,
    pub items: Vec<Ulid>,
    pub category: Ulid,
    pub period: DateRange,
    /// Client-side quote; a mismatch with the recomputed price is rejected.
    pub price: Amount,
}

/// Modification request; unset fields keep their current value. An empty item
/// list counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationPatch {
    pub items: Option<Vec<Ulid>>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
    pub price: Option<Amount>,
}

/// Per-item return declaration when terminating a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedItem {
    pub condition: ItemCondition,
    /// Required when the condition is broken or not_available.
    pub reparation: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityQuote {
    pub available: bool,
    /// Cheapest free item per composition slot, empty when unavailable.
    pub items: Vec<Item>,
    pub price: Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReparationFilter {
    pub item: Option<Ulid>,
    pub completed: Option<bool>,
}

impl ReparationFilter {
    pub fn matches(&self, record: &MaintenanceRecord) -> bool {
        self.item.is_none_or(|id| record.items.contains(&id))
            && self.completed.is_none_or(|c| record.completed == c)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    pub customer: Option<Ulid>,
    pub state: Option<ReservationState>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.customer.is_none_or(|id| reservation.customer == id)
            && self.state.is_none_or(|s| reservation.state == s)
    }
}
