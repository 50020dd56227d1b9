//! Repository contracts the engine depends on, plus in-memory reference
//! implementations. Durable persistence lives behind these traits; the engine
//! only assumes reads reflect the latest committed writes.

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// Storage failures propagate unchanged; retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct StorageError {
    pub message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage error: {}", self.message)
    }
}

impl std::error::Error for StorageError {}

// ── Contracts ────────────────────────────────────────────────────

#[async_trait]
pub trait ItemRepo: Send + Sync {
    async fn insert(&self, item: Item) -> Result<(), StorageError>;
    async fn get(&self, id: &Ulid) -> Result<Option<Item>, StorageError>;
    /// Applies the condition and returns the prior snapshot.
    async fn set_condition(
        &self,
        id: &Ulid,
        condition: ItemCondition,
    ) -> Result<Option<Item>, StorageError>;
    async fn by_category(&self, category: &Ulid) -> Result<Vec<Item>, StorageError>;
    async fn remove(&self, id: &Ulid) -> Result<Option<Item>, StorageError>;
    async fn list(&self) -> Result<Vec<Item>, StorageError>;
}

#[async_trait]
pub trait CategoryRepo: Send + Sync {
    async fn insert(&self, category: Category) -> Result<(), StorageError>;
    async fn get(&self, id: &Ulid) -> Result<Option<Category>, StorageError>;
    async fn remove(&self, id: &Ulid) -> Result<Option<Category>, StorageError>;
    async fn list(&self) -> Result<Vec<Category>, StorageError>;
}

#[async_trait]
pub trait CustomerRepo: Send + Sync {
    async fn insert(&self, customer: Customer) -> Result<(), StorageError>;
    async fn exists(&self, id: &Ulid) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait StaffRepo: Send + Sync {
    async fn insert(&self, staff: Staff) -> Result<(), StorageError>;
    async fn exists(&self, id: &Ulid) -> Result<bool, StorageError>;
    /// Stable (id-sorted) listing so load balancing breaks ties the same way
    /// on every call.
    async fn ids(&self) -> Result<Vec<Ulid>, StorageError>;
}

#[async_trait]
pub trait ReservationRepo: Send + Sync {
    async fn insert(&self, reservation: Reservation) -> Result<(), StorageError>;
    async fn get(&self, id: &Ulid) -> Result<Option<Reservation>, StorageError>;
    /// Full-record replace; returns the prior snapshot.
    async fn update(&self, reservation: Reservation) -> Result<Option<Reservation>, StorageError>;
    async fn remove(&self, id: &Ulid) -> Result<Option<Reservation>, StorageError>;
    /// Conditional state write: applies `next` only when the current state is
    /// one of `expected`, returning the prior snapshot. This is the
    /// serialization point for concurrent terminates and scheduler
    /// escalations.
    async fn set_state_if(
        &self,
        id: &Ulid,
        expected: &[ReservationState],
        next: ReservationState,
    ) -> Result<Option<Reservation>, StorageError>;
    /// Reservations not in a terminal state that reference the item.
    async fn active_referencing(&self, item: &Ulid) -> Result<Vec<Reservation>, StorageError>;
    /// Whether any reservation, in any state, references the item.
    async fn references_item(&self, item: &Ulid) -> Result<bool, StorageError>;
    async fn count_for_staff(&self, staff: &Ulid) -> Result<usize, StorageError>;
    /// Overdue in-progress reservations plus everything already delayed.
    async fn due_for_delay(&self, now: Ms) -> Result<Vec<Reservation>, StorageError>;
    async fn list(&self) -> Result<Vec<Reservation>, StorageError>;
}

#[async_trait]
pub trait MaintenanceRepo: Send + Sync {
    async fn insert(&self, record: MaintenanceRecord) -> Result<(), StorageError>;
    async fn get(&self, id: &Ulid) -> Result<Option<MaintenanceRecord>, StorageError>;
    /// Incomplete records whose end date has elapsed. Open-ended records never
    /// come due.
    async fn due(&self, now: Ms) -> Result<Vec<MaintenanceRecord>, StorageError>;
    async fn set_completed(&self, id: &Ulid) -> Result<bool, StorageError>;
    /// Incomplete records referencing the item.
    async fn open_for_item(&self, item: &Ulid) -> Result<Vec<MaintenanceRecord>, StorageError>;
    async fn list(&self) -> Result<Vec<MaintenanceRecord>, StorageError>;
}

#[async_trait]
pub trait InvoiceRepo: Send + Sync {
    async fn insert(&self, invoice: Invoice) -> Result<(), StorageError>;
    async fn get(&self, id: &Ulid) -> Result<Option<Invoice>, StorageError>;
    async fn list(&self) -> Result<Vec<Invoice>, StorageError>;
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<(), StorageError>;
    async fn unchecked_for(&self, customer: &Ulid) -> Result<Vec<Notification>, StorageError>;
    /// Marks the notification acknowledged, returning the updated record.
    async fn set_checked(&self, id: &Ulid) -> Result<Option<Notification>, StorageError>;
}

// ── In-memory implementations ────────────────────────────────────

fn sorted_by_id<T, F: Fn(&T) -> Ulid>(mut rows: Vec<T>, id: F) -> Vec<T> {
    rows.sort_by_key(|r| id(r));
    rows
}

#[derive(Default)]
pub struct InMemoryItems {
    rows: DashMap<Ulid, Item>,
}

#[async_trait]
impl ItemRepo for InMemoryItems {
    async fn insert(&self, item: Item) -> Result<(), StorageError> {
        self.rows.insert(item.id, item);
        Ok(())
    }

    async fn get(&self, id: &Ulid) -> Result<Option<Item>, StorageError> {
        Ok(self.rows.get(id).map(|e| e.value().clone()))
    }

    async fn set_condition(
        &self,
        id: &Ulid,
        condition: ItemCondition,
    ) -> Result<Option<Item>, StorageError> {
        Ok(self.rows.get_mut(id).map(|mut e| {
            let prior = e.value().clone();
            e.value_mut().condition = condition;
            prior
        }))
    }

    async fn by_category(&self, category: &Ulid) -> Result<Vec<Item>, StorageError> {
        let rows = self
            .rows
            .iter()
            .filter(|e| e.value().category == *category)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |i: &Item| i.id))
    }

    async fn remove(&self, id: &Ulid) -> Result<Option<Item>, StorageError> {
        Ok(self.rows.remove(id).map(|(_, item)| item))
    }

    async fn list(&self) -> Result<Vec<Item>, StorageError> {
        Ok(sorted_by_id(
            self.rows.iter().map(|e| e.value().clone()).collect(),
            |i: &Item| i.id,
        ))
    }
}

#[derive(Default)]
pub struct InMemoryCategories {
    rows: DashMap<Ulid, Category>,
}

#[async_trait]
impl CategoryRepo for InMemoryCategories {
    async fn insert(&self, category: Category) -> Result<(), StorageError> {
        self.rows.insert(category.id, category);
        Ok(())
    }

    async fn get(&self, id: &Ulid) -> Result<Option<Category>, StorageError> {
        Ok(self.rows.get(id).map(|e| e.value().clone()))
    }

    async fn remove(&self, id: &Ulid) -> Result<Option<Category>, StorageError> {
        Ok(self.rows.remove(id).map(|(_, c)| c))
    }

    async fn list(&self) -> Result<Vec<Category>, StorageError> {
        Ok(sorted_by_id(
            self.rows.iter().map(|e| e.value().clone()).collect(),
            |c: &Category| c.id,
        ))
    }
}

#[derive(Default)]
pub struct InMemoryCustomers {
    rows: DashMap<Ulid, Customer>,
}

#[async_trait]
impl CustomerRepo for InMemoryCustomers {
    async fn insert(&self, customer: Customer) -> Result<(), StorageError> {
        self.rows.insert(customer.id, customer);
        Ok(())
    }

    async fn exists(&self, id: &Ulid) -> Result<bool, StorageError> {
        Ok(self.rows.contains_key(id))
    }
}

#[derive(Default)]
pub struct InMemoryStaff {
    rows: DashMap<Ulid, Staff>,
}

#[async_trait]
impl StaffRepo for InMemoryStaff {
    async fn insert(&self, staff: Staff) -> Result<(), StorageError> {
        self.rows.insert(staff.id, staff);
        Ok(())
    }

    async fn exists(&self, id: &Ulid) -> Result<bool, StorageError> {
        Ok(self.rows.contains_key(id))
    }

    async fn ids(&self) -> Result<Vec<Ulid>, StorageError> {
        let mut ids: Vec<Ulid> = self.rows.iter().map(|e| *e.key()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Default)]
pub struct InMemoryReservations {
    rows: DashMap<Ulid, Reservation>,
}

#[async_trait]
impl ReservationRepo for InMemoryReservations {
    async fn insert(&self, reservation: Reservation) -> Result<(), StorageError> {
        self.rows.insert(reservation.id, reservation);
        Ok(())
    }

    async fn get(&self, id: &Ulid) -> Result<Option<Reservation>, StorageError> {
        Ok(self.rows.get(id).map(|e| e.value().clone()))
    }

    async fn update(&self, reservation: Reservation) -> Result<Option<Reservation>, StorageError> {
        Ok(self.rows.get_mut(&reservation.id).map(|mut e| {
            let prior = e.value().clone();
            *e.value_mut() = reservation;
            prior
        }))
    }

    async fn remove(&self, id: &Ulid) -> Result<Option<Reservation>, StorageError> {
        Ok(self.rows.remove(id).map(|(_, r)| r))
    }

    async fn set_state_if(
        &self,
        id: &Ulid,
        expected: &[ReservationState],
        next: ReservationState,
    ) -> Result<Option<Reservation>, StorageError> {
        // The entry guard makes the check-and-write atomic per reservation.
        Ok(self.rows.get_mut(id).and_then(|mut e| {
            if !expected.contains(&e.value().state) {
                return None;
            }
            let prior = e.value().clone();
            e.value_mut().state = next;
            Some(prior)
        }))
    }

    async fn active_referencing(&self, item: &Ulid) -> Result<Vec<Reservation>, StorageError> {
        let rows = self
            .rows
            .iter()
            .filter(|e| !e.value().state.is_terminal() && e.value().items.contains(item))
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |r: &Reservation| r.id))
    }

    async fn references_item(&self, item: &Ulid) -> Result<bool, StorageError> {
        Ok(self.rows.iter().any(|e| e.value().items.contains(item)))
    }

    async fn count_for_staff(&self, staff: &Ulid) -> Result<usize, StorageError> {
        Ok(self.rows.iter().filter(|e| e.value().staff == *staff).count())
    }

    async fn due_for_delay(&self, now: Ms) -> Result<Vec<Reservation>, StorageError> {
        let rows = self
            .rows
            .iter()
            .filter(|e| {
                let r = e.value();
                r.state == ReservationState::Delayed
                    || (r.state == ReservationState::InProgress && r.period.end <= now)
            })
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |r: &Reservation| r.id))
    }

    async fn list(&self) -> Result<Vec<Reservation>, StorageError> {
        Ok(sorted_by_id(
            self.rows.iter().map(|e| e.value().clone()).collect(),
            |r: &Reservation| r.id,
        ))
    }
}

#[derive(Default)]
pub struct InMemoryMaintenance {
    rows: DashMap<Ulid, MaintenanceRecord>,
}

#[async_trait]
impl MaintenanceRepo for InMemoryMaintenance {
    async fn insert(&self, record: MaintenanceRecord) -> Result<(), StorageError> {
        self.rows.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: &Ulid) -> Result<Option<MaintenanceRecord>, StorageError> {
        Ok(self.rows.get(id).map(|e| e.value().clone()))
    }

    async fn due(&self, now: Ms) -> Result<Vec<MaintenanceRecord>, StorageError> {
        let rows = self
            .rows
            .iter()
            .filter(|e| {
                let r = e.value();
                !r.completed && r.end.is_some_and(|end| end <= now)
            })
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |r: &MaintenanceRecord| r.id))
    }

    async fn set_completed(&self, id: &Ulid) -> Result<bool, StorageError> {
        Ok(self
            .rows
            .get_mut(id)
            .map(|mut e| {
                e.value_mut().completed = true;
            })
            .is_some())
    }

    async fn open_for_item(&self, item: &Ulid) -> Result<Vec<MaintenanceRecord>, StorageError> {
        let rows = self
            .rows
            .iter()
            .filter(|e| !e.value().completed && e.value().items.contains(item))
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |r: &MaintenanceRecord| r.id))
    }

    async fn list(&self) -> Result<Vec<MaintenanceRecord>, StorageError> {
        Ok(sorted_by_id(
            self.rows.iter().map(|e| e.value().clone()).collect(),
            |r: &MaintenanceRecord| r.id,
        ))
    }
}

#[derive(Default)]
pub struct InMemoryInvoices {
    rows: DashMap<Ulid, Invoice>,
}

#[async_trait]
impl InvoiceRepo for InMemoryInvoices {
    async fn insert(&self, invoice: Invoice) -> Result<(), StorageError> {
        self.rows.insert(invoice.id, invoice);
        Ok(())
    }

    async fn get(&self, id: &Ulid) -> Result<Option<Invoice>, StorageError> {
        Ok(self.rows.get(id).map(|e| e.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Invoice>, StorageError> {
        Ok(sorted_by_id(
            self.rows.iter().map(|e| e.value().clone()).collect(),
            |i: &Invoice| i.id,
        ))
    }
}

#[derive(Default)]
pub struct InMemoryNotifications {
    rows: DashMap<Ulid, Notification>,
}

#[async_trait]
impl NotificationRepo for InMemoryNotifications {
    async fn insert(&self, notification: Notification) -> Result<(), StorageError> {
        self.rows.insert(notification.id, notification);
        Ok(())
    }

    async fn unchecked_for(&self, customer: &Ulid) -> Result<Vec<Notification>, StorageError> {
        let rows = self
            .rows
            .iter()
            .filter(|e| !e.value().checked && e.value().customer == *customer)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_id(rows, |n: &Notification| n.id))
    }

    async fn set_checked(&self, id: &Ulid) -> Result<Option<Notification>, StorageError> {
        Ok(self.rows.get_mut(id).map(|mut e| {
            e.value_mut().checked = true;
            e.value().clone()
        }))
    }
}
