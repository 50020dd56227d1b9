use std::sync::Arc;

use async_trait::async_trait;
use ulid::Ulid;

use crate::clock::Clock;
use crate::model::{Notification, ReservationState};
use crate::repo::{NotificationRepo, StorageError};

/// Sink for reservation state transitions. Only records are produced here;
/// delivery is someone else's problem.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(
        &self,
        customer: Ulid,
        reservation: Ulid,
        state: ReservationState,
    ) -> Result<(), StorageError>;
}

/// Default sink: persists a record for the customer surface to poll.
pub struct RecordSink {
    notifications: Arc<dyn NotificationRepo>,
    clock: Arc<dyn Clock>,
}

impl RecordSink {
    pub fn new(notifications: Arc<dyn NotificationRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { notifications, clock }
    }
}

#[async_trait]
impl NotificationSink for RecordSink {
    async fn emit(
        &self,
        customer: Ulid,
        reservation: Ulid,
        state: ReservationState,
    ) -> Result<(), StorageError> {
        self.notifications
            .insert(Notification {
                id: Ulid::new(),
                customer,
                reservation,
                state,
                checked: false,
                at: self.clock.now(),
            })
            .await
    }
}
