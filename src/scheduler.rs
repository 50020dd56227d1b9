//! Reconciliation jobs: closing elapsed maintenance windows and escalating
//! overdue reservations. Both run on plain intervals and are safe to overlap
//! with live booking traffic — every write is guarded by the
//! `completed`/state predicate in the query itself, so a re-run of an already
//! applied transition is a no-op.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::Engine;
use crate::model::{DateRange, ItemCondition, MaintenanceRecord, ReservationState, DAY_MS};
use crate::observability::{
    MAINTENANCE_CLOSED_TOTAL, RESERVATIONS_DELAYED_TOTAL, SCHEDULER_PASS_DURATION_SECONDS,
};
use crate::repo::{ItemRepo, MaintenanceRepo, ReservationRepo};

impl Engine {
    /// One maintenance-closer pass: restore items whose repair window has
    /// elapsed and mark the record completed. Returns how many records closed.
    pub async fn close_due_maintenance(&self) -> usize {
        let now = self.now();
        let due = match self.deps.maintenance.due(now).await {
            Ok(due) => due,
            Err(e) => {
                warn!("maintenance scan failed: {e}");
                return 0;
            }
        };

        let mut closed = 0;
        for record in due {
            if let Err(e) = self.close_record(&record).await {
                warn!("closing maintenance record {} failed: {e}", record.id);
                continue;
            }
            metrics::counter!(MAINTENANCE_CLOSED_TOTAL).increment(1);
            info!("maintenance record {} completed", record.id);
            closed += 1;
        }
        closed
    }

    async fn close_record(&self, record: &MaintenanceRecord) -> Result<(), crate::engine::EngineError> {
        for item in &record.items {
            self.deps
                .items
                .set_condition(item, ItemCondition::Perfect)
                .await?;
        }
        self.deps.maintenance.set_completed(&record.id).await?;
        Ok(())
    }

    /// One delay-detector pass: for every overdue in-progress reservation
    /// (and everything already delayed), free its items for the upcoming
    /// grace window so the next bookings can be repaired, then escalate the
    /// state. Returns how many reservations were newly flagged.
    pub async fn detect_delays(&self) -> usize {
        let now = self.now();
        let due = match self.deps.reservations.due_for_delay(now).await {
            Ok(due) => due,
            Err(e) => {
                warn!("delay scan failed: {e}");
                return 0;
            }
        };

        let window = DateRange::new(now + DAY_MS, now + self.config.grace_days * DAY_MS);
        let mut flagged = 0;
        for reservation in due {
            for item in &reservation.items {
                if let Err(e) = self.substitution.free_window(item, &window).await {
                    warn!(
                        "freeing item {item} for delayed reservation {} failed: {e}",
                        reservation.id
                    );
                }
            }
            if reservation.state == ReservationState::Delayed {
                continue;
            }
            match self
                .deps
                .reservations
                .set_state_if(
                    &reservation.id,
                    &[ReservationState::InProgress],
                    ReservationState::Delayed,
                )
                .await
            {
                Ok(Some(_)) => {
                    metrics::counter!(RESERVATIONS_DELAYED_TOTAL).increment(1);
                    info!("reservation {} marked delayed", reservation.id);
                    flagged += 1;
                }
                // Someone terminated or cancelled it since the scan; fine.
                Ok(None) => {}
                Err(e) => warn!("delaying reservation {} failed: {e}", reservation.id),
            }
        }
        flagged
    }
}

/// Background task that periodically closes elapsed maintenance windows.
pub async fn run_maintenance_closer(engine: Arc<Engine>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        let started = std::time::Instant::now();
        let closed = engine.close_due_maintenance().await;
        metrics::histogram!(SCHEDULER_PASS_DURATION_SECONDS, "job" => "maintenance_closer")
            .record(started.elapsed().as_secs_f64());
        if closed > 0 {
            info!("maintenance closer: {closed} records closed");
        }
    }
}

/// Background task that periodically flags overdue reservations.
pub async fn run_delay_detector(engine: Arc<Engine>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        let started = std::time::Instant::now();
        let flagged = engine.detect_delays().await;
        metrics::histogram!(SCHEDULER_PASS_DURATION_SECONDS, "job" => "delay_detector")
            .record(started.elapsed().as_secs_f64());
        if flagged > 0 {
            info!("delay detector: {flagged} reservations flagged");
        }
    }
}
