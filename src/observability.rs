use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations created.
pub const RESERVATIONS_CREATED_TOTAL: &str = "rentd_reservations_created_total";

/// Counter: booking/modification attempts rejected for an occupied item.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "rentd_reservation_conflicts_total";

/// Counter: bookings rejected because the client quote went stale.
pub const PRICE_MISMATCHES_TOTAL: &str = "rentd_price_mismatches_total";

/// Counter: invoices written at termination.
pub const INVOICES_CREATED_TOTAL: &str = "rentd_invoices_created_total";

// ── Repair and reconciliation ───────────────────────────────────

/// Counter: reservation repairs. Labels: outcome (substituted|cancelled|failed).
pub const SUBSTITUTIONS_TOTAL: &str = "rentd_substitutions_total";

/// Counter: maintenance records closed by the scheduler.
pub const MAINTENANCE_CLOSED_TOTAL: &str = "rentd_maintenance_closed_total";

/// Counter: reservations escalated to delayed.
pub const RESERVATIONS_DELAYED_TOTAL: &str = "rentd_reservations_delayed_total";

/// Histogram: scheduler pass duration in seconds. Labels: job.
pub const SCHEDULER_PASS_DURATION_SECONDS: &str = "rentd_scheduler_pass_duration_seconds";

/// Expose Prometheus metrics on the given port. Disabled when port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
