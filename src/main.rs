use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use rentd::clock::SystemClock;
use rentd::engine::{Deps, Engine, EngineConfig, PricingConfig};
use rentd::scheduler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("RENTD_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    rentd::observability::init(metrics_port);

    let tick_secs: u64 = std::env::var("RENTD_TICK_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);
    // The freeing window is [now+1d, now+grace_days], so anything below one
    // day makes no sense.
    let grace_days: i64 = std::env::var("RENTD_GRACE_DAYS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2)
        .max(1);

    let mut pricing = PricingConfig::default();
    if let Ok(raw) = std::env::var("RENTD_SEASONAL_TABLE") {
        pricing.seasonal = serde_json::from_str(&raw)?;
    }
    pricing.half_day_weekends = std::env::var("RENTD_HALF_DAY_WEEKENDS")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let clock = Arc::new(SystemClock);
    let deps = Deps::in_memory(clock);
    let engine = Arc::new(Engine::new(deps, EngineConfig { grace_days, pricing }));

    info!("rentd reconciliation starting");
    info!("  tick: {tick_secs}s");
    info!("  grace_days: {grace_days}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let tick = Duration::from_secs(tick_secs);
    let closer = tokio::spawn(scheduler::run_maintenance_closer(engine.clone(), tick));
    let detector = tokio::spawn(scheduler::run_delay_detector(engine.clone(), tick));

    // Graceful shutdown on SIGTERM/ctrl-c.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    shutdown.await;

    info!("shutdown signal received");
    closer.abort();
    detector.abort();
    info!("rentd stopped");
    Ok(())
}
