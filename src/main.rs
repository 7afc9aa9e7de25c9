//! Complaint intake bot: binary entrypoint.
//! Boots the Axum webhook server through Shuttle.

use shuttle_axum::ShuttleAxum;
use tracing::info;

use nirvana_intake::{bootstrap, config::AppConfig, metrics::Metrics, telemetry};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = AppConfig::from_env()?;
    let mut router = bootstrap::build_router(&cfg)?;

    if cfg.metrics_enabled {
        let metrics = Metrics::init()?;
        router = router.merge(metrics.router());
        info!(target: "api", "metrics exposed on /metrics");
    }

    info!(
        target: "api",
        debug_routes = cfg.debug_routes,
        archive = cfg.archive_dir.is_some(),
        "webhook service ready"
    );
    Ok(router.into())
}
