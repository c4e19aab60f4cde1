use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState};
use crate::routes::app_routes;
use crate::seed;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use jobboard::board::rate_limit::RateLimiter;
use jobboard::config::AppConfig;
use jobboard::error::AppError;
use jobboard::telemetry;
use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = build_service(&config);
    if let Some(path) = args.seed.take() {
        seed::load(&service, File::open(&path)?)?;
    }

    let worker = service
        .workflows()
        .clone()
        .spawn(config.workflow.poll_interval);
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit));

    let app = app_routes(service, limiter, config.environment.is_production())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "job board api ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    readiness_flag.store(false, Ordering::Release);
    worker.shutdown().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
