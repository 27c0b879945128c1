use crate::cli::ServeArgs;
use crate::infra::{AppState, Backends};
use crate::routes::with_consent_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use enterprise::config::AppConfig;
use enterprise::error::AppError;
use enterprise::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backends = Backends::open(&config)?;
    let consent_service = Arc::new(backends.consent_service());

    let app = with_consent_routes(consent_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "enterprise consent service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
