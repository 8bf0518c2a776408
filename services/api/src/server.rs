use crate::cli::ServeArgs;
use crate::infra::{connect, AppState, BackendAuth};
use crate::routes::with_console_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use matricula::config::AppConfig;
use matricula::error::AppError;
use matricula::telemetry;
use matricula::workflows::enrollment::EnrollmentService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs, auth: BackendAuth) -> Result<(), AppError> {
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

    let gateway = Arc::new(connect(&config, &auth).await?);
    let service = Arc::new(EnrollmentService::new(gateway, &config.enrollment));

    let app = with_console_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        period = %config.enrollment.current_period(),
        "enrollment console ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
