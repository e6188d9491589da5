use crate::cli::ServeArgs;
use crate::infra::{seed_sample_data, AppState};
use crate::routes::with_housing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use bto_housing::config::AppConfig;
use bto_housing::error::AppError;
use bto_housing::housing::{HousingService, Repositories};
use bto_housing::telemetry;
use chrono::Local;
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

    let service = Arc::new(HousingService::new(
        Repositories::in_memory(),
        &config.housing,
    ));

    if args.seed {
        let sample = seed_sample_data(&service, Local::now().date_naive())?;
        info!(
            project = %sample.project,
            officer = %sample.officer,
            applicants = sample.applicants.len(),
            "sample data loaded"
        );
    }

    let report = service.recover()?;
    if report.is_clean() {
        info!("startup recovery found nothing to repair");
    } else {
        warn!(?report, "startup recovery repaired interrupted work");
    }

    let app = with_housing_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "bto housing service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
