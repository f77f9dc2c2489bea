use crate::cli::ServeArgs;
use crate::infra::{AppState, SeedDirectory};
use crate::routes::with_domain_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use staffing::api::StaffingApi;
use staffing::config::AppConfig;
use staffing::error::AppError;
use staffing::memory::InMemoryStore;
use staffing::telemetry;
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

    let seed = match args.seed.take() {
        Some(path) => SeedDirectory::from_path(&path)?,
        None => SeedDirectory::sample(),
    };
    let store = Arc::new(InMemoryStore::new());
    seed.load_into(&store);
    let api = Arc::new(StaffingApi::new(store, config.policy));

    let app = with_domain_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, policy = ?config.policy, "staffing approval service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
