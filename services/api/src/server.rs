use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::{panic_response, with_patrol_routes};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use petty_patrol::config::AppConfig;
use petty_patrol::error::AppError;
use petty_patrol::patrol::{
    JsonFileStore, PatrolSession, Persistence, SessionOptions, TracingAnalytics,
};
use petty_patrol::telemetry;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir.take() {
        config.patrol.data_dir = data_dir;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = JsonFileStore::open(&config.patrol.data_dir)?;
    info!(
        device = %store.device().0,
        data_dir = %config.patrol.data_dir.display(),
        "patrol store opened"
    );
    let options = SessionOptions {
        debug_tools: config.patrol.debug_tools,
        prices: config.patrol.prices.clone(),
    };
    let session = Arc::new(Mutex::new(PatrolSession::new(
        Persistence::new(store),
        options,
        Arc::new(TracingAnalytics),
    )));

    let app = with_patrol_routes(session)
        .layer(Extension(app_state))
        .layer(prometheus_layer)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "petty patrol ready");

    axum::serve(listener, app).await?;
    Ok(())
}
