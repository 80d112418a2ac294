use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sharecard_server::check::Checker;
use sharecard_server::config::Config;
use sharecard_server::state::AppState;
use sharecard_server::store::MemoryStore;
use sharecard_server::usage::UsageLimiter;

#[tokio::main]
async fn main() {
    // JSON logs in production, human-readable otherwise.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "sharecard_server=info,tower_http=info"
            .parse()
            .unwrap()
    });

    if std::env::var("APP_ENV").as_deref() == Ok("production") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("🚀 Sharecard Server starting...");

    let config = Config::from_env().expect("Failed to load configuration");
    info!(
        timeout_secs = config.fetch_timeout.as_secs(),
        max_redirects = config.fetch_max_redirects,
        trust_proxy = config.trust_proxy,
        "📝 Configuration loaded"
    );

    let checker =
        Checker::with_config(config.fetch_config()).expect("Failed to build HTTP client");

    // CORS: permissive in dev, restrictive in production.
    let cors = if config.is_dev {
        info!("🔓 CORS: permissive (dev mode)");
        CorsLayer::permissive()
    } else {
        tracing::warn!("🔒 CORS: restrictive (production mode)");
        CorsLayer::new()
    };

    let app_state = AppState {
        checker,
        store: Arc::new(MemoryStore::new()),
        usage: UsageLimiter::new(),
        trust_proxy: config.trust_proxy,
    };

    // Prometheus metrics layer
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = sharecard_server::router(app_state)
        .route(
            "/metrics",
            get(move || async move { metric_handle.render() }),
        )
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.server_addr();
    info!("🎧 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    // Peer addresses are needed to identify callers not behind a proxy.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed to start");
}
