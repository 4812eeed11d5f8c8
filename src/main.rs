use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use phonetic_suggest::config;
use phonetic_suggest::phonetic::EncoderRegistry;
use phonetic_suggest::search::Aggregator;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phonetic_suggest=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);

    // Create data directory if not exists / 创建数据目录
    let db_dir = app_config.get_index_db_dir();
    if !db_dir.exists() {
        std::fs::create_dir_all(&db_dir)?;
        tracing::info!("Created index directory: {:?}", db_dir);
    }

    let registry = EncoderRegistry::builtin();
    tracing::info!(
        "Phonetic algorithms: {} (active: {})",
        registry.names().join(", "),
        app_config.suggest.active_algorithms.join(", ")
    );
    let aggregator = Arc::new(Aggregator::from_config(&app_config, &registry));

    // 后台构建索引，就绪前查询返回 503
    let init_aggregator = aggregator.clone();
    tokio::spawn(async move {
        let started = std::time::Instant::now();
        for (name, outcome) in init_aggregator.initialize().await {
            match outcome {
                Ok(()) => tracing::info!("Phonetic index {} ready", name),
                Err(e) => tracing::error!("Phonetic index {} unavailable: {}", name, e),
            }
        }
        tracing::info!("Initialization finished in {:?}", started.elapsed());
    });

    let state = Arc::new(AppState {
        config: app_config.clone(),
        aggregator,
    });

    let app = Router::new()
        .route("/api/health", get(api::suggest::health_check))
        .route("/api/suggest", post(api::suggest::suggest))
        .route("/api/status", get(api::suggest::status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
