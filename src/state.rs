use std::sync::Arc;

use phonetic_suggest::config::AppConfig;
use phonetic_suggest::search::Aggregator;

/// Shared application state / 应用共享状态
pub struct AppState {
    pub config: AppConfig,
    pub aggregator: Arc<Aggregator>,
}
