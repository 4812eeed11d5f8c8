use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use phonetic_suggest::error::SuggestError;
use phonetic_suggest::search::{IndexStats, SearcherStatus};

use crate::api::ApiResponse;
use crate::state::AppState;

/// GET /api/health - 健康检查
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub query: String,
    /// Defaults to `suggest.final_limit`, at least 1 / 默认使用配置值
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub query: String,
    pub suggestions: Vec<String>,
}

/// POST /api/suggest - 获取发音相近的建议词
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SuggestRequest>,
) -> Json<ApiResponse<SuggestResponse>> {
    let limit = req.limit.unwrap_or(state.config.suggest.final_limit).max(1);

    match state.aggregator.query(&req.query, limit).await {
        Ok(suggestions) => Json(ApiResponse::success(SuggestResponse {
            query: req.query,
            suggestions,
        })),
        Err(e @ (SuggestError::NoActiveAlgorithms | SuggestError::NotReady(_))) => {
            Json(ApiResponse::unavailable(&e.to_string()))
        }
        Err(e) => {
            tracing::error!("Suggestion query failed: {}", e);
            Json(ApiResponse::error(&e.to_string()))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EncoderStatus {
    #[serde(flatten)]
    pub status: SearcherStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
}

/// GET /api/status - 各编码器就绪状态与索引统计
pub async fn status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<EncoderStatus>>> {
    let mut stats = state.aggregator.stats().await;
    let encoders = state
        .aggregator
        .status()
        .into_iter()
        .map(|status| {
            let stats = stats
                .iter_mut()
                .find(|(name, _)| *name == status.name)
                .and_then(|(_, s)| s.take());
            EncoderStatus { status, stats }
        })
        .collect();

    Json(ApiResponse::success(encoders))
}
