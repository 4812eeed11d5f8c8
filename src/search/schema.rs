//! Shared search types / 搜索共享类型

use serde::{Deserialize, Serialize};

/// Candidate word with its edit distance to the query / 候选词及编辑距离
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredWord {
    pub word: String,
    pub distance: usize,
}

/// Searcher lifecycle / 搜索器状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SearcherState {
    Uninitialized,
    Initializing,
    Ready,
    /// Permanent for the process run / 本次运行内永久失败
    Failed(String),
}

impl SearcherState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SearcherState::Ready)
    }
}

/// Snapshot of one searcher, as reported by the aggregator / 搜索器状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearcherStatus {
    pub name: String,
    pub active: bool,
    pub state: SearcherState,
}
