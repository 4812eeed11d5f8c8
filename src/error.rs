//! Error types / 错误类型
//!
//! Failures are isolated at the smallest scope possible: one word, one
//! algorithm, one searcher. Only `StorageUnavailable` and `BuildFailed`
//! ever leave a searcher, and the aggregator never propagates either.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SuggestError {
    /// Durable store cannot be opened, read or written / 存储不可用
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Word source could not be obtained or parsed / 索引构建失败
    #[error("index build failed: {0}")]
    BuildFailed(String),

    /// A single word could not be encoded / 单词编码失败（跳过）
    #[error("encoding skipped for '{word}': {reason}")]
    EncodeSkipped { word: String, reason: String },

    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Active algorithm allow-list is empty / 未配置启用的算法
    #[error("no active phonetic algorithm configured")]
    NoActiveAlgorithms,

    #[error("not ready: {0}")]
    NotReady(String),
}

impl From<sqlx::Error> for SuggestError {
    fn from(e: sqlx::Error) -> Self {
        SuggestError::StorageUnavailable(e.to_string())
    }
}

impl SuggestError {
    /// SQLite reported a transient lock / 数据库被锁定，可重试
    pub fn is_busy(&self) -> bool {
        match self {
            SuggestError::StorageUnavailable(msg) => {
                msg.contains("database is locked") || msg.contains("SQLITE_BUSY")
            }
            _ => false,
        }
    }
}
