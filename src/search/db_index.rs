//! Phonetic index database - code → words buckets / 语音索引数据库
//!
//! 存储方案：
//! - 每个编码器一个独立数据库文件 `index_<encoder>.db`（避免并发锁冲突）
//! - phonetic_buckets 表：(code, word) 唯一，合并即并集
//! - phonetic_meta 表：built 完成标记、版本键、更新时间
//!
//! Features / 特性：
//! - WAL + busy_timeout per connection
//! - Idempotent merge (`INSERT OR IGNORE`), retried on a locked database
//! - Version key mismatch drops all buckets before use

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::SuggestError;

/// Bumped whenever the table layout or merge semantics change / 表结构版本
pub const SCHEMA_VERSION: u32 = 1;

const MAX_RETRIES: u32 = 3;

/// How long one statement waits on a locked database before `SQLITE_BUSY`
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(10000);

/// 索引统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub bucket_count: u64,
    pub word_count: u64,
    pub built: bool,
    pub last_updated: Option<i64>,
}

/// Persistent phonetic index of one encoder / 单个编码器的持久化语音索引
pub struct PhoneticIndex {
    db: Pool<Sqlite>,
    path: PathBuf,
    built: AtomicBool,
}

impl PhoneticIndex {
    /// Database file of an encoder inside `dir` / 编码器对应的数据库路径
    pub fn db_path(dir: &Path, encoder_name: &str) -> PathBuf {
        let safe: String = encoder_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        dir.join(format!("index_{}.db", safe))
    }

    /// Open or create the store, dropping its content if `version_key` changed.
    /// 打开或创建索引数据库
    pub async fn open(path: &Path, version_key: &str) -> Result<Self, SuggestError> {
        Self::open_with_timeout(path, version_key, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Same as [`open`](Self::open) with an explicit SQLite busy timeout.
    /// Once a statement waits longer than this, `merge_batch` backs off and retries.
    pub async fn open_with_timeout(
        path: &Path,
        version_key: &str,
        busy_timeout: Duration,
    ) -> Result<Self, SuggestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SuggestError::StorageUnavailable(format!("create {:?}: {}", parent, e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout)
            .synchronous(SqliteSynchronous::Normal);

        // 每个编码器单独数据库，连接数可以少一些
        let db = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        let index = Self {
            db,
            path: path.to_path_buf(),
            built: AtomicBool::new(false),
        };
        index.init().await?;

        let stored = index.get_meta("version").await?;
        if stored.as_deref() != Some(version_key) {
            if let Some(old) = stored {
                tracing::info!(
                    "Phonetic index {:?} version changed ({} -> {}), resetting",
                    index.path,
                    old,
                    version_key
                );
            }
            index.reset_tables().await?;
            index.set_meta("version", version_key).await?;
        }

        let built = index.get_meta("built").await?.as_deref() == Some("1");
        index.built.store(built, Ordering::SeqCst);

        tracing::info!("Phonetic index opened: {:?} (WAL mode, built={})", index.path, built);
        Ok(index)
    }

    /// 初始化表结构，只在表不存在时创建
    async fn init(&self) -> Result<(), SuggestError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS phonetic_buckets (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL,
                word TEXT NOT NULL,
                UNIQUE(code, word)
            )
        "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS phonetic_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 重置表结构（版本变化时调用）
    async fn reset_tables(&self) -> Result<(), SuggestError> {
        sqlx::query("DROP TABLE IF EXISTS phonetic_buckets")
            .execute(&self.db)
            .await?;
        sqlx::query("DROP TABLE IF EXISTS phonetic_meta")
            .execute(&self.db)
            .await?;
        self.built.store(false, Ordering::SeqCst);
        self.init().await
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>, SuggestError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM phonetic_meta WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<(), SuggestError> {
        sqlx::query("INSERT OR REPLACE INTO phonetic_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durable completion flag / 构建完成标记
    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::SeqCst)
    }

    /// Set the completion flag; only after every bucket has committed.
    pub async fn mark_built(&self) -> Result<(), SuggestError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT OR REPLACE INTO phonetic_meta (key, value) VALUES ('built', '1')")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT OR REPLACE INTO phonetic_meta (key, value) VALUES ('last_updated', ?)")
            .bind(now.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.built.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// 获取索引更新时间 / Get index last updated time
    pub async fn get_last_updated(&self) -> Option<i64> {
        self.get_meta("last_updated")
            .await
            .ok()
            .flatten()
            .and_then(|v| v.parse::<i64>().ok())
    }

    /// Union `words` into the bucket of `code` / 合并单词到编码桶
    ///
    /// Returns how many pairs were new to the index.
    pub async fn merge_words(&self, code: &str, words: &[String]) -> Result<u64, SuggestError> {
        let mut inserted = 0;
        let mut tx = self.db.begin().await?;
        for word in words {
            inserted += sqlx::query("INSERT OR IGNORE INTO phonetic_buckets (code, word) VALUES (?, ?)")
                .bind(code)
                .bind(word)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// 批量合并（单个事务）- 带重试机制
    ///
    /// Returns how many `(code, word)` pairs were new to the index.
    pub async fn merge_batch(&self, buckets: &[(String, Vec<String>)]) -> Result<u64, SuggestError> {
        if buckets.is_empty() {
            return Ok(0);
        }

        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            match self.do_merge_batch(buckets).await {
                Ok(inserted) => return Ok(inserted),
                Err(e) if e.is_busy() => {
                    let delay = 100 * (attempt + 1) as u64;
                    tracing::debug!(
                        "Database locked, retrying in {}ms (attempt {}/{})",
                        delay,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(SuggestError::StorageUnavailable(format!(
            "batch merge failed after {} retries: {}",
            MAX_RETRIES,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn do_merge_batch(&self, buckets: &[(String, Vec<String>)]) -> Result<u64, SuggestError> {
        let mut inserted = 0;
        let mut tx = self.db.begin().await?;
        for (code, words) in buckets {
            for word in words {
                inserted += sqlx::query("INSERT OR IGNORE INTO phonetic_buckets (code, word) VALUES (?, ?)")
                    .bind(code)
                    .bind(word)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Words stored under `code`, in the order they were first merged.
    /// Empty when the index was never built or the store is unreachable.
    pub async fn lookup(&self, code: &str) -> Vec<String> {
        if !self.is_built() {
            return Vec::new();
        }

        let rows: Result<Vec<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT word FROM phonetic_buckets WHERE code = ? ORDER BY id")
                .bind(code)
                .fetch_all(&self.db)
                .await;

        match rows {
            Ok(rows) => rows.into_iter().map(|(w,)| w).collect(),
            Err(e) => {
                tracing::warn!("Phonetic lookup failed on {:?}: {}", self.path, e);
                Vec::new()
            }
        }
    }

    /// 获取统计信息
    pub async fn get_stats(&self) -> Result<IndexStats, SuggestError> {
        let (bucket_count, word_count): (i64, i64) =
            sqlx::query_as("SELECT COUNT(DISTINCT code), COUNT(*) FROM phonetic_buckets")
                .fetch_one(&self.db)
                .await?;

        Ok(IndexStats {
            bucket_count: bucket_count as u64,
            word_count: word_count as u64,
            built: self.is_built(),
            last_updated: self.get_last_updated().await,
        })
    }

    /// 关闭数据库连接池 / Close database connection pool
    pub async fn close(&self) {
        self.db.close().await;
    }
}
