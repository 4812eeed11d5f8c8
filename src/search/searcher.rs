//! Single-algorithm searcher / 单算法搜索器
//!
//! State machine: `Uninitialized -> Initializing -> Ready | Failed`.
//! The build runs at most once per process; every later `initialize()`
//! call receives the memoized outcome.

use futures::FutureExt;
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use super::builder::{IndexBuilder, DEFAULT_BATCH_SIZE};
use super::db_index::{IndexStats, PhoneticIndex, SCHEMA_VERSION};
use super::engine::rank_by_distance;
use super::schema::{ScoredWord, SearcherState};
use super::tokenizer::normalize;
use crate::error::SuggestError;
use crate::phonetic::{safe_encode, PhoneticEncoder};
use crate::wordlist::WordSource;

/// Where and how a searcher keeps its index / 索引存储选项
#[derive(Debug, Clone)]
pub struct SearcherOptions {
    pub db_dir: PathBuf,
    pub index_version: String,
    pub batch_size: usize,
}

impl SearcherOptions {
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: db_dir.into(),
            index_version: "1".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

pub struct Searcher {
    encoder: Arc<dyn PhoneticEncoder>,
    source: Arc<dyn WordSource>,
    options: SearcherOptions,
    index: once_cell::sync::OnceCell<PhoneticIndex>,
    init: tokio::sync::OnceCell<Result<(), SuggestError>>,
    state: RwLock<SearcherState>,
}

impl Searcher {
    pub fn new(
        encoder: Arc<dyn PhoneticEncoder>,
        source: Arc<dyn WordSource>,
        options: SearcherOptions,
    ) -> Self {
        Self {
            encoder,
            source,
            options,
            index: once_cell::sync::OnceCell::new(),
            init: tokio::sync::OnceCell::new(),
            state: RwLock::new(SearcherState::Uninitialized),
        }
    }

    pub fn name(&self) -> &str {
        self.encoder.name()
    }

    pub fn state(&self) -> SearcherState {
        self.state.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().is_ready()
    }

    /// Open and build the index once; concurrent callers share the outcome.
    /// 初始化（只执行一次）
    pub async fn initialize(&self) -> Result<(), SuggestError> {
        self.init.get_or_init(|| self.run_initialize()).await.clone()
    }

    async fn run_initialize(&self) -> Result<(), SuggestError> {
        *self.state.write() = SearcherState::Initializing;

        // 构建过程 panic 也必须落到 Failed，否则结果无法缓存
        let outcome = AssertUnwindSafe(self.open_and_build())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(SuggestError::BuildFailed(format!("initialization panicked: {}", reason)))
            });

        match outcome {
            Ok(()) => {
                *self.state.write() = SearcherState::Ready;
                tracing::info!("Searcher {} ready", self.name());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Searcher {} failed: {}", self.name(), e);
                *self.state.write() = SearcherState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn open_and_build(&self) -> Result<(), SuggestError> {
        let version_key = self.version_key().await;
        let path = PhoneticIndex::db_path(&self.options.db_dir, self.name());
        let index = PhoneticIndex::open(&path, &version_key).await?;
        let index = self.index.get_or_init(|| index);

        let builder = IndexBuilder::new(self.encoder.clone(), self.options.batch_size);
        builder.build(index, self.source.as_ref()).await?;

        if !index.is_built() {
            return Err(SuggestError::StorageUnavailable("index incomplete".to_string()));
        }
        Ok(())
    }

    /// encoder + schema + configured version + word list fingerprint / 索引版本键
    async fn version_key(&self) -> String {
        let fingerprint = self.source.fingerprint().await.unwrap_or_else(|| "-".to_string());
        format!(
            "{}:s{}:v{}:{}",
            self.name(),
            SCHEMA_VERSION,
            self.options.index_version,
            fingerprint
        )
    }

    /// Suggested words, closest first / 返回建议词
    pub async fn suggest(&self, query: &str, limit: usize) -> Vec<String> {
        self.suggest_scored(query, limit)
            .await
            .into_iter()
            .map(|s| s.word)
            .collect()
    }

    /// encode → lookup → rank → truncate. Never fails; empty when not ready.
    pub async fn suggest_scored(&self, query: &str, limit: usize) -> Vec<ScoredWord> {
        if !self.is_ready() || limit == 0 {
            return Vec::new();
        }
        let query = match normalize(query) {
            Some(q) => q,
            None => return Vec::new(),
        };
        let index = match self.index.get() {
            Some(index) => index,
            None => return Vec::new(),
        };

        let code = match safe_encode(self.encoder.as_ref(), &query) {
            Ok(code) => code,
            Err(e) => {
                tracing::debug!("Searcher {}: {}", self.name(), e);
                return Vec::new();
            }
        };

        let candidates = index.lookup(&code).await;
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut ranked = rank_by_distance(&query, candidates);
        ranked.truncate(limit);
        ranked
    }

    /// Index statistics, once the index is open / 索引统计
    pub async fn stats(&self) -> Option<IndexStats> {
        let index = self.index.get()?;
        match index.get_stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!("Failed to read stats of {}: {}", self.name(), e);
                None
            }
        }
    }

    pub async fn close(&self) {
        if let Some(index) = self.index.get() {
            index.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordlist::StaticWordSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TableEncoder;

    impl PhoneticEncoder for TableEncoder {
        fn name(&self) -> &str {
            "table"
        }

        fn encode(&self, text: &str) -> Result<String, SuggestError> {
            Ok(match text {
                "chat" | "chatte" | "shat" => "X1",
                "cat" => "X2",
                _ => "",
            }
            .to_string())
        }
    }

    /// Counts loads, optionally failing every time
    struct CountingSource {
        loads: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl WordSource for CountingSource {
        async fn load(&self) -> Result<Vec<String>, SuggestError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(SuggestError::BuildFailed("no word list".to_string()));
            }
            Ok(vec!["chat".to_string()])
        }

        async fn fingerprint(&self) -> Option<String> {
            None
        }
    }

    struct PanickingSource {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl WordSource for PanickingSource {
        async fn load(&self) -> Result<Vec<String>, SuggestError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            panic!("word list decoder crashed");
        }

        async fn fingerprint(&self) -> Option<String> {
            None
        }
    }

    fn searcher(dir: &tempfile::TempDir, words: &[&str]) -> Searcher {
        Searcher::new(
            Arc::new(TableEncoder),
            Arc::new(StaticWordSource::new(words.iter().copied())),
            SearcherOptions::new(dir.path()),
        )
    }

    #[tokio::test]
    async fn test_suggest_ranks_bucket_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = searcher(&dir, &["chat", "chatte", "shat", "cat"]);
        searcher.initialize().await.unwrap();
        assert_eq!(searcher.state(), SearcherState::Ready);

        assert_eq!(searcher.suggest("shat", 5).await, vec!["shat", "chat", "chatte"]);

        let scored = searcher.suggest_scored("shat", 5).await;
        let distances: Vec<usize> = scored.iter().map(|s| s.distance).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_query_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = searcher(&dir, &["chat", "chatte", "shat", "cat"]);
        searcher.initialize().await.unwrap();

        assert_eq!(searcher.suggest("  ChAt ", 5).await[0], "chat");
        assert!(searcher.suggest("   ", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_limit_bounds_result() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = searcher(&dir, &["chat", "chatte", "shat", "cat"]);
        searcher.initialize().await.unwrap();

        assert_eq!(searcher.suggest("chat", 2).await, vec!["chat", "shat"]);
        assert!(searcher.suggest("chat", 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_not_ready_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = searcher(&dir, &["chat"]);
        assert_eq!(searcher.state(), SearcherState::Uninitialized);
        assert!(searcher.suggest("chat", 5).await.is_empty());
        assert!(searcher.stats().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_build_is_permanent_and_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
            fail: true,
        });
        let searcher = Searcher::new(
            Arc::new(TableEncoder),
            source.clone(),
            SearcherOptions::new(dir.path()),
        );

        let first = searcher.initialize().await.unwrap_err();
        let second = searcher.initialize().await.unwrap_err();
        assert!(matches!(first, SuggestError::BuildFailed(_)));
        assert_eq!(first, second);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert!(matches!(searcher.state(), SearcherState::Failed(_)));
        assert!(searcher.suggest("chat", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_build_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(PanickingSource {
            loads: AtomicUsize::new(0),
        });
        let searcher = Searcher::new(
            Arc::new(TableEncoder),
            source.clone(),
            SearcherOptions::new(dir.path()),
        );

        let first = searcher.initialize().await.unwrap_err();
        let second = searcher.initialize().await.unwrap_err();
        match &first {
            SuggestError::BuildFailed(reason) => assert!(reason.contains("word list decoder crashed")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(first, second);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert!(matches!(searcher.state(), SearcherState::Failed(_)));
        assert!(searcher.suggest("chat", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_initialize_builds_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
            fail: false,
        });
        let searcher = Searcher::new(
            Arc::new(TableEncoder),
            source.clone(),
            SearcherOptions::new(dir.path()),
        );

        let (a, b) = tokio::join!(searcher.initialize(), searcher.initialize());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert!(searcher.is_ready());
    }

    #[tokio::test]
    async fn test_unopenable_store_fails_searcher() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let searcher = Searcher::new(
            Arc::new(TableEncoder),
            Arc::new(StaticWordSource::new(["chat"])),
            SearcherOptions::new(blocker.join("phonetic")),
        );
        let err = searcher.initialize().await.unwrap_err();
        assert!(matches!(err, SuggestError::StorageUnavailable(_)));
        assert!(matches!(searcher.state(), SearcherState::Failed(_)));
    }

    #[tokio::test]
    async fn test_restart_reuses_built_index() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
            fail: false,
        });

        let first = Searcher::new(Arc::new(TableEncoder), source.clone(), SearcherOptions::new(dir.path()));
        first.initialize().await.unwrap();
        first.close().await;

        let second = Searcher::new(Arc::new(TableEncoder), source.clone(), SearcherOptions::new(dir.path()));
        second.initialize().await.unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert_eq!(second.suggest("chat", 5).await, vec!["chat"]);
    }
}
