//! Multi-algorithm aggregator / 多算法聚合器
//!
//! Fans a query out to every active searcher, each in its own task with a
//! timeout, then merges, deduplicates and re-ranks globally. A searcher
//! that times out, panics or is not ready contributes nothing and never
//! delays the others past the timeout.

use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::db_index::IndexStats;
use super::engine::rank_by_distance;
use super::schema::SearcherStatus;
use super::searcher::{Searcher, SearcherOptions};
use super::tokenizer::normalize;
use crate::config::AppConfig;
use crate::error::SuggestError;
use crate::phonetic::EncoderRegistry;
use crate::wordlist::{FileWordSource, WordSource};

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    /// Encoder names to query, in tie-break order / 启用的算法
    pub active: Vec<String>,
    pub per_method_limit: usize,
    pub query_timeout: Duration,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            per_method_limit: 10,
            query_timeout: Duration::from_millis(1000),
        }
    }
}

pub struct Aggregator {
    searchers: BTreeMap<String, Arc<Searcher>>,
    active: Vec<String>,
    options: AggregatorOptions,
}

impl Aggregator {
    /// One searcher per registered encoder; only `options.active` are queried.
    pub fn new(
        registry: &EncoderRegistry,
        source: Arc<dyn WordSource>,
        searcher_options: SearcherOptions,
        mut options: AggregatorOptions,
    ) -> Self {
        options.per_method_limit = options.per_method_limit.max(1);

        let searchers: BTreeMap<String, Arc<Searcher>> = registry
            .iter()
            .map(|encoder| {
                let searcher = Searcher::new(encoder.clone(), source.clone(), searcher_options.clone());
                (encoder.name().to_string(), Arc::new(searcher))
            })
            .collect();

        let mut active = Vec::new();
        for name in &options.active {
            if !searchers.contains_key(name) {
                tracing::warn!("Unknown phonetic algorithm in configuration: {}", name);
            } else if !active.contains(name) {
                active.push(name.clone());
            }
        }
        if active.is_empty() {
            tracing::warn!("No active phonetic algorithm configured, suggestions disabled");
        }

        Self {
            searchers,
            active,
            options,
        }
    }

    /// 从配置创建
    pub fn from_config(config: &AppConfig, registry: &EncoderRegistry) -> Self {
        let source: Arc<dyn WordSource> = Arc::new(FileWordSource::new(config.get_wordlist_path()));
        let searcher_options = SearcherOptions {
            db_dir: config.get_index_db_dir(),
            index_version: config.index.version.clone(),
            batch_size: config.index.batch_size,
        };
        let options = AggregatorOptions {
            active: config.suggest.active_algorithms.clone(),
            per_method_limit: config.suggest.per_method_limit,
            query_timeout: Duration::from_millis(config.suggest.query_timeout_ms),
        };
        Self::new(registry, source, searcher_options, options)
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    fn active_searchers(&self) -> Vec<Arc<Searcher>> {
        self.active
            .iter()
            .filter_map(|name| self.searchers.get(name).cloned())
            .collect()
    }

    /// Initialize every active searcher concurrently / 并发初始化
    pub async fn initialize(&self) -> Vec<(String, Result<(), SuggestError>)> {
        let tasks = self.active_searchers().into_iter().map(|searcher| {
            let name = searcher.name().to_string();
            let handle = tokio::spawn(async move { searcher.initialize().await });
            async move {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(SuggestError::BuildFailed(format!("initialization task failed: {}", e))),
                };
                (name, outcome)
            }
        });
        join_all(tasks).await
    }

    /// Readiness of every searcher, active or not / 所有搜索器状态
    pub fn status(&self) -> Vec<SearcherStatus> {
        self.searchers
            .iter()
            .map(|(name, searcher)| SearcherStatus {
                name: name.clone(),
                active: self.active.contains(name),
                state: searcher.state(),
            })
            .collect()
    }

    /// Index statistics of the active searchers / 索引统计
    pub async fn stats(&self) -> Vec<(String, Option<IndexStats>)> {
        let mut stats = Vec::with_capacity(self.active.len());
        for searcher in self.active_searchers() {
            stats.push((searcher.name().to_string(), searcher.stats().await));
        }
        stats
    }

    /// Ranked suggestions, or why there cannot be any.
    ///
    /// `Ok(vec![])` means no match. `Err` means no active searcher could
    /// answer: nothing configured, or nothing ready yet.
    pub async fn query(&self, query: &str, final_limit: usize) -> Result<Vec<String>, SuggestError> {
        let searchers = self.active_searchers();
        if searchers.is_empty() {
            tracing::warn!("Suggestion requested but no phonetic algorithm is active");
            return Err(SuggestError::NoActiveAlgorithms);
        }

        let query = match normalize(query) {
            Some(q) => q,
            None => return Ok(Vec::new()),
        };

        if !searchers.iter().any(|s| s.is_ready()) {
            return Err(SuggestError::NotReady("no phonetic index is ready".to_string()));
        }

        let per_method_limit = self.options.per_method_limit;
        let timeout = self.options.query_timeout;
        let tasks = searchers.into_iter().map(|searcher| {
            let name = searcher.name().to_string();
            let q = query.clone();
            let mut handle = tokio::spawn(async move { searcher.suggest(&q, per_method_limit).await });
            async move {
                // 超时计时在任务外部，阻塞在编码器里的任务也不会拖住合并
                match tokio::time::timeout(timeout, &mut handle).await {
                    Ok(Ok(words)) => words,
                    Ok(Err(e)) => {
                        tracing::error!("Searcher {} query task failed: {}", name, e);
                        Vec::new()
                    }
                    Err(_) => {
                        handle.abort();
                        tracing::warn!("Searcher {} timed out after {:?}", name, timeout);
                        Vec::new()
                    }
                }
            }
        });

        // 结果按启用顺序合并，去重保留首次出现
        let mut seen = HashSet::new();
        let unique: Vec<String> = join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .filter(|word| seen.insert(word.clone()))
            .collect();

        let mut ranked = rank_by_distance(&query, unique);
        ranked.truncate(final_limit);
        Ok(ranked.into_iter().map(|s| s.word).collect())
    }

    /// Never fails: any error becomes an empty list / 获取建议（不会失败）
    pub async fn get_suggestions(&self, query: &str, final_limit: usize) -> Vec<String> {
        match self.query(query, final_limit).await {
            Ok(words) => words,
            Err(e) => {
                tracing::debug!("No suggestions for {:?}: {}", query, e);
                Vec::new()
            }
        }
    }

    pub async fn close(&self) {
        for searcher in self.searchers.values() {
            searcher.close().await;
        }
    }
}
