//! Index builder - batched, idempotent population / 索引构建器
//!
//! Words are grouped by code in a bounded in-memory batch and flushed with
//! a union merge, so a retried build can resend words safely. The index is
//! marked built only when every flush of the run has committed.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::db_index::PhoneticIndex;
use super::tokenizer::normalize;
use crate::error::SuggestError;
use crate::phonetic::{safe_encode, PhoneticEncoder};
use crate::wordlist::WordSource;

pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Outcome of one build run / 构建结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub words_seen: usize,
    /// Words newly stored by this run; words already in the index are not counted
    /// 本次新写入的单词数
    pub words_indexed: usize,
    pub words_skipped: usize,
    pub flushes: usize,
    pub failed_flushes: usize,
    /// Index was already built, nothing ran / 已构建，跳过
    pub skipped: bool,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.skipped || self.failed_flushes == 0
    }
}

/// code → words accumulated since the last flush / 待写入批次
#[derive(Default)]
struct PendingBatch {
    buckets: HashMap<String, Vec<String>>,
    seen: HashSet<String>,
}

impl PendingBatch {
    /// Words already in this batch are ignored.
    fn add(&mut self, code: String, word: String) {
        if self.seen.insert(word.clone()) {
            self.buckets.entry(code).or_default().push(word);
        }
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn take(&mut self) -> Vec<(String, Vec<String>)> {
        self.seen.clear();
        self.buckets.drain().collect()
    }
}

pub struct IndexBuilder {
    encoder: Arc<dyn PhoneticEncoder>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(encoder: Arc<dyn PhoneticEncoder>, batch_size: usize) -> Self {
        Self {
            encoder,
            batch_size: batch_size.max(1),
        }
    }

    /// Build `index` from `source` unless it is already built.
    /// A source that cannot be loaded aborts with `BuildFailed`.
    pub async fn build(
        &self,
        index: &PhoneticIndex,
        source: &dyn WordSource,
    ) -> Result<BuildReport, SuggestError> {
        if index.is_built() {
            tracing::debug!("Phonetic index {} already built, skipping", self.encoder.name());
            return Ok(BuildReport {
                skipped: true,
                ..Default::default()
            });
        }

        let words = source.load().await?;
        self.build_from_words(index, words).await
    }

    /// 从词表构建索引
    pub async fn build_from_words<I>(
        &self,
        index: &PhoneticIndex,
        words: I,
    ) -> Result<BuildReport, SuggestError>
    where
        I: IntoIterator<Item = String>,
    {
        let name = self.encoder.name().to_string();
        let mut report = BuildReport::default();

        if index.is_built() {
            report.skipped = true;
            return Ok(report);
        }

        tracing::info!("Building phonetic index {} (batch size {})", name, self.batch_size);

        let mut batch = PendingBatch::default();
        for raw in words {
            report.words_seen += 1;

            let word = match normalize(&raw) {
                Some(word) => word,
                None => continue,
            };

            let code = match safe_encode(self.encoder.as_ref(), &word) {
                Ok(code) => code,
                Err(e) => {
                    tracing::debug!("{}", e);
                    report.words_skipped += 1;
                    continue;
                }
            };

            batch.add(code, word);

            if batch.len() >= self.batch_size {
                self.flush(index, &mut batch, &mut report).await;
            }
        }

        if !batch.is_empty() {
            self.flush(index, &mut batch, &mut report).await;
        }

        if report.failed_flushes > 0 {
            tracing::warn!(
                "Phonetic index {} incomplete: {}/{} flushes failed, not marking built",
                name,
                report.failed_flushes,
                report.flushes
            );
            return Ok(report);
        }

        index.mark_built().await?;
        tracing::info!(
            "Phonetic index {} built: {} words seen, {} indexed, {} skipped",
            name,
            report.words_seen,
            report.words_indexed,
            report.words_skipped
        );
        Ok(report)
    }

    async fn flush(&self, index: &PhoneticIndex, batch: &mut PendingBatch, report: &mut BuildReport) {
        let buckets = batch.take();
        report.flushes += 1;
        match index.merge_batch(&buckets).await {
            Ok(inserted) => report.words_indexed += inserted as usize,
            Err(e) => {
                // 写入失败不终止构建，下次启动时重新合并
                report.failed_flushes += 1;
                tracing::warn!("Batch merge failed for {}: {}", self.encoder.name(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordlist::StaticWordSource;
    use async_trait::async_trait;

    /// chat/chatte/shat → X1, cat → X2
    struct TableEncoder;

    impl PhoneticEncoder for TableEncoder {
        fn name(&self) -> &str {
            "table"
        }

        fn encode(&self, text: &str) -> Result<String, SuggestError> {
            match text {
                "chat" | "chatte" | "shat" => Ok("X1".to_string()),
                "cat" => Ok("X2".to_string()),
                "boom" => panic!("boom"),
                "bad" => Err(SuggestError::QueryFailed("unencodable".to_string())),
                _ => Ok(String::new()),
            }
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl WordSource for BrokenSource {
        async fn load(&self) -> Result<Vec<String>, SuggestError> {
            Err(SuggestError::BuildFailed("unreachable word list".to_string()))
        }

        async fn fingerprint(&self) -> Option<String> {
            None
        }
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    async fn open(dir: &tempfile::TempDir) -> PhoneticIndex {
        PhoneticIndex::open(&dir.path().join("index_table.db"), "v1")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_groups_words_by_code() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir).await;
        let builder = IndexBuilder::new(Arc::new(TableEncoder), 2);

        let source = StaticWordSource::new(["Chat", "chatte", "  ", "shat", "cat", "chat", "2024"]);
        let report = builder.build(&index, &source).await.unwrap();

        assert!(index.is_built());
        assert_eq!(report.words_seen, 7);
        assert_eq!(report.words_skipped, 0);
        assert_eq!(report.failed_flushes, 0);
        assert_eq!(report.flushes, 3);
        // "chat" comes back in the last batch and is stored once
        assert_eq!(report.words_indexed, 5);

        let mut x1 = index.lookup("X1").await;
        x1.sort();
        assert_eq!(x1, words(&["chat", "chatte", "shat"]));
        assert_eq!(index.lookup("X2").await, words(&["cat"]));
        assert_eq!(index.lookup("").await, words(&["2024"]));
    }

    #[tokio::test]
    async fn test_failing_words_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir).await;
        let builder = IndexBuilder::new(Arc::new(TableEncoder), DEFAULT_BATCH_SIZE);

        let report = builder
            .build_from_words(&index, words(&["chat", "boom", "bad", "cat"]))
            .await
            .unwrap();

        assert_eq!(report.words_skipped, 2);
        assert_eq!(report.words_indexed, 2);
        assert!(index.is_built());
        let stats = index.get_stats().await.unwrap();
        assert_eq!(stats.word_count, 2);
    }

    #[tokio::test]
    async fn test_second_build_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir).await;
        let builder = IndexBuilder::new(Arc::new(TableEncoder), DEFAULT_BATCH_SIZE);

        builder.build_from_words(&index, words(&["chat"])).await.unwrap();
        let report = builder
            .build_from_words(&index, words(&["shat"]))
            .await
            .unwrap();

        assert!(report.skipped);
        assert_eq!(index.lookup("X1").await, words(&["chat"]));
    }

    #[tokio::test]
    async fn test_broken_source_leaves_index_unbuilt() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir).await;
        let builder = IndexBuilder::new(Arc::new(TableEncoder), DEFAULT_BATCH_SIZE);

        let err = builder.build(&index, &BrokenSource).await.unwrap_err();
        assert!(matches!(err, SuggestError::BuildFailed(_)));
        assert!(!index.is_built());
    }

    #[tokio::test]
    async fn test_failed_flush_is_not_marked_built() {
        let dir = tempfile::tempdir().unwrap();
        let index = open(&dir).await;
        index.close().await;

        let builder = IndexBuilder::new(Arc::new(TableEncoder), 1);
        let report = builder
            .build_from_words(&index, words(&["chat", "cat"]))
            .await
            .unwrap();

        assert_eq!(report.flushes, 2);
        assert_eq!(report.failed_flushes, 2);
        assert_eq!(report.words_indexed, 0);
        assert!(!report.is_complete());
        assert!(!index.is_built());
    }

    #[tokio::test]
    async fn test_interrupted_build_converges_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index_table.db");
        let all = words(&["chat", "chatte", "shat", "cat"]);

        // 模拟中途崩溃：只写入第一批，未标记完成
        let index = PhoneticIndex::open(&path, "v1").await.unwrap();
        index.merge_words("X1", &words(&["chat", "chatte"])).await.unwrap();
        index.close().await;

        let index = PhoneticIndex::open(&path, "v1").await.unwrap();
        assert!(!index.is_built());

        let builder = IndexBuilder::new(Arc::new(TableEncoder), 2);
        let report = builder.build_from_words(&index, all).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.words_indexed, 2);
        assert!(index.is_built());

        assert_eq!(index.lookup("X1").await, words(&["chat", "chatte", "shat"]));
        assert_eq!(index.lookup("X2").await, words(&["cat"]));
        assert_eq!(index.get_stats().await.unwrap().word_count, 4);
    }
}
