//! Word sources for index building / 词表来源
//!
//! The index builder only needs an ordered collection of raw words plus a
//! cheap version fingerprint; where the words come from is up to the
//! source implementation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use crate::error::SuggestError;

#[async_trait]
pub trait WordSource: Send + Sync {
    /// Load the complete word list / 加载完整词表
    async fn load(&self) -> Result<Vec<String>, SuggestError>;

    /// Content version identifier that does not require loading the list.
    /// `None` means the source cannot tell, and only the configured index
    /// version guards against stale indexes.
    async fn fingerprint(&self) -> Option<String>;
}

/// Word list file: `.json` array of strings, otherwise one word per line / 词表文件
pub struct FileWordSource {
    path: PathBuf,
}

impl FileWordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl WordSource for FileWordSource {
    async fn load(&self) -> Result<Vec<String>, SuggestError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SuggestError::BuildFailed(format!("read word list {:?}: {}", self.path, e))
        })?;

        if self.is_json() {
            return serde_json::from_str::<Vec<String>>(&content).map_err(|e| {
                SuggestError::BuildFailed(format!("parse word list {:?}: {}", self.path, e))
            });
        }

        Ok(content.lines().map(|line| line.to_string()).collect())
    }

    async fn fingerprint(&self) -> Option<String> {
        let meta = tokio::fs::metadata(&self.path).await.ok()?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Some(format!("{}-{}", meta.len(), modified))
    }
}

/// In-memory word list / 内存词表
#[derive(Debug, Clone, Default)]
pub struct StaticWordSource {
    words: Vec<String>,
}

impl StaticWordSource {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl WordSource for StaticWordSource {
    async fn load(&self) -> Result<Vec<String>, SuggestError> {
        Ok(self.words.clone())
    }

    async fn fingerprint(&self) -> Option<String> {
        let mut hasher = DefaultHasher::new();
        self.words.hash(&mut hasher);
        Some(format!("{:016x}", hasher.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "chat\nchatte\n\n  shat \n").unwrap();

        let source = FileWordSource::new(&path);
        let words = source.load().await.unwrap();
        assert_eq!(words, vec!["chat", "chatte", "", "  shat "]);
        assert!(source.fingerprint().await.is_some());
    }

    #[tokio::test]
    async fn test_json_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        std::fs::write(&path, r#"["bonjour", "bonsoir"]"#).unwrap();

        let words = FileWordSource::new(&path).load().await.unwrap();
        assert_eq!(words, vec!["bonjour", "bonsoir"]);
    }

    #[tokio::test]
    async fn test_missing_or_broken_source_fails_build() {
        let dir = tempfile::tempdir().unwrap();

        let missing = FileWordSource::new(dir.path().join("nope.txt"));
        assert!(matches!(missing.load().await, Err(SuggestError::BuildFailed(_))));
        assert!(missing.fingerprint().await.is_none());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();
        let broken = FileWordSource::new(broken);
        assert!(matches!(broken.load().await, Err(SuggestError::BuildFailed(_))));
    }

    #[tokio::test]
    async fn test_static_fingerprint_tracks_content() {
        let a = StaticWordSource::new(["chat", "chien"]);
        let b = StaticWordSource::new(["chat", "chien"]);
        let c = StaticWordSource::new(["chat"]);
        assert_eq!(a.fingerprint().await, b.fingerprint().await);
        assert_ne!(a.fingerprint().await, c.fingerprint().await);
    }
}
