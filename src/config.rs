//! Application configuration module / 应用配置模块
//!
//! Loaded once from config.json (or `PHONETIC_SUGGEST_CONFIG`) and then
//! passed by reference; nothing mutates it afterwards.
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location / 配置文件路径环境变量
pub const CONFIG_ENV: &str = "PHONETIC_SUGGEST_CONFIG";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Phonetic index storage / 语音索引存储配置
    pub index: IndexConfig,
    /// Word list location / 词表配置
    pub wordlist: WordListConfig,
    /// Query configuration / 查询配置
    pub suggest: SuggestConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Index database directory (relative to data_dir) / 索引数据库目录
    pub db_dir: String,
    /// Bump to force every index to rebuild / 修改后强制重建索引
    pub version: String,
    /// Words per flush / 每批写入的单词数
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordListConfig {
    /// `.json` array or one word per line / 词表文件路径
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    /// Encoders queried by the aggregator / 启用的算法
    pub active_algorithms: Vec<String>,
    pub per_method_limit: usize,
    pub final_limit: usize,
    /// Per-searcher query timeout / 单个搜索器查询超时
    pub query_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8190,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_dir: "phonetic".to_string(),
            version: "1".to_string(),
            batch_size: 2000,
        }
    }
}

impl Default for WordListConfig {
    fn default() -> Self {
        Self {
            path: "data/words.txt".to_string(),
        }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            active_algorithms: ["phonex", "soundex", "metaphone", "double_metaphone"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            per_method_limit: 10,
            final_limit: 5,
            query_timeout_ms: 1000,
        }
    }
}

impl AppConfig {
    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.index.data_dir)
    }

    /// Get index database directory / 获取索引数据库目录
    pub fn get_index_db_dir(&self) -> PathBuf {
        let data_dir = self.get_data_dir();
        if self.index.db_dir.is_empty() {
            data_dir
        } else {
            data_dir.join(&self.index.db_dir)
        }
    }

    pub fn get_wordlist_path(&self) -> PathBuf {
        PathBuf::from(&self.wordlist.path)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Clamp zero limits to 1 / 修正无效配置
    pub fn normalized(mut self) -> Self {
        if self.index.batch_size == 0 {
            tracing::warn!("index.batch_size is 0, using 1");
            self.index.batch_size = 1;
        }
        if self.suggest.per_method_limit == 0 {
            tracing::warn!("suggest.per_method_limit is 0, using 1");
            self.suggest.per_method_limit = 1;
        }
        if self.suggest.final_limit == 0 {
            tracing::warn!("suggest.final_limit is 0, using 1");
            self.suggest.final_limit = 1;
        }
        self
    }
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        // Load existing config / 加载现有配置
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config.normalized())
    } else {
        // Create default config / 创建默认配置
        let config = AppConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &AppConfig) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
