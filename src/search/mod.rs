//! Phonetic search module / 语音搜索模块
//!
//! Layering / 分层：
//! - db_index: one persistent code → words index per encoder
//! - builder: batched population of an index from a word list
//! - searcher: one encoder + its index, with a run-once lifecycle
//! - aggregator: concurrent fan-out over the active searchers, merge and re-rank
//!
//! Call direction: Aggregator → Searcher → (Builder →) PhoneticIndex

pub mod aggregator;
pub mod builder;
pub mod db_index;
pub mod engine;
pub mod schema;
pub mod searcher;
pub mod tokenizer;

pub use aggregator::{Aggregator, AggregatorOptions};
pub use builder::{BuildReport, IndexBuilder};
pub use db_index::{IndexStats, PhoneticIndex};
pub use schema::{ScoredWord, SearcherState, SearcherStatus};
pub use searcher::{Searcher, SearcherOptions};
