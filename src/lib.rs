pub mod config;
pub mod error;
pub mod phonetic;
pub mod search;
pub mod wordlist;

pub use error::SuggestError;
