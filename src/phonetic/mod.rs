//! Phonetic encoders - pluggable primitives / 语音编码器
//!
//! An encoder is a pure function from a normalized (trimmed, lower-cased)
//! word to a phonetic code. The empty code is a legal value meaning
//! "no distinguishing signature" and is indexed like any other code.

pub mod builtin;
pub mod phonex;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::SuggestError;

pub use builtin::{DoubleMetaphoneEncoder, MetaphoneEncoder, NysiisEncoder, SoundexEncoder};
pub use phonex::PhonexEncoder;

/// Phonetic encoding algorithm / 语音编码算法
pub trait PhoneticEncoder: Send + Sync {
    /// Unique identifier, also used to name the persistent index / 唯一名称
    fn name(&self) -> &str;

    /// Encode one normalized word / 编码单个单词
    fn encode(&self, text: &str) -> Result<String, SuggestError>;
}

/// Call an encoder, turning both errors and panics into `EncodeSkipped`.
pub fn safe_encode(encoder: &dyn PhoneticEncoder, word: &str) -> Result<String, SuggestError> {
    match catch_unwind(AssertUnwindSafe(|| encoder.encode(word))) {
        Ok(Ok(code)) => Ok(code),
        Ok(Err(SuggestError::EncodeSkipped { word, reason })) => {
            Err(SuggestError::EncodeSkipped { word, reason })
        }
        Ok(Err(e)) => Err(SuggestError::EncodeSkipped {
            word: word.to_string(),
            reason: e.to_string(),
        }),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "encoder panicked".to_string());
            Err(SuggestError::EncodeSkipped {
                word: word.to_string(),
                reason,
            })
        }
    }
}

/// Fixed set of named encoders, built once at startup / 编码器注册表
#[derive(Clone, Default)]
pub struct EncoderRegistry {
    encoders: BTreeMap<String, Arc<dyn PhoneticEncoder>>,
}

impl EncoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All encoders shipped with the crate / 内置编码器
    pub fn builtin() -> Self {
        Self::new()
            .with(Arc::new(PhonexEncoder::new()))
            .with(Arc::new(SoundexEncoder::default()))
            .with(Arc::new(MetaphoneEncoder::default()))
            .with(Arc::new(DoubleMetaphoneEncoder::default()))
            .with(Arc::new(NysiisEncoder::default()))
    }

    /// Register an encoder; a later registration with the same name wins.
    pub fn with(mut self, encoder: Arc<dyn PhoneticEncoder>) -> Self {
        self.encoders.insert(encoder.name().to_string(), encoder);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PhoneticEncoder>> {
        self.encoders.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.encoders.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PhoneticEncoder>> {
        self.encoders.values()
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}
