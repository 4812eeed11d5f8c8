//! Adapters over the `rphonetic` algorithms / rphonetic 编码器适配
//!
//! The underlying encoders expect ASCII letters, so input is folded first:
//! accented Latin letters lose their diacritics, everything else that is
//! not an ASCII letter (digits, hyphens, apostrophes) is dropped. A word
//! with nothing left encodes to the empty code.

use rphonetic::{DoubleMetaphone, Encoder, Metaphone, Nysiis, Soundex};

use super::PhoneticEncoder;
use crate::error::SuggestError;

/// Strip diacritics from common Latin letters / 去除常见变音符号
pub(crate) fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Fold to lower-case ASCII letters only / 转为纯 ASCII 字母
pub(crate) fn ascii_letters(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .filter(char::is_ascii_alphabetic)
        .collect()
}

fn encode_with<E: Encoder>(encoder: &E, word: &str) -> String {
    let letters = ascii_letters(word);
    if letters.is_empty() {
        return String::new();
    }
    encoder.encode(&letters)
}

/// American Soundex / 美式 Soundex
#[derive(Default)]
pub struct SoundexEncoder {
    inner: Soundex,
}

impl PhoneticEncoder for SoundexEncoder {
    fn name(&self) -> &str {
        "soundex"
    }

    fn encode(&self, text: &str) -> Result<String, SuggestError> {
        Ok(encode_with(&self.inner, text))
    }
}

#[derive(Default)]
pub struct MetaphoneEncoder {
    inner: Metaphone,
}

impl PhoneticEncoder for MetaphoneEncoder {
    fn name(&self) -> &str {
        "metaphone"
    }

    fn encode(&self, text: &str) -> Result<String, SuggestError> {
        Ok(encode_with(&self.inner, text))
    }
}

/// Double Metaphone, primary code only / 仅使用主编码
#[derive(Default)]
pub struct DoubleMetaphoneEncoder {
    inner: DoubleMetaphone,
}

impl PhoneticEncoder for DoubleMetaphoneEncoder {
    fn name(&self) -> &str {
        "double_metaphone"
    }

    fn encode(&self, text: &str) -> Result<String, SuggestError> {
        Ok(encode_with(&self.inner, text))
    }
}

#[derive(Default)]
pub struct NysiisEncoder {
    inner: Nysiis,
}

impl PhoneticEncoder for NysiisEncoder {
    fn name(&self) -> &str {
        "nysiis"
    }

    fn encode(&self, text: &str) -> Result<String, SuggestError> {
        Ok(encode_with(&self.inner, text))
    }
}
