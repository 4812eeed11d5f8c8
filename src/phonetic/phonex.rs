//! Phonex - French phonetic key / 法语 Phonex 语音编码
//!
//! Rewrite rules after Frédéric Brouard's Phonex, applied in order on the
//! lower-cased word. The classic algorithm finishes by folding the key into
//! a floating point number; the reduced key itself is kept here because
//! it is directly usable as an index key.
//!
//! Digits 1-5 inside a key stand for nasal / diphthong sounds:
//! `1` an/en, `2` oi/oua, `3` ou, `4` in/ain/ein, `5` ch/sh.

use once_cell::sync::Lazy;
use regex::Regex;

use super::builtin::fold_accent;
use super::PhoneticEncoder;
use crate::error::SuggestError;

static RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("y", "i"),
        // h muet sauf dans ch / sh / ph
        ("^h", ""),
        ("([^csp])h", "${1}"),
        ("ph", "f"),
        ("g(ai?[nm])", "k${1}"),
        ("[ae]i[nm]([aeiou])", "yn${1}"),
        ("eau", "o"),
        ("oua", "2"),
        ("[ae]i[nm]", "4"),
        ("é|è|ê|ai|ei", "y"),
        ("er", "yr"),
        ("ess", "yss"),
        ("et", "yt"),
        // nasales non suivies d'une voyelle
        ("[ae][nm]([^aeiou14]|$)", "1${1}"),
        ("i[nm]([^aeiou14]|$)", "4${1}"),
        ("([aeiouy1234])s([aeiouy1234])", "${1}z${2}"),
        ("oe|eu", "e"),
        ("au", "o"),
        ("oi", "2"),
        ("ou", "3"),
        ("s?ch|sh", "5"),
        ("s[sc]", "s"),
        ("c([ei])", "s${1}"),
        ("qu|gu|q|c", "k"),
        ("g([aoy])", "k${1}"),
        ("a", "o"),
        ("[dp]", "t"),
        ("j", "g"),
        ("[bv]", "f"),
        ("m", "n"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("phonex rule must be a valid regex"),
            replacement,
        )
    })
    .collect()
});

pub struct PhonexEncoder;

impl PhonexEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Compute the reduced Phonex key / 计算 Phonex 编码
    pub fn key(&self, word: &str) -> String {
        let mut key = prepare(word);
        for (rule, replacement) in RULES.iter() {
            if rule.is_match(&key) {
                key = rule.replace_all(&key, *replacement).into_owned();
            }
        }

        let mut reduced = String::with_capacity(key.len());
        for c in key.chars() {
            if !reduced.ends_with(c) {
                reduced.push(c);
            }
        }

        if reduced.ends_with(|c: char| c == 't' || c == 'x') {
            reduced.pop();
        }
        reduced
    }
}

impl Default for PhonexEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhoneticEncoder for PhonexEncoder {
    fn name(&self) -> &str {
        "phonex"
    }

    fn encode(&self, text: &str) -> Result<String, SuggestError> {
        Ok(self.key(text))
    }
}

/// Keep é/è/ê (they have their own rule), fold other accents, drop the rest.
fn prepare(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'é' | 'è' | 'ê' => c,
            'ç' => 's',
            other => fold_accent(other),
        })
        .filter(|c| c.is_ascii_lowercase() || matches!(c, 'é' | 'è' | 'ê'))
        .collect()
}
