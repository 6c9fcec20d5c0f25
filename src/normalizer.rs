//! Label Normalizer
//!
//! Turns a raw classifier label such as `Tomato_Leaf_Late_blight` into the
//! display name used to look the disease up in the catalog (`Tomato Late Blight`).
//! Pure string handling: no I/O, no logging, no shared state.

use std::collections::HashSet;

/// Tokens stripped from labels unless configured otherwise
pub const DEFAULT_NOISE_WORDS: &[&str] = &[
    "leaf", "leaves", "orange", "crop", "plant", "disease", "diseases", "on", "in",
];

/// Set of non-discriminative tokens, stored lowercase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseWords {
    words: HashSet<String>,
}

impl NoiseWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// An empty set: normalization then only reshapes separators and casing
    pub fn none() -> Self {
        Self {
            words: HashSet::new(),
        }
    }

    /// Parse a comma separated list (`leaf, crop,plant`)
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(&token.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for NoiseWords {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_WORDS)
    }
}

/// Derive the display name for a raw label.
///
/// Underscores become spaces, noise tokens are dropped (case-insensitively),
/// whitespace is collapsed and the first character of each remaining token is
/// uppercased. The rest of every token keeps its original casing.
///
/// A label made only of noise words yields an empty string.
pub fn normalize(raw: &str, noise_words: &NoiseWords) -> String {
    let spaced = underscores_to_spaces(raw);

    spaced
        .split_whitespace()
        .filter(|token| !noise_words.contains(token))
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The only rewrite applied to a raw label before the raw fallback probe
pub fn underscores_to_spaces(raw: &str) -> String {
    raw.replace('_', " ")
}

fn capitalize_first(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
