//! Catalog Matcher
//!
//! Resolves a classifier label to at most one catalog entry. Two probes are
//! tried in a fixed order, each an exact case-insensitive comparison of the
//! whole disease name:
//!
//! 1. the normalized display name, when it is not empty
//! 2. the raw label with underscores turned into spaces
//!
//! The strategy that produced the hit is returned with the entry.

use crate::catalog::{CatalogEntry, CatalogLookup};
use crate::error::MatchError;
use crate::normalizer::underscores_to_spaces;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which comparison found the catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStrategy {
    ExactRaw,
    ExactNormalized,
    CaseInsensitiveNormalized,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::ExactRaw => "ExactRaw",
            MatchStrategy::ExactNormalized => "ExactNormalized",
            MatchStrategy::CaseInsensitiveNormalized => "CaseInsensitiveNormalized",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched {
        entry: CatalogEntry,
        matched_by: MatchStrategy,
    },
    NotMatched,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    pub fn strategy(&self) -> Option<MatchStrategy> {
        match self {
            MatchResult::Matched { matched_by, .. } => Some(*matched_by),
            MatchResult::NotMatched => None,
        }
    }
}

/// Look `raw` / `normalized` up in the catalog.
///
/// Issues at most two lookups. A lookup error is returned as
/// [`MatchError::CatalogUnavailable`] and never folded into `NotMatched`.
pub fn match_label(
    raw: &str,
    normalized: &str,
    catalog: &dyn CatalogLookup,
) -> Result<MatchResult, MatchError> {
    let raw_probe = underscores_to_spaces(raw);
    if raw_probe.trim().is_empty() {
        return Err(MatchError::InvalidInput(format!(
            "raw label {:?} has no usable characters",
            raw
        )));
    }

    if !normalized.is_empty() {
        if let Some(entry) = catalog.find_by_name_case_insensitive_exact(normalized)? {
            return Ok(MatchResult::Matched {
                entry,
                matched_by: MatchStrategy::ExactNormalized,
            });
        }
    }

    match catalog.find_by_name_case_insensitive_exact(&raw_probe)? {
        Some(entry) => Ok(MatchResult::Matched {
            entry,
            matched_by: MatchStrategy::ExactRaw,
        }),
        None => Ok(MatchResult::NotMatched),
    }
}
