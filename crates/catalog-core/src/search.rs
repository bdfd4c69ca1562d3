//! # Catalog Search
//!
//! In-memory filtering and ordering of cached product records.
//!
//! ## How a Search Is Evaluated
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     SearchCriteria evaluation                           │
//! │                                                                         │
//! │  All cached records                                                    │
//! │       │                                                                 │
//! │       ▼   every provided filter must pass (logical AND)                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │ term       substring of name | any catalog entry | any category │   │
//! │  │ province   equal, ignoring case                                 │   │
//! │  │ city       equal, ignoring case                                 │   │
//! │  │ verified   production_verified == wanted                        │   │
//! │  │ categories at least one shared category, ignoring case         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Sort by name (collation key, then raw name, then id)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Blank strings count as "not provided", so an untouched search form is
//! the same as empty criteria.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::ProductRecord;

// =============================================================================
// Search Criteria
// =============================================================================

/// Filters for a catalog search. Every field is optional.
///
/// ## Example
/// ```rust
/// use catalog_core::search::SearchCriteria;
///
/// let criteria = SearchCriteria::new()
///     .term("maple")
///     .province("Quebec")
///     .production_verified(true);
/// assert!(!criteria.is_empty());
/// assert!(SearchCriteria::default().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    /// Free-text term.
    #[serde(default)]
    pub term: Option<String>,

    /// Province or state.
    #[serde(default, alias = "state")]
    pub province: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub production_verified: Option<bool>,

    /// Matches records sharing at least one of these categories.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn province(mut self, province: impl Into<String>) -> Self {
        self.province = Some(province.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn production_verified(mut self, verified: bool) -> Self {
        self.production_verified = Some(verified);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.extend(categories.into_iter().map(Into::into));
        self
    }

    /// True when no filter would reject anything.
    pub fn is_empty(&self) -> bool {
        provided(&self.term).is_none()
            && provided(&self.province).is_none()
            && provided(&self.city).is_none()
            && self.production_verified.is_none()
            && self.wanted_categories().is_empty()
    }

    /// Returns true if `record` passes every provided filter.
    pub fn matches(&self, record: &ProductRecord) -> bool {
        if let Some(term) = provided(&self.term) {
            let needle = term.to_lowercase();
            let hit = contains_folded(&record.name, &needle)
                || record
                    .catalog_entries
                    .iter()
                    .any(|entry| contains_folded(entry, &needle))
                || record
                    .categories
                    .iter()
                    .any(|category| contains_folded(category, &needle));
            if !hit {
                return false;
            }
        }

        if let Some(province) = provided(&self.province) {
            if !eq_folded(&record.location.province, province) {
                return false;
            }
        }

        if let Some(city) = provided(&self.city) {
            if !eq_folded(&record.location.city, city) {
                return false;
            }
        }

        if let Some(wanted) = self.production_verified {
            if record.verification.production_verified != wanted {
                return false;
            }
        }

        let wanted = self.wanted_categories();
        if !wanted.is_empty()
            && !record
                .categories
                .iter()
                .any(|category| wanted.contains(&category.trim().to_lowercase()))
        {
            return false;
        }

        true
    }

    fn wanted_categories(&self) -> HashSet<String> {
        self.categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

/// Returns the trimmed value when it is present and not blank.
fn provided(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn contains_folded(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}

fn eq_folded(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

// =============================================================================
// Filtering & Ordering
// =============================================================================

/// Applies `criteria` and returns the survivors ordered by name.
///
/// Empty criteria return every record, in the same order.
pub fn filter_and_sort(records: Vec<ProductRecord>, criteria: &SearchCriteria) -> Vec<ProductRecord> {
    let mut matched: Vec<ProductRecord> = if criteria.is_empty() {
        records
    } else {
        records.into_iter().filter(|r| criteria.matches(r)).collect()
    };
    sort_by_name(&mut matched);
    matched
}

/// Sorts records ascending by name.
pub fn sort_by_name(records: &mut [ProductRecord]) {
    records.sort_by(|a, b| compare_names(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
}

/// Locale-aware name comparison.
///
/// Names are compared by a collation key first (case folded, diacritics
/// stripped), so "Émile" sorts with "Emile" rather than after "Z".
/// Ties fall back to the raw strings so the order is total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

/// Primary-strength collation key for `name`.
///
/// Canonical decomposition splits precomposed letters from their marks,
/// which are then dropped. Letters whose stroke or ligature has no
/// decomposition are folded explicitly.
pub fn collation_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
    {
        match c {
            'ł' => key.push('l'),
            'ø' => key.push('o'),
            'đ' | 'ð' => key.push('d'),
            'ħ' => key.push('h'),
            'ı' => key.push('i'),
            'æ' => key.push_str("ae"),
            'œ' => key.push_str("oe"),
            'ß' => key.push_str("ss"),
            other => key.push(other),
        }
    }
    key
}

// =============================================================================
// Unit Tests
// =============================================================================
