//! # Validation Module
//!
//! Write-path validation for product records.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin forms                                                  │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Record write path                                            │
//! │  └── THIS MODULE: rules a record must satisfy before it is written     │
//! │      to the remote document store                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Remote document store ──► sync ──► local cache                        │
//! │                                    (stores whatever arrives,           │
//! │                                     never re-validates)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use catalog_core::validation::validate_record;
//! use catalog_core::ProductRecord;
//! use chrono::Utc;
//!
//! let record = ProductRecord::new("p-1", "Maple Co", Utc::now())
//!     .with_catalog_entries(["Amber Syrup"])
//!     .with_categories(["Food"]);
//!
//! assert!(validate_record(&record).is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::ProductRecord;
use crate::{MAX_NAME_LEN, MAX_SEARCH_TERM_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a brand name.
///
/// ## Rules
/// - Must not be blank
/// - At most 200 characters
pub fn validate_brand_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates the catalog entries: at least one must be non-blank.
pub fn validate_catalog_entries(entries: &[String]) -> ValidationResult<()> {
    require_non_blank_entry("catalogEntries", entries)
}

/// Validates the category list: at least one must be non-blank.
pub fn validate_categories(categories: &[String]) -> ValidationResult<()> {
    require_non_blank_entry("categories", categories)
}

fn require_non_blank_entry(field: &str, values: &[String]) -> ValidationResult<()> {
    if values.iter().any(|v| !v.trim().is_empty()) {
        Ok(())
    } else {
        Err(ValidationError::NoEntries {
            field: field.to_string(),
        })
    }
}

/// Validates a free-text search term.
///
/// ## Returns
/// The trimmed term. Empty is allowed (it means "no term").
pub fn validate_search_term(term: &str) -> ValidationResult<String> {
    let term = term.trim();

    if term.chars().count() > MAX_SEARCH_TERM_LEN {
        return Err(ValidationError::TooLong {
            field: "term".to_string(),
            max: MAX_SEARCH_TERM_LEN,
        });
    }

    Ok(term.to_string())
}

// =============================================================================
// Record Validator
// =============================================================================

/// Validates a whole record as the write path requires.
///
/// ## Rules
/// - `id` and `name` present
/// - at least one catalog entry and one category
/// - a site-verified record names its reviewer
pub fn validate_record(record: &ProductRecord) -> ValidationResult<()> {
    if record.id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    validate_brand_name(&record.name)?;
    validate_catalog_entries(&record.catalog_entries)?;
    validate_categories(&record.categories)?;

    if record.verification.site_verified && record.verification.verified_by.is_none() {
        return Err(ValidationError::Inconsistent {
            field: "verification".to_string(),
            reason: "siteVerified requires verifiedBy".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Actor;
    use chrono::Utc;

    fn valid_record() -> ProductRecord {
        ProductRecord::new("p-1", "Maple Co", Utc::now())
            .with_catalog_entries(["Amber Syrup"])
            .with_categories(["Food"])
    }

    #[test]
    fn test_validate_brand_name() {
        assert!(validate_brand_name("Maple Co").is_ok());
        assert!(validate_brand_name("   ").is_err());
        assert!(validate_brand_name(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_lists_need_one_non_blank_entry() {
        assert!(validate_catalog_entries(&["".to_string(), "Syrup".to_string()]).is_ok());
        assert_eq!(
            validate_categories(&[" ".to_string()]),
            Err(ValidationError::NoEntries {
                field: "categories".to_string()
            })
        );
        assert!(validate_catalog_entries(&[]).is_err());
    }

    #[test]
    fn test_validate_search_term() {
        assert_eq!(validate_search_term("  maple ").unwrap(), "maple");
        assert_eq!(validate_search_term("").unwrap(), "");
        assert!(validate_search_term(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_record() {
        assert!(validate_record(&valid_record()).is_ok());

        let no_categories = valid_record().with_categories(Vec::<String>::new());
        assert!(validate_record(&no_categories).is_err());

        let mut unreviewed = valid_record();
        unreviewed.verification.site_verified = true;
        assert!(matches!(
            validate_record(&unreviewed),
            Err(ValidationError::Inconsistent { .. })
        ));

        let reviewed = valid_record().site_verified_by(Actor::new("u-1", "r@example.com", "Reviewer"), Utc::now());
        assert!(validate_record(&reviewed).is_ok());
    }
}
