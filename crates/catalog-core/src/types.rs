//! # Domain Types
//!
//! Types for the cached product catalog.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────────┐        ┌─────────────────┐                │
//! │  │     ProductRecord       │───────►│    Location     │                │
//! │  │  ─────────────────────  │        │  city/province  │                │
//! │  │  id (remote-assigned)   │        │  country        │                │
//! │  │  name (brand)           │        └─────────────────┘                │
//! │  │  catalog_entries[]      │        ┌─────────────────┐                │
//! │  │  categories[]           │───────►│  Verification   │                │
//! │  │  tags[]                 │        │  production /   │                │
//! │  │  visible / active       │        │  site flags     │                │
//! │  │  version                │        └─────────────────┘                │
//! │  │                         │        ┌─────────────────┐                │
//! │  │                         │───────►│   AuditTrail    │                │
//! │  └─────────────────────────┘        │  created_*      │                │
//! │                                     │  modified_*  ◄── delta sync key  │
//! │  ┌─────────────────────────┐        └─────────────────┘                │
//! │  │     CacheMetadata       │                                           │
//! │  │  last_updated           │                                           │
//! │  └─────────────────────────┘                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Shape
//! Records mirror the remote documents, so field names are camelCase on
//! the wire (`catalogEntries`, `modifiedAt`, ...). Every field except `id`,
//! `name` and `audit` has a serde default so that older documents still
//! decode.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

fn default_true() -> bool {
    true
}

// =============================================================================
// Actor
// =============================================================================

/// Identity of whoever created or modified a record.
///
/// Supplied by the identity provider and treated as opaque audit metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}

impl Actor {
    /// Creates an actor from its three identity fields.
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Actor {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
        }
    }

    /// Actor used for records produced by imports and tooling.
    pub fn system() -> Self {
        Actor::new("system", "", "System")
    }
}

// =============================================================================
// Location
// =============================================================================

/// Where a brand is based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub city: String,

    /// Province or state.
    #[serde(default, alias = "state")]
    pub province: String,

    #[serde(default)]
    pub country: String,
}

impl Location {
    pub fn new(
        city: impl Into<String>,
        province: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Location {
            city: city.into(),
            province: province.into(),
            country: country.into(),
        }
    }

    /// Fills an empty country with the configured default.
    pub fn with_default_country(mut self, default_country: &str) -> Self {
        if self.country.trim().is_empty() {
            self.country = default_country.to_string();
        }
        self
    }
}

// =============================================================================
// Verification
// =============================================================================

/// The two independent verification claims on a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    /// Supply-chain claim verified.
    #[serde(default)]
    pub production_verified: bool,

    /// Listing verified by a reviewer.
    #[serde(default)]
    pub site_verified: bool,

    /// Reviewer who verified the listing (only meaningful when `site_verified`).
    #[serde(default)]
    pub verified_by: Option<Actor>,

    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub verified_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Audit Trail
// =============================================================================

/// Creation and last-modification metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrail {
    pub created_by: Actor,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    pub modified_by: Actor,

    /// Incremental sync filters on this field.
    #[ts(as = "String")]
    pub modified_at: DateTime<Utc>,
}

impl AuditTrail {
    /// Audit trail for a record created and last touched by the same actor.
    pub fn created(actor: Actor, at: DateTime<Utc>) -> Self {
        AuditTrail {
            created_by: actor.clone(),
            created_at: at,
            modified_by: actor,
            modified_at: at,
        }
    }

    /// Records a modification.
    pub fn touch(&mut self, actor: Actor, at: DateTime<Utc>) {
        self.modified_by = actor;
        self.modified_at = at;
    }
}

// =============================================================================
// Product Record
// =============================================================================

/// A brand listing in the catalog: the entity the local cache mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Assigned by the remote store on creation; immutable once set.
    pub id: String,

    /// Brand/display name. Primary sort and search key.
    pub name: String,

    #[serde(default)]
    pub location: Location,

    #[serde(default)]
    pub verification: Verification,

    /// Product names belonging to this brand, in display order.
    #[serde(default)]
    pub catalog_entries: Vec<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Whether the record is visible to unauthenticated callers.
    #[serde(default = "default_true")]
    pub visible: bool,

    pub audit: AuditTrail,

    /// Informational only; never used for conflict detection.
    #[serde(default)]
    pub version: i64,

    /// Soft-delete flag.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl ProductRecord {
    /// Creates a minimal visible, active record.
    ///
    /// ## Example
    /// ```rust
    /// use catalog_core::ProductRecord;
    /// use chrono::Utc;
    ///
    /// let record = ProductRecord::new("p-1", "Maple Co", Utc::now())
    ///     .with_categories(["Food"])
    ///     .with_catalog_entries(["Amber Syrup"]);
    ///
    /// assert_eq!(record.categories, vec!["Food".to_string()]);
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>, at: DateTime<Utc>) -> Self {
        ProductRecord {
            id: id.into(),
            name: name.into(),
            location: Location::default(),
            verification: Verification::default(),
            catalog_entries: Vec::new(),
            categories: Vec::new(),
            tags: Vec::new(),
            visible: true,
            audit: AuditTrail::created(Actor::system(), at),
            version: 1,
            active: true,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_catalog_entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.catalog_entries = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_production_verified(mut self, verified: bool) -> Self {
        self.verification.production_verified = verified;
        self
    }

    /// Marks the listing as reviewed by `reviewer`.
    pub fn site_verified_by(mut self, reviewer: Actor, at: DateTime<Utc>) -> Self {
        self.verification.site_verified = true;
        self.verification.verified_by = Some(reviewer);
        self.verification.verified_at = Some(at);
        self
    }

    /// Applies a modification, bumping `version` and `modifiedAt`.
    pub fn modified(mut self, actor: Actor, at: DateTime<Utc>) -> Self {
        self.audit.touch(actor, at);
        self.version += 1;
        self
    }

    /// When the remote store last saw this record change.
    #[inline]
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.audit.modified_at
    }

    /// True when the name is usable as a sort and search key.
    pub fn is_searchable_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Fills an empty country with the configured default.
    pub fn normalize_country(mut self, default_country: &str) -> Self {
        self.location = self.location.with_default_country(default_country);
        self
    }
}

// =============================================================================
// Cache Metadata
// =============================================================================

/// The single metadata row of the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Instant of the last successful write of records, full or delta.
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl CacheMetadata {
    /// How old the cached data is at `now`. Never negative.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_updated).max(Duration::zero())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_record_wire_names_are_camel_case() {
        let record = ProductRecord::new("p-1", "Maple Co", at(0))
            .with_catalog_entries(["Amber Syrup"])
            .with_categories(["Food"]);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("catalogEntries").is_some());
        assert_eq!(json["verification"]["productionVerified"], false);
        assert!(json["audit"].get("modifiedAt").is_some());
    }

    #[test]
    fn test_record_decodes_with_missing_optional_fields() {
        let json = r#"{
            "id": "p-9",
            "name": "Sparse Brand",
            "audit": {
                "createdBy": { "id": "u-1" },
                "createdAt": "2024-01-01T00:00:00Z",
                "modifiedBy": { "id": "u-1" },
                "modifiedAt": "2024-01-02T00:00:00Z"
            }
        }"#;

        let record: ProductRecord = serde_json::from_str(json).unwrap();
        assert!(record.visible);
        assert!(record.active);
        assert!(record.catalog_entries.is_empty());
        assert_eq!(record.version, 0);
        assert_eq!(record.location, Location::default());
    }

    #[test]
    fn test_state_alias_for_province() {
        let json = r#"{ "city": "Portland", "state": "Oregon", "country": "USA" }"#;
        let location: Location = serde_json::from_str(json).unwrap();
        assert_eq!(location.province, "Oregon");
    }

    #[test]
    fn test_default_country_only_fills_blank() {
        let blank = Location::new("Halifax", "Nova Scotia", " ").with_default_country("Canada");
        assert_eq!(blank.country, "Canada");

        let set = Location::new("Portland", "Oregon", "USA").with_default_country("Canada");
        assert_eq!(set.country, "USA");
    }

    #[test]
    fn test_modified_bumps_version_and_timestamp() {
        let editor = Actor::new("u-2", "editor@example.com", "Editor");
        let record = ProductRecord::new("p-1", "Maple Co", at(0)).modified(editor.clone(), at(60));

        assert_eq!(record.version, 2);
        assert_eq!(record.modified_at(), at(60));
        assert_eq!(record.audit.modified_by, editor);
        assert_eq!(record.audit.created_at, at(0));
    }

    #[test]
    fn test_metadata_age_is_never_negative() {
        let meta = CacheMetadata {
            last_updated: at(100),
        };
        assert_eq!(meta.age(at(160)), Duration::seconds(60));
        assert_eq!(meta.age(at(50)), Duration::zero());
    }

    #[test]
    fn test_blank_name_is_not_searchable() {
        assert!(ProductRecord::new("p-1", "Maple Co", at(0)).is_searchable_name());
        assert!(!ProductRecord::new("p-2", "   ", at(0)).is_searchable_name());
    }
}
