//! Core domain model for careersync: scraped postings, collection items and
//! per-item write outcomes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub mod normalize;

pub use normalize::{classify_employment_type, normalize, RawEntry, EMPLOYMENT_TYPE_RULES};

pub const CRATE_NAME: &str = "careersync-core";

/// Employment type of a posting, serialized with the labels the collection stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EmploymentType {
    #[serde(rename = "Full-Time")]
    FullTime,
    #[serde(rename = "Part-Time")]
    PartTime,
    #[serde(rename = "Contract")]
    Contract,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl EmploymentType {
    pub fn label(self) -> &'static str {
        match self {
            Self::FullTime => "Full-Time",
            Self::PartTime => "Part-Time",
            Self::Contract => "Contract",
            Self::Unknown => "",
        }
    }
}

/// One posting as scraped from the job board, keyed by its slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    pub department: String,
    pub location: String,
    #[serde(rename = "link")]
    pub url: Option<String>,
    #[serde(rename = "comp")]
    pub compensation: String,
    #[serde(rename = "slug")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub employment_type: EmploymentType,
}

impl CanonicalRecord {
    /// The posting identifier, only when present and non-empty.
    pub fn slug(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }
}

/// Field view of a collection item. Fields the sync does not manage are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ItemFieldData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comp: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl ItemFieldData {
    /// Projects a scraped posting onto the collection's creation schema.
    /// The collection's `url` field holds the posting slug, not the full link.
    pub fn from_record(record: &CanonicalRecord) -> Self {
        let slug = record.slug().map(ToString::to_string);
        Self {
            name: Some(record.title.clone()),
            slug: slug.clone(),
            location: Some(record.location.clone()),
            employment_type: Some(record.employment_type.label().to_string()),
            url: slug,
            comp: Some(record.compensation.clone()),
            extra: BTreeMap::new(),
        }
    }
}

/// An item already present in the remote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingRecord {
    /// Store handle used for deletion; distinct from the posting slug.
    #[serde(rename = "id")]
    pub store_item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cms_locale_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub field_data: ItemFieldData,
}

impl ExistingRecord {
    pub fn new(store_item_id: impl Into<String>, field_data: ItemFieldData) -> Self {
        Self {
            store_item_id: store_item_id.into(),
            cms_locale_id: None,
            last_published: None,
            last_updated: None,
            created_on: None,
            is_archived: false,
            is_draft: false,
            field_data,
        }
    }

    /// The posting identifier derived from the stored slug field.
    pub fn slug(&self) -> Option<&str> {
        self.field_data.slug.as_deref().filter(|s| !s.is_empty())
    }
}

/// Outcome of one deletion request, addressed by store item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerItemResult {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PerItemResult {
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            error: Some(error.into()),
        }
    }
}
