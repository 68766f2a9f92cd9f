//! Raw listing entries and their normalization into [`CanonicalRecord`]s.

use serde::{Deserialize, Serialize};

use crate::{CanonicalRecord, EmploymentType};

/// Text fragments pulled out of one posting in the listing markup.
/// Any fragment may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RawEntry {
    pub title: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    pub href: Option<String>,
    pub compensation: Option<String>,
    pub type_token: Option<String>,
}

/// Ordered substring rules for the employment type token. First match wins.
pub const EMPLOYMENT_TYPE_RULES: &[(&str, EmploymentType)] = &[
    ("FULL", EmploymentType::FullTime),
    ("PART", EmploymentType::PartTime),
    ("CONTRACT", EmploymentType::Contract),
];

pub fn classify_employment_type(token: &str) -> EmploymentType {
    EMPLOYMENT_TYPE_RULES
        .iter()
        .find(|(needle, _)| token.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(EmploymentType::Unknown)
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn slug_from_href(href: &str) -> Option<String> {
    href.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(ToString::to_string)
}

fn join_url(base_url: &str, href: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

/// Builds the canonical record for one raw entry. Never fails: an entry without
/// an anchor target comes back without `id` and `url`.
pub fn normalize(entry: &RawEntry, base_url: &str) -> CanonicalRecord {
    let href = entry
        .href
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty());

    CanonicalRecord {
        title: trimmed(&entry.title),
        department: trimmed(&entry.department),
        location: trimmed(&entry.location),
        url: href.map(|h| join_url(base_url, h)),
        compensation: trimmed(&entry.compensation),
        id: href.and_then(slug_from_href),
        employment_type: classify_employment_type(entry.type_token.as_deref().unwrap_or_default().trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://acme.breezy.hr";

    #[test]
    fn employment_type_rules_apply_in_priority_order() {
        assert_eq!(classify_employment_type("FULL_TIME"), EmploymentType::FullTime);
        assert_eq!(classify_employment_type("PART_TIME"), EmploymentType::PartTime);
        assert_eq!(classify_employment_type("CONTRACT_BASED"), EmploymentType::Contract);
        assert_eq!(classify_employment_type(""), EmploymentType::Unknown);
        assert_eq!(classify_employment_type("INTERNSHIP"), EmploymentType::Unknown);
        assert_eq!(classify_employment_type("CONTRACT_TO_FULL"), EmploymentType::FullTime);
    }

    #[test]
    fn employment_type_match_is_case_sensitive() {
        assert_eq!(classify_employment_type("full_time"), EmploymentType::Unknown);
    }

    #[test]
    fn normalize_derives_slug_and_url_from_anchor() {
        let entry = RawEntry {
            title: Some("  Reactor Engineer \n".into()),
            department: Some(" Engineering ".into()),
            location: Some("Seattle, WA".into()),
            href: Some("/p/abc123-reactor-engineer".into()),
            compensation: Some(" $120k ".into()),
            type_token: Some("%LABEL_POSITION_TYPE_FULL_TIME%".into()),
        };
        let record = normalize(&entry, BASE);

        assert_eq!(record.id.as_deref(), Some("abc123-reactor-engineer"));
        assert_eq!(
            record.url.as_deref(),
            Some("https://acme.breezy.hr/p/abc123-reactor-engineer")
        );
        assert_eq!(record.title, "Reactor Engineer");
        assert_eq!(record.department, "Engineering");
        assert_eq!(record.compensation, "$120k");
        assert_eq!(record.employment_type, EmploymentType::FullTime);
    }

    #[test]
    fn missing_anchor_yields_unidentifiable_record() {
        let entry = RawEntry {
            title: Some("Ghost posting".into()),
            ..RawEntry::default()
        };
        let record = normalize(&entry, BASE);
        assert_eq!(record.id, None);
        assert_eq!(record.url, None);
        assert_eq!(record.slug(), None);
        assert_eq!(record.employment_type, EmploymentType::Unknown);
    }

    #[test]
    fn trailing_slash_anchor_has_no_slug() {
        let entry = RawEntry {
            href: Some("/p/".into()),
            ..RawEntry::default()
        };
        let record = normalize(&entry, "https://acme.breezy.hr/");
        assert_eq!(record.id, None);
        assert_eq!(record.url.as_deref(), Some("https://acme.breezy.hr/p/"));
    }
}
