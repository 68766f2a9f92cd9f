//! Slug-keyed set difference between scraped postings and collection items.

use std::collections::HashSet;

use careersync_core::{CanonicalRecord, ExistingRecord};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReconciliationResult {
    /// Desired postings whose slug is absent from the collection, in input order.
    pub to_add: Vec<CanonicalRecord>,
    /// Collection items whose slug is absent from the desired postings, in input order.
    pub to_remove: Vec<ExistingRecord>,
}

impl ReconciliationResult {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Records without a slug never show up on either side. Existing fields are
/// not compared: a posting present on both sides is left as is.
pub fn reconcile(desired: &[CanonicalRecord], existing: &[ExistingRecord]) -> ReconciliationResult {
    let existing_slugs: HashSet<&str> = existing.iter().filter_map(ExistingRecord::slug).collect();
    let desired_slugs: HashSet<&str> = desired.iter().filter_map(CanonicalRecord::slug).collect();

    let mut queued: HashSet<&str> = HashSet::new();
    let to_add = desired
        .iter()
        .filter(|record| match record.slug() {
            Some(slug) => !existing_slugs.contains(slug) && queued.insert(slug),
            None => false,
        })
        .cloned()
        .collect();

    let to_remove = existing
        .iter()
        .filter(|item| item.slug().is_some_and(|slug| !desired_slugs.contains(slug)))
        .cloned()
        .collect();

    ReconciliationResult { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careersync_core::{EmploymentType, ItemFieldData};

    fn desired(slug: Option<&str>, title: &str) -> CanonicalRecord {
        CanonicalRecord {
            title: title.to_string(),
            department: "Engineering".into(),
            location: "Seattle, WA".into(),
            url: slug.map(|s| format!("https://acme.breezy.hr/p/{s}")),
            compensation: String::new(),
            id: slug.map(ToString::to_string),
            employment_type: EmploymentType::FullTime,
        }
    }

    fn existing(store_item_id: &str, slug: Option<&str>, title: &str) -> ExistingRecord {
        ExistingRecord::new(
            store_item_id,
            ItemFieldData {
                name: Some(title.to_string()),
                slug: slug.map(ToString::to_string),
                ..ItemFieldData::default()
            },
        )
    }

    fn add_slugs(result: &ReconciliationResult) -> Vec<&str> {
        result.to_add.iter().filter_map(CanonicalRecord::slug).collect()
    }

    fn remove_ids(result: &ReconciliationResult) -> Vec<&str> {
        result.to_remove.iter().map(|e| e.store_item_id.as_str()).collect()
    }

    #[test]
    fn new_postings_are_added_and_stale_items_removed() {
        let d = vec![desired(Some("eng-1"), "A"), desired(Some("eng-2"), "B"), desired(Some("ops-1"), "C")];
        let e = vec![
            existing("x1", Some("eng-2"), "B"),
            existing("x2", Some("old-1"), "Old"),
            existing("x3", Some("old-2"), "Older"),
        ];
        let result = reconcile(&d, &e);
        assert_eq!(add_slugs(&result), vec!["eng-1", "ops-1"]);
        assert_eq!(remove_ids(&result), vec!["x2", "x3"]);
    }

    #[test]
    fn store_representation_of_same_set_is_a_noop() {
        let d = vec![desired(Some("eng-1"), "A"), desired(Some("eng-2"), "B")];
        let e: Vec<ExistingRecord> = d
            .iter()
            .enumerate()
            .map(|(i, r)| ExistingRecord::new(format!("item-{i}"), ItemFieldData::from_record(r)))
            .collect();
        let result = reconcile(&d, &e);
        assert!(result.is_noop());
    }

    #[test]
    fn field_drift_on_matching_slugs_is_not_reported() {
        let d = vec![desired(Some("eng-1"), "Senior Reactor Engineer")];
        let e = vec![existing("x1", Some("eng-1"), "Reactor Engineer")];
        assert!(reconcile(&d, &e).is_noop());
    }

    #[test]
    fn records_without_slug_are_excluded_from_both_sides() {
        let d = vec![desired(None, "Ghost"), desired(Some(""), "Blank")];
        let e = vec![existing("x1", None, "Ghost"), existing("x2", Some(""), "Blank")];
        let result = reconcile(&d, &e);
        assert!(result.is_noop());
    }

    #[test]
    fn slug_comparison_is_exact() {
        let d = vec![desired(Some("Eng-1"), "A")];
        let e = vec![existing("x1", Some("eng-1"), "A")];
        let result = reconcile(&d, &e);
        assert_eq!(add_slugs(&result), vec!["Eng-1"]);
        assert_eq!(remove_ids(&result), vec!["x1"]);
    }

    #[test]
    fn outputs_never_overlap_their_opposite_input() {
        let d = vec![
            desired(Some("a"), "A"),
            desired(Some("b"), "B"),
            desired(None, "N"),
            desired(Some("c"), "C"),
        ];
        let e = vec![
            existing("1", Some("b"), "B"),
            existing("2", Some("d"), "D"),
            existing("3", None, "N"),
            existing("4", Some("e"), "E"),
        ];
        let result = reconcile(&d, &e);

        let existing_slugs: HashSet<&str> = e.iter().filter_map(ExistingRecord::slug).collect();
        let desired_slugs: HashSet<&str> = d.iter().filter_map(CanonicalRecord::slug).collect();
        assert!(result
            .to_add
            .iter()
            .all(|r| r.slug().is_some_and(|s| !existing_slugs.contains(s))));
        assert!(result
            .to_remove
            .iter()
            .all(|r| r.slug().is_some_and(|s| !desired_slugs.contains(s))));
        assert_eq!(add_slugs(&result), vec!["a", "c"]);
        assert_eq!(remove_ids(&result), vec!["2", "4"]);
    }

    #[test]
    fn duplicate_desired_slugs_are_added_once() {
        let d = vec![desired(Some("eng-1"), "First"), desired(Some("eng-1"), "Second")];
        let result = reconcile(&d, &[]);
        assert_eq!(result.to_add.len(), 1);
        assert_eq!(result.to_add[0].title, "First");
    }

    #[test]
    fn empty_inputs_reconcile_to_nothing() {
        assert!(reconcile(&[], &[]).is_noop());
    }
}
