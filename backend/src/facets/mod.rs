//! Facet indexing: one pass over a roster's rows to find which fields can be
//! filtered and how.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::classify::{
    classify_field, extract_city, is_facet_value, is_hub_field, is_origin_hub_field, FieldKind,
};
use crate::models::Row;

/// Filter options available for a roster. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetIndex {
    /// Dropdown field → distinct observed values.
    pub dropdown_values: BTreeMap<String, Vec<String>>,
    /// Free-text (personal data) fields.
    pub text_fields: Vec<String>,
    pub dropdown_fields: Vec<String>,
    /// Fields whose values encode a hub city.
    pub hub_fields: Vec<String>,
    /// Cities extracted from hub values, deduplicated.
    pub cities: Vec<String>,
    /// Values of the reserved origin-hub field.
    pub origin_hubs: Vec<String>,
}

/// Classify every field seen in `rows` and collect its candidate values.
///
/// Empty values and values over the facet length limit are skipped, so a field
/// that only ever holds such values does not show up at all.
pub fn index_facets<'a, I>(rows: I) -> FacetIndex
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut dropdown_values: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut text_fields = BTreeSet::new();
    let mut hub_fields = BTreeSet::new();
    let mut cities = BTreeSet::new();
    let mut origin_hubs = BTreeSet::new();

    for row in rows {
        for (field, value) in &row.fields {
            if !is_facet_value(value) {
                continue;
            }

            if is_origin_hub_field(field) {
                origin_hubs.insert(value.clone());
                continue;
            }

            match classify_field(field) {
                FieldKind::Text => {
                    text_fields.insert(field.clone());
                }
                FieldKind::Dropdown => {
                    dropdown_values
                        .entry(field.clone())
                        .or_default()
                        .insert(value.clone());
                }
            }

            if is_hub_field(field) {
                hub_fields.insert(field.clone());
                cities.insert(extract_city(value).to_string());
            }
        }
    }

    FacetIndex {
        dropdown_fields: dropdown_values.keys().cloned().collect(),
        dropdown_values: dropdown_values
            .into_iter()
            .map(|(field, values)| (field, values.into_iter().collect()))
            .collect(),
        text_fields: text_fields.into_iter().collect(),
        hub_fields: hub_fields.into_iter().collect(),
        cities: cities.into_iter().collect(),
        origin_hubs: origin_hubs.into_iter().collect(),
    }
}
