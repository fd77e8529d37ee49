//! Filter engine: conjunctive predicates over roster rows.
//!
//! Predicates arrive as query parameters:
//!
//! | Parameter            | Predicate                                          |
//! |----------------------|----------------------------------------------------|
//! | `filtro_<field>=v`   | `<field>` equals `v` exactly                        |
//! | `texto_<field>=v`    | `<field>` contains `v`, ignoring case and accents   |
//! | `cidade_polo=v`      | the city of some hub field contains `v`             |
//! | `polo_origem=v`      | the origin-hub field equals `v` exactly             |
//!
//! Blank values are ignored, as are document-field searches with no letters or
//! digits. A row must satisfy every active predicate, and a
//! row without a referenced field fails that predicate.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::classify::{
    alphanumeric_only, extract_city, is_document_field, is_hub_field, is_origin_hub_field,
    normalize,
};
use crate::models::Row;

pub const DROPDOWN_PREFIX: &str = "filtro_";
pub const TEXT_PREFIX: &str = "texto_";
pub const HUB_CITY_PARAM: &str = "cidade_polo";
pub const ORIGIN_HUB_PARAM: &str = "polo_origem";

/// A single filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    Dropdown { field: String, value: String },
    Text { field: String, value: String },
    HubCity { value: String },
    OriginHub { value: String },
}

impl Predicate {
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::Dropdown { field, value } => row.get(field) == Some(value.as_str()),
            Predicate::Text { field, value } => row
                .get(field)
                .is_some_and(|stored| text_matches(field, stored, value)),
            Predicate::HubCity { value } => hub_city_matches(row, value),
            Predicate::OriginHub { value } => row
                .fields
                .iter()
                .any(|(field, stored)| is_origin_hub_field(field) && stored == value),
        }
    }
}

/// Comparable form of `text` for `field`: normalized, and reduced to
/// alphanumerics for document fields.
fn search_key(field: &str, text: &str) -> String {
    let key = normalize(text.trim());
    if is_document_field(field) {
        alphanumeric_only(&key)
    } else {
        key
    }
}

/// Accent/case-insensitive containment; document fields compare alphanumerics only.
///
/// A query whose key is empty (e.g. `...` on a CPF field) contains in every
/// value. [`FilterSet::from_query`] drops such queries so they never filter.
pub fn text_matches(field: &str, stored: &str, query: &str) -> bool {
    search_key(field, stored).contains(&search_key(field, query))
}

fn hub_city_matches(row: &Row, city: &str) -> bool {
    let wanted = normalize(city.trim());
    row.fields.iter().any(|(field, value)| {
        is_hub_field(field)
            && !is_origin_hub_field(field)
            && normalize(extract_city(value)).contains(&wanted)
    })
}

/// The active filters of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSet {
    /// Field → exact value.
    pub dropdown: BTreeMap<String, String>,
    /// Field → search text.
    pub text: BTreeMap<String, String>,
    pub hub_city: Option<String>,
    pub origin_hub: Option<String>,
}

impl FilterSet {
    /// Build from query pairs; unknown parameters such as `page` are ignored.
    pub fn from_query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = FilterSet::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.trim().is_empty() {
                continue;
            }

            if key == HUB_CITY_PARAM {
                filters.hub_city = Some(value.to_string());
            } else if key == ORIGIN_HUB_PARAM {
                filters.origin_hub = Some(value.to_string());
            } else if let Some(field) = key.strip_prefix(DROPDOWN_PREFIX) {
                filters.dropdown.insert(field.to_string(), value.to_string());
            } else if let Some(field) = key.strip_prefix(TEXT_PREFIX) {
                if search_key(field, value).is_empty() {
                    continue;
                }
                filters.text.insert(field.to_string(), value.to_string());
            }
        }

        filters
    }

    /// Inverse of [`FilterSet::from_query`].
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(origin) = &self.origin_hub {
            pairs.push((ORIGIN_HUB_PARAM.to_string(), origin.clone()));
        }
        for (field, value) in &self.dropdown {
            pairs.push((format!("{}{}", DROPDOWN_PREFIX, field), value.clone()));
        }
        for (field, value) in &self.text {
            pairs.push((format!("{}{}", TEXT_PREFIX, field), value.clone()));
        }
        if let Some(city) = &self.hub_city {
            pairs.push((HUB_CITY_PARAM.to_string(), city.clone()));
        }
        pairs
    }

    pub fn is_empty(&self) -> bool {
        self.dropdown.is_empty()
            && self.text.is_empty()
            && self.hub_city.is_none()
            && self.origin_hub.is_none()
    }

    /// Active predicates: origin hub, dropdowns, texts, then hub city.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(value) = &self.origin_hub {
            predicates.push(Predicate::OriginHub { value: value.clone() });
        }
        predicates.extend(self.dropdown.iter().map(|(field, value)| Predicate::Dropdown {
            field: field.clone(),
            value: value.clone(),
        }));
        predicates.extend(self.text.iter().map(|(field, value)| Predicate::Text {
            field: field.clone(),
            value: value.clone(),
        }));
        if let Some(value) = &self.hub_city {
            predicates.push(Predicate::HubCity { value: value.clone() });
        }
        predicates
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.predicates().iter().all(|p| p.matches(row))
    }
}

/// Rows satisfying every active filter, in their original order.
pub fn filter_rows(rows: Vec<Row>, filters: &FilterSet) -> Vec<Row> {
    if filters.is_empty() {
        return rows;
    }
    let predicates = filters.predicates();
    rows.into_iter()
        .filter(|row| predicates.iter().all(|p| p.matches(row)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn row(id: u64, pairs: &[(&str, &str)]) -> Row {
        Row {
            id,
            roster_id: 1,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn sample() -> Vec<Row> {
        vec![
            row(1, &[("Nome", "Ana Souza"), ("CPF", "111.222.333-44"), ("Polo", "LP - Recife"), ("Curso", "Letras")]),
            row(2, &[("Nome", "João"), ("CPF", "555.666.777-88"), ("Polo", "LF - GARANHUNS"), ("Curso", "Física")]),
            row(3, &[("Nome", "Maria"), ("Cidade", "São Paulo"), ("Curso", "Letras"), ("Polo de Origem", "Caruaru")]),
            row(4, &[("Nome", "Ana Lima"), ("Polo", "LP - Recife"), ("Curso", "Física"), ("Polo de Origem", "Arcoverde")]),
        ]
    }

    fn ids(rows: &[Row]) -> Vec<u64> {
        rows.iter().map(|r| r.id).collect()
    }

    fn run(pairs: &[(&str, &str)]) -> Vec<u64> {
        ids(&filter_rows(sample(), &FilterSet::from_query(pairs.iter().copied())))
    }

    #[test]
    fn test_no_filters_returns_everything() {
        assert_eq!(run(&[]), vec![1, 2, 3, 4]);
        assert_eq!(run(&[("page", "2"), ("filtro_Curso", "  ")]), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_dropdown_exact_match() {
        assert_eq!(run(&[("filtro_Curso", "Letras")]), vec![1, 3]);
        assert_eq!(run(&[("filtro_Curso", "letras")]), Vec::<u64>::new());
    }

    #[test]
    fn test_missing_field_fails_predicate() {
        assert_eq!(run(&[("filtro_Cidade", "São Paulo")]), vec![3]);
        assert_eq!(run(&[("texto_Polo", "lp")]), vec![1, 4]);
    }

    #[test]
    fn test_text_is_accent_and_case_insensitive() {
        assert_eq!(run(&[("texto_Cidade", "sao paulo")]), vec![3]);
        assert_eq!(run(&[("texto_Nome", "JOAO")]), vec![2]);
        assert_eq!(run(&[("texto_Nome", "ana")]), vec![1, 4]);
    }

    #[test]
    fn test_document_fields_ignore_punctuation() {
        assert_eq!(run(&[("texto_CPF", "11122233344")]), vec![1]);
        assert_eq!(run(&[("texto_CPF", "222.333")]), vec![1]);
    }

    #[test]
    fn test_punctuation_only_document_query_is_inactive() {
        let filters = FilterSet::from_query([("texto_CPF", "...")]);
        assert!(filters.is_empty());
        assert_eq!(run(&[("texto_CPF", ".-.")]), vec![1, 2, 3, 4]);
        // Punctuation still counts on ordinary text fields.
        assert_eq!(run(&[("texto_Polo", "-")]), vec![1, 2, 4]);
    }

    #[test]
    fn test_hub_city() {
        assert_eq!(run(&[("cidade_polo", "recife")]), vec![1, 4]);
        assert_eq!(run(&[("cidade_polo", "Garanhuns")]), vec![2]);
        // Origin hub values never count as hub cities.
        assert_eq!(run(&[("cidade_polo", "Caruaru")]), Vec::<u64>::new());
    }

    #[test]
    fn test_origin_hub_exact() {
        assert_eq!(run(&[("polo_origem", "Caruaru")]), vec![3]);
        assert_eq!(run(&[("polo_origem", "caruaru")]), Vec::<u64>::new());
    }

    #[test]
    fn test_conjunction() {
        assert_eq!(run(&[("filtro_Curso", "Física"), ("cidade_polo", "Recife")]), vec![4]);
        assert_eq!(
            run(&[("filtro_Curso", "Letras"), ("texto_Nome", "ana"), ("cidade_polo", "Recife")]),
            vec![1]
        );
    }

    #[test]
    fn test_conjunction_equals_intersection() {
        let filters = FilterSet::from_query([
            ("filtro_Curso", "Física"),
            ("texto_Nome", "a"),
            ("cidade_polo", "recife"),
            ("polo_origem", "Arcoverde"),
        ]);

        let combined: BTreeSet<u64> = ids(&filter_rows(sample(), &filters)).into_iter().collect();

        let mut intersection: BTreeSet<u64> = ids(&sample()).into_iter().collect();
        for predicate in filters.predicates() {
            let single: BTreeSet<u64> = sample()
                .iter()
                .filter(|r| predicate.matches(r))
                .map(|r| r.id)
                .collect();
            intersection = intersection.intersection(&single).copied().collect();
        }

        assert_eq!(combined, intersection);
        assert_eq!(combined.into_iter().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_query_round_trip() {
        let filters = FilterSet::from_query([
            ("filtro_Curso", "Letras"),
            ("texto_Nome", "ana"),
            ("cidade_polo", "Recife"),
            ("polo_origem", "Caruaru"),
            ("page", "3"),
        ]);
        assert_eq!(filters.predicates().len(), 4);
        assert_eq!(FilterSet::from_query(filters.to_query()), filters);
    }
}
