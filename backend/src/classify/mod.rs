//! Field-name classification and text normalization shared by the facet
//! indexer and the filter engine.
//!
//! Field names are matched against fixed keyword tables after [`normalize`]
//! (lowercase, accents folded to their base letter). Short keywords such as
//! `rg` or `pai` only match a whole word of the name; longer ones match any
//! substring.

use once_cell::sync::Lazy;
use regex::Regex;

/// Values longer than this are ignored when collecting facet values.
pub const MAX_FACET_VALUE_LEN: usize = 100;

/// Normalized name of the reserved origin-hub field.
pub const ORIGIN_HUB_FIELD: &str = "polo de origem";

/// Personal-data keywords: fields containing one are searched as free text.
pub const PERSONAL_DATA_KEYWORDS: &[&str] = &[
    "nome",
    "cpf",
    "rg",
    "documento",
    "identidade",
    "passaporte",
    "endereco",
    "logradouro",
    "cep",
    "mail",
    "telefone",
    "celular",
    "whatsapp",
    "nascimento",
    "mae",
    "pai",
    "filiacao",
];

/// Document-id keywords: text search on these compares alphanumerics only.
pub const DOCUMENT_KEYWORDS: &[&str] = &["cpf", "rg", "documento", "identidade", "passaporte"];

/// Hub (polo) keywords.
pub const HUB_KEYWORDS: &[&str] = &["polo"];

/// Keywords up to this length must match a whole word.
const WHOLE_WORD_MAX_LEN: usize = 3;

/// `<letters> - <city>`, e.g. `LP - Recife`.
static CITY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\p{L}+\s+-\s+(.+)$").expect("valid city pattern"));

/// How a field is offered for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-text search (personal data).
    Text,
    /// Select among observed values.
    Dropdown,
}

/// Fold a character to its unaccented lowercase base letter.
fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Lowercase and strip accents: `"São Paulo"` → `"sao paulo"`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(fold_char)
        .collect()
}

/// [`normalize`] plus trimming and whitespace collapsing, for field names.
pub fn normalize_field_name(name: &str) -> String {
    normalize(name).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep only alphanumeric characters: `"111.222.333-44"` → `"11122233344"`.
pub fn alphanumeric_only(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn contains_keyword(normalized_name: &str, keyword: &str) -> bool {
    if keyword.len() <= WHOLE_WORD_MAX_LEN {
        normalized_name
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == keyword)
    } else {
        normalized_name.contains(keyword)
    }
}

fn matches_any(name: &str, keywords: &[&str]) -> bool {
    let normalized = normalize_field_name(name);
    keywords.iter().any(|kw| contains_keyword(&normalized, kw))
}

/// Text when the name mentions personal data, dropdown otherwise.
pub fn classify_field(name: &str) -> FieldKind {
    if matches_any(name, PERSONAL_DATA_KEYWORDS) {
        FieldKind::Text
    } else {
        FieldKind::Dropdown
    }
}

pub fn is_document_field(name: &str) -> bool {
    matches_any(name, DOCUMENT_KEYWORDS)
}

pub fn is_hub_field(name: &str) -> bool {
    matches_any(name, HUB_KEYWORDS)
}

pub fn is_origin_hub_field(name: &str) -> bool {
    normalize_field_name(name) == ORIGIN_HUB_FIELD
}

/// City encoded in a hub value.
///
/// `"LP - Recife"` gives `"Recife"`; with several separators the part after the
/// last one wins. Values without the pattern are returned trimmed.
pub fn extract_city(value: &str) -> &str {
    let whole = value.trim();
    match CITY_PATTERN.captures(value).and_then(|caps| caps.get(1)) {
        Some(rest) => {
            let city = rest.as_str().rsplit(" - ").next().unwrap_or("").trim();
            if city.is_empty() {
                whole
            } else {
                city
            }
        }
        None => whole,
    }
}

/// Whether a value is worth offering as a facet option.
pub fn is_facet_value(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && value.chars().count() <= MAX_FACET_VALUE_LEN
}
