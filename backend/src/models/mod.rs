//! Domain models for roster (edital) storage.
//!
//! - [`Roster`] - One uploaded CSV, unique on ([`RosterKind`], label)
//! - [`Row`] - One CSV line as an open field-name → value map
//! - [`RosterKind`] - Which enrollee population a roster lists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Store-assigned roster identifier.
pub type RosterId = u64;

/// Store-assigned row identifier. Rows of a roster sort by id in insertion order.
pub type RowId = u64;

/// Field map of a single row, keyed by the CSV header text.
pub type RowFields = BTreeMap<String, String>;

// =============================================================================
// Roster Kind
// =============================================================================

/// Enrollee population a roster belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterKind {
    /// Scholarship holders.
    Bolsistas,
    /// Course participants.
    Cursistas,
}

impl RosterKind {
    /// Stored code, as used in export file names.
    pub fn code(&self) -> &'static str {
        match self {
            RosterKind::Bolsistas => "bolsistas",
            RosterKind::Cursistas => "cursistas",
        }
    }

    /// Human-readable label.
    pub fn display_name(&self) -> &'static str {
        match self {
            RosterKind::Bolsistas => "Bolsistas",
            RosterKind::Cursistas => "Cursistas",
        }
    }
}

impl fmt::Display for RosterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for RosterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bolsistas" => Ok(RosterKind::Bolsistas),
            "cursistas" => Ok(RosterKind::Cursistas),
            other => Err(format!("unknown roster kind '{}'", other)),
        }
    }
}

// =============================================================================
// Roster
// =============================================================================

/// One imported CSV's worth of enrollee rows.
///
/// User references are plain usernames; they become `None` once the user is
/// forgotten by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub id: RosterId,
    pub kind: RosterKind,
    /// Free-text code such as `01/2025`.
    pub label: String,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub last_modified_by: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl Roster {
    /// `"<Kind> - <label>"`, as shown in outcome messages.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.kind, self.label)
    }

    /// Uploader username, or `"unknown"` when the reference was cleared.
    pub fn uploader_display(&self) -> &str {
        self.uploaded_by.as_deref().unwrap_or("unknown")
    }

    pub fn matches_key(&self, kind: RosterKind, label: &str) -> bool {
        self.kind == kind && self.label == label
    }
}

// =============================================================================
// Row
// =============================================================================

/// One CSV line of a roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: RowId,
    pub roster_id: RosterId,
    pub fields: RowFields,
}

impl Row {
    /// Value of `field`, if this row has it.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}
