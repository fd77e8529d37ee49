//! Create-or-replace import of a roster and its rows.
//!
//! Two phases:
//!
//! 1. [`prepare`] looks up (kind, label) and decides between creating and
//!    replacing. An existing roster without confirmation stops here with
//!    [`ImportError::NeedsConfirmation`].
//! 2. [`commit`] performs the whole write in one store transaction: create or
//!    touch the roster, drop its old rows, insert the new ones. A roster that
//!    appeared in between fails with [`ImportError::Concurrency`].

use chrono::Utc;
use serde::Serialize;
use std::fmt;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{ImportError, ImportResult, IngestResult, StoreError};
use crate::models::{Roster, RosterKind, RowFields};
use crate::store::RecordStore;

/// What an import did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportAction {
    Created,
    Replaced,
}

impl fmt::Display for ImportAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportAction::Created => "imported",
            ImportAction::Replaced => "replaced",
        })
    }
}

/// Who imports what under which key.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub kind: RosterKind,
    pub label: String,
    /// Replace an existing roster with the same key.
    pub confirm_replace: bool,
    /// Acting username.
    pub user: String,
}

/// Decision taken by [`prepare`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImportPlan {
    Create,
    Replace(Roster),
}

/// Result of a successful import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub action: ImportAction,
    pub roster: Roster,
    pub rows_imported: usize,
}

impl ImportOutcome {
    /// User-facing summary.
    pub fn message(&self) -> String {
        format!(
            "CSV file {} successfully for edital '{}'! {} rows imported.",
            self.action,
            self.roster.display_name(),
            self.rows_imported
        )
    }
}

/// Drop blank-named fields. `None` when nothing is left.
pub fn clean_row(fields: RowFields) -> Option<RowFields> {
    let cleaned: RowFields = fields
        .into_iter()
        .filter(|(name, _)| !name.trim().is_empty())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Look up the key and decide what to do. Never mutates.
pub fn prepare(store: &RecordStore, request: &ImportRequest) -> ImportResult<ImportPlan> {
    match store.find_roster(request.kind, &request.label) {
        Some(existing) if !request.confirm_replace => {
            log_warning(format!(
                "Edital '{}' already exists (uploaded by '{}'), waiting for confirmation",
                existing.display_name(),
                existing.uploader_display()
            ));
            Err(ImportError::NeedsConfirmation {
                existing: Box::new(existing),
            })
        }
        Some(existing) => Ok(ImportPlan::Replace(existing)),
        None => Ok(ImportPlan::Create),
    }
}

/// Write the roster and its rows atomically according to `plan`.
pub fn commit<I>(
    store: &RecordStore,
    request: &ImportRequest,
    plan: ImportPlan,
    rows: I,
) -> ImportResult<ImportOutcome>
where
    I: IntoIterator<Item = IngestResult<RowFields>>,
{
    let outcome = store.transaction(|tx| {
        let now = Utc::now();

        let (roster, action) = match plan {
            ImportPlan::Create => {
                let roster = tx
                    .insert_roster(request.kind, &request.label, &request.user, now)
                    .map_err(|e| match e {
                        StoreError::DuplicateRoster { kind, label } => {
                            ImportError::Concurrency(format!("{} - {}", kind, label))
                        }
                        other => other.into(),
                    })?;
                (roster, ImportAction::Created)
            }
            ImportPlan::Replace(existing) => {
                let roster = tx.touch_roster(existing.id, &request.user, now)?;
                let removed = tx.delete_rows(roster.id);
                log_info(format!("Removed {} previous rows", removed));
                (roster, ImportAction::Replaced)
            }
        };

        let mut rows_imported = 0;
        for row in rows {
            if let Some(fields) = clean_row(row?) {
                tx.insert_row(roster.id, fields)?;
                rows_imported += 1;
            }
        }

        Ok::<_, ImportError>(ImportOutcome {
            action,
            roster,
            rows_imported,
        })
    })?;

    log_success(outcome.message());
    Ok(outcome)
}

/// [`prepare`] then [`commit`].
///
/// # Example
/// ```ignore
/// let store = RecordStore::in_memory();
/// let csv = ingest(b"Nome,CPF,Polo\nAna,111.222.333-44,LP - Recife\n", "lista.csv")?;
/// let outcome = import_rows(&store, &request, csv)?;
/// assert_eq!(outcome.rows_imported, 1);
/// ```
pub fn import_rows<I>(
    store: &RecordStore,
    request: &ImportRequest,
    rows: I,
) -> ImportResult<ImportOutcome>
where
    I: IntoIterator<Item = IngestResult<RowFields>>,
{
    log_info(format!(
        "Importing edital '{} - {}' for '{}'",
        request.kind, request.label, request.user
    ));
    let plan = prepare(store, request)?;
    commit(store, request, plan, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::parser::ingest;

    fn request(label: &str, confirm: bool, user: &str) -> ImportRequest {
        ImportRequest {
            kind: RosterKind::Bolsistas,
            label: label.into(),
            confirm_replace: confirm,
            user: user.into(),
        }
    }

    fn rows_of(csv: &str) -> Vec<IngestResult<RowFields>> {
        ingest(csv.as_bytes(), "lista.csv").unwrap().into_rows().collect()
    }

    #[test]
    fn test_first_upload_creates() {
        let store = RecordStore::in_memory();
        let outcome = import_rows(
            &store,
            &request("01/2025", false, "ana"),
            rows_of("Nome,CPF,Polo\nAna,111.222.333-44,LP - Recife\n"),
        )
        .unwrap();

        assert_eq!(outcome.action, ImportAction::Created);
        assert_eq!(outcome.rows_imported, 1);
        assert_eq!(outcome.roster.uploaded_by.as_deref(), Some("ana"));

        let rows = store.rows(outcome.roster.id).unwrap();
        assert_eq!(rows[0].fields.len(), 3);
        assert_eq!(rows[0].get("CPF"), Some("111.222.333-44"));
        assert!(outcome.message().contains("1 rows imported"));
    }

    #[test]
    fn test_reupload_without_confirmation_does_not_mutate() {
        let store = RecordStore::in_memory();
        let first = import_rows(&store, &request("01/2025", false, "ana"), rows_of("a,b\n1,2\n3,4\n"))
            .unwrap();

        let err = import_rows(&store, &request("01/2025", false, "bia"), rows_of("a,b\n9,9\n"))
            .unwrap_err();

        match err {
            ImportError::NeedsConfirmation { existing } => {
                assert_eq!(existing.uploaded_by.as_deref(), Some("ana"));
            }
            other => panic!("unexpected error: {other}"),
        }
        let rows = store.rows(first.roster.id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("a"), Some("1"));
        assert_eq!(store.get_roster(first.roster.id).unwrap().last_modified_by, None);
    }

    #[test]
    fn test_confirmed_reupload_replaces_all_rows() {
        let store = RecordStore::in_memory();
        let first = import_rows(&store, &request("01/2025", false, "ana"), rows_of("a,b\n1,2\n3,4\n"))
            .unwrap();

        let second = import_rows(
            &store,
            &request("01/2025", true, "bia"),
            rows_of("x,y\n7,8\n,\n9,10\n5,6\n"),
        )
        .unwrap();

        assert_eq!(second.action, ImportAction::Replaced);
        assert_eq!(second.roster.id, first.roster.id);
        assert_eq!(second.roster.uploaded_by.as_deref(), Some("ana"));
        assert_eq!(second.roster.last_modified_by.as_deref(), Some("bia"));
        assert_eq!(second.rows_imported, 4);

        let rows = store.rows(first.roster.id).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.get("a").is_none()));
    }

    #[test]
    fn test_concurrent_create_fails_closed() {
        let store = RecordStore::in_memory();
        let req = request("05/2025", false, "ana");
        let plan = prepare(&store, &req).unwrap();
        assert_eq!(plan, ImportPlan::Create);

        // Someone else wins the race.
        import_rows(&store, &request("05/2025", false, "bia"), rows_of("a,b\n1,2\n")).unwrap();

        let err = commit(&store, &req, plan, rows_of("a,b\n3,4\n")).unwrap_err();
        assert!(matches!(err, ImportError::Concurrency(_)));

        let roster = store.find_roster(RosterKind::Bolsistas, "05/2025").unwrap();
        assert_eq!(roster.uploaded_by.as_deref(), Some("bia"));
        assert_eq!(store.rows(roster.id).unwrap()[0].get("a"), Some("1"));
    }

    #[test]
    fn test_bad_record_rolls_back_everything() {
        let store = RecordStore::in_memory();
        let rows: Vec<IngestResult<RowFields>> = vec![
            Ok([("a".to_string(), "1".to_string())].into_iter().collect()),
            Err(IngestError::Record {
                line: 3,
                message: "broken".into(),
            }),
        ];

        let err = import_rows(&store, &request("06/2025", false, "ana"), rows).unwrap_err();
        assert!(matches!(err, ImportError::Ingest(_)));
        assert!(store.find_roster(RosterKind::Bolsistas, "06/2025").is_none());
    }

    #[test]
    fn test_blank_columns_dropped_and_empty_rows_skipped() {
        let store = RecordStore::in_memory();
        let rows: Vec<IngestResult<RowFields>> = vec![
            Ok([("Nome".into(), "Ana".into()), ("  ".into(), "x".into())].into_iter().collect()),
            Ok([("".to_string(), "only blank".to_string())].into_iter().collect()),
        ];

        let outcome = import_rows(&store, &request("07/2025", false, "ana"), rows).unwrap();
        assert_eq!(outcome.rows_imported, 1);
        let stored = store.rows(outcome.roster.id).unwrap();
        assert_eq!(stored[0].fields.keys().collect::<Vec<_>>(), vec!["Nome"]);
    }

    #[test]
    fn test_clean_row() {
        assert_eq!(clean_row(RowFields::new()), None);
        let row: RowFields = [("a".to_string(), String::new())].into_iter().collect();
        assert_eq!(clean_row(row.clone()), Some(row));
    }
}
