//! Error types for roster import, filtering and export.
//!
//! - [`IngestError`] - Reading an uploaded CSV (file type, encoding, header)
//! - [`StoreError`] - Record store failures
//! - [`ImportError`] - Create-or-replace orchestration
//! - [`ExportError`] - CSV re-export
//! - [`ServerError`] - HTTP request boundary
//!
//! Conversions are `From` based so `?` works across layers.

use thiserror::Error;

use crate::models::{Roster, RosterId, RosterKind};

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Errors while turning uploaded bytes into rows.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The upload is not acceptable as a CSV file.
    #[error("Not a CSV file: {0}")]
    Validation(String),

    /// Neither UTF-8 nor Latin-1 could decode the content.
    #[error("Could not decode the file (UTF-8 preferred): {0}")]
    Decode(String),

    /// Header missing, empty or with no usable delimiter.
    #[error("Could not read the CSV header: {0}")]
    Header(String),

    /// A data record could not be parsed.
    #[error("Invalid CSV record at line {line}: {message}")]
    Record { line: u64, message: String },

    /// Failed to read the file from disk.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A roster with this key already exists.
    #[error("Roster '{kind} - {label}' already exists")]
    DuplicateRoster { kind: RosterKind, label: String },

    /// No roster with this id.
    #[error("Roster not found: {0}")]
    RosterNotFound(RosterId),

    /// Snapshot IO failure.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failure.
    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Import Errors
// =============================================================================

/// Errors from the roster importer.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A roster with the same key exists and replacement was not confirmed.
    /// Not a failure: the caller should re-prompt.
    #[error(
        "Edital '{}' already uploaded by '{}'; confirm the replacement and upload again",
        .existing.display_name(),
        .existing.uploader_display()
    )]
    NeedsConfirmation { existing: Box<Roster> },

    /// The roster was created by someone else between lookup and write.
    #[error("Concurrency error: edital '{0}' was created while processing; please try again")]
    Concurrency(String),

    /// CSV ingestion error.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors from the CSV exporter.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing matched; no file is produced.
    #[error("No data to export for this edital")]
    EmptyResult,

    /// CSV writer failure.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Buffer flush failure.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// Errors at the HTTP request boundary.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed form or query.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No acting user supplied.
    #[error("Authentication required")]
    Unauthorized,

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type IngestResult<T> = Result<T, IngestError>;

pub type StoreResult<T> = Result<T, StoreError>;

pub type ImportResult<T> = Result<T, ImportError>;

pub type ExportResult<T> = Result<T, ExportError>;

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_error_conversion_chain() {
        let ingest = IngestError::Header("empty header".into());
        let import: ImportError = ingest.into();
        assert!(import.to_string().contains("empty header"));

        let server: ServerError = import.into();
        assert!(server.to_string().contains("CSV header"));
    }

    #[test]
    fn test_needs_confirmation_names_uploader() {
        let existing = Roster {
            id: 7,
            kind: RosterKind::Bolsistas,
            label: "01/2025".into(),
            uploaded_by: Some("maria".into()),
            uploaded_at: Utc::now(),
            last_modified_by: None,
            last_modified_at: None,
        };
        let err = ImportError::NeedsConfirmation { existing: Box::new(existing) };
        let msg = err.to_string();
        assert!(msg.contains("Bolsistas - 01/2025"));
        assert!(msg.contains("maria"));
    }
}
