//! REST API request/response types and error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use super::logs::log_error;
use super::pagination::Page;
use crate::error::{ExportError, ImportError, IngestError, ServerError, StoreError};
use crate::facets::FacetIndex;
use crate::filter::FilterSet;
use crate::importer::{ImportAction, ImportOutcome};
use crate::models::{Roster, Row};
use crate::parser::Encoding;

/// A roster with its row count, as listed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    #[serde(flatten)]
    pub roster: Roster,
    pub display_name: String,
    pub row_count: usize,
}

impl RosterSummary {
    pub fn new(roster: Roster, row_count: usize) -> Self {
        Self {
            display_name: roster.display_name(),
            roster,
            row_count,
        }
    }
}

/// Response after a successful upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub action: ImportAction,
    /// Human-readable outcome.
    pub message: String,
    pub roster: Roster,
    pub rows_imported: usize,
    pub encoding: Encoding,
    pub delimiter: String,
}

impl UploadResponse {
    pub fn new(outcome: ImportOutcome, encoding: Encoding, delimiter: char) -> Self {
        let mut message = outcome.message();
        if encoding == Encoding::Latin1 {
            message.push_str(" File read with latin-1 encoding.");
        }
        Self {
            action: outcome.action,
            message,
            roster: outcome.roster,
            rows_imported: outcome.rows_imported,
            encoding,
            delimiter: delimiter.to_string(),
        }
    }
}

/// Roster detail: the current page of matching rows plus filter options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailResponse {
    pub roster: Roster,
    pub filters: FilterSet,
    pub facets: FacetIndex,
    /// Rows in the roster before filtering.
    pub total_rows: usize,
    pub page: Page<Row>,
}

/// Structured error body returned by every endpoint on failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. `VALIDATION_ERROR`, `NEEDS_CONFIRMATION`.
    pub code: &'static str,
    pub message: String,
    /// Roster already holding the key, for `NEEDS_CONFIRMATION`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<Roster>,
}

impl ErrorBody {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            existing: None,
        }
    }
}

fn store_status(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::RosterNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        StoreError::DuplicateRoster { .. } => (StatusCode::CONFLICT, "CONFLICT"),
        StoreError::Io(_) | StoreError::Json(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl ServerError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let message = self.to_string();
        match self {
            ServerError::Import(ImportError::NeedsConfirmation { existing }) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "NEEDS_CONFIRMATION",
                    message,
                    existing: Some(*existing),
                },
            ),
            ServerError::Import(ImportError::Concurrency(_)) => {
                (StatusCode::CONFLICT, ErrorBody::new("CONCURRENCY_ERROR", message))
            }
            ServerError::Import(ImportError::Ingest(err)) => {
                let code = match err {
                    IngestError::Validation(_) => "VALIDATION_ERROR",
                    IngestError::Decode(_) => "DECODE_ERROR",
                    IngestError::Header(_) => "HEADER_ERROR",
                    IngestError::Record { .. } => "CSV_ERROR",
                    IngestError::Io(_) => {
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            ErrorBody::new("INTERNAL_ERROR", message),
                        )
                    }
                };
                (StatusCode::BAD_REQUEST, ErrorBody::new(code, message))
            }
            ServerError::Import(ImportError::Store(err)) | ServerError::Store(err) => {
                let (status, code) = store_status(&err);
                (status, ErrorBody::new(code, message))
            }
            ServerError::Export(ExportError::EmptyResult) => {
                (StatusCode::NOT_FOUND, ErrorBody::new("EMPTY_RESULT", message))
            }
            ServerError::Export(_) | ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("INTERNAL_ERROR", message),
            ),
            ServerError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorBody::new("VALIDATION_ERROR", message))
            }
            ServerError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new("AUTH_REQUIRED", message))
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            log_error(format!("{}: {}", body.code, body.message));
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RosterKind;
    use chrono::Utc;

    fn roster() -> Roster {
        Roster {
            id: 3,
            kind: RosterKind::Bolsistas,
            label: "01/2025".into(),
            uploaded_by: Some("ana".into()),
            uploaded_at: Utc::now(),
            last_modified_by: None,
            last_modified_at: None,
        }
    }

    #[test]
    fn test_needs_confirmation_carries_existing_roster() {
        let err: ServerError = ImportError::NeedsConfirmation {
            existing: Box::new(roster()),
        }
        .into();
        let (status, body) = err.status_and_body();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "NEEDS_CONFIRMATION");
        assert_eq!(body.existing.unwrap().uploaded_by.as_deref(), Some("ana"));
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ServerError, StatusCode, &str)> = vec![
            (
                ImportError::Ingest(IngestError::Decode("x".into())).into(),
                StatusCode::BAD_REQUEST,
                "DECODE_ERROR",
            ),
            (
                ImportError::Ingest(IngestError::Header("x".into())).into(),
                StatusCode::BAD_REQUEST,
                "HEADER_ERROR",
            ),
            (
                ImportError::Concurrency("x".into()).into(),
                StatusCode::CONFLICT,
                "CONCURRENCY_ERROR",
            ),
            (ExportError::EmptyResult.into(), StatusCode::NOT_FOUND, "EMPTY_RESULT"),
            (StoreError::RosterNotFound(9).into(), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (ServerError::Unauthorized, StatusCode::UNAUTHORIZED, "AUTH_REQUIRED"),
        ];

        for (err, status, code) in cases {
            let (got_status, body) = err.status_and_body();
            assert_eq!(got_status, status);
            assert_eq!(body.code, code);
        }
    }

    #[test]
    fn test_latin1_notice_in_upload_message() {
        let outcome = ImportOutcome {
            action: ImportAction::Created,
            roster: roster(),
            rows_imported: 2,
        };
        let response = UploadResponse::new(outcome, Encoding::Latin1, ';');
        assert!(response.message.contains("2 rows imported"));
        assert!(response.message.contains("latin-1"));
        assert_eq!(response.delimiter, ";");
    }
}
