//! # Editais - roster upload, filtering and re-export
//!
//! Staff upload CSV rosters ("editais") of program enrollees. Each row is kept
//! as an open field-name → value map, browsed through dynamic filters and
//! exported back to CSV.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ CSV File │───▶│  Parser  │───▶│ Importer │───▶│  Store   │
//! │(UTF8/L1) │    │(auto-sep)│    │(replace?)│    │ (atomic) │
//! └──────────┘    └──────────┘    └──────────┘    └────┬─────┘
//!                                                      │
//!                 ┌──────────┐    ┌──────────┐         │
//!                 │  Export  │◀───│  Filter  │◀────────┤
//!                 │  (CSV)   │    └──────────┘         │
//!                 └──────────┘    ┌──────────┐         │
//!                                 │  Facets  │◀────────┘
//!                                 └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Roster and row models
//! - [`parser`] - CSV ingestion with encoding/delimiter detection
//! - [`store`] - Transactional record store
//! - [`importer`] - Create-or-replace roster import
//! - [`classify`] - Field keywords and text normalization
//! - [`facets`] - Filter option indexing
//! - [`filter`] - Conjunctive row filtering
//! - [`export`] - CSV re-export
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Ingestion and storage
pub mod importer;
pub mod parser;
pub mod store;

// Querying
pub mod classify;
pub mod facets;
pub mod filter;

// Output
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{ExportError, ImportError, IngestError, ServerError, StoreError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Roster, RosterId, RosterKind, Row, RowFields, RowId};

// =============================================================================
// Re-exports - Ingestion
// =============================================================================

pub use parser::{decode_content, ingest, ingest_file, sniff_delimiter, CsvRows, Encoding, IngestedCsv};

// =============================================================================
// Re-exports - Store and import
// =============================================================================

pub use importer::{commit, import_rows, prepare, ImportAction, ImportOutcome, ImportPlan, ImportRequest};
pub use store::{RecordStore, Transaction};

// =============================================================================
// Re-exports - Facets, filters, export
// =============================================================================

pub use export::{export_csv, export_filename, export_headers};
pub use facets::{index_facets, FacetIndex};
pub use filter::{filter_rows, FilterSet, Predicate};

// =============================================================================
// Re-exports - Config and server
// =============================================================================

pub use config::AppConfig;

pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
