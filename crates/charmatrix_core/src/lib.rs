//! Phylogenetic character matrix interchange core.
//!
//! Exports persisted matrices to NEXUS, TNT, NeXML and plain-text listings,
//! and imports/merges parsed upload objects into the SQLite store.

pub mod codec;
pub mod db;
pub mod export;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use codec::cell_table::CellTable;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use export::{ExportFlags, ExportFormat, ExportOptions, Exporter};
pub use logging::{default_log_level, init_logging, logging_status};
pub use repo::{RepoError, RepoResult};
pub use service::export_service::{
    export_file_name, export_matrix, load_export_options, ExportError, ExportResult,
};
pub use service::import_service::{
    ImportError, ImportReport, ImportRequest, ImportResult, MatrixImportService,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
