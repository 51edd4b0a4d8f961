//! Matrix export use-cases.
//!
//! # Responsibility
//! - Build the `ExportOptions` snapshot from persisted rows.
//! - Run exactly one exporter over a caller-supplied sink.
//! - Derive export filenames.
//!
//! # Invariants
//! - The snapshot is fully loaded before the exporter writes its first
//!   chunk; exporters never touch storage.

use crate::export::{exporter_for, ExportFlags, ExportFormat, ExportOptions};
use crate::model::matrix::MatrixId;
use crate::repo::cell_repo::{CellRepository, SqliteCellRepository};
use crate::repo::character_repo::{CharacterRepository, SqliteCharacterRepository};
use crate::repo::matrix_repo::{MatrixRepository, SqliteMatrixRepository};
use crate::repo::taxon_repo::{SqliteTaxonRepository, TaxonRepository};
use crate::repo::RepoError;
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug)]
pub enum ExportError {
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Export target does not exist.
    MatrixNotFound(MatrixId),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::MatrixNotFound(matrix_id) => write!(f, "matrix not found: {matrix_id}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::MatrixNotFound(_) => None,
        }
    }
}

impl From<RepoError> for ExportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Loads everything an exporter needs for one matrix.
pub fn load_export_options(
    conn: &Connection,
    matrix_id: MatrixId,
    flags: ExportFlags,
) -> ExportResult<ExportOptions> {
    let matrices = SqliteMatrixRepository::try_new(conn)?;
    let matrix = matrices
        .get_matrix(matrix_id)?
        .ok_or(ExportError::MatrixNotFound(matrix_id))?;

    let taxa = SqliteTaxonRepository::try_new(conn)?.list_matrix_taxa(matrix_id)?;
    let characters = SqliteCharacterRepository::try_new(conn)?;
    let cells = SqliteCellRepository::try_new(conn)?;

    Ok(ExportOptions {
        taxa,
        characters: characters.list_matrix_characters(matrix_id)?,
        cells: cells.load_cell_table(matrix_id)?,
        cell_notes: cells.list_cell_notes(matrix_id)?,
        blocks: matrices.list_blocks(matrix_id)?,
        rules: characters.list_matrix_rules(matrix_id)?,
        matrix,
        flags,
    })
}

/// Exports one matrix in `format` into `sink`.
///
/// # Side effects
/// - Emits `matrix_export` logging events with counts and duration.
pub fn export_matrix<S: FnMut(&str)>(
    conn: &Connection,
    matrix_id: MatrixId,
    format: ExportFormat,
    flags: ExportFlags,
    sink: S,
) -> ExportResult<()> {
    let started_at = Instant::now();
    let options = match load_export_options(conn, matrix_id, flags) {
        Ok(options) => options,
        Err(err) => {
            error!(
                "event=matrix_export module=service status=error format={format} matrix_id={matrix_id} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }
    };

    exporter_for(format, sink).export(&options);
    info!(
        "event=matrix_export module=service status=ok format={format} matrix_id={matrix_id} taxa={} characters={} cells={} duration_ms={}",
        options.taxa.len(),
        options.characters.len(),
        options.cells.cell_count(),
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// `<prefix>_M<id>_<YYYY-MM-DD-HHMMSS>.<ext>` with a UTC timestamp.
pub fn export_file_name(
    prefix: &str,
    matrix_id: MatrixId,
    format: ExportFormat,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{prefix}_M{matrix_id}_{}.{}",
        at.format("%Y-%m-%d-%H%M%S"),
        format.extension()
    )
}
