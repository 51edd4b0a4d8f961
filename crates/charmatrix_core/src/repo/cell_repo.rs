//! Cell and cell-note persistence.
//!
//! # Invariants
//! - Cells of one `(taxon, character)` pair are loaded in insertion order so
//!   the first stored entry keeps deciding multi-state brackets.
//! - A `(matrix, taxon, character)` triple has at most one note row.

use crate::codec::cell_table::CellTable;
use crate::model::cell::{Cell, CellNote, NewCell, NewCellNote};
use crate::model::matrix::MatrixId;
use crate::repo::{bool_to_int, ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const NOTE_SELECT_SQL: &str = "SELECT
    note_id,
    matrix_id,
    taxon_id,
    character_id,
    notes
FROM cell_notes";

pub trait CellRepository {
    /// Every cell of the matrix grouped by pair.
    fn load_cell_table(&self, matrix_id: MatrixId) -> RepoResult<CellTable>;
    /// Inserts a batch of cells and returns them with their new ids.
    fn insert_cells(&self, cells: &[NewCell]) -> RepoResult<Vec<Cell>>;
    fn list_cell_notes(&self, matrix_id: MatrixId) -> RepoResult<Vec<CellNote>>;
    fn create_cell_note(&self, note: &NewCellNote) -> RepoResult<CellNote>;
    fn update_cell_note(&self, note_id: i64, notes: &str) -> RepoResult<()>;
}

/// SQLite-backed cell repository.
pub struct SqliteCellRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCellRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["cells", "cell_notes"])?;
        Ok(Self { conn })
    }
}

impl CellRepository for SqliteCellRepository<'_> {
    fn load_cell_table(&self, matrix_id: MatrixId) -> RepoResult<CellTable> {
        let mut stmt = self.conn.prepare(
            "SELECT
                cell_id,
                matrix_id,
                taxon_id,
                character_id,
                state_id,
                is_npa,
                is_uncertain,
                start_value,
                end_value
             FROM cells
             WHERE matrix_id = ?1
             ORDER BY cell_id ASC;",
        )?;
        let cells = stmt
            .query_map([matrix_id], parse_cell_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CellTable::from_cells(cells))
    }

    fn insert_cells(&self, cells: &[NewCell]) -> RepoResult<Vec<Cell>> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO cells (
                matrix_id,
                taxon_id,
                character_id,
                user_id,
                state_id,
                is_npa,
                is_uncertain,
                start_value,
                end_value
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        )?;

        let mut inserted = Vec::with_capacity(cells.len());
        for cell in cells {
            stmt.execute(params![
                cell.matrix_id,
                cell.taxon_id,
                cell.character_id,
                cell.user_id,
                cell.state_id,
                bool_to_int(cell.is_npa),
                bool_to_int(cell.is_uncertain),
                cell.start_value,
                cell.end_value,
            ])?;
            inserted.push(cell.clone().into_cell(self.conn.last_insert_rowid()));
        }
        Ok(inserted)
    }

    fn list_cell_notes(&self, matrix_id: MatrixId) -> RepoResult<Vec<CellNote>> {
        let sql = format!("{NOTE_SELECT_SQL} WHERE matrix_id = ?1 ORDER BY note_id ASC;");
        let mut stmt = self.conn.prepare(&sql)?;
        let notes = stmt
            .query_map([matrix_id], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    fn create_cell_note(&self, note: &NewCellNote) -> RepoResult<CellNote> {
        self.conn.execute(
            "INSERT INTO cell_notes (matrix_id, taxon_id, character_id, user_id, notes)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                note.matrix_id,
                note.taxon_id,
                note.character_id,
                note.user_id,
                note.notes.as_str(),
            ],
        )?;
        Ok(CellNote {
            note_id: self.conn.last_insert_rowid(),
            matrix_id: note.matrix_id,
            taxon_id: note.taxon_id,
            character_id: note.character_id,
            notes: note.notes.clone(),
        })
    }

    fn update_cell_note(&self, note_id: i64, notes: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE cell_notes
             SET notes = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE note_id = ?1;",
            params![note_id, notes],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "cell note",
                id: note_id,
            });
        }
        Ok(())
    }
}

fn parse_cell_row(row: &Row<'_>) -> rusqlite::Result<Cell> {
    Ok(Cell {
        cell_id: row.get("cell_id")?,
        matrix_id: row.get("matrix_id")?,
        taxon_id: row.get("taxon_id")?,
        character_id: row.get("character_id")?,
        state_id: row.get("state_id")?,
        is_npa: row.get::<_, i64>("is_npa")? == 1,
        is_uncertain: row.get::<_, i64>("is_uncertain")? == 1,
        start_value: row.get("start_value")?,
        end_value: row.get("end_value")?,
    })
}

fn parse_note_row(row: &Row<'_>) -> rusqlite::Result<CellNote> {
    Ok(CellNote {
        note_id: row.get("note_id")?,
        matrix_id: row.get("matrix_id")?,
        taxon_id: row.get("taxon_id")?,
        character_id: row.get("character_id")?,
        notes: row.get("notes")?,
    })
}
