//! Matrix, position, upload and auxiliary block persistence.
//!
//! # Responsibility
//! - Create and load matrices with their JSON option bag.
//! - Link taxa and characters to a matrix with append-only positions.
//! - Record upload audit rows and the raw blocks they carried.
//!
//! # Invariants
//! - New positions are `current max + 1`; existing positions are never
//!   renumbered. Callers serialise imports per matrix.
//! - Linking an already-linked taxon/character is a no-op.

use crate::model::character::CharacterId;
use crate::model::matrix::{Matrix, MatrixId, MatrixOptions, MatrixType, NewMatrix};
use crate::model::taxon::{TaxonId, TaxonRank};
use crate::model::upload::{UploadBlock, UploadFile};
use crate::repo::{bool_to_int, ensure_connection_ready, invalid_code, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const MATRIX_SELECT_SQL: &str = "SELECT
    matrix_id,
    project_id,
    user_id,
    title,
    notes,
    otu,
    type,
    published,
    options
FROM matrices";

/// Audit record of one imported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileUpload<'a> {
    pub matrix_id: MatrixId,
    pub user_id: i64,
    pub format: &'a str,
    pub otu: TaxonRank,
    pub notes: Option<&'a str>,
    pub file: &'a UploadFile,
}

/// Which side of the matrix a position row orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Taxa,
    Characters,
}

impl Axis {
    fn table(self) -> &'static str {
        match self {
            Self::Taxa => "matrix_taxa_order",
            Self::Characters => "matrix_character_order",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Taxa => "taxon_id",
            Self::Characters => "character_id",
        }
    }
}

pub trait MatrixRepository {
    fn create_matrix(&self, matrix: &NewMatrix) -> RepoResult<Matrix>;
    fn get_matrix(&self, matrix_id: MatrixId) -> RepoResult<Option<Matrix>>;
    /// Links a taxon at the next row position; returns `false` when it was
    /// already linked.
    fn link_taxon(&self, matrix_id: MatrixId, taxon_id: TaxonId, user_id: i64) -> RepoResult<bool>;
    /// Links a character at the next column position; returns `false` when
    /// it was already linked.
    fn link_character(
        &self,
        matrix_id: MatrixId,
        character_id: CharacterId,
        user_id: i64,
    ) -> RepoResult<bool>;
    fn create_upload(&self, upload: &NewFileUpload<'_>) -> RepoResult<i64>;
    fn create_block(
        &self,
        matrix_id: MatrixId,
        upload_id: i64,
        block: &UploadBlock,
    ) -> RepoResult<i64>;
    /// Preserved blocks in upload order.
    fn list_blocks(&self, matrix_id: MatrixId) -> RepoResult<Vec<UploadBlock>>;
}

/// SQLite-backed matrix repository.
pub struct SqliteMatrixRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMatrixRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                "matrices",
                "matrix_taxa_order",
                "matrix_character_order",
                "matrix_file_uploads",
                "matrix_additional_blocks",
            ],
        )?;
        Ok(Self { conn })
    }

    fn link(&self, matrix_id: MatrixId, id: i64, user_id: i64, axis: Axis) -> RepoResult<bool> {
        let linked: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(
                    SELECT 1 FROM {table} WHERE matrix_id = ?1 AND {column} = ?2
                );",
                table = axis.table(),
                column = axis.column(),
            ),
            params![matrix_id, id],
            |row| row.get(0),
        )?;
        if linked == 1 {
            return Ok(false);
        }

        let position = self.next_position(matrix_id, axis)?;
        self.conn.execute(
            &format!(
                "INSERT INTO {table} (matrix_id, {column}, user_id, position)
                 VALUES (?1, ?2, ?3, ?4);",
                table = axis.table(),
                column = axis.column(),
            ),
            params![matrix_id, id, user_id, position],
        )?;
        Ok(true)
    }

    fn next_position(&self, matrix_id: MatrixId, axis: Axis) -> RepoResult<i64> {
        let next = self.conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM {table} WHERE matrix_id = ?1;",
                table = axis.table(),
            ),
            [matrix_id],
            |row| row.get(0),
        )?;
        Ok(next)
    }
}

impl MatrixRepository for SqliteMatrixRepository<'_> {
    fn create_matrix(&self, matrix: &NewMatrix) -> RepoResult<Matrix> {
        let options = serde_json::to_string(&matrix.options)
            .map_err(|err| RepoError::InvalidData(format!("matrix options: {err}")))?;
        self.conn.execute(
            "INSERT INTO matrices (project_id, user_id, title, notes, otu, type, published, options)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                matrix.project_id,
                matrix.user_id,
                matrix.title.as_str(),
                matrix.notes.as_deref(),
                matrix.otu.field_name(),
                matrix.kind.to_db(),
                bool_to_int(matrix.published),
                options,
            ],
        )?;

        let matrix_id = self.conn.last_insert_rowid();
        self.get_matrix(matrix_id)?.ok_or(RepoError::NotFound {
            entity: "matrix",
            id: matrix_id,
        })
    }

    fn get_matrix(&self, matrix_id: MatrixId) -> RepoResult<Option<Matrix>> {
        let sql = format!("{MATRIX_SELECT_SQL} WHERE matrix_id = ?1;");
        let raw = self
            .conn
            .query_row(&sql, [matrix_id], RawMatrix::from_row)
            .optional()?;
        raw.map(RawMatrix::into_matrix).transpose()
    }

    fn link_taxon(&self, matrix_id: MatrixId, taxon_id: TaxonId, user_id: i64) -> RepoResult<bool> {
        self.link(matrix_id, taxon_id, user_id, Axis::Taxa)
    }

    fn link_character(
        &self,
        matrix_id: MatrixId,
        character_id: CharacterId,
        user_id: i64,
    ) -> RepoResult<bool> {
        self.link(matrix_id, character_id, user_id, Axis::Characters)
    }

    fn create_upload(&self, upload: &NewFileUpload<'_>) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO matrix_file_uploads (
                matrix_id,
                user_id,
                format,
                otu,
                notes,
                file_name,
                file_content
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                upload.matrix_id,
                upload.user_id,
                upload.format,
                upload.otu.field_name(),
                upload.notes,
                upload.file.file_name.as_str(),
                upload.file.content.as_slice(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_block(
        &self,
        matrix_id: MatrixId,
        upload_id: i64,
        block: &UploadBlock,
    ) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO matrix_additional_blocks (matrix_id, upload_id, name, content)
             VALUES (?1, ?2, ?3, ?4);",
            params![matrix_id, upload_id, block.name.as_str(), block.content.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_blocks(&self, matrix_id: MatrixId) -> RepoResult<Vec<UploadBlock>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, content
             FROM matrix_additional_blocks
             WHERE matrix_id = ?1
             ORDER BY block_id ASC;",
        )?;
        let blocks = stmt
            .query_map([matrix_id], |row| {
                Ok(UploadBlock {
                    name: row.get("name")?,
                    content: row.get("content")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(blocks)
    }
}

/// Matrix row before code columns are validated.
struct RawMatrix {
    matrix_id: MatrixId,
    project_id: i64,
    user_id: i64,
    title: String,
    notes: Option<String>,
    otu: String,
    kind: i64,
    published: i64,
    options: String,
}

impl RawMatrix {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            matrix_id: row.get("matrix_id")?,
            project_id: row.get("project_id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            notes: row.get("notes")?,
            otu: row.get("otu")?,
            kind: row.get("type")?,
            published: row.get("published")?,
            options: row.get("options")?,
        })
    }

    fn into_matrix(self) -> RepoResult<Matrix> {
        let otu = TaxonRank::from_field_name(&self.otu)
            .ok_or_else(|| invalid_code("matrices.otu", &self.otu))?;
        let kind =
            MatrixType::from_db(self.kind).ok_or_else(|| invalid_code("matrices.type", self.kind))?;
        let options: MatrixOptions = serde_json::from_str(&self.options)
            .map_err(|err| RepoError::InvalidData(format!("matrices.options: {err}")))?;

        Ok(Matrix {
            matrix_id: self.matrix_id,
            project_id: self.project_id,
            user_id: self.user_id,
            title: self.title,
            notes: self.notes,
            otu,
            kind,
            published: self.published == 1,
            options,
        })
    }
}
