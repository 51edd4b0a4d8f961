//! Taxon persistence keyed by project-scoped name hash.
//!
//! # Invariants
//! - Within one project no two taxa share a `name_hash` (enforced by a
//!   unique index).
//! - Rank fields are stored as one JSON document; the hash column is always
//!   recomputed from it on insert.

use crate::model::matrix::MatrixId;
use crate::model::taxon::{NewTaxon, Taxon, TaxonId, TaxonNames};
use crate::repo::{bool_to_int, ensure_connection_ready, placeholders, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

const TAXON_SELECT_SQL: &str = "SELECT
    t.taxon_id AS taxon_id,
    t.project_id AS project_id,
    t.names AS names,
    t.is_extinct AS is_extinct,
    t.notes AS notes,
    t.name_hash AS name_hash
FROM taxa t";

pub trait TaxonRepository {
    /// Loads a taxon only when it belongs to `project_id`.
    fn get_project_taxon(&self, project_id: i64, taxon_id: TaxonId) -> RepoResult<Option<Taxon>>;
    /// Batch lookup of project taxa by name hash.
    fn find_by_hashes(
        &self,
        project_id: i64,
        hashes: &[String],
    ) -> RepoResult<HashMap<String, Taxon>>;
    fn create_taxon(&self, taxon: &NewTaxon) -> RepoResult<Taxon>;
    /// Overwrites the extinct flag and notes; names are never touched.
    fn update_taxon_details(
        &self,
        taxon_id: TaxonId,
        is_extinct: bool,
        notes: Option<&str>,
    ) -> RepoResult<()>;
    /// Taxa of a matrix in row order.
    fn list_matrix_taxa(&self, matrix_id: MatrixId) -> RepoResult<Vec<Taxon>>;
}

/// SQLite-backed taxon repository.
pub struct SqliteTaxonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaxonRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["taxa", "matrix_taxa_order"])?;
        Ok(Self { conn })
    }

    fn get_taxon(&self, taxon_id: TaxonId) -> RepoResult<Option<Taxon>> {
        let sql = format!("{TAXON_SELECT_SQL} WHERE t.taxon_id = ?1;");
        let raw = self
            .conn
            .query_row(&sql, [taxon_id], RawTaxon::from_row)
            .optional()?;
        raw.map(RawTaxon::into_taxon).transpose()
    }
}

impl TaxonRepository for SqliteTaxonRepository<'_> {
    fn get_project_taxon(&self, project_id: i64, taxon_id: TaxonId) -> RepoResult<Option<Taxon>> {
        let sql = format!("{TAXON_SELECT_SQL} WHERE t.taxon_id = ?1 AND t.project_id = ?2;");
        let raw = self
            .conn
            .query_row(&sql, params![taxon_id, project_id], RawTaxon::from_row)
            .optional()?;
        raw.map(RawTaxon::into_taxon).transpose()
    }

    fn find_by_hashes(
        &self,
        project_id: i64,
        hashes: &[String],
    ) -> RepoResult<HashMap<String, Taxon>> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "{TAXON_SELECT_SQL} WHERE t.project_id = ?1 AND t.name_hash IN ({});",
            placeholders(2, hashes.len())
        );
        let mut values = Vec::with_capacity(hashes.len() + 1);
        values.push(Value::Integer(project_id));
        values.extend(hashes.iter().map(|hash| Value::Text(hash.clone())));

        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params_from_iter(values), RawTaxon::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut found = HashMap::with_capacity(raws.len());
        for raw in raws {
            let taxon = raw.into_taxon()?;
            found.insert(taxon.name_hash.clone(), taxon);
        }
        Ok(found)
    }

    fn create_taxon(&self, taxon: &NewTaxon) -> RepoResult<Taxon> {
        let names = serde_json::to_string(&taxon.names)
            .map_err(|err| RepoError::InvalidData(format!("taxon names: {err}")))?;
        self.conn.execute(
            "INSERT INTO taxa (project_id, user_id, names, is_extinct, notes, name_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                taxon.project_id,
                taxon.user_id,
                names,
                bool_to_int(taxon.is_extinct),
                taxon.notes.as_deref(),
                taxon.names.name_hash(),
            ],
        )?;

        let taxon_id = self.conn.last_insert_rowid();
        self.get_taxon(taxon_id)?.ok_or(RepoError::NotFound {
            entity: "taxon",
            id: taxon_id,
        })
    }

    fn update_taxon_details(
        &self,
        taxon_id: TaxonId,
        is_extinct: bool,
        notes: Option<&str>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE taxa
             SET is_extinct = ?2,
                 notes = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE taxon_id = ?1;",
            params![taxon_id, bool_to_int(is_extinct), notes],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "taxon",
                id: taxon_id,
            });
        }
        Ok(())
    }

    fn list_matrix_taxa(&self, matrix_id: MatrixId) -> RepoResult<Vec<Taxon>> {
        let sql = format!(
            "{TAXON_SELECT_SQL}
             JOIN matrix_taxa_order o ON o.taxon_id = t.taxon_id
             WHERE o.matrix_id = ?1
             ORDER BY o.position ASC, o.order_id ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map([matrix_id], RawTaxon::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawTaxon::into_taxon).collect()
    }
}

struct RawTaxon {
    taxon_id: TaxonId,
    project_id: i64,
    names: String,
    is_extinct: i64,
    notes: Option<String>,
    name_hash: String,
}

impl RawTaxon {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            taxon_id: row.get("taxon_id")?,
            project_id: row.get("project_id")?,
            names: row.get("names")?,
            is_extinct: row.get("is_extinct")?,
            notes: row.get("notes")?,
            name_hash: row.get("name_hash")?,
        })
    }

    fn into_taxon(self) -> RepoResult<Taxon> {
        let names: TaxonNames = serde_json::from_str(&self.names).map_err(|err| {
            RepoError::InvalidData(format!("taxa.names of taxon {}: {err}", self.taxon_id))
        })?;
        Ok(Taxon {
            taxon_id: self.taxon_id,
            project_id: self.project_id,
            names,
            is_extinct: self.is_extinct == 1,
            notes: self.notes,
            name_hash: self.name_hash,
        })
    }
}
