//! Matrix import and merge use-cases.
//!
//! # Responsibility
//! - Reconcile an uploaded matrix object against stored taxa, characters,
//!   states, positions, cells and cell notes.
//! - Record an upload audit row with the original file and keep auxiliary
//!   blocks for later re-emission.
//!
//! # Invariants
//! - One import runs in one `IMMEDIATE` transaction; any error drops the
//!   transaction and leaves the store unchanged.
//! - A merge into a missing matrix fails before any write.
//! - Re-importing the same upload creates no cells, states, notes or blocks.
//! - Imports into one matrix must be serialised by the caller; positions are
//!   assigned as `current max + 1`.

use crate::codec::cell_table::CellTable;
use crate::codec::symbol::{decode_discrete_score, parse_continuous_score};
use crate::model::cell::{merge_note_text, CellId, CellNote, NewCell, NewCellNote};
use crate::model::character::{
    Character, CharacterId, CharacterType, NewCharacter, NewCharacterState, StateId,
};
use crate::model::matrix::{Matrix, MatrixId, MatrixType, MultistateMode, NewMatrix};
use crate::model::taxon::{taxon_display_name, NewTaxon, Taxon, TaxonId};
use crate::model::upload::{MatrixUpload, UploadCell, UploadCharacter, UploadFile};
use crate::repo::cell_repo::{CellRepository, SqliteCellRepository};
use crate::repo::character_repo::{CharacterRepository, SqliteCharacterRepository};
use crate::repo::matrix_repo::{MatrixRepository, NewFileUpload, SqliteMatrixRepository};
use crate::repo::taxon_repo::{SqliteTaxonRepository, TaxonRepository};
use crate::repo::RepoError;
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ImportResult<T> = Result<T, ImportError>;

/// Fatal import/merge failure; the enclosing transaction is rolled back.
#[derive(Debug)]
pub enum ImportError {
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Merge target does not exist.
    MatrixNotFound(MatrixId),
    /// Stored character type differs from the uploaded one.
    CharacterTypeConflict {
        character_id: CharacterId,
        character_name: String,
        previous_type: CharacterType,
        new_type: CharacterType,
    },
    /// Score symbol cannot be mapped to an ordinal.
    UndecodableSymbol {
        taxon: String,
        character: String,
        symbol: char,
    },
    /// Decoded ordinal has no matching state on the character.
    UnknownState {
        taxon: String,
        character: String,
        symbol: char,
        ordinal: u32,
        available_states: Vec<String>,
    },
    /// Upload object is structurally unusable.
    InvalidUpload(String),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::MatrixNotFound(matrix_id) => write!(f, "matrix not found: {matrix_id}"),
            Self::CharacterTypeConflict {
                character_id,
                character_name,
                previous_type,
                new_type,
            } => write!(
                f,
                "character `{character_name}` ({character_id}) was previously {previous_type} \
                 and cannot be imported as {new_type}"
            ),
            Self::UndecodableSymbol {
                taxon,
                character,
                symbol,
            } => write!(
                f,
                "cannot decode symbol `{symbol}` scored for taxon `{taxon}` on character `{character}`"
            ),
            Self::UnknownState {
                taxon,
                character,
                symbol,
                ordinal,
                available_states,
            } => write!(
                f,
                "symbol `{symbol}` (state {ordinal}) scored for taxon `{taxon}` does not exist on \
                 character `{character}`; available states: [{}]",
                available_states.join(", ")
            ),
            Self::InvalidUpload(message) => write!(f, "invalid upload: {message}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// One upload handed to the importer.
#[derive(Debug)]
pub struct ImportRequest<'a> {
    pub user_id: i64,
    /// Free text recorded on the upload audit row.
    pub notes: Option<&'a str>,
    /// Parsed upload; reconciled taxon/character ids are written back.
    pub upload: &'a mut MatrixUpload,
    pub file: &'a UploadFile,
}

/// Rows created or changed by one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub matrix_id: MatrixId,
    pub created_taxa: Vec<TaxonId>,
    pub updated_taxa: Vec<TaxonId>,
    pub created_characters: Vec<CharacterId>,
    pub updated_characters: Vec<CharacterId>,
    pub created_states: Vec<StateId>,
    pub created_cells: Vec<CellId>,
    pub created_notes: Vec<i64>,
    pub updated_notes: Vec<i64>,
    /// Taxa and characters newly linked to the matrix.
    pub linked_taxa: usize,
    pub linked_characters: usize,
    pub upload_id: i64,
    pub block_ids: Vec<i64>,
}

/// Import/merge facade over one SQLite connection.
pub struct MatrixImportService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> MatrixImportService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Creates a matrix and imports the upload into it.
    pub fn create_and_import(
        &mut self,
        matrix: &NewMatrix,
        request: ImportRequest<'_>,
    ) -> ImportResult<ImportReport> {
        let mut matrix = matrix.clone();
        if request.upload.is_meristic() {
            matrix.kind = MatrixType::Meristic;
        }
        self.run("create", None, request, move |matrices| {
            Ok(matrices.create_matrix(&matrix)?)
        })
    }

    /// Merges the upload into an existing matrix.
    pub fn merge(
        &mut self,
        matrix_id: MatrixId,
        request: ImportRequest<'_>,
    ) -> ImportResult<ImportReport> {
        self.run("merge", Some(matrix_id), request, |matrices| {
            matrices
                .get_matrix(matrix_id)?
                .ok_or(ImportError::MatrixNotFound(matrix_id))
        })
    }

    fn run<F>(
        &mut self,
        mode: &str,
        matrix_id: Option<MatrixId>,
        request: ImportRequest<'_>,
        resolve_matrix: F,
    ) -> ImportResult<ImportReport>
    where
        F: FnOnce(&SqliteMatrixRepository<'_>) -> ImportResult<Matrix>,
    {
        let started_at = Instant::now();
        info!(
            "event=matrix_import module=service status=start mode={mode} matrix_id={} taxa={} characters={}",
            matrix_id.map_or_else(|| "new".to_string(), |id| id.to_string()),
            request.upload.taxa.len(),
            request.upload.characters.len()
        );

        let result = self.run_in_transaction(request, resolve_matrix);
        match &result {
            Ok(report) => info!(
                "event=matrix_import module=service status=ok mode={mode} matrix_id={} duration_ms={} created_taxa={} created_characters={} created_states={} created_cells={} created_notes={} updated_notes={} upload_id={}",
                report.matrix_id,
                started_at.elapsed().as_millis(),
                report.created_taxa.len(),
                report.created_characters.len(),
                report.created_states.len(),
                report.created_cells.len(),
                report.created_notes.len(),
                report.updated_notes.len(),
                report.upload_id
            ),
            Err(err) => error!(
                "event=matrix_import module=service status=error mode={mode} duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                error_code(err),
                err
            ),
        }
        result
    }

    fn run_in_transaction<F>(
        &mut self,
        request: ImportRequest<'_>,
        resolve_matrix: F,
    ) -> ImportResult<ImportReport>
    where
        F: FnOnce(&SqliteMatrixRepository<'_>) -> ImportResult<Matrix>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = {
            let matrices = SqliteMatrixRepository::try_new(&tx)?;
            let matrix = resolve_matrix(&matrices)?;
            let mut reconciler = Reconciler {
                matrix,
                user_id: request.user_id,
                matrices,
                taxa: SqliteTaxonRepository::try_new(&tx)?,
                characters: SqliteCharacterRepository::try_new(&tx)?,
                cells: SqliteCellRepository::try_new(&tx)?,
                report: ImportReport::default(),
            };
            reconciler.reconcile(request)?
        };
        tx.commit()?;
        Ok(report)
    }
}

/// One reconciliation pass over an upload, generic over the persistence
/// collaborators.
struct Reconciler<M, T, C, X> {
    matrix: Matrix,
    user_id: i64,
    matrices: M,
    taxa: T,
    characters: C,
    cells: X,
    report: ImportReport,
}

/// A reconciled upload column.
struct ColumnTarget {
    character: Character,
    /// State ids in the order the upload listed them; ordinals index this.
    incoming_states: Vec<StateId>,
}

/// Cells and note writes collected for one taxon row.
#[derive(Default)]
struct RowBatch {
    cells: Vec<NewCell>,
    notes: Vec<(CharacterId, String)>,
}

impl<M, T, C, X> Reconciler<M, T, C, X>
where
    M: MatrixRepository,
    T: TaxonRepository,
    C: CharacterRepository,
    X: CellRepository,
{
    fn reconcile(&mut self, request: ImportRequest<'_>) -> ImportResult<ImportReport> {
        let upload = request.upload;
        self.report.matrix_id = self.matrix.matrix_id;

        let rows = self.reconcile_taxa(upload)?;
        let columns = self.reconcile_characters(upload)?;
        self.import_cells(upload, &rows, &columns)?;

        self.report.upload_id = self.matrices.create_upload(&NewFileUpload {
            matrix_id: self.matrix.matrix_id,
            user_id: self.user_id,
            format: upload.format.as_str(),
            otu: self.matrix.otu,
            notes: request.notes,
            file: request.file,
        })?;
        let mut stored_blocks = self.matrices.list_blocks(self.matrix.matrix_id)?;
        for block in &upload.blocks {
            if stored_blocks.contains(block) {
                continue;
            }
            stored_blocks.push(block.clone());
            let block_id =
                self.matrices
                    .create_block(self.matrix.matrix_id, self.report.upload_id, block)?;
            self.report.block_ids.push(block_id);
        }

        Ok(std::mem::take(&mut self.report))
    }

    /// Resolves every upload row to a stored taxon linked to the matrix.
    fn reconcile_taxa(&mut self, upload: &mut MatrixUpload) -> ImportResult<Vec<(TaxonId, String)>> {
        let project_id = self.matrix.project_id;
        let mut resolved: Vec<Option<TaxonId>> = vec![None; upload.taxa.len()];
        let mut pending: Vec<(usize, String)> = Vec::new();

        for (row, incoming) in upload.taxa.iter().enumerate() {
            if let Some(taxon_id) = incoming.taxon_id {
                if let Some(existing) = self.taxa.get_project_taxon(project_id, taxon_id)? {
                    let notes = non_blank(incoming.notes.as_deref()).or(existing.notes.as_deref());
                    if existing.is_extinct != incoming.is_extinct
                        || existing.notes.as_deref() != notes
                    {
                        self.taxa
                            .update_taxon_details(taxon_id, incoming.is_extinct, notes)?;
                        self.report.updated_taxa.push(taxon_id);
                    }
                    resolved[row] = Some(taxon_id);
                    continue;
                }
            }

            if incoming.names.is_empty() {
                return Err(ImportError::InvalidUpload(format!(
                    "taxon at row {} has no name fields",
                    row + 1
                )));
            }
            pending.push((row, incoming.names.name_hash()));
        }

        let mut hashes: Vec<String> = pending.iter().map(|(_, hash)| hash.clone()).collect();
        hashes.sort_unstable();
        hashes.dedup();
        let mut known = self.taxa.find_by_hashes(project_id, &hashes)?;

        for (row, hash) in pending {
            let taxon_id = match known.get(&hash) {
                Some(taxon) => taxon.taxon_id,
                None => {
                    let incoming = &upload.taxa[row];
                    let taxon = self.taxa.create_taxon(&NewTaxon {
                        project_id,
                        user_id: self.user_id,
                        names: incoming.names.clone(),
                        is_extinct: incoming.is_extinct,
                        notes: non_blank(incoming.notes.as_deref()).map(str::to_string),
                    })?;
                    self.report.created_taxa.push(taxon.taxon_id);
                    let taxon_id = taxon.taxon_id;
                    known.insert(hash, taxon);
                    taxon_id
                }
            };
            resolved[row] = Some(taxon_id);
        }

        let mut rows = Vec::with_capacity(resolved.len());
        for (row, taxon_id) in resolved.into_iter().enumerate() {
            let Some(taxon_id) = taxon_id else {
                continue;
            };
            let incoming = &mut upload.taxa[row];
            incoming.taxon_id = Some(taxon_id);
            if self
                .matrices
                .link_taxon(self.matrix.matrix_id, taxon_id, self.user_id)?
            {
                self.report.linked_taxa += 1;
            }
            let label = taxon_display_name(
                &Taxon {
                    taxon_id,
                    project_id,
                    names: incoming.names.clone(),
                    is_extinct: incoming.is_extinct,
                    notes: None,
                    name_hash: String::new(),
                },
                self.matrix.otu,
                false,
            );
            rows.push((taxon_id, label));
        }
        Ok(rows)
    }

    /// Resolves every upload column to a stored character linked to the
    /// matrix, creating missing states. Columns without an id match a linked
    /// character of the same name, each linked character at most once.
    fn reconcile_characters(&mut self, upload: &mut MatrixUpload) -> ImportResult<Vec<ColumnTarget>> {
        let project_id = self.matrix.project_id;
        let default_kind = if upload.is_meristic() {
            CharacterType::Meristic
        } else {
            CharacterType::Discrete
        };

        // Linked characters not yet claimed by an upload column.
        let mut unclaimed = self
            .characters
            .list_matrix_characters(self.matrix.matrix_id)?;

        let mut columns = Vec::with_capacity(upload.characters.len());
        for incoming in upload.characters.iter_mut() {
            let kind = incoming.kind_or(default_kind);
            let name = incoming.name.trim().to_string();
            let description = non_blank(incoming.note.as_deref());

            let known = match incoming.character_id {
                Some(character_id) => self
                    .characters
                    .get_project_character(project_id, character_id)?,
                None => unclaimed
                    .iter()
                    .position(|linked| linked.name == name)
                    .map(|index| unclaimed.remove(index)),
            };
            let mut character = match known {
                Some(mut existing) => {
                    if existing.kind != kind {
                        return Err(ImportError::CharacterTypeConflict {
                            character_id: existing.character_id,
                            character_name: existing.name,
                            previous_type: existing.kind,
                            new_type: kind,
                        });
                    }
                    let description = description
                        .map(str::to_string)
                        .or_else(|| existing.description.clone());
                    if existing.name != name || existing.description != description {
                        self.characters.update_character(
                            existing.character_id,
                            &name,
                            description.as_deref(),
                        )?;
                        existing.name = name;
                        existing.description = description;
                        self.report.updated_characters.push(existing.character_id);
                    }
                    existing
                }
                None => {
                    let created = self.characters.create_character(&NewCharacter {
                        project_id,
                        user_id: self.user_id,
                        name,
                        description: description.map(str::to_string),
                        ordering: incoming.ordering,
                        kind,
                    })?;
                    self.report.created_characters.push(created.character_id);
                    created
                }
            };
            incoming.character_id = Some(character.character_id);
            unclaimed.retain(|linked| linked.character_id != character.character_id);

            if self.matrices.link_character(
                self.matrix.matrix_id,
                character.character_id,
                self.user_id,
            )? {
                self.report.linked_characters += 1;
            }

            let incoming_states = self.reconcile_states(&mut character, incoming)?;
            columns.push(ColumnTarget {
                character,
                incoming_states,
            });
        }
        Ok(columns)
    }

    /// Matches incoming states by name; unmatched ones are appended with the
    /// next free ordinal.
    fn reconcile_states(
        &mut self,
        character: &mut Character,
        incoming: &UploadCharacter,
    ) -> ImportResult<Vec<StateId>> {
        let mut incoming_states = Vec::with_capacity(incoming.states.len());
        for state in &incoming.states {
            let name = state.name.trim();
            let note = non_blank(state.note.as_deref());

            if let Some(existing) = character
                .states
                .iter_mut()
                .find(|existing| existing.name == name)
            {
                if let Some(note) = note {
                    if existing.description.as_deref() != Some(note) {
                        self.characters
                            .update_state_description(existing.state_id, note)?;
                        existing.description = Some(note.to_string());
                    }
                }
                incoming_states.push(existing.state_id);
                continue;
            }

            let created = self.characters.create_state(&NewCharacterState {
                character_id: character.character_id,
                user_id: self.user_id,
                name: name.to_string(),
                description: note.map(str::to_string),
                num: character.next_state_num(),
            })?;
            self.report.created_states.push(created.state_id);
            incoming_states.push(created.state_id);
            character.states.push(created);
        }
        Ok(incoming_states)
    }

    fn import_cells(
        &mut self,
        upload: &MatrixUpload,
        rows: &[(TaxonId, String)],
        columns: &[ColumnTarget],
    ) -> ImportResult<()> {
        let matrix_id = self.matrix.matrix_id;
        let mut table = self.cells.load_cell_table(matrix_id)?;
        let mut notes: HashMap<(TaxonId, CharacterId), CellNote> = self
            .cells
            .list_cell_notes(matrix_id)?
            .into_iter()
            .map(|note| ((note.taxon_id, note.character_id), note))
            .collect();

        for (row, (taxon_id, taxon_label)) in rows.iter().enumerate() {
            let mut batch = RowBatch::default();
            for (column, target) in columns.iter().enumerate() {
                let Some(cell) = upload.cell(row, column) else {
                    continue;
                };
                if let Some(note) = non_blank(cell.note()) {
                    batch
                        .notes
                        .push((target.character.character_id, note.to_string()));
                }
                let scores = cell.scores().trim();
                if scores.is_empty() {
                    continue;
                }

                let pair = PairContext {
                    matrix_id,
                    user_id: self.user_id,
                    taxon_id: *taxon_id,
                    taxon_label,
                    target,
                };
                if target.character.kind.is_numeric() {
                    pair.decode_numeric(scores, upload, &table, &mut batch);
                } else {
                    let uncertain = self.is_uncertain(cell, scores);
                    pair.decode_discrete(scores, uncertain, upload, &table, &mut batch)?;
                }
            }

            if !batch.cells.is_empty() {
                let inserted = self.cells.insert_cells(&batch.cells)?;
                self.report
                    .created_cells
                    .extend(inserted.iter().map(|cell| cell.cell_id));
                table.extend(inserted);
            }
            for (character_id, text) in batch.notes {
                self.write_note(&mut notes, *taxon_id, character_id, &text)?;
            }
        }
        Ok(())
    }

    /// Uncertain vs polymorphic for a multi-symbol score string.
    fn is_uncertain(&self, cell: &UploadCell, scores: &str) -> bool {
        match scores.chars().next() {
            Some('{') => true,
            Some('(') | Some('[') => false,
            _ => cell.uncertain_flag().unwrap_or(
                self.matrix.options.default_multistate_mode == MultistateMode::Uncertain,
            ),
        }
    }

    fn write_note(
        &mut self,
        notes: &mut HashMap<(TaxonId, CharacterId), CellNote>,
        taxon_id: TaxonId,
        character_id: CharacterId,
        text: &str,
    ) -> ImportResult<()> {
        let key = (taxon_id, character_id);
        let current = notes.get(&key).map(|note| note.notes.as_str());
        let Some(merged) = merge_note_text(current, text) else {
            return Ok(());
        };

        if let Some(note) = notes.get_mut(&key) {
            self.cells.update_cell_note(note.note_id, &merged)?;
            self.report.updated_notes.push(note.note_id);
            note.notes = merged;
        } else {
            let note = self.cells.create_cell_note(&NewCellNote {
                matrix_id: self.matrix.matrix_id,
                taxon_id,
                character_id,
                user_id: self.user_id,
                notes: merged,
            })?;
            self.report.created_notes.push(note.note_id);
            notes.insert(key, note);
        }
        Ok(())
    }
}

/// One `(taxon, character)` pair being decoded.
struct PairContext<'a> {
    matrix_id: MatrixId,
    user_id: i64,
    taxon_id: TaxonId,
    taxon_label: &'a str,
    target: &'a ColumnTarget,
}

impl PairContext<'_> {
    fn character_id(&self) -> CharacterId {
        self.target.character.character_id
    }

    fn decode_numeric(
        &self,
        scores: &str,
        upload: &MatrixUpload,
        table: &CellTable,
        batch: &mut RowBatch,
    ) {
        if scores.chars().all(|symbol| symbol == upload.parameters.missing_symbol()) {
            return;
        }
        let Some(score) = parse_continuous_score(scores) else {
            return;
        };
        if score.is_empty() {
            return;
        }

        let character_id = self.character_id();
        let duplicate = table.has_values(self.taxon_id, character_id, score.start, score.end)
            || batch.cells.iter().any(|cell| {
                cell.character_id == character_id
                    && cell.start_value == score.start
                    && cell.end_value == score.end
            });
        if !duplicate {
            batch.cells.push(NewCell::values(
                self.matrix_id,
                self.taxon_id,
                character_id,
                self.user_id,
                score.start,
                score.end,
            ));
        }
    }

    fn decode_discrete(
        &self,
        scores: &str,
        uncertain: bool,
        upload: &MatrixUpload,
        table: &CellTable,
        batch: &mut RowBatch,
    ) -> ImportResult<()> {
        let missing = upload.parameters.missing_symbol();
        let gap = upload.parameters.gap_symbol();
        let explicit_alphabet = upload.parameters.symbols();
        let character_id = self.character_id();

        let symbols: Vec<char> = scores
            .chars()
            .filter(|symbol| !is_score_separator(*symbol))
            .collect();
        let multi = symbols.len() > 1;
        let mut seen_states: HashSet<StateId> = HashSet::new();
        let mut seen_gap = false;

        for symbol in symbols {
            if same_symbol(symbol, missing) {
                continue;
            }
            if same_symbol(symbol, gap) || symbol == '-' || symbol == '–' {
                if !seen_gap && !table.has_gap(self.taxon_id, character_id) {
                    batch.cells.push(NewCell::gap(
                        self.matrix_id,
                        self.taxon_id,
                        character_id,
                        self.user_id,
                    ));
                }
                seen_gap = true;
                continue;
            }

            let Some(ordinal) = decode_discrete_score(symbol, explicit_alphabet) else {
                error!(
                    "event=cell_decode module=service status=error error_code=undecodable_symbol matrix_id={} taxon_id={} character_id={} taxon={:?} character={:?} symbol={:?}",
                    self.matrix_id, self.taxon_id, character_id, self.taxon_label, self.target.character.name, symbol
                );
                return Err(ImportError::UndecodableSymbol {
                    taxon: self.taxon_label.to_string(),
                    character: self.target.character.name.clone(),
                    symbol,
                });
            };

            let Some(state_id) = self.state_for_ordinal(ordinal) else {
                let available_states = self.available_states();
                error!(
                    "event=cell_decode module=service status=error error_code=unknown_state matrix_id={} taxon_id={} character_id={} taxon={:?} character={:?} symbol={:?} ordinal={} available_states={:?}",
                    self.matrix_id, self.taxon_id, character_id, self.taxon_label, self.target.character.name, symbol, ordinal, available_states
                );
                return Err(ImportError::UnknownState {
                    taxon: self.taxon_label.to_string(),
                    character: self.target.character.name.clone(),
                    symbol,
                    ordinal,
                    available_states,
                });
            };

            if seen_states.insert(state_id) && !table.has_state(self.taxon_id, character_id, state_id)
            {
                batch.cells.push(NewCell::state(
                    self.matrix_id,
                    self.taxon_id,
                    character_id,
                    self.user_id,
                    state_id,
                    multi && uncertain,
                ));
            }
        }
        Ok(())
    }

    /// Ordinals index the upload's own state list; without one they fall
    /// back to stored ordinals.
    fn state_for_ordinal(&self, ordinal: u32) -> Option<StateId> {
        if self.target.incoming_states.is_empty() {
            return self
                .target
                .character
                .state_by_num(ordinal)
                .map(|state| state.state_id);
        }
        usize::try_from(ordinal)
            .ok()
            .and_then(|index| self.target.incoming_states.get(index))
            .copied()
    }

    fn available_states(&self) -> Vec<String> {
        if self.target.incoming_states.is_empty() {
            return self
                .target
                .character
                .states
                .iter()
                .map(|state| format!("{}={}", state.num, state.name))
                .collect();
        }
        self.target
            .incoming_states
            .iter()
            .enumerate()
            .filter_map(|(index, state_id)| {
                self.target
                    .character
                    .state_by_id(*state_id)
                    .map(|state| format!("{index}={}", state.name))
            })
            .collect()
    }
}

fn is_score_separator(symbol: char) -> bool {
    matches!(
        symbol,
        '{' | '}' | '(' | ')' | '[' | ']' | '&' | '/' | ',' | ' ' | '\t'
    )
}

/// Case-insensitive symbol comparison for format markers.
fn same_symbol(left: char, right: char) -> bool {
    left.to_lowercase().eq(right.to_lowercase())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn error_code(err: &ImportError) -> &'static str {
    match err {
        ImportError::Repo(_) => "repo_error",
        ImportError::MatrixNotFound(_) => "matrix_not_found",
        ImportError::CharacterTypeConflict { .. } => "character_type_conflict",
        ImportError::UndecodableSymbol { .. } => "undecodable_symbol",
        ImportError::UnknownState { .. } => "unknown_state",
        ImportError::InvalidUpload(_) => "invalid_upload",
    }
}

#[cfg(test)]
mod tests {
    use super::{is_score_separator, same_symbol, ImportError};
    use crate::model::character::CharacterType;

    #[test]
    fn separators_cover_nexus_brackets_and_tnt_ranges() {
        for symbol in ['{', '}', '(', ')', '[', ']', '&', '/', ' '] {
            assert!(is_score_separator(symbol));
        }
        assert!(!is_score_separator('-'));
        assert!(!is_score_separator('?'));
    }

    #[test]
    fn format_markers_match_regardless_of_case() {
        assert!(same_symbol('n', 'N'));
        assert!(same_symbol('N', 'n'));
        assert!(same_symbol('?', '?'));
        assert!(!same_symbol('n', 'm'));
    }

    #[test]
    fn type_conflict_message_names_both_types() {
        let err = ImportError::CharacterTypeConflict {
            character_id: 3,
            character_name: "body mass".to_string(),
            previous_type: CharacterType::Discrete,
            new_type: CharacterType::Continuous,
        };
        let message = err.to_string();
        assert!(message.contains("previously discrete"));
        assert!(message.contains("as continuous"));
    }
}
