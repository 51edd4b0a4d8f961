//! Sparse cell table keyed by `(taxon id, character id)`.
//!
//! # Responsibility
//! - Hold every cell of one matrix for a single export or import call.
//! - Answer the duplicate checks the importer runs before inserting.
//!
//! # Invariants
//! - Entries of one key keep insertion order; the first entry decides the
//!   bracket style of multi-state exports.
//! - Iteration order is deterministic (sorted by key).

use crate::model::cell::Cell;
use crate::model::character::{CharacterId, StateId};
use crate::model::taxon::TaxonId;
use std::collections::BTreeMap;

pub type CellKey = (TaxonId, CharacterId);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellTable {
    cells: BTreeMap<CellKey, Vec<Cell>>,
}

impl CellTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut table = Self::new();
        table.extend(cells);
        table
    }

    pub fn insert(&mut self, cell: Cell) {
        self.cells
            .entry((cell.taxon_id, cell.character_id))
            .or_default()
            .push(cell);
    }

    pub fn extend(&mut self, cells: impl IntoIterator<Item = Cell>) {
        for cell in cells {
            self.insert(cell);
        }
    }

    /// Score entries of one pair; empty when the pair is unscored.
    pub fn get(&self, taxon_id: TaxonId, character_id: CharacterId) -> &[Cell] {
        self.cells
            .get(&(taxon_id, character_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_state(&self, taxon_id: TaxonId, character_id: CharacterId, state_id: StateId) -> bool {
        self.get(taxon_id, character_id)
            .iter()
            .any(|cell| cell.state_id == Some(state_id))
    }

    pub fn has_gap(&self, taxon_id: TaxonId, character_id: CharacterId) -> bool {
        self.get(taxon_id, character_id).iter().any(Cell::is_gap)
    }

    pub fn has_values(
        &self,
        taxon_id: TaxonId,
        character_id: CharacterId,
        start: Option<f64>,
        end: Option<f64>,
    ) -> bool {
        self.get(taxon_id, character_id)
            .iter()
            .any(|cell| cell.start_value == start && cell.end_value == end)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &[Cell])> {
        self.cells.iter().map(|(key, cells)| (key, cells.as_slice()))
    }

    /// Number of scored pairs.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total number of score entries across all pairs.
    pub fn cell_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }
}
