//! Cell and cell-note domain model.
//!
//! # Invariants
//! - A cell carries either a state reference, start/end values, or nothing
//!   (explicit gap); discrete and numeric representations never mix within
//!   one `(taxon, character)` list.

use crate::model::character::{CharacterId, StateId};
use crate::model::matrix::MatrixId;
use crate::model::taxon::TaxonId;

pub type CellId = i64;

/// One score entry of a `(taxon, character)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub cell_id: CellId,
    pub matrix_id: MatrixId,
    pub taxon_id: TaxonId,
    pub character_id: CharacterId,
    /// `None` with no values means an explicit gap (inapplicable).
    pub state_id: Option<StateId>,
    /// Scored but not personally examined.
    pub is_npa: bool,
    /// Multi-state list means "one of these"; otherwise "all of these".
    pub is_uncertain: bool,
    pub start_value: Option<f64>,
    pub end_value: Option<f64>,
}

impl Cell {
    /// Explicit gap: no state, no numeric value and not an NPA marker.
    pub fn is_gap(&self) -> bool {
        self.state_id.is_none()
            && self.start_value.is_none()
            && self.end_value.is_none()
            && !self.is_npa
    }

    pub fn is_numeric(&self) -> bool {
        self.start_value.is_some() || self.end_value.is_some()
    }
}

/// Insert model for a cell row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCell {
    pub matrix_id: MatrixId,
    pub taxon_id: TaxonId,
    pub character_id: CharacterId,
    pub user_id: i64,
    pub state_id: Option<StateId>,
    pub is_npa: bool,
    pub is_uncertain: bool,
    pub start_value: Option<f64>,
    pub end_value: Option<f64>,
}

impl NewCell {
    pub fn state(
        matrix_id: MatrixId,
        taxon_id: TaxonId,
        character_id: CharacterId,
        user_id: i64,
        state_id: StateId,
        is_uncertain: bool,
    ) -> Self {
        Self {
            matrix_id,
            taxon_id,
            character_id,
            user_id,
            state_id: Some(state_id),
            is_npa: false,
            is_uncertain,
            start_value: None,
            end_value: None,
        }
    }

    pub fn gap(
        matrix_id: MatrixId,
        taxon_id: TaxonId,
        character_id: CharacterId,
        user_id: i64,
    ) -> Self {
        Self {
            matrix_id,
            taxon_id,
            character_id,
            user_id,
            state_id: None,
            is_npa: false,
            is_uncertain: false,
            start_value: None,
            end_value: None,
        }
    }

    pub fn values(
        matrix_id: MatrixId,
        taxon_id: TaxonId,
        character_id: CharacterId,
        user_id: i64,
        start_value: Option<f64>,
        end_value: Option<f64>,
    ) -> Self {
        Self {
            matrix_id,
            taxon_id,
            character_id,
            user_id,
            state_id: None,
            is_npa: false,
            is_uncertain: false,
            start_value,
            end_value,
        }
    }

    pub fn into_cell(self, cell_id: CellId) -> Cell {
        Cell {
            cell_id,
            matrix_id: self.matrix_id,
            taxon_id: self.taxon_id,
            character_id: self.character_id,
            state_id: self.state_id,
            is_npa: self.is_npa,
            is_uncertain: self.is_uncertain,
            start_value: self.start_value,
            end_value: self.end_value,
        }
    }
}

/// Free text attached to a `(matrix, taxon, character)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellNote {
    pub note_id: i64,
    pub matrix_id: MatrixId,
    pub taxon_id: TaxonId,
    pub character_id: CharacterId,
    pub notes: String,
}

/// Insert model for a cell note row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCellNote {
    pub matrix_id: MatrixId,
    pub taxon_id: TaxonId,
    pub character_id: CharacterId,
    pub user_id: i64,
    pub notes: String,
}

/// Merges incoming note text into an existing note.
///
/// Returns `None` when the incoming text is blank or already contained
/// (case-insensitively) in the existing note.
pub fn merge_note_text(existing: Option<&str>, incoming: &str) -> Option<String> {
    let incoming = incoming.trim();
    if incoming.is_empty() {
        return None;
    }
    match existing.map(str::trim).filter(|value| !value.is_empty()) {
        None => Some(incoming.to_string()),
        Some(current) => {
            if current.to_lowercase().contains(&incoming.to_lowercase()) {
                None
            } else {
                Some(format!("{current}\n{incoming}"))
            }
        }
    }
}
