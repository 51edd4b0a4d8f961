//! Parsed upload object handed to the importer.
//!
//! # Responsibility
//! - Mirror the shape produced by the upstream file parsers (NEXUS, TNT).
//! - Carry the raw cell score strings the importer decodes.
//!
//! # Invariants
//! - `cells` is row-major: `cells[row][column]` scores `taxa[row]` on
//!   `characters[column]`.
//! - `taxon_id`/`character_id` are written back by the importer once a
//!   record is reconciled against stored rows.

use crate::model::character::{CharacterId, CharacterOrdering, CharacterType};
use crate::model::taxon::{TaxonId, TaxonNames};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MISSING_SYMBOL: char = '?';
pub const DEFAULT_GAP_SYMBOL: char = '-';

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatrixUpload {
    /// Source format name, e.g. `NEXUS` or `TNT`.
    pub format: String,
    /// Source datatype, e.g. `STANDARD` or `MERISTIC`.
    pub data_type: Option<String>,
    pub taxa: Vec<UploadTaxon>,
    pub characters: Vec<UploadCharacter>,
    pub cells: Vec<Vec<UploadCell>>,
    pub parameters: UploadParameters,
    pub blocks: Vec<UploadBlock>,
}

impl MatrixUpload {
    pub fn is_meristic(&self) -> bool {
        self.data_type
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case("meristic"))
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&UploadCell> {
        self.cells.get(row).and_then(|cells| cells.get(column))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadTaxon {
    #[serde(rename = "taxonId", alias = "taxon_id")]
    pub taxon_id: Option<TaxonId>,
    #[serde(flatten)]
    pub names: TaxonNames,
    pub is_extinct: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadCharacter {
    #[serde(rename = "characterId", alias = "character_id")]
    pub character_id: Option<CharacterId>,
    pub name: String,
    pub note: Option<String>,
    pub ordering: CharacterOrdering,
    #[serde(rename = "type")]
    pub kind: Option<CharacterType>,
    pub states: Vec<UploadState>,
}

impl UploadCharacter {
    /// Declared type, or `default` when the upload leaves it out.
    pub fn kind_or(&self, default: CharacterType) -> CharacterType {
        self.kind.unwrap_or(default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadState {
    pub name: String,
    pub note: Option<String>,
}

/// One cell of the upload grid: a bare score string or a scored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadCell {
    Scores(String),
    Detailed {
        #[serde(default)]
        scores: String,
        #[serde(default)]
        uncertain: bool,
        #[serde(default)]
        note: Option<String>,
    },
}

impl UploadCell {
    pub fn scores(&self) -> &str {
        match self {
            Self::Scores(scores) => scores,
            Self::Detailed { scores, .. } => scores,
        }
    }

    /// Explicit uncertain flag; bare score strings carry none.
    pub fn uncertain_flag(&self) -> Option<bool> {
        match self {
            Self::Scores(_) => None,
            Self::Detailed { uncertain, .. } => Some(*uncertain),
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Scores(_) => None,
            Self::Detailed { note, .. } => note.as_deref(),
        }
    }
}

/// Format parameters declared by the uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadParameters {
    #[serde(rename = "MISSING")]
    pub missing: Option<String>,
    #[serde(rename = "GAP")]
    pub gap: Option<String>,
    /// Explicit symbol alphabet, e.g. `"0 1 2 a b"`.
    #[serde(rename = "SYMBOLS")]
    pub symbols: Option<String>,
}

impl UploadParameters {
    pub fn missing_symbol(&self) -> char {
        first_char(self.missing.as_deref()).unwrap_or(DEFAULT_MISSING_SYMBOL)
    }

    pub fn gap_symbol(&self) -> char {
        first_char(self.gap.as_deref()).unwrap_or(DEFAULT_GAP_SYMBOL)
    }

    pub fn symbols(&self) -> Option<&str> {
        self.symbols
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Unparsed block preserved for verbatim re-emission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadBlock {
    pub name: String,
    pub content: String,
}

/// Original uploaded file attached to the audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

fn first_char(value: Option<&str>) -> Option<char> {
    value.and_then(|value| value.trim().chars().next())
}
