//! Matrix domain model.
//!
//! # Responsibility
//! - Describe a character matrix and its format option bag.
//!
//! # Invariants
//! - `otu` names the taxon rank used as display label for every exporter.
//! - Matrices are never deleted by import or export.

use crate::model::taxon::TaxonRank;
use serde::{Deserialize, Serialize};

/// Database identifier of a matrix row.
pub type MatrixId = i64;

/// Matrix scoring type. `Meristic` switches NEXUS to `DATATYPE=MERISTIC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixType {
    #[default]
    Discrete,
    Meristic,
}

impl MatrixType {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Discrete => 0,
            Self::Meristic => 1,
        }
    }

    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Discrete),
            1 => Some(Self::Meristic),
            _ => None,
        }
    }
}

/// How multi-state cells are interpreted when a format does not say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultistateMode {
    #[default]
    Polymorphic,
    Uncertain,
}

/// Format option bag persisted as JSON on the matrix row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixOptions {
    /// Character numbering in listings starts at 0 instead of 1.
    pub zero_based_numbering: bool,
    pub default_multistate_mode: MultistateMode,
    /// Suppresses `author, year` in exported taxon labels.
    pub hide_taxon_author: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub matrix_id: MatrixId,
    pub project_id: i64,
    pub user_id: i64,
    pub title: String,
    pub notes: Option<String>,
    pub otu: TaxonRank,
    pub kind: MatrixType,
    pub published: bool,
    pub options: MatrixOptions,
}

/// Insert model for a matrix row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMatrix {
    pub project_id: i64,
    pub user_id: i64,
    pub title: String,
    pub notes: Option<String>,
    pub otu: TaxonRank,
    pub kind: MatrixType,
    pub published: bool,
    pub options: MatrixOptions,
}

impl NewMatrix {
    /// Creates an unpublished discrete matrix labelled by species.
    pub fn new(project_id: i64, user_id: i64, title: impl Into<String>) -> Self {
        Self {
            project_id,
            user_id,
            title: title.into(),
            notes: None,
            otu: TaxonRank::SpecificEpithet,
            kind: MatrixType::Discrete,
            published: false,
            options: MatrixOptions::default(),
        }
    }
}
