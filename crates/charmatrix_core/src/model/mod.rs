//! Domain model for character matrices and their upload objects.
//!
//! # Responsibility
//! - Define canonical data structures shared by codec, export and import.
//! - Keep storage row shapes (`New*` insert models) next to read models.
//!
//! # Invariants
//! - Every persisted object is identified by its integer row id.
//! - Taxa and characters are project-scoped; cells and notes are
//!   matrix-scoped.

pub mod cell;
pub mod character;
pub mod matrix;
pub mod taxon;
pub mod upload;
