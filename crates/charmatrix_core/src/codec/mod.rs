//! Pure building blocks shared by exporters and the importer.
//!
//! # Responsibility
//! - Sparse cell storage (`cell_table`).
//! - Symbol encoding/decoding and numeric score parsing (`symbol`).
//! - Ordering range compaction (`ordering`).
//! - Label and free-text cleaning (`sanitize`).
//!
//! # Invariants
//! - Nothing in this module touches storage or performs I/O.

pub mod cell_table;
pub mod ordering;
pub mod sanitize;
pub mod symbol;
