//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into import/merge and export use-cases.
//! - Keep the CLI decoupled from storage details.

pub mod export_service;
pub mod import_service;
