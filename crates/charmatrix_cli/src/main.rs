//! Command-line entry point for the matrix interchange core.
//!
//! # Responsibility
//! - Export a stored matrix to a file or stdout.
//! - Import or merge a parsed upload object (JSON) into the store.

use charmatrix_core::model::matrix::NewMatrix;
use charmatrix_core::model::taxon::TaxonRank;
use charmatrix_core::model::upload::{MatrixUpload, UploadFile};
use charmatrix_core::{
    default_log_level, export_file_name, export_matrix, init_logging, open_db, ExportFlags,
    ExportFormat, ImportReport, ImportRequest, MatrixImportService,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Character matrix import and export.
#[derive(Parser)]
#[command(name = "charmatrix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite matrix store.
    #[arg(long, global = true, env = "CHARMATRIX_DB", default_value = "charmatrix.db")]
    db: PathBuf,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, global = true, env = "CHARMATRIX_LOG_DIR")]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a stored matrix.
    Export {
        #[arg(long)]
        matrix: i64,

        /// nexus|tnt|nexml|characters|rules
        #[arg(long, default_value = "nexus")]
        format: ExportFormat,

        /// Output file; stdout when neither this nor --out-dir is set.
        #[arg(long, conflicts_with = "out_dir")]
        out: Option<PathBuf>,

        /// Directory receiving a timestamped `<prefix>_M<id>_<time>.<ext>` file.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[arg(long, default_value = "matrix")]
        prefix: String,

        /// Include taxon, character and cell notes.
        #[arg(long)]
        notes: bool,

        /// Leave character descriptions out of the character listing.
        #[arg(long)]
        no_descriptions: bool,

        /// Leave taxon authors out of labels.
        #[arg(long)]
        no_author: bool,
    },

    /// Import an upload object into a new matrix or merge it into an
    /// existing one.
    Import {
        #[arg(long)]
        project: i64,

        #[arg(long)]
        user: i64,

        /// Parsed upload object (JSON).
        #[arg(long)]
        upload: PathBuf,

        /// Original uploaded file, stored on the audit record.
        #[arg(long)]
        file: PathBuf,

        /// Merge into this matrix instead of creating one.
        #[arg(long, conflicts_with = "title")]
        matrix: Option<i64>,

        /// Title of the created matrix; defaults to the file name.
        #[arg(long)]
        title: Option<String>,

        /// OTU rank field of the created matrix.
        #[arg(long, default_value = "specific_epithet")]
        otu: String,

        /// Free text recorded on the upload audit record.
        #[arg(long)]
        notes: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("Failed to initialize logging: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut conn = open_db(&cli.db)?;

    match cli.command {
        Commands::Export {
            matrix,
            format,
            out,
            out_dir,
            prefix,
            notes,
            no_descriptions,
            no_author,
        } => {
            let flags = ExportFlags {
                include_notes: notes,
                include_descriptions: !no_descriptions,
                show_author: !no_author,
            };
            let mut document = String::new();
            export_matrix(&conn, matrix, format, flags, |chunk: &str| {
                document.push_str(chunk);
            })?;

            let target = match (out, out_dir) {
                (Some(path), _) => Some(path),
                (None, Some(dir)) => {
                    Some(dir.join(export_file_name(&prefix, matrix, format, Utc::now())))
                }
                (None, None) => None,
            };
            match target {
                Some(path) => {
                    std::fs::write(&path, document)?;
                    println!("{}", path.display());
                }
                None => std::io::stdout().write_all(document.as_bytes())?,
            }
        }
        Commands::Import {
            project,
            user,
            upload,
            file,
            matrix,
            title,
            otu,
            notes,
        } => {
            let mut parsed: MatrixUpload = serde_json::from_slice(&std::fs::read(&upload)?)?;
            let original = UploadFile {
                file_name: file_name(&file),
                content: std::fs::read(&file)?,
            };
            let request = ImportRequest {
                user_id: user,
                notes: notes.as_deref(),
                upload: &mut parsed,
                file: &original,
            };

            let mut service = MatrixImportService::new(&mut conn);
            let report = match matrix {
                Some(matrix_id) => service.merge(matrix_id, request)?,
                None => {
                    let mut new_matrix = NewMatrix::new(
                        project,
                        user,
                        title.unwrap_or_else(|| original.file_name.clone()),
                    );
                    new_matrix.otu = TaxonRank::from_field_name(&otu)
                        .ok_or_else(|| format!("unknown OTU rank field `{otu}`"))?;
                    service.create_and_import(&new_matrix, request)?
                }
            };
            print_report(&report);
        }
    }

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_report(report: &ImportReport) {
    println!("matrix_id={}", report.matrix_id);
    println!("upload_id={}", report.upload_id);
    println!(
        "taxa created={} updated={} linked={}",
        report.created_taxa.len(),
        report.updated_taxa.len(),
        report.linked_taxa
    );
    println!(
        "characters created={} updated={} linked={}",
        report.created_characters.len(),
        report.updated_characters.len(),
        report.linked_characters
    );
    println!("states created={}", report.created_states.len());
    println!("cells created={}", report.created_cells.len());
    println!(
        "notes created={} updated={}",
        report.created_notes.len(),
        report.updated_notes.len()
    );
    println!("blocks stored={}", report.block_ids.len());
}
