use charmatrix_core::db::open_db_in_memory;
use charmatrix_core::model::character::CharacterType;
use charmatrix_core::model::matrix::{MatrixType, NewMatrix};
use charmatrix_core::model::upload::{MatrixUpload, UploadFile};
use charmatrix_core::{ImportError, ImportReport, ImportRequest, MatrixImportService};
use rusqlite::Connection;
use serde_json::{json, Value};

fn parse_upload(value: Value) -> MatrixUpload {
    serde_json::from_value(value).unwrap()
}

fn horned_mammals() -> MatrixUpload {
    parse_upload(json!({
        "format": "NEXUS",
        "dataType": "STANDARD",
        "taxa": [
            {"genus": "Canis", "specific_epithet": "lupus", "notes": "grey wolf"},
            {"genus": "Bos", "specific_epithet": "taurus", "is_extinct": true}
        ],
        "characters": [
            {"name": "tail length", "states": [{"name": "short"}, {"name": "long"}]},
            {
                "name": "horn shape",
                "note": "keratin sheath outline",
                "ordering": "ordered",
                "states": [{"name": "absent"}, {"name": "straight"}, {"name": "curved"}]
            },
            {"name": "body mass", "type": "continuous"}
        ],
        "cells": [
            ["0", {"scores": "{12}", "note": "worn horn"}, "1.5-2.5"],
            ["-", "(02)", "?"]
        ],
        "parameters": {"MISSING": "?", "GAP": "-"},
        "blocks": [{"name": "MESQUITE", "content": "\tTITLE 'kept';"}]
    }))
}

fn nexus_file() -> UploadFile {
    UploadFile {
        file_name: "horned.nex".to_string(),
        content: b"#NEXUS\n".to_vec(),
    }
}

fn create(conn: &mut Connection, upload: &mut MatrixUpload) -> Result<ImportReport, ImportError> {
    let file = nexus_file();
    MatrixImportService::new(conn).create_and_import(
        &NewMatrix::new(1, 7, "Horned mammals"),
        ImportRequest {
            user_id: 7,
            notes: Some("initial upload"),
            upload,
            file: &file,
        },
    )
}

fn merge(
    conn: &mut Connection,
    matrix_id: i64,
    upload: &mut MatrixUpload,
) -> Result<ImportReport, ImportError> {
    let file = nexus_file();
    MatrixImportService::new(conn).merge(
        matrix_id,
        ImportRequest {
            user_id: 7,
            notes: None,
            upload,
            file: &file,
        },
    )
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn create_and_import_persists_every_upload_part() {
    let mut conn = open_db_in_memory().unwrap();
    let mut upload = horned_mammals();

    let report = create(&mut conn, &mut upload).unwrap();

    assert_eq!(report.created_taxa.len(), 2);
    assert_eq!(report.created_characters.len(), 3);
    assert_eq!(report.created_states.len(), 5);
    assert_eq!(report.created_cells.len(), 7);
    assert_eq!(report.created_notes.len(), 1);
    assert_eq!(report.linked_taxa, 2);
    assert_eq!(report.linked_characters, 3);
    assert_eq!(report.block_ids.len(), 1);
    assert!(report.upload_id > 0);

    assert!(upload.taxa.iter().all(|taxon| taxon.taxon_id.is_some()));
    assert!(upload
        .characters
        .iter()
        .all(|character| character.character_id.is_some()));

    let (format, notes, file_name): (String, Option<String>, String) = conn
        .query_row(
            "SELECT format, notes, file_name FROM matrix_file_uploads WHERE upload_id = ?1;",
            [report.upload_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(format, "NEXUS");
    assert_eq!(notes.as_deref(), Some("initial upload"));
    assert_eq!(file_name, "horned.nex");

    let positions: Vec<i64> = conn
        .prepare(
            "SELECT position FROM matrix_taxa_order WHERE matrix_id = ?1 ORDER BY position;",
        )
        .unwrap()
        .query_map([report.matrix_id], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(positions, vec![1, 2]);
}

#[test]
fn multi_state_cells_keep_bracket_semantics_and_gaps_have_no_state() {
    let mut conn = open_db_in_memory().unwrap();
    let report = create(&mut conn, &mut horned_mammals()).unwrap();

    let uncertain: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM cells WHERE matrix_id = ?1 AND is_uncertain = 1;",
            [report.matrix_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(uncertain, 2);

    let gaps: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM cells
             WHERE matrix_id = ?1 AND state_id IS NULL AND start_value IS NULL;",
            [report.matrix_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(gaps, 1);

    let (start, end): (f64, f64) = conn
        .query_row(
            "SELECT start_value, end_value FROM cells
             WHERE matrix_id = ?1 AND start_value IS NOT NULL;",
            [report.matrix_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((start, end), (1.5, 2.5));
}

#[test]
fn re_importing_the_same_upload_creates_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let mut upload = horned_mammals();
    let first = create(&mut conn, &mut upload).unwrap();

    let second = merge(&mut conn, first.matrix_id, &mut upload).unwrap();

    assert!(second.created_taxa.is_empty());
    assert!(second.created_characters.is_empty());
    assert!(second.created_states.is_empty());
    assert!(second.created_cells.is_empty());
    assert!(second.created_notes.is_empty());
    assert!(second.updated_notes.is_empty());
    assert!(second.block_ids.is_empty());
    assert_eq!(second.linked_taxa, 0);
    assert_eq!(second.linked_characters, 0);
    assert_eq!(count(&conn, "cells"), 7);
    assert_eq!(count(&conn, "matrix_file_uploads"), 2);
}

#[test]
fn re_importing_a_freshly_parsed_upload_matches_characters_by_name() {
    let mut conn = open_db_in_memory().unwrap();
    let first = create(&mut conn, &mut horned_mammals()).unwrap();

    let mut reparsed = horned_mammals();
    let second = merge(&mut conn, first.matrix_id, &mut reparsed).unwrap();

    assert!(second.created_taxa.is_empty());
    assert!(second.created_characters.is_empty());
    assert!(second.updated_characters.is_empty());
    assert!(second.created_states.is_empty());
    assert!(second.created_cells.is_empty());
    assert!(second.created_notes.is_empty());
    assert!(second.updated_notes.is_empty());
    assert!(second.block_ids.is_empty());
    assert_eq!(second.linked_characters, 0);
    assert_eq!(count(&conn, "characters"), 3);
    assert_eq!(count(&conn, "character_states"), 5);
    assert_eq!(count(&conn, "cells"), 7);
    assert_eq!(
        reparsed
            .characters
            .iter()
            .map(|character| character.character_id)
            .collect::<Vec<_>>(),
        first
            .created_characters
            .iter()
            .copied()
            .map(Some)
            .collect::<Vec<_>>()
    );
}

#[test]
fn repeated_column_names_claim_distinct_linked_characters() {
    let mut conn = open_db_in_memory().unwrap();
    let twin_columns = || {
        parse_upload(json!({
            "format": "NEXUS",
            "taxa": [{"genus": "Canis", "specific_epithet": "lupus"}],
            "characters": [
                {"name": "tooth", "states": [{"name": "absent"}, {"name": "present"}]},
                {"name": "tooth", "states": [{"name": "absent"}, {"name": "present"}]}
            ],
            "cells": [["0", "1"]]
        }))
    };
    let first = create(&mut conn, &mut twin_columns()).unwrap();
    assert_eq!(first.created_characters.len(), 2);

    let second = merge(&mut conn, first.matrix_id, &mut twin_columns()).unwrap();

    assert!(second.created_characters.is_empty());
    assert!(second.created_cells.is_empty());
    assert_eq!(count(&conn, "characters"), 2);
}

#[test]
fn taxa_are_shared_across_matrices_of_one_project_by_name_hash() {
    let mut conn = open_db_in_memory().unwrap();
    create(&mut conn, &mut horned_mammals()).unwrap();

    let mut relabelled = horned_mammals();
    relabelled.taxa[0].notes = Some("timber wolf".to_string());
    relabelled.taxa[1].is_extinct = false;
    relabelled.taxa[1].notes = Some("cattle".to_string());
    let second = create(&mut conn, &mut relabelled).unwrap();

    assert!(second.created_taxa.is_empty());
    assert_eq!(second.linked_taxa, 2);
    assert_eq!(count(&conn, "taxa"), 2);
}

#[test]
fn new_cell_note_text_is_appended_once() {
    let mut conn = open_db_in_memory().unwrap();
    let mut upload = horned_mammals();
    let first = create(&mut conn, &mut upload).unwrap();

    upload.cells[0][1] = serde_json::from_value(json!({"scores": "{12}", "note": "Worn Horn"})).unwrap();
    let repeated = merge(&mut conn, first.matrix_id, &mut upload).unwrap();
    assert!(repeated.updated_notes.is_empty());

    upload.cells[0][1] = serde_json::from_value(json!({"scores": "{12}", "note": "tip broken"})).unwrap();
    let extended = merge(&mut conn, first.matrix_id, &mut upload).unwrap();
    assert_eq!(extended.updated_notes, first.created_notes);

    let notes: String = conn
        .query_row("SELECT notes FROM cell_notes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(notes, "worn horn\ntip broken");
}

#[test]
fn known_taxon_details_are_updated_in_place() {
    let mut conn = open_db_in_memory().unwrap();
    let mut upload = horned_mammals();
    let first = create(&mut conn, &mut upload).unwrap();

    upload.taxa[1].is_extinct = false;
    upload.taxa[1].notes = Some("domestic form".to_string());
    let report = merge(&mut conn, first.matrix_id, &mut upload).unwrap();

    let bos = upload.taxa[1].taxon_id.unwrap();
    assert_eq!(report.updated_taxa, vec![bos]);
    let (extinct, notes): (i64, Option<String>) = conn
        .query_row(
            "SELECT is_extinct, notes FROM taxa WHERE taxon_id = ?1;",
            [bos],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(extinct, 0);
    assert_eq!(notes.as_deref(), Some("domestic form"));
}

#[test]
fn stateless_merge_column_falls_back_to_stored_state_numbers() {
    let mut conn = open_db_in_memory().unwrap();
    let mut upload = horned_mammals();
    let first = create(&mut conn, &mut upload).unwrap();
    let horn_id = upload.characters[1].character_id.unwrap();

    let mut rescored = parse_upload(json!({
        "format": "TNT",
        "taxa": [{"genus": "Ovis", "specific_epithet": "aries"}],
        "characters": [{"characterId": horn_id, "name": "horn shape", "ordering": "ordered"}],
        "cells": [["2"]]
    }));
    let report = merge(&mut conn, first.matrix_id, &mut rescored).unwrap();

    assert_eq!(report.created_taxa.len(), 1);
    assert!(report.created_states.is_empty());
    let state_name: String = conn
        .query_row(
            "SELECT s.name FROM cells c
             JOIN character_states s ON s.state_id = c.state_id
             WHERE c.cell_id = ?1;",
            [report.created_cells[0]],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(state_name, "curved");
}

#[test]
fn character_type_conflict_rolls_back_the_whole_import() {
    let mut conn = open_db_in_memory().unwrap();
    let mut upload = horned_mammals();
    let first = create(&mut conn, &mut upload).unwrap();
    let body_mass = upload.characters[2].character_id.unwrap();

    let mut conflicting = parse_upload(json!({
        "format": "NEXUS",
        "taxa": [{"genus": "Ovis", "specific_epithet": "aries"}],
        "characters": [{"characterId": body_mass, "name": "body mass", "type": "discrete"}],
        "cells": [["1"]]
    }));
    let err = merge(&mut conn, first.matrix_id, &mut conflicting).unwrap_err();

    match err {
        ImportError::CharacterTypeConflict {
            character_id,
            previous_type,
            new_type,
            ..
        } => {
            assert_eq!(character_id, body_mass);
            assert_eq!(previous_type, CharacterType::Continuous);
            assert_eq!(new_type, CharacterType::Discrete);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&conn, "taxa"), 2);
    assert_eq!(count(&conn, "cells"), 7);
    assert_eq!(count(&conn, "matrix_file_uploads"), 1);
}

#[test]
fn unknown_state_reports_available_states_and_creates_no_matrix() {
    let mut conn = open_db_in_memory().unwrap();
    let mut bad = parse_upload(json!({
        "format": "NEXUS",
        "taxa": [{"genus": "Canis", "specific_epithet": "lupus"}],
        "characters": [{"name": "tail length", "states": [{"name": "short"}, {"name": "long"}]}],
        "cells": [["5"]]
    }));

    let err = create(&mut conn, &mut bad).unwrap_err();

    match err {
        ImportError::UnknownState {
            taxon,
            character,
            symbol,
            ordinal,
            available_states,
        } => {
            assert_eq!(taxon, "Canis lupus");
            assert_eq!(character, "tail length");
            assert_eq!(symbol, '5');
            assert_eq!(ordinal, 5);
            assert_eq!(available_states, vec!["0=short", "1=long"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&conn, "matrices"), 0);
    assert_eq!(count(&conn, "characters"), 0);
}

#[test]
fn undecodable_symbol_is_fatal() {
    let mut conn = open_db_in_memory().unwrap();
    let mut bad = parse_upload(json!({
        "format": "NEXUS",
        "taxa": [{"genus": "Canis", "specific_epithet": "lupus"}],
        "characters": [{"name": "tail length", "states": [{"name": "short"}]}],
        "cells": [["*"]]
    }));

    let err = create(&mut conn, &mut bad).unwrap_err();
    assert!(matches!(err, ImportError::UndecodableSymbol { symbol: '*', .. }));
    assert_eq!(count(&conn, "matrices"), 0);
}

#[test]
fn name_matched_character_with_a_new_type_is_a_conflict() {
    let mut conn = open_db_in_memory().unwrap();
    let first = create(&mut conn, &mut horned_mammals()).unwrap();

    let mut retyped = parse_upload(json!({
        "format": "NEXUS",
        "taxa": [{"genus": "Canis", "specific_epithet": "lupus"}],
        "characters": [{"name": "body mass", "states": [{"name": "light"}, {"name": "heavy"}]}],
        "cells": [["1"]]
    }));
    let err = merge(&mut conn, first.matrix_id, &mut retyped).unwrap_err();

    assert!(matches!(
        err,
        ImportError::CharacterTypeConflict {
            previous_type: CharacterType::Continuous,
            new_type: CharacterType::Discrete,
            ..
        }
    ));
    assert_eq!(count(&conn, "characters"), 3);
    assert_eq!(count(&conn, "cells"), 7);
}

#[test]
fn lowercase_missing_marker_is_matched_in_either_case() {
    let mut conn = open_db_in_memory().unwrap();
    let mut upload = parse_upload(json!({
        "format": "NEXUS",
        "taxa": [
            {"genus": "Canis", "specific_epithet": "lupus"},
            {"genus": "Bos", "specific_epithet": "taurus"}
        ],
        "characters": [{"name": "tail length", "states": [{"name": "short"}, {"name": "long"}]}],
        "cells": [["n"], ["N"]],
        "parameters": {"MISSING": "n"}
    }));

    let report = create(&mut conn, &mut upload).unwrap();

    assert!(report.created_cells.is_empty());
    assert_eq!(count(&conn, "cells"), 0);
}

#[test]
fn merge_into_missing_matrix_fails_before_writing() {
    let mut conn = open_db_in_memory().unwrap();

    let err = merge(&mut conn, 99, &mut horned_mammals()).unwrap_err();

    assert!(matches!(err, ImportError::MatrixNotFound(99)));
    assert_eq!(count(&conn, "taxa"), 0);
    assert_eq!(count(&conn, "matrix_file_uploads"), 0);
}

#[test]
fn nameless_taxon_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let mut bad = parse_upload(json!({
        "format": "NEXUS",
        "taxa": [{"notes": "no names"}],
        "characters": [],
        "cells": [[]]
    }));

    let err = create(&mut conn, &mut bad).unwrap_err();
    assert!(matches!(err, ImportError::InvalidUpload(_)));
}

#[test]
fn meristic_upload_marks_matrix_and_characters_meristic() {
    let mut conn = open_db_in_memory().unwrap();
    let mut meristic = parse_upload(json!({
        "format": "NEXUS",
        "dataType": "MERISTIC",
        "taxa": [{"genus": "Canis", "specific_epithet": "lupus"}],
        "characters": [{"name": "vertebrae"}],
        "cells": [["42"]]
    }));

    let report = create(&mut conn, &mut meristic).unwrap();

    let matrix_type: i64 = conn
        .query_row(
            "SELECT type FROM matrices WHERE matrix_id = ?1;",
            [report.matrix_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(matrix_type, MatrixType::Meristic.to_db());
    let character_type: i64 = conn
        .query_row("SELECT type FROM characters;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(character_type, CharacterType::Meristic.to_db());
    let value: f64 = conn
        .query_row("SELECT start_value FROM cells;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(value, 42.0);
}
