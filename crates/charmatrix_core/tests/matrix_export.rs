use charmatrix_core::db::open_db_in_memory;
use charmatrix_core::model::character::{NewRuleAction, RuleActionKind};
use charmatrix_core::model::matrix::NewMatrix;
use charmatrix_core::model::upload::{MatrixUpload, UploadFile};
use charmatrix_core::repo::character_repo::{CharacterRepository, SqliteCharacterRepository};
use charmatrix_core::{
    export_matrix, load_export_options, ExportError, ExportFlags, ExportFormat, ImportRequest,
    MatrixImportService,
};
use rusqlite::Connection;
use serde_json::json;

struct Imported {
    conn: Connection,
    matrix_id: i64,
    upload: MatrixUpload,
}

fn import_horned_mammals() -> Imported {
    let mut conn = open_db_in_memory().unwrap();
    let mut upload: MatrixUpload = serde_json::from_value(json!({
        "format": "NEXUS",
        "taxa": [
            {"genus": "Canis", "specific_epithet": "lupus"},
            {"genus": "Bos", "specific_epithet": "taurus", "is_extinct": true, "notes": "aurochs line"}
        ],
        "characters": [
            {"name": "tail length", "states": [{"name": "short"}, {"name": "long"}]},
            {
                "name": "horn shape",
                "note": "outline of the keratin sheath",
                "ordering": "ordered",
                "states": [{"name": "absent"}, {"name": "straight"}, {"name": "curved"}]
            },
            {"name": "body mass", "type": "continuous"}
        ],
        "cells": [
            ["0", {"scores": "{12}", "note": "worn horn"}, "1.5-2.5"],
            ["-", "(02)", "?"]
        ],
        "blocks": [{"name": "MESQUITE", "content": "\tTITLE 'kept';"}]
    }))
    .unwrap();
    let file = UploadFile {
        file_name: "horned.nex".to_string(),
        content: b"#NEXUS\n".to_vec(),
    };

    let report = MatrixImportService::new(&mut conn)
        .create_and_import(
            &NewMatrix::new(1, 7, "Horned mammals"),
            ImportRequest {
                user_id: 7,
                notes: None,
                upload: &mut upload,
                file: &file,
            },
        )
        .unwrap();

    Imported {
        conn,
        matrix_id: report.matrix_id,
        upload,
    }
}

fn render(imported: &Imported, format: ExportFormat, flags: ExportFlags) -> String {
    let mut output = String::new();
    export_matrix(
        &imported.conn,
        imported.matrix_id,
        format,
        flags,
        |chunk: &str| output.push_str(chunk),
    )
    .unwrap();
    output
}

#[test]
fn snapshot_reflects_stored_row_and_column_order() {
    let imported = import_horned_mammals();
    let options =
        load_export_options(&imported.conn, imported.matrix_id, ExportFlags::default()).unwrap();

    let labels: Vec<String> = options
        .taxa
        .iter()
        .map(|taxon| options.taxon_label(taxon))
        .collect();
    assert_eq!(labels, vec!["Canis lupus", "†Bos taurus"]);
    let names: Vec<&str> = options
        .characters
        .iter()
        .map(|character| character.name.as_str())
        .collect();
    assert_eq!(names, vec!["tail length", "horn shape", "body mass"]);
    assert_eq!(options.max_state_count(), 3);
    assert_eq!(options.cells.cell_count(), 7);
    assert_eq!(options.blocks.len(), 1);
}

#[test]
fn nexus_export_round_trips_imported_scores() {
    let imported = import_horned_mammals();
    let output = render(&imported, ExportFormat::Nexus, ExportFlags::default());

    assert!(output.starts_with("#NEXUS\n\nBEGIN TAXA;\n\tDIMENSIONS NTAX=2;\n"));
    assert!(output.contains("\t\t'†Bos taurus'\n"));
    assert!(output.contains("\tFORMAT DATATYPE=STANDARD GAP=- MISSING=? SYMBOLS=\"0 1 2\";\n"));
    assert!(output.contains("\t'Canis lupus' 0 {12} 1.5-2.5\n"));
    assert!(output.contains("\t'†Bos taurus' - (02) ?\n"));
    assert!(output.contains("\tTYPESET * UNTITLED = unord: 1 3, ord: 2;\n"));
    assert!(!output.contains("BEGIN NOTES;"));
    assert!(output.ends_with("BEGIN MESQUITE;\n\tTITLE 'kept';\nEND;\n\n"));
}

#[test]
fn nexus_notes_block_follows_the_notes_flag() {
    let imported = import_horned_mammals();
    let flags = ExportFlags {
        include_notes: true,
        ..ExportFlags::default()
    };
    let output = render(&imported, ExportFormat::Nexus, flags);

    assert!(output.contains("BEGIN NOTES;\n"));
    assert!(output.contains("\tTEXT TAXON=2 TEXT='aurochs line';\n"));
    assert!(output.contains("\tTEXT TAXON=1 CHARACTER=2 TEXT='worn horn';\n"));
}

#[test]
fn tnt_export_splits_discrete_and_continuous_runs() {
    let imported = import_horned_mammals();
    let output = render(&imported, ExportFormat::Tnt, ExportFlags::default());

    assert_eq!(
        output,
        "nstates num 3;\n\
         xread\n\
         'Horned mammals'\n\
         3 2\n\
         &[num]\n\
         Canis_lupus 0[12]\n\
         †Bos_taurus -[02]\n\
         &[cont]\n\
         Canis_lupus 1.5-2.5\n\
         †Bos_taurus ?\n\
         ;\n\
         ccode - 0 2 + 1;\n\
         proc /;\n"
    );
}

#[test]
fn tnt_export_prints_states_past_the_thirty_second() {
    let mut conn = open_db_in_memory().unwrap();
    let states: Vec<_> = (0..34)
        .map(|num| json!({ "name": format!("stripe count {num}") }))
        .collect();
    let mut upload: MatrixUpload = serde_json::from_value(json!({
        "format": "TNT",
        "taxa": [{"genus": "Canis", "specific_epithet": "lupus"}],
        "characters": [{"name": "coat stripes", "states": states}],
        "cells": [["X"]]
    }))
    .unwrap();
    let file = UploadFile {
        file_name: "stripes.tnt".to_string(),
        content: b"xread\n".to_vec(),
    };
    let report = MatrixImportService::new(&mut conn)
        .create_and_import(
            &NewMatrix::new(1, 7, "Striped"),
            ImportRequest {
                user_id: 7,
                notes: None,
                upload: &mut upload,
                file: &file,
            },
        )
        .unwrap();

    let mut output = String::new();
    export_matrix(
        &conn,
        report.matrix_id,
        ExportFormat::Tnt,
        ExportFlags::default(),
        |chunk: &str| output.push_str(chunk),
    )
    .unwrap();

    assert!(output.starts_with("nstates num 34;\n"));
    assert!(output.contains("&[num]\nCanis_lupus X\n"));
}

#[test]
fn nexml_export_references_stored_ids() {
    let imported = import_horned_mammals();
    let output = render(&imported, ExportFormat::NeXml, ExportFlags::default());
    let canis = imported.upload.taxa[0].taxon_id.unwrap();
    let tail = imported.upload.characters[0].character_id.unwrap();
    let body_mass = imported.upload.characters[2].character_id.unwrap();

    assert!(output.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
    assert!(output.contains(&format!("<row id=\"row{canis}\" otu=\"otu{canis}\">")));
    assert!(output.contains(&format!("<char id=\"char{tail}\" label=\"tail length\"")));
    assert!(output.contains(&format!("<uncertain_state_set id=\"gap{tail}\"")));
    assert!(!output.contains(&format!("char{body_mass}\"")));
}

#[test]
fn listings_print_numbered_characters_and_rules() {
    let imported = import_horned_mammals();
    let horn = imported.upload.characters[1].character_id.unwrap();
    let tail = imported.upload.characters[0].character_id.unwrap();

    let characters = SqliteCharacterRepository::try_new(&imported.conn).unwrap();
    let horn_states = characters
        .get_project_character(1, horn)
        .unwrap()
        .unwrap()
        .states;
    characters
        .create_rule(
            horn,
            Some(horn_states[0].state_id),
            7,
            &[NewRuleAction {
                character_id: tail,
                state_id: None,
                kind: RuleActionKind::SetInapplicable,
            }],
        )
        .unwrap();

    let list = render(&imported, ExportFormat::CharacterList, ExportFlags::default());
    assert!(list.starts_with("1. tail length\n\tshort (0); long (1)\n"));
    assert!(list.contains("2. horn shape: outline of the keratin sheath\n"));
    assert!(list.ends_with("3. body mass\n"));

    let rules = render(&imported, ExportFormat::CharacterRules, ExportFlags::default());
    assert_eq!(
        rules,
        "Character \tState     \tAction\tTarget character\tTarget state\n\
         horn shape\tabsent (0)\tset inapplicable\ttail length\t-\n"
    );
}

#[test]
fn exporting_a_missing_matrix_is_an_error() {
    let conn = open_db_in_memory().unwrap();
    let err = export_matrix(&conn, 42, ExportFormat::Nexus, ExportFlags::default(), |_: &str| {})
        .unwrap_err();
    assert!(matches!(err, ExportError::MatrixNotFound(42)));
}
