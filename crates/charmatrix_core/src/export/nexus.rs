//! NEXUS exporter.
//!
//! # Responsibility
//! - Write `TAXA`, `CHARACTERS`, optional `NOTES` and `ASSUMPTIONS` blocks.
//! - Echo preserved upload blocks verbatim at the end of the document.
//!
//! # Invariants
//! - `DATATYPE=MERISTIC` only for meristic matrices; state labels are then
//!   written inline through `CHARSTATELABELS`.
//! - Unscored pairs print `?`, a lone stateless entry prints `-`.
//! - Multi-state cells use `{}` when the first entry is uncertain and `()`
//!   otherwise.

use crate::codec::ordering::compact_orderings;
use crate::codec::sanitize::{clean_name, clean_text};
use crate::codec::symbol::NEXUS_ALPHABET;
use crate::export::score::{render_discrete_score, render_numeric_score};
use crate::export::{ExportOptions, Exporter, SinkWriter};
use crate::model::character::Character;
use crate::model::matrix::MatrixType;

pub struct NexusExporter<S: FnMut(&str)> {
    out: SinkWriter<S>,
}

impl<S: FnMut(&str)> NexusExporter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            out: SinkWriter::new(sink),
        }
    }

    fn write_taxa_block(&mut self, options: &ExportOptions) {
        self.out.write_line("BEGIN TAXA;");
        self.out
            .write_line(&format!("\tDIMENSIONS NTAX={};", options.taxa.len()));
        self.out.write_line("\tTAXLABELS");
        for taxon in &options.taxa {
            self.out
                .write_line(&format!("\t\t{}", quote(&options.taxon_label(taxon))));
        }
        self.out.write_line("\t;");
        self.out.write_line("END;");
        self.out.write_line("");
    }

    fn write_characters_block(&mut self, options: &ExportOptions) {
        let meristic = options.matrix.kind == MatrixType::Meristic;
        let datatype = if meristic { "MERISTIC" } else { "STANDARD" };

        self.out.write_line("BEGIN CHARACTERS;");
        self.out.write_line(&format!(
            "\tDIMENSIONS NCHAR={};",
            options.characters.len()
        ));

        let mut format_line = format!(
            "\tFORMAT DATATYPE={datatype} GAP={} MISSING={}",
            NEXUS_ALPHABET.gap, NEXUS_ALPHABET.missing
        );
        let symbol_count = options.max_state_count();
        if symbol_count > 0 {
            format_line.push_str(&format!(
                " SYMBOLS=\"{}\"",
                NEXUS_ALPHABET.declaration(symbol_count)
            ));
        }
        format_line.push(';');
        self.out.write_line(&format_line);

        if meristic {
            self.write_char_state_labels(options);
        } else {
            self.write_char_labels(options);
            self.write_state_labels(options);
        }

        self.write_matrix(options);
        self.out.write_line("END;");
        self.out.write_line("");
    }

    fn write_char_state_labels(&mut self, options: &ExportOptions) {
        let entries: Vec<String> = options
            .characters
            .iter()
            .enumerate()
            .map(|(index, character)| {
                let mut entry =
                    format!("\t\t{} {}", index + 1, quote(&clean_name(&character.name)));
                if !character.states.is_empty() {
                    entry.push_str(" / ");
                    entry.push_str(&state_list(character));
                }
                entry
            })
            .collect();

        self.out.write_line("\tCHARSTATELABELS");
        if !entries.is_empty() {
            self.out.write_line(&entries.join(",\n"));
        }
        self.out.write_line("\t;");
    }

    fn write_char_labels(&mut self, options: &ExportOptions) {
        self.out.write_line("\tCHARLABELS");
        for (index, character) in options.characters.iter().enumerate() {
            self.out.write_line(&format!(
                "\t\t[{}] {}",
                index + 1,
                quote(&clean_name(&character.name))
            ));
        }
        self.out.write_line("\t;");
    }

    fn write_state_labels(&mut self, options: &ExportOptions) {
        let entries: Vec<String> = options
            .characters
            .iter()
            .enumerate()
            .filter(|(_, character)| !character.states.is_empty())
            .map(|(index, character)| format!("\t\t{} {}", index + 1, state_list(character)))
            .collect();
        if entries.is_empty() {
            return;
        }

        self.out.write_line("\tSTATELABELS");
        self.out.write_line(&entries.join(",\n"));
        self.out.write_line("\t;");
    }

    fn write_matrix(&mut self, options: &ExportOptions) {
        let separated = options.matrix.kind == MatrixType::Meristic
            || options.has_numeric_characters();
        let labels: Vec<String> = options
            .taxa
            .iter()
            .map(|taxon| quote(&options.taxon_label(taxon)))
            .collect();
        let width = labels
            .iter()
            .map(|label| label.chars().count())
            .max()
            .unwrap_or(0);

        self.out.write_line("\tMATRIX");
        for (taxon, label) in options.taxa.iter().zip(&labels) {
            let scores: Vec<String> = options
                .characters
                .iter()
                .map(|character| {
                    let cells = options.cells.get(taxon.taxon_id, character.character_id);
                    if character.kind.is_numeric() {
                        render_numeric_score(cells)
                    } else {
                        render_discrete_score(cells, character, &NEXUS_ALPHABET, nexus_brackets)
                    }
                })
                .collect();
            let row = if separated {
                scores.join(" ")
            } else {
                scores.concat()
            };
            self.out
                .write_line(&format!("\t{label:<width$} {row}"));
        }
        self.out.write_line("\t;");
    }

    fn write_notes_block(&mut self, options: &ExportOptions) {
        let mut statements = Vec::new();

        for (index, taxon) in options.taxa.iter().enumerate() {
            if let Some(text) = non_blank(taxon.notes.as_deref()) {
                statements.push(format!(
                    "\tTEXT TAXON={} TEXT='{}';",
                    index + 1,
                    clean_text(text)
                ));
            }
        }

        for (index, character) in options.characters.iter().enumerate() {
            if let Some(text) = non_blank(character.description.as_deref()) {
                statements.push(format!(
                    "\tTEXT CHARACTER={} TEXT='{}';",
                    index + 1,
                    clean_text(text)
                ));
            }
        }

        let rows = options.taxon_rows(1);
        let columns = options.character_columns(1);
        let mut cell_notes: Vec<(usize, usize, &str)> = options
            .cell_notes
            .iter()
            .filter_map(|note| {
                let row = rows.get(&note.taxon_id)?;
                let column = columns.get(&note.character_id)?;
                let text = non_blank(Some(note.notes.as_str()))?;
                Some((*row, *column, text))
            })
            .collect();
        cell_notes.sort_by_key(|(row, column, _)| (*row, *column));
        for (row, column, text) in cell_notes {
            statements.push(format!(
                "\tTEXT TAXON={row} CHARACTER={column} TEXT='{}';",
                clean_text(text)
            ));
        }

        if statements.is_empty() {
            return;
        }

        self.out.write_line("BEGIN NOTES;");
        for statement in &statements {
            self.out.write_line(statement);
        }
        self.out.write_line("END;");
        self.out.write_line("");
    }

    fn write_assumptions_block(&mut self, options: &ExportOptions) {
        let columns = options.character_columns(1);
        let Some(groups) = compact_orderings(&options.characters, &columns) else {
            return;
        };

        let typeset = groups
            .iter()
            .map(|group| {
                let ranges: Vec<String> =
                    group.ranges.iter().map(|range| range.render("-")).collect();
                format!("{}: {}", group.ordering.nexus_name(), ranges.join(" "))
            })
            .collect::<Vec<_>>()
            .join(", ");

        self.out.write_line("BEGIN ASSUMPTIONS;");
        self.out
            .write_line(&format!("\tTYPESET * UNTITLED = {typeset};"));
        self.out.write_line("END;");
        self.out.write_line("");
    }

    fn write_raw_blocks(&mut self, options: &ExportOptions) {
        for block in &options.blocks {
            self.out.write_line(&format!("BEGIN {};", block.name));
            self.out.write(&block.content);
            if !block.content.ends_with('\n') {
                self.out.write("\n");
            }
            self.out.write_line("END;");
            self.out.write_line("");
        }
    }
}

impl<S: FnMut(&str)> Exporter for NexusExporter<S> {
    fn export(&mut self, options: &ExportOptions) {
        self.out.write_line("#NEXUS");
        self.out.write_line("");
        self.write_taxa_block(options);
        self.write_characters_block(options);
        if options.flags.include_notes {
            self.write_notes_block(options);
        }
        self.write_assumptions_block(options);
        self.write_raw_blocks(options);
    }
}

fn nexus_brackets(uncertain: bool) -> (char, char) {
    if uncertain {
        ('{', '}')
    } else {
        ('(', ')')
    }
}

fn quote(label: &str) -> String {
    format!("'{label}'")
}

fn state_list(character: &Character) -> String {
    character
        .states
        .iter()
        .map(|state| quote(&clean_name(&state.name)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::NexusExporter;
    use crate::export::test_support::{cell, sample_options};
    use crate::export::Exporter;
    use crate::model::cell::CellNote;
    use crate::model::matrix::MatrixType;
    use crate::model::upload::UploadBlock;

    fn render(options: &crate::export::ExportOptions) -> String {
        let mut output = String::new();
        NexusExporter::new(|chunk: &str| output.push_str(chunk)).export(options);
        output
    }

    #[test]
    fn writes_taxa_and_standard_character_blocks() {
        let output = render(&sample_options());

        assert!(output.starts_with("#NEXUS\n\nBEGIN TAXA;\n\tDIMENSIONS NTAX=2;\n"));
        assert!(output.contains("\t\t'Canis lupus'\n"));
        assert!(output.contains("\tFORMAT DATATYPE=STANDARD GAP=- MISSING=? SYMBOLS=\"0 1 2\";\n"));
        assert!(output.contains("\t\t[2] 'horn shape'\n"));
        assert!(output.contains("\tSTATELABELS\n\t\t1 'short' 'long',\n\t\t2 'absent' 'straight' 'curved'\n\t;\n"));
        assert!(!output.contains("CHARSTATELABELS"));
    }

    #[test]
    fn matrix_rows_distinguish_gap_missing_and_brackets() {
        let output = render(&sample_options());

        assert!(output.contains("\t'Canis lupus' 0 {12} 1.5-2.5\n"));
        assert!(output.contains("\t'Bos taurus'  - (02) ?\n"));
    }

    #[test]
    fn discrete_only_rows_are_concatenated() {
        let mut options = sample_options();
        options.characters.retain(|character| !character.kind.is_numeric());
        let output = render(&options);

        assert!(output.contains("\t'Canis lupus' 0{12}\n"));
        assert!(output.contains("\t'Bos taurus'  -(02)\n"));
    }

    #[test]
    fn single_gap_entry_exports_dash_and_absent_entry_exports_question_mark() {
        let mut options = sample_options();
        options.characters.truncate(1);
        options.cells = crate::codec::cell_table::CellTable::from_cells([cell(100, 1, None)]);
        let output = render(&options);

        assert!(output.contains("\t'Canis lupus' -\n"));
        assert!(output.contains("\t'Bos taurus'  ?\n"));
    }

    #[test]
    fn meristic_matrix_writes_inline_state_labels() {
        let mut options = sample_options();
        options.matrix.kind = MatrixType::Meristic;
        let output = render(&options);

        assert!(output.contains("DATATYPE=MERISTIC"));
        assert!(output.contains(
            "\tCHARSTATELABELS\n\t\t1 'tail length' / 'short' 'long',\n\t\t2 'horn shape' / 'absent' 'straight' 'curved',\n\t\t3 'body mass'\n\t;\n"
        ));
        assert!(!output.contains("\tSTATELABELS"));
    }

    #[test]
    fn assumptions_block_lists_compacted_orderings() {
        let output = render(&sample_options());
        assert!(output.contains("BEGIN ASSUMPTIONS;\n\tTYPESET * UNTITLED = unord: 1 3, ord: 2;\nEND;\n"));
    }

    #[test]
    fn notes_block_only_written_when_requested_and_present() {
        let mut options = sample_options();
        assert!(!render(&options).contains("BEGIN NOTES;"));

        options.flags.include_notes = true;
        assert!(!render(&options).contains("BEGIN NOTES;"));

        options.taxa[1].notes = Some("Domestic\nform".to_string());
        options.cell_notes.push(CellNote {
            note_id: 1,
            matrix_id: 9,
            taxon_id: 100,
            character_id: 2,
            notes: "Horn sheath's keratin".to_string(),
        });
        let output = render(&options);
        assert!(output.contains("\tTEXT TAXON=2 TEXT='Domestic^nform';\n"));
        assert!(output.contains("\tTEXT TAXON=1 CHARACTER=2 TEXT='Horn sheath''s keratin';\n"));
    }

    #[test]
    fn preserved_blocks_are_echoed_last() {
        let mut options = sample_options();
        options.blocks.push(UploadBlock {
            name: "MESQUITE".to_string(),
            content: "\tTITLE 'kept';".to_string(),
        });
        let output = render(&options);
        assert!(output.ends_with("BEGIN MESQUITE;\n\tTITLE 'kept';\nEND;\n\n"));
    }

    #[test]
    fn all_numeric_matrix_omits_symbols() {
        let mut options = sample_options();
        options.characters.retain(|character| character.kind.is_numeric());
        let output = render(&options);
        assert!(output.contains("\tFORMAT DATATYPE=STANDARD GAP=- MISSING=?;\n"));
        assert!(output.contains("\t'Canis lupus' 1.5-2.5\n"));
    }
}
