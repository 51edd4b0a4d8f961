//! TNT exporter.
//!
//! # Responsibility
//! - Write an `xread` matrix split into `&[num]` and `&[cont]` runs.
//! - Declare character orderings through `ccode`.
//!
//! # Invariants
//! - Character order is never changed: consecutive characters of the same
//!   kind share one block, a kind change opens a new block.
//! - TNT numbers characters from 0; `ccode` only declares unordered (`-`)
//!   and ordered (`+`) characters.

use crate::codec::ordering::compact_orderings;
use crate::codec::symbol::TNT_ALPHABET;
use crate::export::score::{render_discrete_score, render_numeric_score};
use crate::export::{ExportOptions, Exporter, SinkWriter};
use crate::model::character::{Character, CharacterOrdering};

pub struct TntExporter<S: FnMut(&str)> {
    out: SinkWriter<S>,
}

impl<S: FnMut(&str)> TntExporter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            out: SinkWriter::new(sink),
        }
    }

    fn write_block(&mut self, options: &ExportOptions, labels: &[String], run: &[Character]) {
        let numeric = run.first().is_some_and(|character| character.kind.is_numeric());
        self.out
            .write_line(if numeric { "&[cont]" } else { "&[num]" });

        for (taxon, label) in options.taxa.iter().zip(labels) {
            let scores: Vec<String> = run
                .iter()
                .map(|character| {
                    let cells = options.cells.get(taxon.taxon_id, character.character_id);
                    if numeric {
                        render_numeric_score(cells)
                    } else {
                        render_discrete_score(cells, character, &TNT_ALPHABET, |_| ('[', ']'))
                    }
                })
                .collect();
            let row = if numeric {
                scores.join(" ")
            } else {
                scores.concat()
            };
            self.out.write_line(&format!("{label} {row}"));
        }
    }

    fn write_ccode(&mut self, options: &ExportOptions) {
        let columns = options.character_columns(0);
        let Some(groups) = compact_orderings(&options.characters, &columns) else {
            return;
        };

        let mut parts = Vec::new();
        for group in &groups {
            let symbol = match group.ordering {
                CharacterOrdering::Unordered => "-",
                CharacterOrdering::Ordered => "+",
                CharacterOrdering::Irreversible | CharacterOrdering::Dollo => continue,
            };
            let ranges: Vec<String> = group.ranges.iter().map(|range| range.render(".")).collect();
            parts.push(format!("{symbol} {}", ranges.join(" ")));
        }
        if parts.is_empty() {
            return;
        }

        self.out.write_line(&format!("ccode {};", parts.join(" ")));
    }
}

impl<S: FnMut(&str)> Exporter for TntExporter<S> {
    fn export(&mut self, options: &ExportOptions) {
        self.out
            .write_line(&format!("nstates num {};", options.max_state_count()));
        self.out.write_line("xread");
        self.out
            .write_line(&format!("'{}'", tnt_text(&options.matrix.title)));
        self.out.write_line(&format!(
            "{} {}",
            options.characters.len(),
            options.taxa.len()
        ));

        let labels: Vec<String> = options
            .taxa
            .iter()
            .map(|taxon| tnt_name(&options.taxon_label(taxon)))
            .collect();
        for run in partition_by_kind(&options.characters) {
            self.write_block(options, &labels, run);
        }

        self.out.write_line(";");
        self.write_ccode(options);
        self.out.write_line("proc /;");
    }
}

/// Splits characters into maximal runs of the same numeric-ness, keeping
/// column order.
fn partition_by_kind(characters: &[Character]) -> Vec<&[Character]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for index in 1..=characters.len() {
        let boundary = index == characters.len()
            || characters[index].kind.is_numeric() != characters[start].kind.is_numeric();
        if boundary {
            runs.push(&characters[start..index]);
            start = index;
        }
    }
    runs
}

fn tnt_name(label: &str) -> String {
    label
        .replace('\'', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn tnt_text(text: &str) -> String {
    text.replace('\'', "").replace(['\r', '\n'], " ")
}
