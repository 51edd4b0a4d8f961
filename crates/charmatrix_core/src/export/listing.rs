//! Plain-text character and rule listings.
//!
//! # Invariants
//! - Character numbering is 1-based unless the matrix asks for zero-based
//!   numbering.
//! - A rule with several actions prints its rule columns once; repeated
//!   rows pad those columns with blanks.

use crate::codec::sanitize::clean_name;
use crate::export::{ExportOptions, Exporter, SinkWriter};
use crate::model::character::{Character, CharacterId, StateId};

pub struct CharacterListExporter<S: FnMut(&str)> {
    out: SinkWriter<S>,
}

impl<S: FnMut(&str)> CharacterListExporter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            out: SinkWriter::new(sink),
        }
    }
}

impl<S: FnMut(&str)> Exporter for CharacterListExporter<S> {
    fn export(&mut self, options: &ExportOptions) {
        let first = if options.matrix.options.zero_based_numbering {
            0
        } else {
            1
        };

        for (index, character) in options.characters.iter().enumerate() {
            let mut line = format!("{}. {}", index + first, clean_name(&character.name));
            if options.flags.include_descriptions {
                if let Some(description) = non_blank(character.description.as_deref()) {
                    line.push_str(": ");
                    line.push_str(&clean_name(description));
                }
            }
            self.out.write_line(&line);

            if !character.states.is_empty() {
                let states: Vec<String> = character
                    .states
                    .iter()
                    .map(|state| format!("{} ({})", clean_name(&state.name), state.num))
                    .collect();
                self.out.write_line(&format!("\t{}", states.join("; ")));
            }
        }
    }
}

pub struct CharacterRulesExporter<S: FnMut(&str)> {
    out: SinkWriter<S>,
}

impl<S: FnMut(&str)> CharacterRulesExporter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            out: SinkWriter::new(sink),
        }
    }
}

const RULE_HEADER: [&str; 5] = [
    "Character",
    "State",
    "Action",
    "Target character",
    "Target state",
];

impl<S: FnMut(&str)> Exporter for CharacterRulesExporter<S> {
    fn export(&mut self, options: &ExportOptions) {
        let mut rows: Vec<[String; 5]> = Vec::new();
        let mut repeated: Vec<bool> = Vec::new();
        for rule in &options.rules {
            let character = character_name(options, rule.character_id);
            let state = state_name(options, rule.character_id, rule.state_id);
            for (position, action) in rule.actions.iter().enumerate() {
                rows.push([
                    character.clone(),
                    state.clone(),
                    action.kind.label().to_string(),
                    character_name(options, action.character_id),
                    state_name(options, action.character_id, action.state_id),
                ]);
                repeated.push(position > 0);
            }
        }

        let character_width = column_width(&rows, 0);
        let state_width = column_width(&rows, 1);

        self.out.write_line(&format!(
            "{:<character_width$}\t{:<state_width$}\t{}",
            RULE_HEADER[0],
            RULE_HEADER[1],
            RULE_HEADER[2..].join("\t")
        ));
        for (row, repeated) in rows.iter().zip(repeated) {
            let (character, state) = if repeated {
                ("", "")
            } else {
                (row[0].as_str(), row[1].as_str())
            };
            self.out.write_line(&format!(
                "{character:<character_width$}\t{state:<state_width$}\t{}\t{}\t{}",
                row[2], row[3], row[4]
            ));
        }
    }
}

fn column_width(rows: &[[String; 5]], column: usize) -> usize {
    rows.iter()
        .map(|row| row[column].chars().count())
        .chain(std::iter::once(RULE_HEADER[column].chars().count()))
        .max()
        .unwrap_or(0)
}

fn find_character(options: &ExportOptions, character_id: CharacterId) -> Option<&Character> {
    options
        .characters
        .iter()
        .find(|character| character.character_id == character_id)
}

fn character_name(options: &ExportOptions, character_id: CharacterId) -> String {
    find_character(options, character_id)
        .map(|character| clean_name(&character.name))
        .unwrap_or_else(|| format!("Character {character_id}"))
}

fn state_name(options: &ExportOptions, character_id: CharacterId, state_id: Option<StateId>) -> String {
    let Some(state_id) = state_id else {
        return "-".to_string();
    };
    find_character(options, character_id)
        .and_then(|character| character.state_by_id(state_id))
        .map(|state| format!("{} ({})", clean_name(&state.name), state.num))
        .unwrap_or_else(|| format!("State {state_id}"))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
