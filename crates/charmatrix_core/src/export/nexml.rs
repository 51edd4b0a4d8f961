//! NeXML exporter.
//!
//! # Responsibility
//! - Build a NeXML document (`otus`, `StandardCells` characters) through the
//!   generic XML element writer.
//! - Synthesize `uncertain_state_set` elements for gaps and multi-state
//!   combinations observed in the cell table.
//!
//! # Invariants
//! - Synthetic sets are computed in one pass over the cell table before any
//!   row is written; rows only reference ids declared in `format`.
//! - Only discrete characters are exported; numeric characters have no
//!   `StandardCells` representation.

use crate::codec::sanitize::clean_name;
use crate::export::xml::{write_document, XmlElement};
use crate::export::{ExportOptions, Exporter, SinkWriter};
use crate::model::character::{Character, CharacterId, StateId};
use std::collections::{HashMap, HashSet};

const NEXML_NAMESPACE: &str = "http://www.nexml.org/2009";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub struct NeXmlExporter<S: FnMut(&str)> {
    out: SinkWriter<S>,
}

impl<S: FnMut(&str)> NeXmlExporter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            out: SinkWriter::new(sink),
        }
    }
}

impl<S: FnMut(&str)> Exporter for NeXmlExporter<S> {
    fn export(&mut self, options: &ExportOptions) {
        let document = build_document(options);
        write_document(&document, &mut |chunk: &str| self.out.write(chunk));
    }
}

/// Gap and multi-state sets observed per character.
#[derive(Debug, Default)]
struct SyntheticStates {
    gaps: HashSet<CharacterId>,
    combinations: HashMap<CharacterId, Vec<Vec<StateId>>>,
}

impl SyntheticStates {
    fn collect(options: &ExportOptions, discrete: &HashSet<CharacterId>) -> Self {
        let mut synthetic = Self::default();
        for ((_, character_id), cells) in options.cells.iter() {
            if !discrete.contains(character_id) {
                continue;
            }
            if cells.iter().any(|cell| cell.is_gap()) {
                synthetic.gaps.insert(*character_id);
            }
            if cells.len() > 1 {
                let key = combination_key(cells.iter().filter_map(|cell| cell.state_id));
                let seen = synthetic.combinations.entry(*character_id).or_default();
                if !seen.contains(&key) {
                    seen.push(key);
                }
            }
        }
        synthetic
    }

    fn combination_index(&self, character_id: CharacterId, key: &[StateId]) -> Option<usize> {
        self.combinations
            .get(&character_id)?
            .iter()
            .position(|combination| combination.as_slice() == key)
    }
}

fn build_document(options: &ExportOptions) -> XmlElement {
    let matrix_id = options.matrix.matrix_id;
    let otus_id = format!("otus{matrix_id}");
    let title = clean_name(&options.matrix.title);

    let mut otus = XmlElement::new("otus")
        .attr("id", otus_id.as_str())
        .attr("label", title.as_str());
    for taxon in &options.taxa {
        otus.push(
            XmlElement::new("otu")
                .attr("id", otu_id(taxon.taxon_id))
                .attr("label", options.taxon_label(taxon)),
        );
    }

    let discrete: Vec<&Character> = options
        .characters
        .iter()
        .filter(|character| !character.kind.is_numeric())
        .collect();
    let discrete_ids: HashSet<CharacterId> = discrete
        .iter()
        .map(|character| character.character_id)
        .collect();
    let synthetic = SyntheticStates::collect(options, &discrete_ids);

    let mut format = XmlElement::new("format");
    for character in &discrete {
        format.push(states_element(character, &synthetic));
    }
    for character in &discrete {
        format.push(
            XmlElement::new("char")
                .attr("id", char_id(character.character_id))
                .attr("label", clean_name(&character.name))
                .attr("states", states_id(character.character_id)),
        );
    }

    let mut matrix = XmlElement::new("matrix");
    for taxon in &options.taxa {
        let mut row = XmlElement::new("row")
            .attr("id", format!("row{}", taxon.taxon_id))
            .attr("otu", otu_id(taxon.taxon_id));
        for character in &discrete {
            let cells = options.cells.get(taxon.taxon_id, character.character_id);
            let state = match cells {
                [] => None,
                [single] if single.is_npa => None,
                [single] => Some(match single.state_id {
                    Some(state_id) => state_element_id(state_id),
                    None => gap_id(character.character_id),
                }),
                many => {
                    let key = combination_key(many.iter().filter_map(|cell| cell.state_id));
                    synthetic
                        .combination_index(character.character_id, &key)
                        .map(|index| combination_id(character.character_id, index))
                }
            };
            if let Some(state) = state {
                row.push(
                    XmlElement::new("cell")
                        .attr("char", char_id(character.character_id))
                        .attr("state", state),
                );
            }
        }
        matrix.push(row);
    }

    let characters = XmlElement::new("characters")
        .attr("id", format!("characters{matrix_id}"))
        .attr("otus", otus_id.as_str())
        .attr("xsi:type", "nex:StandardCells")
        .attr("label", title.as_str())
        .child(format)
        .child(matrix);

    XmlElement::new("nex:nexml")
        .attr("xmlns:nex", NEXML_NAMESPACE)
        .attr("xmlns", NEXML_NAMESPACE)
        .attr("xmlns:xsi", XSI_NAMESPACE)
        .attr("version", "0.9")
        .attr("generator", "charmatrix")
        .child(otus)
        .child(characters)
}

fn states_element(character: &Character, synthetic: &SyntheticStates) -> XmlElement {
    let mut states = XmlElement::new("states").attr("id", states_id(character.character_id));
    for state in &character.states {
        states.push(
            XmlElement::new("state")
                .attr("id", state_element_id(state.state_id))
                .attr("label", clean_name(&state.name))
                .attr("symbol", state.num.to_string()),
        );
    }

    let mut next_symbol = character.next_state_num();
    if synthetic.gaps.contains(&character.character_id) {
        states.push(
            XmlElement::new("uncertain_state_set")
                .attr("id", gap_id(character.character_id))
                .attr("symbol", next_symbol.to_string()),
        );
        next_symbol += 1;
    }

    if let Some(combinations) = synthetic.combinations.get(&character.character_id) {
        for (index, combination) in combinations.iter().enumerate() {
            let mut set = XmlElement::new("uncertain_state_set")
                .attr("id", combination_id(character.character_id, index))
                .attr("symbol", next_symbol.to_string());
            for state_id in combination {
                set.push(XmlElement::new("member").attr("state", state_element_id(*state_id)));
            }
            states.push(set);
            next_symbol += 1;
        }
    }

    states
}

fn combination_key(states: impl Iterator<Item = StateId>) -> Vec<StateId> {
    let mut key: Vec<StateId> = states.collect();
    key.sort_unstable();
    key.dedup();
    key
}

fn otu_id(taxon_id: i64) -> String {
    format!("otu{taxon_id}")
}

fn char_id(character_id: CharacterId) -> String {
    format!("char{character_id}")
}

fn states_id(character_id: CharacterId) -> String {
    format!("states{character_id}")
}

fn state_element_id(state_id: StateId) -> String {
    format!("state{state_id}")
}

fn gap_id(character_id: CharacterId) -> String {
    format!("gap{character_id}")
}

fn combination_id(character_id: CharacterId, index: usize) -> String {
    format!("multi{character_id}_{index}")
}
