//! Matrix exporters for external scientific file formats.
//!
//! # Responsibility
//! - Define the `ExportOptions` snapshot every exporter consumes.
//! - Stream one textual or XML document into a caller-supplied sink.
//!
//! # Invariants
//! - Exporters never read storage: every decision comes from
//!   `ExportOptions`.
//! - One `export` call performs one synchronous top-to-bottom write pass.
//! - Exporters assume a well-formed snapshot and perform no validation.

use crate::codec::cell_table::CellTable;
use crate::model::cell::CellNote;
use crate::model::character::{Character, CharacterId, CharacterRule};
use crate::model::matrix::Matrix;
use crate::model::taxon::{taxon_label, Taxon, TaxonId};
use crate::model::upload::UploadBlock;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub mod listing;
pub mod nexml;
pub mod nexus;
mod score;
pub mod tnt;
pub mod xml;

pub use listing::{CharacterListExporter, CharacterRulesExporter};
pub use nexml::NeXmlExporter;
pub use nexus::NexusExporter;
pub use tnt::TntExporter;

/// Export-time switches chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFlags {
    /// Emit taxon, character and cell free text where the format allows.
    pub include_notes: bool,
    /// Print character descriptions inline in the character listing.
    pub include_descriptions: bool,
    /// Append `author, year` to taxon labels.
    pub show_author: bool,
}

impl Default for ExportFlags {
    fn default() -> Self {
        Self {
            include_notes: false,
            include_descriptions: true,
            show_author: true,
        }
    }
}

/// Immutable snapshot of everything an exporter writes.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub matrix: Matrix,
    /// Taxa in row order.
    pub taxa: Vec<Taxon>,
    /// Characters in column order, states sorted by `num`.
    pub characters: Vec<Character>,
    pub cells: CellTable,
    pub cell_notes: Vec<CellNote>,
    /// Raw blocks preserved from a prior upload.
    pub blocks: Vec<UploadBlock>,
    pub rules: Vec<CharacterRule>,
    pub flags: ExportFlags,
}

impl ExportOptions {
    /// Display label of a taxon under the matrix OTU and author settings.
    pub fn taxon_label(&self, taxon: &Taxon) -> String {
        let show_author = self.flags.show_author && !self.matrix.options.hide_taxon_author;
        taxon_label(taxon, self.matrix.otu, show_author)
    }

    /// Maps character ids to their column index starting at `first`.
    pub fn character_columns(&self, first: usize) -> HashMap<CharacterId, usize> {
        self.characters
            .iter()
            .enumerate()
            .map(|(index, character)| (character.character_id, index + first))
            .collect()
    }

    /// Maps taxon ids to their row index starting at `first`.
    pub fn taxon_rows(&self, first: usize) -> HashMap<TaxonId, usize> {
        self.taxa
            .iter()
            .enumerate()
            .map(|(index, taxon)| (taxon.taxon_id, index + first))
            .collect()
    }

    /// Largest state count over discrete characters; `0` when none exist.
    pub fn max_state_count(&self) -> usize {
        self.characters
            .iter()
            .filter(|character| !character.kind.is_numeric())
            .map(|character| character.states.len())
            .max()
            .unwrap_or(0)
    }

    pub fn has_numeric_characters(&self) -> bool {
        self.characters
            .iter()
            .any(|character| character.kind.is_numeric())
    }
}

/// Output format of one export call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Nexus,
    Tnt,
    NeXml,
    CharacterList,
    CharacterRules,
}

impl ExportFormat {
    /// File extension (without dot) used in exported filenames.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Nexus => "nex",
            Self::Tnt => "tnt",
            Self::NeXml => "xml",
            Self::CharacterList | Self::CharacterRules => "txt",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nexus => "nexus",
            Self::Tnt => "tnt",
            Self::NeXml => "nexml",
            Self::CharacterList => "characters",
            Self::CharacterRules => "rules",
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nexus" | "nex" => Ok(Self::Nexus),
            "tnt" => Ok(Self::Tnt),
            "nexml" | "xml" => Ok(Self::NeXml),
            "characters" | "character_list" => Ok(Self::CharacterList),
            "rules" | "character_rules" => Ok(Self::CharacterRules),
            other => Err(format!(
                "unsupported export format `{other}`; expected nexus|tnt|nexml|characters|rules"
            )),
        }
    }
}

/// A single-pass document writer.
pub trait Exporter {
    fn export(&mut self, options: &ExportOptions);
}

/// Line-oriented wrapper over a text sink callback.
pub(crate) struct SinkWriter<S: FnMut(&str)> {
    sink: S,
}

impl<S: FnMut(&str)> SinkWriter<S> {
    pub(crate) fn new(sink: S) -> Self {
        Self { sink }
    }

    pub(crate) fn write(&mut self, text: &str) {
        (self.sink)(text);
    }

    pub(crate) fn write_line(&mut self, line: &str) {
        (self.sink)(line);
        (self.sink)("\n");
    }
}

/// Builds the exporter for `format` over `sink`.
pub fn exporter_for<'a, S>(format: ExportFormat, sink: S) -> Box<dyn Exporter + 'a>
where
    S: FnMut(&str) + 'a,
{
    match format {
        ExportFormat::Nexus => Box::new(NexusExporter::new(sink)),
        ExportFormat::Tnt => Box::new(TntExporter::new(sink)),
        ExportFormat::NeXml => Box::new(NeXmlExporter::new(sink)),
        ExportFormat::CharacterList => Box::new(CharacterListExporter::new(sink)),
        ExportFormat::CharacterRules => Box::new(CharacterRulesExporter::new(sink)),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_options;
    use super::{exporter_for, ExportFormat};

    #[test]
    fn format_names_and_extensions() {
        assert_eq!("NEXUS".parse::<ExportFormat>().unwrap(), ExportFormat::Nexus);
        assert_eq!("xml".parse::<ExportFormat>().unwrap(), ExportFormat::NeXml);
        assert!("phylip".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Tnt.extension(), "tnt");
        assert_eq!(ExportFormat::CharacterRules.extension(), "txt");
    }

    #[test]
    fn max_state_count_ignores_numeric_characters() {
        let mut options = sample_options();
        assert_eq!(options.max_state_count(), 3);
        options.characters.retain(|character| character.kind.is_numeric());
        assert_eq!(options.max_state_count(), 0);
    }

    #[test]
    fn boxed_exporter_writes_into_sink() {
        let options = sample_options();
        let mut output = String::new();
        {
            let mut exporter =
                exporter_for(ExportFormat::Nexus, |chunk: &str| output.push_str(chunk));
            exporter.export(&options);
        }
        assert!(output.starts_with("#NEXUS\n"));
    }
}
