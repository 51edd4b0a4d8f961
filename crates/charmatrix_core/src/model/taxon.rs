//! Taxon domain model.
//!
//! # Responsibility
//! - Hold the taxonomic rank fields that identify a taxon inside a project.
//! - Compute the content hash used as the per-project dedup key.
//! - Render display labels for exporters (the shared taxon namer).
//!
//! # Invariants
//! - Within one project no two taxa share a `name_hash`.
//! - The hash covers non-empty rank fields plus author; notes and the
//!   extinct flag never participate.

use crate::codec::sanitize::clean_name;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Database identifier of a taxon row.
pub type TaxonId = i64;

/// Marker prepended to labels of extinct taxa.
pub const EXTINCT_MARKER: &str = "†";

/// Taxonomic rank fields, ordered from most inclusive to least inclusive.
///
/// The variant order is the canonical concatenation order for hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonRank {
    SupraspecificClade,
    Kingdom,
    Phylum,
    Class,
    Subclass,
    Order,
    Suborder,
    Superfamily,
    Family,
    Subfamily,
    Tribe,
    Subtribe,
    Genus,
    Subgenus,
    SpecificEpithet,
    SubspecificEpithet,
}

impl TaxonRank {
    pub const ALL: [TaxonRank; 16] = [
        TaxonRank::SupraspecificClade,
        TaxonRank::Kingdom,
        TaxonRank::Phylum,
        TaxonRank::Class,
        TaxonRank::Subclass,
        TaxonRank::Order,
        TaxonRank::Suborder,
        TaxonRank::Superfamily,
        TaxonRank::Family,
        TaxonRank::Subfamily,
        TaxonRank::Tribe,
        TaxonRank::Subtribe,
        TaxonRank::Genus,
        TaxonRank::Subgenus,
        TaxonRank::SpecificEpithet,
        TaxonRank::SubspecificEpithet,
    ];

    /// Column/field name used in storage and upload objects.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::SupraspecificClade => "supraspecific_clade",
            Self::Kingdom => "kingdom",
            Self::Phylum => "phylum",
            Self::Class => "class",
            Self::Subclass => "subclass",
            Self::Order => "order",
            Self::Suborder => "suborder",
            Self::Superfamily => "superfamily",
            Self::Family => "family",
            Self::Subfamily => "subfamily",
            Self::Tribe => "tribe",
            Self::Subtribe => "subtribe",
            Self::Genus => "genus",
            Self::Subgenus => "subgenus",
            Self::SpecificEpithet => "specific_epithet",
            Self::SubspecificEpithet => "subspecific_epithet",
        }
    }

    pub fn from_field_name(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rank| rank.field_name() == value)
    }

    /// Ranks at or below genus render as a binomial/trinomial label.
    pub fn is_species_level(self) -> bool {
        self >= Self::Genus
    }
}

/// Name parts of a taxon. Empty strings are treated the same as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonNames {
    pub supraspecific_clade: Option<String>,
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub subclass: Option<String>,
    pub order: Option<String>,
    pub suborder: Option<String>,
    pub superfamily: Option<String>,
    pub family: Option<String>,
    pub subfamily: Option<String>,
    pub tribe: Option<String>,
    pub subtribe: Option<String>,
    pub genus: Option<String>,
    pub subgenus: Option<String>,
    pub specific_epithet: Option<String>,
    pub subspecific_epithet: Option<String>,
    pub scientific_name_author: Option<String>,
    pub scientific_name_year: Option<i32>,
}

impl TaxonNames {
    /// Returns the trimmed, non-empty value of one rank field.
    pub fn get(&self, rank: TaxonRank) -> Option<&str> {
        let value = match rank {
            TaxonRank::SupraspecificClade => &self.supraspecific_clade,
            TaxonRank::Kingdom => &self.kingdom,
            TaxonRank::Phylum => &self.phylum,
            TaxonRank::Class => &self.class,
            TaxonRank::Subclass => &self.subclass,
            TaxonRank::Order => &self.order,
            TaxonRank::Suborder => &self.suborder,
            TaxonRank::Superfamily => &self.superfamily,
            TaxonRank::Family => &self.family,
            TaxonRank::Subfamily => &self.subfamily,
            TaxonRank::Tribe => &self.tribe,
            TaxonRank::Subtribe => &self.subtribe,
            TaxonRank::Genus => &self.genus,
            TaxonRank::Subgenus => &self.subgenus,
            TaxonRank::SpecificEpithet => &self.specific_epithet,
            TaxonRank::SubspecificEpithet => &self.subspecific_epithet,
        };
        non_empty(value.as_deref())
    }

    pub fn set(&mut self, rank: TaxonRank, value: Option<String>) {
        let slot = match rank {
            TaxonRank::SupraspecificClade => &mut self.supraspecific_clade,
            TaxonRank::Kingdom => &mut self.kingdom,
            TaxonRank::Phylum => &mut self.phylum,
            TaxonRank::Class => &mut self.class,
            TaxonRank::Subclass => &mut self.subclass,
            TaxonRank::Order => &mut self.order,
            TaxonRank::Suborder => &mut self.suborder,
            TaxonRank::Superfamily => &mut self.superfamily,
            TaxonRank::Family => &mut self.family,
            TaxonRank::Subfamily => &mut self.subfamily,
            TaxonRank::Tribe => &mut self.tribe,
            TaxonRank::Subtribe => &mut self.subtribe,
            TaxonRank::Genus => &mut self.genus,
            TaxonRank::Subgenus => &mut self.subgenus,
            TaxonRank::SpecificEpithet => &mut self.specific_epithet,
            TaxonRank::SubspecificEpithet => &mut self.subspecific_epithet,
        };
        *slot = value;
    }

    pub fn author(&self) -> Option<&str> {
        non_empty(self.scientific_name_author.as_deref())
    }

    /// Dedup key: SHA-256 over every non-empty rank field plus the author.
    pub fn name_hash(&self) -> String {
        let mut joined = String::new();
        for rank in TaxonRank::ALL {
            if let Some(value) = self.get(rank) {
                joined.push_str(value);
            }
        }
        if let Some(author) = self.author() {
            joined.push_str(author);
        }

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns whether every rank field is empty.
    pub fn is_empty(&self) -> bool {
        TaxonRank::ALL.into_iter().all(|rank| self.get(rank).is_none())
    }
}

/// Persisted taxon row.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxon {
    pub taxon_id: TaxonId,
    pub project_id: i64,
    pub names: TaxonNames,
    pub is_extinct: bool,
    pub notes: Option<String>,
    pub name_hash: String,
}

/// Insert model for a taxon row; the hash is derived from `names`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTaxon {
    pub project_id: i64,
    pub user_id: i64,
    pub names: TaxonNames,
    pub is_extinct: bool,
    pub notes: Option<String>,
}

/// Builds the display label of a taxon for the given OTU rank.
///
/// Species-level OTUs render `Genus (Subgenus) epithet subepithet` truncated
/// at the OTU rank; higher OTUs render that single field. Falls back to the
/// most specific non-empty rank, then to `Taxon <id>`.
pub fn taxon_display_name(taxon: &Taxon, otu: TaxonRank, show_author: bool) -> String {
    let names = &taxon.names;
    let mut parts: Vec<String> = Vec::new();

    if otu.is_species_level() {
        for rank in [
            TaxonRank::Genus,
            TaxonRank::Subgenus,
            TaxonRank::SpecificEpithet,
            TaxonRank::SubspecificEpithet,
        ] {
            if rank > otu {
                break;
            }
            if let Some(value) = names.get(rank) {
                if rank == TaxonRank::Subgenus {
                    parts.push(format!("({value})"));
                } else {
                    parts.push(value.to_string());
                }
            }
        }
    } else if let Some(value) = names.get(otu) {
        parts.push(value.to_string());
    }

    if parts.is_empty() {
        if let Some(value) = TaxonRank::ALL
            .into_iter()
            .rev()
            .find_map(|rank| names.get(rank))
        {
            parts.push(value.to_string());
        }
    }

    if parts.is_empty() {
        parts.push(format!("Taxon {}", taxon.taxon_id));
    }

    if show_author {
        if let Some(author) = names.author() {
            match names.scientific_name_year {
                Some(year) => parts.push(format!("{author}, {year}")),
                None => parts.push(author.to_string()),
            }
        }
    }

    clean_name(&parts.join(" "))
}

/// Display label with the extinction marker applied.
pub fn taxon_label(taxon: &Taxon, otu: TaxonRank, show_author: bool) -> String {
    let name = taxon_display_name(taxon, otu, show_author);
    if taxon.is_extinct {
        format!("{EXTINCT_MARKER}{name}")
    } else {
        name
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{taxon_display_name, taxon_label, Taxon, TaxonNames, TaxonRank};

    fn taxon(names: TaxonNames) -> Taxon {
        Taxon {
            taxon_id: 7,
            project_id: 1,
            name_hash: names.name_hash(),
            names,
            is_extinct: false,
            notes: None,
        }
    }

    fn species(genus: &str, epithet: &str) -> TaxonNames {
        TaxonNames {
            genus: Some(genus.to_string()),
            specific_epithet: Some(epithet.to_string()),
            ..TaxonNames::default()
        }
    }

    #[test]
    fn hash_ignores_blank_fields_and_whitespace_padding() {
        let mut padded = species(" Homo ", "sapiens");
        padded.family = Some("   ".to_string());
        assert_eq!(padded.name_hash(), species("Homo", "sapiens").name_hash());
        assert_eq!(padded.name_hash().len(), 64);
    }

    #[test]
    fn hash_includes_author() {
        let mut authored = species("Homo", "sapiens");
        authored.scientific_name_author = Some("Linnaeus".to_string());
        assert_ne!(authored.name_hash(), species("Homo", "sapiens").name_hash());
    }

    #[test]
    fn display_name_uses_binomial_for_species_otu() {
        let mut names = species("Canis", "lupus");
        names.family = Some("Canidae".to_string());
        let taxon = taxon(names);
        assert_eq!(
            taxon_display_name(&taxon, TaxonRank::SpecificEpithet, false),
            "Canis lupus"
        );
        assert_eq!(taxon_display_name(&taxon, TaxonRank::Genus, false), "Canis");
        assert_eq!(taxon_display_name(&taxon, TaxonRank::Family, false), "Canidae");
    }

    #[test]
    fn display_name_appends_author_and_year_when_requested() {
        let mut names = species("Canis", "lupus");
        names.scientific_name_author = Some("Linnaeus".to_string());
        names.scientific_name_year = Some(1758);
        let taxon = taxon(names);
        assert_eq!(
            taxon_display_name(&taxon, TaxonRank::SpecificEpithet, true),
            "Canis lupus Linnaeus, 1758"
        );
    }

    #[test]
    fn display_name_falls_back_to_most_specific_rank_then_id() {
        let taxon_with_order = taxon(TaxonNames {
            order: Some("Carnivora".to_string()),
            ..TaxonNames::default()
        });
        assert_eq!(
            taxon_display_name(&taxon_with_order, TaxonRank::Genus, false),
            "Carnivora"
        );

        let empty = taxon(TaxonNames::default());
        assert_eq!(
            taxon_display_name(&empty, TaxonRank::Genus, false),
            "Taxon 7"
        );
    }

    #[test]
    fn label_marks_extinct_taxa() {
        let mut extinct = taxon(species("Smilodon", "fatalis"));
        extinct.is_extinct = true;
        assert_eq!(
            taxon_label(&extinct, TaxonRank::SpecificEpithet, false),
            "†Smilodon fatalis"
        );
    }

    #[test]
    fn rank_field_names_round_trip() {
        for rank in TaxonRank::ALL {
            assert_eq!(TaxonRank::from_field_name(rank.field_name()), Some(rank));
        }
    }
}
