//! Character, state and character-rule domain model.
//!
//! # Responsibility
//! - Define characters (matrix columns) with their ordered states.
//! - Define character rules consumed by the rules listing.
//!
//! # Invariants
//! - State `num` values of a character are dense, consecutive from 0 and
//!   sorted ascending; `num` is the symbol index used by exporters.
//! - A character's `kind` never changes once it carries scored data.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Database identifier of a character row.
pub type CharacterId = i64;
/// Database identifier of a character state row.
pub type StateId = i64;

/// Scoring type of a character. Stored as its integer discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterType {
    Discrete,
    Continuous,
    Meristic,
}

impl CharacterType {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Discrete => 0,
            Self::Continuous => 1,
            Self::Meristic => 2,
        }
    }

    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Discrete),
            1 => Some(Self::Continuous),
            2 => Some(Self::Meristic),
            _ => None,
        }
    }

    /// Continuous and meristic characters carry numeric start/end values.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Discrete)
    }
}

impl Display for CharacterType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Discrete => "discrete",
            Self::Continuous => "continuous",
            Self::Meristic => "meristic",
        };
        f.write_str(label)
    }
}

/// Ordering assumption of a character.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CharacterOrdering {
    #[default]
    Unordered,
    Ordered,
    Irreversible,
    Dollo,
}

impl CharacterOrdering {
    pub fn to_db(self) -> i64 {
        match self {
            Self::Unordered => 0,
            Self::Ordered => 1,
            Self::Irreversible => 2,
            Self::Dollo => 3,
        }
    }

    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Unordered),
            1 => Some(Self::Ordered),
            2 => Some(Self::Irreversible),
            3 => Some(Self::Dollo),
            _ => None,
        }
    }

    /// Type name used in a NEXUS `TYPESET` statement.
    pub fn nexus_name(self) -> &'static str {
        match self {
            Self::Unordered => "unord",
            Self::Ordered => "ord",
            Self::Irreversible => "irrev",
            Self::Dollo => "Dollo",
        }
    }
}

/// One state of a discrete character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterState {
    pub state_id: StateId,
    pub character_id: CharacterId,
    pub name: String,
    pub description: Option<String>,
    /// Ordinal position; the printed symbol index.
    pub num: u32,
}

/// Persisted character with its states sorted by `num`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub character_id: CharacterId,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub ordering: CharacterOrdering,
    pub kind: CharacterType,
    pub states: Vec<CharacterState>,
}

impl Character {
    /// Finds a state by its ordinal.
    pub fn state_by_num(&self, num: u32) -> Option<&CharacterState> {
        self.states.iter().find(|state| state.num == num)
    }

    pub fn state_by_id(&self, state_id: StateId) -> Option<&CharacterState> {
        self.states.iter().find(|state| state.state_id == state_id)
    }

    /// Next free ordinal: one past the current maximum.
    pub fn next_state_num(&self) -> u32 {
        self.states
            .iter()
            .map(|state| state.num + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Insert model for a character row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCharacter {
    pub project_id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub ordering: CharacterOrdering,
    pub kind: CharacterType,
}

/// Insert model for a state row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCharacterState {
    pub character_id: CharacterId,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub num: u32,
}

/// Effect of a character rule on a target character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleActionKind {
    /// Target cell is scored with `state_id`.
    SetState,
    /// Target character becomes inapplicable.
    SetInapplicable,
}

impl RuleActionKind {
    pub fn to_db(self) -> &'static str {
        match self {
            Self::SetState => "set_state",
            Self::SetInapplicable => "set_inapplicable",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "set_state" => Some(Self::SetState),
            "set_inapplicable" => Some(Self::SetInapplicable),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SetState => "set state",
            Self::SetInapplicable => "set inapplicable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleAction {
    pub action_id: i64,
    pub character_id: CharacterId,
    pub state_id: Option<StateId>,
    pub kind: RuleActionKind,
}

/// Ontology rule: scoring `state_id` on `character_id` triggers `actions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRule {
    pub rule_id: i64,
    pub character_id: CharacterId,
    pub state_id: Option<StateId>,
    pub actions: Vec<RuleAction>,
}

/// Insert model for one rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRuleAction {
    pub character_id: CharacterId,
    pub state_id: Option<StateId>,
    pub kind: RuleActionKind,
}
