//! Character, state and character-rule persistence.
//!
//! # Responsibility
//! - Load characters with their states sorted by ordinal.
//! - Create/update characters and states during import.
//! - Load the rules attached to a matrix's characters.
//!
//! # Invariants
//! - `(character_id, num)` is unique; callers pick `num` as current max + 1.
//! - Read paths reject unknown type/ordering/action codes instead of
//!   masking them.

use crate::model::character::{
    Character, CharacterId, CharacterOrdering, CharacterRule, CharacterState, CharacterType,
    NewCharacter, NewCharacterState, NewRuleAction, RuleAction, RuleActionKind, StateId,
};
use crate::model::matrix::MatrixId;
use crate::repo::{ensure_connection_ready, invalid_code, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

const CHARACTER_SELECT_SQL: &str = "SELECT
    c.character_id AS character_id,
    c.project_id AS project_id,
    c.name AS name,
    c.description AS description,
    c.ordering AS ordering,
    c.type AS type
FROM characters c";

const STATE_SELECT_SQL: &str = "SELECT
    s.state_id AS state_id,
    s.character_id AS character_id,
    s.name AS name,
    s.description AS description,
    s.num AS num
FROM character_states s";

pub trait CharacterRepository {
    /// Loads a character (with states) only when it belongs to `project_id`.
    fn get_project_character(
        &self,
        project_id: i64,
        character_id: CharacterId,
    ) -> RepoResult<Option<Character>>;
    /// Inserts a character without states.
    fn create_character(&self, character: &NewCharacter) -> RepoResult<Character>;
    fn update_character(
        &self,
        character_id: CharacterId,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<()>;
    fn create_state(&self, state: &NewCharacterState) -> RepoResult<CharacterState>;
    fn update_state_description(&self, state_id: StateId, description: &str) -> RepoResult<()>;
    /// Characters of a matrix in column order, states sorted by `num`.
    fn list_matrix_characters(&self, matrix_id: MatrixId) -> RepoResult<Vec<Character>>;
    fn create_rule(
        &self,
        character_id: CharacterId,
        state_id: Option<StateId>,
        user_id: i64,
        actions: &[NewRuleAction],
    ) -> RepoResult<CharacterRule>;
    /// Rules whose triggering character belongs to the matrix, in rule order.
    fn list_matrix_rules(&self, matrix_id: MatrixId) -> RepoResult<Vec<CharacterRule>>;
}

/// SQLite-backed character repository.
pub struct SqliteCharacterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCharacterRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                "characters",
                "character_states",
                "matrix_character_order",
                "character_rules",
                "character_rule_actions",
            ],
        )?;
        Ok(Self { conn })
    }

    fn get_character(&self, character_id: CharacterId) -> RepoResult<Option<Character>> {
        let sql = format!("{CHARACTER_SELECT_SQL} WHERE c.character_id = ?1;");
        let character = self
            .conn
            .query_row(&sql, [character_id], parse_character_row)
            .optional()?
            .transpose()?;
        let Some(mut character) = character else {
            return Ok(None);
        };
        character.states = self.list_states(character_id)?;
        Ok(Some(character))
    }

    fn list_states(&self, character_id: CharacterId) -> RepoResult<Vec<CharacterState>> {
        let sql = format!("{STATE_SELECT_SQL} WHERE s.character_id = ?1 ORDER BY s.num ASC;");
        let mut stmt = self.conn.prepare(&sql)?;
        let states = stmt
            .query_map([character_id], parse_state_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(states)
    }

    fn get_state(&self, state_id: StateId) -> RepoResult<CharacterState> {
        let sql = format!("{STATE_SELECT_SQL} WHERE s.state_id = ?1;");
        self.conn
            .query_row(&sql, [state_id], parse_state_row)
            .optional()?
            .ok_or(RepoError::NotFound {
                entity: "character state",
                id: state_id,
            })
    }

    fn list_rule_actions(&self, rule_id: i64) -> RepoResult<Vec<RuleAction>> {
        let mut stmt = self.conn.prepare(
            "SELECT action_id, character_id, state_id, action
             FROM character_rule_actions
             WHERE rule_id = ?1
             ORDER BY action_id ASC;",
        )?;
        let rows = stmt
            .query_map([rule_id], |row| {
                Ok((
                    row.get::<_, i64>("action_id")?,
                    row.get::<_, CharacterId>("character_id")?,
                    row.get::<_, Option<StateId>>("state_id")?,
                    row.get::<_, String>("action")?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(action_id, character_id, state_id, action)| {
                let kind = RuleActionKind::from_db(&action)
                    .ok_or_else(|| invalid_code("character_rule_actions.action", &action))?;
                Ok(RuleAction {
                    action_id,
                    character_id,
                    state_id,
                    kind,
                })
            })
            .collect()
    }
}

impl CharacterRepository for SqliteCharacterRepository<'_> {
    fn get_project_character(
        &self,
        project_id: i64,
        character_id: CharacterId,
    ) -> RepoResult<Option<Character>> {
        match self.get_character(character_id)? {
            Some(character) if character.project_id == project_id => Ok(Some(character)),
            _ => Ok(None),
        }
    }

    fn create_character(&self, character: &NewCharacter) -> RepoResult<Character> {
        self.conn.execute(
            "INSERT INTO characters (project_id, user_id, name, description, ordering, type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                character.project_id,
                character.user_id,
                character.name.as_str(),
                character.description.as_deref(),
                character.ordering.to_db(),
                character.kind.to_db(),
            ],
        )?;

        let character_id = self.conn.last_insert_rowid();
        self.get_character(character_id)?.ok_or(RepoError::NotFound {
            entity: "character",
            id: character_id,
        })
    }

    fn update_character(
        &self,
        character_id: CharacterId,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE characters
             SET name = ?2,
                 description = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE character_id = ?1;",
            params![character_id, name, description],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "character",
                id: character_id,
            });
        }
        Ok(())
    }

    fn create_state(&self, state: &NewCharacterState) -> RepoResult<CharacterState> {
        self.conn.execute(
            "INSERT INTO character_states (character_id, user_id, name, description, num)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                state.character_id,
                state.user_id,
                state.name.as_str(),
                state.description.as_deref(),
                state.num,
            ],
        )?;
        self.get_state(self.conn.last_insert_rowid())
    }

    fn update_state_description(&self, state_id: StateId, description: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE character_states SET description = ?2 WHERE state_id = ?1;",
            params![state_id, description],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "character state",
                id: state_id,
            });
        }
        Ok(())
    }

    fn list_matrix_characters(&self, matrix_id: MatrixId) -> RepoResult<Vec<Character>> {
        let sql = format!(
            "{CHARACTER_SELECT_SQL}
             JOIN matrix_character_order o ON o.character_id = c.character_id
             WHERE o.matrix_id = ?1
             ORDER BY o.position ASC, o.order_id ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut characters = stmt
            .query_map([matrix_id], parse_character_row)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .collect::<RepoResult<Vec<_>>>()?;

        let sql = format!(
            "{STATE_SELECT_SQL}
             JOIN matrix_character_order o ON o.character_id = s.character_id
             WHERE o.matrix_id = ?1
             ORDER BY s.character_id ASC, s.num ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut states: HashMap<CharacterId, Vec<CharacterState>> = HashMap::new();
        for state in stmt.query_map([matrix_id], parse_state_row)? {
            let state = state?;
            states.entry(state.character_id).or_default().push(state);
        }

        for character in &mut characters {
            character.states = states.remove(&character.character_id).unwrap_or_default();
        }
        Ok(characters)
    }

    fn create_rule(
        &self,
        character_id: CharacterId,
        state_id: Option<StateId>,
        user_id: i64,
        actions: &[NewRuleAction],
    ) -> RepoResult<CharacterRule> {
        self.conn.execute(
            "INSERT INTO character_rules (character_id, state_id, user_id)
             VALUES (?1, ?2, ?3);",
            params![character_id, state_id, user_id],
        )?;
        let rule_id = self.conn.last_insert_rowid();

        for action in actions {
            self.conn.execute(
                "INSERT INTO character_rule_actions (rule_id, character_id, state_id, action, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    rule_id,
                    action.character_id,
                    action.state_id,
                    action.kind.to_db(),
                    user_id,
                ],
            )?;
        }

        Ok(CharacterRule {
            rule_id,
            character_id,
            state_id,
            actions: self.list_rule_actions(rule_id)?,
        })
    }

    fn list_matrix_rules(&self, matrix_id: MatrixId) -> RepoResult<Vec<CharacterRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.rule_id, r.character_id, r.state_id
             FROM character_rules r
             JOIN matrix_character_order o ON o.character_id = r.character_id
             WHERE o.matrix_id = ?1
             ORDER BY o.position ASC, r.rule_id ASC;",
        )?;
        let rules = stmt
            .query_map([matrix_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, CharacterId>(1)?,
                    row.get::<_, Option<StateId>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rules
            .into_iter()
            .map(|(rule_id, character_id, state_id)| {
                Ok(CharacterRule {
                    rule_id,
                    character_id,
                    state_id,
                    actions: self.list_rule_actions(rule_id)?,
                })
            })
            .collect()
    }
}

/// Parses a character row; states are attached by the caller.
fn parse_character_row(row: &Row<'_>) -> rusqlite::Result<RepoResult<Character>> {
    let character_id: CharacterId = row.get("character_id")?;
    let ordering: i64 = row.get("ordering")?;
    let kind: i64 = row.get("type")?;
    let project_id: i64 = row.get("project_id")?;
    let name: String = row.get("name")?;
    let description: Option<String> = row.get("description")?;

    let Some(ordering) = CharacterOrdering::from_db(ordering) else {
        return Ok(Err(invalid_code("characters.ordering", ordering)));
    };
    let Some(kind) = CharacterType::from_db(kind) else {
        return Ok(Err(invalid_code("characters.type", kind)));
    };

    Ok(Ok(Character {
        character_id,
        project_id,
        name,
        description,
        ordering,
        kind,
        states: Vec::new(),
    }))
}

fn parse_state_row(row: &Row<'_>) -> rusqlite::Result<CharacterState> {
    Ok(CharacterState {
        state_id: row.get("state_id")?,
        character_id: row.get("character_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        num: row.get("num")?,
    })
}
