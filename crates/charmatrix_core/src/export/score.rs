//! Cell score rendering shared by the NEXUS and TNT exporters.

use crate::codec::symbol::{format_numeric_score, SymbolAlphabet};
use crate::model::cell::Cell;
use crate::model::character::{Character, StateId};

/// Renders the score entries of one discrete `(taxon, character)` pair.
///
/// No entries print the missing symbol, a lone stateless entry the gap
/// symbol, one state its symbol, and several entries a bracketed symbol
/// list whose brackets `brackets` picks from the first entry's
/// uncertainty flag.
pub(crate) fn render_discrete_score<B>(
    cells: &[Cell],
    character: &Character,
    alphabet: &SymbolAlphabet,
    brackets: B,
) -> String
where
    B: Fn(bool) -> (char, char),
{
    let Some(first) = cells.first() else {
        return alphabet.missing.to_string();
    };

    if cells.len() == 1 {
        if first.is_npa {
            return alphabet.missing.to_string();
        }
        return match first.state_id {
            Some(state_id) => state_symbol(character, state_id, alphabet).to_string(),
            None => alphabet.gap.to_string(),
        };
    }

    let symbols: String = cells
        .iter()
        .filter(|cell| !cell.is_npa)
        .map(|cell| match cell.state_id {
            Some(state_id) => state_symbol(character, state_id, alphabet),
            None => alphabet.gap,
        })
        .collect();
    let (open, close) = brackets(first.is_uncertain);
    format!("{open}{symbols}{close}")
}

/// Renders the first numeric entry of a pair, `?` when unscored.
pub(crate) fn render_numeric_score(cells: &[Cell]) -> String {
    cells
        .first()
        .map(|cell| format_numeric_score(cell.start_value, cell.end_value))
        .unwrap_or_else(|| "?".to_string())
}

fn state_symbol(character: &Character, state_id: StateId, alphabet: &SymbolAlphabet) -> char {
    character
        .state_by_id(state_id)
        .and_then(|state| alphabet.encode(state.num))
        .unwrap_or(alphabet.missing)
}
