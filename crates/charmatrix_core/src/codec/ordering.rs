//! Ordering compactor for assumption blocks.
//!
//! Groups characters sharing an ordering type into contiguous column index
//! ranges. Used by the NEXUS `ASSUMPTIONS` block and the TNT `ccode`
//! directive.

use crate::model::character::{Character, CharacterId, CharacterOrdering};
use std::collections::{BTreeMap, HashMap};

/// A single column index or an inclusive run of adjacent indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRange {
    Single(usize),
    Span(usize, usize),
}

impl IndexRange {
    /// Renders the range with `separator` between first and last index.
    pub fn render(&self, separator: &str) -> String {
        match self {
            Self::Single(index) => index.to_string(),
            Self::Span(first, last) => format!("{first}{separator}{last}"),
        }
    }
}

/// All ranges of one ordering value, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingGroup {
    pub ordering: CharacterOrdering,
    pub ranges: Vec<IndexRange>,
}

/// Compacts character orderings into index ranges.
///
/// `column_index` maps a character id to its column index in the current
/// export; characters missing from the map are ignored. Returns `None`
/// when fewer than two ordering values are present.
pub fn compact_orderings(
    characters: &[Character],
    column_index: &HashMap<CharacterId, usize>,
) -> Option<Vec<OrderingGroup>> {
    let mut buckets: BTreeMap<CharacterOrdering, Vec<usize>> = BTreeMap::new();
    for character in characters {
        if let Some(index) = column_index.get(&character.character_id) {
            buckets.entry(character.ordering).or_default().push(*index);
        }
    }

    if buckets.len() < 2 {
        return None;
    }

    let groups = buckets
        .into_iter()
        .map(|(ordering, mut indices)| {
            indices.sort_unstable();
            OrderingGroup {
                ordering,
                ranges: merge_adjacent(&indices),
            }
        })
        .collect();
    Some(groups)
}

fn merge_adjacent(indices: &[usize]) -> Vec<IndexRange> {
    let mut ranges = Vec::new();
    let mut iter = indices.iter().copied();
    let Some(first) = iter.next() else {
        return ranges;
    };

    let mut start = first;
    let mut previous = first;
    for index in iter {
        if index == previous + 1 {
            previous = index;
            continue;
        }
        ranges.push(to_range(start, previous));
        start = index;
        previous = index;
    }
    ranges.push(to_range(start, previous));
    ranges
}

fn to_range(first: usize, last: usize) -> IndexRange {
    if first == last {
        IndexRange::Single(first)
    } else {
        IndexRange::Span(first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::{compact_orderings, IndexRange, OrderingGroup};
    use crate::model::character::{Character, CharacterOrdering, CharacterType};
    use std::collections::HashMap;

    fn characters(orderings: &[CharacterOrdering]) -> (Vec<Character>, HashMap<i64, usize>) {
        let characters: Vec<Character> = orderings
            .iter()
            .enumerate()
            .map(|(index, ordering)| Character {
                character_id: 100 + index as i64,
                project_id: 1,
                name: format!("c{index}"),
                description: None,
                ordering: *ordering,
                kind: CharacterType::Discrete,
                states: Vec::new(),
            })
            .collect();
        let index = characters
            .iter()
            .enumerate()
            .map(|(position, character)| (character.character_id, position + 1))
            .collect();
        (characters, index)
    }

    #[test]
    fn merges_adjacent_indices_and_emits_singletons() {
        use CharacterOrdering::{Ordered as O, Unordered as U};
        let (characters, index) = characters(&[O, O, O, O, U, U, O, U, U, U]);

        let groups = compact_orderings(&characters, &index).unwrap();
        assert_eq!(
            groups,
            vec![
                OrderingGroup {
                    ordering: U,
                    ranges: vec![IndexRange::Span(5, 6), IndexRange::Span(8, 10)],
                },
                OrderingGroup {
                    ordering: O,
                    ranges: vec![IndexRange::Span(1, 4), IndexRange::Single(7)],
                },
            ]
        );
    }

    #[test]
    fn single_ordering_value_declares_nothing() {
        let (characters, index) =
            characters(&[CharacterOrdering::Ordered, CharacterOrdering::Ordered]);
        assert!(compact_orderings(&characters, &index).is_none());
        assert!(compact_orderings(&[], &HashMap::new()).is_none());
    }

    #[test]
    fn ranges_render_with_format_separator() {
        assert_eq!(IndexRange::Span(1, 4).render("-"), "1-4");
        assert_eq!(IndexRange::Span(0, 3).render("."), "0.3");
        assert_eq!(IndexRange::Single(7).render("-"), "7");
    }
}
