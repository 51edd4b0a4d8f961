//! Symbol codec between state ordinals and printed score symbols.
//!
//! # Responsibility
//! - Encode a state ordinal with a per-format alphabet.
//! - Decode an uploaded score symbol back into an ordinal.
//! - Parse and format numeric (continuous/meristic) scores.
//!
//! # Invariants
//! - For every ordinal `n` below an alphabet's length,
//!   `decode_discrete_score(alphabet.encode(n), None) == Some(n)`.

/// Per-format symbol alphabet with its missing and gap markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAlphabet {
    pub symbols: &'static str,
    pub missing: char,
    pub gap: char,
}

/// NEXUS `STANDARD` alphabet: digits then the full Latin alphabet.
pub const NEXUS_ALPHABET: SymbolAlphabet = SymbolAlphabet {
    symbols: "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    missing: '?',
    gap: '-',
};

/// TNT alphabet; same symbols as NEXUS.
pub const TNT_ALPHABET: SymbolAlphabet = SymbolAlphabet {
    symbols: "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    missing: '?',
    gap: '-',
};

impl SymbolAlphabet {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbol for a state ordinal, or `None` past the alphabet's end.
    pub fn encode(&self, ordinal: u32) -> Option<char> {
        self.symbols.chars().nth(usize::try_from(ordinal).ok()?)
    }

    /// Space-separated list of the first `count` symbols.
    pub fn declaration(&self, count: usize) -> String {
        self.symbols
            .chars()
            .take(count)
            .map(String::from)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Decodes one uploaded score symbol into a state ordinal.
///
/// Digits always map to their numeric value. With an explicit alphabet,
/// other symbols map to their position in it (whitespace ignored, case
/// folded); otherwise letters map to `code - 'A' + 10`.
pub fn decode_discrete_score(raw: char, explicit_alphabet: Option<&str>) -> Option<u32> {
    if let Some(digit) = raw.to_digit(10) {
        return Some(digit);
    }

    let upper = raw.to_ascii_uppercase();
    match explicit_alphabet {
        Some(alphabet) => alphabet
            .chars()
            .filter(|symbol| !symbol.is_whitespace())
            .position(|symbol| symbol.to_ascii_uppercase() == upper)
            .and_then(|position| u32::try_from(position).ok()),
        None => {
            if upper.is_ascii_uppercase() {
                Some(u32::from(upper) - u32::from('A') + 10)
            } else {
                None
            }
        }
    }
}

/// Parsed numeric score; either bound may be unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericScore {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl NumericScore {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Parses a continuous score such as `1.5`, `1.5-2`, `3,4` or `?`.
///
/// Splits on `,;-–`; `?` and empty parts are unknown. Returns `None` when
/// the leading value is malformed so the caller skips the whole cell. A
/// malformed trailing value is treated as unknown.
pub fn parse_continuous_score(text: &str) -> Option<NumericScore> {
    let mut parts = text.split([',', ';', '-', '–']).map(str::trim);
    let start = parse_bound(parts.next().unwrap_or(""))?;
    let end = parts.next().and_then(|part| parse_bound(part).flatten());
    Some(NumericScore { start, end })
}

/// Formats a numeric score for text exporters.
///
/// `?` when nothing is known, a single value when the bounds agree or only
/// one is known, `start-end` otherwise.
pub fn format_numeric_score(start: Option<f64>, end: Option<f64>) -> String {
    match (start, end) {
        (None, None) => "?".to_string(),
        (Some(value), None) | (None, Some(value)) => format_value(value),
        (Some(start), Some(end)) if start == end => format_value(start),
        (Some(start), Some(end)) => format!("{}-{}", format_value(start), format_value(end)),
    }
}

fn format_value(value: f64) -> String {
    format!("{value}")
}

fn parse_bound(part: &str) -> Option<Option<f64>> {
    if part.is_empty() || part == "?" {
        return Some(None);
    }
    part.parse::<f64>().ok().map(Some)
}
