//! Morse pattern data model and duration arithmetic
//!
//! Durations are expressed in "dot units" (relative time):
//! - dot                 = 1 unit of tone
//! - dash                = 3 units of tone
//! - intra-symbol gap    = 1 unit of silence, implicit between adjacent tones
//! - letter gap          = 3 units of silence, encoded as an explicit `Gap`
//!
//! A real-world duration in milliseconds is `units * unit_ms`, where
//! `unit_ms` derives from the operator's WPM (at 12 WPM, unit_ms is 100 ms).
//! The implicit intra-symbol gap is never encoded in a pattern; schedule
//! construction inserts it between adjacent symbols.

use serde::{Deserialize, Serialize};

/// Tone units in a dash.
pub const DASH_UNITS: f64 = 3.0;

/// Silence units between adjacent symbols of the same letter.
pub const SYMBOL_GAP_UNITS: f64 = 1.0;

/// Silence units for an explicit letter separator.
pub const LETTER_GAP_UNITS: f64 = 3.0;

/// One element of a playback pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    Dot,
    Dash,
    Gap,
}

impl Symbol {
    /// Whether this symbol produces tone (dot or dash) rather than silence.
    #[inline]
    pub fn is_tone(self) -> bool {
        matches!(self, Symbol::Dot | Symbol::Dash)
    }

    /// Tone duration in units, or `None` for a gap.
    #[inline]
    pub fn tone_units(self) -> Option<f64> {
        match self {
            Symbol::Dot => Some(1.0),
            Symbol::Dash => Some(DASH_UNITS),
            Symbol::Gap => None,
        }
    }

    /// Wire glyph used in telemetry records ('.' or '-').
    ///
    /// Gaps never reach telemetry; they render as a space only for logs.
    #[inline]
    pub fn glyph(self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
            Symbol::Gap => ' ',
        }
    }
}

/// An ordered finite sequence of symbols. Empty patterns are no-ops.
pub type Pattern = Vec<Symbol>;

/// Tone duration of a symbol in milliseconds (0 for gaps).
#[inline]
pub fn symbol_duration_ms(symbol: Symbol, unit_ms: f64) -> f64 {
    symbol.tone_units().map_or(0.0, |units| units * unit_ms)
}

/// Parse the host's string form of a pattern.
///
/// '.' and '-' map to tones; ' ' and '/' mark letter separators. Unknown
/// characters are skipped.
pub fn parse_pattern(text: &str) -> Pattern {
    text.chars()
        .filter_map(|ch| match ch {
            '.' => Some(Symbol::Dot),
            '-' => Some(Symbol::Dash),
            ' ' | '/' => Some(Symbol::Gap),
            _ => None,
        })
        .collect()
}

/// Total expected length of a pattern in milliseconds.
///
/// Sum of tone durations, the implicit 1-unit silences between adjacent
/// symbols, and explicit 3-unit gaps. The silence that would follow the last
/// symbol is not counted. This is the reference arithmetic the schedule is
/// checked against.
pub fn pattern_total_ms(pattern: &[Symbol], unit_ms: f64) -> f64 {
    let mut total = 0.0;
    for (index, symbol) in pattern.iter().enumerate() {
        match symbol.tone_units() {
            Some(units) => total += units * unit_ms,
            None => total += LETTER_GAP_UNITS * unit_ms,
        }
        if symbol.is_tone() && index + 1 < pattern.len() {
            total += SYMBOL_GAP_UNITS * unit_ms;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_tone_units() {
        assert_eq!(Symbol::Dot.tone_units(), Some(1.0));
        assert_eq!(Symbol::Dash.tone_units(), Some(3.0));
        assert_eq!(Symbol::Gap.tone_units(), None);
    }

    #[test]
    fn test_symbol_glyphs() {
        assert_eq!(Symbol::Dot.glyph(), '.');
        assert_eq!(Symbol::Dash.glyph(), '-');
    }

    #[test]
    fn test_parse_pattern_tones_and_gaps() {
        let pattern = parse_pattern(".-. / .-");
        assert_eq!(
            pattern,
            vec![
                Symbol::Dot,
                Symbol::Dash,
                Symbol::Dot,
                Symbol::Gap,
                Symbol::Gap,
                Symbol::Gap,
                Symbol::Dot,
                Symbol::Dash,
            ]
        );
    }

    #[test]
    fn test_parse_pattern_skips_unknown() {
        assert_eq!(parse_pattern("x.y-z"), vec![Symbol::Dot, Symbol::Dash]);
    }

    #[test]
    fn test_single_dot_total() {
        // One dot, nothing after it: exactly one unit.
        assert_eq!(pattern_total_ms(&[Symbol::Dot], 80.0), 80.0);
    }

    #[test]
    fn test_letter_total_includes_intra_gaps() {
        // "S" = dit dit dit: 3 units of tone + 2 units of silence.
        let s = vec![Symbol::Dot, Symbol::Dot, Symbol::Dot];
        assert_eq!(pattern_total_ms(&s, 50.0), 250.0);
    }

    #[test]
    fn test_gap_adds_three_units_plus_trailing_intra() {
        // dot, gap, dot at 60 ms: 60 + 60 (intra before gap) + 180 + 60.
        let p = vec![Symbol::Dot, Symbol::Gap, Symbol::Dot];
        assert_eq!(pattern_total_ms(&p, 60.0), 360.0);
    }

    #[test]
    fn test_empty_pattern_total_is_zero() {
        assert_eq!(pattern_total_ms(&[], 100.0), 0.0);
    }
}
