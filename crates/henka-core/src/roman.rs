//! Roman-numeral token parser
//!
//! A token such as `bVImaj7/2nd` is read in four independent passes:
//!
//! 1. inversion suffix after `/` (`/1st`, `/2nd`, `/3rd`, `/Nth`, or bare digits)
//! 2. accidental runs (`b` = -1, `#` = +1) directly before or after the numeral
//! 3. the numeral core (`I` .. `VII`, upper or lower case)
//! 4. the quality suffix, looked up in a precedence-ordered table
//!
//! The letter case of the core supplies the major/minor default when the
//! suffix does not decide the quality on its own.

use serde::{Deserialize, Serialize};

use crate::error::{HenkaError, Result};
use crate::theory::{degree_root, ChordType, PitchClass};

/// A parsed Roman-numeral chord token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomanNumeral {
    /// 0-based scale degree (I = 0 ... VII = 6)
    pub degree: u8,
    /// Net semitone shift from accidentals
    pub accidental_shift: i32,
    pub chord_type: ChordType,
    /// Inversion requested with a `/Nth` suffix
    pub inversion: Option<usize>,
    /// Whether the numeral core was written in upper case
    pub uppercase: bool,
}

impl RomanNumeral {
    /// Root pitch class of this chord in the given major key
    pub fn root_in(&self, key: PitchClass) -> PitchClass {
        degree_root(key, self.degree, self.accidental_shift)
    }
}

/// How a quality suffix resolves to a chord type
#[derive(Debug, Clone, Copy)]
enum Quality {
    Fixed(ChordType),
    /// (upper-case core, lower-case core)
    ByCase(ChordType, ChordType),
}

/// Quality suffixes in precedence order: longer and more specific tokens come
/// before the shorter tokens they contain.
const QUALITY_SUFFIXES: &[(&str, Quality)] = &[
    ("maj11", Quality::Fixed(ChordType::Major11)),
    ("maj9", Quality::Fixed(ChordType::Major9)),
    ("maj7", Quality::Fixed(ChordType::Major7)),
    ("m7b5", Quality::Fixed(ChordType::HalfDiminished7)),
    ("ø7", Quality::Fixed(ChordType::HalfDiminished7)),
    ("°7", Quality::Fixed(ChordType::Diminished7)),
    ("dim7", Quality::Fixed(ChordType::Diminished7)),
    ("m11", Quality::Fixed(ChordType::Minor11)),
    ("m9", Quality::Fixed(ChordType::Minor9)),
    ("m7", Quality::Fixed(ChordType::Minor7)),
    ("7", Quality::ByCase(ChordType::Dominant7, ChordType::Minor7)),
    ("9", Quality::ByCase(ChordType::Dominant9, ChordType::Minor9)),
    ("11", Quality::ByCase(ChordType::Major11, ChordType::Minor11)),
    ("°", Quality::Fixed(ChordType::Diminished)),
    ("dim", Quality::Fixed(ChordType::Diminished)),
    ("ø", Quality::Fixed(ChordType::HalfDiminished7)),
    ("+", Quality::Fixed(ChordType::Augmented)),
    ("aug", Quality::Fixed(ChordType::Augmented)),
    ("m", Quality::Fixed(ChordType::Minor)),
    ("", Quality::ByCase(ChordType::Major, ChordType::Minor)),
];

const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// Parse a Roman-numeral token into degree, accidentals, chord type and inversion
pub fn parse_roman(token: &str) -> Result<RomanNumeral> {
    let unknown = || HenkaError::UnknownRomanNumeral(token.to_string());

    let (body, inversion) = split_inversion(token).ok_or_else(unknown)?;
    let parts = split_core(body).ok_or_else(unknown)?;

    let upper = parts.core.to_ascii_uppercase();
    let degree = NUMERALS.iter().position(|&n| n == upper).ok_or_else(unknown)? as u8;

    let uppercase = if parts.core == upper {
        true
    } else if parts.core == parts.core.to_ascii_lowercase() {
        false
    } else {
        return Err(unknown());
    };

    let chord_type = parse_quality(parts.suffix, uppercase).ok_or_else(unknown)?;

    // Accidentals on diminished / half-diminished degrees are outside the grammar
    let dim_suffix = parts.suffix.contains('°') || parts.suffix.contains('ø');
    if parts.accidental_shift != 0 && dim_suffix {
        return Err(unknown());
    }

    Ok(RomanNumeral {
        degree,
        accidental_shift: parts.accidental_shift,
        chord_type,
        inversion,
        uppercase,
    })
}

/// Split off a `/Nth` suffix. Returns `None` for a malformed suffix.
fn split_inversion(token: &str) -> Option<(&str, Option<usize>)> {
    let Some((body, suffix)) = token.split_once('/') else {
        return Some((token, None));
    };

    let digits_end = suffix
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(suffix.len());
    if digits_end == 0 {
        return None;
    }

    let ordinal = &suffix[digits_end..];
    if !matches!(ordinal, "" | "st" | "nd" | "rd" | "th") {
        return None;
    }

    // No upper bound here; callers clamp to the chord's note count
    let value = suffix[..digits_end]
        .bytes()
        .fold(0usize, |acc, b| acc.saturating_mul(10).saturating_add((b - b'0') as usize));

    Some((body, Some(value)))
}

struct CoreParts<'a> {
    accidental_shift: i32,
    core: &'a str,
    suffix: &'a str,
}

/// Separate leading accidentals, the numeral letters, trailing accidentals and
/// the remaining quality suffix.
fn split_core(body: &str) -> Option<CoreParts<'_>> {
    let (leading, rest) = take_accidentals(body);

    let core_len = rest
        .find(|c: char| !matches!(c, 'I' | 'V' | 'i' | 'v'))
        .unwrap_or(rest.len());
    if core_len == 0 {
        return None;
    }
    let (core, rest) = rest.split_at(core_len);

    let (trailing, suffix) = take_accidentals(rest);

    Some(CoreParts {
        accidental_shift: leading + trailing,
        core,
        suffix,
    })
}

fn take_accidentals(s: &str) -> (i32, &str) {
    let end = s.find(|c: char| c != 'b' && c != '#').unwrap_or(s.len());
    let shift = s[..end].chars().map(|c| if c == '#' { 1 } else { -1 }).sum();
    (shift, &s[end..])
}

fn parse_quality(suffix: &str, uppercase: bool) -> Option<ChordType> {
    QUALITY_SUFFIXES
        .iter()
        .find(|(token, _)| *token == suffix)
        .map(|(_, quality)| match *quality {
            Quality::Fixed(t) => t,
            Quality::ByCase(upper, lower) => if uppercase { upper } else { lower },
        })
}
