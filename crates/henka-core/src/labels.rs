//! Display labels for chords picked by root and type

use crate::theory::{ChordType, PitchClass};

/// Keys ordered around the circle of fifths
pub const CIRCLE_OF_FIFTHS: [&str; 12] = ["C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#", "F"];

/// Roman base for each semitone above the key
const SEMITONE_TO_ROMAN_BASE: [&str; 12] = [
    "I", "bII", "II", "bIII", "III", "IV", "#IV", "V", "bVI", "VI", "bVII", "VII",
];

/// Lead-sheet suffix for a chord type ("m", "maj7", "ø7", ...)
pub fn absolute_suffix(chord_type: ChordType) -> &'static str {
    match chord_type {
        ChordType::Major => "",
        ChordType::Minor => "m",
        ChordType::Diminished => "dim",
        ChordType::Augmented => "aug",
        ChordType::Major7 => "maj7",
        ChordType::Minor7 => "m7",
        ChordType::Dominant7 => "7",
        ChordType::Diminished7 => "dim7",
        ChordType::HalfDiminished7 => "ø7",
        ChordType::Major9 => "maj9",
        ChordType::Minor9 => "m9",
        ChordType::Dominant9 => "9",
        ChordType::Major11 => "maj11",
        ChordType::Minor11 => "m11",
    }
}

/// Lead-sheet name such as `Am7` or `F#dim`
pub fn format_absolute_label(root: PitchClass, chord_type: ChordType) -> String {
    format!("{}{}", root.name(), absolute_suffix(chord_type))
}

/// Roman label for a chord relative to `key`, e.g. `bVIImaj7` or `ii7`
pub fn format_roman_label(root: PitchClass, chord_type: ChordType, key: PitchClass) -> String {
    let base = SEMITONE_TO_ROMAN_BASE[key.interval_to(root) as usize];
    format_roman_for_chord_type(base, chord_type)
}

/// Re-case a Roman base (`"bVI"`, `"IV"`, `"VII#"`) and append the suffix
/// the parser reads back as `chord_type`.
pub fn format_roman_for_chord_type(base: &str, chord_type: ChordType) -> String {
    let leading_end = base.find(|c: char| c != 'b' && c != '#').unwrap_or(base.len());
    let (leading, rest) = base.split_at(leading_end);

    let letters_end = rest
        .find(|c: char| !matches!(c.to_ascii_uppercase(), 'I' | 'V' | 'X'))
        .unwrap_or(rest.len());
    let (letters, tail) = rest.split_at(letters_end);
    let trailing = tail.trim_start_matches(|c: char| c != 'b' && c != '#');

    let (upper, suffix) = roman_spelling(chord_type);
    let core = if upper {
        letters.to_ascii_uppercase()
    } else {
        letters.to_ascii_lowercase()
    };

    if leading.is_empty() {
        format!("{core}{trailing}{suffix}")
    } else {
        format!("{leading}{trailing}{core}{suffix}")
    }
}

/// (upper-case core, quality suffix) for each chord type
fn roman_spelling(chord_type: ChordType) -> (bool, &'static str) {
    match chord_type {
        ChordType::Major => (true, ""),
        ChordType::Minor => (false, ""),
        ChordType::Diminished => (false, "°"),
        ChordType::Augmented => (true, "+"),
        ChordType::Major7 => (true, "maj7"),
        ChordType::Minor7 => (false, "7"),
        ChordType::Dominant7 => (true, "7"),
        ChordType::Diminished7 => (false, "°7"),
        ChordType::HalfDiminished7 => (false, "ø7"),
        ChordType::Major9 => (true, "maj9"),
        ChordType::Minor9 => (false, "9"),
        ChordType::Dominant9 => (true, "9"),
        ChordType::Major11 => (true, "maj11"),
        ChordType::Minor11 => (false, "m11"),
    }
}

/// Known key names pass through; anything else becomes C
pub fn normalize_key_signature(key: &str) -> PitchClass {
    PitchClass::from_name(key).unwrap_or(PitchClass::C)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roman::parse_roman;

    fn pc(name: &str) -> PitchClass {
        PitchClass::from_name(name).unwrap()
    }

    #[test]
    fn test_absolute_labels() {
        assert_eq!(format_absolute_label(pc("A"), ChordType::Minor7), "Am7");
        assert_eq!(format_absolute_label(pc("F#"), ChordType::Diminished), "F#dim");
        assert_eq!(format_absolute_label(pc("C"), ChordType::Major), "C");
    }

    #[test]
    fn test_roman_labels_relative_to_key() {
        let c = PitchClass::C;
        assert_eq!(format_roman_label(pc("G"), ChordType::Dominant7, c), "V7");
        assert_eq!(format_roman_label(pc("D"), ChordType::Minor7, c), "ii7");
        assert_eq!(format_roman_label(pc("A#"), ChordType::Major, c), "bVII");
        assert_eq!(format_roman_label(pc("F#"), ChordType::Minor, c), "#iv");
        assert_eq!(format_roman_label(pc("B"), ChordType::HalfDiminished7, c), "viiø7");
        assert_eq!(format_roman_label(pc("C"), ChordType::Major, pc("D")), "bVII");
    }

    #[test]
    fn test_trailing_accidentals_stay_after_core() {
        assert_eq!(format_roman_for_chord_type("IV#", ChordType::Minor), "iv#");
        assert_eq!(format_roman_for_chord_type("bIII", ChordType::Augmented), "bIII+");
    }

    #[test]
    fn test_formatted_tokens_parse_back() {
        for chord_type in ChordType::ALL {
            for base in ["I", "II", "III", "IV", "V", "VI", "VII"] {
                let token = format_roman_for_chord_type(base, chord_type);
                let parsed = parse_roman(&token).unwrap();
                assert_eq!(parsed.chord_type, chord_type, "{token}");
            }
        }
    }

    #[test]
    fn test_normalize_key_signature() {
        assert_eq!(normalize_key_signature("Eb"), PitchClass::C);
        assert_eq!(normalize_key_signature("E").name(), "E");
        assert_eq!(CIRCLE_OF_FIFTHS.len(), 12);
    }
}
