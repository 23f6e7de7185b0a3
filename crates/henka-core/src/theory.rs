//! Chord and pitch-class tables

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HenkaError, Result};

// ============================================================================
// Pitch classes
// ============================================================================

/// Pitch-class names, indexed by semitone above C.
pub const KEYS: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Semitone offsets of the major scale degrees.
pub const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// MIDI number of C4.
pub const MIDDLE_C: i32 = 60;

/// One of the twelve pitch classes (C = 0 ... B = 11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: Self = Self(0);

    /// Build from any integer, wrapping into 0..12
    pub fn from_semitones(semitones: i32) -> Self {
        Self(semitones.rem_euclid(12) as u8)
    }

    /// Look up a pitch class by its table name ("C", "F#", ...)
    pub fn from_name(name: &str) -> Result<Self> {
        KEYS.iter()
            .position(|&k| k == name)
            .map(|idx| Self(idx as u8))
            .ok_or_else(|| HenkaError::UnknownKey(name.to_string()))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        KEYS[self.0 as usize]
    }

    /// Move by a signed number of semitones, wrapping around the octave
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_semitones(self.0 as i32 + semitones)
    }

    /// Ascending interval from `self` up to `other`, in 0..12
    pub fn interval_to(self, other: PitchClass) -> u8 {
        (other.0 as i32 - self.0 as i32).rem_euclid(12) as u8
    }

    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0..12u8).map(Self)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = HenkaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl From<PitchClass> for String {
    fn from(pc: PitchClass) -> Self {
        pc.name().to_string()
    }
}

impl TryFrom<String> for PitchClass {
    type Error = HenkaError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_name(&value)
    }
}

// ============================================================================
// Chord types
// ============================================================================

/// Chord type vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChordType {
    // Triads
    Major,
    Minor,
    Diminished,
    Augmented,
    // Sevenths
    Major7,
    Minor7,
    Dominant7,
    Diminished7,
    HalfDiminished7,
    // Extensions
    Major9,
    Minor9,
    Dominant9,
    Major11,
    Minor11,
}

impl ChordType {
    pub const ALL: [ChordType; 14] = [
        Self::Major,
        Self::Minor,
        Self::Diminished,
        Self::Augmented,
        Self::Major7,
        Self::Minor7,
        Self::Dominant7,
        Self::Diminished7,
        Self::HalfDiminished7,
        Self::Major9,
        Self::Minor9,
        Self::Dominant9,
        Self::Major11,
        Self::Minor11,
    ];

    /// Semitone offsets from the root, ascending
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 4, 7],
            Self::Minor => &[0, 3, 7],
            Self::Diminished => &[0, 3, 6],
            Self::Augmented => &[0, 4, 8],
            Self::Major7 => &[0, 4, 7, 11],
            Self::Minor7 => &[0, 3, 7, 10],
            Self::Dominant7 => &[0, 4, 7, 10],
            Self::Diminished7 => &[0, 3, 6, 9],
            Self::HalfDiminished7 => &[0, 3, 6, 10],
            Self::Major9 => &[0, 4, 7, 11, 14],
            Self::Minor9 => &[0, 3, 7, 10, 14],
            Self::Dominant9 => &[0, 4, 7, 10, 14],
            Self::Major11 => &[0, 4, 7, 11, 14, 17],
            Self::Minor11 => &[0, 3, 7, 10, 14, 17],
        }
    }

    /// Identifier used in configuration and chord names
    pub fn id(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Diminished => "diminished",
            Self::Augmented => "augmented",
            Self::Major7 => "major7",
            Self::Minor7 => "minor7",
            Self::Dominant7 => "dominant7",
            Self::Diminished7 => "diminished7",
            Self::HalfDiminished7 => "halfDiminished7",
            Self::Major9 => "major9",
            Self::Minor9 => "minor9",
            Self::Dominant9 => "dominant9",
            Self::Major11 => "major11",
            Self::Minor11 => "minor11",
        }
    }

    /// Highest meaningful inversion (note count - 1)
    pub fn max_inversion(&self) -> usize {
        self.intervals().len() - 1
    }

    /// Whether the chord's third is minor, which decides lower-case Roman spelling
    pub fn is_minor_quality(&self) -> bool {
        matches!(
            self,
            Self::Minor
                | Self::Diminished
                | Self::Minor7
                | Self::Diminished7
                | Self::HalfDiminished7
                | Self::Minor9
                | Self::Minor11
        )
    }
}

impl fmt::Display for ChordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ChordType {
    type Err = HenkaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.id() == s)
            .ok_or_else(|| HenkaError::UnknownChordType(s.to_string()))
    }
}

/// Root pitch class for a scale degree in a major key, shifted by accidentals
pub fn degree_root(key: PitchClass, degree: u8, accidental_shift: i32) -> PitchClass {
    let interval = MAJOR_SCALE[degree as usize % MAJOR_SCALE.len()] as i32;
    key.transpose(interval + accidental_shift)
}

/// Frequency in Hz for a MIDI note (A4 = 440 Hz)
pub fn midi_to_frequency(midi: f64) -> f64 {
    440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
}
