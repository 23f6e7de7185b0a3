//! Concrete chords and progressions

use serde::{Deserialize, Serialize};

use crate::error::{HenkaError, Result};
use crate::theory::{ChordType, PitchClass, MIDDLE_C};

/// Default register for generated chords (C4 octave)
pub const DEFAULT_OCTAVE: i32 = 4;

/// Tempo every generated progression is played at
pub const DEFAULT_TEMPO: u32 = 120;

/// A concrete sonority with MIDI pitches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chord {
    pub name: String,
    pub notes: Vec<u8>,
    pub root_midi: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roman_numeral: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inversion: Option<usize>,
}

impl Chord {
    /// Build a chord from a root, type, octave and inversion.
    ///
    /// An inversion at or above the note count leaves the chord in root position.
    pub fn build(root: PitchClass, chord_type: ChordType, octave: i32, inversion: usize) -> Self {
        // every octave outside this range already lands past the MIDI edges
        let octave = octave.clamp(-2, 11);
        let root_midi = clamp_midi(MIDDLE_C + root.index() as i32 + (octave - DEFAULT_OCTAVE) * 12);

        let mut notes: Vec<u8> = chord_type
            .intervals()
            .iter()
            .map(|&interval| clamp_midi(root_midi as i32 + interval as i32))
            .collect();

        let inversion = if inversion < notes.len() { inversion } else { 0 };
        for _ in 0..inversion {
            let bottom = notes.remove(0);
            notes.push(clamp_midi(bottom as i32 + 12));
        }

        let type_suffix = match chord_type {
            ChordType::Major => "",
            other => other.id(),
        };

        Self {
            name: format!("{}{}{}", root.name(), type_suffix, inversion_suffix(inversion)),
            notes,
            root_midi,
            roman_numeral: None,
            inversion: Some(inversion),
        }
    }

    /// Pitch classes sounding in this chord, in note order
    pub fn pitch_classes(&self) -> Vec<u8> {
        self.notes.iter().map(|n| n % 12).collect()
    }
}

/// Build a chord from string names, failing on unknown roots or chord types
pub fn build_chord(root: &str, chord_type: &str, octave: i32, inversion: usize) -> Result<Chord> {
    let root = PitchClass::from_name(root)?;
    let chord_type: ChordType = chord_type.parse()?;
    Ok(Chord::build(root, chord_type, octave, inversion))
}

/// Display suffix for an inversion index
pub fn inversion_suffix(inversion: usize) -> String {
    match inversion {
        0 => String::new(),
        1 => "/1st".to_string(),
        2 => "/2nd".to_string(),
        3 => "/3rd".to_string(),
        n => format!("/{n}th"),
    }
}

pub(crate) fn clamp_midi(note: i32) -> u8 {
    note.clamp(0, 127) as u8
}

/// An ordered set of chords in one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordProgression {
    pub chords: Vec<Chord>,
    pub key: PitchClass,
    pub tempo: u32,
}

impl ChordProgression {
    pub fn new(chords: Vec<Chord>, key: PitchClass, tempo: u32) -> Result<Self> {
        if chords.is_empty() {
            return Err(HenkaError::EmptyProgression);
        }
        Ok(Self { chords, key, tempo })
    }

    /// Seconds each chord is held: two beats at the progression tempo
    pub fn chord_duration_secs(&self) -> f64 {
        (60.0 / self.tempo.max(1) as f64) * 2.0
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.chord_duration_secs() * self.chords.len() as f64
    }

    pub fn roman_numerals(&self) -> Vec<&str> {
        self.chords
            .iter()
            .map(|c| c.roman_numeral.as_deref().unwrap_or("I"))
            .collect()
    }
}
