//! Greedy nearest-voicing search
//!
//! For each chord the optimizer tries every candidate inversion one octave
//! below, at, and above the base register, snaps the candidate's notes into
//! the register of the previous chord, and keeps the voicing with the least
//! total movement. It only looks one chord back.

use serde::{Deserialize, Serialize};

use crate::chord::{clamp_midi, Chord, DEFAULT_OCTAVE};
use crate::theory::{ChordType, PitchClass};

/// Largest interval a voice may jump before it is moved an octave closer
const MAX_VOICE_JUMP: i32 = 6;

/// Octave offsets searched around the base octave, in evaluation order
const OCTAVE_OFFSETS: [i32; 3] = [-1, 0, 1];

const LOWEST_OCTAVE: i32 = 1;

/// Which inversions the search may choose from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InversionCandidates {
    /// Exactly this inversion (clamped to the chord's maximum)
    Fixed(usize),
    /// Every inversion from root position up to this one (clamped)
    UpTo(usize),
}

impl InversionCandidates {
    pub fn for_chord(&self, chord_type: ChordType) -> Vec<usize> {
        let max = chord_type.max_inversion();
        match *self {
            Self::Fixed(inversion) => vec![inversion.min(max)],
            Self::UpTo(limit) => (0..=limit.min(max)).collect(),
        }
    }
}

/// Result of the voicing search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voicing {
    pub inversion: usize,
    pub octave: i32,
    /// Notes after tightening toward the previous chord, ascending
    pub notes: Vec<u8>,
    /// Total semitone displacement from the previous chord
    pub movement: u32,
}

/// Index pairs between two ascending note lists. Extra notes on the longer
/// side pair with the outermost note of the shorter side.
fn pairs(candidate_len: usize, previous_len: usize) -> impl Iterator<Item = (usize, usize)> {
    let len = candidate_len.max(previous_len);
    (0..len).map(move |i| (i.min(candidate_len - 1), i.min(previous_len - 1)))
}

fn sorted(notes: &[u8]) -> Vec<u8> {
    let mut notes = notes.to_vec();
    notes.sort_unstable();
    notes
}

/// Move each candidate note by octaves until it sits within a tritone of its
/// paired note in the previous chord. Returns the notes ascending.
pub fn tighten(candidate: &[u8], previous: &[u8]) -> Vec<u8> {
    if candidate.is_empty() || previous.is_empty() {
        return sorted(candidate);
    }

    let previous = sorted(previous);
    let mut notes = sorted(candidate);
    let anchor_count = notes.len();

    for (ci, pi) in pairs(anchor_count, previous.len()).take(anchor_count) {
        let target = previous[pi] as i32;
        let mut note = notes[ci] as i32;
        while note - target > MAX_VOICE_JUMP && note - 12 >= 0 {
            note -= 12;
        }
        while target - note > MAX_VOICE_JUMP && note + 12 <= 127 {
            note += 12;
        }
        notes[ci] = clamp_midi(note);
    }

    notes.sort_unstable();
    notes
}

/// Total absolute semitone movement between two voicings
pub fn voice_movement(candidate: &[u8], previous: &[u8]) -> u32 {
    if candidate.is_empty() || previous.is_empty() {
        return 0;
    }

    let candidate = sorted(candidate);
    let previous = sorted(previous);

    pairs(candidate.len(), previous.len())
        .map(|(ci, pi)| (candidate[ci] as i32 - previous[pi] as i32).unsigned_abs())
        .sum()
}

/// Search inversion x octave for the voicing closest to `previous`.
///
/// Ties keep the first candidate evaluated (inversion ascending, then octave
/// offsets -1, 0, +1). Without a previous chord the first candidate inversion
/// is used at the base octave.
pub fn find_best_voicing(
    previous: Option<&[u8]>,
    root: PitchClass,
    chord_type: ChordType,
    candidates: InversionCandidates,
    base_octave: i32,
) -> Voicing {
    let inversions = candidates.for_chord(chord_type);
    let first_inversion = inversions.first().copied().unwrap_or(0);

    let Some(previous) = previous.filter(|p| !p.is_empty()) else {
        let chord = Chord::build(root, chord_type, base_octave, first_inversion);
        return Voicing {
            inversion: first_inversion,
            octave: base_octave,
            notes: chord.notes,
            movement: 0,
        };
    };

    let mut best: Option<Voicing> = None;

    for &inversion in &inversions {
        for offset in OCTAVE_OFFSETS {
            let octave = (base_octave + offset).max(LOWEST_OCTAVE);
            let chord = Chord::build(root, chord_type, octave, inversion);
            let notes = tighten(&chord.notes, previous);
            let movement = voice_movement(&notes, previous);

            if best.as_ref().is_none_or(|b| movement < b.movement) {
                best = Some(Voicing { inversion, octave, notes, movement });
            }
        }
    }

    best.unwrap_or_else(|| {
        let chord = Chord::build(root, chord_type, base_octave, first_inversion);
        Voicing {
            inversion: first_inversion,
            octave: base_octave,
            notes: chord.notes,
            movement: 0,
        }
    })
}

/// Voicing search at the default register
pub fn voice_lead(
    previous: Option<&Chord>,
    root: PitchClass,
    chord_type: ChordType,
    candidates: InversionCandidates,
) -> Voicing {
    find_best_voicing(
        previous.map(|c| c.notes.as_slice()),
        root,
        chord_type,
        candidates,
        DEFAULT_OCTAVE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pc(name: &str) -> PitchClass {
        PitchClass::from_name(name).unwrap()
    }

    #[test]
    fn test_tighten_snaps_into_register() {
        assert_eq!(tighten(&[67, 71, 74], &[60, 64, 67]), vec![55, 59, 62]);
        assert_eq!(tighten(&[53, 57, 60], &[60, 64, 69]), vec![65, 69, 72]);
        // Exactly a tritone stays put
        assert_eq!(tighten(&[66], &[60]), vec![66]);
    }

    #[test]
    fn test_tighten_anchors_extra_notes_to_top() {
        // Four-note candidate against a triad: the top note pairs with 67
        assert_eq!(tighten(&[55, 59, 62, 65], &[60, 64, 67]), vec![55, 59, 62, 65]);
        assert_eq!(tighten(&[62, 65, 69, 84], &[60, 64, 67]), vec![62, 65, 69, 72]);
    }

    #[test]
    fn test_movement_pairs_sorted_voices() {
        assert_eq!(voice_movement(&[59, 62, 67], &[60, 64, 67]), 3);
        assert_eq!(voice_movement(&[67, 62, 59], &[67, 60, 64]), 3);
        // Extra previous note compares against the candidate's top voice
        assert_eq!(voice_movement(&[60, 64], &[60, 64, 67]), 3);
        assert_eq!(voice_movement(&[], &[60]), 0);
    }

    #[test]
    fn test_first_chord_uses_base_octave() {
        let v = find_best_voicing(None, pc("C"), ChordType::Major, InversionCandidates::UpTo(2), 4);
        assert_eq!(v.notes, vec![60, 64, 67]);
        assert_eq!(v.inversion, 0);
        assert_eq!(v.octave, 4);
    }

    #[test]
    fn test_dominant_moves_by_step() {
        let v = find_best_voicing(Some(&[60, 64, 67]), pc("G"), ChordType::Major, InversionCandidates::UpTo(2), 4);
        assert_eq!(v.notes, vec![59, 62, 67]);
        assert_eq!(v.inversion, 1);
        assert_eq!(v.octave, 3);
        assert_eq!(v.movement, 3);
    }

    #[test]
    fn test_fixed_inversion_is_clamped() {
        assert_eq!(InversionCandidates::Fixed(9).for_chord(ChordType::Major), vec![2]);
        assert_eq!(InversionCandidates::UpTo(9).for_chord(ChordType::Dominant7), vec![0, 1, 2, 3]);
        let v = find_best_voicing(Some(&[60, 64, 67]), pc("F"), ChordType::Major, InversionCandidates::Fixed(9), 4);
        assert_eq!(v.inversion, 2);
        assert_eq!(v.notes, vec![60, 65, 69]);
    }

    #[test]
    fn test_octave_floor() {
        let v = find_best_voicing(Some(&[24, 28, 31]), pc("C"), ChordType::Major, InversionCandidates::Fixed(0), 1);
        assert!(v.octave >= 1);
        assert_eq!(v.notes, vec![24, 28, 31]);
    }
}
