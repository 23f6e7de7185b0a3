//! Progression generation from Roman-numeral templates

use serde::{Deserialize, Serialize};

use crate::chord::{Chord, ChordProgression, DEFAULT_OCTAVE, DEFAULT_TEMPO};
use crate::difficulty::DifficultyLevel;
use crate::error::Result;
use crate::labels::format_roman_for_chord_type;
use crate::roman::parse_roman;
use crate::theory::{ChordType, PitchClass};
use crate::voice_leading::{find_best_voicing, voice_lead, InversionCandidates};

/// Diatonic bases drawn by the custom template randomizer
const CUSTOM_TEMPLATE_BASES: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// Per-call generation switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    /// Overrides the difficulty's voice-leading flag when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_leading: Option<bool>,
}

impl GenerationOptions {
    pub fn with_voice_leading(enabled: bool) -> Self {
        Self {
            voice_leading: Some(enabled),
        }
    }
}

/// Turns templates into concrete chords. Owns the random source so seeded
/// generators reproduce their output exactly.
#[derive(Debug, Clone)]
pub struct ProgressionGenerator {
    rng: fastrand::Rng,
}

impl Default for ProgressionGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressionGenerator {
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Build a progression from Roman tokens in `key`.
    ///
    /// Without a difficulty every chord is generated in root position at the
    /// default register unless `options` turns voice leading on.
    pub fn from_roman<S: AsRef<str>>(
        &mut self,
        tokens: &[S],
        key: PitchClass,
        level: Option<&DifficultyLevel>,
        options: GenerationOptions,
    ) -> Result<ChordProgression> {
        let voice_leading = options
            .voice_leading
            .unwrap_or_else(|| level.is_some_and(|l| l.use_voice_leading));

        let mut chords: Vec<Chord> = Vec::with_capacity(tokens.len());

        for token in tokens {
            let token = token.as_ref();
            let numeral = parse_roman(token)?;
            let root = numeral.root_in(key);
            let chord_type = numeral.chord_type;

            let candidates = match numeral.inversion {
                Some(explicit) => InversionCandidates::Fixed(explicit),
                None if voice_leading => {
                    // No difficulty: the whole inversion range is open
                    let limit = level.map_or(chord_type.max_inversion(), |l| l.max_inversion);
                    InversionCandidates::UpTo(limit)
                }
                None => InversionCandidates::Fixed(self.random_inversion(level)),
            };

            let chord = if voice_leading {
                let voicing = voice_lead(chords.last(), root, chord_type, candidates);
                let mut chord = Chord::build(root, chord_type, voicing.octave, voicing.inversion);
                if !chords.is_empty() {
                    chord.notes = voicing.notes;
                }
                chord
            } else {
                let inversion = candidates.for_chord(chord_type)[0];
                Chord::build(root, chord_type, DEFAULT_OCTAVE, inversion)
            };

            chords.push(Chord {
                roman_numeral: Some(token.to_string()),
                ..chord
            });
        }

        ChordProgression::new(chords, key, DEFAULT_TEMPO)
    }

    /// Pick a key and template for `level`, then generate from them.
    ///
    /// An explicit key wins, then a random allowed key, then any of the
    /// twelve. Levels without templates get a freshly randomized one.
    pub fn random(
        &mut self,
        level: &DifficultyLevel,
        key: Option<PitchClass>,
        options: GenerationOptions,
    ) -> Result<ChordProgression> {
        let key = key.unwrap_or_else(|| self.random_key(level));

        let template = if level.common_progressions.is_empty() {
            self.random_template(level)
        } else {
            let idx = self.rng.usize(..level.common_progressions.len());
            level.common_progressions[idx].clone()
        };

        self.from_roman(&template, key, Some(level), options)
    }

    /// One chord voiced against `previous`, or a plain root-position chord
    /// when voice leading is off.
    pub fn chord_with_voice_leading(
        &self,
        root: PitchClass,
        chord_type: ChordType,
        previous: Option<&Chord>,
        voice_leading: bool,
        octave: i32,
    ) -> Chord {
        if !voice_leading {
            return Chord::build(root, chord_type, octave, 0);
        }

        let previous_notes = previous.map(|c| c.notes.as_slice());
        let voicing = find_best_voicing(
            previous_notes,
            root,
            chord_type,
            InversionCandidates::UpTo(chord_type.max_inversion()),
            octave,
        );
        let mut chord = Chord::build(root, chord_type, voicing.octave, voicing.inversion);
        if previous.is_some() {
            chord.notes = voicing.notes;
        }
        chord
    }

    fn random_inversion(&mut self, level: Option<&DifficultyLevel>) -> usize {
        match level {
            Some(level) if level.use_inversions && self.rng.f64() < level.inversion_probability => {
                self.rng.usize(..=level.max_inversion)
            }
            _ => 0,
        }
    }

    fn random_key(&mut self, level: &DifficultyLevel) -> PitchClass {
        match level.allowed_keys.as_deref() {
            Some(keys) if !keys.is_empty() => keys[self.rng.usize(..keys.len())],
            _ => PitchClass::from_semitones(self.rng.i32(0..12)),
        }
    }

    /// Random diatonic bases, each spelled for a random allowed chord type
    fn random_template(&mut self, level: &DifficultyLevel) -> Vec<String> {
        let length = level.progression_length.max(1);
        (0..length)
            .map(|_| {
                let base = CUSTOM_TEMPLATE_BASES[self.rng.usize(..CUSTOM_TEMPLATE_BASES.len())];
                let chord_type = if level.chord_types.is_empty() {
                    ChordType::Major
                } else {
                    level.chord_types[self.rng.usize(..level.chord_types.len())]
                };
                format_roman_for_chord_type(base, chord_type)
            })
            .collect()
    }
}

/// Generate from Roman tokens with an entropy-seeded generator
pub fn generate_progression_from_roman<S: AsRef<str>>(
    tokens: &[S],
    key: PitchClass,
    level: Option<&DifficultyLevel>,
    options: GenerationOptions,
) -> Result<ChordProgression> {
    ProgressionGenerator::new().from_roman(tokens, key, level, options)
}

/// Generate a random progression with an entropy-seeded generator
pub fn generate_random_progression(
    level: &DifficultyLevel,
    key: Option<PitchClass>,
    options: GenerationOptions,
) -> Result<ChordProgression> {
    ProgressionGenerator::new().random(level, key, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::{CustomDifficultySettings, DifficultyId};
    use crate::error::HenkaError;

    fn pc(name: &str) -> PitchClass {
        PitchClass::from_name(name).unwrap()
    }

    #[test]
    fn test_plain_generation_is_root_position() {
        let mut generator = ProgressionGenerator::with_seed(1);
        let progression = generator
            .from_roman(&["I", "IV", "V"], pc("D"), None, GenerationOptions::default())
            .unwrap();
        let notes: Vec<_> = progression.chords.iter().map(|c| c.notes.clone()).collect();
        assert_eq!(notes, vec![vec![62, 66, 69], vec![67, 71, 74], vec![69, 73, 76]]);
        assert_eq!(progression.tempo, 120);
        assert!(progression.chords.iter().all(|c| c.inversion == Some(0)));
    }

    #[test]
    fn test_explicit_inversion_without_voice_leading() {
        let mut generator = ProgressionGenerator::with_seed(1);
        let progression = generator
            .from_roman(&["V7/3rd", "I/99th"], PitchClass::C, None, GenerationOptions::default())
            .unwrap();
        assert_eq!(progression.chords[0].notes, vec![77, 79, 83, 86]);
        assert_eq!(progression.chords[1].inversion, Some(2));
        assert_eq!(progression.chords[1].notes, vec![67, 72, 76]);
    }

    #[test]
    fn test_voice_leading_override() {
        let beginner = DifficultyLevel::builtin(DifficultyId::Beginner);
        let mut generator = ProgressionGenerator::with_seed(1);
        let off = generator
            .from_roman(&["I", "V"], PitchClass::C, Some(&beginner), GenerationOptions::with_voice_leading(false))
            .unwrap();
        assert_eq!(off.chords[1].notes, vec![67, 71, 74]);

        let on = generator
            .from_roman(&["I", "V"], PitchClass::C, None, GenerationOptions::with_voice_leading(true))
            .unwrap();
        assert_eq!(on.chords[1].notes, vec![59, 62, 67]);
    }

    #[test]
    fn test_unknown_token_fails_fast() {
        let mut generator = ProgressionGenerator::with_seed(1);
        let err = generator
            .from_roman(&["I", "Q7"], PitchClass::C, None, GenerationOptions::default())
            .unwrap_err();
        assert_eq!(err, HenkaError::UnknownRomanNumeral("Q7".into()));
        let empty: [&str; 0] = [];
        assert_eq!(
            generator.from_roman(&empty, PitchClass::C, None, GenerationOptions::default()),
            Err(HenkaError::EmptyProgression)
        );
    }

    #[test]
    fn test_custom_template_uses_allowed_types() {
        let settings = CustomDifficultySettings {
            chord_types: vec![ChordType::Minor7, ChordType::Dominant7],
            progression_length: 5,
            ..Default::default()
        };
        let level = settings.to_level();
        let mut generator = ProgressionGenerator::with_seed(42);
        for _ in 0..20 {
            let progression = generator.random(&level, None, GenerationOptions::default()).unwrap();
            assert_eq!(progression.chords.len(), 5);
            for token in progression.roman_numerals() {
                let parsed = parse_roman(token).unwrap();
                assert!(matches!(parsed.chord_type, ChordType::Minor7 | ChordType::Dominant7));
            }
        }
    }

    #[test]
    fn test_random_inversions_stay_in_range() {
        let advanced = DifficultyLevel::builtin(DifficultyId::Advanced);
        let mut generator = ProgressionGenerator::with_seed(3);
        let options = GenerationOptions::with_voice_leading(false);
        for _ in 0..50 {
            let progression = generator.random(&advanced, Some(PitchClass::C), options).unwrap();
            for chord in &progression.chords {
                assert!(chord.inversion.unwrap() <= 3);
            }
        }
    }

    #[test]
    fn test_playground_chord() {
        let generator = ProgressionGenerator::with_seed(0);
        let c = generator.chord_with_voice_leading(PitchClass::C, ChordType::Major, None, true, 4);
        assert_eq!(c.notes, vec![60, 64, 67]);
        let f = generator.chord_with_voice_leading(pc("F"), ChordType::Major, Some(&c), true, 4);
        assert_eq!(f.notes, vec![60, 65, 69]);
        let plain = generator.chord_with_voice_leading(pc("F"), ChordType::Major, Some(&c), false, 4);
        assert_eq!(plain.notes, vec![65, 69, 72]);
    }
}
