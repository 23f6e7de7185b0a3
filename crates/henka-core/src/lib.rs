//! henka-core: Music theory and progression generation for henka ear training

pub mod chord;
pub mod difficulty;
mod error;
pub mod instruments;
pub mod labels;
pub mod progression;
pub mod question;
pub mod roman;
pub mod theory;
pub mod voice_leading;

pub use chord::{build_chord, inversion_suffix, Chord, ChordProgression, DEFAULT_OCTAVE, DEFAULT_TEMPO};
pub use difficulty::{CustomDifficultySettings, DifficultyId, DifficultyLevel};
pub use error::{HenkaError, Result};
pub use instruments::{
    instrument_options, AudioSampleExtension, Envelope, InstrumentConfig, InstrumentId, PlaybackMode,
    SampleDefinition, SamplePlaybackConfig, VoiceConfig, Waveform, DEFAULT_INSTRUMENT_ID, INSTRUMENT_OPTIONS,
};
pub use labels::{format_absolute_label, format_roman_for_chord_type, format_roman_label, normalize_key_signature, CIRCLE_OF_FIFTHS};
pub use progression::{generate_progression_from_roman, generate_random_progression, GenerationOptions, ProgressionGenerator};
pub use question::{validate_answer, GameMode, Question, QuestionGenerator};
pub use roman::{parse_roman, RomanNumeral};
pub use theory::{midi_to_frequency, ChordType, PitchClass, KEYS};
pub use voice_leading::{find_best_voicing, InversionCandidates, Voicing};
