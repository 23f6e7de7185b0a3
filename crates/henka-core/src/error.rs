//! Error types for henka

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HenkaError {
    #[error("Unknown chord type: {0}")]
    UnknownChordType(String),
    #[error("Unknown key: {0}")]
    UnknownKey(String),
    #[error("Unknown Roman numeral: {0}")]
    UnknownRomanNumeral(String),
    #[error("Unknown difficulty: {0}")]
    UnknownDifficulty(String),
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("Progression has no chords")]
    EmptyProgression,
}

pub type Result<T> = std::result::Result<T, HenkaError>;
