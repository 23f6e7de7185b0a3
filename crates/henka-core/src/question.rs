//! Quiz questions and answer checking

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chord::ChordProgression;
use crate::difficulty::DifficultyLevel;
use crate::error::Result;
use crate::progression::{GenerationOptions, ProgressionGenerator};

/// How answers are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Chord names such as `Cmaj7 Am7 Dm7 G7`
    Absolute,
    /// Roman numerals such as `Imaj7 vi7 ii7 V7`
    Transpose,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute => f.write_str("absolute"),
            Self::Transpose => f.write_str("transpose"),
        }
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "absolute" => Ok(Self::Absolute),
            "transpose" | "roman" => Ok(Self::Transpose),
            other => Err(format!("unknown game mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub mode: GameMode,
    pub progression: ChordProgression,
    pub correct_answer: Vec<String>,
}

impl Question {
    pub fn new(mode: GameMode, progression: ChordProgression, level: &DifficultyLevel) -> Self {
        let correct_answer = correct_answer(&progression, mode, level);
        Self {
            mode,
            progression,
            correct_answer,
        }
    }

    pub fn check(&self, answer: &[impl AsRef<str>]) -> bool {
        validate_answer(&self.correct_answer, answer, self.mode)
    }

    pub fn hint(&self) -> String {
        let key = self.progression.key;
        match self.mode {
            GameMode::Absolute => format!(
                "The progression is in the key of {key}. Listen for the chord qualities and root movements."
            ),
            GameMode::Transpose => format!(
                "The root note is {key}. Identify the Roman numerals based on the scale degrees and chord qualities."
            ),
        }
    }
}

/// Expected answer per chord. Inversion suffixes only count on levels that
/// expect them.
pub fn correct_answer(progression: &ChordProgression, mode: GameMode, level: &DifficultyLevel) -> Vec<String> {
    let keep_inversions = level.id.expects_inversions_in_answers();

    progression
        .chords
        .iter()
        .map(|chord| {
            let label = match mode {
                GameMode::Absolute => chord.name.as_str(),
                GameMode::Transpose => chord.roman_numeral.as_deref().unwrap_or("I"),
            };
            if keep_inversions {
                label.to_string()
            } else {
                strip_inversion(label).to_string()
            }
        })
        .collect()
}

fn strip_inversion(label: &str) -> &str {
    label.split('/').next().unwrap_or(label)
}

/// Compare answers chord by chord after normalising notation aliases
pub fn validate_answer(correct: &[String], answer: &[impl AsRef<str>], mode: GameMode) -> bool {
    if correct.len() != answer.len() {
        return false;
    }

    correct.iter().zip(answer).all(|(expected, given)| {
        let normalize = match mode {
            GameMode::Absolute => normalize_absolute_chord,
            GameMode::Transpose => normalize_roman_numeral,
        };
        normalize(expected.trim()) == normalize(given.as_ref().trim())
    })
}

fn remove_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Case-insensitive chord name with quality aliases folded together
pub fn normalize_absolute_chord(chord: &str) -> String {
    let compact = remove_whitespace(chord);
    let (name, inversion) = match compact.split_once('/') {
        Some((name, inversion)) => (name, Some(inversion)),
        None => (compact.as_str(), None),
    };
    let (root, quality) = name.split_at(root_len(name));

    let mut normalized = root.to_lowercase();
    normalized.push_str(&normalize_quality(quality));
    if let Some(inversion) = inversion {
        normalized.push('/');
        normalized.push_str(&inversion.to_lowercase());
    }
    normalized
}

/// Byte length of a leading note name such as `C`, `f#` or `Bb`
fn root_len(name: &str) -> usize {
    match name.as_bytes() {
        [letter, b'#' | b'b', ..] if letter.is_ascii_alphabetic() => 2,
        [letter, ..] if letter.is_ascii_alphabetic() => 1,
        _ => 0,
    }
}

fn normalize_quality(quality: &str) -> String {
    const WORDS: [(&str, &str); 9] = [
        ("half-diminished", "hdim"),
        ("halfdiminished", "hdim"),
        ("ø", "hdim"),
        ("diminished", "dim"),
        ("°", "dim"),
        ("dominant", "dom"),
        ("augmented", "aug"),
        ("major", "maj"),
        ("minor", "min"),
    ];
    const PREFIXES: [(&str, &str); 4] = [("hdim7", "m7b5"), ("hdim", "m7b5"), ("dom", ""), ("min", "m")];

    // a bare upper-case M is major; lower-cased it would read as minor
    let quality = match quality.strip_prefix('M') {
        Some(rest) if rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_digit()) => format!("maj{rest}"),
        _ => quality.to_string(),
    };
    let folded = WORDS
        .iter()
        .fold(quality.to_lowercase(), |acc, &(from, to)| acc.replacen(from, to, 1));

    for (from, to) in PREFIXES {
        if let Some(rest) = folded.strip_prefix(from) {
            return format!("{to}{rest}");
        }
    }
    if folded == "maj" { String::new() } else { folded }
}

/// Roman numeral with seventh-chord aliases folded together. Case is kept
/// since it carries the chord quality.
pub fn normalize_roman_numeral(roman: &str) -> String {
    const ALIASES: [(&str, &str); 5] = [
        ("maj7", "M7"),
        ("min7", "m7"),
        ("dom7", "7"),
        ("°7", "dim7"),
        ("ø7", "m7b5"),
    ];

    ALIASES
        .iter()
        .fold(remove_whitespace(roman), |acc, &(from, to)| acc.replacen(from, to, 1))
}

/// Builds quiz questions from random progressions
#[derive(Debug, Clone, Default)]
pub struct QuestionGenerator {
    generator: ProgressionGenerator,
}

impl QuestionGenerator {
    pub fn new(generator: ProgressionGenerator) -> Self {
        Self { generator }
    }

    pub fn question(&mut self, mode: GameMode, level: &DifficultyLevel, options: GenerationOptions) -> Result<Question> {
        let progression = self.generator.random(level, None, options)?;
        Ok(Question::new(mode, progression, level))
    }

    pub fn question_set(
        &mut self,
        mode: GameMode,
        level: &DifficultyLevel,
        count: usize,
        options: GenerationOptions,
    ) -> Result<Vec<Question>> {
        (0..count).map(|_| self.question(mode, level, options)).collect()
    }
}
