//! Difficulty levels: chord vocabulary, templates and inversion policy

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HenkaError, Result};
use crate::theory::{ChordType, PitchClass};

/// Named difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyId {
    Easy,
    Beginner,
    Intermediate,
    Advanced,
    Custom,
}

impl DifficultyId {
    pub const BUILT_IN: [DifficultyId; 4] = [
        Self::Easy,
        Self::Beginner,
        Self::Intermediate,
        Self::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Custom => "custom",
        }
    }

    /// Levels whose answers keep inversion suffixes
    pub fn expects_inversions_in_answers(&self) -> bool {
        matches!(self, Self::Advanced | Self::Custom)
    }
}

impl fmt::Display for DifficultyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyId {
    type Err = HenkaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "easy" => Ok(Self::Easy),
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            "custom" => Ok(Self::Custom),
            other => Err(HenkaError::UnknownDifficulty(other.to_string())),
        }
    }
}

/// Generation settings for one difficulty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyLevel {
    pub id: DifficultyId,
    pub name: String,
    pub chord_types: Vec<ChordType>,
    pub progression_length: usize,
    /// Roman-numeral templates; empty means templates are randomized
    #[serde(default)]
    pub common_progressions: Vec<Vec<String>>,
    pub use_inversions: bool,
    /// Probability in 0..=1 of drawing a random inversion
    pub inversion_probability: f64,
    pub max_inversion: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_keys: Option<Vec<PitchClass>>,
    pub use_voice_leading: bool,
}

fn templates(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|t| t.to_string()).collect())
        .collect()
}

impl DifficultyLevel {
    /// Built-in level for a named difficulty. `Custom` yields its defaults.
    pub fn builtin(id: DifficultyId) -> Self {
        match id {
            DifficultyId::Easy => Self {
                id,
                name: "Easy".into(),
                chord_types: vec![ChordType::Major, ChordType::Minor],
                progression_length: 4,
                common_progressions: templates(&[
                    &["I", "V", "vi", "IV"],
                    &["vi", "IV", "I", "V"],
                    &["I", "vi", "IV", "V"],
                ]),
                use_inversions: false,
                inversion_probability: 0.0,
                max_inversion: 0,
                allowed_keys: Some(
                    ["C", "G", "F", "D"]
                        .iter()
                        .filter_map(|k| PitchClass::from_name(k).ok())
                        .collect(),
                ),
                use_voice_leading: false,
            },
            DifficultyId::Beginner => Self {
                id,
                name: "Beginner".into(),
                chord_types: vec![ChordType::Major, ChordType::Minor],
                progression_length: 4,
                common_progressions: templates(&[
                    &["I", "V", "vi", "IV"],
                    &["vi", "IV", "I", "V"],
                    &["I", "vi", "IV", "V"],
                    &["ii", "V", "I", "vi"],
                ]),
                use_inversions: false,
                inversion_probability: 0.0,
                max_inversion: 2,
                allowed_keys: None,
                use_voice_leading: true,
            },
            DifficultyId::Intermediate => Self {
                id,
                name: "Intermediate".into(),
                chord_types: vec![
                    ChordType::Major,
                    ChordType::Minor,
                    ChordType::Major7,
                    ChordType::Minor7,
                    ChordType::Dominant7,
                ],
                progression_length: 4,
                common_progressions: templates(&[
                    &["Imaj7", "vi7", "ii7", "V7"],
                    &["vi7", "ii7", "V7", "Imaj7"],
                    &["Imaj7", "IV7", "vii7", "iii7"],
                    &["ii7", "V7", "Imaj7", "vi7"],
                ]),
                use_inversions: true,
                inversion_probability: 0.3,
                max_inversion: 1,
                allowed_keys: None,
                use_voice_leading: true,
            },
            DifficultyId::Advanced => Self {
                id,
                name: "Advanced".into(),
                chord_types: vec![
                    ChordType::Major,
                    ChordType::Minor,
                    ChordType::Major7,
                    ChordType::Minor7,
                    ChordType::Dominant7,
                    ChordType::Diminished7,
                    ChordType::HalfDiminished7,
                    ChordType::Major9,
                    ChordType::Minor9,
                ],
                progression_length: 6,
                common_progressions: templates(&[
                    &["Imaj9", "vi7", "ii7", "V7", "iii7", "vi7"],
                    &["ii7", "V7", "Imaj9", "vi7", "ii7", "V7"],
                    &["Imaj7", "vii7", "iii7", "vi7", "ii7", "V7"],
                ]),
                use_inversions: true,
                inversion_probability: 0.6,
                max_inversion: 3,
                allowed_keys: None,
                use_voice_leading: true,
            },
            DifficultyId::Custom => CustomDifficultySettings::default().to_level(),
        }
    }

    /// Built-in level by name ("easy", "beginner", ...)
    pub fn by_name(name: &str) -> Result<Self> {
        Ok(Self::builtin(name.parse()?))
    }
}

/// User-editable settings behind the `custom` difficulty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomDifficultySettings {
    pub chord_types: Vec<ChordType>,
    pub progression_length: usize,
    pub use_inversions: bool,
    pub inversion_probability: f64,
    pub max_inversion: usize,
    pub use_voice_leading: bool,
    pub allowed_keys: Option<Vec<PitchClass>>,
}

impl Default for CustomDifficultySettings {
    fn default() -> Self {
        Self {
            chord_types: vec![ChordType::Major, ChordType::Minor, ChordType::Dominant7],
            progression_length: 4,
            use_inversions: false,
            inversion_probability: 0.0,
            max_inversion: 0,
            use_voice_leading: true,
            allowed_keys: None,
        }
    }
}

impl CustomDifficultySettings {
    /// Resolve into a level. An empty chord-type list falls back to major.
    pub fn to_level(&self) -> DifficultyLevel {
        let chord_types = if self.chord_types.is_empty() {
            vec![ChordType::Major]
        } else {
            self.chord_types.clone()
        };

        DifficultyLevel {
            id: DifficultyId::Custom,
            name: "Custom".into(),
            chord_types,
            progression_length: self.progression_length.max(1),
            common_progressions: Vec::new(),
            use_inversions: self.use_inversions,
            inversion_probability: self.inversion_probability.clamp(0.0, 1.0),
            max_inversion: if self.use_inversions { self.max_inversion } else { 0 },
            allowed_keys: self.allowed_keys.clone().filter(|keys| !keys.is_empty()),
            use_voice_leading: self.use_voice_leading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roman::parse_roman;

    #[test]
    fn test_builtin_templates_parse() {
        for id in DifficultyId::BUILT_IN {
            let level = DifficultyLevel::builtin(id);
            assert!(!level.common_progressions.is_empty());
            for template in &level.common_progressions {
                assert_eq!(template.len(), level.progression_length, "{id}");
                for token in template {
                    let parsed = parse_roman(token).unwrap();
                    assert!(level.chord_types.contains(&parsed.chord_type) || parsed.chord_type == ChordType::Major9);
                }
            }
        }
    }

    #[test]
    fn test_difficulty_names() {
        assert_eq!("beginner".parse::<DifficultyId>().unwrap(), DifficultyId::Beginner);
        assert!(matches!(
            DifficultyLevel::by_name("impossible"),
            Err(HenkaError::UnknownDifficulty(_))
        ));
    }

    #[test]
    fn test_easy_limits_keys() {
        let easy = DifficultyLevel::builtin(DifficultyId::Easy);
        let keys: Vec<&str> = easy.allowed_keys.unwrap().iter().map(|k| k.name()).collect();
        assert_eq!(keys, vec!["C", "G", "F", "D"]);
    }

    #[test]
    fn test_custom_settings_resolve() {
        let settings = CustomDifficultySettings {
            chord_types: vec![],
            progression_length: 0,
            use_inversions: false,
            inversion_probability: 3.0,
            max_inversion: 4,
            use_voice_leading: false,
            allowed_keys: Some(vec![]),
        };
        let level = settings.to_level();
        assert_eq!(level.id, DifficultyId::Custom);
        assert_eq!(level.chord_types, vec![ChordType::Major]);
        assert_eq!(level.progression_length, 1);
        assert_eq!(level.max_inversion, 0);
        assert_eq!(level.inversion_probability, 1.0);
        assert_eq!(level.allowed_keys, None);
        assert!(level.common_progressions.is_empty());
    }
}
