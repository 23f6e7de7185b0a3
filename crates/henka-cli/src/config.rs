use std::path::PathBuf;

use henka_core::{CustomDifficultySettings, InstrumentId};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct AppConfig {
    #[serde(default)]
    pub instrument: InstrumentId,
    /// Overrides each level's voice-leading flag when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_leading: Option<bool>,
    #[serde(default)]
    pub custom_difficulty: CustomDifficultySettings,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub(crate) struct AudioConfig {
    /// Origin serving the sample files
    pub base_url: String,
    /// Local mirror of the served files; takes precedence over `base_url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_dir: Option<PathBuf>,
    pub path_prefix: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            sample_dir: None,
            path_prefix: String::new(),
        }
    }
}

pub(crate) fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("henka")
        .join("config.toml")
}

pub(crate) fn load_config() -> AppConfig {
    let path = config_path();
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| match toml::from_str(&s) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring malformed config: {}", e);
                None
            }
        })
        .unwrap_or_default()
}

pub(crate) fn save_config(config: &AppConfig) -> anyhow::Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let s = toml::to_string_pretty(config)?;
    std::fs::write(&path, s)?;
    tracing::debug!(path = %path.display(), "Saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use henka_core::ChordType;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            instrument = "bright_saw"

            [audio]
            sample_dir = "/srv/henka/public"
            "#,
        )
        .unwrap();

        assert_eq!(config.instrument, InstrumentId::BrightSaw);
        assert_eq!(config.voice_leading, None);
        assert_eq!(config.custom_difficulty, CustomDifficultySettings::default());
        assert_eq!(config.audio.base_url, "http://localhost:3000");
        assert_eq!(config.audio.sample_dir, Some(PathBuf::from("/srv/henka/public")));
    }

    #[test]
    fn test_custom_difficulty_survives_toml() {
        let mut config = AppConfig::default();
        config.custom_difficulty.chord_types = vec![ChordType::Minor7, ChordType::HalfDiminished7];
        config.custom_difficulty.use_inversions = true;
        config.custom_difficulty.max_inversion = 2;
        config.voice_leading = Some(false);

        let text = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.custom_difficulty, config.custom_difficulty);
        assert_eq!(back.voice_leading, Some(false));
    }
}
