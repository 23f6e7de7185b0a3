//! Current settings for the running process

use henka_core::{CustomDifficultySettings, DifficultyId, DifficultyLevel, GenerationOptions, InstrumentId};
use henka_services::{AudioEngine, ContextFactory, DirFetcher, HttpFetcher};

use crate::config::{load_config, save_config, AppConfig};

/// Owns the loaded config and resolves it into the values core calls take
pub(crate) struct Settings {
    config: AppConfig,
}

impl Settings {
    pub fn load() -> Self {
        Self { config: load_config() }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn save(&self) -> anyhow::Result<()> {
        save_config(&self.config)
    }

    /// Built-in level, or the latest custom settings for `custom`
    pub fn difficulty(&self, id: DifficultyId) -> DifficultyLevel {
        match id {
            DifficultyId::Custom => self.config.custom_difficulty.to_level(),
            builtin => DifficultyLevel::builtin(builtin),
        }
    }

    pub fn custom_difficulty(&self) -> &CustomDifficultySettings {
        &self.config.custom_difficulty
    }

    pub fn set_custom_difficulty(&mut self, custom: CustomDifficultySettings) {
        self.config.custom_difficulty = custom;
    }

    pub fn instrument(&self) -> InstrumentId {
        self.config.instrument
    }

    pub fn set_instrument(&mut self, id: InstrumentId) {
        self.config.instrument = id;
    }

    pub fn set_voice_leading(&mut self, enabled: Option<bool>) {
        self.config.voice_leading = enabled;
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            voice_leading: self.config.voice_leading,
        }
    }

    /// Engine on `factory`, fetching samples the way the config says
    pub fn engine(&self, factory: impl ContextFactory + 'static, instrument: Option<InstrumentId>) -> AudioEngine {
        let audio = &self.config.audio;
        let engine = match &audio.sample_dir {
            Some(dir) => AudioEngine::new(factory, DirFetcher::new(dir)),
            None => AudioEngine::new(factory, HttpFetcher::new(audio.base_url.clone())),
        };
        engine
            .with_path_prefix(audio.path_prefix.clone())
            .with_instrument(instrument.unwrap_or(self.config.instrument))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use henka_core::ChordType;

    #[test]
    fn test_custom_level_reads_latest_settings() {
        let mut settings = Settings {
            config: AppConfig::default(),
        };
        let before = settings.difficulty(DifficultyId::Custom);
        assert_eq!(before.progression_length, 4);

        let mut custom = settings.custom_difficulty().clone();
        custom.progression_length = 7;
        custom.chord_types = vec![ChordType::Diminished7];
        settings.set_custom_difficulty(custom);

        let after = settings.difficulty(DifficultyId::Custom);
        assert_eq!(after.progression_length, 7);
        assert_eq!(after.chord_types, vec![ChordType::Diminished7]);
        assert_eq!(settings.difficulty(DifficultyId::Easy).id, DifficultyId::Easy);
    }

    #[test]
    fn test_voice_leading_override() {
        let mut settings = Settings {
            config: AppConfig::default(),
        };
        assert_eq!(settings.generation_options().voice_leading, None);
        settings.set_voice_leading(Some(false));
        assert_eq!(settings.generation_options(), GenerationOptions::with_voice_leading(false));
    }
}
