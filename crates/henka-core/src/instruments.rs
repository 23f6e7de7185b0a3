//! Instrument presets: oscillator voices, envelopes and sample sets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HenkaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentId {
    SampledGrand,
    SampledViolin,
    SampledFlute,
    SampledTrumpet,
    WarmTriangle,
    PureSine,
    BrightSaw,
    RetroSquare,
    FeltPiano,
}

pub const DEFAULT_INSTRUMENT_ID: InstrumentId = InstrumentId::SampledGrand;

/// Presets in menu order: sampled instruments first
pub const INSTRUMENT_OPTIONS: [InstrumentId; 9] = [
    InstrumentId::SampledGrand,
    InstrumentId::SampledViolin,
    InstrumentId::SampledFlute,
    InstrumentId::SampledTrumpet,
    InstrumentId::WarmTriangle,
    InstrumentId::PureSine,
    InstrumentId::BrightSaw,
    InstrumentId::RetroSquare,
    InstrumentId::FeltPiano,
];

impl Default for InstrumentId {
    fn default() -> Self {
        DEFAULT_INSTRUMENT_ID
    }
}

impl InstrumentId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SampledGrand => "sampled_grand",
            Self::SampledViolin => "sampled_violin",
            Self::SampledFlute => "sampled_flute",
            Self::SampledTrumpet => "sampled_trumpet",
            Self::WarmTriangle => "warm_triangle",
            Self::PureSine => "pure_sine",
            Self::BrightSaw => "bright_saw",
            Self::RetroSquare => "retro_square",
            Self::FeltPiano => "felt_piano",
        }
    }

    pub fn config(&self) -> InstrumentConfig {
        InstrumentConfig::preset(*self)
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentId {
    type Err = HenkaError;

    fn from_str(s: &str) -> Result<Self> {
        INSTRUMENT_OPTIONS
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| HenkaError::UnknownInstrument(s.to_string()))
    }
}

/// Oscillator shape for synthesized voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub waveform: Waveform,
    pub gain: f32,
    /// Fine tuning in cents
    #[serde(default)]
    pub detune: f32,
}

impl VoiceConfig {
    const fn new(waveform: Waveform, gain: f32) -> Self {
        Self { waveform, gain, detune: 0.0 }
    }

    const fn detuned(self, detune: f32) -> Self {
        Self { detune, ..self }
    }
}

/// Attack and release windows in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f64,
    pub release: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    Synth,
    Sample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSampleExtension {
    Mp3,
    Ogg,
    Wav,
    Flac,
}

impl AudioSampleExtension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Wav => "wav",
            Self::Flac => "flac",
        }
    }
}

/// Extensions tried when a sample set names none
pub const DEFAULT_SAMPLE_EXTENSIONS: [AudioSampleExtension; 2] =
    [AudioSampleExtension::Mp3, AudioSampleExtension::Ogg];

pub const DEFAULT_SAMPLE_BASE_PATH: &str = "/audio";

/// A recorded note and the file it lives in (without extension)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDefinition {
    pub midi: u8,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePlaybackConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default)]
    pub extensions: Vec<AudioSampleExtension>,
    pub files: Vec<SampleDefinition>,
}

impl SamplePlaybackConfig {
    fn new(base_path: &str, files: &[(u8, &str)]) -> Self {
        Self {
            base_path: Some(base_path.to_string()),
            extensions: vec![AudioSampleExtension::Mp3],
            files: files
                .iter()
                .map(|&(midi, file)| SampleDefinition {
                    midi,
                    file: file.to_string(),
                })
                .collect(),
        }
    }

    pub fn base_path(&self) -> &str {
        self.base_path.as_deref().unwrap_or(DEFAULT_SAMPLE_BASE_PATH)
    }

    /// Configured extensions, or the defaults when none are listed
    pub fn extension_candidates(&self) -> &[AudioSampleExtension] {
        if self.extensions.is_empty() {
            &DEFAULT_SAMPLE_EXTENSIONS
        } else {
            &self.extensions
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub id: InstrumentId,
    pub label: String,
    pub description: String,
    pub voice: VoiceConfig,
    pub bass: VoiceConfig,
    pub envelope: Envelope,
    pub playback: PlaybackMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<SamplePlaybackConfig>,
}

impl InstrumentConfig {
    fn synth(id: InstrumentId, label: &str, description: &str, voice: VoiceConfig, bass: VoiceConfig, envelope: Envelope) -> Self {
        Self {
            id,
            label: label.to_string(),
            description: description.to_string(),
            voice,
            bass,
            envelope,
            playback: PlaybackMode::Synth,
            sample: None,
        }
    }

    fn sampled(self, sample: SamplePlaybackConfig) -> Self {
        Self {
            playback: PlaybackMode::Sample,
            sample: Some(sample),
            ..self
        }
    }

    pub fn preset(id: InstrumentId) -> Self {
        use Waveform::*;

        let keys_voice = VoiceConfig::new(Triangle, 1.05);
        let keys_bass = VoiceConfig::new(Sine, 1.2);

        match id {
            InstrumentId::SampledGrand => Self::synth(
                id,
                "Sampled Grand",
                "Layered piano samples with wide dynamic range.",
                keys_voice,
                keys_bass,
                Envelope { attack: 0.01, release: 0.35 },
            )
            .sampled(SamplePlaybackConfig::new(
                "/audio/piano",
                &[
                    (36, "Piano.ff.C2"),
                    (48, "Piano.ff.C3"),
                    (60, "Piano.ff.C4"),
                    (72, "Piano.ff.C5"),
                    (84, "Piano.ff.C6"),
                    (96, "Piano.ff.C7"),
                ],
            )),
            InstrumentId::SampledViolin => Self::synth(
                id,
                "Sampled Violin",
                "Expressive arco violin layers drawn from MIT-licensed takes.",
                keys_voice,
                keys_bass,
                Envelope { attack: 0.01, release: 0.3 },
            )
            .sampled(SamplePlaybackConfig::new(
                "/audio/violin",
                &[
                    (55, "violin_G3_15_forte_arco-normal"),
                    (60, "violin_C4_15_forte_arco-normal"),
                    (67, "violin_G4_15_mezzo-forte_arco-normal"),
                    (72, "violin_C5_15_fortissimo_arco-normal"),
                    (79, "violin_G5_15_forte_arco-normal"),
                    (84, "violin_C6_15_forte_arco-normal"),
                ],
            )),
            InstrumentId::SampledFlute => Self::synth(
                id,
                "Sampled Flute",
                "Bright concert flute captured at forte dynamics.",
                VoiceConfig::new(Triangle, 1.0),
                VoiceConfig::new(Sine, 1.1),
                Envelope { attack: 0.015, release: 0.22 },
            )
            .sampled(SamplePlaybackConfig::new(
                "/audio/flute",
                &[
                    (60, "flute_C4_15_forte_normal"),
                    (67, "flute_G4_15_forte_normal"),
                    (72, "flute_C5_15_forte_normal"),
                    (79, "flute_G5_15_forte_normal"),
                    (84, "flute_C6_15_forte_normal"),
                    (91, "flute_G6_15_forte_normal"),
                ],
            )),
            InstrumentId::SampledTrumpet => Self::synth(
                id,
                "Sampled Trumpet",
                "Bold brass timbre with forte sustains for lead lines.",
                VoiceConfig::new(Triangle, 1.1),
                VoiceConfig::new(Sine, 1.25),
                Envelope { attack: 0.02, release: 0.26 },
            )
            .sampled(SamplePlaybackConfig::new(
                "/audio/trumpet",
                &[
                    (52, "trumpet_E3_15_forte_normal"),
                    (59, "trumpet_B3_15_pianissimo_normal"),
                    (64, "trumpet_E4_15_forte_normal"),
                    (71, "trumpet_B4_15_forte_normal"),
                    (76, "trumpet_E5_15_forte_normal"),
                    (83, "trumpet_B5_15_forte_normal"),
                ],
            )),
            InstrumentId::WarmTriangle => Self::synth(
                id,
                "Warm Keys",
                "Rounded triangle wave with a balanced tone.",
                VoiceConfig::new(Triangle, 1.0),
                VoiceConfig::new(Sine, 1.2),
                Envelope { attack: 0.02, release: 0.12 },
            ),
            InstrumentId::PureSine => Self::synth(
                id,
                "Pure Sine",
                "Smooth sine pad for gentle practice.",
                VoiceConfig::new(Sine, 1.1),
                VoiceConfig::new(Sine, 1.3),
                Envelope { attack: 0.03, release: 0.16 },
            ),
            InstrumentId::BrightSaw => Self::synth(
                id,
                "Bright Saw",
                "Edgy sawtooth synth for clearer articulations.",
                VoiceConfig::new(Sawtooth, 0.9),
                VoiceConfig::new(Sawtooth, 1.0),
                Envelope { attack: 0.015, release: 0.18 },
            ),
            InstrumentId::RetroSquare => Self::synth(
                id,
                "Retro Square",
                "Chiptune-inspired square wave with a quick release.",
                VoiceConfig::new(Square, 0.95),
                VoiceConfig::new(Square, 1.05),
                Envelope { attack: 0.01, release: 0.1 },
            ),
            InstrumentId::FeltPiano => Self::synth(
                id,
                "Soft Piano",
                "Plucky triangle tone with a lingering piano-like decay.",
                VoiceConfig::new(Triangle, 1.1).detuned(-4.0),
                VoiceConfig::new(Sine, 1.35).detuned(4.0),
                Envelope { attack: 0.008, release: 0.28 },
            ),
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.playback == PlaybackMode::Sample && self.sample.as_ref().is_some_and(|s| !s.files.is_empty())
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        DEFAULT_INSTRUMENT_ID.config()
    }
}

/// Every preset in menu order
pub fn instrument_options() -> Vec<InstrumentConfig> {
    INSTRUMENT_OPTIONS.iter().map(InstrumentId::config).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for id in INSTRUMENT_OPTIONS {
            assert_eq!(id.as_str().parse::<InstrumentId>().unwrap(), id);
            assert_eq!(id.config().id, id);
        }
        assert_eq!(
            "theremin".parse::<InstrumentId>(),
            Err(HenkaError::UnknownInstrument("theremin".into()))
        );
    }

    #[test]
    fn test_sampled_presets_come_first() {
        let options = instrument_options();
        let first_synth = options.iter().position(|c| !c.is_sampled()).unwrap();
        assert_eq!(first_synth, 4);
        assert!(options[first_synth..].iter().all(|c| c.playback == PlaybackMode::Synth));
        assert_eq!(DEFAULT_INSTRUMENT_ID.config().label, "Sampled Grand");
    }

    #[test]
    fn test_sample_sets_sorted_by_pitch() {
        for config in instrument_options().into_iter().filter(InstrumentConfig::is_sampled) {
            let sample = config.sample.unwrap();
            assert!(sample.files.windows(2).all(|w| w[0].midi < w[1].midi));
            assert!(sample.base_path().starts_with("/audio/"));
        }
    }

    #[test]
    fn test_felt_piano_detunes_voices() {
        let felt = InstrumentId::FeltPiano.config();
        assert_eq!(felt.voice.detune, -4.0);
        assert_eq!(felt.bass.detune, 4.0);
        assert_eq!(felt.label, "Soft Piano");
    }

    #[test]
    fn test_extension_candidates_default() {
        let config = SamplePlaybackConfig {
            base_path: None,
            extensions: vec![],
            files: vec![],
        };
        assert_eq!(config.base_path(), "/audio");
        assert_eq!(config.extension_candidates(), &DEFAULT_SAMPLE_EXTENSIONS);
    }
}
