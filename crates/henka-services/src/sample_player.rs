//! Sampled instruments: fetch, decode and pitch-shift recorded notes

use std::io::{Cursor, ErrorKind, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use henka_core::{AudioSampleExtension, SamplePlaybackConfig};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_VORBIS};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info};

use crate::graph::{BufferSource, Source};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SampleError {
    #[error("No supported audio format for sample playback")]
    NoSupportedFormat,
    #[error("Failed to fetch sample {path}: {reason}")]
    Fetch { path: String, reason: String },
    #[error("Failed to decode sample {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("Sample set is empty")]
    Empty,
}

// ============================================================================
// Fetching
// ============================================================================

/// Retrieves raw sample file bytes by their site-relative path
pub trait SampleFetcher: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, SampleError>;
}

/// Fetches over HTTP from a static origin
pub struct HttpFetcher {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }
}

impl SampleFetcher for HttpFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, SampleError> {
        let url = format!("{}{}", self.base_url, path);
        let fetch_err = |reason: String| SampleError::Fetch {
            path: url.clone(),
            reason,
        };

        let response = self.agent.get(&url).call().map_err(|e| fetch_err(e.to_string()))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes)
    }
}

/// Reads samples from a local directory mirroring the served layout
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SampleFetcher for DirFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, SampleError> {
        let full = self.root.join(path.trim_start_matches('/'));
        std::fs::read(&full).map_err(|e| SampleError::Fetch {
            path: full.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Serves bytes from a map; anything missing is a fetch error
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    files: std::collections::HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }
}

impl SampleFetcher for MemoryFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, SampleError> {
        self.files.get(path).cloned().ok_or_else(|| SampleError::Fetch {
            path: path.to_string(),
            reason: "not found".to_string(),
        })
    }
}

// ============================================================================
// Paths and formats
// ============================================================================

fn trim_slashes(segment: &str) -> &str {
    segment.trim_start_matches('/').trim_end_matches('/')
}

/// `/{prefix}/{base}/{file}.{ext}`, skipping empty segments
pub fn build_sample_path(
    prefix: &str,
    config: &SamplePlaybackConfig,
    file: &str,
    extension: AudioSampleExtension,
) -> String {
    let segments: Vec<String> = [trim_slashes(prefix), trim_slashes(config.base_path())]
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .chain(std::iter::once(format!("{}.{}", file, extension.as_str())))
        .collect();

    format!("/{}", segments.join("/"))
}

/// Whether this build can decode the container
pub fn is_extension_supported(extension: AudioSampleExtension) -> bool {
    let codecs = symphonia::default::get_codecs();
    match extension {
        AudioSampleExtension::Wav => true,
        AudioSampleExtension::Mp3 => codecs.get_codec(CODEC_TYPE_MP3).is_some(),
        AudioSampleExtension::Ogg => codecs.get_codec(CODEC_TYPE_VORBIS).is_some(),
        AudioSampleExtension::Flac => codecs.get_codec(CODEC_TYPE_FLAC).is_some(),
    }
}

/// First decodable candidate, else the first candidate
pub fn detect_supported_extension(config: &SamplePlaybackConfig) -> Option<AudioSampleExtension> {
    let candidates = config.extension_candidates();
    candidates
        .iter()
        .copied()
        .find(|ext| is_extension_supported(*ext))
        .or_else(|| candidates.first().copied())
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode to mono at `target_rate`
pub fn decode_sample(
    bytes: Vec<u8>,
    extension: AudioSampleExtension,
    target_rate: u32,
    path: &str,
) -> Result<Vec<f32>, SampleError> {
    let decode_err = |reason: String| SampleError::Decode {
        path: path.to_string(),
        reason,
    };

    let (mono, rate) = match extension {
        AudioSampleExtension::Wav => decode_wav(bytes).map_err(decode_err)?,
        _ => decode_compressed(bytes, extension).map_err(decode_err)?,
    };

    if mono.is_empty() {
        return Err(SampleError::Empty);
    }

    resample(&mono, rate, target_rate).map_err(decode_err)
}

fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn decode_wav(bytes: Vec<u8>) -> Result<(Vec<f32>, u32), String> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?
        }
    };

    Ok((mix_to_mono(&samples, spec.channels as usize), spec.sample_rate))
}

fn decode_compressed(bytes: Vec<u8>, extension: AudioSampleExtension) -> Result<(Vec<f32>, u32), String> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension.as_str());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| e.to_string())?;
    let mut format = probed.format;

    let track = format.default_track().ok_or("no audio track")?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| e.to_string())?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.to_string()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.to_string()),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        mono.extend(mix_to_mono(buffer.samples(), spec.channels.count()));
    }

    let rate = sample_rate.ok_or("unknown sample rate")?;
    Ok((mono, rate))
}

/// Below this many frames the sinc resampler has nothing to work with
const MIN_SINC_FRAMES: usize = 512;

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, String> {
    if from_rate == to_rate || from_rate == 0 {
        return Ok(samples.to_vec());
    }
    if samples.len() < MIN_SINC_FRAMES {
        return Ok(resample_linear(samples, from_rate, to_rate));
    }

    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(to_rate as f64 / from_rate as f64, 2.0, params, samples.len(), 1)
        .map_err(|e| format!("Resample init error: {}", e))?;

    let output = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| format!("Resample error: {}", e))?;

    Ok(output.into_iter().flatten().collect())
}

fn resample_linear(data: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (data.len() as f64 / ratio).ceil() as usize;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;
            let s0 = data.get(idx).copied().unwrap_or(0.0);
            let s1 = data.get(idx + 1).copied().unwrap_or(s0);
            s0 + frac * (s1 - s0)
        })
        .collect()
}

// ============================================================================
// Player
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoadedSample {
    pub midi: u8,
    pub file: String,
    pub buffer: Arc<Vec<f32>>,
}

/// Decoded sample set for one instrument at one sample rate
#[derive(Debug)]
pub struct SamplePlayer {
    config: SamplePlaybackConfig,
    path_prefix: String,
    samples: Vec<LoadedSample>,
    extension: Option<AudioSampleExtension>,
}

impl SamplePlayer {
    pub fn new(config: SamplePlaybackConfig, path_prefix: impl Into<String>) -> Self {
        Self {
            config,
            path_prefix: path_prefix.into(),
            samples: Vec::new(),
            extension: None,
        }
    }

    /// Fetch and decode every file. A no-op once loaded.
    ///
    /// Any single failure fails the whole load and leaves the player empty.
    pub fn load(&mut self, fetcher: &dyn SampleFetcher, sample_rate: u32) -> Result<(), SampleError> {
        if self.is_ready() {
            return Ok(());
        }

        let extension = detect_supported_extension(&self.config).ok_or(SampleError::NoSupportedFormat)?;
        self.extension = Some(extension);

        let paths: Vec<String> = self
            .config
            .files
            .iter()
            .map(|sample| build_sample_path(&self.path_prefix, &self.config, &sample.file, extension))
            .collect();

        let results: Vec<Result<LoadedSample, SampleError>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .config
                .files
                .iter()
                .zip(&paths)
                .map(|(sample, path)| {
                    scope.spawn(move || -> Result<LoadedSample, SampleError> {
                        let bytes = fetcher.fetch(path)?;
                        let buffer = decode_sample(bytes, extension, sample_rate, path)?;
                        Ok(LoadedSample {
                            midi: sample.midi,
                            file: sample.file.clone(),
                            buffer: Arc::new(buffer),
                        })
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(&paths)
                .map(|(handle, path)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(SampleError::Decode {
                            path: path.clone(),
                            reason: "decoder thread panicked".to_string(),
                        })
                    })
                })
                .collect()
        });

        let mut loaded = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        if loaded.is_empty() {
            return Err(SampleError::Empty);
        }
        loaded.sort_by_key(|s| s.midi);

        info!(
            samples = loaded.len(),
            extension = extension.as_str(),
            sample_rate,
            "Loaded sample set"
        );
        self.samples = loaded;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn extension(&self) -> Option<AudioSampleExtension> {
        self.extension
    }

    pub fn samples(&self) -> &[LoadedSample] {
        &self.samples
    }

    /// Nearest sample by MIDI distance; the first one scanned wins ties
    pub fn closest_sample(&self, target_midi: u8) -> Option<&LoadedSample> {
        let mut iter = self.samples.iter();
        let mut closest = iter.next()?;
        let mut smallest = (target_midi as i32 - closest.midi as i32).abs();

        for sample in iter {
            let distance = (target_midi as i32 - sample.midi as i32).abs();
            if distance < smallest {
                smallest = distance;
                closest = sample;
            }
        }
        Some(closest)
    }

    /// Source playing the nearest sample, detuned to land on `target_midi`
    pub fn create_source(&self, target_midi: u8, detune_cents: f64) -> Option<Source> {
        let sample = self.closest_sample(target_midi)?;
        let total = (target_midi as f64 - sample.midi as f64) * 100.0 + detune_cents;
        Some(Source::Buffer(BufferSource::new(sample.buffer.clone(), total)))
    }

    pub fn dispose(&mut self) {
        self.samples.clear();
        self.extension = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use henka_core::SampleDefinition;

    fn config(base_path: Option<&str>, files: &[(u8, &str)]) -> SamplePlaybackConfig {
        SamplePlaybackConfig {
            base_path: base_path.map(str::to_string),
            extensions: vec![AudioSampleExtension::Wav],
            files: files
                .iter()
                .map(|&(midi, file)| SampleDefinition {
                    midi,
                    file: file.to_string(),
                })
                .collect(),
        }
    }

    fn wav_bytes(frames: usize, sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames * channels as usize {
                let v = if i % 2 == 0 { 8_000 } else { -8_000 };
                writer.write_sample(v as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_sample_paths() {
        let cfg = config(Some("/audio/piano/"), &[]);
        assert_eq!(
            build_sample_path("", &cfg, "C4", AudioSampleExtension::Mp3),
            "/audio/piano/C4.mp3"
        );
        assert_eq!(
            build_sample_path("/henka/", &cfg, "C4", AudioSampleExtension::Ogg),
            "/henka/audio/piano/C4.ogg"
        );

        let default_base = config(None, &[]);
        assert_eq!(
            build_sample_path("", &default_base, "A3", AudioSampleExtension::Wav),
            "/audio/A3.wav"
        );
        let root = config(Some("/"), &[]);
        assert_eq!(build_sample_path("", &root, "A3", AudioSampleExtension::Wav), "/A3.wav");
    }

    #[test]
    fn test_extension_detection() {
        let wav = config(None, &[]);
        assert_eq!(detect_supported_extension(&wav), Some(AudioSampleExtension::Wav));

        let mut defaults = config(None, &[]);
        defaults.extensions.clear();
        let detected = detect_supported_extension(&defaults);
        assert!(matches!(
            detected,
            Some(AudioSampleExtension::Mp3) | Some(AudioSampleExtension::Ogg)
        ));
    }

    #[test]
    fn test_decode_wav_mixes_and_resamples() {
        let mono = decode_sample(wav_bytes(1_000, 22_050, 2), AudioSampleExtension::Wav, 44_100, "x").unwrap();
        assert!((mono.len() as i64 - 2_000).abs() <= 16, "{}", mono.len());
        // Alternating L/R samples cancel out
        assert!(mono.iter().all(|s| s.abs() < 0.05));

        let short = decode_sample(wav_bytes(10, 8_000, 1), AudioSampleExtension::Wav, 16_000, "x").unwrap();
        assert_eq!(short.len(), 20);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_sample(vec![1, 2, 3], AudioSampleExtension::Wav, 44_100, "bad.wav"),
            Err(SampleError::Decode { .. })
        ));
        assert_eq!(
            decode_sample(wav_bytes(0, 44_100, 1), AudioSampleExtension::Wav, 44_100, "empty.wav"),
            Err(SampleError::Empty)
        );
    }

    #[test]
    fn test_load_sorts_and_picks_closest() {
        let cfg = config(Some("/audio"), &[(72, "C5"), (60, "C4"), (66, "Fs4")]);
        let mut fetcher = MemoryFetcher::new();
        for file in ["C5", "C4", "Fs4"] {
            fetcher.insert(format!("/audio/{file}.wav"), wav_bytes(64, 8_000, 1));
        }

        let mut player = SamplePlayer::new(cfg, "");
        assert!(player.create_source(60, 0.0).is_none());
        player.load(&fetcher, 8_000).unwrap();
        assert!(player.is_ready());

        let midis: Vec<u8> = player.samples().iter().map(|s| s.midi).collect();
        assert_eq!(midis, vec![60, 66, 72]);
        assert_eq!(player.closest_sample(64).map(|s| s.midi), Some(66));
        // 63 is three away from both 60 and 66
        assert_eq!(player.closest_sample(63).map(|s| s.midi), Some(60));
        assert_eq!(player.closest_sample(100).map(|s| s.midi), Some(72));

        match player.create_source(64, 10.0) {
            Some(Source::Buffer(buffer)) => {
                assert!((buffer.rate() - 2.0_f64.powf(-190.0 / 1200.0)).abs() < 1e-9);
            }
            other => panic!("unexpected source {other:?}"),
        }

        player.dispose();
        assert!(!player.is_ready());
    }

    #[test]
    fn test_load_failure_leaves_player_empty() {
        let cfg = config(Some("/audio"), &[(60, "C4"), (72, "C5")]);
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("/audio/C4.wav", wav_bytes(64, 8_000, 1));

        let mut player = SamplePlayer::new(cfg, "");
        assert!(matches!(player.load(&fetcher, 8_000), Err(SampleError::Fetch { .. })));
        assert!(!player.is_ready());
    }
}
