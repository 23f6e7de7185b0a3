//! Audio engine for chord and progression playback

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use henka_core::{midi_to_frequency, Chord, ChordProgression, InstrumentConfig, InstrumentId, VoiceConfig};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::{AudioContext, ContextError, ContextFactory, ContextState, RealtimeContextFactory};
use crate::graph::{AudioGraph, GainParam, GraphError, Source, VoiceId};
use crate::playback::{Playback, PlaybackGuard};
use crate::sample_player::{HttpFetcher, SampleError, SampleFetcher, SamplePlayer};

#[derive(Debug, Error)]
pub enum AudioEngineError {
    #[error("Audio context error: {0}")]
    Context(#[from] ContextError),
    #[error("Audio graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Sample error: {0}")]
    Sample(#[from] SampleError),
    #[error("Engine has been disposed")]
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Playing,
    Disposed,
}

/// Delay between a play call and the first note
pub const START_OFFSET: f64 = 0.05;
/// Extra wait after the last release before a playback handle settles
pub const PLAYBACK_TAIL: f64 = 0.1;

const MIN_GAIN: f32 = 0.0001;
const BASE_VOICE_PEAK: f32 = 0.25;
const BASS_GAIN_MULTIPLIER: f32 = 1.15;
const LOWEST_BASS_MIDI: u8 = 24;
const MIN_HOLD: f64 = 0.1;
const IMMEDIATE_FADE: f64 = 0.02;
const GRACEFUL_FADE: f64 = 0.12;
const STOP_GRACE: f64 = 0.01;
/// Longest a handle stays pending, whatever the requested duration
const MAX_PLAYBACK_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

struct LoadedSamples {
    player: SamplePlayer,
    instrument: InstrumentId,
    context_id: u64,
}

/// Plays chords through a lazily created audio context
pub struct AudioEngine {
    factory: Box<dyn ContextFactory>,
    fetcher: Arc<dyn SampleFetcher>,
    path_prefix: String,
    context: Option<AudioContext>,
    instrument: InstrumentConfig,
    samples: Option<LoadedSamples>,
    active_voices: HashSet<VoiceId>,
    pending: Option<PlaybackGuard>,
    unlock_attempted: bool,
    disposed: bool,
}

impl AudioEngine {
    pub fn new(factory: impl ContextFactory + 'static, fetcher: impl SampleFetcher + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            fetcher: Arc::new(fetcher),
            path_prefix: String::new(),
            context: None,
            instrument: InstrumentConfig::default(),
            samples: None,
            active_voices: HashSet::new(),
            pending: None,
            unlock_attempted: false,
            disposed: false,
        }
    }

    /// Engine on the default output device, fetching samples from `base_url`
    pub fn realtime(base_url: impl Into<String>) -> Self {
        Self::new(RealtimeContextFactory, HttpFetcher::new(base_url))
    }

    /// Deployment-wide prefix put in front of every sample path
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    pub fn with_instrument(mut self, id: InstrumentId) -> Self {
        self.instrument = id.config();
        self
    }

    pub fn state(&self) -> EngineState {
        if self.disposed {
            EngineState::Disposed
        } else if self.context.is_none() {
            EngineState::Uninitialized
        } else if self.pending.as_ref().is_some_and(|g| !g.is_finished()) {
            EngineState::Playing
        } else {
            EngineState::Ready
        }
    }

    pub fn instrument(&self) -> &InstrumentConfig {
        &self.instrument
    }

    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    /// Voices still scheduled or sounding, sorted by id
    pub fn active_voices(&mut self) -> Vec<VoiceId> {
        self.prune_voices();
        let mut voices: Vec<VoiceId> = self.active_voices.iter().copied().collect();
        voices.sort_unstable();
        voices
    }

    pub fn active_voice_count(&mut self) -> usize {
        self.prune_voices();
        self.active_voices.len()
    }

    fn prune_voices(&mut self) {
        let Some(context) = &self.context else {
            self.active_voices.clear();
            return;
        };
        let active = &mut self.active_voices;
        context.with_graph(|g| active.retain(|id| g.is_alive(*id)));
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    /// Play one chord for `duration_secs`. Audio failures degrade to silence.
    pub fn play_chord(&mut self, chord: &Chord, duration_secs: f64) -> Playback {
        self.play(std::slice::from_ref(chord), duration_secs)
    }

    /// Play every chord back to back, two beats each
    pub fn play_progression(&mut self, progression: &ChordProgression) -> Playback {
        self.play(&progression.chords, progression.chord_duration_secs())
    }

    fn play(&mut self, chords: &[Chord], chord_duration: f64) -> Playback {
        if self.disposed {
            debug!("Ignoring playback on a disposed engine");
            return Playback::settled();
        }

        self.stop(true);

        match self.schedule(chords, chord_duration) {
            Ok(total) => {
                let (playback, guard) = Playback::pending(playback_window(total));
                self.pending = Some(guard);
                playback
            }
            Err(e) => {
                warn!("Audio playback unavailable: {}", e);
                Playback::settled()
            }
        }
    }

    /// Schedule `chords` and return the seconds until the handle should settle
    fn schedule(&mut self, chords: &[Chord], chord_duration: f64) -> Result<f64, AudioEngineError> {
        if !chord_duration.is_finite() {
            return Err(GraphError::InvalidTime(chord_duration).into());
        }

        self.ensure_context()?;
        self.resume_context()?;
        self.ensure_samples();

        let context = self.context.as_ref().ok_or(AudioEngineError::Disposed)?;
        let player = self.samples.as_ref().map(|s| &s.player);
        let instrument = &self.instrument;

        let voices = context
            .with_graph(|graph| {
                let start = graph.current_time() + START_OFFSET;
                let mut voices = Vec::new();
                for (i, chord) in chords.iter().enumerate() {
                    let chord_start = start + i as f64 * chord_duration;
                    voices.extend(schedule_chord(graph, player, instrument, chord, chord_start, chord_duration));
                }
                voices
            })
            .ok_or(ContextError::Poisoned)?;

        debug!(
            chords = chords.len(),
            voices = voices.len(),
            instrument = %instrument.id,
            "Scheduled playback"
        );
        self.active_voices.extend(voices);

        let hold = chord_duration.max(instrument.envelope.attack + MIN_HOLD);
        let scheduled = chord_duration * chords.len().saturating_sub(1) as f64 + hold;
        Ok(START_OFFSET + scheduled + instrument.envelope.release + PLAYBACK_TAIL)
    }

    /// Fade out every active voice and settle the pending handle
    pub fn stop(&mut self, immediate: bool) {
        self.pending = None;

        if self.active_voices.is_empty() {
            return;
        }
        let voices: Vec<VoiceId> = self.active_voices.drain().collect();
        let Some(context) = &self.context else { return };

        let fade = if immediate { IMMEDIATE_FADE } else { GRACEFUL_FADE };
        context.with_graph(|graph| {
            let now = graph.current_time();
            for id in &voices {
                if let Err(e) = fade_voice(graph, *id, now, fade) {
                    debug!(voice = %id, "Voice already gone: {}", e);
                }
            }
        });

        debug!(voices = voices.len(), immediate, "Stopped playback");
    }

    /// Swap instruments. The context survives, loaded samples do not.
    pub fn set_instrument(&mut self, id: InstrumentId) {
        self.set_instrument_config(id.config());
    }

    pub fn set_instrument_config(&mut self, config: InstrumentConfig) {
        self.stop(true);
        if let Some(mut loaded) = self.samples.take() {
            loaded.player.dispose();
        }
        info!(instrument = %config.id, "Instrument changed");
        self.instrument = config;
    }

    /// Tear everything down. Further play calls are silent no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        self.stop(true);
        if let Some(mut loaded) = self.samples.take() {
            loaded.player.dispose();
        }
        if let Some(mut context) = self.context.take() {
            context.close();
        }
        self.unlock_attempted = false;
        self.disposed = true;
        info!("Audio engine disposed");
    }

    // ------------------------------------------------------------------------
    // Context and samples
    // ------------------------------------------------------------------------

    fn ensure_context(&mut self) -> Result<(), AudioEngineError> {
        if self.disposed {
            return Err(AudioEngineError::Disposed);
        }
        if self.context.is_none() {
            let context = self.factory.create()?;
            info!(
                context = context.id(),
                sample_rate = context.sample_rate(),
                "Audio context created"
            );
            self.context = Some(context);
        }
        Ok(())
    }

    fn resume_context(&mut self) -> Result<(), AudioEngineError> {
        let context = self.context.as_mut().ok_or(AudioEngineError::Disposed)?;
        if context.state() == ContextState::Running {
            return Ok(());
        }

        let mut state = context.resume()?;

        if state != ContextState::Running && !self.unlock_attempted {
            self.unlock_attempted = true;

            let queued = context.with_graph(|graph| {
                let id = graph.add_voice(Source::silence(), GainParam::new(1.0))?;
                let now = graph.current_time();
                graph.start(id, now)
            });
            if let Some(Err(e)) = queued {
                debug!("Failed to queue unlock buffer: {}", e);
            }

            context.unlock();
            state = context.resume()?;
            info!(context = context.id(), running = state == ContextState::Running, "Attempted audio unlock");
        }

        if state != ContextState::Running {
            warn!(context = context.id(), "Audio context is not running; playback may be silent");
        }
        Ok(())
    }

    /// Load the sample set for the current (instrument, context) pair once
    fn ensure_samples(&mut self) {
        let Some(sample_config) = self.instrument.sample.as_ref().filter(|_| self.instrument.is_sampled()) else {
            return;
        };
        let Some(context) = &self.context else { return };

        let instrument = self.instrument.id;
        let context_id = context.id();
        if self
            .samples
            .as_ref()
            .is_some_and(|s| s.instrument == instrument && s.context_id == context_id && s.player.is_ready())
        {
            return;
        }

        if let Some(mut stale) = self.samples.take() {
            stale.player.dispose();
        }

        let mut player = SamplePlayer::new(sample_config.clone(), self.path_prefix.clone());
        match player.load(self.fetcher.as_ref(), context.sample_rate()) {
            Ok(()) => {
                self.samples = Some(LoadedSamples {
                    player,
                    instrument,
                    context_id,
                });
            }
            Err(e) => {
                warn!(instrument = %instrument, "Sample load failed, using oscillators: {}", e);
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Scheduling helpers
// ============================================================================

/// Schedule every note of `chord` plus the bass guard at the same start time
fn schedule_chord(
    graph: &mut AudioGraph,
    player: Option<&SamplePlayer>,
    instrument: &InstrumentConfig,
    chord: &Chord,
    start: f64,
    duration: f64,
) -> Vec<VoiceId> {
    let mut voices = Vec::with_capacity(chord.notes.len() + 1);

    for &midi in &chord.notes {
        match schedule_note(graph, player, instrument, &instrument.voice, midi, start, duration, 1.0) {
            Ok(id) => voices.push(id),
            Err(e) => debug!(midi, "Skipping voice: {}", e),
        }
    }

    let bass = chord.root_midi.saturating_sub(12).max(LOWEST_BASS_MIDI);
    if !chord.notes.contains(&bass) {
        match schedule_note(
            graph,
            player,
            instrument,
            &instrument.bass,
            bass,
            start,
            duration,
            BASS_GAIN_MULTIPLIER,
        ) {
            Ok(id) => voices.push(id),
            Err(e) => debug!(midi = bass, "Skipping bass voice: {}", e),
        }
    }

    voices
}

#[allow(clippy::too_many_arguments)]
fn schedule_note(
    graph: &mut AudioGraph,
    player: Option<&SamplePlayer>,
    instrument: &InstrumentConfig,
    voice: &VoiceConfig,
    midi: u8,
    start: f64,
    duration: f64,
    gain_multiplier: f32,
) -> Result<VoiceId, GraphError> {
    let envelope = &instrument.envelope;
    let peak = (BASE_VOICE_PEAK * voice.gain * gain_multiplier).max(MIN_GAIN);
    let hold_end = start + duration.max(envelope.attack + MIN_HOLD);
    let release_end = hold_end + envelope.release;

    // Build the whole curve before touching the graph so a bad time adds nothing
    let mut gain = GainParam::new(MIN_GAIN);
    gain.set_value_at(MIN_GAIN, start)?;
    gain.linear_ramp_to(peak, start + envelope.attack)?;
    gain.set_value_at(peak, hold_end)?;
    gain.linear_ramp_to(MIN_GAIN, release_end)?;

    let detune = voice.detune as f64;
    let source = player
        .and_then(|p| p.create_source(midi, detune))
        .unwrap_or_else(|| Source::oscillator(voice.waveform, midi_to_frequency(midi as f64), detune, graph.sample_rate()));

    let id = graph.add_voice(source, gain)?;
    graph.start(id, start)?;
    graph.stop(id, release_end + STOP_GRACE)?;
    Ok(id)
}

/// Wall-clock window for a handle, capped so the deadline stays representable
fn playback_window(total_secs: f64) -> Duration {
    Duration::try_from_secs_f64(total_secs.max(0.0))
        .unwrap_or(MAX_PLAYBACK_WINDOW)
        .min(MAX_PLAYBACK_WINDOW)
}

fn fade_voice(graph: &mut AudioGraph, id: VoiceId, now: f64, fade: f64) -> Result<(), GraphError> {
    let voice = graph.voice_mut(id)?;
    voice.gain.cancel_and_hold(now);
    voice.gain.linear_ramp_to(MIN_GAIN, now + fade)?;
    graph.stop(id, now + fade + STOP_GRACE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OfflineContextFactory;
    use crate::sample_player::MemoryFetcher;
    use henka_core::{build_chord, Waveform};
    use std::time::Instant;

    fn offline_engine() -> AudioEngine {
        AudioEngine::new(OfflineContextFactory { sample_rate: 8_000 }, MemoryFetcher::new())
            .with_instrument(InstrumentId::PureSine)
    }

    #[test]
    fn test_context_is_lazy() {
        let mut engine = offline_engine();
        assert_eq!(engine.state(), EngineState::Uninitialized);
        engine.stop(false);
        assert!(engine.context().is_none());

        let chord = build_chord("C", "major", 4, 0).unwrap();
        let _playback = engine.play_chord(&chord, 1.0);
        assert_eq!(engine.state(), EngineState::Playing);
        assert_eq!(engine.context().map(AudioContext::state), Some(ContextState::Running));
    }

    #[test]
    fn test_bass_guard() {
        let mut engine = offline_engine();

        // C major at octave 4: C3 (48) is not in the chord
        let chord = build_chord("C", "major", 4, 0).unwrap();
        let _playback = engine.play_chord(&chord, 1.0);
        assert_eq!(engine.active_voice_count(), 4);

        // A chord already holding root - 12 gets no extra voice
        let mut doubled = chord.clone();
        doubled.notes.insert(0, 48);
        let _playback = engine.play_chord(&doubled, 1.0);
        assert_eq!(engine.active_voice_count(), 4);

        // Low roots clamp at MIDI 24
        let low = build_chord("C", "major", 1, 0).unwrap();
        assert_eq!(low.root_midi, 24);
        let _playback = engine.play_chord(&low, 1.0);
        assert_eq!(engine.active_voice_count(), 3);
    }

    #[test]
    fn test_envelope_shape() {
        let mut engine = offline_engine();
        let chord = build_chord("A", "minor", 4, 0).unwrap();
        let _playback = engine.play_chord(&chord, 1.0);

        let envelope = engine.instrument().envelope;
        let voice_gain = engine.instrument().voice.gain;
        let ids = engine.active_voices();
        let context = engine.context().unwrap();

        context
            .with_graph(|g| {
                let voice = g.voice(ids[0]).unwrap();
                let start = voice.start_time().unwrap();
                assert!((start - START_OFFSET).abs() < 1e-9);

                let peak = BASE_VOICE_PEAK * voice_gain;
                assert!(voice.gain.value_at(start) <= MIN_GAIN + 1e-6);
                assert!((voice.gain.value_at(start + envelope.attack) - peak).abs() < 1e-4);
                assert!((voice.gain.value_at(start + 1.0) - peak).abs() < 1e-4);
                assert!(voice.gain.value_at(start + 1.0 + envelope.release) <= MIN_GAIN + 1e-6);

                let stop = voice.stop_time().unwrap();
                assert!(stop > start + 1.0 + envelope.release);
                assert!(matches!(voice.source(), Source::Oscillator(_)));
            })
            .unwrap();
        assert_eq!(engine.instrument().voice.waveform, Waveform::Sine);
    }

    #[test]
    fn test_progression_spacing() {
        let mut engine = offline_engine();
        let progression = henka_core::generate_progression_from_roman(
            &["I", "IV", "V"],
            henka_core::PitchClass::C,
            None,
            Default::default(),
        )
        .unwrap();
        let _playback = engine.play_progression(&progression);

        let ids = engine.active_voices();
        let mut starts: Vec<f64> = engine
            .context()
            .unwrap()
            .with_graph(|g| ids.iter().filter_map(|id| g.voice(*id)?.start_time()).collect())
            .unwrap();
        starts.sort_by(f64::total_cmp);
        starts.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

        assert_eq!(starts.len(), 3);
        assert!((starts[1] - starts[0] - 1.0).abs() < 1e-9);
        assert!((starts[2] - starts[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_fades_and_prunes() {
        let mut engine = offline_engine();
        let chord = build_chord("C", "major", 4, 0).unwrap();
        let playback = engine.play_chord(&chord, 2.0);
        assert!(!playback.is_settled());

        engine.context().unwrap().render(800).unwrap();
        engine.stop(false);
        assert!(playback.is_settled());
        assert_eq!(engine.state(), EngineState::Ready);

        let context = engine.context().unwrap();
        assert!(context.with_graph(|g| g.voice_count()).unwrap() > 0);
        context.render(2_000).unwrap();
        assert_eq!(context.with_graph(|g| g.voice_count()), Some(0));
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_set_instrument_keeps_context() {
        let mut engine = offline_engine();
        let chord = build_chord("C", "major", 4, 0).unwrap();
        let playback = engine.play_chord(&chord, 1.0);
        let context_id = engine.context().map(AudioContext::id);

        engine.set_instrument(InstrumentId::BrightSaw);
        assert!(playback.is_settled());
        assert_eq!(engine.context().map(AudioContext::id), context_id);
        assert_eq!(engine.instrument().id, InstrumentId::BrightSaw);
    }

    #[test]
    fn test_huge_duration_caps_handle() {
        let mut engine = offline_engine();
        let chord = build_chord("A", "minor", 3, 0).unwrap();

        let before = Instant::now();
        let playback = engine.play_chord(&chord, 1e300);
        assert!(!playback.is_settled());
        assert_eq!(engine.active_voice_count(), chord.notes.len() + 1);
        assert!(playback.deadline() <= before + MAX_PLAYBACK_WINDOW + Duration::from_secs(1));

        engine.stop(true);
        assert!(playback.is_settled());
        assert_eq!(playback_window(f64::MAX), MAX_PLAYBACK_WINDOW);
        assert_eq!(playback_window(-3.0), Duration::ZERO);
    }
}
