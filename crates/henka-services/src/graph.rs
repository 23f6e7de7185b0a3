//! Declarative audio graph: voices with automated gain, summed into a master gain
//!
//! Everything is scheduled in context seconds ahead of time. The output device
//! pulls frames through [`AudioGraph::render`], which advances the clock.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use fundsp::hacker::{saw_hz, sine_hz, square_hz, triangle_hz, AudioUnit};
use henka_core::Waveform;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Voice {0} no longer exists")]
    UnknownVoice(VoiceId),
    #[error("Voice {0} was already started")]
    AlreadyStarted(VoiceId),
    #[error("Voice {0} was stopped before it started")]
    NotStarted(VoiceId),
    #[error("Invalid schedule time: {0}")]
    InvalidTime(f64),
    #[error("Voice limit of {0} reached")]
    VoiceLimit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Gain automation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue { time: f64, value: f32 },
    LinearRamp { end_time: f64, value: f32 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Self::SetValue { time, .. } => time,
            Self::LinearRamp { end_time, .. } => end_time,
        }
    }
}

/// Gain with a timeline of set/ramp events
#[derive(Debug, Clone, PartialEq)]
pub struct GainParam {
    default: f32,
    events: Vec<Automation>,
}

impl GainParam {
    pub fn new(value: f32) -> Self {
        Self {
            default: value,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: Automation) -> Result<(), GraphError> {
        let time = event.time();
        if !time.is_finite() || time < 0.0 {
            return Err(GraphError::InvalidTime(time));
        }
        // Events at equal times keep insertion order
        let idx = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(idx, event);
        Ok(())
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) -> Result<(), GraphError> {
        self.insert(Automation::SetValue { time, value })
    }

    /// Ramp linearly from the previous event's value to `value` at `end_time`
    pub fn linear_ramp_to(&mut self, value: f32, end_time: f64) -> Result<(), GraphError> {
        self.insert(Automation::LinearRamp { end_time, value })
    }

    /// Drop every event at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Cancel from `time` on and pin the value the curve had at that moment
    pub fn cancel_and_hold(&mut self, time: f64) -> f32 {
        let held = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.events.push(Automation::SetValue { time, value: held });
        held
    }

    pub fn value_at(&self, time: f64) -> f32 {
        let mut value = self.default;
        let mut anchor_time = 0.0;

        for event in &self.events {
            match *event {
                Automation::SetValue { time: t, value: v } => {
                    if t > time {
                        break;
                    }
                    value = v;
                    anchor_time = t;
                }
                Automation::LinearRamp { end_time, value: target } => {
                    if end_time <= time {
                        value = target;
                        anchor_time = end_time;
                        continue;
                    }
                    let span = end_time - anchor_time;
                    if span <= 0.0 {
                        return target;
                    }
                    let progress = ((time - anchor_time) / span).clamp(0.0, 1.0) as f32;
                    return value + (target - value) * progress;
                }
            }
        }

        value
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Decoded mono audio at the graph's sample rate
#[derive(Clone)]
pub struct BufferSource {
    data: Arc<Vec<f32>>,
    position: f64,
    /// Read increment per output frame (1.0 = original pitch)
    rate: f64,
}

impl BufferSource {
    pub fn new(data: Arc<Vec<f32>>, detune_cents: f64) -> Self {
        Self {
            data,
            position: 0.0,
            rate: 2.0_f64.powf(detune_cents / 1200.0),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn is_finished(&self) -> bool {
        self.position as usize >= self.data.len().saturating_sub(1)
    }

    fn tick(&mut self) -> f32 {
        let idx = self.position as usize;
        if idx + 1 >= self.data.len() {
            return 0.0;
        }

        // Linear interpolation
        let frac = (self.position - idx as f64) as f32;
        let s0 = self.data[idx];
        let s1 = self.data[idx + 1];
        self.position += self.rate;
        s0 + frac * (s1 - s0)
    }
}

pub enum Source {
    Oscillator(Box<dyn AudioUnit>),
    Buffer(BufferSource),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oscillator(_) => f.write_str("Source::Oscillator"),
            Self::Buffer(b) => f
                .debug_struct("Source::Buffer")
                .field("frames", &b.data.len())
                .field("rate", &b.rate)
                .finish(),
        }
    }
}

impl Source {
    /// Oscillator at `frequency` Hz, shifted by `detune_cents`
    pub fn oscillator(waveform: Waveform, frequency: f64, detune_cents: f64, sample_rate: u32) -> Self {
        let hz = (frequency * 2.0_f64.powf(detune_cents / 1200.0)) as f32;
        let mut unit: Box<dyn AudioUnit> = match waveform {
            Waveform::Sine => Box::new(sine_hz(hz)),
            Waveform::Triangle => Box::new(triangle_hz(hz)),
            Waveform::Sawtooth => Box::new(saw_hz(hz)),
            Waveform::Square => Box::new(square_hz(hz)),
        };
        unit.set_sample_rate(sample_rate as f64);
        unit.reset();
        Self::Oscillator(unit)
    }

    /// One frame of silence, used to wake up a locked output
    pub fn silence() -> Self {
        Self::Buffer(BufferSource::new(Arc::new(vec![0.0; 2]), 0.0))
    }

    fn tick(&mut self) -> f32 {
        match self {
            Self::Oscillator(unit) => unit.get_mono(),
            Self::Buffer(buffer) => buffer.tick(),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            Self::Oscillator(_) => false,
            Self::Buffer(buffer) => buffer.is_finished(),
        }
    }
}

// ============================================================================
// Voices and graph
// ============================================================================

/// One source routed through its own gain into the master gain
#[derive(Debug)]
pub struct Voice {
    source: Source,
    pub gain: GainParam,
    start: Option<f64>,
    stop: Option<f64>,
}

impl Voice {
    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop
    }

    fn is_done(&self, time: f64) -> bool {
        self.stop.is_some_and(|s| time >= s) || (self.start.is_some_and(|s| time >= s) && self.source.is_finished())
    }
}

pub const DEFAULT_MASTER_GAIN: f32 = 0.3;

/// Polyphony cap for a graph unless overridden with [`AudioGraph::with_voice_limit`]
pub const DEFAULT_VOICE_LIMIT: usize = 256;

#[derive(Debug)]
pub struct AudioGraph {
    sample_rate: u32,
    frames_rendered: u64,
    pub master_gain: GainParam,
    voices: BTreeMap<VoiceId, Voice>,
    voice_limit: usize,
    next_id: u64,
}

impl AudioGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frames_rendered: 0,
            master_gain: GainParam::new(DEFAULT_MASTER_GAIN),
            voices: BTreeMap::new(),
            voice_limit: DEFAULT_VOICE_LIMIT,
            next_id: 0,
        }
    }

    pub fn with_voice_limit(mut self, limit: usize) -> Self {
        self.voice_limit = limit;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Context clock in seconds
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn add_voice(&mut self, source: Source, gain: GainParam) -> Result<VoiceId, GraphError> {
        if self.voices.len() >= self.voice_limit {
            return Err(GraphError::VoiceLimit(self.voice_limit));
        }
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.voices.insert(
            id,
            Voice {
                source,
                gain,
                start: None,
                stop: None,
            },
        );
        Ok(id)
    }

    pub fn voice_mut(&mut self, id: VoiceId) -> Result<&mut Voice, GraphError> {
        self.voices.get_mut(&id).ok_or(GraphError::UnknownVoice(id))
    }

    pub fn start(&mut self, id: VoiceId, time: f64) -> Result<(), GraphError> {
        if !time.is_finite() {
            return Err(GraphError::InvalidTime(time));
        }
        let voice = self.voice_mut(id)?;
        if voice.start.is_some() {
            return Err(GraphError::AlreadyStarted(id));
        }
        voice.start = Some(time.max(0.0));
        Ok(())
    }

    /// Schedule (or reschedule) the hard stop of a started voice
    pub fn stop(&mut self, id: VoiceId, time: f64) -> Result<(), GraphError> {
        if !time.is_finite() {
            return Err(GraphError::InvalidTime(time));
        }
        let voice = self.voice_mut(id)?;
        if voice.start.is_none() {
            return Err(GraphError::NotStarted(id));
        }
        voice.stop = Some(time);
        Ok(())
    }

    pub fn is_alive(&self, id: VoiceId) -> bool {
        self.voices.contains_key(&id)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(&id)
    }

    /// Remove every voice without rendering it
    pub fn clear(&mut self) {
        self.voices.clear();
    }

    /// Render interleaved frames into `buffer`, duplicating mono to all channels
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = channels.max(1);

        for frame in buffer.chunks_mut(channels) {
            let sample = self.next_sample();
            frame.fill(sample);
        }

        let now = self.current_time();
        self.voices.retain(|_, voice| !voice.is_done(now));
    }

    pub fn render_mono(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.render(&mut out, 1);
        out
    }

    fn next_sample(&mut self) -> f32 {
        let time = self.current_time();
        let mut mix = 0.0;

        for voice in self.voices.values_mut() {
            let Some(start) = voice.start else { continue };
            if time < start || voice.is_done(time) {
                continue;
            }
            mix += voice.source.tick() * voice.gain.value_at(time);
        }

        self.frames_rendered += 1;
        mix * self.master_gain.value_at(time)
    }
}
