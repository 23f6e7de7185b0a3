//! Audio contexts: a shared graph plus the device that pulls it

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info};

use crate::audio_io::{default_output_info, AudioOutputError, RealtimeOutputStream};
use crate::graph::AudioGraph;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Audio output error: {0}")]
    Output(#[from] AudioOutputError),
    #[error("Audio context is closed")]
    Closed,
    #[error("Resume rejected: {0}")]
    ResumeRejected(String),
    #[error("Audio graph lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Output side of a context.
///
/// `resume` may return `Ok` while the device stays silent (the mobile-browser
/// autoplay case); callers check `is_running` afterwards.
pub trait AudioDevice {
    fn resume(&mut self) -> Result<(), ContextError>;
    fn suspend(&mut self) -> Result<(), ContextError>;
    fn close(&mut self);
    fn is_running(&self) -> bool;

    /// Called once after a silent buffer has been queued
    fn unlock(&mut self) {}
}

/// Device backed by the default cpal output
pub struct CpalDevice {
    stream: Option<RealtimeOutputStream>,
}

impl AudioDevice for CpalDevice {
    fn resume(&mut self) -> Result<(), ContextError> {
        let stream = self.stream.as_ref().ok_or(ContextError::Closed)?;
        stream.play()?;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), ContextError> {
        let stream = self.stream.as_ref().ok_or(ContextError::Closed)?;
        stream.pause()?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
    }

    fn is_running(&self) -> bool {
        self.stream.as_ref().is_some_and(RealtimeOutputStream::is_running)
    }
}

/// Device with no hardware behind it; the graph is rendered on demand
#[derive(Debug, Default)]
pub struct OfflineDevice {
    running: bool,
    closed: bool,
}

impl AudioDevice for OfflineDevice {
    fn resume(&mut self) -> Result<(), ContextError> {
        if self.closed {
            return Err(ContextError::Closed);
        }
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), ContextError> {
        self.running = false;
        Ok(())
    }

    fn close(&mut self) {
        self.running = false;
        self.closed = true;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

pub struct AudioContext {
    id: u64,
    sample_rate: u32,
    graph: Arc<Mutex<AudioGraph>>,
    device: Box<dyn AudioDevice>,
    state: ContextState,
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioContext")
            .field("id", &self.id)
            .field("sample_rate", &self.sample_rate)
            .field("state", &self.state)
            .finish()
    }
}

impl AudioContext {
    pub fn new(graph: Arc<Mutex<AudioGraph>>, device: Box<dyn AudioDevice>) -> Self {
        let sample_rate = graph.lock().map(|g| g.sample_rate()).unwrap_or(44_100);
        let state = if device.is_running() {
            ContextState::Running
        } else {
            ContextState::Suspended
        };

        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            sample_rate,
            graph,
            device,
            state,
        }
    }

    /// Offline context that starts suspended
    pub fn offline(sample_rate: u32) -> Self {
        let graph = Arc::new(Mutex::new(AudioGraph::new(sample_rate)));
        Self::new(graph, Box::new(OfflineDevice::default()))
    }

    /// Context on the default output device
    pub fn realtime() -> Result<Self, ContextError> {
        let (_, sample_rate, _) = default_output_info()?;
        let graph = Arc::new(Mutex::new(AudioGraph::new(sample_rate)));

        let render_graph = graph.clone();
        let stream = RealtimeOutputStream::open(move |buffer, _sample_rate, channels| {
            match render_graph.lock() {
                Ok(mut g) => g.render(buffer, channels as usize),
                Err(_) => buffer.fill(0.0),
            }
        })?;

        if stream.sample_rate() != sample_rate {
            debug!(expected = sample_rate, actual = stream.sample_rate(), "Output rate changed while opening");
        }

        Ok(Self::new(graph, Box::new(CpalDevice { stream: Some(stream) })))
    }

    /// Unique per context; lets callers tell a recreated context apart
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn current_time(&self) -> f64 {
        self.with_graph(|g| g.current_time()).unwrap_or(0.0)
    }

    pub fn graph(&self) -> Arc<Mutex<AudioGraph>> {
        self.graph.clone()
    }

    /// Access the graph (locks the mutex shared with the output callback)
    pub fn with_graph<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut AudioGraph) -> R,
    {
        self.graph.lock().ok().map(|mut g| f(&mut g))
    }

    pub fn resume(&mut self) -> Result<ContextState, ContextError> {
        if self.state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        self.device.resume()?;
        self.state = if self.device.is_running() {
            ContextState::Running
        } else {
            ContextState::Suspended
        };
        Ok(self.state)
    }

    pub fn suspend(&mut self) -> Result<(), ContextError> {
        if self.state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        self.device.suspend()?;
        self.state = ContextState::Suspended;
        Ok(())
    }

    pub fn unlock(&mut self) {
        self.device.unlock();
    }

    /// Stop the device and drop every scheduled voice
    pub fn close(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        self.device.close();
        self.with_graph(AudioGraph::clear);
        self.state = ContextState::Closed;
        info!(context = self.id, "Audio context closed");
    }

    /// Pull `frames` mono frames through the graph, advancing its clock
    pub fn render(&self, frames: usize) -> Result<Vec<f32>, ContextError> {
        if self.state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        self.with_graph(|g| g.render_mono(frames)).ok_or(ContextError::Poisoned)
    }
}

/// Creates contexts on first use
pub trait ContextFactory {
    fn create(&mut self) -> Result<AudioContext, ContextError>;
}

/// Contexts on the default cpal output device
#[derive(Debug, Default)]
pub struct RealtimeContextFactory;

impl ContextFactory for RealtimeContextFactory {
    fn create(&mut self) -> Result<AudioContext, ContextError> {
        AudioContext::realtime()
    }
}

/// Offline contexts at a fixed rate
#[derive(Debug, Clone, Copy)]
pub struct OfflineContextFactory {
    pub sample_rate: u32,
}

impl Default for OfflineContextFactory {
    fn default() -> Self {
        Self { sample_rate: 44_100 }
    }
}

impl ContextFactory for OfflineContextFactory {
    fn create(&mut self) -> Result<AudioContext, ContextError> {
        Ok(AudioContext::offline(self.sample_rate))
    }
}
