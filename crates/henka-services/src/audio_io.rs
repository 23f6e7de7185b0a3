//! cpal output stream driving the audio graph

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("No audio output devices found")]
    NoDevices,
    #[error("Failed to get default output config: {0}")]
    ConfigError(String),
    #[error("Failed to build output stream: {0}")]
    StreamError(String),
}

/// Name, sample rate and channel count of the default output device
pub fn default_output_info() -> Result<(String, u32, u16), AudioOutputError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioOutputError::NoDevices)?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioOutputError::ConfigError(e.to_string()))?;

    let name = device.name().unwrap_or_default();
    Ok((name, config.sample_rate().0, config.channels()))
}

/// Real-time output stream that pulls frames from a callback.
///
/// Opens paused; the callback only runs between [`play`](Self::play) and
/// [`pause`](Self::pause).
pub struct RealtimeOutputStream {
    running: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    stream: cpal::Stream,
}

impl RealtimeOutputStream {
    /// Build a stream on the default output device with its default config
    pub fn open<F>(sample_callback: F) -> Result<Self, AudioOutputError>
    where
        F: FnMut(&mut [f32], u32, u16) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioOutputError::NoDevices)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioOutputError::ConfigError(e.to_string()))?;

        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();

        let running = Arc::new(AtomicBool::new(false));
        let running_clone = running.clone();

        let config: StreamConfig = supported_config.into();
        let callback = Arc::new(Mutex::new(sample_callback));

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running_clone.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    let Ok(mut cb) = callback.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    cb(data, sample_rate, channels);
                },
                move |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;

        // Some hosts start streams on build
        if let Err(e) = stream.pause() {
            debug!("Stream pause on open not supported: {}", e);
        }

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "Opened realtime output stream"
        );

        Ok(Self {
            running,
            sample_rate,
            channels,
            stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn play(&self) -> Result<(), AudioOutputError> {
        self.stream
            .play()
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn pause(&self) -> Result<(), AudioOutputError> {
        self.running.store(false, Ordering::SeqCst);
        self.stream
            .pause()
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for RealtimeOutputStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
