//! henka-services: Audio output, scheduling graph and chord playback engine

pub mod audio_engine;
pub mod audio_io;
pub mod context;
pub mod graph;
pub mod playback;
pub mod sample_player;

pub use audio_engine::{AudioEngine, AudioEngineError, EngineState, PLAYBACK_TAIL, START_OFFSET};
pub use audio_io::{default_output_info, AudioOutputError, RealtimeOutputStream};
pub use context::{
    AudioContext, AudioDevice, ContextError, ContextFactory, ContextState, OfflineContextFactory, OfflineDevice,
    RealtimeContextFactory,
};
pub use graph::{AudioGraph, BufferSource, GainParam, GraphError, Source, Voice, VoiceId, DEFAULT_MASTER_GAIN, DEFAULT_VOICE_LIMIT};
pub use playback::Playback;
pub use sample_player::{
    build_sample_path, decode_sample, detect_supported_extension, DirFetcher, HttpFetcher, MemoryFetcher,
    SampleError, SampleFetcher, SamplePlayer,
};
