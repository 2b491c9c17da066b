//! audioloop - Real-time audio loopback and TTS playback over ALSA
//!
//! The core is a per-frame pipeline of stateful transforms (resampling and a
//! narrowband Opus round-trip), a jitter queue that trades startup silence
//! for smooth steady-state playback, and a callback adapter that never lets
//! a failure escape into the driver thread.

pub mod adapter;
pub mod codec;
pub mod config;
pub mod device;
pub mod fragment;
pub mod jitter;
pub mod pipeline;
pub mod resample;
pub mod stage;
pub mod synth;

pub use adapter::{LoopbackAdapter, TtsAdapter};
pub use config::Config;
pub use device::{DeviceSession, SessionConfig};
pub use jitter::JitterQueue;
pub use pipeline::Pipeline;
pub use stage::{Stage, StageError};
