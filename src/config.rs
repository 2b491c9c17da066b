//! Runtime configuration for both modes, loaded from an optional TOML file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_PATH: &str = "audioloop.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loopback: LoopbackConfig,
    pub tts: TtsConfig,
}

/// Loopback tester: mic -> codec round-trip -> speaker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    pub input_device: String,
    pub output_device: String,
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
    pub input_channels: u32,
    pub output_channels: u32,
    /// Opus bitrate in bits/s for the narrowband round-trip.
    pub codec_bitrate: i32,
    /// Jitter queue warm-up depth: that many frames of startup silence are
    /// traded for steady-state smoothness.
    pub warmup_fragments: usize,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            input_device: "default".to_string(),
            output_device: "default".to_string(),
            sample_rate: 48000,
            frame_duration_ms: 20,
            input_channels: 1,
            output_channels: 2,
            codec_bitrate: 16000,
            warmup_fragments: 50,
        }
    }
}

/// TTS player: synthesize once, then feed the device at playback rate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub output_device: String,
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
    /// Samples per pre-resample frame handed to the playback queue.
    pub frame_samples: usize,
    /// flite voice name; None uses the flite default.
    pub voice: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            output_device: "default".to_string(),
            sample_rate: 44100,
            frame_duration_ms: 20,
            frame_samples: 320,
            voice: None,
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields defaults, a malformed file
    /// is a startup error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
