//! Speech synthesis collaborator and playback fragmenting.
//!
//! Synthesis is one blocking call producing a complete PCM buffer; the
//! fragmenter then slices it into fixed frames for the playback queue.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::fragment;

/// A fully synthesized utterance: 16-bit mono PCM plus its sample rate.
pub struct SynthesizedAudio {
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn total_samples(&self) -> usize {
        self.pcm.len() / 2
    }
}

/// External text-to-speech engine: `convert` blocks until the whole
/// utterance is rendered. No streaming.
pub trait Synthesizer {
    fn convert(&self, text: &str) -> Result<SynthesizedAudio>;
}

/// Synthesizer backed by the `flite` binary writing a WAV to a temp file.
pub struct FliteSynthesizer {
    voice: Option<String>,
}

impl FliteSynthesizer {
    pub fn new(voice: Option<String>) -> Self {
        Self { voice }
    }
}

impl Synthesizer for FliteSynthesizer {
    fn convert(&self, text: &str) -> Result<SynthesizedAudio> {
        let wav = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .context("Failed to create temp WAV file")?;

        let mut cmd = Command::new("flite");
        if let Some(voice) = &self.voice {
            cmd.arg("-voice").arg(voice);
        }
        let status = cmd
            .arg("-t")
            .arg(text)
            .arg("-o")
            .arg(wav.path())
            .status()
            .context("Failed to run flite; is it installed and on PATH?")?;
        if !status.success() {
            bail!("flite exited with {}", status);
        }

        let mut reader =
            hound::WavReader::open(wav.path()).context("Failed to read flite output")?;
        let spec = reader.spec();
        if spec.channels != 1 || spec.bits_per_sample != 16 {
            bail!(
                "Expected 16-bit mono WAV from flite, got {} ch / {} bit",
                spec.channels,
                spec.bits_per_sample,
            );
        }

        let samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to decode flite WAV samples")?;

        log::info!(
            "Synthesized {} samples at {} Hz",
            samples.len(),
            spec.sample_rate,
        );

        Ok(SynthesizedAudio {
            pcm: fragment::samples_to_bytes(&samples),
            sample_rate: spec.sample_rate,
        })
    }
}

/// Slice a synthesized buffer into frames of `frame_samples` samples, in
/// order, preserving the total sample count exactly. The last frame may be
/// shorter.
pub fn fragment_buffer(pcm: &[u8], frame_samples: usize) -> Vec<Vec<u8>> {
    pcm.chunks(frame_samples * 2).map(|c| c.to_vec()).collect()
}

/// Total playback time of an utterance, from its sample count and the frame
/// geometry. The driving thread must sleep at least this long before closing
/// the session or trailing audio is truncated.
pub fn playback_duration(
    total_samples: usize,
    frame_samples: usize,
    frame_duration: Duration,
) -> Duration {
    frame_duration.mul_f64(total_samples as f64 / frame_samples as f64)
}

/// Wall-clock wait before closing the session.
///
/// The frame-geometry duration assumes one frame per frame period, but the
/// device is actually paced by the synthesized rate: flite's default voice
/// renders at 8 kHz, where a 320-sample frame is 40 ms of real audio.
/// Closing after the shorter figure would drop the tail of the utterance
/// from the queue, so wait for whichever is longer.
pub fn playback_wait(
    total_samples: usize,
    frame_samples: usize,
    frame_duration: Duration,
    sample_rate: u32,
) -> Duration {
    let nominal = playback_duration(total_samples, frame_samples, frame_duration);
    let real = Duration::from_secs_f64(total_samples as f64 / sample_rate as f64);
    nominal.max(real)
}
