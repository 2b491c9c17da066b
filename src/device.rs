//! ALSA device session: Closed -> Open -> Closed lifecycle and the driver
//! thread that invokes the real-time callback once per frame period.
//!
//! The driver thread is the only caller of the callback and invokes it
//! strictly sequentially, so adapter state needs no locking as long as the
//! main thread leaves it alone while the session is open. Build the adapter
//! before `open`, release it only after `close` has returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

use crate::adapter::FrameCallback;
use crate::fragment;

/// Session open options. `input_device: None` opens an output-only session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub output_device: String,
    pub input_device: Option<String>,
    /// Sample rate for both directions; fixed for the session lifetime.
    pub sample_rate: u32,
    /// Real-time period between callback invocations.
    pub frame_duration_ms: u32,
    pub output_channels: u32,
    pub input_channels: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_device: "default".to_string(),
            input_device: None,
            sample_rate: 48000,
            frame_duration_ms: 20,
            output_channels: 2,
            input_channels: 1,
        }
    }
}

impl SessionConfig {
    /// Samples per channel in one frame period.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate * self.frame_duration_ms / 1000) as usize
    }
}

/// One open hardware endpoint binding.
///
/// Created by [`DeviceSession::open`]; lives until [`DeviceSession::close`]
/// or an unrecoverable driver error (fatal, not retried). No pause, no
/// reconfiguration while open.
pub struct DeviceSession {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceSession {
    /// Open the endpoint(s) and start the driver thread.
    ///
    /// The callback runs on that thread, once per frame period, until close.
    /// It receives one period of input (silence when output-only) and the
    /// elapsed session time; whatever it returns is played, padded with
    /// silence when empty or short.
    pub fn open(config: SessionConfig, callback: FrameCallback) -> Result<Self> {
        let frame_samples = config.frame_samples();
        let playback = open_pcm(
            &config.output_device,
            Direction::Playback,
            config.sample_rate,
            config.output_channels,
            frame_samples,
        )?;
        let capture = config
            .input_device
            .as_deref()
            .map(|device| {
                open_pcm(
                    device,
                    Direction::Capture,
                    config.sample_rate,
                    config.input_channels,
                    frame_samples,
                )
            })
            .transpose()?;

        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let running = running.clone();
            thread::Builder::new().name("audio-io".into()).spawn(move || {
                if let Err(e) = driver_loop(&config, playback, capture, callback, &running) {
                    log::error!("Audio driver thread ended: {e:#}");
                }
            })?
        };

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the driver thread and wait for it to finish.
    ///
    /// After this returns no further callback invocation will occur.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    channels: u32,
    period_size: usize,
) -> Result<PCM> {
    let dir_name = match direction {
        Direction::Playback => "playback",
        Direction::Capture => "capture",
    };
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("Failed to open PCM device '{device}' for {dir_name}"))?;

    {
        let hwp = HwParams::any(&pcm).context("Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(channels)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        hwp.set_period_size_near(period_size as alsa::pcm::Frames, ValueOr::Nearest)?;
        pcm.hw_params(&hwp)?;
    }

    {
        let hwp = pcm.hw_params_current()?;
        let actual_rate = hwp.get_rate()?;
        if actual_rate != sample_rate {
            log::warn!(
                "ALSA {dir_name} negotiated {actual_rate} Hz instead of {sample_rate} Hz"
            );
        }
        log::info!(
            "ALSA {dir_name}: device={device}, rate={actual_rate}, channels={}, period={}",
            hwp.get_channels()?,
            hwp.get_period_size()?,
        );
    }

    Ok(pcm)
}

fn driver_loop(
    config: &SessionConfig,
    playback: PCM,
    capture: Option<PCM>,
    mut callback: FrameCallback,
    running: &AtomicBool,
) -> Result<()> {
    let frame_samples = config.frame_samples();
    let in_channels = config.input_channels as usize;
    let out_channels = config.output_channels as usize;

    let out_io = playback.io_i16()?;
    let cap_io = capture.as_ref().map(|pcm| pcm.io_i16()).transpose()?;

    let mut in_buf = vec![0i16; frame_samples * in_channels];
    let started = Instant::now();

    log::info!(
        "Session open: {} Hz, {} ms frames, {} in / {} out channels",
        config.sample_rate,
        config.frame_duration_ms,
        in_channels,
        out_channels,
    );

    while running.load(Ordering::Relaxed) {
        // 1. One period of input. Cadence comes from the blocking read, or
        //    from the blocking write below when the session is output-only.
        if let (Some(pcm), Some(io)) = (&capture, &cap_io) {
            match io.readi(&mut in_buf) {
                Ok(frames) => {
                    if frames < frame_samples {
                        in_buf[frames * in_channels..].fill(0);
                    }
                }
                Err(e) => {
                    log::warn!("ALSA capture error: {e}, recovering...");
                    pcm.prepare().context("Failed to recover PCM capture")?;
                    continue;
                }
            }
        }

        // 2. One callback invocation. The adapter guarantees this neither
        //    blocks nor fails; empty means silence.
        let input = fragment::samples_to_bytes(&in_buf);
        let output = callback(&input, started.elapsed());

        let mut out_samples = match fragment::bytes_to_samples(&output) {
            Ok(samples) => samples,
            Err(e) => {
                log::warn!("Discarding malformed callback output: {e}");
                Vec::new()
            }
        };
        let period_len = frame_samples * out_channels;
        if out_samples.len() < period_len {
            out_samples.resize(period_len, 0);
        }

        // 3. Write with retry to ride out short writes and XRUNs.
        let total_frames = out_samples.len() / out_channels;
        let mut written = 0;
        while written < total_frames {
            match out_io.writei(&out_samples[written * out_channels..]) {
                Ok(n) => written += n,
                Err(e) => {
                    log::warn!("ALSA playback error: {e}, recovering...");
                    playback.prepare().context("Failed to recover PCM playback")?;
                }
            }
        }
    }

    let _ = playback.drain();
    log::info!("Session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_samples_follow_rate_and_duration() {
        let config = SessionConfig {
            sample_rate: 48000,
            frame_duration_ms: 20,
            ..Default::default()
        };
        assert_eq!(config.frame_samples(), 960);

        let config = SessionConfig {
            sample_rate: 44100,
            frame_duration_ms: 20,
            ..Default::default()
        };
        assert_eq!(config.frame_samples(), 882);
    }

    #[test]
    fn default_session_is_output_only() {
        let config = SessionConfig::default();
        assert!(config.input_device.is_none());
        assert_eq!(config.output_device, "default");
    }
}
