//! Synthesize one utterance and play it: `speak <text ...>`.
//!
//! The whole utterance is rendered up front, sliced into fixed frames, and
//! drained by the device callback through one persistent upsampler. The main
//! thread sleeps for the computed playback duration before closing so the
//! tail is not truncated.

use std::time::Duration;

use anyhow::Result;
use tokio::signal;

use audioloop::synth::{self, FliteSynthesizer, Synthesizer};
use audioloop::{Config, DeviceSession, SessionConfig, TtsAdapter};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        println!(
            "supply the text to be spoken on the command line, e.g.\n  speak Hello, how are you doing?"
        );
        std::process::exit(1);
    }
    let text = args.join(" ");

    let config = Config::load_or_default(audioloop::config::DEFAULT_PATH)?;
    let tts = config.tts;

    let audio = FliteSynthesizer::new(tts.voice.clone()).convert(&text)?;
    let total_samples = audio.total_samples();
    let frames = synth::fragment_buffer(&audio.pcm, tts.frame_samples);
    let adapter = TtsAdapter::new(frames, audio.sample_rate, tts.sample_rate, tts.frame_samples)?;

    let duration = synth::playback_wait(
        total_samples,
        tts.frame_samples,
        Duration::from_millis(tts.frame_duration_ms as u64),
        audio.sample_rate,
    );

    let session_config = SessionConfig {
        output_device: tts.output_device.clone(),
        input_device: None,
        sample_rate: tts.sample_rate,
        frame_duration_ms: tts.frame_duration_ms,
        output_channels: 1,
        input_channels: 1,
    };
    let mut session = DeviceSession::open(session_config, adapter.into_callback())?;
    log::info!(
        "Playing {total_samples} samples (~{:.1}s)",
        duration.as_secs_f64()
    );

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = signal::ctrl_c() => {
            log::info!("Received Ctrl-C, stopping playback");
        }
    }
    session.close();
    Ok(())
}
