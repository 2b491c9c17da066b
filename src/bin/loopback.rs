//! Microphone loopback tester.
//!
//! Captures the mic, degrades it through a narrowband codec round-trip
//! (48k -> 8k -> Opus encode -> decode -> 8k -> 48k), duplicates to stereo,
//! and plays it back after the jitter queue warms up. Ctrl-C stops it.

use anyhow::Result;
use tokio::signal;

use audioloop::codec::{CODEC_SAMPLE_RATE, DecodeStage, EncodeStage};
use audioloop::resample::ResampleStage;
use audioloop::{Config, DeviceSession, LoopbackAdapter, Pipeline, SessionConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load_or_default(audioloop::config::DEFAULT_PATH)?;
    let lb = config.loopback;

    // Chunk sizes are one frame period at each stage's input rate.
    let down_chunk = (lb.sample_rate * lb.frame_duration_ms / 1000) as usize;
    let up_chunk = (CODEC_SAMPLE_RATE * lb.frame_duration_ms / 1000) as usize;

    let pipeline = Pipeline::new()
        .push(ResampleStage::new(lb.sample_rate, CODEC_SAMPLE_RATE, down_chunk)?)
        .push(EncodeStage::new(lb.codec_bitrate)?)
        .push(DecodeStage::new()?)
        .push(ResampleStage::new(CODEC_SAMPLE_RATE, lb.sample_rate, up_chunk)?);
    let adapter =
        LoopbackAdapter::new(pipeline, lb.warmup_fragments, lb.output_channels as usize);

    let session_config = SessionConfig {
        output_device: lb.output_device.clone(),
        input_device: Some(lb.input_device.clone()),
        sample_rate: lb.sample_rate,
        frame_duration_ms: lb.frame_duration_ms,
        output_channels: lb.output_channels,
        input_channels: lb.input_channels,
    };
    let mut session = DeviceSession::open(session_config, adapter.into_callback())?;
    log::info!("Loopback running, press Ctrl-C to stop");

    signal::ctrl_c().await?;
    log::info!("Received Ctrl-C, shutting down...");
    session.close();
    Ok(())
}
