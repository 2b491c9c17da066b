//! Callback adapters: one full pipeline-and-queue pass per driver invocation.
//!
//! The adapter boundary is the isolation line of the whole design: nothing —
//! not a transform error, not a malformed fragment, not a panic — may escape
//! into the driver's real-time thread. Any failure is logged, the pipeline is
//! reset to fresh state, the frame is dropped, and silence goes out; the
//! session stays open.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crate::fragment;
use crate::jitter::JitterQueue;
use crate::pipeline::Pipeline;
use crate::resample::ResampleStage;
use crate::stage::{Stage, StageError};

/// The driver-facing callback: (input fragment, elapsed time) -> output
/// fragment. An empty return means "emit silence this frame". Must complete
/// within the frame duration.
pub type FrameCallback = Box<dyn FnMut(&[u8], Duration) -> Vec<u8> + Send>;

/// Loopback mode: input -> pipeline -> channel duplication -> jitter queue.
pub struct LoopbackAdapter {
    pipeline: Pipeline,
    queue: JitterQueue,
    output_channels: usize,
}

impl LoopbackAdapter {
    pub fn new(pipeline: Pipeline, warmup_fragments: usize, output_channels: usize) -> Self {
        Self {
            pipeline,
            queue: JitterQueue::new(warmup_fragments),
            output_channels,
        }
    }

    /// Process one driver invocation. Never fails, never panics.
    pub fn on_frame(&mut self, input: &[u8]) -> Vec<u8> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(input)));
        match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::warn!("dropping frame after transform failure: {e}");
                self.pipeline.reset();
                Vec::new()
            }
            Err(_) => {
                log::error!("panic inside audio pipeline contained, dropping frame");
                self.pipeline.reset();
                Vec::new()
            }
        }
    }

    fn run(&mut self, input: &[u8]) -> Result<Vec<u8>, StageError> {
        let processed = self.pipeline.process(input)?;
        // Mono -> device channel count, after the pipeline, before enqueue.
        let mono = fragment::bytes_to_samples(&processed)?;
        let expanded = fragment::duplicate_channels(&mono, self.output_channels);
        Ok(self.queue.exchange(fragment::samples_to_bytes(&expanded)))
    }

    pub fn into_callback(mut self) -> FrameCallback {
        Box::new(move |input, _elapsed| self.on_frame(input))
    }
}

/// TTS mode: drain one pre-fragmented frame per invocation and upsample it
/// to the device rate through a single persistent resampler.
pub struct TtsAdapter {
    queue: JitterQueue,
    resampler: ResampleStage,
}

impl TtsAdapter {
    /// `frames` is the output of [`crate::synth::fragment_buffer`]; the
    /// resampler state is shared across every frame of the utterance.
    pub fn new(
        frames: Vec<Vec<u8>>,
        synth_rate: u32,
        device_rate: u32,
        frame_samples: usize,
    ) -> Result<Self, StageError> {
        let mut queue = JitterQueue::new(0);
        for frame in frames {
            queue.push(frame);
        }
        Ok(Self {
            queue,
            resampler: ResampleStage::new(synth_rate, device_rate, frame_samples)?,
        })
    }

    /// Process one driver invocation. Never fails, never panics.
    pub fn on_frame(&mut self) -> Vec<u8> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run()));
        match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::warn!("dropping frame after transform failure: {e}");
                self.resampler.reset();
                Vec::new()
            }
            Err(_) => {
                log::error!("panic inside audio pipeline contained, dropping frame");
                self.resampler.reset();
                Vec::new()
            }
        }
    }

    fn run(&mut self) -> Result<Vec<u8>, StageError> {
        let frame = self.queue.pop();
        if frame.is_empty() {
            // Utterance drained; a short final frame may still be buffered.
            if self.resampler.has_pending() {
                return self.resampler.flush();
            }
            return Ok(Vec::new());
        }
        self.resampler.process(&frame)
    }

    pub fn into_callback(mut self) -> FrameCallback {
        Box::new(move |_input, _elapsed| self.on_frame())
    }
}
