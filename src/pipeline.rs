//! Ordered composition of transform stages.

use crate::stage::{Stage, StageError};

/// A purely sequential chain of stateful stages.
///
/// Each invocation feeds stage i's output forward to stage i+1; each stage's
/// carried state persists strictly across invocations. The rate/channel
/// contract between adjacent stages is fixed at construction and not checked
/// per fragment.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn push(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Run one fragment through every stage in order.
    pub fn process(&mut self, fragment: &[u8]) -> Result<Vec<u8>, StageError> {
        let mut current = fragment.to_vec();
        for stage in &mut self.stages {
            current = stage.process(&current)?;
        }
        Ok(current)
    }

    /// Reset every stage to fresh state (per-frame failure recovery).
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CODEC_FRAME_SAMPLES, DecodeStage, EncodeStage};
    use crate::fragment;
    use crate::resample::ResampleStage;

    /// The loopback chain: 48k -> 8k -> encode -> decode -> 8k -> 48k.
    fn loopback_pipeline() -> Pipeline {
        Pipeline::new()
            .push(ResampleStage::new(48000, 8000, 960).unwrap())
            .push(EncodeStage::new(16000).unwrap())
            .push(DecodeStage::new().unwrap())
            .push(ResampleStage::new(8000, 48000, 160).unwrap())
    }

    fn sine_48k(samples: usize) -> Vec<u8> {
        let wave: Vec<i16> = (0..samples)
            .map(|i| {
                let t = i as f32 / 48000.0;
                ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 10000.0) as i16
            })
            .collect();
        fragment::samples_to_bytes(&wave)
    }

    #[test]
    fn loopback_chain_preserves_fragment_length() {
        let mut pipeline = loopback_pipeline();
        // 20 ms at 48 kHz in, 20 ms at 48 kHz out, every invocation.
        for _ in 0..5 {
            let out = pipeline.process(&sine_48k(960)).unwrap();
            assert_eq!(out.len() / 2, 960);
        }
    }

    #[test]
    fn empty_fragment_flows_through() {
        let mut pipeline = loopback_pipeline();
        assert!(pipeline.process(&[]).unwrap().is_empty());
    }

    #[test]
    fn stage_error_propagates_to_the_caller() {
        let mut pipeline = loopback_pipeline();
        assert!(matches!(
            pipeline.process(&[0u8; 3]),
            Err(StageError::MalformedFragment(3))
        ));
    }

    #[test]
    fn reset_clears_every_stage() {
        let mut pipeline = Pipeline::new().push(EncodeStage::new(16000).unwrap());
        let partial = fragment::samples_to_bytes(&vec![100i16; CODEC_FRAME_SAMPLES / 2]);
        assert!(pipeline.process(&partial).unwrap().is_empty());
        pipeline.reset();
        // The buffered half-frame was dropped with the reset.
        assert!(pipeline.process(&partial).unwrap().is_empty());
    }
}
