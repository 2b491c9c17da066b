//! Streaming sample-rate conversion stage built on rubato.
//!
//! The resampler consumes fixed-size input chunks; whatever does not fill a
//! whole chunk is buffered and consumed on a later call, and the sub-sample
//! phase lives in rubato's own state. Successive short fragments therefore
//! resample without cumulative drift, which per-call truncation would cause.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::fragment;
use crate::stage::{Stage, StageError};

pub struct ResampleStage {
    resampler: FastFixedIn<f32>,
    /// Input samples waiting for a full chunk.
    pending: Vec<f32>,
    chunk: usize,
}

impl ResampleStage {
    /// Create a mono resampler from `in_rate` to `out_rate` that consumes
    /// `chunk` input samples at a time.
    pub fn new(in_rate: u32, out_rate: u32, chunk: usize) -> Result<Self, StageError> {
        let resampler = FastFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            chunk,
            1,
        )
        .map_err(|e| StageError::Resample(e.to_string()))?;
        Ok(Self {
            resampler,
            pending: Vec::with_capacity(chunk * 2),
            chunk,
        })
    }

    /// Drain buffered input and the resampler's internal tail.
    ///
    /// Used at end of stream; after this the stage is ready for fresh input.
    pub fn flush(&mut self) -> Result<Vec<u8>, StageError> {
        let mut out = Vec::new();
        if !self.pending.is_empty() {
            let remainder = std::mem::take(&mut self.pending);
            let planar = self
                .resampler
                .process_partial(Some(&[remainder]), None)
                .map_err(|e| StageError::Resample(e.to_string()))?;
            out.extend_from_slice(&planar[0]);
        }
        let tail = self
            .resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| StageError::Resample(e.to_string()))?;
        out.extend_from_slice(&tail[0]);
        Ok(fragment::samples_to_bytes(&to_i16(&out)))
    }

    /// True if input is buffered waiting for a full chunk.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Stage for ResampleStage {
    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>, StageError> {
        let samples = fragment::bytes_to_samples(input)?;
        self.pending.extend(samples.iter().map(|&s| s as f32 / 32768.0));

        let mut out: Vec<f32> = Vec::new();
        while self.pending.len() >= self.chunk {
            let chunk = [self.pending[..self.chunk].to_vec()];
            let planar = self
                .resampler
                .process(&chunk, None)
                .map_err(|e| StageError::Resample(e.to_string()))?;
            out.extend_from_slice(&planar[0]);
            self.pending.drain(..self.chunk);
        }
        Ok(fragment::samples_to_bytes(&to_i16(&out)))
    }

    fn reset(&mut self) {
        self.resampler.reset();
        self.pending.clear();
    }
}

fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&x| (x * 32768.0).round().clamp(-32768.0, 32767.0) as i16)
        .collect()
}
