//! The transform stage contract shared by resampler and codec stages.

use thiserror::Error;

/// A recoverable per-frame transform failure.
///
/// None of these tear the session down; the callback adapter logs them,
/// resets the offending pipeline to fresh state, and emits silence.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("fragment of {0} bytes is not a whole number of samples")]
    MalformedFragment(usize),
    #[error("truncated codec packet: need {need} bytes, have {have}")]
    TruncatedPacket { need: usize, have: usize },
    #[error("codec error: {0}")]
    Codec(#[from] opus::Error),
    #[error("resampler error: {0}")]
    Resample(String),
}

/// One stateful transform in a pipeline.
///
/// Implementations own their carried state (filter history, codec predictor
/// state, partial-frame buffers) exclusively; the state persists across
/// `process` calls for the lifetime of the stage, never across stages.
///
/// `process` must be total over any fragment length >= 0: an empty input is
/// a valid no-op and fragment sizes may vary call to call. The output length
/// need not match the input length.
pub trait Stage: Send {
    fn process(&mut self, fragment: &[u8]) -> Result<Vec<u8>, StageError>;

    /// Discard all carried state, as if freshly constructed.
    fn reset(&mut self);
}
