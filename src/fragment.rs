//! PCM fragment helpers.
//!
//! A fragment is a byte buffer of interleaved signed 16-bit little-endian
//! samples. An empty fragment is valid and means "silence, emit nothing".

use crate::stage::StageError;

/// Decode a fragment into i16 samples.
///
/// Fails if the byte count is not a whole number of samples.
pub fn bytes_to_samples(fragment: &[u8]) -> Result<Vec<i16>, StageError> {
    if fragment.len() % 2 != 0 {
        return Err(StageError::MalformedFragment(fragment.len()));
    }
    Ok(fragment
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Encode i16 samples into a fragment.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Expand mono samples to `channels` interleaved channels by duplication.
///
/// `[a, b, c]` with 2 channels becomes `[a, a, b, b, c, c]`.
pub fn duplicate_channels(mono: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return mono.to_vec();
    }
    let mut out = Vec::with_capacity(mono.len() * channels);
    for &s in mono {
        for _ in 0..channels {
            out.push(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let bytes = samples_to_bytes(&samples);
        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes_to_samples(&bytes).unwrap(), samples);
    }

    #[test]
    fn odd_byte_count_is_malformed() {
        let err = bytes_to_samples(&[0u8, 1, 2]).unwrap_err();
        assert!(matches!(err, StageError::MalformedFragment(3)));
    }

    #[test]
    fn empty_fragment_is_valid() {
        assert!(bytes_to_samples(&[]).unwrap().is_empty());
    }

    #[test]
    fn mono_to_stereo_duplicates_interleaved() {
        let mono = vec![10i16, 20, 30];
        assert_eq!(duplicate_channels(&mono, 2), vec![10, 10, 20, 20, 30, 30]);
    }

    #[test]
    fn single_channel_is_passthrough() {
        let mono = vec![1i16, 2, 3];
        assert_eq!(duplicate_channels(&mono, 1), mono);
    }
}
