//! Narrowband Opus encode/decode stages.
//!
//! The codec runs at 8 kHz mono with fixed 20 ms frames (160 samples). Opus
//! packets are variable-length, so the encoder prefixes each packet with its
//! u16-LE byte length and the decoder consumes that framing; a fragment may
//! carry zero, one, or several packets.

use crate::fragment;
use crate::stage::{Stage, StageError};

/// Codec sample rate in Hz.
pub const CODEC_SAMPLE_RATE: u32 = 8000;
/// Samples per codec frame (20 ms at 8 kHz).
pub const CODEC_FRAME_SAMPLES: usize = 160;

const MAX_PACKET_BYTES: usize = 4000;

pub struct EncodeStage {
    encoder: opus::Encoder,
    /// Samples accumulated toward the next full codec frame.
    pending: Vec<i16>,
}

impl EncodeStage {
    pub fn new(bitrate: i32) -> Result<Self, StageError> {
        let mut encoder = opus::Encoder::new(
            CODEC_SAMPLE_RATE,
            opus::Channels::Mono,
            opus::Application::Voip,
        )?;
        encoder.set_bitrate(opus::Bitrate::Bits(bitrate))?;
        Ok(Self {
            encoder,
            pending: Vec::with_capacity(CODEC_FRAME_SAMPLES * 2),
        })
    }
}

impl Stage for EncodeStage {
    /// Accumulate PCM and emit one length-prefixed packet per full frame.
    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>, StageError> {
        self.pending.extend(fragment::bytes_to_samples(input)?);

        let mut out = Vec::new();
        let mut packet = vec![0u8; MAX_PACKET_BYTES];
        while self.pending.len() >= CODEC_FRAME_SAMPLES {
            let frame = &self.pending[..CODEC_FRAME_SAMPLES];
            let len = self.encoder.encode(frame, &mut packet)?;
            out.extend_from_slice(&(len as u16).to_le_bytes());
            out.extend_from_slice(&packet[..len]);
            self.pending.drain(..CODEC_FRAME_SAMPLES);
        }
        Ok(out)
    }

    fn reset(&mut self) {
        // Clears the predictor state; codec settings are retained.
        if let Err(e) = self.encoder.reset_state() {
            log::warn!("Failed to reset encoder state: {e}");
        }
        self.pending.clear();
    }
}

pub struct DecodeStage {
    decoder: opus::Decoder,
}

impl DecodeStage {
    pub fn new() -> Result<Self, StageError> {
        let decoder = opus::Decoder::new(CODEC_SAMPLE_RATE, opus::Channels::Mono)?;
        Ok(Self { decoder })
    }
}

impl Stage for DecodeStage {
    /// Decode every length-prefixed packet in the fragment.
    fn process(&mut self, input: &[u8]) -> Result<Vec<u8>, StageError> {
        let mut samples: Vec<i16> = Vec::new();
        let mut frame = vec![0i16; CODEC_FRAME_SAMPLES];
        let mut rest = input;
        while !rest.is_empty() {
            if rest.len() < 2 {
                return Err(StageError::TruncatedPacket {
                    need: 2,
                    have: rest.len(),
                });
            }
            let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
            rest = &rest[2..];
            if rest.len() < len {
                return Err(StageError::TruncatedPacket {
                    need: len,
                    have: rest.len(),
                });
            }
            let decoded = self.decoder.decode(&rest[..len], &mut frame, false)?;
            samples.extend_from_slice(&frame[..decoded]);
            rest = &rest[len..];
        }
        Ok(fragment::samples_to_bytes(&samples))
    }

    fn reset(&mut self) {
        if let Err(e) = self.decoder.reset_state() {
            log::warn!("Failed to reset decoder state: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BITRATE: i32 = 16000;

    fn pcm(samples: usize) -> Vec<u8> {
        let wave: Vec<i16> = (0..samples)
            .map(|i| {
                let t = i as f32 / CODEC_SAMPLE_RATE as f32;
                ((2.0 * std::f32::consts::PI * 300.0 * t).sin() * 8000.0) as i16
            })
            .collect();
        fragment::samples_to_bytes(&wave)
    }

    #[test]
    fn encode_then_decode_restores_frame_length() {
        let mut enc = EncodeStage::new(BITRATE).unwrap();
        let mut dec = DecodeStage::new().unwrap();

        let packets = enc.process(&pcm(CODEC_FRAME_SAMPLES)).unwrap();
        assert!(!packets.is_empty());
        let out = dec.process(&packets).unwrap();
        assert_eq!(out.len() / 2, CODEC_FRAME_SAMPLES);
    }

    #[test]
    fn irregular_fragments_are_buffered_across_calls() {
        let mut enc = EncodeStage::new(BITRATE).unwrap();
        let input = pcm(CODEC_FRAME_SAMPLES * 2);

        // 100 samples: no full frame yet.
        assert!(enc.process(&input[..200]).unwrap().is_empty());
        // Remaining 220 samples complete two frames.
        let packets = enc.process(&input[200..]).unwrap();

        let mut dec = DecodeStage::new().unwrap();
        let out = dec.process(&packets).unwrap();
        assert_eq!(out.len() / 2, CODEC_FRAME_SAMPLES * 2);
    }

    #[test]
    fn empty_fragment_yields_no_packets() {
        let mut enc = EncodeStage::new(BITRATE).unwrap();
        assert!(enc.process(&[]).unwrap().is_empty());
        let mut dec = DecodeStage::new().unwrap();
        assert!(dec.process(&[]).unwrap().is_empty());
    }

    #[test]
    fn odd_length_fragment_is_rejected() {
        let mut enc = EncodeStage::new(BITRATE).unwrap();
        assert!(matches!(
            enc.process(&[1u8, 2, 3]),
            Err(StageError::MalformedFragment(3))
        ));
    }

    #[test]
    fn truncated_packet_is_rejected() {
        let mut enc = EncodeStage::new(BITRATE).unwrap();
        let mut dec = DecodeStage::new().unwrap();
        let packets = enc.process(&pcm(CODEC_FRAME_SAMPLES)).unwrap();

        assert!(matches!(
            dec.process(&packets[..packets.len() - 1]),
            Err(StageError::TruncatedPacket { .. })
        ));
        // Lone prefix byte.
        assert!(matches!(
            dec.process(&packets[..1]),
            Err(StageError::TruncatedPacket { need: 2, have: 1 })
        ));
    }

    #[test]
    fn reset_recovers_after_a_failure() {
        let mut dec = DecodeStage::new().unwrap();
        assert!(dec.process(&[0xffu8, 0xff, 1]).is_err());
        dec.reset();

        let mut enc = EncodeStage::new(BITRATE).unwrap();
        let packets = enc.process(&pcm(CODEC_FRAME_SAMPLES)).unwrap();
        let out = dec.process(&packets).unwrap();
        assert_eq!(out.len() / 2, CODEC_FRAME_SAMPLES);
    }

    #[test]
    fn reset_encoder_still_encodes_decodable_packets() {
        let mut enc = EncodeStage::new(BITRATE).unwrap();
        enc.process(&pcm(CODEC_FRAME_SAMPLES)).unwrap();
        enc.reset();

        let packets = enc.process(&pcm(CODEC_FRAME_SAMPLES)).unwrap();
        assert!(!packets.is_empty());
        let mut dec = DecodeStage::new().unwrap();
        let out = dec.process(&packets).unwrap();
        assert_eq!(out.len() / 2, CODEC_FRAME_SAMPLES);
    }

    #[test]
    fn reset_clears_partial_frame_buffer() {
        let mut enc = EncodeStage::new(BITRATE).unwrap();
        assert!(enc.process(&pcm(100)).unwrap().is_empty());
        enc.reset();
        // After reset the 100 buffered samples are gone; another partial
        // fragment still does not complete a frame.
        assert!(enc.process(&pcm(100)).unwrap().is_empty());
    }
}
