//! Opus audio codec decoding.
//!
//! Provides a wrapper around the Opus decoder for decompressing the
//! bridge's audio track back to PCM samples.

use anyhow::{Context, Result};
use opus::{Channels, Decoder};

/// Decode sample rate. All Opus RTP streams use the 48 kHz clock, so
/// the bridge decodes at that rate regardless of the encoded bandwidth.
pub const SAMPLE_RATE: u32 = 48_000;

/// Number of audio channels (mono)
pub const CHANNELS: u16 = 1;

/// Frame duration in milliseconds
pub const FRAME_DURATION_MS: usize = 20;

/// Samples per frame (20ms at 48kHz)
pub const SAMPLES_PER_FRAME: usize = (SAMPLE_RATE as usize * FRAME_DURATION_MS) / 1000;

/// Opus decoder wrapper for the audio track.
///
/// Decodes Opus frames back to 16-bit PCM at the RTP clock rate.
///
/// # Example
///
/// ```no_run
/// use receiver::codec::OpusDecoderWrapper;
///
/// let mut decoder = OpusDecoderWrapper::new().unwrap();
/// let compressed = vec![0u8; 60]; // Opus frame
/// let pcm = decoder.decode(&compressed).unwrap();
/// ```
pub struct OpusDecoderWrapper {
    // ---
    decoder: Decoder,
}

impl OpusDecoderWrapper {
    // ---
    /// Creates a new Opus decoder.
    ///
    /// # Errors
    ///
    /// Returns error if Opus decoder initialization fails.
    pub fn new() -> Result<Self> {
        // ---
        let decoder =
            Decoder::new(SAMPLE_RATE, Channels::Mono).context("failed to create Opus decoder")?;

        Ok(Self { decoder })
    }

    /// Decodes one Opus frame to PCM samples.
    ///
    /// # Arguments
    ///
    /// * `payload` - One complete Opus frame from the audio track
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not a decodable Opus frame.
    pub fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        // ---
        let mut pcm = vec![0i16; SAMPLES_PER_FRAME];
        let decoded = self
            .decoder
            .decode(payload, &mut pcm, false)
            .context("Opus decoding failed")?;

        pcm.truncate(decoded);
        Ok(pcm)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use opus::{Application, Encoder};

    #[test]
    fn test_decoder_creation() {
        // ---
        let decoder = OpusDecoderWrapper::new();
        assert!(decoder.is_ok());
    }

    #[test]
    fn test_decode_round_trip() {
        // ---
        let mut encoder =
            Encoder::new(SAMPLE_RATE, Channels::Mono, Application::Audio).expect("encoder");
        let silence = vec![0i16; SAMPLES_PER_FRAME];

        let mut compressed = vec![0u8; 4000];
        let len = encoder
            .encode(&silence, &mut compressed)
            .expect("encode failed");
        compressed.truncate(len);

        let mut decoder = OpusDecoderWrapper::new().expect("decoder creation failed");
        let pcm = decoder.decode(&compressed).expect("decode failed");
        assert_eq!(pcm.len(), SAMPLES_PER_FRAME);
    }

    #[test]
    fn test_decode_garbage_fails() {
        // ---
        let mut decoder = OpusDecoderWrapper::new().expect("decoder creation failed");
        // A deliberately invalid TOC/body combination
        let result = decoder.decode(&[0xFF, 0xFF, 0xFF]);
        assert!(result.is_err());
    }
}
