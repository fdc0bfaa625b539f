//! Audio file reading and preprocessing.
//!
//! Handles WAV file parsing and conversion to the format the Opus
//! encoder expects (48 kHz mono PCM).

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec};
use std::path::Path;
use tracing::info;

use crate::codec::{SAMPLES_PER_FRAME, SAMPLE_RATE};

/// Audio data container with PCM samples and metadata.
///
/// Contains preprocessed audio ready for encoding. Samples are always
/// 48kHz mono regardless of input file format.
#[derive(Debug)]
pub struct AudioData {
    // ---
    /// PCM samples as 16-bit signed integers
    pub samples: Vec<i16>,

    /// Original sample rate of the input file
    #[allow(dead_code)] // Metadata for debugging/logging
    pub original_sample_rate: u32,

    /// Number of channels in the original file
    #[allow(dead_code)] // Metadata for debugging/logging
    pub original_channels: u16,
}

impl AudioData {
    // ---
    /// Returns an iterator over 20ms audio frames.
    ///
    /// Each frame contains at most SAMPLES_PER_FRAME (960) samples; the
    /// last frame may be short and gets zero-padded before encoding.
    pub fn frames(&self) -> impl Iterator<Item = &[i16]> {
        // ---
        self.samples.chunks(SAMPLES_PER_FRAME)
    }

    /// Returns the total duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        // ---
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    /// Returns the number of frames, counting a trailing partial one.
    pub fn frame_count(&self) -> usize {
        // ---
        self.samples.len().div_ceil(SAMPLES_PER_FRAME)
    }
}

/// Reads and preprocesses a WAV file for streaming.
///
/// Automatically converts the audio to the 48kHz mono format the Opus
/// encoder runs at. Supports various input sample rates and channel
/// configurations.
///
/// # Arguments
///
/// * `path` - Path to the WAV file
///
/// # Returns
///
/// AudioData containing preprocessed samples ready for encoding.
///
/// # Errors
///
/// Returns error if:
/// - File cannot be opened
/// - WAV format is invalid
/// - Sample format is unsupported
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    // ---
    let path = path.as_ref();
    info!("Reading WAV file: {}", path.display());

    let mut reader = WavReader::open(path)
        .with_context(|| format!("failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    info!(
        "WAV format: {}Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let raw_samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        // --- Native path
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read 16-bit PCM WAV samples")?,

        // --- Float path
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read 32-bit float WAV samples")?
            .into_iter()
            .map(|s| {
                let clamped = s.clamp(-1.0, 1.0);
                (clamped * i16::MAX as f32) as i16
            })
            .collect(),

        // --- Explicit rejection
        (SampleFormat::Int, bits) => {
            anyhow::bail!(
                "unsupported integer PCM WAV format: {}-bit (only 16-bit PCM is supported)",
                bits
            );
        }

        (SampleFormat::Float, bits) => {
            anyhow::bail!(
                "unsupported float WAV format: {}-bit (only 32-bit float is supported)",
                bits
            );
        }
    };

    info!("Read {} samples from file", raw_samples.len());

    let samples = convert_to_target_format(&raw_samples, &spec);

    Ok(AudioData {
        samples,
        original_sample_rate: spec.sample_rate,
        original_channels: spec.channels,
    })
}

/// Converts audio samples to target format (48kHz mono).
///
/// Handles channel mixdown and resampling. Linear interpolation is
/// adequate for the bridge's voice-grade audio path.
fn convert_to_target_format(samples: &[i16], spec: &WavSpec) -> Vec<i16> {
    // ---
    let mut mono_samples = if spec.channels > 1 {
        info!("Converting {} channels to mono", spec.channels);
        convert_to_mono(samples, spec.channels as usize)
    } else {
        samples.to_vec()
    };

    if spec.sample_rate != SAMPLE_RATE {
        info!(
            "Resampling from {}Hz to {}Hz",
            spec.sample_rate, SAMPLE_RATE
        );
        mono_samples = resample_linear(&mono_samples, spec.sample_rate, SAMPLE_RATE);
    }

    info!(
        "Converted to target format: {} samples ({} frames)",
        mono_samples.len(),
        mono_samples.len().div_ceil(SAMPLES_PER_FRAME)
    );

    mono_samples
}

/// Converts multi-channel audio to mono by averaging channels.
fn convert_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    // ---
    let frame_count = samples.len() / channels;
    let mut mono = Vec::with_capacity(frame_count);

    for frame in samples.chunks(channels) {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        let avg = (sum / channels as i32) as i16;
        mono.push(avg);
    }

    mono
}

/// Resamples audio using linear interpolation.
fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    // ---
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f64;

        let a = samples[idx] as f64;
        let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }

    out
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_mono_mixdown_averages() {
        // ---
        let interleaved = [100i16, 300, -50, 50];
        let mono = convert_to_mono(&interleaved, 2);
        assert_eq!(mono, vec![200, 0]);
    }

    #[test]
    fn test_resample_identity_length() {
        // ---
        let samples: Vec<i16> = (0..480).map(|i| i as i16).collect();
        let out = resample_linear(&samples, 48_000, 48_000);
        assert_eq!(out.len(), samples.len());
        assert_eq!(out, samples);
    }

    #[test]
    fn test_resample_doubles_length() {
        // ---
        let samples = vec![0i16, 100];
        let out = resample_linear(&samples, 24_000, 48_000);
        assert_eq!(out.len(), 4);
        // Interpolated midpoint between 0 and 100
        assert_eq!(out[1], 50);
    }

    #[test]
    fn test_frames_chunking() {
        // ---
        let audio = AudioData {
            samples: vec![0i16; SAMPLES_PER_FRAME + 10],
            original_sample_rate: SAMPLE_RATE,
            original_channels: 1,
        };
        assert_eq!(audio.frame_count(), 2);

        let frames: Vec<&[i16]> = audio.frames().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), SAMPLES_PER_FRAME);
        assert_eq!(frames[1].len(), 10);
    }
}
