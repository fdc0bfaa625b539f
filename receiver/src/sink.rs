//! File sinks for bridged media.
//!
//! The inbound path lands in plain files so the elementary streams can
//! be inspected or fed to a decoder: video as a raw Annex-B bitstream,
//! audio as a PCM WAV.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::codec::{CHANNELS, SAMPLE_RATE};

/// Appends Annex-B video frames to a raw `.h264` file.
pub struct AnnexBSink {
    // ---
    writer: BufWriter<File>,
    frames_written: u64,
    bytes_written: u64,
}

impl AnnexBSink {
    // ---
    /// Creates (or truncates) the output bitstream file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        // ---
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create video output {}", path.display()))?;
        info!("Writing Annex-B video to {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            frames_written: 0,
            bytes_written: 0,
        })
    }

    /// Appends one frame's start-code prefixed NAL units.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub fn write_frame(&mut self, data: &[u8]) -> Result<()> {
        // ---
        self.writer
            .write_all(data)
            .context("failed to write video frame")?;
        self.frames_written += 1;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flushes buffered frames and reports totals.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub fn finish(mut self) -> Result<(u64, u64)> {
        // ---
        self.writer.flush().context("failed to flush video output")?;
        Ok((self.frames_written, self.bytes_written))
    }
}

/// Writes decoded audio frames into a WAV file.
pub struct WavSink {
    // ---
    writer: WavWriter<BufWriter<File>>,
    samples_written: u64,
}

impl WavSink {
    // ---
    /// Creates the output WAV with the bridge's decode format
    /// (48 kHz mono, 16-bit PCM).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        // ---
        let path = path.as_ref();
        let spec = WavSpec {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create audio output {}", path.display()))?;
        info!("Writing decoded audio to {}", path.display());

        Ok(Self {
            writer,
            samples_written: 0,
        })
    }

    /// Appends one frame of PCM samples.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
        // ---
        for &sample in samples {
            self.writer
                .write_sample(sample)
                .context("failed to write audio sample")?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    /// Finalizes the WAV header and reports the sample count.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub fn finish(self) -> Result<u64> {
        // ---
        let samples = self.samples_written;
        self.writer
            .finalize()
            .context("failed to finalize WAV output")?;
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_annexb_sink_appends_frames() {
        // ---
        let dir = std::env::temp_dir();
        let path = dir.join("bridge_sink_test.h264");

        let mut sink = AnnexBSink::create(&path).expect("sink creation failed");
        sink.write_frame(&[0, 0, 0, 1, 0x67]).expect("write failed");
        sink.write_frame(&[0, 0, 0, 1, 0x65, 0xAB])
            .expect("write failed");
        let (frames, bytes) = sink.finish().expect("finish failed");

        assert_eq!(frames, 2);
        assert_eq!(bytes, 11);
        assert_eq!(
            std::fs::read(&path).expect("read back failed"),
            vec![0, 0, 0, 1, 0x67, 0, 0, 0, 1, 0x65, 0xAB]
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_wav_sink_round_trip() {
        // ---
        let dir = std::env::temp_dir();
        let path = dir.join("bridge_sink_test.wav");

        let mut sink = WavSink::create(&path).expect("sink creation failed");
        sink.write_samples(&[0, 100, -100, 32000])
            .expect("write failed");
        let samples = sink.finish().expect("finish failed");
        assert_eq!(samples, 4);

        let mut reader = hound::WavReader::open(&path).expect("open failed");
        let read: Vec<i16> = reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .expect("samples failed");
        assert_eq!(read, vec![0, 100, -100, 32000]);
        let _ = std::fs::remove_file(&path);
    }
}
