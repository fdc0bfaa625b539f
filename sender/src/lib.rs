//! Outbound bridge path: elementary streams to transport records.
//!
//! Splits an H.264 bitstream into NAL units, encodes WAV audio to
//! Opus, and frames both as transport records sent to the collaborator.
//! This library can be used to build custom senders or for integration
//! testing.

pub mod audio;
pub mod codec;
pub mod network;
pub mod video;

pub use audio::{read_wav, AudioData};
pub use codec::OpusEncoderWrapper;
pub use network::RecordSender;
pub use video::{read_bitstream, VideoData};

use anyhow::{Context, Result};
use tracing::{info, warn};

use webrtc_bridge_common::nal::{self, is_vcl, nal_unit_type};
use webrtc_bridge_common::record::{encode_nal_record, encode_raw_record};
use webrtc_bridge_common::{MediaKind, MetricsContext};

/// Streams a video bitstream as NAL transport records.
///
/// Each NAL unit becomes one record; timestamps advance one frame per
/// VCL unit at the given rate, so parameter sets share the timestamp of
/// the slice they precede. Transmission is paced to real time.
///
/// # Arguments
///
/// * `video` - Loaded bitstream with its framing mode
/// * `sender` - Record transport for the video track
/// * `metrics` - Process metrics registry
/// * `fps` - Frame rate used for pacing and timestamps
///
/// # Errors
///
/// Returns error on a zero frame rate, an invalid AVCC prefix width,
/// or persistent network failure.
pub async fn stream_video(
    video: &VideoData,
    sender: &mut RecordSender,
    metrics: &MetricsContext,
    fps: u32,
) -> Result<()> {
    // ---
    if fps == 0 {
        anyhow::bail!("frame rate must be nonzero");
    }
    let frame_interval_us = 1_000_000 / fps;

    // Materialize the unit list up front; an AVCC stream can end early
    // on a malformed prefix and everything before it is still sent.
    let units: Vec<&[u8]> = match video.nal_length_size {
        None => nal::nal_units(&video.data).collect(),
        Some(size) => {
            let mut units = Vec::new();
            for result in nal::length_prefixed_nal_units(&video.data, size)? {
                match result {
                    Ok(unit) => units.push(unit),
                    Err(e) => {
                        warn!("stopping video stream at malformed unit: {}", e);
                        break;
                    }
                }
            }
            units
        }
    };

    let mut frame_index: u32 = 0;
    let mut sent = 0u64;

    for unit in units {
        let Some(&header) = unit.first() else {
            continue;
        };

        let time_us = frame_index.wrapping_mul(frame_interval_us);

        let timer = metrics.packetize_seconds.start_timer();
        let record = encode_nal_record(MediaKind::Video, time_us, unit);
        timer.observe_duration();

        sender
            .send(&record)
            .await
            .with_context(|| format!("failed to send NAL record {}", sent))?;
        sent += 1;
        metrics.records_sent_total.inc();
        metrics.bytes_sent_total.inc_by(record.len() as u64);

        // A coded slice closes the access unit: advance the clock and
        // pace to real time.
        if is_vcl(nal_unit_type(header)) {
            metrics.frames_video_total.inc();
            frame_index = frame_index.wrapping_add(1);
            tokio::time::sleep(tokio::time::Duration::from_micros(frame_interval_us as u64))
                .await;
        }
    }

    info!("Streamed {} NAL records ({} frames)", sent, frame_index);
    Ok(())
}

/// Streams audio frames as raw Opus transport records.
///
/// Encodes each 20ms frame with Opus and frames it as a raw record
/// with a microsecond timestamp, paced to the configured interval.
///
/// # Arguments
///
/// * `audio` - Audio data to stream
/// * `encoder` - Opus encoder instance
/// * `sender` - Record transport for the audio track
/// * `metrics` - Process metrics registry
/// * `interval_ms` - Milliseconds between record transmissions
///
/// # Errors
///
/// Returns error if encoding or network transmission fails.
pub async fn stream_audio(
    audio: &AudioData,
    encoder: &mut OpusEncoderWrapper,
    sender: &mut RecordSender,
    metrics: &MetricsContext,
    interval_ms: u64,
) -> Result<()> {
    // ---
    let mut frame_count: u32 = 0;

    for frame in audio.frames() {
        // Pad last frame if needed
        let mut frame_data = frame.to_vec();
        if frame_data.len() < codec::SAMPLES_PER_FRAME {
            warn!(
                "Padding last frame: {} samples -> {}",
                frame_data.len(),
                codec::SAMPLES_PER_FRAME
            );
            frame_data.resize(codec::SAMPLES_PER_FRAME, 0);
        }

        // Encode frame
        let timer = metrics.opus_encode_seconds.start_timer();
        let payload = encoder
            .encode(&frame_data)
            .with_context(|| format!("failed to encode frame {}", frame_count))?;
        timer.observe_duration();

        // Frame and send
        let time_us = frame_count.wrapping_mul(codec::FRAME_DURATION_MS as u32 * 1000);
        let record = encode_raw_record(MediaKind::Audio, time_us, &payload);
        sender
            .send(&record)
            .await
            .with_context(|| format!("failed to send audio record {}", frame_count))?;

        metrics.records_sent_total.inc();
        metrics.bytes_sent_total.inc_by(record.len() as u64);
        metrics.frames_audio_total.inc();
        frame_count = frame_count.wrapping_add(1);

        // Pace transmission (real-time simulation)
        tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
    }

    info!("Streamed {} audio frames", frame_count);
    Ok(())
}
