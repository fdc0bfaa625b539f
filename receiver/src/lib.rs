//! Inbound bridge path: transport datagrams to elementary streams.
//!
//! Receives framed RTP datagrams from the transport collaborator,
//! depacketizes them into media frames, and lands the streams in files:
//! Annex-B video and decoded WAV audio. This library can be used to
//! build custom receivers or for integration testing.

pub mod codec;
pub mod depacketizer;
pub mod network;
pub mod reassembler;
pub mod sink;
pub mod stats;

pub use codec::OpusDecoderWrapper;
pub use depacketizer::Depacketizer;
pub use network::DatagramReceiver;
pub use reassembler::{NalReassembler, DEFAULT_MAX_NAL_BYTES};
pub use sink::{AnnexBSink, WavSink};
pub use stats::ReceiverStats;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use webrtc_bridge_common::record::decode_raw_record;
use webrtc_bridge_common::{FramingError, MediaKind, MetricsContext};

/// Runs the inbound loop until interrupted.
///
/// Integrates all receiver components: datagram intake, record prefix
/// stripping, depacketization, Opus decode, and the file sinks. All
/// per-packet errors are counted and logged but never end the loop;
/// only I/O failures on the sinks or socket do.
///
/// # Arguments
///
/// * `receiver` - Datagram intake from the transport collaborator
/// * `depacketizer` - Per-track depacketization state
/// * `decoder` - Opus decoder for the audio track
/// * `video_sink` - Annex-B bitstream output
/// * `audio_sink` - WAV output for decoded audio
/// * `metrics` - Process metrics registry
///
/// # Errors
///
/// Returns error if the socket or a sink fails critically.
pub async fn receive_loop(
    receiver: &mut DatagramReceiver,
    depacketizer: &mut Depacketizer,
    decoder: &mut OpusDecoderWrapper,
    mut video_sink: AnnexBSink,
    mut audio_sink: WavSink,
    metrics: &MetricsContext,
) -> Result<()> {
    // ---
    let mut stats = ReceiverStats::new(Duration::from_secs(5));
    let mut skipped_seen = 0u64;

    loop {
        let datagram = tokio::select! {
            result = receiver.recv() => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, finishing up");
                break;
            }
        };

        stats.record_packet();
        metrics.packets_received_total.inc();
        metrics.bytes_received_total.inc_by(datagram.len() as u64);

        // Strip the collaborator's record prefix, then depacketize the
        // RTP bytes behind it.
        let timer = metrics.depacketize_seconds.start_timer();
        let result = decode_raw_record(&datagram)
            .and_then(|(_, rtp)| depacketizer.depacketize(rtp));
        timer.observe_duration();

        metrics
            .reassembly_buffer_bytes
            .set(depacketizer.pending_video_bytes() as i64);

        let skipped = depacketizer.skipped_packets();
        if skipped > skipped_seen {
            stats.record_ignored();
            metrics.packets_ignored_total.inc();
            skipped_seen = skipped;
        }

        match result {
            Ok(Some(frame)) => match frame.kind {
                MediaKind::Video => {
                    video_sink.write_frame(&frame.data)?;
                    stats.record_video_frame();
                    metrics.frames_video_total.inc();
                }
                MediaKind::Audio => {
                    let timer = metrics.opus_decode_seconds.start_timer();
                    let decoded = decoder.decode(&frame.data);
                    timer.observe_duration();

                    match decoded {
                        Ok(samples) => {
                            audio_sink.write_samples(&samples)?;
                            stats.record_audio_frame();
                            metrics.frames_audio_total.inc();
                        }
                        Err(e) => {
                            warn!("Failed to decode audio frame ts={}: {}", frame.timestamp, e);
                        }
                    }
                }
            },
            Ok(None) => {
                // Unknown payload type or a fragment still accumulating
            }
            Err(FramingError::OutOfOrderFragment) => {
                debug!("dropped fragment with no preceding start");
                stats.record_dropped_fragment();
                metrics.fragments_dropped_total.inc();
            }
            Err(e @ FramingError::FragmentTooLarge { .. }) => {
                warn!("dropped oversized fragmented unit: {}", e);
                stats.record_dropped_fragment();
                metrics.fragments_dropped_total.inc();
            }
            Err(e) => {
                warn!("dropped packet: {}", e);
                stats.record_malformed();
                metrics.packets_malformed_total.inc();
            }
        }
    }

    let (frames, bytes) = video_sink.finish().context("closing video sink")?;
    info!("Video: {} frames, {} bytes", frames, bytes);

    let samples = audio_sink.finish().context("closing audio sink")?;
    info!("Audio: {} samples", samples);

    stats.log();
    Ok(())
}
