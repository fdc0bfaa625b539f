//! RTP depacketization: datagrams in, media frames out.
//!
//! Orchestrates header parsing and NAL reassembly per track. Each
//! datagram either produces a complete [`MediaFrame`], nothing (unknown
//! payload type, or a fragment still accumulating), or a local error
//! that never terminates the stream.

use tracing::{debug, trace};

use webrtc_bridge_common::error::FramingError;
use webrtc_bridge_common::record::{MediaFrame, MediaKind};
use webrtc_bridge_common::rtp::RtpPacket;
use webrtc_bridge_common::track::TrackConfig;

use crate::reassembler::NalReassembler;

/// Per-track depacketization state.
///
/// Holds the payload-type mapping, the video reassembler, and the
/// first-seen RTP timestamp per track. One instance serves one inbound
/// stream and must be driven by a single task.
pub struct Depacketizer {
    // ---
    tracks: TrackConfig,
    reassembler: NalReassembler,
    video_start: Option<u32>,
    audio_start: Option<u32>,
    skipped: u64,
}

impl Depacketizer {
    // ---
    /// Creates a depacketizer for the given track mapping.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `max_nal_bytes` is zero.
    pub fn new(tracks: TrackConfig, max_nal_bytes: usize) -> Result<Self, FramingError> {
        // ---
        Ok(Self {
            tracks,
            reassembler: NalReassembler::new(max_nal_bytes)?,
            video_start: None,
            audio_start: None,
            skipped: 0,
        })
    }

    /// Processes one inbound RTP datagram.
    ///
    /// Returns `Ok(Some(frame))` when a complete frame is available,
    /// `Ok(None)` when the datagram was consumed without producing one
    /// (unknown payload type, or a fragment mid-unit).
    ///
    /// # Errors
    ///
    /// Per-packet errors only; the depacketizer stays usable. See
    /// [`crate::reassembler::NalReassembler::push`] and
    /// [`RtpPacket::parse`].
    pub fn depacketize(&mut self, datagram: &[u8]) -> Result<Option<MediaFrame>, FramingError> {
        // ---
        let packet = RtpPacket::parse(datagram)?;
        let timestamp = packet.header.timestamp;

        let Some(kind) = self.tracks.kind_of(packet.header.payload_type) else {
            // Not surfaced as a failure; the packet is simply skipped.
            debug!(
                "skipping packet: {}",
                FramingError::UnsupportedPayloadType(packet.header.payload_type)
            );
            self.skipped += 1;
            return Ok(None);
        };

        self.note_track_start(kind, timestamp);

        match kind {
            MediaKind::Video => {
                trace!(
                    "video packet seq={} ts={} payload={}B",
                    packet.header.sequence,
                    timestamp,
                    packet.payload.len()
                );
                let unit = self.reassembler.push(packet.payload)?;
                Ok(unit.map(|data| MediaFrame {
                    kind: MediaKind::Video,
                    timestamp,
                    data,
                }))
            }
            MediaKind::Audio => Ok(Some(MediaFrame {
                kind: MediaKind::Audio,
                timestamp,
                data: packet.payload.to_vec(),
            })),
        }
    }

    /// Returns the first RTP timestamp seen on a track, if any.
    ///
    /// The session layer uses this as the track's clock offset.
    pub fn track_start(&self, kind: MediaKind) -> Option<u32> {
        // ---
        match kind {
            MediaKind::Video => self.video_start,
            MediaKind::Audio => self.audio_start,
        }
    }

    /// Bytes pending in the video reassembly buffer.
    pub fn pending_video_bytes(&self) -> usize {
        // ---
        self.reassembler.pending_bytes()
    }

    /// Total packets skipped for an unmapped payload type.
    pub fn skipped_packets(&self) -> u64 {
        // ---
        self.skipped
    }

    /// Records the first-seen timestamp for a track. Idempotent: only
    /// the first call per track takes effect.
    fn note_track_start(&mut self, kind: MediaKind, timestamp: u32) {
        // ---
        let slot = match kind {
            MediaKind::Video => &mut self.video_start,
            MediaKind::Audio => &mut self.audio_start,
        };
        if slot.is_none() {
            *slot = Some(timestamp);
        }
    }
}
