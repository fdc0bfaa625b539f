//! Transport record framing.
//!
//! Defines the small binary envelope exchanged with the transport
//! collaborator: a 1-byte media-kind tag, a 4-byte big-endian timestamp
//! in microseconds, and the payload. Outbound video NAL records carry
//! an additional 4-byte big-endian length between timestamp and payload.
//! Encoding and decoding are exact inverses; the format is bit-exact.

use crate::error::FramingError;

/// Record prefix: kind tag plus timestamp
pub const RECORD_PREFIX_LEN: usize = 5;

/// NAL record prefix: kind tag, timestamp, and length field
pub const NAL_RECORD_PREFIX_LEN: usize = 9;

/// Media kind carried by a track or record.
///
/// The tag values are part of the wire format: consumers identify a
/// record's track from this byte alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// H.264 video, tag byte 0
    Video = 0,

    /// Opus audio, tag byte 1
    Audio = 1,
}

impl MediaKind {
    // ---
    /// Returns the wire tag for this kind.
    pub fn tag(self) -> u8 {
        // ---
        self as u8
    }

    /// Maps a wire tag back to a kind.
    pub fn from_tag(tag: u8) -> Option<Self> {
        // ---
        match tag {
            0 => Some(MediaKind::Video),
            1 => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

/// A complete media frame produced by the depacketizer.
///
/// Video frames carry Annex-B start-code prefixed NAL units; audio
/// frames carry the raw Opus payload. The timestamp is in raw RTP clock
/// units of the originating track; interpreting the clock rate is the
/// caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    // ---
    /// Which track this frame belongs to
    pub kind: MediaKind,

    /// Presentation timestamp in RTP clock units
    pub timestamp: u32,

    /// Frame payload bytes
    pub data: Vec<u8>,
}

/// Decoded record prefix fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    // ---
    /// Media kind from the tag byte
    pub kind: MediaKind,

    /// Timestamp in microseconds
    pub timestamp_us: u32,
}

/// Encodes a raw media record: `[tag][timestamp][payload]`.
///
/// Used for Opus audio records and for wrapping inbound RTP datagrams.
pub fn encode_raw_record(kind: MediaKind, timestamp_us: u32, payload: &[u8]) -> Vec<u8> {
    // ---
    let mut buf = Vec::with_capacity(RECORD_PREFIX_LEN + payload.len());
    buf.push(kind.tag());
    buf.extend_from_slice(&timestamp_us.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Encodes a NAL transport record: `[tag][timestamp][length][NAL]`.
///
/// The length field is big-endian, covering the NAL bytes only.
pub fn encode_nal_record(kind: MediaKind, timestamp_us: u32, nal: &[u8]) -> Vec<u8> {
    // ---
    let mut buf = Vec::with_capacity(NAL_RECORD_PREFIX_LEN + nal.len());
    buf.push(kind.tag());
    buf.extend_from_slice(&timestamp_us.to_be_bytes());
    buf.extend_from_slice(&(nal.len() as u32).to_be_bytes());
    buf.extend_from_slice(nal);
    buf
}

/// Decodes a raw record, returning the prefix fields and payload slice.
///
/// # Errors
///
/// Returns `TruncatedRecord` if the record is shorter than its 5-byte
/// prefix, and `MalformedPacket` on an unknown kind tag.
pub fn decode_raw_record(buf: &[u8]) -> Result<(RecordHeader, &[u8]), FramingError> {
    // ---
    if buf.len() < RECORD_PREFIX_LEN {
        return Err(FramingError::TruncatedRecord {
            needed: RECORD_PREFIX_LEN,
            have: buf.len(),
        });
    }
    let kind = MediaKind::from_tag(buf[0])
        .ok_or(FramingError::MalformedPacket("unknown media kind tag"))?;
    let timestamp_us = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    Ok((
        RecordHeader { kind, timestamp_us },
        &buf[RECORD_PREFIX_LEN..],
    ))
}

/// Decodes a NAL record, returning the prefix fields and the NAL slice.
///
/// # Errors
///
/// Returns `TruncatedRecord` if the prefix or the declared NAL length
/// overruns the record, and `MalformedPacket` on an unknown kind tag.
pub fn decode_nal_record(buf: &[u8]) -> Result<(RecordHeader, &[u8]), FramingError> {
    // ---
    if buf.len() < NAL_RECORD_PREFIX_LEN {
        return Err(FramingError::TruncatedRecord {
            needed: NAL_RECORD_PREFIX_LEN,
            have: buf.len(),
        });
    }
    let kind = MediaKind::from_tag(buf[0])
        .ok_or(FramingError::MalformedPacket("unknown media kind tag"))?;
    let timestamp_us = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    let len = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) as usize;

    if buf.len() < NAL_RECORD_PREFIX_LEN + len {
        return Err(FramingError::TruncatedRecord {
            needed: NAL_RECORD_PREFIX_LEN + len,
            have: buf.len(),
        });
    }
    Ok((
        RecordHeader { kind, timestamp_us },
        &buf[NAL_RECORD_PREFIX_LEN..NAL_RECORD_PREFIX_LEN + len],
    ))
}
