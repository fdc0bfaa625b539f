//! RTP packet structure, parsing, and serialization.
//!
//! Implements the RTP fixed header plus CSRC list and header extension
//! according to RFC 3550. Parsing is a pure function over the datagram
//! bytes; padding removal follows the P bit per section 5.1.

use crate::error::FramingError;

/// RTP packet version 2 (as per RFC 3550)
pub const RTP_VERSION: u8 = 2;

/// Fixed header size before CSRC list and extension
pub const RTP_MIN_HEADER_LEN: usize = 12;

/// RTP header extension block (RFC 3550 section 5.3.1).
///
/// The extension data itself is skipped during parsing; only the profile
/// identifier and declared length are retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeaderExtension {
    // ---
    /// Profile-defined identifier (first 16 bits of the block)
    pub profile: u16,

    /// Extension length in 32-bit words, excluding the 4-byte preamble
    pub length_words: u16,
}

/// Parsed RTP header fields.
///
/// Covers the full RFC 3550 header: fixed 12 bytes, CSRC list, and the
/// optional extension block. The consumed header length is always
/// `12 + 4 * csrcs.len() + (extension ? 4 + 4 * length_words : 0)`.
///
/// # Wire Format
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           synchronization source (SSRC) identifier            |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// |            contributing source (CSRC) identifiers             |
/// |                             ....                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    // ---
    /// Padding flag (P bit); when set the last payload byte holds the
    /// padding length
    pub padding: bool,

    /// Marker bit, payload-profile specific
    pub marker: bool,

    /// Payload type (7 bits)
    pub payload_type: u8,

    /// Packet sequence number (wraps at 65535)
    pub sequence: u16,

    /// RTP timestamp in clock units of the payload type
    pub timestamp: u32,

    /// Synchronization source identifier
    pub ssrc: u32,

    /// Contributing source identifiers (0 to 15 entries)
    pub csrcs: Vec<u32>,

    /// Header extension, if the X bit was set
    pub extension: Option<RtpHeaderExtension>,
}

impl RtpHeader {
    // ---
    /// Creates a minimal header with the given identification fields.
    ///
    /// No padding, no extension, no CSRC list, marker clear.
    pub fn new(payload_type: u8, sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        // ---
        Self {
            padding: false,
            marker: false,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            csrcs: Vec::new(),
            extension: None,
        }
    }

    /// Sets the marker bit, builder style.
    pub fn with_marker(mut self, marker: bool) -> Self {
        // ---
        self.marker = marker;
        self
    }

    /// Parses the header from the start of a datagram.
    ///
    /// Returns the header fields and the byte offset where the payload
    /// begins. The parse is pure: no state, no allocation beyond the
    /// CSRC list.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPacket` if:
    /// - The buffer is shorter than the 12-byte fixed header
    /// - The version field is not 2
    /// - The CSRC list or extension block would overrun the buffer
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), FramingError> {
        // ---
        if buf.len() < RTP_MIN_HEADER_LEN {
            return Err(FramingError::MalformedPacket(
                "datagram shorter than fixed RTP header",
            ));
        }

        let version = buf[0] >> 6;
        if version != RTP_VERSION {
            return Err(FramingError::MalformedPacket("RTP version is not 2"));
        }

        let padding = buf[0] & 0x20 != 0;
        let has_extension = buf[0] & 0x10 != 0;
        let csrc_count = (buf[0] & 0x0F) as usize;

        let marker = buf[1] & 0x80 != 0;
        let payload_type = buf[1] & 0x7F;

        let sequence = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let mut offset = RTP_MIN_HEADER_LEN;

        // CSRC list: 4 bytes per entry
        if buf.len() < offset + 4 * csrc_count {
            return Err(FramingError::MalformedPacket("CSRC list overruns datagram"));
        }
        let mut csrcs = Vec::with_capacity(csrc_count);
        for _ in 0..csrc_count {
            csrcs.push(u32::from_be_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ]));
            offset += 4;
        }

        // Extension block: 16-bit profile, 16-bit length in words, then
        // that many 32-bit words (RFC 3550 section 5.3.1)
        let extension = if has_extension {
            if buf.len() < offset + 4 {
                return Err(FramingError::MalformedPacket(
                    "extension preamble overruns datagram",
                ));
            }
            let profile = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let length_words = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]);
            offset += 4;

            let ext_bytes = 4 * length_words as usize;
            if buf.len() < offset + ext_bytes {
                return Err(FramingError::MalformedPacket(
                    "extension data overruns datagram",
                ));
            }
            offset += ext_bytes;

            Some(RtpHeaderExtension {
                profile,
                length_words,
            })
        } else {
            None
        };

        Ok((
            Self {
                padding,
                marker,
                payload_type,
                sequence,
                timestamp,
                ssrc,
                csrcs,
                extension,
            },
            offset,
        ))
    }

    /// Returns the number of header bytes this header occupies on the wire.
    pub fn header_len(&self) -> usize {
        // ---
        let ext_bytes = match &self.extension {
            Some(ext) => 4 + 4 * ext.length_words as usize,
            None => 0,
        };
        RTP_MIN_HEADER_LEN + 4 * self.csrcs.len() + ext_bytes
    }

    /// Serializes the header followed by `payload` into wire format.
    ///
    /// Only the fields the bridge emits are written: fixed header plus
    /// CSRC list. Extensions and padding are never generated; the parser
    /// handles them on the inbound side only.
    pub fn serialize(&self, payload: &[u8]) -> Vec<u8> {
        // ---
        let mut buf = Vec::with_capacity(RTP_MIN_HEADER_LEN + 4 * self.csrcs.len() + payload.len());

        // Byte 0: V(2) | P(1) | X(1) | CC(4)
        buf.push((RTP_VERSION << 6) | (self.csrcs.len() as u8 & 0x0F));

        // Byte 1: M(1) | PT(7)
        buf.push(((self.marker as u8) << 7) | (self.payload_type & 0x7F));

        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());
        for csrc in &self.csrcs {
            buf.extend_from_slice(&csrc.to_be_bytes());
        }

        buf.extend_from_slice(payload);
        buf
    }
}

/// A parsed RTP packet borrowing its payload from the datagram.
///
/// Padding has already been trimmed: when the P bit is set, the last
/// payload byte declares the padding length and the payload shrinks by
/// that count before the packet is handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    // ---
    /// Parsed header fields
    pub header: RtpHeader,

    /// Payload bytes after CSRC, extension, and padding removal
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    // ---
    /// Parses a full RTP packet from a datagram.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPacket` for any header inconsistency (see
    /// [`RtpHeader::parse`]) or if the declared padding length exceeds
    /// the remaining payload.
    pub fn parse(datagram: &'a [u8]) -> Result<Self, FramingError> {
        // ---
        let (header, offset) = RtpHeader::parse(datagram)?;
        let mut payload = &datagram[offset..];

        if header.padding {
            let pad = match payload.last() {
                Some(&p) => p as usize,
                None => {
                    return Err(FramingError::MalformedPacket(
                        "padding flag set on empty payload",
                    ))
                }
            };
            if pad > payload.len() {
                return Err(FramingError::MalformedPacket(
                    "padding length exceeds payload",
                ));
            }
            payload = &payload[..payload.len() - pad];
        }

        Ok(Self { header, payload })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_minimal_header_round_trip() {
        // ---
        let header = RtpHeader::new(102, 100, 32000, 0x12345678).with_marker(true);
        let wire = header.serialize(&[1, 2, 3, 4]);

        assert_eq!(wire[0] >> 6, 2); // Version
        assert_eq!(wire[1] & 0x7F, 102); // Payload type
        assert_eq!(wire[1] & 0x80, 0x80); // Marker

        let packet = RtpPacket::parse(&wire).expect("parse failed");
        assert_eq!(packet.header.sequence, 100);
        assert_eq!(packet.header.timestamp, 32000);
        assert_eq!(packet.header.ssrc, 0x12345678);
        assert_eq!(packet.payload, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_payload_offset_formula() {
        // ---
        // Two CSRCs and a 2-word extension: offset must be
        // 12 + 4*2 + 4 + 4*2 = 32.
        let mut wire: Vec<u8> = Vec::new();
        wire.push((2 << 6) | 0x10 | 2); // V=2, X=1, CC=2
        wire.push(111);
        wire.extend_from_slice(&7u16.to_be_bytes());
        wire.extend_from_slice(&48000u32.to_be_bytes());
        wire.extend_from_slice(&0xAABBCCDDu32.to_be_bytes());
        wire.extend_from_slice(&1u32.to_be_bytes()); // CSRC 1
        wire.extend_from_slice(&2u32.to_be_bytes()); // CSRC 2
        wire.extend_from_slice(&0xBEDEu16.to_be_bytes()); // ext profile
        wire.extend_from_slice(&2u16.to_be_bytes()); // ext words
        wire.extend_from_slice(&[0u8; 8]); // ext data
        wire.extend_from_slice(&[0xEE; 3]); // payload

        let (header, offset) = RtpHeader::parse(&wire).expect("parse failed");
        assert_eq!(offset, 32);
        assert_eq!(offset, header.header_len());
        assert_eq!(header.csrcs, vec![1, 2]);
        assert_eq!(
            header.extension,
            Some(RtpHeaderExtension {
                profile: 0xBEDE,
                length_words: 2
            })
        );
        assert_eq!(&wire[offset..], &[0xEE; 3]);
    }

    #[test]
    fn test_rejects_short_datagram() {
        // ---
        let result = RtpHeader::parse(&[0x80, 0, 1]);
        assert_eq!(
            result,
            Err(FramingError::MalformedPacket(
                "datagram shorter than fixed RTP header"
            ))
        );
    }

    #[test]
    fn test_rejects_wrong_version() {
        // ---
        let mut wire = vec![0u8; 12];
        wire[0] = 1 << 6; // Version 1
        assert!(RtpHeader::parse(&wire).is_err());
    }

    #[test]
    fn test_rejects_csrc_overrun() {
        // ---
        let mut wire = vec![0u8; 12];
        wire[0] = (2 << 6) | 15; // 15 CSRCs declared, none present
        assert!(RtpHeader::parse(&wire).is_err());
    }

    #[test]
    fn test_rejects_extension_overrun() {
        // ---
        let mut wire = vec![0u8; 16];
        wire[0] = (2 << 6) | 0x10; // X=1
        wire[14] = 0;
        wire[15] = 4; // 4 words declared, 0 present
        assert!(RtpHeader::parse(&wire).is_err());
    }

    #[test]
    fn test_padding_trimmed() {
        // ---
        let header = RtpHeader::new(111, 0, 0, 1);
        let mut wire = header.serialize(&[9, 9, 9, 0, 0, 3]);
        wire[0] |= 0x20; // P=1, last byte says 3 padding bytes

        let packet = RtpPacket::parse(&wire).expect("parse failed");
        assert_eq!(packet.payload, &[9, 9, 9]);
    }

    #[test]
    fn test_padding_exceeding_payload_is_malformed() {
        // ---
        let header = RtpHeader::new(111, 0, 0, 1);
        let mut wire = header.serialize(&[0, 9]);
        wire[0] |= 0x20;
        *wire.last_mut().unwrap() = 200;

        assert_eq!(
            RtpPacket::parse(&wire),
            Err(FramingError::MalformedPacket(
                "padding length exceeds payload"
            ))
        );
    }

    #[test]
    fn test_sequence_wraparound_value() {
        // ---
        let header = RtpHeader::new(102, 65535, 0, 0);
        let wire = header.serialize(&[]);
        let packet = RtpPacket::parse(&wire).expect("parse failed");
        assert_eq!(packet.header.sequence, 65535);
    }
}
