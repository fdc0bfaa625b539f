//! Error kinds shared by the framing engine.
//!
//! All per-packet errors are local: the caller drops the offending packet,
//! record, or fragment and keeps the stream alive. Only `InvalidConfig` is
//! fatal, and only at construction time.

use thiserror::Error;

/// Errors produced while parsing, reassembling, or framing media.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Header, extension, or padding fields are inconsistent with the
    /// buffer length. The packet is dropped without touching stream state.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// A continuation or end fragment arrived with no matching start.
    /// The fragment is dropped; reassembly resumes at the next start.
    #[error("fragment received before a start fragment")]
    OutOfOrderFragment,

    /// A fragmented NAL unit outgrew the reassembly buffer ceiling.
    /// The accumulated unit is dropped and state reset.
    #[error("fragmented unit exceeds the {limit}-byte buffer ceiling")]
    FragmentTooLarge {
        /// Configured buffer ceiling in bytes.
        limit: usize,
    },

    /// A transport record is shorter than its declared fixed prefix.
    #[error("record truncated: need {needed} bytes, have {have}")]
    TruncatedRecord {
        /// Bytes required by the record's fixed prefix and length field.
        needed: usize,
        /// Bytes actually present.
        have: usize,
    },

    /// A payload type with no configured track. Callers skip these
    /// packets silently; the variant exists for logging and counters.
    #[error("unsupported payload type {0}")]
    UnsupportedPayloadType(u8),

    /// Construction-time misconfiguration. The only fatal kind.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
