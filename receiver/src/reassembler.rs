//! RFC 6184 H.264 NAL unit reassembly.
//!
//! Turns a sequence of RTP payloads from one video track into complete,
//! Annex-B framed NAL units: STAP-A aggregates are unpacked, FU-A
//! fragments are accumulated until their end bit, and plain units pass
//! straight through. One reassembler instance serves exactly one track
//! and is driven by a single task; it never blocks.

use tracing::{debug, warn};

use webrtc_bridge_common::error::FramingError;
use webrtc_bridge_common::nal::{
    nal_unit_type, ANNEXB_START_CODE, FU_END_MASK, FU_START_MASK, NAL_FORBIDDEN_MASK,
    NAL_REF_IDC_MASK, NAL_TYPE_FU_A, NAL_TYPE_MASK, NAL_TYPE_STAP_A,
};

/// Default ceiling for one fragmented NAL unit, including its start code.
///
/// A keyframe at high bitrate spans many RTP packets but stays well
/// under a megabyte; anything larger indicates a corrupt fragment
/// stream.
pub const DEFAULT_MAX_NAL_BYTES: usize = 1_000_000;

/// Stateful reassembler for one video track.
///
/// The accumulation buffer is owned by the instance and grows per
/// fragment up to a configured ceiling. Completed units are moved out
/// to the caller, not copied; the buffer restarts empty on the next
/// start fragment.
pub struct NalReassembler {
    // ---
    /// Accumulation buffer for the unit currently being reassembled
    buf: Vec<u8>,

    /// Whether a start fragment has been seen for the current unit
    started: bool,

    /// Ceiling on the accumulated unit size in bytes
    max_nal_bytes: usize,
}

impl NalReassembler {
    // ---
    /// Creates a reassembler with the given buffer ceiling.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero ceiling.
    pub fn new(max_nal_bytes: usize) -> Result<Self, FramingError> {
        // ---
        if max_nal_bytes == 0 {
            return Err(FramingError::InvalidConfig(
                "reassembly buffer ceiling must be nonzero",
            ));
        }
        Ok(Self {
            buf: Vec::new(),
            started: false,
            max_nal_bytes,
        })
    }

    /// Creates a reassembler with the default buffer ceiling.
    pub fn with_default_capacity() -> Self {
        // ---
        Self {
            buf: Vec::new(),
            started: false,
            max_nal_bytes: DEFAULT_MAX_NAL_BYTES,
        }
    }

    /// Bytes currently held in the accumulation buffer.
    pub fn pending_bytes(&self) -> usize {
        // ---
        self.buf.len()
    }

    /// Feeds one RTP payload and returns a completed unit, if any.
    ///
    /// The returned bytes are one or more NAL units, each prefixed with
    /// a 4-byte Annex-B start code (STAP-A aggregates produce several
    /// in one buffer).
    ///
    /// # Errors
    ///
    /// All errors are local to this payload:
    /// - `MalformedPacket` on empty payloads, truncated STAP-A records,
    ///   or FU-A payloads shorter than their two header bytes
    /// - `OutOfOrderFragment` for a continuation with no prior start
    /// - `FragmentTooLarge` when the accumulated unit outgrows the
    ///   ceiling (the unit is dropped, state reset)
    pub fn push(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>, FramingError> {
        // ---
        let Some(&indicator) = payload.first() else {
            return Err(FramingError::MalformedPacket("empty RTP payload"));
        };

        // A set forbidden-zero bit marks a damaged unit; skip it without
        // disturbing reassembly state.
        if indicator & NAL_FORBIDDEN_MASK != 0 {
            debug!("ignoring NAL unit with forbidden bit set");
            return Ok(None);
        }

        match nal_unit_type(indicator) {
            1..=23 => self.single_unit(payload),
            NAL_TYPE_STAP_A => self.aggregate(payload),
            NAL_TYPE_FU_A => self.fragment(indicator, payload),
            other => {
                debug!("ignoring reserved NAL type {}", other);
                Ok(None)
            }
        }
    }

    /// Handles an unfragmented unit: start code plus payload, verbatim.
    fn single_unit(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>, FramingError> {
        // ---
        self.drop_partial("single unit");

        let mut out = Vec::with_capacity(ANNEXB_START_CODE.len() + payload.len());
        out.extend_from_slice(&ANNEXB_START_CODE);
        out.extend_from_slice(payload);
        Ok(Some(out))
    }

    /// Unpacks a STAP-A payload: back-to-back `{u16 size}{NAL}` records.
    ///
    /// Every record is emitted with its own start code. A record
    /// overrunning the payload discards the whole aggregate.
    fn aggregate(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>, FramingError> {
        // ---
        self.drop_partial("aggregate");

        let mut out = Vec::with_capacity(payload.len() + 8);
        let mut offset = 1; // past the STAP-A header byte

        while offset < payload.len() {
            let size_bytes = payload
                .get(offset..offset + 2)
                .ok_or(FramingError::MalformedPacket("STAP-A size overruns payload"))?;
            let size = u16::from_be_bytes([size_bytes[0], size_bytes[1]]) as usize;
            offset += 2;

            let unit = payload
                .get(offset..offset + size)
                .ok_or(FramingError::MalformedPacket("STAP-A unit overruns payload"))?;
            offset += size;

            out.extend_from_slice(&ANNEXB_START_CODE);
            out.extend_from_slice(unit);
        }

        if out.is_empty() {
            return Err(FramingError::MalformedPacket("STAP-A carries no units"));
        }
        Ok(Some(out))
    }

    /// Handles one FU-A fragment.
    ///
    /// The start fragment resets the buffer and synthesizes the original
    /// NAL header from the indicator's NRI bits and the FU header's
    /// type bits; the end fragment completes the unit and moves it out.
    fn fragment(&mut self, indicator: u8, payload: &[u8]) -> Result<Option<Vec<u8>>, FramingError> {
        // ---
        let Some(&fu_header) = payload.get(1) else {
            return Err(FramingError::MalformedPacket(
                "FU-A payload shorter than its headers",
            ));
        };
        let fragment = &payload[2..];

        if fu_header & FU_START_MASK != 0 {
            // A start while a unit is pending means the previous end
            // fragment was lost.
            self.drop_partial("start fragment");

            self.buf.extend_from_slice(&ANNEXB_START_CODE);
            self.buf
                .push((indicator & NAL_REF_IDC_MASK) | (fu_header & NAL_TYPE_MASK));
            self.started = true;
        } else if !self.started {
            return Err(FramingError::OutOfOrderFragment);
        }

        if self.buf.len() + fragment.len() > self.max_nal_bytes {
            self.buf.clear();
            self.started = false;
            return Err(FramingError::FragmentTooLarge {
                limit: self.max_nal_bytes,
            });
        }
        self.buf.extend_from_slice(fragment);

        if fu_header & FU_END_MASK != 0 {
            self.started = false;
            Ok(Some(std::mem::take(&mut self.buf)))
        } else {
            Ok(None)
        }
    }

    /// Discards a partial fragmented unit, if one is pending.
    fn drop_partial(&mut self, context: &str) {
        // ---
        if self.started {
            warn!(
                "dropping {} partially reassembled bytes: {} arrived before the end fragment",
                self.buf.len(),
                context
            );
            self.buf.clear();
            self.started = false;
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    /// Splits an Annex-B-less NAL (header + body) into FU-A payloads of
    /// at most `chunk` body bytes each, with correct S/E bits.
    fn fragment_fua(nal: &[u8], chunk: usize) -> Vec<Vec<u8>> {
        // ---
        let header = nal[0];
        let body = &nal[1..];
        let indicator = (header & NAL_REF_IDC_MASK) | NAL_TYPE_FU_A;
        let total = body.chunks(chunk).count();

        body.chunks(chunk)
            .enumerate()
            .map(|(i, part)| {
                let mut fu_header = header & NAL_TYPE_MASK;
                if i == 0 {
                    fu_header |= FU_START_MASK;
                }
                if i == total - 1 {
                    fu_header |= FU_END_MASK;
                }
                let mut payload = vec![indicator, fu_header];
                payload.extend_from_slice(part);
                payload
            })
            .collect()
    }

    #[test]
    fn test_single_unit_pass_through() {
        // ---
        let mut reassembler = NalReassembler::with_default_capacity();
        let out = reassembler
            .push(&[0x65, 0x88, 0x84])
            .expect("push failed")
            .expect("unit expected");
        assert_eq!(out, vec![0, 0, 0, 1, 0x65, 0x88, 0x84]);
    }

    #[test]
    fn test_stap_a_two_units() {
        // ---
        let mut payload = vec![0x18]; // STAP-A header (type 24)
        payload.extend_from_slice(&5u16.to_be_bytes());
        payload.extend_from_slice(&[0x61, 1, 2, 3, 4]);
        payload.extend_from_slice(&10u16.to_be_bytes());
        payload.extend_from_slice(&[0x41, 5, 6, 7, 8, 9, 10, 11, 12, 13]);

        let mut reassembler = NalReassembler::with_default_capacity();
        let out = reassembler
            .push(&payload)
            .expect("push failed")
            .expect("units expected");

        let mut expected = vec![0, 0, 0, 1, 0x61, 1, 2, 3, 4];
        expected.extend_from_slice(&[0, 0, 0, 1, 0x41, 5, 6, 7, 8, 9, 10, 11, 12, 13]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_stap_a_single_unit_scenario() {
        // ---
        // STAP-A carrying one 5-byte unit AA BB CC DD EE
        let mut payload = vec![0x18];
        payload.extend_from_slice(&5u16.to_be_bytes());
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);

        let mut reassembler = NalReassembler::with_default_capacity();
        let out = reassembler.push(&payload).unwrap().unwrap();
        assert_eq!(out, vec![0, 0, 0, 1, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
    }

    #[test]
    fn test_stap_a_truncated_record_discarded() {
        // ---
        let mut payload = vec![0x18];
        payload.extend_from_slice(&200u16.to_be_bytes()); // declares 200, has 2
        payload.extend_from_slice(&[1, 2]);

        let mut reassembler = NalReassembler::with_default_capacity();
        assert_eq!(
            reassembler.push(&payload),
            Err(FramingError::MalformedPacket("STAP-A unit overruns payload"))
        );
    }

    #[test]
    fn test_fua_reassembles_original_bytes() {
        // ---
        let mut nal = vec![0x65]; // IDR slice header, NRI=3
        nal.extend((0u16..300).map(|i| (i % 251) as u8));

        let mut reassembler = NalReassembler::with_default_capacity();
        let mut result = None;
        for payload in fragment_fua(&nal, 100) {
            match reassembler.push(&payload).expect("push failed") {
                Some(unit) => result = Some(unit),
                None => assert!(result.is_none()),
            }
        }

        let mut expected = vec![0, 0, 0, 1];
        expected.extend_from_slice(&nal);
        assert_eq!(result.expect("unit expected"), expected);
    }

    #[test]
    fn test_end_before_start_recovers() {
        // ---
        let nal = [0x65, 1, 2, 3, 4, 5, 6];
        let fragments = fragment_fua(&nal, 3);

        let mut reassembler = NalReassembler::with_default_capacity();

        // End fragment first: rejected, no unit emitted
        assert_eq!(
            reassembler.push(fragments.last().unwrap()),
            Err(FramingError::OutOfOrderFragment)
        );

        // A correct start..end sequence still reassembles
        let mut result = None;
        for payload in &fragments {
            if let Some(unit) = reassembler.push(payload).expect("push failed") {
                result = Some(unit);
            }
        }
        let mut expected = vec![0, 0, 0, 1];
        expected.extend_from_slice(&nal);
        assert_eq!(result.expect("unit expected"), expected);
    }

    #[test]
    fn test_new_start_discards_partial_unit() {
        // ---
        let first = [0x65, 1, 2, 3, 4, 5, 6, 7, 8];
        let second = [0x61, 9, 9, 9];

        let mut reassembler = NalReassembler::with_default_capacity();

        // Feed only the start of the first unit
        let fragments = fragment_fua(&first, 4);
        assert_eq!(reassembler.push(&fragments[0]), Ok(None));

        // Complete the second unit; the first must not leak into it
        let mut result = None;
        for payload in fragment_fua(&second, 4) {
            if let Some(unit) = reassembler.push(&payload).expect("push failed") {
                result = Some(unit);
            }
        }
        let mut expected = vec![0, 0, 0, 1];
        expected.extend_from_slice(&second);
        assert_eq!(result.expect("unit expected"), expected);
    }

    #[test]
    fn test_fragment_too_large_resets() {
        // ---
        let mut reassembler = NalReassembler::new(64).expect("ceiling ok");

        let mut nal = vec![0x65];
        nal.extend(std::iter::repeat(0xAB).take(100));
        let fragments = fragment_fua(&nal, 40);

        let mut saw_overflow = false;
        for payload in &fragments {
            match reassembler.push(payload) {
                Err(FramingError::FragmentTooLarge { limit: 64 }) => saw_overflow = true,
                Err(FramingError::OutOfOrderFragment) => {} // fragments after the reset
                Ok(None) => {}
                other => panic!("unexpected result {:?}", other),
            }
        }
        assert!(saw_overflow);
        assert_eq!(reassembler.pending_bytes(), 0);

        // Stream recovers at the next small unit
        let small = [0x61, 1, 2, 3];
        let mut result = None;
        for payload in fragment_fua(&small, 2) {
            if let Some(unit) = reassembler.push(&payload).expect("push failed") {
                result = Some(unit);
            }
        }
        assert!(result.is_some());
    }

    #[test]
    fn test_forbidden_bit_ignored() {
        // ---
        let mut reassembler = NalReassembler::with_default_capacity();
        assert_eq!(reassembler.push(&[0x80 | 0x65, 1, 2]), Ok(None));
    }

    #[test]
    fn test_reserved_type_ignored() {
        // ---
        let mut reassembler = NalReassembler::with_default_capacity();
        // Type 25 (STAP-B) is not supported in this packetization mode
        assert_eq!(reassembler.push(&[25, 1, 2, 3]), Ok(None));
    }

    #[test]
    fn test_empty_payload_is_malformed() {
        // ---
        let mut reassembler = NalReassembler::with_default_capacity();
        assert_eq!(
            reassembler.push(&[]),
            Err(FramingError::MalformedPacket("empty RTP payload"))
        );
    }

    #[test]
    fn test_zero_ceiling_rejected_at_setup() {
        // ---
        assert!(matches!(
            NalReassembler::new(0),
            Err(FramingError::InvalidConfig(_))
        ));
    }
}
