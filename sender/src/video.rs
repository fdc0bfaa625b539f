//! Video bitstream loading.
//!
//! Reads a raw H.264 elementary stream and determines how its NAL
//! units are delimited: Annex-B start codes, or AVCC length prefixes
//! whose width comes from the stream's avcC extradata.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use webrtc_bridge_common::nal::{self, nal_length_size};

/// A loaded H.264 bitstream plus its framing mode.
#[derive(Debug)]
pub struct VideoData {
    // ---
    /// Raw bitstream bytes
    pub data: Vec<u8>,

    /// AVCC length-prefix width; `None` means Annex-B start codes
    pub nal_length_size: Option<usize>,
}

impl VideoData {
    // ---
    /// Counts the NAL units in the bitstream.
    ///
    /// For AVCC streams the count stops at the first malformed prefix.
    pub fn nal_count(&self) -> usize {
        // ---
        match self.nal_length_size {
            None => nal::nal_units(&self.data).count(),
            Some(size) => match nal::length_prefixed_nal_units(&self.data, size) {
                Ok(iter) => iter.take_while(|unit| unit.is_ok()).count(),
                Err(_) => 0,
            },
        }
    }
}

/// Reads an H.264 bitstream and resolves its NAL framing mode.
///
/// Precedence for the AVCC length-prefix width:
/// 1. `forced_length_size`, when the caller knows the width
/// 2. The avcC extradata file, low 2 bits of byte 4 plus one
/// 3. Neither: the stream is treated as Annex-B
///
/// # Errors
///
/// Returns error if either file cannot be read or the stream is empty.
pub fn read_bitstream<P: AsRef<Path>>(
    path: P,
    extradata_path: Option<P>,
    forced_length_size: Option<usize>,
) -> Result<VideoData> {
    // ---
    let path = path.as_ref();
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read bitstream: {}", path.display()))?;
    if data.is_empty() {
        anyhow::bail!("bitstream is empty: {}", path.display());
    }
    info!("Read {} bitstream bytes from {}", data.len(), path.display());

    let length_size = match (forced_length_size, extradata_path) {
        (Some(size), _) => Some(size),
        (None, Some(extra)) => {
            let extra = extra.as_ref();
            let bytes = std::fs::read(extra)
                .with_context(|| format!("failed to read extradata: {}", extra.display()))?;
            nal_length_size(&bytes)
        }
        (None, None) => None,
    };

    match length_size {
        Some(size) => info!("AVCC stream with {}-byte length prefixes", size),
        None => info!("Annex-B stream"),
    }

    Ok(VideoData {
        data,
        nal_length_size: length_size,
    })
}
