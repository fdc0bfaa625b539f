//! Shared framing engine for the WebRTC media bridge.
//!
//! This crate holds everything both directions of the bridge use: RTP
//! header parsing, H.264 NAL unit scanning, the transport record
//! format, track configuration, the session registry, and the
//! observability plumbing shared by the sender and receiver binaries.

pub mod cli;
pub mod error;
pub mod nal;
pub mod observability;
pub mod record;
pub mod rtp;
pub mod session;
pub mod track;

pub use cli::ColorWhen;
pub use error::FramingError;
pub use observability::{init_tracing, MetricsContext, MetricsServerConfig};
pub use record::{MediaFrame, MediaKind};
pub use rtp::{RtpHeader, RtpPacket};
pub use session::{SessionEvent, SessionRegistry, SessionRole, SessionState};
pub use track::TrackConfig;
