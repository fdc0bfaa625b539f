//! WebRTC media bridge receiver - CLI binary.
//!
//! Receives framed RTP datagrams via UDP, depacketizes H.264 and Opus
//! tracks, and writes the elementary streams to files.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use receiver::{
    receive_loop, AnnexBSink, DatagramReceiver, Depacketizer, OpusDecoderWrapper, WavSink,
    DEFAULT_MAX_NAL_BYTES,
};
use webrtc_bridge_common::{
    init_tracing, ColorWhen, MetricsContext, MetricsServerConfig, TrackConfig,
};

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for ColorWhen {
    fn from(v: ColorArg) -> Self {
        match v {
            ColorArg::Auto => ColorWhen::Auto,
            ColorArg::Always => ColorWhen::Always,
            ColorArg::Never => ColorWhen::Never,
        }
    }
}

/// WebRTC media bridge receiver - land H.264/Opus tracks in files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    // ---
    /// Port to listen on
    #[arg(short, long, default_value = "5004")]
    port: u16,

    /// Output file for the Annex-B video bitstream
    #[arg(long, default_value = "out.h264")]
    video_out: String,

    /// Output file for the decoded audio
    #[arg(long, default_value = "out.wav")]
    audio_out: String,

    /// Payload type mapped to the video track
    #[arg(long, default_value = "102")]
    video_pt: u8,

    /// Payload type mapped to the audio track
    #[arg(long, default_value = "111")]
    audio_pt: u8,

    /// Ceiling for one fragmented NAL unit in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_NAL_BYTES)]
    max_nal_bytes: usize,

    /// Prometheus metrics bind address (serves `GET /metrics`).
    #[arg(long, default_value = "127.0.0.1:9200")]
    metrics_bind: String,

    /// Coloring
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorArg,
}

/// Capture version number from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    let args = Args::parse();
    init_tracing(args.color.into())?;
    info!("Starting bridge receiver v{VERSION}");
    info!("Listening on port: {}", args.port);
    info!("Video output: {}", args.video_out);
    info!("Audio output: {}", args.audio_out);
    info!("Track payload types: video={} audio={}", args.video_pt, args.audio_pt);
    info!("Metrics bind: {}", args.metrics_bind);

    let metrics = MetricsContext::new("receiver")?;
    let metrics_bind = args.metrics_bind.parse().context("invalid metrics bind")?;
    let _metrics_task = metrics.spawn_metrics_server(MetricsServerConfig::new(metrics_bind));

    let tracks = TrackConfig {
        video_payload_type: args.video_pt,
        audio_payload_type: args.audio_pt,
    };
    let mut depacketizer = Depacketizer::new(tracks, args.max_nal_bytes)
        .context("failed to create depacketizer")?;

    let mut decoder = OpusDecoderWrapper::new().context("failed to create decoder")?;
    let mut receiver = DatagramReceiver::new(args.port)
        .await
        .context("failed to create receiver")?;

    let video_sink = AnnexBSink::create(&args.video_out)?;
    let audio_sink = WavSink::create(&args.audio_out)?;

    info!("Ready to receive media...");

    receive_loop(
        &mut receiver,
        &mut depacketizer,
        &mut decoder,
        video_sink,
        audio_sink,
        &metrics,
    )
    .await?;

    let (datagrams, bytes) = receiver.stats();
    info!("Reception complete: {} datagrams, {} bytes", datagrams, bytes);

    Ok(())
}
