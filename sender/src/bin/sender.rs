//! WebRTC media bridge sender - CLI binary.
//!
//! Reads an H.264 bitstream and/or a WAV file, frames them as transport
//! records, and transmits via UDP to the transport collaborator.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use sender::{read_bitstream, read_wav, stream_audio, stream_video, OpusEncoderWrapper, RecordSender};
use webrtc_bridge_common::{init_tracing, ColorWhen, MetricsContext, MetricsServerConfig};

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

/// WebRTC media bridge sender - stream H.264/Opus as transport records
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    // ---
    /// Input H.264 bitstream (Annex-B, or AVCC with --extradata)
    #[arg(long)]
    video: Option<String>,

    /// avcC extradata file used to derive the AVCC length-prefix width
    #[arg(long)]
    extradata: Option<String>,

    /// Force the AVCC length-prefix width (1, 2, or 4)
    #[arg(long)]
    avcc_length_size: Option<usize>,

    /// Input audio file (WAV format)
    #[arg(long)]
    audio: Option<String>,

    /// Remote address (IP:port) to send to
    #[arg(short, long, default_value = "127.0.0.1:5004")]
    remote: String,

    /// Video frame rate used for pacing and timestamps
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Audio record transmission interval in milliseconds
    ///
    /// Default 20ms matches the Opus frame duration for real-time
    /// streaming.
    #[arg(short = 't', long, default_value = "20")]
    interval_ms: u64,

    /// Prometheus metrics bind address (serves `GET /metrics`).
    #[arg(long, default_value = "127.0.0.1:9100")]
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

    info!("Starting bridge sender v{VERSION}");
    info!("Remote address: {}", args.remote);
    info!("Metrics bind: {}", args.metrics_bind);

    if args.video.is_none() && args.audio.is_none() {
        anyhow::bail!("nothing to stream: pass --video and/or --audio");
    }

    let metrics = MetricsContext::new("sender")?;
    let metrics_bind = args.metrics_bind.parse().context("invalid metrics bind")?;
    let _metrics_task = metrics.spawn_metrics_server(MetricsServerConfig::new(metrics_bind));

    // Load inputs in blocking tasks
    let video_data = match args.video.clone() {
        Some(path) => {
            let extradata = args.extradata.clone();
            let forced = args.avcc_length_size;
            let video = tokio::task::spawn_blocking(move || {
                read_bitstream(path, extradata, forced)
            })
            .await
            .context("bitstream reading task failed")??;
            info!("Loaded video: {} NAL units", video.nal_count());
            Some(video)
        }
        None => None,
    };

    let audio_data = match args.audio.clone() {
        Some(path) => {
            let audio = tokio::task::spawn_blocking(move || read_wav(path))
                .await
                .context("audio reading task failed")??;
            info!(
                "Loaded {:.2}s of audio ({} frames)",
                audio.duration_secs(),
                audio.frame_count()
            );
            Some(audio)
        }
        None => None,
    };

    info!("Starting transmission...");

    let video_metrics = metrics.clone();
    let video_remote = args.remote.clone();
    let video_task = async {
        if let Some(video) = &video_data {
            let mut sender = RecordSender::new(video_remote.as_str())
                .await
                .context("failed to create video sender")?;
            stream_video(video, &mut sender, &video_metrics, args.fps).await?;

            let (records, bytes) = sender.stats();
            info!("Video transmission complete: {} records, {} bytes", records, bytes);
        }
        Ok::<_, anyhow::Error>(())
    };

    let audio_metrics = metrics.clone();
    let audio_remote = args.remote.clone();
    let audio_task = async {
        if let Some(audio) = &audio_data {
            let mut encoder = OpusEncoderWrapper::new().context("failed to create encoder")?;
            let mut sender = RecordSender::new(audio_remote.as_str())
                .await
                .context("failed to create audio sender")?;
            stream_audio(audio, &mut encoder, &mut sender, &audio_metrics, args.interval_ms)
                .await?;

            let (records, bytes) = sender.stats();
            info!("Audio transmission complete: {} records, {} bytes", records, bytes);
        }
        Ok::<_, anyhow::Error>(())
    };

    tokio::try_join!(video_task, audio_task)?;

    Ok(())
}
