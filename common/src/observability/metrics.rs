//! Prometheus metrics (Rust `prometheus` crate).
//!
//! One `MetricsContext` is intended per process. Each binary owns its registry
//! and controls which metrics it reports.

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Configuration for the built-in Prometheus scrape endpoint.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    // ---
    /// Address to bind, e.g. `127.0.0.1:9100`.
    pub bind: SocketAddr,
}

impl MetricsServerConfig {
    // ---
    pub fn new(bind: SocketAddr) -> Self {
        // ---
        Self { bind }
    }
}

/// Prometheus metrics registry + handles.
///
/// This is a thin, explicit wrapper around the `prometheus` crate so hot-path
/// instrumentation is just counter increments / histogram observations.
#[derive(Clone)]
pub struct MetricsContext {
    // ---
    registry: Registry,

    // Datagram/record counters
    pub packets_received_total: IntCounter,
    pub records_sent_total: IntCounter,
    pub packets_malformed_total: IntCounter,
    pub packets_ignored_total: IntCounter,
    pub fragments_dropped_total: IntCounter,

    pub bytes_received_total: IntCounter,
    pub bytes_sent_total: IntCounter,

    // Frame counters per track
    pub frames_video_total: IntCounter,
    pub frames_audio_total: IntCounter,

    // Reassembly gauge
    pub reassembly_buffer_bytes: IntGauge,

    // Latency histograms (seconds)
    pub depacketize_seconds: Histogram,
    pub packetize_seconds: Histogram,
    pub opus_encode_seconds: Histogram,
    pub opus_decode_seconds: Histogram,
}

impl MetricsContext {
    // ---
    /// Create a new registry and register the standard metrics.
    ///
    /// `process_name` is applied as a constant label (`process=<name>`).
    pub fn new(process_name: &str) -> Result<Self> {
        // ---
        let registry = Registry::new_custom(
            Some("webrtc_media_bridge".into()),
            Some(prometheus::labels! { "process".to_string() => process_name.to_string() }),
        )?;

        let packets_received_total = IntCounter::with_opts(Opts::new(
            "rtp_packets_received_total",
            "Total RTP datagrams received",
        ))?;
        let records_sent_total = IntCounter::with_opts(Opts::new(
            "transport_records_sent_total",
            "Total transport records sent",
        ))?;
        let packets_malformed_total = IntCounter::with_opts(Opts::new(
            "rtp_packets_malformed_total",
            "Total packets dropped as malformed",
        ))?;
        let packets_ignored_total = IntCounter::with_opts(Opts::new(
            "rtp_packets_ignored_total",
            "Total packets skipped for an unmapped payload type",
        ))?;
        let fragments_dropped_total = IntCounter::with_opts(Opts::new(
            "nal_fragments_dropped_total",
            "Total NAL fragments dropped (out of order or oversized)",
        ))?;

        let bytes_received_total = IntCounter::with_opts(Opts::new(
            "bytes_received_total",
            "Total datagram bytes received",
        ))?;
        let bytes_sent_total =
            IntCounter::with_opts(Opts::new("bytes_sent_total", "Total record bytes sent"))?;

        let frames_video_total = IntCounter::with_opts(Opts::new(
            "frames_video_total",
            "Total video frames emitted or framed",
        ))?;
        let frames_audio_total = IntCounter::with_opts(Opts::new(
            "frames_audio_total",
            "Total audio frames emitted or framed",
        ))?;

        let reassembly_buffer_bytes = IntGauge::with_opts(Opts::new(
            "nal_reassembly_buffer_bytes",
            "Current bytes held in the fragmented-NAL reassembly buffer",
        ))?;

        let depacketize_seconds = Histogram::with_opts(HistogramOpts::new(
            "depacketize_seconds",
            "Time to depacketize one inbound datagram (seconds)",
        ))?;
        let packetize_seconds = Histogram::with_opts(HistogramOpts::new(
            "packetize_seconds",
            "Time to frame one outbound access unit (seconds)",
        ))?;
        let opus_encode_seconds = Histogram::with_opts(HistogramOpts::new(
            "opus_encode_seconds",
            "Opus encode duration in seconds",
        ))?;
        let opus_decode_seconds = Histogram::with_opts(HistogramOpts::new(
            "opus_decode_seconds",
            "Opus decode duration in seconds",
        ))?;

        // Register all metrics
        registry.register(Box::new(packets_received_total.clone()))?;
        registry.register(Box::new(records_sent_total.clone()))?;
        registry.register(Box::new(packets_malformed_total.clone()))?;
        registry.register(Box::new(packets_ignored_total.clone()))?;
        registry.register(Box::new(fragments_dropped_total.clone()))?;
        registry.register(Box::new(bytes_received_total.clone()))?;
        registry.register(Box::new(bytes_sent_total.clone()))?;
        registry.register(Box::new(frames_video_total.clone()))?;
        registry.register(Box::new(frames_audio_total.clone()))?;
        registry.register(Box::new(reassembly_buffer_bytes.clone()))?;
        registry.register(Box::new(depacketize_seconds.clone()))?;
        registry.register(Box::new(packetize_seconds.clone()))?;
        registry.register(Box::new(opus_encode_seconds.clone()))?;
        registry.register(Box::new(opus_decode_seconds.clone()))?;

        Ok(Self {
            registry,
            packets_received_total,
            records_sent_total,
            packets_malformed_total,
            packets_ignored_total,
            fragments_dropped_total,
            bytes_received_total,
            bytes_sent_total,
            frames_video_total,
            frames_audio_total,
            reassembly_buffer_bytes,
            depacketize_seconds,
            packetize_seconds,
            opus_encode_seconds,
            opus_decode_seconds,
        })
    }

    /// Gather metric families from this registry.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        // ---
        self.registry.gather()
    }

    /// Spawns a minimal HTTP server that serves `GET /metrics`.
    ///
    /// This is intentionally explicit (callers decide whether to run it).
    pub fn spawn_metrics_server(&self, cfg: MetricsServerConfig) -> JoinHandle<Result<()>> {
        // ---
        let registry = Arc::new(self.registry.clone());
        tokio::spawn(async move {
            // ---
            let make_svc = make_service_fn(move |_conn| {
                let registry = Arc::clone(&registry);
                async move {
                    Ok::<_, hyper::Error>(service_fn(move |req| {
                        let registry = Arc::clone(&registry);
                        async move { handle_metrics_request(req, registry).await }
                    }))
                }
            });

            let server = Server::bind(&cfg.bind).serve(make_svc);
            server.await.map_err(|e| anyhow::anyhow!(e))?;
            Ok(())
        })
    }
}

async fn handle_metrics_request(
    req: Request<Body>,
    registry: Arc<Registry>,
) -> Result<Response<Body>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let encoder = TextEncoder::new();
            let metric_families = registry.gather();
            let mut buffer = Vec::new();

            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                let mut resp = Response::new(Body::from(format!("encode error: {e}")));
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                return Ok(resp);
            }

            let mut resp = Response::new(Body::from(buffer));
            resp.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            Ok(resp)
        }
        _ => {
            let mut resp = Response::new(Body::from("not found"));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            Ok(resp)
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn metrics_context_gathers_something() {
        // ---
        let ctx = MetricsContext::new("test").expect("MetricsContext should init");
        let families = ctx.gather();
        assert!(!families.is_empty());
    }
}
