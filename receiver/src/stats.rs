//! Statistics tracking for the inbound bridge path.
//!
//! Tracks datagram and frame counts, malformed/skipped packets, and
//! dropped fragments for observability and quality monitoring.

use std::time::{Duration, Instant};
use tracing::info;

/// Reception and depacketization statistics.
///
/// Designed to be logged periodically; all counters are per-process
/// totals since startup.
#[derive(Debug, Clone)]
pub struct ReceiverStats {
    // ---
    /// Total datagrams received
    pub packets_received: u64,

    /// Total packets dropped as malformed
    pub packets_malformed: u64,

    /// Total packets skipped for an unmapped payload type
    pub packets_ignored: u64,

    /// Total NAL fragments dropped (out of order or oversized)
    pub fragments_dropped: u64,

    /// Total video frames emitted
    pub frames_video: u64,

    /// Total audio frames emitted
    pub frames_audio: u64,

    /// Start time for rate calculations
    start_time: Instant,

    /// Last time stats were logged
    last_log_time: Instant,

    /// Interval between periodic logs
    log_interval: Duration,
}

impl ReceiverStats {
    // ---
    /// Creates a new stats tracker.
    ///
    /// # Arguments
    ///
    /// * `log_interval` - How often to automatically log stats
    pub fn new(log_interval: Duration) -> Self {
        // ---
        let now = Instant::now();
        Self {
            packets_received: 0,
            packets_malformed: 0,
            packets_ignored: 0,
            fragments_dropped: 0,
            frames_video: 0,
            frames_audio: 0,
            start_time: now,
            last_log_time: now,
            log_interval,
        }
    }

    /// Records one received datagram.
    pub fn record_packet(&mut self) {
        // ---
        self.packets_received += 1;
        self.maybe_log();
    }

    /// Records a packet dropped as malformed.
    pub fn record_malformed(&mut self) {
        // ---
        self.packets_malformed += 1;
    }

    /// Records a packet skipped for an unmapped payload type.
    pub fn record_ignored(&mut self) {
        // ---
        self.packets_ignored += 1;
    }

    /// Records a dropped NAL fragment.
    pub fn record_dropped_fragment(&mut self) {
        // ---
        self.fragments_dropped += 1;
    }

    /// Records an emitted video frame.
    pub fn record_video_frame(&mut self) {
        // ---
        self.frames_video += 1;
    }

    /// Records an emitted audio frame.
    pub fn record_audio_frame(&mut self) {
        // ---
        self.frames_audio += 1;
    }

    /// Calculates the malformed-packet percentage.
    pub fn malformed_percentage(&self) -> f64 {
        // ---
        if self.packets_received == 0 {
            0.0
        } else {
            (self.packets_malformed as f64 / self.packets_received as f64) * 100.0
        }
    }

    /// Calculates datagrams per second since startup.
    pub fn packets_per_second(&self) -> f64 {
        // ---
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.packets_received as f64 / elapsed
        }
    }

    /// Returns runtime duration.
    pub fn runtime(&self) -> Duration {
        // ---
        self.start_time.elapsed()
    }

    /// Logs statistics if interval has elapsed.
    fn maybe_log(&mut self) {
        // ---
        if self.last_log_time.elapsed() >= self.log_interval {
            self.log();
            self.last_log_time = Instant::now();
        }
    }

    /// Force log current statistics.
    pub fn log(&self) {
        // ---
        info!(
            "RX Stats: {} pkts ({:.2} pkt/s), {} video / {} audio frames, {:.2}% malformed, {} ignored, {} fragments dropped",
            self.packets_received,
            self.packets_per_second(),
            self.frames_video,
            self.frames_audio,
            self.malformed_percentage(),
            self.packets_ignored,
            self.fragments_dropped
        );
    }
}

impl Default for ReceiverStats {
    fn default() -> Self {
        // ---
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        // ---
        let mut stats = ReceiverStats::default();

        stats.record_packet();
        stats.record_packet();
        stats.record_video_frame();
        stats.record_audio_frame();
        stats.record_ignored();

        assert_eq!(stats.packets_received, 2);
        assert_eq!(stats.frames_video, 1);
        assert_eq!(stats.frames_audio, 1);
        assert_eq!(stats.packets_ignored, 1);
    }

    #[test]
    fn test_malformed_percentage() {
        // ---
        let mut stats = ReceiverStats::default();
        for _ in 0..4 {
            stats.record_packet();
        }
        stats.record_malformed();

        assert_eq!(stats.malformed_percentage(), 25.0);
    }

    #[test]
    fn test_percentage_with_no_packets() {
        // ---
        let stats = ReceiverStats::default();
        assert_eq!(stats.malformed_percentage(), 0.0);
    }

    #[test]
    fn test_fragment_drops() {
        // ---
        let mut stats = ReceiverStats::default();
        stats.record_dropped_fragment();
        stats.record_dropped_fragment();
        assert_eq!(stats.fragments_dropped, 2);
    }
}
