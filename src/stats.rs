//! Stats tracker: per-direction byte/frame totals plus a 5-second rolling
//! window, logged periodically (spec §4.3.4).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::session::SessionRegistry;

const WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    bytes_in: u64,
    bytes_out: u64,
    frames: u64,
    /// Wire-size of the frame itself (not fanned out across viewers), paired
    /// with `bytes_in` to compute the *instantaneous* compression ratio.
    compressed_bytes: u64,
}

/// Tracks cumulative and rolling-window byte/frame counts for one direction
/// class (in = runner->relay, out = relay->viewers).
#[derive(Debug)]
pub struct Stats {
    window: VecDeque<Sample>,
    total_bytes_in: u64,
    total_bytes_out: u64,
    total_frames: u64,
    compressed_bytes_out: u64,
    uncompressed_bytes_out: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            window: VecDeque::new(),
            total_bytes_in: 0,
            total_bytes_out: 0,
            total_frames: 0,
            compressed_bytes_out: 0,
            uncompressed_bytes_out: 0,
        }
    }
}

impl Stats {
    /// Record one runner->relay frame and its fan-out to `viewer_count`
    /// viewers. `uncompressed_len` is the size fed to the framebuffer;
    /// `wire_len` is the size actually sent over the wire per viewer.
    pub fn record_frame(&mut self, wire_len: usize, uncompressed_len: usize, viewer_count: usize) {
        let now = Instant::now();
        self.prune(now);

        let bytes_in = uncompressed_len as u64;
        let bytes_out = (wire_len as u64) * viewer_count as u64;

        self.total_bytes_in += bytes_in;
        self.total_bytes_out += bytes_out;
        self.total_frames += 1;
        self.compressed_bytes_out += wire_len as u64;
        self.uncompressed_bytes_out += uncompressed_len as u64;

        self.window.push_back(Sample {
            at: now,
            bytes_in,
            bytes_out,
            frames: 1,
            compressed_bytes: wire_len as u64,
        });
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.duration_since(front.at) > WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Recent (rolling-window) byte in/out rate and fps, plus lifetime
    /// totals and compression ratio, for the periodic log line.
    pub fn snapshot(&mut self) -> StatsSnapshot {
        self.prune(Instant::now());
        let window_secs = WINDOW.as_secs_f64().max(0.001);
        let (recent_in, recent_out, recent_frames, recent_compressed) =
            self.window.iter().fold((0u64, 0u64, 0u64, 0u64), |acc, s| {
                (acc.0 + s.bytes_in, acc.1 + s.bytes_out, acc.2 + s.frames, acc.3 + s.compressed_bytes)
            });

        let lifetime_ratio = if self.uncompressed_bytes_out == 0 {
            1.0
        } else {
            self.compressed_bytes_out as f64 / self.uncompressed_bytes_out as f64
        };
        let instantaneous_ratio = if recent_in == 0 { 1.0 } else { recent_compressed as f64 / recent_in as f64 };

        StatsSnapshot {
            recent_bytes_in_per_sec: recent_in as f64 / window_secs,
            recent_bytes_out_per_sec: recent_out as f64 / window_secs,
            recent_fps: recent_frames as f64 / window_secs,
            instantaneous_compression_ratio: instantaneous_ratio,
            lifetime_compression_ratio: lifetime_ratio,
            total_bytes_in: self.total_bytes_in,
            total_bytes_out: self.total_bytes_out,
        }
    }
}

/// A point-in-time view of [`Stats`] suitable for logging.
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub recent_bytes_in_per_sec: f64,
    pub recent_bytes_out_per_sec: f64,
    pub recent_fps: f64,
    /// Compression ratio over just the rolling window (spec §4.3.4).
    pub instantaneous_compression_ratio: f64,
    pub lifetime_compression_ratio: f64,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
}

/// Log the periodic stats line: sessions, viewers, recent rates, compression
/// ratio, and cumulative bytes.
pub fn log_periodic(registry: &SessionRegistry, stats: &mut Stats) {
    let snapshot = stats.snapshot();
    let session_count = registry.len();
    let viewer_count = registry.total_viewer_count();

    log::info!(
        "stats sessions={session_count} viewers={viewer_count} \
         in={in_rate:.0}B/s out={out_rate:.0}B/s fps={fps:.1} \
         ratio={ratio:.3} lifetime_ratio={lifetime_ratio:.3} \
         total_in={total_in}B total_out={total_out}B",
        in_rate = snapshot.recent_bytes_in_per_sec,
        out_rate = snapshot.recent_bytes_out_per_sec,
        fps = snapshot.recent_fps,
        ratio = snapshot.instantaneous_compression_ratio,
        lifetime_ratio = snapshot.lifetime_compression_ratio,
        total_in = snapshot.total_bytes_in,
        total_out = snapshot.total_bytes_out,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_have_zero_totals() {
        let mut stats = Stats::default();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_bytes_in, 0);
        assert_eq!(snapshot.total_bytes_out, 0);
        assert_eq!(snapshot.lifetime_compression_ratio, 1.0);
        assert_eq!(snapshot.instantaneous_compression_ratio, 1.0);
    }

    #[test]
    fn record_frame_accumulates_totals_and_fans_out_bytes_out() {
        let mut stats = Stats::default();
        stats.record_frame(10, 20, 3);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_bytes_in, 20);
        assert_eq!(snapshot.total_bytes_out, 30);
        assert!(snapshot.recent_fps > 0.0);
    }

    #[test]
    fn compression_ratio_reflects_wire_vs_uncompressed_size() {
        let mut stats = Stats::default();
        stats.record_frame(5, 20, 1);
        let snapshot = stats.snapshot();
        assert!((snapshot.lifetime_compression_ratio - 0.25).abs() < 1e-9);
    }

    #[test]
    fn instantaneous_ratio_tracks_only_the_rolling_window() {
        let mut stats = Stats::default();
        stats.record_frame(5, 20, 1);
        stats.record_frame(10, 20, 1);
        let snapshot = stats.snapshot();
        // (5 + 10) compressed / (20 + 20) uncompressed, both still in the window.
        assert!((snapshot.instantaneous_compression_ratio - 0.375).abs() < 1e-9);
    }
}
