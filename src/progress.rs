//! Transfer progress events and their fan-out to SSE subscribers.
//!
//! A single process-wide broadcast channel: every chunk written during a
//! transfer becomes one [`ProgressEvent`] delivered to all currently
//! connected progress streams. There is no buffering or replay — a stream
//! that connects after an event was emitted never sees it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::sftp::TransferDirection;

/// Subscribers slower than this many buffered events start losing them.
const CHANNEL_CAPACITY: usize = 256;

/// One per-chunk progress tick for a single file.
///
/// `percent` is computed per file, not across the whole tree: it resets to 0
/// at the start of every file within a multi-file transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub direction: TransferDirection,
    /// Remote path of the file currently moving.
    pub file: String,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub percent: u8,
}

impl ProgressEvent {
    pub fn new(direction: TransferDirection, file: &str, transferred: u64, total: u64) -> Self {
        Self {
            direction,
            file: file.to_string(),
            bytes_transferred: transferred,
            total_bytes: total,
            percent: percent(transferred, total),
        }
    }
}

/// Round `transferred / total` to a whole percentage, clamped to `[0, 100]`.
///
/// A zero-byte file is complete the moment it exists, so it reports 100.
pub fn percent(transferred: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (transferred as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Process-wide publish point for progress events.
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Push an event to every current subscriber. Emitting with no
    /// subscribers is not an error; the event is simply dropped.
    pub fn emit(&self, event: ProgressEvent) {
        trace!(file = %event.file, percent = event.percent, "progress");
        let _ = self.tx.send(event);
    }

    /// Register a new subscriber. Only events emitted after this call are
    /// delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_bounded_and_rounds() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(5, 10), 50);
        assert_eq!(percent(10, 10), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        // Clamped even if a caller over-reports.
        assert_eq!(percent(20, 10), 100);
    }

    #[test]
    fn zero_total_reports_complete() {
        assert_eq!(percent(0, 0), 100);
    }

    #[tokio::test]
    async fn fan_out_reaches_every_subscriber() {
        let broadcaster = ProgressBroadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        broadcaster.emit(ProgressEvent::new(
            TransferDirection::Upload,
            "/dst/a.txt",
            5,
            10,
        ));

        let got_a = a.recv().await.unwrap();
        let got_b = b.recv().await.unwrap();
        assert_eq!(got_a.percent, 50);
        assert_eq!(got_b.file, "/dst/a.txt");
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let broadcaster = ProgressBroadcaster::new();
        broadcaster.emit(ProgressEvent::new(
            TransferDirection::Download,
            "/src/x",
            1,
            1,
        ));

        let mut late = broadcaster.subscribe();
        broadcaster.emit(ProgressEvent::new(
            TransferDirection::Download,
            "/src/y",
            1,
            1,
        ));

        let got = late.recv().await.unwrap();
        assert_eq!(got.file, "/src/y");
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn event_wire_shape_is_stable() {
        let ev = ProgressEvent::new(TransferDirection::Upload, "/dst/a.txt", 3, 12);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "upload");
        assert_eq!(json["file"], "/dst/a.txt");
        assert_eq!(json["bytesTransferred"], 3);
        assert_eq!(json["totalBytes"], 12);
        assert_eq!(json["percent"], 25);
    }
}
