//! Event Sink: push channel to external observers,
//! rate-limited per download for `ChunkUpdate`.

use crate::model::State;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Per-chunk progress update, emitted at most once per `UPDATE_PERIOD` per
/// download across all of its chunks.
///
/// Field names are `camelCase` on the wire to match the literal
/// JSON payload shape (`{ downloadId, chunkIndex, chunkId, written, size, state }`)
/// for any host that serializes the event stream, such as `ddm run --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUpdate {
    pub download_id: i64,
    pub chunk_index: i64,
    pub chunk_id: i64,
    pub written: i64,
    #[serde(rename = "size")]
    pub total_size: i64,
    pub state: State,
}

/// Download-level state transition, emitted immediately and unthrottled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUpdate {
    pub download_id: i64,
    pub state: State,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "topic", content = "payload")]
pub enum Event {
    #[serde(rename = "chunkUpdate")]
    ChunkUpdate(ChunkUpdate),
    #[serde(rename = "downloadUpdate")]
    DownloadUpdate(DownloadUpdate),
}

/// Fire-and-forget broadcast channel. Multiple observers (the CLI's own
/// status printer, a future GUI) can each `subscribe()` independently.
/// A send with no subscribers is a harmless no-op: delivery is best-effort,
/// with no back-acknowledgement from observers.
#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<Event>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps an [`EventSink`] with the per-download `ChunkUpdate` throttle.
/// `DownloadUpdate` always bypasses the throttle — state transitions are
/// emitted immediately, and only when state actually changed (enforced by
/// the Coordinator, not here).
pub struct ThrottledEmitter {
    sink: EventSink,
    update_period: Duration,
    last_emit: Mutex<HashMap<i64, Instant>>,
}

impl ThrottledEmitter {
    pub fn new(sink: EventSink, update_period: Duration) -> Self {
        Self {
            sink,
            update_period,
            last_emit: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sink.subscribe()
    }

    /// Emit a `ChunkUpdate` only if `update_period` has elapsed since the
    /// last emitted `ChunkUpdate` for this download. Returns
    /// whether it was actually sent, mostly useful for tests.
    pub fn emit_chunk_update(&self, update: ChunkUpdate) -> bool {
        let now = Instant::now();
        let mut guard = self.last_emit.lock().unwrap();
        let should_emit = match guard.get(&update.download_id) {
            Some(last) => now.duration_since(*last) >= self.update_period,
            None => true,
        };
        if should_emit {
            guard.insert(update.download_id, now);
            drop(guard);
            self.sink.send(Event::ChunkUpdate(update));
        }
        should_emit
    }

    /// Download-state transitions bypass the throttle entirely.
    pub fn emit_download_update(&self, update: DownloadUpdate) {
        self.sink.send(Event::DownloadUpdate(update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_update_json_matches_wire_shape() {
        let event = Event::ChunkUpdate(ChunkUpdate {
            download_id: 1,
            chunk_index: 2,
            chunk_id: 7,
            written: 50,
            total_size: 100,
            state: State::Active,
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], "chunkUpdate");
        assert_eq!(json["payload"]["downloadId"], 1);
        assert_eq!(json["payload"]["chunkIndex"], 2);
        assert_eq!(json["payload"]["chunkId"], 7);
        assert_eq!(json["payload"]["written"], 50);
        assert_eq!(json["payload"]["size"], 100);
        assert_eq!(json["payload"]["state"], 0);
    }

    #[test]
    fn download_update_json_matches_wire_shape() {
        let event = Event::DownloadUpdate(DownloadUpdate {
            download_id: 9,
            state: State::Completed,
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], "downloadUpdate");
        assert_eq!(json["payload"]["downloadId"], 9);
        assert_eq!(json["payload"]["state"], 3);
    }

    fn chunk_update(download_id: i64) -> ChunkUpdate {
        ChunkUpdate {
            download_id,
            chunk_index: 0,
            chunk_id: 1,
            written: 10,
            total_size: 100,
            state: State::Active,
        }
    }

    #[test]
    fn first_chunk_update_always_emits() {
        let emitter = ThrottledEmitter::new(EventSink::new(), Duration::from_millis(200));
        assert!(emitter.emit_chunk_update(chunk_update(1)));
    }

    #[test]
    fn rapid_updates_within_period_are_dropped() {
        let emitter = ThrottledEmitter::new(EventSink::new(), Duration::from_millis(200));
        assert!(emitter.emit_chunk_update(chunk_update(1)));
        assert!(!emitter.emit_chunk_update(chunk_update(1)));
        assert!(!emitter.emit_chunk_update(chunk_update(1)));
    }

    #[test]
    fn throttle_is_per_download() {
        let emitter = ThrottledEmitter::new(EventSink::new(), Duration::from_millis(200));
        assert!(emitter.emit_chunk_update(chunk_update(1)));
        assert!(emitter.emit_chunk_update(chunk_update(2)));
    }

    #[test]
    fn update_after_period_elapses_emits_again() {
        let emitter = ThrottledEmitter::new(EventSink::new(), Duration::from_millis(10));
        assert!(emitter.emit_chunk_update(chunk_update(1)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(emitter.emit_chunk_update(chunk_update(1)));
    }

    #[tokio::test]
    async fn download_update_is_never_throttled_and_is_observable() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        let emitter = ThrottledEmitter::new(sink, Duration::from_secs(60));
        emitter.emit_download_update(DownloadUpdate {
            download_id: 1,
            state: State::Active,
        });
        emitter.emit_download_update(DownloadUpdate {
            download_id: 1,
            state: State::Completed,
        });
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, Event::DownloadUpdate(_)));
        assert!(matches!(second, Event::DownloadUpdate(_)));
    }
}
