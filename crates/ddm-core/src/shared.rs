//! In-process, lock-guarded view of a single download.
//!
//! One `SharedDownload` is created per active download and handed to every
//! worker task plus the Coordinator that owns it. The lock ordering the rest
//! of the crate relies on (Manager lock -> Download lock -> event-throttle
//! lock) treats the `Mutex<Inner>` here as "the Download lock".

use crate::model::{Chunk, Download, State};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

struct ChunkState {
    id: i64,
    start_byte: i64,
    end_byte: i64,
    written: i64,
    state: State,
}

struct Inner {
    state: State,
    chunks: Vec<ChunkState>,
}

pub struct SharedDownload {
    pub id: i64,
    pub url: String,
    pub target_path: String,
    pub total_size: i64,
    pub worker_count: i64,
    inner: Mutex<Inner>,
    /// True while a Coordinator's worker pool is actually running for this
    /// download, independent of the persisted `state` column (a freshly
    /// inserted download is persisted `Active` before any worker has ever
    /// run). Distinguishes "Start a download whose state happens to be
    /// Active" from "Resume is a no-op on an already-running download"
    ///.
    running: AtomicBool,
    /// Notified every time `mark_stopped` flips `running` to false, so a
    /// `start`/`resume` racing an in-flight `pause`/`cancel` can wait out
    /// the drain instead of losing the `try_start` race silently.
    stopped: Notify,
}

impl SharedDownload {
    pub fn from_download(download: &Download) -> Self {
        let chunks = download
            .chunks
            .iter()
            .map(|c| ChunkState {
                id: c.id,
                start_byte: c.start_byte,
                end_byte: c.end_byte,
                written: c.written,
                state: c.state,
            })
            .collect();
        Self {
            id: download.id,
            url: download.url.clone(),
            target_path: download.target_path.clone(),
            total_size: download.total_size,
            worker_count: download.worker_count,
            inner: Mutex::new(Inner {
                state: download.state,
                chunks,
            }),
            running: AtomicBool::new(false),
            stopped: Notify::new(),
        }
    }

    /// Atomically claims the "running" flag. Returns `true` if this caller
    /// won the race and should proceed to spawn workers; `false` if another
    /// Start/Resume already has the download running (no-op tie-break).
    pub fn try_start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stopped.notify_waiters();
    }

    /// Returns immediately if no worker pool is running; otherwise blocks
    /// until the in-flight pool's `mark_stopped` call wakes it. A `start` or
    /// `resume` call uses this to wait out a still-draining prior run before
    /// racing it for the `running` flag, rather than calling `try_start` too
    /// early and silently losing that race.
    pub async fn wait_until_stopped(&self) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.stopped.notified();
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    pub fn part_path(&self, index: i64) -> String {
        format!("{}{}", self.target_path, Chunk::part_file_name(index))
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.lock().unwrap().chunks.len()
    }

    pub fn chunk_id(&self, index: i64) -> i64 {
        self.inner.lock().unwrap().chunks[index as usize].id
    }

    pub fn chunk_state(&self, index: i64) -> State {
        self.inner.lock().unwrap().chunks[index as usize].state
    }

    pub fn set_chunk_state(&self, index: i64, state: State) {
        self.inner.lock().unwrap().chunks[index as usize].state = state;
    }

    pub fn chunk_written(&self, index: i64) -> i64 {
        self.inner.lock().unwrap().chunks[index as usize].written
    }

    pub fn set_chunk_written(&self, index: i64, written: i64) {
        self.inner.lock().unwrap().chunks[index as usize].written = written;
    }

    pub fn download_state(&self) -> State {
        self.inner.lock().unwrap().state
    }

    pub fn set_download_state(&self, state: State) {
        self.inner.lock().unwrap().state = state;
    }

    /// True once every chunk is Completed. Evaluated under a single lock
    /// acquisition so a concurrent worker can't flip a chunk mid-check.
    pub fn all_chunks_completed(&self) -> bool {
        let guard = self.inner.lock().unwrap();
        !guard.chunks.is_empty() && guard.chunks.iter().all(|c| c.state == State::Completed)
    }

    /// `(chunk_id, written)` for every chunk, for the snapshot-on-pause/cancel
    /// persistence pathway.
    pub fn chunk_snapshot(&self) -> Vec<(i64, i64)> {
        let guard = self.inner.lock().unwrap();
        guard.chunks.iter().map(|c| (c.id, c.written)).collect()
    }

    pub fn chunk_range(&self, index: i64) -> (i64, i64) {
        let guard = self.inner.lock().unwrap();
        let c = &guard.chunks[index as usize];
        (c.start_byte, c.end_byte)
    }
}
