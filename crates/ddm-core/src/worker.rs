//! Chunk Worker and the per-chunk download routine.

use crate::cancel::{CancelToken, Cancelled};
use crate::error::DdmError;
use crate::event::{ChunkUpdate, ThrottledEmitter};
use crate::http::HttpClient;
use crate::model::State;
use crate::shared::SharedDownload;
use crate::store::Store;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

/// A single chunk to fetch, handed to a worker by the Coordinator's queue.
#[derive(Debug, Clone, Copy)]
pub struct ChunkTask {
    pub chunk_id: i64,
    pub index: i64,
    pub start_byte: i64,
    pub end_byte: i64,
}

/// Upper bound on how many bytes a single write+persist+emit cycle covers.
/// libcurl's write callback can hand back more than this in one call; when it
/// does, the chunk routine slices it so progress is still recorded at least
/// this often rather than in one lump at the end.
const BUFFER_SIZE: usize = 128 * 1024;

/// Long-lived task that drains chunk descriptors from the Coordinator's
/// bounded queue and runs the per-chunk routine for each, until the queue
/// closes and drains or cancellation fires.
pub async fn run_worker(
    queue: Arc<tokio::sync::Mutex<tokio::sync::mpsc::Receiver<ChunkTask>>>,
    http: HttpClient,
    store: Store,
    shared: Arc<SharedDownload>,
    emitter: Arc<ThrottledEmitter>,
    cancel: CancelToken,
) {
    loop {
        let task = {
            let mut guard = queue.lock().await;
            guard.recv().await
        };
        let Some(task) = task else {
            break;
        };
        if cancel.is_cancelled() {
            // Still must persist/emit the chunk's retreat to Paused so the
            // coordinator's join barrier sees a consistent chunk state.
            mark_chunk_paused(&store, &shared, &emitter, task).await;
            continue;
        }
        let result = download_chunk(&http, &store, &shared, &emitter, &cancel, task).await;
        if let Err(e) = result {
            if e.downcast_ref::<Cancelled>().is_some() {
                tracing::debug!(download_id = shared.id, chunk = task.index, "chunk paused by cancellation");
            } else {
                tracing::warn!(download_id = shared.id, chunk = task.index, error = %e, "chunk download failed");
            }
        }
    }
}

async fn mark_chunk_paused(
    store: &Store,
    shared: &Arc<SharedDownload>,
    emitter: &Arc<ThrottledEmitter>,
    task: ChunkTask,
) {
    let written = shared.chunk_written(task.index);
    shared.set_chunk_state(task.index, State::Paused);
    if let Err(e) = store.update_chunk(task.chunk_id, State::Paused, written).await {
        tracing::warn!(chunk_id = task.chunk_id, error = %e, "persistence failed for paused chunk");
    }
    emitter.emit_chunk_update(ChunkUpdate {
        download_id: shared.id,
        chunk_index: task.index,
        chunk_id: task.chunk_id,
        written,
        total_size: shared.total_size,
        state: State::Paused,
    });
}

/// The per-chunk download routine, executed entirely on one
/// worker. Blocking file and network I/O runs inside `spawn_blocking`; only
/// the bookkeeping (persist, emit, lock updates) happens on the async task.
async fn download_chunk(
    http: &HttpClient,
    store: &Store,
    shared: &Arc<SharedDownload>,
    emitter: &Arc<ThrottledEmitter>,
    cancel: &CancelToken,
    task: ChunkTask,
) -> Result<()> {
    if shared.chunk_state(task.index) == State::Completed {
        return Ok(());
    }

    let part_path = shared.part_path(task.index);
    let chunk_len = task.end_byte - task.start_byte + 1;

    // Reconcile in-memory progress with whatever survived a prior crash or
    // pause: the part file's length on disk, not in-memory state, is truth
    //.
    let on_disk_len = std::fs::metadata(&part_path).map(|m| m.len() as i64).unwrap_or(0);
    shared.set_chunk_written(task.index, on_disk_len);

    if on_disk_len >= chunk_len {
        return complete_chunk(store, shared, emitter, task).await;
    }

    let written_before = on_disk_len;
    let url = shared.url.clone();
    let range_start = task.start_byte + written_before;
    let range_end = task.end_byte;

    let http = http.clone();
    let store_for_blocking = store.clone();
    let emitter_for_blocking = Arc::clone(emitter);
    let cancel_for_blocking = cancel.clone();
    let shared_for_blocking = Arc::clone(shared);
    let index = task.index;
    let chunk_id = task.chunk_id;
    let total_size = shared.total_size;
    let runtime = tokio::runtime::Handle::current();

    let download_id = shared.id;
    let final_written = tokio::task::spawn_blocking(move || -> Result<i64> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&part_path)
            .map_err(|source| DdmError::LocalIOFailure {
                download_id,
                chunk_index: index,
                source,
            })?;
        file.seek(SeekFrom::End(0)).map_err(|source| DdmError::LocalIOFailure {
            download_id,
            chunk_index: index,
            source,
        })?;

        let mut written = written_before;

        // Every read, however small, is written, persisted, and emitted
        // before the next one starts — a read is never held in memory
        // across a cancellation check. A single callback invocation can
        // carry more than BUFFER_SIZE bytes; those are sliced so no single
        // write+persist+emit cycle covers more than that much.
        let range_result = http.get_range(&url, range_start, range_end, |data| {
            for slice in data.chunks(BUFFER_SIZE) {
                if cancel_for_blocking.is_cancelled() {
                    anyhow::bail!(Cancelled);
                }
                file.write_all(slice).map_err(|source| DdmError::LocalIOFailure {
                    download_id,
                    chunk_index: index,
                    source,
                })?;
                written += slice.len() as i64;
                shared_for_blocking.set_chunk_written(index, written);
                if let Err(e) = runtime.block_on(store_for_blocking.update_chunk(chunk_id, State::Active, written)) {
                    tracing::warn!(chunk_id, error = %e, "persistence failed for chunk progress");
                }
                emitter_for_blocking.emit_chunk_update(ChunkUpdate {
                    download_id,
                    chunk_index: index,
                    chunk_id,
                    written,
                    total_size,
                    state: State::Active,
                });
            }
            Ok(())
        });

        match range_result {
            Ok(_) => {}
            Err(e) if e.downcast_ref::<Cancelled>().is_some() => return Err(e),
            Err(e) => {
                return Err(DdmError::RangeFetchFailure {
                    download_id,
                    chunk_index: index,
                    reason: e.to_string(),
                }
                .into())
            }
        }

        file.flush().ok();
        Ok(written)
    })
    .await
    .context("chunk download task join")?;

    match final_written {
        Ok(written) => {
            shared.set_chunk_written(task.index, written);
            if written >= chunk_len {
                complete_chunk(store, shared, emitter, task).await
            } else {
                Ok(())
            }
        }
        Err(e) => {
            if e.downcast_ref::<Cancelled>().is_some() {
                mark_chunk_paused(store, shared, emitter, task).await;
                Err(e)
            } else {
                // RangeFetchFailure / LocalIOFailure: chunk stays in its last
                // persisted partial state so a subsequent Resume retries it.
                Err(e)
            }
        }
    }
}

async fn complete_chunk(
    store: &Store,
    shared: &Arc<SharedDownload>,
    emitter: &Arc<ThrottledEmitter>,
    task: ChunkTask,
) -> Result<()> {
    shared.set_chunk_state(task.index, State::Completed);
    if let Err(e) = store.update_chunk(task.chunk_id, State::Completed, task.end_byte - task.start_byte + 1).await {
        tracing::warn!(chunk_id = task.chunk_id, error = %e, "persistence failed for completed chunk");
    }
    emitter.emit_chunk_update(ChunkUpdate {
        download_id: shared.id,
        chunk_index: task.index,
        chunk_id: task.chunk_id,
        written: task.end_byte - task.start_byte + 1,
        total_size: shared.total_size,
        state: State::Completed,
    });
    Ok(())
}
