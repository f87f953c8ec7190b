//! Download Coordinator: the state machine and assembly routine for one
//! Download.

use crate::cancel::CancelToken;
use crate::error::DdmError;
use crate::event::{DownloadUpdate, ThrottledEmitter};
use crate::http::HttpClient;
use crate::model::State;
use crate::shared::SharedDownload;
use crate::store::Store;
use crate::worker::{run_worker, ChunkTask};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Owns one Download's lifecycle: Start/Pause/Resume/Cancel transitions and
/// the assembly step that follows the last chunk completing.
///
/// The Manager owns the Coordinator, not the other way around — a
/// Coordinator only ever touches its own `SharedDownload`, its own `Store`
/// handle, and the shared `EventSink` reached through `emitter`.
pub struct Coordinator {
    shared: Arc<SharedDownload>,
    store: Store,
    http: HttpClient,
    emitter: Arc<ThrottledEmitter>,
    cancel: AsyncMutex<CancelToken>,
}

impl Coordinator {
    pub fn new(
        shared: Arc<SharedDownload>,
        store: Store,
        http: HttpClient,
        emitter: Arc<ThrottledEmitter>,
    ) -> Self {
        Self {
            shared,
            store,
            http,
            emitter,
            cancel: AsyncMutex::new(CancelToken::new()),
        }
    }

    pub fn shared(&self) -> &Arc<SharedDownload> {
        &self.shared
    }

    /// `* -> Active`: Start or Resume. Refuses on a terminal
    /// download (idempotent error); no-op if a worker pool is already
    /// running for it (Resume-from-Active and concurrent-Start tie-break).
    ///
    /// `pause` only fires the cancellation token and returns — it doesn't
    /// wait for the worker pool to actually drain. So a `resume` landing
    /// right after a `pause` can reach here while the old pool is still
    /// mid-drain; waiting here for it to finish means `try_start` always
    /// sees an accurate `running` flag, instead of racing it and silently
    /// no-opping a resume that needed to actually restart the pool.
    pub async fn start(&self) -> Result<()> {
        if self.shared.download_state().is_terminal() {
            return Err(DdmError::AlreadyTerminal(self.shared.id).into());
        }
        self.shared.wait_until_stopped().await;
        if !self.shared.try_start() {
            return Ok(());
        }
        let result = self.run_to_completion().await;
        self.shared.mark_stopped();
        result
    }

    async fn run_to_completion(&self) -> Result<()> {
        let token = CancelToken::new();
        *self.cancel.lock().await = token.clone();

        self.shared.set_download_state(State::Active);
        self.persist_download_state(State::Active).await;
        self.emitter.emit_download_update(DownloadUpdate {
            download_id: self.shared.id,
            state: State::Active,
        });

        self.run_workers(token).await?;

        if self.shared.all_chunks_completed() {
            self.complete().await?;
        }
        Ok(())
    }

    /// Spawns `min(worker_count, chunk_count)` workers against a fresh
    /// bounded queue, enqueues every non-Completed chunk, closes the queue,
    /// and waits for every worker to drain it.
    async fn run_workers(&self, token: CancelToken) -> Result<()> {
        let chunk_count = self.shared.chunk_count();
        let worker_count = (self.shared.worker_count as usize).min(chunk_count).max(1);

        let (tx, rx) = tokio::sync::mpsc::channel::<ChunkTask>(worker_count);
        let rx = Arc::new(AsyncMutex::new(rx));

        let mut join_set = tokio::task::JoinSet::new();
        for _ in 0..worker_count {
            let queue = Arc::clone(&rx);
            let http = self.http.clone();
            let store = self.store.clone();
            let shared = Arc::clone(&self.shared);
            let emitter = Arc::clone(&self.emitter);
            let cancel = token.clone();
            join_set.spawn(run_worker(queue, http, store, shared, emitter, cancel));
        }

        for index in 0..chunk_count as i64 {
            if self.shared.chunk_state(index) == State::Completed {
                continue;
            }
            let chunk_id = self.shared.chunk_id(index);
            let (start_byte, end_byte) = self.shared.chunk_range(index);
            let task = ChunkTask {
                chunk_id,
                index,
                start_byte,
                end_byte,
            };
            if tx.send(task).await.is_err() {
                break;
            }
        }
        drop(tx);

        while let Some(res) = join_set.join_next().await {
            res.context("chunk worker task join")?;
        }
        Ok(())
    }

    /// `Active -> Paused`. No-op, no event, unless the download
    /// was actually `Active` beforehand.
    pub async fn pause(&self) -> Result<()> {
        if self.shared.download_state() != State::Active {
            return Ok(());
        }
        self.cancel.lock().await.cancel();
        self.shared.set_download_state(State::Paused);
        self.persist_download_state(State::Paused).await;
        self.emitter.emit_download_update(DownloadUpdate {
            download_id: self.shared.id,
            state: State::Paused,
        });
        Ok(())
    }

    /// `Paused -> Active`. No-op on an already-`Active` download.
    pub async fn resume(&self) -> Result<()> {
        self.start().await
    }

    /// `* -> Cancelled`: terminal. No-op success from `Completed`.
    /// Part files are intentionally left on disk.
    pub async fn cancel(&self) -> Result<()> {
        if self.shared.download_state() == State::Completed {
            return Ok(());
        }
        self.cancel.lock().await.cancel();
        self.shared.set_download_state(State::Cancelled);
        for index in 0..self.shared.chunk_count() as i64 {
            if self.shared.chunk_state(index) != State::Completed {
                self.shared.set_chunk_state(index, State::Cancelled);
            }
        }
        self.persist_download_state(State::Cancelled).await;
        self.emitter.emit_download_update(DownloadUpdate {
            download_id: self.shared.id,
            state: State::Cancelled,
        });
        Ok(())
    }

    async fn persist_download_state(&self, state: State) {
        let snapshot = self.shared.chunk_snapshot();
        if let Err(e) = self
            .store
            .update_download_state(self.shared.id, state, &snapshot)
            .await
        {
            tracing::warn!(download_id = self.shared.id, error = %e, "persistence failed for download state");
        }
    }

    /// Runs assembly and marks the Download Completed. The
    /// single place in the crate that decides "this download is done" —
    /// no other module recomputes that rule.
    async fn complete(&self) -> Result<()> {
        self.assemble().await?;
        self.shared.set_download_state(State::Completed);
        self.persist_download_state(State::Completed).await;
        self.emitter.emit_download_update(DownloadUpdate {
            download_id: self.shared.id,
            state: State::Completed,
        });
        Ok(())
    }

    async fn assemble(&self) -> Result<()> {
        let target_path = self.shared.target_path.clone();
        let chunk_count = self.shared.chunk_count();
        let parts: Vec<String> = (0..chunk_count as i64)
            .map(|i| self.shared.part_path(i))
            .collect();

        let download_id = self.shared.id;
        tokio::task::spawn_blocking(move || -> Result<()> {
            use std::io::Write;
            let mut target = std::fs::File::create(&target_path)
                .with_context(|| format!("create target file {}", target_path))?;
            for part in &parts {
                let mut part_file = std::fs::File::open(part)
                    .with_context(|| format!("open part file {}", part))?;
                std::io::copy(&mut part_file, &mut target)
                    .with_context(|| format!("append part file {}", part))?;
            }
            target.flush().ok();
            Ok(())
        })
        .await
        .context("assembly task join")?
        .map_err(|e| DdmError::AssemblyFailure {
            download_id,
            reason: e.to_string(),
        })?;

        for part in &parts {
            if let Err(e) = std::fs::remove_file(part) {
                tracing::warn!(path = %part, error = %e, "failed to delete part file after assembly");
            }
        }
        Ok(())
    }
}
