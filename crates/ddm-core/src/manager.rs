//! Download Manager: the process-wide registry and the only
//! public entry point the Command Facade talks to.

use crate::chunker::plan_chunks;
use crate::config::DdmConfig;
use crate::coordinator::Coordinator;
use crate::error::DdmError;
use crate::event::EventSink;
use crate::http::HttpClient;
use crate::model::{Download, State};
use crate::shared::SharedDownload;
use crate::store::Store;
use crate::event::ThrottledEmitter;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct Registered {
    coordinator: Arc<Coordinator>,
}

/// Owns the Store, the shared `HttpClient`, the `EventSink`, and a
/// `download_id -> Coordinator` registry. All mutating
/// operations take the Manager lock for their whole duration —
/// they are not in the hot path, so this is never held across a chunk's
/// network I/O.
pub struct DownloadManager {
    store: Store,
    http: HttpClient,
    emitter: Arc<ThrottledEmitter>,
    registry: Mutex<HashMap<i64, Registered>>,
}

impl DownloadManager {
    pub fn new(store: Store, config: &DdmConfig) -> Self {
        let http = HttpClient::new(Duration::from_secs(config.read_timeout_secs));
        let emitter = Arc::new(ThrottledEmitter::new(
            EventSink::new(),
            Duration::from_millis(config.update_period_ms),
        ));
        Self {
            store,
            http,
            emitter,
            registry: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::event::Event> {
        self.emitter.subscribe()
    }

    /// `add_download`: dedups on `(url, path)`, otherwise HEADs the
    /// URL, plans chunk ranges, persists transactionally, and
    /// starts the download.
    pub async fn add_download(
        &self,
        url: &str,
        path: &str,
        chunk_count: i64,
        worker_count: i64,
    ) -> Result<i64> {
        let mut registry = self.registry.lock().await;

        if let Some(existing) = self.store.find_download(url, path).await? {
            if !existing.state.is_terminal() {
                let id = existing.id;
                if !registry.contains_key(&id) {
                    self.register(&mut registry, existing);
                }
                let coordinator = Arc::clone(&registry.get(&id).unwrap().coordinator);
                drop(registry);
                Self::spawn_start(coordinator);
                return Ok(id);
            }
            return Ok(existing.id);
        }

        let http = self.http.clone();
        let head_url = url.to_string();
        let head = tokio::task::spawn_blocking(move || http.head(&head_url))
            .await
            .map_err(|e| DdmError::SizeDiscoveryFailure {
                url: url.to_string(),
                reason: format!("probe task join: {e}"),
            })?
            .map_err(|e| DdmError::SizeDiscoveryFailure {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if head.status != 200 {
            return Err(DdmError::SizeDiscoveryFailure {
                url: url.to_string(),
                reason: format!("HEAD returned status {}", head.status),
            }
            .into());
        }
        if head.content_length <= 0 {
            return Err(DdmError::SizeDiscoveryFailure {
                url: url.to_string(),
                reason: "missing or non-positive Content-Length".to_string(),
            }
            .into());
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
                // Target directory is user-only.
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    std::fs::set_permissions(parent, perms).ok();
                }
            }
        }

        let planned = plan_chunks(head.content_length, chunk_count);
        let chunk_ranges: Vec<(i64, i64, i64)> = planned
            .iter()
            .map(|c| (c.start_byte, c.end_byte, c.index))
            .collect();

        let download_id = self
            .store
            .insert_download(
                url,
                path,
                head.content_length,
                &chunk_ranges,
                worker_count,
                State::Active,
            )
            .await?;

        let download = self
            .store
            .get_download(download_id)
            .await?
            .ok_or(DdmError::NotFound(download_id))?;

        let coordinator = self.register(&mut registry, download);
        drop(registry);
        Self::spawn_start(coordinator);
        Ok(download_id)
    }

    /// Snapshot of every registered download.
    pub async fn all_downloads(&self) -> Vec<Download> {
        self.store.list_all().await.unwrap_or_default()
    }

    /// `Active -> Paused`. Synchronous: Pause only fires the
    /// cancellation handle and persists the snapshot, it does not wait for
    /// in-flight workers to exit.
    pub async fn pause(&self, id: i64) -> Result<()> {
        let coordinator = self.coordinator_for(id).await?;
        coordinator.pause().await
    }

    /// `Paused -> Active`. Runs in the background: resuming a
    /// download re-enters the Start flow, which first waits out any worker
    /// pool still draining from a just-issued Pause, then blocks until every
    /// chunk is either Completed or the download is paused/cancelled again.
    pub async fn resume(&self, id: i64) -> Result<()> {
        let coordinator = self.coordinator_for(id).await?;
        Self::spawn_start(coordinator);
        Ok(())
    }

    pub async fn cancel(&self, id: i64) -> Result<()> {
        let coordinator = self.coordinator_for(id).await?;
        coordinator.cancel().await
    }

    /// Starts (or restarts) a registered download in the background.
    pub async fn start(&self, id: i64) -> Result<()> {
        let coordinator = self.coordinator_for(id).await?;
        Self::spawn_start(coordinator);
        Ok(())
    }

    /// Startup path: re-creates a Coordinator
    /// for every persisted download and auto-starts every non-terminal one,
    /// each running independently in the background.
    pub async fn load_from_store(&self) -> Result<()> {
        let downloads = self.store.list_all().await?;
        let mut registry = self.registry.lock().await;
        let mut to_start = Vec::new();
        for download in downloads {
            let non_terminal = !download.state.is_terminal();
            let coordinator = self.register(&mut registry, download);
            if non_terminal {
                to_start.push(coordinator);
            }
        }
        drop(registry);
        for coordinator in to_start {
            Self::spawn_start(coordinator);
        }
        Ok(())
    }

    async fn coordinator_for(&self, id: i64) -> Result<Arc<Coordinator>> {
        let registry = self.registry.lock().await;
        match registry.get(&id) {
            Some(r) => Ok(Arc::clone(&r.coordinator)),
            None => bail!(DdmError::NotFound(id)),
        }
    }

    fn spawn_start(coordinator: Arc<Coordinator>) {
        tokio::spawn(async move {
            if let Err(e) = coordinator.start().await {
                tracing::warn!(download_id = coordinator.shared().id, error = %e, "download run failed");
            }
        });
    }

    fn register(
        &self,
        registry: &mut HashMap<i64, Registered>,
        download: Download,
    ) -> Arc<Coordinator> {
        let id = download.id;
        let shared = Arc::new(SharedDownload::from_download(&download));
        let coordinator = Arc::new(Coordinator::new(
            shared,
            self.store.clone(),
            self.http.clone(),
            Arc::clone(&self.emitter),
        ));
        registry.insert(id, Registered { coordinator: Arc::clone(&coordinator) });
        coordinator
    }
}
