use anyhow::Result;
use ddm_core::manager::DownloadManager;
use ddm_core::{Event, State};

/// Loads every persisted download, starts the non-terminal ones, and prints
/// the event stream until every download reaches a terminal
/// state or the process is interrupted.
///
/// With `json = true`, each event is printed as one JSON line
/// (`{"topic":"chunkUpdate","payload":{...}}`) — this is the event stream a
/// real host (GUI, another process) would actually consume, rather than the
/// human-readable default.
pub async fn run_run(manager: &DownloadManager, json: bool) -> Result<()> {
    let mut events = manager.subscribe();
    manager.load_from_store().await?;

    if manager.all_downloads().await.is_empty() {
        println!("no downloads to run");
        return Ok(());
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(Event::ChunkUpdate(u)) if json => {
                        println!("{}", serde_json::to_string(&Event::ChunkUpdate(u))?);
                    }
                    Ok(Event::DownloadUpdate(u)) if json => {
                        println!("{}", serde_json::to_string(&Event::DownloadUpdate(u))?);
                    }
                    Ok(Event::ChunkUpdate(u)) => {
                        println!(
                            "chunk  download={} chunk={} written={}/{} state={:?}",
                            u.download_id, u.chunk_index, u.written, u.total_size, u.state
                        );
                    }
                    Ok(Event::DownloadUpdate(u)) => {
                        println!("download={} state={:?}", u.download_id, u.state);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event receiver lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("interrupted");
                break;
            }
        }

        let all_terminal = manager
            .all_downloads()
            .await
            .iter()
            .all(|d| matches!(d.state, State::Completed | State::Cancelled));
        if all_terminal {
            break;
        }
    }

    Ok(())
}
