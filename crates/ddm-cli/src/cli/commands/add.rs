use anyhow::Result;
use ddm_core::manager::DownloadManager;

pub async fn run_add(
    manager: &DownloadManager,
    url: &str,
    path: &str,
    chunks: i64,
    workers: i64,
) -> Result<()> {
    let id = manager.add_download(url, path, chunks, workers).await?;
    println!("added download {id} ({url} -> {path})");
    Ok(())
}
