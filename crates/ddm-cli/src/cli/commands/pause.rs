use anyhow::Result;
use ddm_core::manager::DownloadManager;

pub async fn run_pause(manager: &DownloadManager, id: i64) -> Result<()> {
    manager.pause(id).await?;
    println!("paused download {id}");
    Ok(())
}
