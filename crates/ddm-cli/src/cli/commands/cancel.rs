use anyhow::Result;
use ddm_core::manager::DownloadManager;

pub async fn run_cancel(manager: &DownloadManager, id: i64) -> Result<()> {
    manager.cancel(id).await?;
    println!("cancelled download {id}");
    Ok(())
}
