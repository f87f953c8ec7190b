use anyhow::Result;
use ddm_core::manager::DownloadManager;

pub async fn run_resume(manager: &DownloadManager, id: i64) -> Result<()> {
    manager.resume(id).await?;
    println!("resumed download {id}");
    Ok(())
}
