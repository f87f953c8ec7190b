use anyhow::Result;
use ddm_core::manager::DownloadManager;

pub async fn run_list(manager: &DownloadManager) -> Result<()> {
    let downloads = manager.all_downloads().await;
    if downloads.is_empty() {
        println!("no downloads");
        return Ok(());
    }
    for d in downloads {
        println!(
            "{:>4}  {:<9?}  {:>3}/{:<3} chunks  {:>10} bytes  {}",
            d.id,
            d.state,
            d.completed_chunks,
            d.chunk_count,
            d.total_size,
            d.url
        );
    }
    Ok(())
}
