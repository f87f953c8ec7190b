//! Persistence Store: the two-table SQLite schema that is
//! the only durable state in the system.

use crate::model::{Chunk, Download, State};
use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

/// Handle to the SQLite-backed download database.
///
/// Database file is `downloads.db` in the working directory, a single
/// file that lives next to the process rather than under an XDG state dir.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Open (or create) the database at `downloads.db` in `dir` and migrate it.
    pub async fn open_in(dir: &std::path::Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await.ok();
        let db_path = dir.join("downloads.db");
        Self::open_at(&db_path).await
    }

    /// Open (or create) the database at an exact path and migrate it.
    pub async fn open_at(path: &std::path::Path) -> Result<Self> {
        let uri = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new().max_connections(8).connect(&uri).await?;
        let store = Store { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                path TEXT NOT NULL,
                size INTEGER NOT NULL,
                chunks INTEGER NOT NULL,
                workers INTEGER NOT NULL,
                state INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                download_id INTEGER NOT NULL REFERENCES downloads(id),
                chunk_index INTEGER NOT NULL,
                start_byte INTEGER NOT NULL,
                end_byte INTEGER NOT NULL,
                written INTEGER NOT NULL,
                state INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically inserts the download row and its chunk rows.
    pub async fn insert_download(
        &self,
        url: &str,
        path: &str,
        size: i64,
        chunks: &[(i64, i64, i64)], // (start_byte, end_byte, index)
        workers: i64,
        state: State,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let download_id = sqlx::query(
            r#"
            INSERT INTO downloads (url, path, size, chunks, workers, state)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(url)
        .bind(path)
        .bind(size)
        .bind(chunks.len() as i64)
        .bind(workers)
        .bind(state.as_i64())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (start_byte, end_byte, index) in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (download_id, chunk_index, start_byte, end_byte, written, state)
                VALUES (?1, ?2, ?3, ?4, 0, ?5)
                "#,
            )
            .bind(download_id)
            .bind(index)
            .bind(start_byte)
            .bind(end_byte)
            .bind(state.as_i64())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("commit insert_download")?;
        Ok(download_id)
    }

    /// Idempotent overwrite of a chunk's progress.
    pub async fn update_chunk(&self, chunk_id: i64, state: State, written: i64) -> Result<()> {
        sqlx::query("UPDATE chunks SET state = ?1, written = ?2 WHERE id = ?3")
            .bind(state.as_i64())
            .bind(written)
            .bind(chunk_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Sets the download's state and, in the same transaction, snapshots
    /// `(state, written)` onto every non-Completed chunk of that download —
    /// the "snapshot on pause/cancel" pathway.
    pub async fn update_download_state(
        &self,
        download_id: i64,
        state: State,
        chunk_written: &[(i64, i64)], // (chunk_id, written)
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE downloads SET state = ?1 WHERE id = ?2")
            .bind(state.as_i64())
            .bind(download_id)
            .execute(&mut *tx)
            .await?;

        for (chunk_id, written) in chunk_written {
            sqlx::query(
                "UPDATE chunks SET state = ?1, written = ?2 WHERE id = ?3 AND state != ?4",
            )
            .bind(state.as_i64())
            .bind(written)
            .bind(chunk_id)
            .bind(State::Completed.as_i64())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("commit update_download_state")?;
        Ok(())
    }

    /// Finds an existing download by `(url, path)`, with its chunks.
    pub async fn find_download(&self, url: &str, path: &str) -> Result<Option<Download>> {
        let row = sqlx::query(
            "SELECT id, url, path, size, chunks, workers, state FROM downloads WHERE url = ?1 AND path = ?2",
        )
        .bind(url)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.get("id");
        self.get_download(id).await
    }

    /// Fetches a single download (with its chunks) by id.
    pub async fn get_download(&self, id: i64) -> Result<Option<Download>> {
        let row = sqlx::query(
            "SELECT id, url, path, size, chunks, workers, state FROM downloads WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let chunks = self.chunks_for(id).await?;
        Ok(Some(row_to_download(row, chunks)))
    }

    /// Lists all downloads, each with their chunks, ordered by id.
    pub async fn list_all(&self) -> Result<Vec<Download>> {
        let rows = sqlx::query(
            "SELECT id, url, path, size, chunks, workers, state FROM downloads ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let chunks = self.chunks_for(id).await?;
            out.push(row_to_download(row, chunks));
        }
        Ok(out)
    }

    async fn chunks_for(&self, download_id: i64) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, download_id, chunk_index, start_byte, end_byte, written, state
            FROM chunks WHERE download_id = ?1 ORDER BY chunk_index
            "#,
        )
        .bind(download_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Chunk {
                id: row.get("id"),
                download_id: row.get("download_id"),
                index: row.get("chunk_index"),
                start_byte: row.get("start_byte"),
                end_byte: row.get("end_byte"),
                written: row.get("written"),
                state: State::from_i64(row.get("state")),
            })
            .collect())
    }
}

fn row_to_download(row: sqlx::sqlite::SqliteRow, chunks: Vec<Chunk>) -> Download {
    let completed_chunks = chunks.iter().filter(|c| c.state == State::Completed).count() as i64;
    Download {
        id: row.get("id"),
        url: row.get("url"),
        target_path: row.get("path"),
        total_size: row.get("size"),
        chunk_count: row.get("chunks"),
        worker_count: row.get("workers"),
        state: State::from_i64(row.get("state")),
        completed_chunks,
        chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_memory() -> Store {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Store { pool };
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn insert_and_fetch_roundtrip() {
        let store = open_memory().await;
        let id = store
            .insert_download(
                "https://example.com/x.bin",
                "/tmp/x.bin",
                1000,
                &[(0, 332, 0), (333, 665, 1), (666, 999, 2)],
                2,
                State::Active,
            )
            .await
            .unwrap();

        let download = store.get_download(id).await.unwrap().unwrap();
        assert_eq!(download.total_size, 1000);
        assert_eq!(download.chunks.len(), 3);
        assert_eq!(download.chunks[0].start_byte, 0);
        assert_eq!(download.chunks[2].end_byte, 999);
        assert_eq!(download.state, State::Active);
    }

    #[tokio::test]
    async fn find_download_matches_on_url_and_path() {
        let store = open_memory().await;
        store
            .insert_download("https://a/x", "/tmp/x", 10, &[(0, 9, 0)], 1, State::Active)
            .await
            .unwrap();

        assert!(store.find_download("https://a/x", "/tmp/x").await.unwrap().is_some());
        assert!(store.find_download("https://a/x", "/tmp/other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_chunk_is_idempotent_overwrite() {
        let store = open_memory().await;
        let id = store
            .insert_download("https://a/x", "/tmp/x", 10, &[(0, 9, 0)], 1, State::Active)
            .await
            .unwrap();
        let download = store.get_download(id).await.unwrap().unwrap();
        let chunk_id = download.chunks[0].id;

        store.update_chunk(chunk_id, State::Active, 5).await.unwrap();
        store.update_chunk(chunk_id, State::Completed, 10).await.unwrap();

        let download2 = store.get_download(id).await.unwrap().unwrap();
        assert_eq!(download2.chunks[0].written, 10);
        assert_eq!(download2.chunks[0].state, State::Completed);
    }

    #[tokio::test]
    async fn update_download_state_snapshots_non_completed_chunks_only() {
        let store = open_memory().await;
        let id = store
            .insert_download(
                "https://a/x",
                "/tmp/x",
                20,
                &[(0, 9, 0), (10, 19, 1)],
                2,
                State::Active,
            )
            .await
            .unwrap();
        let download = store.get_download(id).await.unwrap().unwrap();
        let c0 = download.chunks[0].id;
        let c1 = download.chunks[1].id;

        // Chunk 0 finishes; chunk 1 is half-way through.
        store.update_chunk(c0, State::Completed, 10).await.unwrap();
        store.update_chunk(c1, State::Active, 4).await.unwrap();

        store
            .update_download_state(id, State::Paused, &[(c0, 10), (c1, 4)])
            .await
            .unwrap();

        let after = store.get_download(id).await.unwrap().unwrap();
        assert_eq!(after.state, State::Paused);
        // Completed chunk is untouched by the snapshot.
        assert_eq!(after.chunks[0].state, State::Completed);
        assert_eq!(after.chunks[0].written, 10);
        // In-flight chunk is snapshotted to Paused.
        assert_eq!(after.chunks[1].state, State::Paused);
        assert_eq!(after.chunks[1].written, 4);
    }

    #[tokio::test]
    async fn list_all_orders_by_id() {
        let store = open_memory().await;
        store
            .insert_download("https://a/1", "/tmp/1", 10, &[(0, 9, 0)], 1, State::Active)
            .await
            .unwrap();
        store
            .insert_download("https://a/2", "/tmp/2", 10, &[(0, 9, 0)], 1, State::Active)
            .await
            .unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].id < all[1].id);
    }
}
