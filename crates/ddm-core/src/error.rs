//! Error taxonomy for the download engine.
//!
//! `DdmError` is the typed error used wherever a caller (the Manager, the
//! CLI) needs to match on the *kind* of failure rather than just log and
//! move on. Internal helper functions still return `anyhow::Result`;
//! `DdmError` sits at the seams where callers distinguish failure modes.

use thiserror::Error;

/// One entry per failure mode the engine distinguishes.
#[derive(Debug, Error)]
pub enum DdmError {
    /// `HEAD` returned non-200, had no `Content-Length`, or the transport failed.
    #[error("size discovery failed for {url}: {reason}")]
    SizeDiscoveryFailure { url: String, reason: String },

    /// A ranged `GET` returned an unexpected status or the transport failed.
    #[error("range fetch failed for download {download_id} chunk {chunk_index}: {reason}")]
    RangeFetchFailure {
        download_id: i64,
        chunk_index: i64,
        reason: String,
    },

    /// A local file create/write/seek failed.
    #[error("local I/O failed for download {download_id} chunk {chunk_index}: {source}")]
    LocalIOFailure {
        download_id: i64,
        chunk_index: i64,
        #[source]
        source: std::io::Error,
    },

    /// A Store write failed; in-memory state remains authoritative.
    #[error("persistence failed: {reason}")]
    PersistenceFailure { reason: String },

    /// Assembly (concatenating part files) failed after all chunks completed.
    #[error("assembly failed for download {download_id}: {reason}")]
    AssemblyFailure { download_id: i64, reason: String },

    /// Operation referenced an unknown download id.
    #[error("no such download: {0}")]
    NotFound(i64),

    /// Operation is not valid because the download is already in a terminal state.
    #[error("download {0} is already terminal")]
    AlreadyTerminal(i64),
}
