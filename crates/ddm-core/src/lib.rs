//! Persistent, resumable, multi-connection download engine.
//!
//! `DownloadManager` is the single entry point: it owns the
//! persistence store, the shared HTTP client, the event sink, and the
//! registry of per-download coordinators described across the rest of this
//! crate.

pub mod cancel;
pub mod chunker;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod http;
pub mod logging;
pub mod manager;
pub mod model;
mod shared;
pub mod store;
pub mod worker;

pub use config::DdmConfig;
pub use error::DdmError;
pub use event::{ChunkUpdate, DownloadUpdate, Event, EventSink};
pub use manager::DownloadManager;
pub use model::{Chunk, Download, State};
pub use store::Store;
