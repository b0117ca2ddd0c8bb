//! In-memory multi-session conversation memory for Parley.
//!
//! [`MemoryManager`] is the entry point: it resolves or creates sessions,
//! appends messages, renders history views, and mirrors every mutation to a
//! best-effort [`CheckpointMirror`]. [`Reclaimer`] evicts idle sessions in the
//! background until its cancellation token fires.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod manager;
pub mod reclaim;
pub mod store;
pub mod types;

pub use checkpoint::{
    CheckpointMirror, CheckpointSaver, FileMirror, MemorySaver, NoopMirror, SaverSignature,
    VersionedMirror,
};
pub use config::MemoryConfig;
pub use error::CheckpointError;
pub use manager::MemoryManager;
pub use reclaim::Reclaimer;
pub use store::SessionStore;
pub use types::{MemoryStats, SessionRecord, SessionSummary};
