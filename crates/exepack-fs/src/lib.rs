//! Filesystem layer of the exchange pipeline.
//!
//! - `storage.rs` - Storage backend trait and the local directory backend
//! - `workspace.rs` - Disposable per-run session workspaces
//! - `primitives/` - Atomic write and recursive copy

mod error;
pub mod primitives;
pub mod storage;
pub mod workspace;

pub use error::{Error, Result};
pub use primitives::{AtomicWriteOptions, atomic_write, copy_dir_all};
pub use storage::{LocalStorage, Storage, StorageEntry, StorageKind, copy_tree};
pub use workspace::{Area, SessionWorkspace};
