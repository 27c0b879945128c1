//! Persistence for consent records, directory data, channel configurations
//! and transmission audits.

mod snapshot;

pub use snapshot::{Snapshot, SnapshotStore};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
