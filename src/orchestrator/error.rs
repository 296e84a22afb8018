//! Errors raised by the volume lifecycle orchestrator.

use thiserror::Error;

use crate::error::EbsError;

/// Errors raised while resolving, provisioning, or attaching a named volume.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OrchestratorError {
    /// Raised when more than one volume carries the requested name.
    #[error("more than one volume exists with the name {name} ({count} found)")]
    AmbiguousName {
        /// Value of the `Name` tag.
        name: String,
        /// Number of matching volumes.
        count: usize,
    },
    /// Raised when detaching a name that no volume carries.
    #[error("no volume exists with the name {name}")]
    NoVolumeNamed {
        /// Value of the `Name` tag.
        name: String,
    },
    /// Raised when a migration snapshot ends in the error state.
    #[error("snapshot {snapshot_id} failed")]
    SnapshotFailed {
        /// Identifier of the failed snapshot.
        snapshot_id: String,
    },
    /// Raised when a new volume ends in the error state.
    #[error("volume {volume_id} failed to provision")]
    VolumeFailed {
        /// Identifier of the failed volume.
        volume_id: String,
    },
    /// Raised when an underlying operation fails.
    #[error(transparent)]
    Ebs(#[from] EbsError),
}
