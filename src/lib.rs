//! Client and orchestration layer for EBS volumes over the EC2 Query API.
//!
//! The crate is layered leaf-first: a signed request [`gateway`], an XML
//! [`codec`], typed operations in [`ebs`], the pure [`device`] allocator, and
//! the [`orchestrator`] that makes sure a named volume ends up attached to an
//! instance, migrating it across availability zones through a snapshot when
//! required.

pub mod codec;
pub mod config;
pub mod device;
pub mod ebs;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod test_support;
pub mod wait;

pub use codec::{
    Action, Address, Attachment, AttachmentStatus, DeviceMapping, Snapshot, SnapshotStatus,
    TagItem, Volume, VolumeStatus,
};
pub use config::{ConfigError, ConfiguredSigner, EbsConfig};
pub use device::next_device_path;
pub use ebs::{CreateVolumeRequest, EbsClient, VolumeType};
pub use error::EbsError;
pub use gateway::{
    Gateway, Params, RequestSigner, ReqwestTransport, SigV4Signer, SignedRequester, Transport,
    UnsignedRequests,
};
pub use orchestrator::{
    AttachOutcome, AttachRequest, OrchestratorError, Resolution, VolumeOrchestrator,
};
pub use wait::PollSettings;
