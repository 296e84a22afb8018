//! Ensures a named volume is attached to an instance.
//!
//! One invocation resolves the volume by its `Name` tag and then reuses it,
//! migrates it to the instance's zone through a snapshot, or creates it,
//! before attaching it under a free device path. Every wait is bounded by
//! [`PollSettings`]; nothing is rolled back on failure except the
//! best-effort deletion of a migrated volume.

mod error;

use crate::codec::{AttachmentStatus, SnapshotStatus, TagItem, Volume, VolumeStatus};
use crate::ebs::{CreateVolumeRequest, EbsClient};
use crate::error::EbsError;
use crate::gateway::SignedRequester;
use crate::wait::{PollSettings, poll_until};

pub use error::OrchestratorError;

/// Description given to snapshots taken to move a volume between zones.
pub const MIGRATION_SNAPSHOT_DESCRIPTION: &str = "migrate_zone";

/// Default size of a newly created volume, in GiB.
pub const DEFAULT_VOLUME_SIZE_GIB: u32 = 10;

/// Inputs for [`VolumeOrchestrator::attach`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachRequest {
    /// Value of the `Name` tag identifying the volume.
    pub name: String,
    /// Instance that should end up holding the volume.
    pub instance_id: String,
    /// Availability zone of the instance.
    pub availability_zone: String,
    /// Size used when a volume has to be created.
    pub size_gib: u32,
    /// Requests SSD storage for new volumes.
    pub ssd: bool,
    /// Provisioned IOPS for new volumes; zero disables provisioning.
    pub provisioned_iops: u32,
    /// Snapshot to seed a brand new volume from.
    pub snapshot_id: Option<String>,
}

impl AttachRequest {
    /// Creates a request with default sizing, trimming string fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        instance_id: impl Into<String>,
        availability_zone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_owned(),
            instance_id: instance_id.into().trim().to_owned(),
            availability_zone: availability_zone.into().trim().to_owned(),
            size_gib: DEFAULT_VOLUME_SIZE_GIB,
            ssd: false,
            provisioned_iops: 0,
            snapshot_id: None,
        }
    }

    /// Sets the size used for new volumes.
    #[must_use]
    pub const fn size_gib(mut self, value: u32) -> Self {
        self.size_gib = value;
        self
    }

    /// Sets the SSD flag.
    #[must_use]
    pub const fn ssd(mut self, value: bool) -> Self {
        self.ssd = value;
        self
    }

    /// Sets the provisioned IOPS.
    #[must_use]
    pub const fn provisioned_iops(mut self, value: u32) -> Self {
        self.provisioned_iops = value;
        self
    }

    /// Sets the seed snapshot; blank identifiers are ignored.
    #[must_use]
    pub fn snapshot_id(mut self, value: Option<String>) -> Self {
        self.snapshot_id = value
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());
        self
    }

    /// Checks the request before any remote call is made.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::Validation`] when a required field is blank or
    /// the volume options are inconsistent.
    pub fn validate(&self) -> Result<(), EbsError> {
        for (field, value) in [
            ("volume name", &self.name),
            ("instance id", &self.instance_id),
            ("availability zone", &self.availability_zone),
        ] {
            if value.is_empty() {
                return Err(EbsError::Validation(format!("{field} must not be empty")));
            }
        }
        self.volume_request(self.snapshot_id.clone()).validate()?;
        Ok(())
    }

    fn volume_request(&self, snapshot_id: Option<String>) -> CreateVolumeRequest {
        CreateVolumeRequest::new(self.size_gib, self.availability_zone.as_str())
            .ssd(self.ssd)
            .provisioned_iops(self.provisioned_iops)
            .snapshot_id(snapshot_id)
            .tags(vec![TagItem::name(self.name.as_str())])
    }
}

/// How the attached volume was obtained.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// An existing volume in the instance's zone was used.
    Reused,
    /// The volume was copied from another zone through a snapshot.
    Migrated {
        /// Snapshot the new volume was restored from.
        snapshot_id: String,
    },
    /// No volume carried the name, so a new one was created.
    Created,
}

/// Result of a successful [`VolumeOrchestrator::attach`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachOutcome {
    /// Identifier of the attached volume.
    pub volume_id: String,
    /// Device path on the instance.
    pub device: String,
    /// How the volume was obtained.
    pub resolution: Resolution,
}

/// Drives the resolve, migrate or create, and attach workflow.
#[derive(Clone, Debug)]
pub struct VolumeOrchestrator<R> {
    client: EbsClient<R>,
    poll: PollSettings,
}

impl<R> VolumeOrchestrator<R>
where
    R: SignedRequester + 'static,
{
    /// Creates an orchestrator with the default polling settings.
    #[must_use]
    pub fn new(client: EbsClient<R>) -> Self {
        Self {
            client,
            poll: PollSettings::default(),
        }
    }

    /// Overrides the polling interval and timeout.
    #[must_use]
    pub const fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Returns the client used for remote operations.
    #[must_use]
    pub const fn client(&self) -> &EbsClient<R> {
        &self.client
    }

    /// Makes sure the volume named in `request` is attached to its instance.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::AmbiguousName`] when several volumes
    /// share the name, [`OrchestratorError::SnapshotFailed`] or
    /// [`OrchestratorError::VolumeFailed`] when provisioning ends in error,
    /// and [`OrchestratorError::Ebs`] for validation, timeouts, and remote
    /// failures.
    pub async fn attach(&self, request: &AttachRequest) -> Result<AttachOutcome, OrchestratorError> {
        request.validate()?;

        let mut matches = self
            .client
            .volumes_by_tags(&[TagItem::name(request.name.as_str())])
            .await?;
        if matches.len() > 1 {
            return Err(OrchestratorError::AmbiguousName {
                name: request.name.clone(),
                count: matches.len(),
            });
        }

        let (volume, resolution) = match matches.pop() {
            Some(existing) if existing.availability_zone == request.availability_zone => {
                tracing::info!(volume_id = %existing.id, "reusing volume from the same zone");
                (existing, Resolution::Reused)
            }
            Some(existing) => {
                let snapshot_id = self.migrate(&existing, request).await?;
                let created = self
                    .create_and_wait(request, Some(snapshot_id.clone()))
                    .await?;
                (created, Resolution::Migrated { snapshot_id })
            }
            None => {
                let created = self
                    .create_and_wait(request, request.snapshot_id.clone())
                    .await?;
                (created, Resolution::Created)
            }
        };

        if let Some(attachment) = volume.attachment_to(&request.instance_id) {
            tracing::info!(
                volume_id = %volume.id,
                device = %attachment.device,
                "volume already attached to this instance"
            );
            return Ok(AttachOutcome {
                device: attachment.device.clone(),
                volume_id: volume.id,
                resolution,
            });
        }

        let device = self
            .client
            .attach_volume(&volume.id, &request.instance_id)
            .await?;
        Ok(AttachOutcome {
            volume_id: volume.id,
            device,
            resolution,
        })
    }

    /// Detaches the single volume carrying `name`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NoVolumeNamed`] or
    /// [`OrchestratorError::AmbiguousName`] unless exactly one volume
    /// matches, and [`OrchestratorError::Ebs`] for remote failures.
    pub async fn detach(&self, name: &str) -> Result<AttachmentStatus, OrchestratorError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(EbsError::Validation(String::from("volume name must not be empty")).into());
        }
        let mut matches = self.client.volumes_by_tags(&[TagItem::name(trimmed)]).await?;
        let volume = match (matches.pop(), matches.len()) {
            (Some(volume), 0) => volume,
            (Some(_), others) => {
                return Err(OrchestratorError::AmbiguousName {
                    name: trimmed.to_owned(),
                    count: others + 1,
                });
            }
            (None, _) => {
                return Err(OrchestratorError::NoVolumeNamed {
                    name: trimmed.to_owned(),
                });
            }
        };
        Ok(self.client.detach_volume(&volume.id).await?)
    }

    async fn migrate(
        &self,
        existing: &Volume,
        request: &AttachRequest,
    ) -> Result<String, OrchestratorError> {
        tracing::info!(
            volume_id = %existing.id,
            from = %existing.availability_zone,
            to = %request.availability_zone,
            "migrating volume between zones"
        );
        let snapshot = self
            .client
            .create_snapshot(&existing.id, MIGRATION_SNAPSHOT_DESCRIPTION)
            .await?;
        self.wait_for_snapshot(&snapshot.id).await?;
        tracing::info!(snapshot_id = %snapshot.id, "snapshot completed");

        if let Err(err) = self.client.delete_volume(&existing.id).await {
            tracing::warn!(volume_id = %existing.id, error = %err, "could not delete migrated volume");
        }
        Ok(snapshot.id)
    }

    async fn create_and_wait(
        &self,
        request: &AttachRequest,
        snapshot_id: Option<String>,
    ) -> Result<Volume, OrchestratorError> {
        let created = self
            .client
            .create_volume(&request.volume_request(snapshot_id))
            .await?;
        let volume = self.wait_for_volume(&created.id).await?;
        tracing::info!(volume_id = %volume.id, "volume available");
        Ok(volume)
    }

    async fn wait_for_snapshot(&self, snapshot_id: &str) -> Result<(), OrchestratorError> {
        let client = self.client.clone();
        let id = snapshot_id.to_owned();
        let status = poll_until(self.poll, "snapshot completion", snapshot_id, move || {
            let check = client.clone();
            let check_id = id.clone();
            async move {
                let snapshot = check.snapshot_by_id(&check_id).await?;
                Ok::<_, EbsError>(match snapshot.status {
                    SnapshotStatus::Completed | SnapshotStatus::Error => Some(snapshot.status),
                    _ => None,
                })
            }
        })
        .await?;

        if status == SnapshotStatus::Error {
            return Err(OrchestratorError::SnapshotFailed {
                snapshot_id: snapshot_id.to_owned(),
            });
        }
        Ok(())
    }

    async fn wait_for_volume(&self, volume_id: &str) -> Result<Volume, OrchestratorError> {
        let client = self.client.clone();
        let id = volume_id.to_owned();
        let volume = poll_until(self.poll, "volume availability", volume_id, move || {
            let check = client.clone();
            let check_id = id.clone();
            async move {
                let volume = check.volume_by_id(&check_id).await?;
                let settled = matches!(volume.status, VolumeStatus::Available | VolumeStatus::Error);
                Ok::<_, EbsError>(settled.then_some(volume))
            }
        })
        .await?;

        if volume.status == VolumeStatus::Error {
            return Err(OrchestratorError::VolumeFailed {
                volume_id: volume.id,
            });
        }
        Ok(volume)
    }
}

#[cfg(test)]
mod tests;
