//! Typed volume and snapshot operations on top of a [`SignedRequester`].
//!
//! Each method maps onto one (occasionally two) Query API actions and keeps
//! nothing between calls: every answer reflects the service's state at the
//! time of the request.

mod address;

use std::fmt;
use std::sync::Arc;

use crate::codec::{
    self, Action, AttachmentStatus, DeviceMapping, Snapshot, TagItem, Volume,
};
use crate::device::next_device_path;
use crate::error::EbsError;
use crate::gateway::{Params, SignedRequester};

/// Message returned when provisioned IOPS are requested on magnetic storage.
pub const PIOPS_REQUIRES_SSD: &str = "Provisioned IOPS volumes are only available as SSD";

/// Storage class selected from the performance options of a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VolumeType {
    /// Magnetic storage.
    Standard,
    /// General purpose SSD.
    Gp2,
    /// SSD with provisioned IOPS.
    Io1,
}

impl VolumeType {
    /// Derives the volume type from the SSD flag and the provisioned IOPS.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::Validation`] when IOPS are requested without SSD.
    pub fn for_performance(ssd: bool, provisioned_iops: u32) -> Result<Self, EbsError> {
        match (ssd, provisioned_iops) {
            (false, iops) if iops > 0 => Err(EbsError::Validation(PIOPS_REQUIRES_SSD.to_owned())),
            (true, iops) if iops > 0 => Ok(Self::Io1),
            (true, _) => Ok(Self::Gp2),
            (false, _) => Ok(Self::Standard),
        }
    }

    /// Returns the wire name sent as `VolumeType`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Gp2 => "gp2",
            Self::Io1 => "io1",
        }
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Parameters for [`EbsClient::create_volume`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateVolumeRequest {
    /// Size in GiB.
    pub size_gib: u32,
    /// Availability zone that will host the volume.
    pub availability_zone: String,
    /// Requests SSD-backed storage.
    pub ssd: bool,
    /// Provisioned IOPS; zero disables provisioning.
    pub provisioned_iops: u32,
    /// Snapshot to restore from.
    pub snapshot_id: Option<String>,
    /// Tags applied right after creation.
    pub tags: Vec<TagItem>,
}

impl CreateVolumeRequest {
    /// Creates a request for a standard volume, trimming the zone.
    #[must_use]
    pub fn new(size_gib: u32, availability_zone: impl Into<String>) -> Self {
        Self {
            size_gib,
            availability_zone: availability_zone.into().trim().to_owned(),
            ssd: false,
            provisioned_iops: 0,
            snapshot_id: None,
            tags: Vec::new(),
        }
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

    /// Sets the source snapshot; blank identifiers are ignored.
    #[must_use]
    pub fn snapshot_id(mut self, value: Option<String>) -> Self {
        self.snapshot_id = value
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());
        self
    }

    /// Sets the tags applied after creation.
    #[must_use]
    pub fn tags(mut self, value: Vec<TagItem>) -> Self {
        self.tags = value;
        self
    }

    /// Checks the request and resolves its volume type.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::Validation`] when the size is zero, the zone is
    /// blank, or IOPS are requested without SSD.
    pub fn validate(&self) -> Result<VolumeType, EbsError> {
        if self.size_gib == 0 {
            return Err(EbsError::Validation(String::from(
                "volume size must be at least 1 GiB",
            )));
        }
        if self.availability_zone.is_empty() {
            return Err(EbsError::Validation(String::from(
                "availability zone must not be empty",
            )));
        }
        VolumeType::for_performance(self.ssd, self.provisioned_iops)
    }

    fn params(&self, volume_type: VolumeType) -> Params {
        let mut params = Params::new()
            .with("Size", self.size_gib.to_string())
            .with("AvailabilityZone", self.availability_zone.as_str())
            .with("VolumeType", volume_type.as_str());
        if volume_type == VolumeType::Io1 {
            params.insert("Iops", self.provisioned_iops.to_string());
        }
        if let Some(snapshot) = &self.snapshot_id {
            params.insert("SnapshotId", snapshot.as_str());
        }
        params
    }
}

fn tag_filters(tags: &[TagItem]) -> Params {
    tags.iter()
        .zip(1..)
        .fold(Params::new(), |params, (tag, index)| {
            params
                .with(format!("Filter.{index}.Name"), format!("tag:{}", tag.key))
                .with(format!("Filter.{index}.Value"), tag.value.as_str())
        })
}

/// Stateless client for the volume, snapshot, and address operations.
///
/// Cloning is cheap and shares the underlying requester.
pub struct EbsClient<R> {
    requester: Arc<R>,
}

impl<R> Clone for EbsClient<R> {
    fn clone(&self) -> Self {
        Self {
            requester: Arc::clone(&self.requester),
        }
    }
}

impl<R> fmt::Debug for EbsClient<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("EbsClient").finish_non_exhaustive()
    }
}

impl<R: SignedRequester> EbsClient<R> {
    /// Wraps a requester, usually a [`crate::gateway::Gateway`].
    #[must_use]
    pub fn new(requester: R) -> Self {
        Self {
            requester: Arc::new(requester),
        }
    }

    /// Returns the underlying requester.
    #[must_use]
    pub fn requester(&self) -> &R {
        &self.requester
    }

    /// Lists volumes carrying every given tag.
    ///
    /// # Errors
    ///
    /// Propagates gateway and decode failures.
    pub async fn volumes_by_tags(&self, tags: &[TagItem]) -> Result<Vec<Volume>, EbsError> {
        let body = self
            .requester
            .send(Action::DescribeVolumes, tag_filters(tags))
            .await?;
        codec::decode_volume_set(&body)
    }

    /// Fetches exactly one volume by id.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::NotFound`] or [`EbsError::Ambiguous`] when the
    /// service does not answer with a single volume.
    pub async fn volume_by_id(&self, volume_id: &str) -> Result<Volume, EbsError> {
        let body = self
            .requester
            .send(
                Action::DescribeVolumes,
                Params::new().with("VolumeId.1", volume_id),
            )
            .await?;
        EbsError::exactly_one(codec::decode_volume_set(&body)?, "volume", volume_id)
    }

    /// Creates a volume and tags it.
    ///
    /// Creation and tagging are two calls. When tagging fails the volume
    /// already exists; the error carries its id and nothing is rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::Validation`] before any request when the request
    /// is inconsistent, [`EbsError::TaggingFailed`] when only the second
    /// call fails, and gateway or decode errors otherwise.
    pub async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<Volume, EbsError> {
        let volume_type = request.validate()?;
        let body = self
            .requester
            .send(Action::CreateVolume, request.params(volume_type))
            .await?;
        let mut volume = codec::decode_created_volume(&body)?;
        tracing::info!(
            volume_id = %volume.id,
            zone = %volume.availability_zone,
            %volume_type,
            "volume created"
        );

        if request.tags.is_empty() {
            return Ok(volume);
        }
        if let Err(err) = self.tag_resource(&volume.id, &request.tags).await {
            return Err(EbsError::TaggingFailed {
                volume_id: volume.id,
                source: Box::new(err),
            });
        }
        volume.tags.clone_from(&request.tags);
        Ok(volume)
    }

    /// Adds tags to any taggable resource.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures.
    pub async fn tag_resource(&self, resource_id: &str, tags: &[TagItem]) -> Result<(), EbsError> {
        let params = tags.iter().zip(1..).fold(
            Params::new().with("ResourceId.1", resource_id),
            |params, (tag, index)| {
                params
                    .with(format!("Tag.{index}.Key"), tag.key.as_str())
                    .with(format!("Tag.{index}.Value"), tag.value.as_str())
            },
        );
        self.requester.send(Action::CreateTags, params).await?;
        Ok(())
    }

    /// Deletes a volume.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures unmodified.
    pub async fn delete_volume(&self, volume_id: &str) -> Result<(), EbsError> {
        self.requester
            .send(Action::DeleteVolume, Params::new().with("VolumeId", volume_id))
            .await?;
        tracing::info!(volume_id, "volume deleted");
        Ok(())
    }

    /// Lists the devices currently mapped on an instance.
    ///
    /// # Errors
    ///
    /// Propagates gateway and decode failures.
    pub async fn block_device_mapping(
        &self,
        instance_id: &str,
    ) -> Result<Vec<DeviceMapping>, EbsError> {
        let params = Params::new()
            .with("InstanceId", instance_id)
            .with("Attribute", "blockDeviceMapping");
        let body = self
            .requester
            .send(Action::DescribeInstanceAttribute, params)
            .await?;
        codec::decode_device_mappings(&body)
    }

    /// Attaches a volume under the next free device path and returns it.
    ///
    /// # Errors
    ///
    /// Propagates gateway and decode failures from either call.
    pub async fn attach_volume(&self, volume_id: &str, instance_id: &str) -> Result<String, EbsError> {
        let mappings = self.block_device_mapping(instance_id).await?;
        let device = next_device_path(&mappings);
        let params = Params::new()
            .with("InstanceId", instance_id)
            .with("VolumeId", volume_id)
            .with("Device", device.as_str());
        self.requester.send(Action::AttachVolume, params).await?;
        tracing::info!(volume_id, instance_id, device = %device, "volume attach requested");
        Ok(device)
    }

    /// Detaches a volume and returns the attachment state reported back.
    ///
    /// # Errors
    ///
    /// Propagates gateway and decode failures.
    pub async fn detach_volume(&self, volume_id: &str) -> Result<AttachmentStatus, EbsError> {
        let body = self
            .requester
            .send(Action::DetachVolume, Params::new().with("VolumeId", volume_id))
            .await?;
        let attachment = codec::decode_attachment(Action::DetachVolume, &body)?;
        tracing::info!(volume_id, status = %attachment.status, "volume detach requested");
        Ok(attachment.status)
    }

    /// Starts a snapshot of a volume.
    ///
    /// # Errors
    ///
    /// Propagates gateway and decode failures.
    pub async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
    ) -> Result<Snapshot, EbsError> {
        let params = Params::new()
            .with("VolumeId", volume_id)
            .with("Description", description);
        let body = self.requester.send(Action::CreateSnapshot, params).await?;
        let snapshot = codec::decode_created_snapshot(&body)?;
        tracing::info!(snapshot_id = %snapshot.id, volume_id, "snapshot started");
        Ok(snapshot)
    }

    /// Fetches exactly one snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::NotFound`] or [`EbsError::Ambiguous`] when the
    /// service does not answer with a single snapshot.
    pub async fn snapshot_by_id(&self, snapshot_id: &str) -> Result<Snapshot, EbsError> {
        let body = self
            .requester
            .send(
                Action::DescribeSnapshots,
                Params::new().with("SnapshotId.1", snapshot_id),
            )
            .await?;
        EbsError::exactly_one(codec::decode_snapshot_set(&body)?, "snapshot", snapshot_id)
    }

    /// Deletes a snapshot.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures unmodified.
    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), EbsError> {
        self.requester
            .send(
                Action::DeleteSnapshot,
                Params::new().with("SnapshotId", snapshot_id),
            )
            .await?;
        Ok(())
    }
}
