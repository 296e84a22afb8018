//! Entities decoded from EC2 Query API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::status::{AttachmentStatus, SnapshotStatus, VolumeStatus};

/// Key/value tag attached to a resource.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
pub struct TagItem {
    /// Tag key, for example `Name`.
    pub key: String,
    /// Tag value.
    #[serde(default)]
    pub value: String,
}

impl TagItem {
    /// Creates a tag from any string-like key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates the `Name` tag used to identify volumes.
    #[must_use]
    pub fn name(value: impl Into<String>) -> Self {
        Self::new("Name", value)
    }
}

/// Relation between a volume and an instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attached volume.
    pub volume_id: String,
    /// Instance the volume is attached to.
    #[serde(default)]
    pub instance_id: String,
    /// Device path exposed to the instance.
    #[serde(default)]
    pub device: String,
    /// Attachment state.
    pub status: AttachmentStatus,
    /// When the attachment was initiated.
    #[serde(rename = "attachTime", default)]
    pub attached_at: Option<DateTime<Utc>>,
}

/// Network-attached block storage volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume identifier (`vol-…`).
    #[serde(rename = "volumeId")]
    pub id: String,
    /// Availability zone hosting the volume.
    pub availability_zone: String,
    /// Lifecycle state at query time.
    pub status: VolumeStatus,
    /// Creation timestamp.
    #[serde(rename = "createTime", default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Size in GiB.
    #[serde(default)]
    pub size: Option<u64>,
    /// Snapshot the volume was created from.
    #[serde(default, deserialize_with = "non_empty")]
    pub snapshot_id: Option<String>,
    /// Volume type (`standard`, `gp2`, `io1`).
    #[serde(default, deserialize_with = "non_empty")]
    pub volume_type: Option<String>,
    /// Attachment records, in the order the service reports them.
    #[serde(rename = "attachmentSet", default, deserialize_with = "items")]
    pub attachments: Vec<Attachment>,
    /// Tags on the volume.
    #[serde(rename = "tagSet", default, deserialize_with = "items")]
    pub tags: Vec<TagItem>,
}

impl Volume {
    /// Returns the active attachment to `instance_id`, if any.
    #[must_use]
    pub fn attachment_to(&self, instance_id: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|attachment| attachment.instance_id == instance_id && attachment.status.is_active())
    }

    /// Returns the value of the tag with the given key, if present.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }
}

/// Point-in-time copy of a volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot identifier (`snap-…`).
    #[serde(rename = "snapshotId")]
    pub id: String,
    /// Volume the snapshot was taken from.
    #[serde(default)]
    pub volume_id: String,
    /// Completion state.
    pub status: SnapshotStatus,
    /// Free-form description supplied at creation.
    #[serde(default)]
    pub description: String,
}

/// EBS details of a block-device mapping entry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EbsBlockDevice {
    /// Volume backing the device.
    pub volume_id: String,
    /// Attachment state.
    pub status: AttachmentStatus,
    /// When the volume was attached.
    #[serde(rename = "attachTime", default)]
    pub attached_at: Option<DateTime<Utc>>,
    /// Whether the volume is deleted with the instance.
    #[serde(default)]
    pub delete_on_termination: bool,
}

/// One device currently mapped on an instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct DeviceMapping {
    /// Device path, for example `/dev/sdf`.
    #[serde(rename = "deviceName")]
    pub device: String,
    /// EBS details; absent for instance-store devices.
    #[serde(default)]
    pub ebs: Option<EbsBlockDevice>,
}

impl DeviceMapping {
    /// Builds an entry for a device path with no EBS details.
    #[must_use]
    pub fn at(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ebs: None,
        }
    }
}

/// Elastic IP address.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Public IPv4 address.
    pub public_ip: String,
    /// Allocation id required for association in a VPC.
    #[serde(default)]
    pub allocation_id: String,
    /// Instance currently holding the address.
    #[serde(default, deserialize_with = "non_empty")]
    pub instance_id: Option<String>,
    /// Current association id.
    #[serde(default, deserialize_with = "non_empty")]
    pub association_id: Option<String>,
}

/// Unwraps the `<item>` children of a set element.
pub(super) fn items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    struct ItemSet<T> {
        #[serde(rename = "item", default = "Vec::new")]
        item: Vec<T>,
    }

    Ok(ItemSet::deserialize(deserializer)?.item)
}

/// Treats self-closing or blank elements such as `<snapshotId/>` as absent.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}
