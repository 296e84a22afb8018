//! Wire schema for EC2 Query API responses.
//!
//! Every response is an XML document whose root element names the action
//! (`DescribeVolumesResponse`, `CreateSnapshotResponse`, …). The decoders
//! below ignore the root name and any element they do not model, so new
//! fields added by the service do not break decoding.

mod action;
mod status;
mod types;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::EbsError;
use types::items;

pub use action::Action;
pub use status::{AttachmentStatus, SnapshotStatus, VolumeStatus};
pub use types::{Address, Attachment, DeviceMapping, EbsBlockDevice, Snapshot, TagItem, Volume};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeSetResponse {
    #[serde(default, deserialize_with = "items")]
    volume_set: Vec<Volume>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotSetResponse {
    #[serde(default, deserialize_with = "items")]
    snapshot_set: Vec<Snapshot>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockDeviceMappingResponse {
    #[serde(default, deserialize_with = "items")]
    block_device_mapping: Vec<DeviceMapping>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressSetResponse {
    #[serde(default, deserialize_with = "items")]
    addresses_set: Vec<Address>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociationResponse {
    #[serde(default)]
    association_id: Option<String>,
}

fn decode<T: DeserializeOwned>(action: Action, body: &[u8]) -> Result<T, EbsError> {
    let text = std::str::from_utf8(body).map_err(|err| EbsError::Decode {
        action,
        message: err.to_string(),
    })?;
    quick_xml::de::from_str(text).map_err(|err| EbsError::Decode {
        action,
        message: err.to_string(),
    })
}

/// Decodes the `volumeSet` of a `DescribeVolumes` response.
///
/// # Errors
///
/// Returns [`EbsError::Decode`] when the body is not a well-formed response.
pub fn decode_volume_set(body: &[u8]) -> Result<Vec<Volume>, EbsError> {
    decode::<VolumeSetResponse>(Action::DescribeVolumes, body).map(|set| set.volume_set)
}

/// Decodes the volume described by a `CreateVolume` response.
///
/// # Errors
///
/// Returns [`EbsError::Decode`] when the body is not a well-formed response.
pub fn decode_created_volume(body: &[u8]) -> Result<Volume, EbsError> {
    decode(Action::CreateVolume, body)
}

/// Decodes the `snapshotSet` of a `DescribeSnapshots` response.
///
/// # Errors
///
/// Returns [`EbsError::Decode`] when the body is not a well-formed response.
pub fn decode_snapshot_set(body: &[u8]) -> Result<Vec<Snapshot>, EbsError> {
    decode::<SnapshotSetResponse>(Action::DescribeSnapshots, body).map(|set| set.snapshot_set)
}

/// Decodes the snapshot described by a `CreateSnapshot` response.
///
/// # Errors
///
/// Returns [`EbsError::Decode`] when the body is not a well-formed response.
pub fn decode_created_snapshot(body: &[u8]) -> Result<Snapshot, EbsError> {
    decode(Action::CreateSnapshot, body)
}

/// Decodes the attachment record returned by `AttachVolume` or `DetachVolume`.
///
/// # Errors
///
/// Returns [`EbsError::Decode`] when the body is not a well-formed response.
pub fn decode_attachment(action: Action, body: &[u8]) -> Result<Attachment, EbsError> {
    decode(action, body)
}

/// Decodes the block-device mapping of a `DescribeInstanceAttribute` response.
///
/// # Errors
///
/// Returns [`EbsError::Decode`] when the body is not a well-formed response.
pub fn decode_device_mappings(body: &[u8]) -> Result<Vec<DeviceMapping>, EbsError> {
    decode::<BlockDeviceMappingResponse>(Action::DescribeInstanceAttribute, body)
        .map(|response| response.block_device_mapping)
}

/// Decodes the `addressesSet` of a `DescribeAddresses` response.
///
/// # Errors
///
/// Returns [`EbsError::Decode`] when the body is not a well-formed response.
pub fn decode_address_set(body: &[u8]) -> Result<Vec<Address>, EbsError> {
    decode::<AddressSetResponse>(Action::DescribeAddresses, body).map(|set| set.addresses_set)
}

/// Decodes the association id of an `AssociateAddress` response.
///
/// EC2-Classic responses carry no association id, hence the option.
///
/// # Errors
///
/// Returns [`EbsError::Decode`] when the body is not a well-formed response.
pub fn decode_association(body: &[u8]) -> Result<Option<String>, EbsError> {
    decode::<AssociationResponse>(Action::AssociateAddress, body).map(|response| {
        response
            .association_id
            .filter(|id| !id.trim().is_empty())
    })
}
