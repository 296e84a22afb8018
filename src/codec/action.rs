//! Action vocabulary understood by the EC2 Query API.

use std::fmt;

/// Remote operation name sent as the `Action` query parameter.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Action {
    /// Lists volumes, optionally filtered by id or tag.
    DescribeVolumes,
    /// Creates a volume, optionally from a snapshot.
    CreateVolume,
    /// Deletes a volume.
    DeleteVolume,
    /// Adds tags to a resource.
    CreateTags,
    /// Attaches a volume to an instance under a device path.
    AttachVolume,
    /// Detaches a volume from its instance.
    DetachVolume,
    /// Reads a single instance attribute such as its block-device mapping.
    DescribeInstanceAttribute,
    /// Starts a snapshot of a volume.
    CreateSnapshot,
    /// Lists snapshots by id.
    DescribeSnapshots,
    /// Deletes a snapshot.
    DeleteSnapshot,
    /// Looks up elastic IP addresses.
    DescribeAddresses,
    /// Binds an elastic IP address to an instance.
    AssociateAddress,
}

impl Action {
    /// Returns the name sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DescribeVolumes => "DescribeVolumes",
            Self::CreateVolume => "CreateVolume",
            Self::DeleteVolume => "DeleteVolume",
            Self::CreateTags => "CreateTags",
            Self::AttachVolume => "AttachVolume",
            Self::DetachVolume => "DetachVolume",
            Self::DescribeInstanceAttribute => "DescribeInstanceAttribute",
            Self::CreateSnapshot => "CreateSnapshot",
            Self::DescribeSnapshots => "DescribeSnapshots",
            Self::DeleteSnapshot => "DeleteSnapshot",
            Self::DescribeAddresses => "DescribeAddresses",
            Self::AssociateAddress => "AssociateAddress",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
