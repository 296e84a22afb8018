//! Open status enumerations decoded from response bodies.
//!
//! The service may introduce new states at any time, so each enumeration
//! keeps unrecognised values in an `Unknown` variant instead of failing.

use std::fmt;

use serde::Deserialize;

macro_rules! open_status {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$variant_meta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
        #[serde(from = "String")]
        pub enum $name {
            $( $(#[$variant_meta])* $variant, )+
            /// Value not recognised by this client, kept verbatim.
            Unknown(String),
        }

        impl $name {
            /// Returns the wire representation.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )+
                    Self::Unknown(raw) => raw.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.trim() {
                    $( $wire => Self::$variant, )+
                    _ => Self::Unknown(value),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from(value.to_owned())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(self.as_str())
            }
        }
    };
}

open_status! {
    /// Lifecycle state of a volume.
    VolumeStatus {
        /// Provisioning has started.
        Creating => "creating",
        /// Ready to be attached.
        Available => "available",
        /// Attached to an instance.
        InUse => "in-use",
        /// Deletion has started.
        Deleting => "deleting",
        /// Deleted.
        Deleted => "deleted",
        /// Provisioning failed.
        Error => "error",
    }
}

open_status! {
    /// State of a single volume attachment.
    AttachmentStatus {
        /// Attachment in progress.
        Attaching => "attaching",
        /// Attached and visible to the instance.
        Attached => "attached",
        /// Detachment in progress.
        Detaching => "detaching",
        /// Fully detached.
        Detached => "detached",
    }
}

open_status! {
    /// Completion state of a snapshot.
    SnapshotStatus {
        /// Data is still being copied.
        Pending => "pending",
        /// Usable as a volume source.
        Completed => "completed",
        /// Snapshot failed.
        Error => "error",
    }
}

impl AttachmentStatus {
    /// Returns true while the attachment binds the volume to its instance.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Attaching | Self::Attached)
    }
}
