//! Command-line interface definitions for the `ebsctl` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `ebsctl` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ebsctl",
    about = "Attach, detach, and migrate named EBS volumes",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// EC2 Query API endpoint; overrides `AWS_ENDPOINT` and `ebsctl.toml`.
    #[arg(long, global = true, env = "EBS_ENDPOINT", value_name = "URL")]
    pub(crate) endpoint: Option<String>,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands understood by `ebsctl`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Attach a named volume, creating or migrating it when needed.
    #[command(
        name = "attach",
        about = "Attach a named volume, creating or migrating it when needed"
    )]
    Attach(AttachCommand),
    /// Detach the volume carrying a name.
    #[command(name = "detach", about = "Detach the volume carrying a name")]
    Detach(DetachCommand),
    /// Bind an elastic IP to an instance.
    #[command(name = "associate-address", about = "Bind an elastic IP to an instance")]
    AssociateAddress(AssociateAddressCommand),
}

/// Arguments for the `ebsctl attach` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct AttachCommand {
    /// Name tag of the volume to attach.
    #[arg(long, env = "EBS_ATTACH_NAME")]
    pub(crate) name: String,
    /// Size of a newly created volume in GiB.
    #[arg(long, env = "EBS_ATTACH_SIZE", default_value_t = 10)]
    pub(crate) size: u32,
    /// Request SSD storage for a newly created volume.
    #[arg(long, env = "EBS_ATTACH_SSD")]
    pub(crate) ssd: bool,
    /// Number of provisioned IOPS to request; requires `--ssd`.
    #[arg(long, env = "EBS_ATTACH_PIOPS", default_value_t = 0)]
    pub(crate) piops: u32,
    /// Snapshot to seed a newly created volume from.
    #[arg(long, env = "EBS_ATTACH_SNAPSHOT", value_name = "SNAPSHOT_ID")]
    pub(crate) snapshot: Option<String>,
    /// Instance that should hold the volume.
    #[arg(long, env = "EBS_ATTACH_INSTANCE", value_name = "INSTANCE_ID")]
    pub(crate) instance: String,
    /// Availability zone of the instance.
    #[arg(long, env = "EBS_ATTACH_AZ", value_name = "ZONE")]
    pub(crate) az: String,
}

/// Arguments for the `ebsctl detach` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DetachCommand {
    /// Name tag of the volume to detach.
    #[arg(long, env = "EBS_DETACH_NAME")]
    pub(crate) name: String,
}

/// Arguments for the `ebsctl associate-address` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct AssociateAddressCommand {
    /// Instance that should receive the address.
    #[arg(long, env = "EBS_EIP_INSTANCE", value_name = "INSTANCE_ID")]
    pub(crate) instance: String,
    /// Public elastic IP to bind.
    #[arg(long, env = "EBS_EIP_IP", value_name = "IP")]
    pub(crate) ip: String,
}
