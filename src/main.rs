//! Binary entry point for the `ebsctl` CLI.

mod cli;

use std::io::{self, IsTerminal, Write};
use std::net::IpAddr;
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{AssociateAddressCommand, AttachCommand, Cli, Command, DetachCommand};
use ebsctl::{
    AttachRequest, ConfigError, ConfiguredSigner, EbsClient, EbsConfig, EbsError, Gateway,
    OrchestratorError, ReqwestTransport, VolumeOrchestrator,
};
use ebsctl::gateway::TransportError;

type CliClient = EbsClient<Gateway<ReqwestTransport, ConfiguredSigner>>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] TransportError),
    #[error("invalid argument: {0}")]
    Invalid(String),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Ebs(#[from] EbsError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli).await {
        tracing::error!("{err}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal())
                .with_target(false),
        )
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Attach(args) => attach(cli.endpoint, args).await,
        Command::Detach(args) => detach(cli.endpoint, args).await,
        Command::AssociateAddress(args) => associate_address(cli.endpoint, args).await,
    }
}

fn connect(endpoint: Option<String>) -> Result<CliClient, CliError> {
    let mut config = EbsConfig::load_without_cli_args()?;
    if let Some(value) = endpoint.filter(|value| !value.trim().is_empty()) {
        config.endpoint = value;
    }
    let signer = config.signer()?;
    let gateway = Gateway::new(ReqwestTransport::new()?, &config.endpoint, signer)?;
    tracing::debug!(endpoint = %gateway.endpoint(), "using EC2 endpoint");
    Ok(EbsClient::new(gateway))
}

fn print_line(value: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{value}")?;
    stdout.flush()?;
    Ok(())
}

async fn attach(endpoint: Option<String>, args: AttachCommand) -> Result<(), CliError> {
    let request = AttachRequest::new(args.name, args.instance, args.az)
        .size_gib(args.size)
        .ssd(args.ssd)
        .provisioned_iops(args.piops)
        .snapshot_id(args.snapshot);
    request.validate()?;

    let orchestrator = VolumeOrchestrator::new(connect(endpoint)?);
    let outcome = orchestrator.attach(&request).await?;
    tracing::info!(
        volume_id = %outcome.volume_id,
        resolution = ?outcome.resolution,
        "volume attached"
    );
    print_line(&outcome.device)
}

async fn detach(endpoint: Option<String>, args: DetachCommand) -> Result<(), CliError> {
    let orchestrator = VolumeOrchestrator::new(connect(endpoint)?);
    let status = orchestrator.detach(&args.name).await?;
    print_line(status.as_str())
}

async fn associate_address(
    endpoint: Option<String>,
    args: AssociateAddressCommand,
) -> Result<(), CliError> {
    let ip = args.ip.trim();
    if ip.parse::<IpAddr>().is_err() {
        return Err(CliError::Invalid(format!("'{ip}' is not an IP address")));
    }
    if args.instance.trim().is_empty() {
        return Err(CliError::Invalid(String::from("--instance must not be empty")));
    }
    let client = connect(endpoint)?;
    match client.associate_address(args.instance.trim(), ip).await? {
        Some(association_id) => print_line(&association_id),
        None => Ok(()),
    }
}
