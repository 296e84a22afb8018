//! Configuration loading via `ortho-config`.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use reqwest::Request;
use serde::Deserialize;
use thiserror::Error;

use crate::gateway::{RequestSigner, SigV4Signer};

/// Endpoint used when neither configuration nor flags name one.
pub const DEFAULT_CLI_ENDPOINT: &str = "https://ec2.eu-west-1.amazonaws.com";

/// AWS connection settings merged from defaults, `ebsctl.toml`, and `AWS_*`
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "AWS",
    discovery(
        app_name = "ebsctl",
        env_var = "EBSCTL_CONFIG_PATH",
        config_file_name = "ebsctl.toml",
        dotfile_name = ".ebsctl.toml",
        project_file_name = "ebsctl.toml"
    )
)]
pub struct EbsConfig {
    /// Query API endpoint. Defaults to the `eu-west-1` EC2 endpoint.
    #[ortho_config(default = DEFAULT_CLI_ENDPOINT.to_owned())]
    pub endpoint: String,
    /// Region used in the signature scope.
    #[ortho_config(default = "eu-west-1".to_owned())]
    pub region: String,
    /// Access key id. Requests go out unsigned when no credentials are set.
    pub access_key_id: Option<String>,
    /// Secret paired with the access key id.
    pub secret_access_key: Option<String>,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to ebsctl.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const ENDPOINT: FieldMetadata = FieldMetadata::new("EC2 endpoint", "AWS_ENDPOINT", "endpoint");
const REGION: FieldMetadata = FieldMetadata::new("AWS region", "AWS_REGION", "region");
const ACCESS_KEY: FieldMetadata =
    FieldMetadata::new("AWS access key id", "AWS_ACCESS_KEY_ID", "access_key_id");
const SECRET_KEY: FieldMetadata = FieldMetadata::new(
    "AWS secret access key",
    "AWS_SECRET_ACCESS_KEY",
    "secret_access_key",
);

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|text| text.trim()).filter(|text| !text.is_empty())
}

impl EbsConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("ebsctl")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Credentials are optional but must come
    /// as a pair.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// and TOML key to set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ENDPOINT.missing());
        }
        if self.region.trim().is_empty() {
            return Err(REGION.missing());
        }
        match (
            present(self.access_key_id.as_ref()),
            present(self.secret_access_key.as_ref()),
        ) {
            (Some(_), None) => Err(SECRET_KEY.missing()),
            (None, Some(_)) => Err(ACCESS_KEY.missing()),
            _ => Ok(()),
        }
    }

    /// Builds the signer matching the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn signer(&self) -> Result<ConfiguredSigner, ConfigError> {
        self.validate()?;
        let (Some(access), Some(secret)) = (
            present(self.access_key_id.as_ref()),
            present(self.secret_access_key.as_ref()),
        ) else {
            tracing::warn!("no AWS credentials configured; requests will be sent unsigned");
            return Ok(ConfiguredSigner::Anonymous);
        };
        Ok(ConfiguredSigner::SigV4(
            SigV4Signer::new(access, secret, self.region.trim())
                .session_token(self.session_token.clone()),
        ))
    }
}

/// Signer selected from configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfiguredSigner {
    /// Signs with AWS Signature Version 4.
    SigV4(SigV4Signer),
    /// Leaves requests untouched, for endpoints that need no credentials.
    Anonymous,
}

impl RequestSigner for ConfiguredSigner {
    fn sign(&self, request: &mut Request) {
        if let Self::SigV4(signer) = self {
            signer.sign(request);
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
