//! `[deploy]` section configuration.
//!
//! Secrets never live in this file: passwords and key passphrases are read
//! from environment variables named here, keys from files on disk.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[deploy]` section in inkpot.toml - deployment configuration.
///
/// # Example
/// ```toml
/// [deploy]
/// provider = "sftp"
///
/// [deploy.sftp]
/// host = "mail.example.com"
/// user = "templates"
/// remote_path = "/srv/app/templates"
/// key_path = "~/.ssh/id_ed25519"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Deployment provider. Only "sftp" is supported.
    #[serde(default = "defaults::deploy::provider")]
    #[educe(Default = defaults::deploy::provider())]
    pub provider: String,

    /// SFTP target.
    #[serde(default)]
    pub sftp: SftpDeployConfig,
}

/// `[deploy.sftp]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SftpDeployConfig {
    /// Remote host name or address.
    #[serde(default)]
    pub host: String,

    /// SSH port (default: 22).
    #[serde(default = "defaults::deploy::sftp::port")]
    #[educe(Default = defaults::deploy::sftp::port())]
    pub port: u16,

    /// Login user.
    #[serde(default)]
    pub user: String,

    /// Existing remote directory receiving the templates.
    #[serde(default)]
    pub remote_path: String,

    /// Private key file. `~` is expanded; relative paths resolve against root.
    #[serde(default = "defaults::deploy::sftp::key_path")]
    #[educe(Default = defaults::deploy::sftp::key_path())]
    pub key_path: Option<PathBuf>,

    /// Environment variable holding the password (used without `key_path`).
    #[serde(default = "defaults::deploy::sftp::password_env")]
    #[educe(Default = defaults::deploy::sftp::password_env())]
    pub password_env: String,

    /// Environment variable holding the key passphrase, if any.
    #[serde(default = "defaults::deploy::sftp::passphrase_env")]
    #[educe(Default = defaults::deploy::sftp::passphrase_env())]
    pub passphrase_env: String,
}
