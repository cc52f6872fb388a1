//! Project configuration from `inkpot.toml`.
//!
//! The file is optional: a missing file means every default applies.
//!
//! # Sections
//!
//! | Section          | Purpose                                        |
//! |------------------|------------------------------------------------|
//! | `[build]`        | Source/output paths, layouts, template output  |
//! | `[build.sass]`   | Stylesheet entry, include paths, compiler      |
//! | `[build.inline]` | Media-query placeholder                        |
//! | `[build.inky]`   | Responsive-email markup expansion              |
//! | `[serve]`        | Preview server, live reload, watch             |
//! | `[deploy]`       | SFTP target (secrets come from the environment)|
//!
//! # Example
//!
//! ```toml
//! [build]
//! output = "dist"
//! templates = "templates"
//!
//! [build.sass]
//! include = ["node_modules/foundation-emails/scss"]
//!
//! [serve]
//! port = 3000
//!
//! [deploy.sftp]
//! host = "mail.example.com"
//! user = "templates"
//! remote_path = "/srv/app/templates"
//! ```

mod build;
pub mod defaults;
mod deploy;
mod error;
mod serve;

pub use build::{BuildConfig, BuildMode};
pub use deploy::SftpDeployConfig;

use deploy::DeployConfig;
use error::ConfigError;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing inkpot.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading, may not exist)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Deployment settings
    #[serde(default)]
    pub deploy: DeployConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("Invalid config `{}`", path.display()))
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Build mode chosen on the command line.
    pub const fn mode(&self) -> BuildMode {
        self.build.mode
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        if cli.production {
            self.build.mode = BuildMode::Production;
        }

        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());
        self.update_path_with_root(&root, cli);

        if let Commands::Serve {
            interface,
            port,
            reload_port,
            watch,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.reload_port, reload_port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve every configured path against root and make it absolute
    fn update_path_with_root(&mut self, root: &Path, cli: &Cli) {
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        let root = Self::normalize_path(root);
        self.set_root(&root);
        self.config_path = Self::normalize_path(&root.join(&cli.config));

        let build = &mut self.build;
        for dir in [
            &mut build.pages,
            &mut build.layouts,
            &mut build.partials,
            &mut build.helpers,
            &mut build.output,
            &mut build.templates,
            &mut build.sass.entry,
        ] {
            *dir = Self::normalize_path(&root.join(&*dir));
        }
        for dir in build.sass.include.iter_mut().chain(build.sass.watch.iter_mut()) {
            *dir = Self::normalize_path(&root.join(&*dir));
        }

        // Key path (with tilde expansion)
        if let Some(key_path) = &self.deploy.sftp.key_path {
            let expanded = shellexpand::tilde(&key_path.to_string_lossy()).into_owned();
            let path = PathBuf::from(expanded);
            self.deploy.sftp.key_path = Some(if path.is_relative() {
                Self::normalize_path(&root.join(path))
            } else {
                Self::normalize_path(&path)
            });
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the current command
    pub fn validate(&self) -> Result<()> {
        let is_deploy = self.cli.is_some_and(Cli::is_deploy);

        if is_deploy {
            return self.validate_deploy();
        }

        let build = &self.build;
        Self::check_dir("[build.pages]", &build.pages)?;
        Self::check_dir("[build.layouts]", &build.layouts)?;

        if !build.sass.entry.is_file() {
            bail!(ConfigError::Validation(format!(
                "[build.sass.entry] `{}` not found",
                build.sass.entry.display()
            )));
        }

        if !build.sass.command.is_empty() {
            Self::check_command_installed("[build.sass.command]", &build.sass.command)?;
        }

        if build.template_ext.is_empty()
            || build.template_ext.contains(['.', '/', '\\'])
        {
            bail!(ConfigError::Validation(
                "[build.template_ext] must be a bare extension such as `tmpl`".into()
            ));
        }

        if build.inky.column_count == 0 {
            bail!(ConfigError::Validation(
                "[build.inky.column_count] must be greater than 0".into()
            ));
        }

        if build.output == build.templates {
            bail!(ConfigError::Validation(
                "[build.output] and [build.templates] must be different directories".into()
            ));
        }

        if self.serve.port == self.serve.reload_port {
            bail!(ConfigError::Validation(
                "[serve.port] and [serve.reload_port] must differ".into()
            ));
        }

        Ok(())
    }

    fn validate_deploy(&self) -> Result<()> {
        if self.deploy.provider != "sftp" {
            bail!(ConfigError::Validation(format!(
                "[deploy.provider] `{}` is not supported, use `sftp`",
                self.deploy.provider
            )));
        }

        let sftp = &self.deploy.sftp;
        for (field, value) in [
            ("[deploy.sftp.host]", &sftp.host),
            ("[deploy.sftp.user]", &sftp.user),
            ("[deploy.sftp.remote_path]", &sftp.remote_path),
        ] {
            if value.trim().is_empty() {
                bail!(ConfigError::Validation(format!("{field} is required")));
            }
        }

        if let Some(path) = &sftp.key_path {
            if !path.exists() {
                bail!(ConfigError::Validation(
                    "[deploy.sftp.key_path] not found".into()
                ));
            }
            if !path.is_file() {
                bail!(ConfigError::Validation(
                    "[deploy.sftp.key_path] is not a file".into()
                ));
            }
        }

        Ok(())
    }

    fn check_dir(field: &str, path: &Path) -> Result<()> {
        if !path.is_dir() {
            bail!(ConfigError::Validation(format!(
                "{field} directory `{}` not found",
                path.display()
            )));
        }
        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
