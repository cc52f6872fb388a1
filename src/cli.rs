//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// inkpot: email template build pipeline
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to root (optional file)
    #[arg(short = 'C', long, default_value = "inkpot.toml", global = true)]
    pub config: PathBuf,

    /// Build for production: strip unused CSS, inline styles, no source maps
    #[arg(long, global = true)]
    pub production: bool,

    /// Compiled output directory (relative to project root)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Reset the workspace and run the full pipeline once
    #[command(alias = "build")]
    Compile,

    /// Compile, then serve the output with live reload and watch sources
    Serve {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// HTTP port
        #[arg(short, long)]
        port: Option<u16>,

        /// WebSocket port used by the live-reload script
        #[arg(long)]
        reload_port: Option<u16>,

        /// enable watch
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Upload materialized templates over SFTP
    Deploy,
}

impl Cli {
    pub const fn is_deploy(&self) -> bool {
        matches!(self.command, Commands::Deploy)
    }
}
