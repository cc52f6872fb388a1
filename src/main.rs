//! inkpot - build pipeline for HTML email templates.

mod build;
mod cli;
mod compiler;
mod config;
mod deploy;
mod logger;
mod pipeline;
mod reload;
mod serve;
mod utils;
mod watch;

use anyhow::Result;
use build::{BuildContext, compile_all};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use deploy::deploy_templates;
use reload::ReloadHub;
use serve::{parse_interface, serve_output};
use std::{path::Path, sync::Arc, thread};
use watch::watch_for_changes_blocking;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static SiteConfig = Box::leak(Box::new(load_config(cli)?));

    match &cli.command {
        Commands::Compile => compile_all(&BuildContext::new(config)),
        Commands::Serve { .. } => {
            let ctx = Arc::new(BuildContext::new(config));
            compile_all(&ctx)?;
            serve_with_reload(ctx)
        }
        Commands::Deploy => deploy_templates(config),
    }
}

/// Load and validate configuration from CLI arguments.
///
/// The config file is optional; without it every default applies.
fn load_config(cli: &'static Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        SiteConfig::from_path(&config_path)?
    } else {
        SiteConfig::default()
    };
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}

/// Start the reload hub and the watcher, then serve until Ctrl+C.
fn serve_with_reload(ctx: Arc<BuildContext>) -> Result<()> {
    let config = ctx.config;
    if !config.serve.watch {
        return serve_output(config, None);
    }

    let interface = parse_interface(&config.serve.interface)?;
    let hub = Arc::new(ReloadHub::bind(interface, config.serve.reload_port)?);
    let script = hub.script_tag();

    thread::spawn(move || {
        if let Err(err) = watch_for_changes_blocking(ctx, Some(hub)) {
            log!("watch"; "{err}");
        }
    });

    serve_output(config, Some(script))
}
