use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ember::config::Config;
use ember::server::Server;
use ember::{console, Host};

/// Ember - A plugin-extensible command server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Directory scanned for plugin libraries
    #[arg(long)]
    plugin_dir: Option<PathBuf>,

    /// TCP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Read commands from this terminal instead of a socket
    #[arg(short, long)]
    local: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never mix with command responses
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::load_from_file(config_path)?
    } else {
        Config::load_default()?
    };

    if let Some(dir) = args.plugin_dir {
        config.plugins.directory = dir;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let mut host = Host::from_config(&config).context("Failed to build built-in command table")?;

    if config.plugins.autoload {
        host.start_plugins().with_context(|| {
            format!(
                "Failed to load plugins from {}",
                config.plugins.directory.display()
            )
        })?;
    } else {
        warn!("Plugin autoload disabled; use 'mods start' to load plugins");
    }

    if args.local {
        console::run(&mut host, &config.server.prompt)?;
    } else {
        let server = Server::bind(config.server.socket_addr()?, config.server.prompt.clone())
            .await
            .context("Cannot open server socket")?;
        server.run(&mut host).await?;
    }

    host.shutdown();
    info!("Goodbye.");
    Ok(())
}
