//! SFM Manager
//!
//! Transfer gateway, file manager client and mount target reachability.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use manager::client::{ClientError, Invoker, LocalInvoker, RemoteInvoker, TransferClient};
use manager::config::Config;
use manager::gateway::TransferGateway;
use manager::ipc::{get_socket_path, IpcClient, IpcServer};
use manager::network::{Endpoint, Inventory, ReachabilityAnalyzer};
use manager::service::{wait_for_shutdown_signal, GatewayService};
use protocol::Reply;

/// SFM - chunked file transfers and mount target reachability.
#[derive(Parser, Debug)]
#[command(name = "sfm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run file operations in-process instead of through a running gateway
    #[arg(long = "local", id = "local_mode", global = true)]
    pub local: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the configured filesystems on the gateway socket
    Serve {
        /// Socket path (defaults to the configured or runtime-dir path)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Send one raw operation envelope and print the reply
    Invoke {
        /// Filesystem id
        filesystem_id: String,

        /// File holding the JSON envelope (reads stdin when omitted)
        #[arg(long, short, value_name = "FILE")]
        event: Option<PathBuf>,
    },

    /// Upload a local file in chunks
    Upload {
        /// Filesystem id
        filesystem_id: String,

        /// Local file to send
        local: PathBuf,

        /// Remote directory
        remote_dir: String,

        /// Remote file name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Download a remote file in chunks
    Download {
        /// Filesystem id
        filesystem_id: String,

        /// Remote directory
        remote_dir: String,

        /// Remote file name
        filename: String,

        /// Local file to create
        local: PathBuf,
    },

    /// List one remote directory level
    Ls {
        /// Filesystem id
        filesystem_id: String,

        /// Remote directory
        #[arg(default_value = "/")]
        path: String,
    },

    /// Create a remote directory
    Mkdir {
        /// Filesystem id
        filesystem_id: String,

        /// Parent directory
        path: String,

        /// Directory name
        name: String,
    },

    /// Remove a remote file
    Rm {
        /// Filesystem id
        filesystem_id: String,

        /// Directory containing the file
        path: String,

        /// File name
        name: String,
    },

    /// Report which security groups make each mount target reachable
    Netinfo {
        /// Inventory JSON with MountTargets and SecurityGroupRules
        #[arg(long, value_name = "FILE")]
        inventory: Option<PathBuf>,

        /// Port to test (defaults to the configured NFS port)
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Either way of reaching a filesystem backend.
enum AnyInvoker {
    Remote(RemoteInvoker),
    Local(LocalInvoker),
}

impl Invoker for AnyInvoker {
    async fn invoke(&mut self, event: Value) -> Result<Value, ClientError> {
        match self {
            AnyInvoker::Remote(invoker) => invoker.invoke(event).await,
            AnyInvoker::Local(invoker) => invoker.invoke(event).await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.manager.log_level.to_lowercase()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
    }

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { socket } => run_serve(&config, socket).await?,
        Commands::Invoke {
            filesystem_id,
            event,
        } => {
            let event = read_event(event.as_deref())?;
            let mut invoker = connect(&config, cli.local, &filesystem_id).await?;
            let payload = invoker.invoke(event).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);

            let reply = Reply::from_value(payload)?;
            if !reply.status_code().is_success() {
                std::process::exit(1);
            }
        }
        Commands::Upload {
            filesystem_id,
            local,
            remote_dir,
            name,
        } => {
            let filename = match name {
                Some(name) => name,
                None => local
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .context("local path has no file name; pass --name")?,
            };

            let mut client = transfer_client(&config, cli.local, &filesystem_id).await?;
            let sent = client.upload_file(&local, &remote_dir, &filename).await?;
            println!("Uploaded {} bytes to {}/{}", sent, remote_dir.trim_end_matches('/'), filename);
        }
        Commands::Download {
            filesystem_id,
            remote_dir,
            filename,
            local,
        } => {
            let mut client = transfer_client(&config, cli.local, &filesystem_id).await?;
            let received = client.download_file(&remote_dir, &filename, &local).await?;
            println!("Downloaded {} bytes to {}", received, local.display());
        }
        Commands::Ls {
            filesystem_id,
            path,
        } => {
            let mut client = transfer_client(&config, cli.local, &filesystem_id).await?;
            let listing = client.list(&path).await?;
            for dir in &listing.directories {
                println!("{}/", dir);
            }
            for file in &listing.files {
                println!("{}", file);
            }
        }
        Commands::Mkdir {
            filesystem_id,
            path,
            name,
        } => {
            let mut client = transfer_client(&config, cli.local, &filesystem_id).await?;
            let reply = client.make_dir(&path, &name).await?;
            println!("{}", reply.message);
        }
        Commands::Rm {
            filesystem_id,
            path,
            name,
        } => {
            let mut client = transfer_client(&config, cli.local, &filesystem_id).await?;
            let reply = client.delete(&path, &name).await?;
            println!("{}", reply.message);
        }
        Commands::Netinfo { inventory, port } => {
            let inventory_path = inventory
                .or_else(|| config.network.inventory.clone())
                .context("no inventory given; pass --inventory or set network.inventory")?;
            let port = port.unwrap_or(config.network.nfs_port);
            run_netinfo(&inventory_path, port)?;
        }
    }

    Ok(())
}

async fn run_serve(config: &Config, socket: Option<PathBuf>) -> anyhow::Result<()> {
    let gateway = TransferGateway::from_config(config)?;
    if gateway.filesystems().is_empty() {
        tracing::warn!("No filesystems configured; every invocation will be rejected");
    }

    let socket_path = socket
        .or_else(|| config.gateway.socket_path.clone())
        .unwrap_or_else(get_socket_path);
    let server = IpcServer::bind(&socket_path)
        .await
        .with_context(|| format!("Failed to bind gateway socket: {}", socket_path.display()))?;

    let service = GatewayService::new(gateway);
    let shutdown = service.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            tracing::error!(error = %e, "Failed to install signal handlers");
        }
        shutdown.cancel();
    });

    service.run(server).await?;
    Ok(())
}

fn run_netinfo(inventory_path: &Path, port: u16) -> anyhow::Result<()> {
    let inventory = Inventory::load(inventory_path)?;
    let endpoints = inventory
        .mount_targets
        .iter()
        .map(Endpoint::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let analyzer = ReachabilityAnalyzer::new(&inventory).with_port(port);
    match analyzer.analyze(&endpoints) {
        Ok(reports) => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }
        Err(e) => {
            tracing::debug!(error = %e, "Reachability analysis failed");
            anyhow::bail!("{}", e.public_message())
        }
    }
}

fn read_event(path: Option<&Path>) -> anyhow::Result<Value> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file: {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read event from stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("Event is not valid JSON")
}

async fn connect(config: &Config, local: bool, filesystem_id: &str) -> anyhow::Result<AnyInvoker> {
    if local {
        let gateway = TransferGateway::from_config(config)?;
        return Ok(AnyInvoker::Local(LocalInvoker::new(
            Arc::new(gateway),
            filesystem_id,
        )));
    }

    let socket_path = config
        .gateway
        .socket_path
        .clone()
        .unwrap_or_else(get_socket_path);
    let timeout = Duration::from_secs(config.gateway.request_timeout_secs);
    let client = IpcClient::connect_with_timeout(&socket_path, timeout)
        .await
        .with_context(|| {
            format!(
                "Gateway not reachable at {} (is `sfm serve` running? use --local to skip it)",
                socket_path.display()
            )
        })?;
    Ok(AnyInvoker::Remote(RemoteInvoker::new(client, filesystem_id)))
}

async fn transfer_client(
    config: &Config,
    local: bool,
    filesystem_id: &str,
) -> anyhow::Result<TransferClient<AnyInvoker>> {
    let invoker = connect(config, local, filesystem_id).await?;
    Ok(TransferClient::new(invoker).with_chunk_size(config.transfer.max_upload_chunk))
}
