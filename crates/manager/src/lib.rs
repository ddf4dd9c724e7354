//! # SFM Manager Library
//!
//! Backend for a web-based file manager over network filesystems.
//!
//! ## Overview
//!
//! The manager provides:
//!
//! - **Chunked Transfers**: offset-addressed uploads and windowed downloads
//!   that keep no state between calls
//! - **Flat File Operations**: list, make_dir and delete under a store root
//! - **Transfer Gateway**: one backend per filesystem, served over a Unix socket
//! - **Reachability Analysis**: which security groups let a host reach a
//!   mount target on the NFS port
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  TransferClient ──► IpcClient ══ socket ══► GatewayService   │
//! ├──────────────────────────────────────────────────────────────┤
//! │                      TransferGateway                         │
//! │               filesystem id ──► OperationRouter              │
//! │                                                              │
//! │  ┌────────────────┐  ┌──────────────────┐  ┌──────────────┐  │
//! │  │  FileTransfer  │  │ DirectoryBrowser │  │  ByteStore   │  │
//! │  └────────────────┘  └──────────────────┘  └──────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//!
//!   Inventory (RuleProvider) ──► ReachabilityAnalyzer ──► reports
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manager::{Config, GatewayService, TransferGateway};
//! use manager::ipc::{get_socket_path, IpcServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let gateway = TransferGateway::from_config(&config)?;
//!
//!     let server = IpcServer::bind(&get_socket_path()).await?;
//!     GatewayService::new(gateway).run(server).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Byte Store, chunk handlers and flat operations
//! - [`router`]: Operation envelope dispatch
//! - [`gateway`]: Filesystem id to backend routing
//! - [`ipc`]: Unix socket transport for the gateway
//! - [`service`]: Gateway accept loop and shutdown
//! - [`client`]: Client-side transfer driver
//! - [`network`]: Mount target reachability

pub mod client;
pub mod config;
pub mod files;
pub mod gateway;
pub mod ipc;
pub mod network;
pub mod router;
pub mod service;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::Config;

// Re-export files types for convenience
pub use files::{
    ByteStore, DirectoryBrowser, FileTransfer, LocalByteStore, TargetPath, TransferError,
    DEFAULT_CHUNK_SIZE,
};

// Re-export router types for convenience
pub use router::{OperationRouter, RouterError};

// Re-export gateway and service types for convenience
pub use gateway::{Backend, GatewayError, TransferGateway};
pub use service::GatewayService;

// Re-export client types for convenience
pub use client::{ClientError, Invoker, LocalInvoker, RemoteInvoker, TransferClient};

// Re-export network types for convenience
pub use network::{Endpoint, Inventory, MountTargetReport, ReachError, ReachabilityAnalyzer};
