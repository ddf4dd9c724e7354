//! Unix Domain Socket IPC between clients and the transfer gateway.
//!
//! ## Overview
//!
//! The IPC system uses a JSON newline-delimited protocol. Each message is a
//! single JSON object followed by a newline. An `Invoke` request carries one
//! raw operation envelope; the `Invoked` response carries the backend's
//! result envelope unchanged.
//!
//! ## Socket Path
//!
//! The socket path follows the XDG Base Directory Specification:
//! - Primary: `$XDG_RUNTIME_DIR/sfm/gateway.sock`
//! - Fallback: `/tmp/sfm-$UID/gateway.sock`
//!
//! ## Example
//!
//! ```rust,no_run
//! use manager::ipc::{IpcClient, get_socket_path};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = IpcClient::connect(&get_socket_path()).await?;
//!
//!     let reply = client
//!         .invoke("fs-01234567", json!({ "operation": "list", "path": "/" }))
//!         .await?;
//!     println!("{}", reply["message"]);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod messages;
mod server;

pub use client::IpcClient;
pub use messages::{IpcRequest, IpcResponse};
pub use server::{
    frame_len_for_chunk, IpcConnection, IpcError, IpcServer, FRAME_OVERHEAD_BYTES, MAX_FRAME_BYTES,
};

use std::path::PathBuf;

/// Get the socket path for gateway IPC.
///
/// ## Path Resolution
///
/// 1. If `$XDG_RUNTIME_DIR` is set: `$XDG_RUNTIME_DIR/sfm/gateway.sock`
/// 2. Otherwise: `/tmp/sfm-$UID/gateway.sock`
#[cfg(unix)]
pub fn get_socket_path() -> PathBuf {
    use std::os::unix::fs::MetadataExt;

    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("sfm").join("gateway.sock")
    } else {
        // Get UID by checking metadata of a file we own
        let uid = std::fs::metadata("/proc/self")
            .map(|m| m.uid())
            .unwrap_or(0);

        PathBuf::from(format!("/tmp/sfm-{}", uid)).join("gateway.sock")
    }
}

/// Non-Unix platforms are not supported for Unix Domain Sockets.
#[cfg(not(unix))]
pub fn get_socket_path() -> PathBuf {
    PathBuf::from("/tmp/sfm-unsupported/gateway.sock")
}
