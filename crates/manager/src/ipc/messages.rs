//! IPC message types for gateway communication.
//!
//! This module defines the request and response types exchanged with the
//! transfer gateway over Unix Domain Sockets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requests that can be sent to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IpcRequest {
    /// Check if the gateway is alive.
    Ping,
    /// List the filesystems the gateway serves.
    Filesystems,
    /// Run one backend invocation.
    Invoke {
        /// Filesystem whose backend handles the envelope.
        filesystem_id: String,
        /// Raw operation envelope.
        event: Value,
    },
}

/// Responses sent from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IpcResponse {
    /// Response to a Ping request.
    Pong,
    /// Served filesystem ids.
    Filesystems {
        /// Sorted filesystem ids.
        ids: Vec<String>,
    },
    /// Result envelope of an invocation. May carry any application status.
    Invoked {
        /// The backend's result envelope.
        payload: Value,
    },
    /// The request could not be delivered to a backend.
    Error {
        /// Human-readable error message.
        message: String,
    },
}
