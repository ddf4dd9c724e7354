//! Operation router for dispatching envelopes to file handlers.
//!
//! This module provides the `OperationRouter` struct that validates a raw
//! operation envelope once and routes it to the upload, download or flat
//! directory handlers. Every outcome, including failures, becomes a result
//! envelope; full error detail goes to the log only.

use std::sync::Arc;

use protocol::{Operation, ProtocolError, Reply, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::files::{ByteStore, DirectoryBrowser, FileTransfer, TransferError};

/// Errors that can occur while routing one envelope.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Envelope failed validation.
    #[error("invalid envelope: {0}")]
    Protocol(#[from] ProtocolError),

    /// Handler failed.
    #[error("{0}")]
    Transfer(#[from] TransferError),
}

impl RouterError {
    /// Application status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RouterError::Protocol(_) => StatusCode::BAD_REQUEST,
            RouterError::Transfer(e) => e.status_code(),
        }
    }

    /// Convert the error to a result envelope.
    pub fn to_reply(&self) -> Reply {
        match self {
            RouterError::Protocol(e) => e.clone().into(),
            RouterError::Transfer(e) => Reply::Status(protocol::StatusReply::new(
                e.status_code(),
                e.public_message(),
            )),
        }
    }
}

/// Routes operation envelopes to the handlers of one Byte Store.
pub struct OperationRouter<S: ByteStore> {
    /// Chunk upload and download handler.
    transfer: FileTransfer<S>,
    /// List, make_dir and delete handler.
    browser: DirectoryBrowser<S>,
}

impl<S: ByteStore> OperationRouter<S> {
    /// Create a router whose handlers share `store`.
    pub fn new(store: Arc<S>, transfer: FileTransfer<S>) -> Self {
        Self {
            transfer,
            browser: DirectoryBrowser::new(store),
        }
    }

    /// Validate and handle a raw envelope.
    pub fn handle(&self, event: &Value) -> Reply {
        let result = Operation::from_value(event)
            .map_err(RouterError::from)
            .and_then(|operation| self.dispatch(&operation));

        match result {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    RouterError::Protocol(inner) => {
                        warn!(error = %inner, "Rejected envelope");
                    }
                    RouterError::Transfer(inner @ TransferError::Io { source, .. }) => {
                        error!(error = %inner, cause = %source, "File operation failed");
                    }
                    RouterError::Transfer(inner) if inner.status_code() == StatusCode::BAD_REQUEST => {
                        warn!(error = %inner, "File operation rejected");
                    }
                    RouterError::Transfer(inner) => {
                        error!(error = %inner, "File operation failed");
                    }
                }
                e.to_reply()
            }
        }
    }

    /// Route a validated operation.
    pub fn dispatch(&self, operation: &Operation) -> Result<Reply, RouterError> {
        debug!(operation = operation.name(), "Routing operation");

        let reply = match operation {
            Operation::Upload(chunk) => self.transfer.write_chunk(chunk)?.into(),
            Operation::Download(request) => Reply::Download(self.transfer.read_chunk(request)?),
            Operation::List(request) => Reply::Listing(self.browser.list(request)?),
            Operation::MakeDir(request) => Reply::Status(self.browser.make_dir(request)?),
            Operation::Delete(request) => Reply::Status(self.browser.delete(request)?),
        };
        Ok(reply)
    }
}
