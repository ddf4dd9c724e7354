//! Transfer gateway: routes an envelope to the backend of a filesystem.
//!
//! The gateway is the only place a filesystem id is interpreted. An unknown
//! id is a transport-level failure, reported as [`GatewayError`] rather than
//! as an application `statusCode`.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::files::{ByteStore, FileTransfer, LocalByteStore, TargetLocks};
use crate::router::OperationRouter;

/// Transport-level gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No backend is registered for the filesystem id.
    #[error("unknown filesystem: {0}")]
    UnknownFilesystem(String),

    /// A filesystem root could not be opened.
    #[error("failed to open filesystem {id} at {root}: {source}")]
    Store {
        id: String,
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backend could not produce a result envelope.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// A single file manager backend.
///
/// One invocation takes one raw operation envelope and returns one result
/// envelope. Implementations hold no state between invocations.
pub trait Backend: Send + Sync {
    /// Handle one envelope.
    fn invoke(&self, event: &Value) -> Result<Value, GatewayError>;
}

impl<S: ByteStore> Backend for OperationRouter<S> {
    fn invoke(&self, event: &Value) -> Result<Value, GatewayError> {
        self.handle(event)
            .to_value()
            .map_err(|e| GatewayError::Backend(e.to_string()))
    }
}

/// Filesystem id to backend routing table.
#[derive(Default)]
pub struct TransferGateway {
    backends: BTreeMap<String, Arc<dyn Backend>>,
}

impl TransferGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a gateway serving every configured filesystem from its local root.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let mut gateway = Self::new();

        for fs in &config.filesystems {
            let store = LocalByteStore::new(&fs.root).map_err(|source| GatewayError::Store {
                id: fs.id.clone(),
                root: fs.root.clone(),
                source,
            })?;
            let store = Arc::new(store);

            let mut transfer = FileTransfer::new(Arc::clone(&store), config.transfer.chunk_size)
                .with_max_upload_chunk(config.transfer.max_upload_chunk);
            if config.transfer.serialize_writers {
                transfer = transfer.with_target_locks(Arc::new(TargetLocks::new()));
            }

            info!(
                filesystem = %fs.id,
                root = %store.root().display(),
                serialize_writers = config.transfer.serialize_writers,
                "Filesystem registered"
            );
            gateway.register(&fs.id, OperationRouter::new(store, transfer));
        }

        Ok(gateway)
    }

    /// Register (or replace) the backend for `filesystem_id`.
    pub fn register(&mut self, filesystem_id: impl Into<String>, backend: impl Backend + 'static) {
        self.backends.insert(filesystem_id.into(), Arc::new(backend));
    }

    /// Ids of every registered filesystem, sorted.
    pub fn filesystems(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// Route one envelope to the backend of `filesystem_id`.
    pub fn route(&self, filesystem_id: &str, event: &Value) -> Result<Value, GatewayError> {
        let backend = self
            .backends
            .get(filesystem_id)
            .ok_or_else(|| GatewayError::UnknownFilesystem(filesystem_id.to_string()))?;

        debug!(filesystem = %filesystem_id, "Routing invocation");
        backend.invoke(event)
    }
}
