//! Client-side driver for the chunked transfer protocol.
//!
//! The backend keeps no session, so the client carries all progress:
//! uploads send every chunk with its index and byte offset, downloads echo
//! back the continuation of the previous reply until the chunk count is
//! reached.

use std::io;
use std::path::Path;
use std::sync::Arc;

use protocol::{
    Continuation, DeleteRequest, DownloadRequest, ListReply, ListRequest, MakeDirRequest,
    Operation, ProtocolError, Reply, StatusCode, StatusReply, UploadChunk,
};
use serde_json::Value;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::files::DEFAULT_CHUNK_SIZE;
use crate::gateway::{GatewayError, TransferGateway};
use crate::ipc::{IpcClient, IpcError};

/// Errors raised while driving a transfer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// IPC transport failure.
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// In-process gateway failure.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The backend answered with a non-success status.
    #[error("{message} (status {status})")]
    Rejected { status: StatusCode, message: String },

    /// The reply could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Local file failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The reply was well formed but not what the operation expects.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Something that can run one backend invocation.
#[allow(async_fn_in_trait)]
pub trait Invoker {
    /// Send one operation envelope and return the result envelope.
    async fn invoke(&mut self, event: Value) -> Result<Value, ClientError>;
}

/// Invokes a filesystem backend through a running gateway.
pub struct RemoteInvoker {
    client: IpcClient,
    filesystem_id: String,
}

impl RemoteInvoker {
    /// Wrap a connected IPC client.
    pub fn new(client: IpcClient, filesystem_id: impl Into<String>) -> Self {
        Self {
            client,
            filesystem_id: filesystem_id.into(),
        }
    }
}

impl Invoker for RemoteInvoker {
    async fn invoke(&mut self, event: Value) -> Result<Value, ClientError> {
        Ok(self.client.invoke(&self.filesystem_id, event).await?)
    }
}

/// Invokes a filesystem backend in-process.
pub struct LocalInvoker {
    gateway: Arc<TransferGateway>,
    filesystem_id: String,
}

impl LocalInvoker {
    /// Route invocations for `filesystem_id` through `gateway`.
    pub fn new(gateway: Arc<TransferGateway>, filesystem_id: impl Into<String>) -> Self {
        Self {
            gateway,
            filesystem_id: filesystem_id.into(),
        }
    }
}

impl Invoker for LocalInvoker {
    async fn invoke(&mut self, event: Value) -> Result<Value, ClientError> {
        let gateway = Arc::clone(&self.gateway);
        let filesystem_id = self.filesystem_id.clone();
        let result = tokio::task::spawn_blocking(move || gateway.route(&filesystem_id, &event))
            .await
            .map_err(io::Error::other)?;
        Ok(result?)
    }
}

/// Drives uploads, downloads and flat directory operations.
pub struct TransferClient<I: Invoker> {
    invoker: I,
    chunk_size: u64,
}

impl<I: Invoker> TransferClient<I> {
    /// Create a driver using the default transfer unit.
    pub fn new(invoker: I) -> Self {
        Self {
            invoker,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use a different upload chunk size.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn call(&mut self, operation: &Operation) -> Result<Reply, ClientError> {
        let payload = self.invoker.invoke(operation.to_value()).await?;
        let reply = Reply::from_value(payload)?;

        if !reply.status_code().is_success() {
            return Err(ClientError::Rejected {
                status: reply.status_code(),
                message: reply.message().to_string(),
            });
        }
        Ok(reply)
    }

    async fn call_status(&mut self, operation: &Operation) -> Result<StatusReply, ClientError> {
        match self.call(operation).await? {
            Reply::Status(reply) => Ok(reply),
            other => Err(ClientError::UnexpectedReply(format!(
                "{} returned {:?}",
                operation.name(),
                other
            ))),
        }
    }

    /// Upload `local` as `remote_dir/filename`. Returns the bytes sent.
    ///
    /// Chunks are sent in index order and the first rejected chunk stops the
    /// upload. An empty file is sent as a single empty chunk.
    pub async fn upload_file(
        &mut self,
        local: &Path,
        remote_dir: &str,
        filename: &str,
    ) -> Result<u64, ClientError> {
        let mut file = File::open(local).await?;
        let total_file_size = file.metadata().await?.len();
        let total_chunk_count = total_file_size.div_ceil(self.chunk_size).max(1);
        let uuid = Uuid::new_v4().to_string();

        info!(
            local = %local.display(),
            remote = %format!("{}/{}", remote_dir.trim_end_matches('/'), filename),
            size = total_file_size,
            chunks = total_chunk_count,
            "Starting upload"
        );

        let mut offset = 0u64;
        for chunk_index in 0..total_chunk_count {
            let mut content = Vec::new();
            (&mut file)
                .take(self.chunk_size)
                .read_to_end(&mut content)
                .await?;

            let is_final = chunk_index + 1 == total_chunk_count;
            let chunk = UploadChunk {
                path: remote_dir.to_string(),
                filename: filename.to_string(),
                uuid: Some(uuid.clone()),
                chunk_index,
                chunk_size: Some(self.chunk_size),
                total_chunk_count,
                chunk_byte_offset: offset,
                total_file_size: is_final.then_some(total_file_size),
                content,
            };
            let len = chunk.content.len() as u64;

            let reply = self.call_status(&Operation::Upload(chunk)).await?;
            debug!(chunk = chunk_index, offset, bytes = len, message = %reply.message, "Chunk sent");
            offset += len;
        }

        info!(size = offset, "Upload complete");
        Ok(offset)
    }

    /// Download `remote_dir/filename` into a new file at `local`. Returns
    /// the bytes written.
    ///
    /// Fails if `local` already exists. On any later failure the partially
    /// written file is removed, so the same download can be retried.
    pub async fn download_file(
        &mut self,
        remote_dir: &str,
        filename: &str,
        local: &Path,
    ) -> Result<u64, ClientError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(local)
            .await?;

        match self.receive_into(remote_dir, filename, &mut file).await {
            Ok(written) => {
                info!(local = %local.display(), size = written, "Download complete");
                Ok(written)
            }
            Err(e) => {
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(local).await {
                    warn!(local = %local.display(), error = %cleanup, "Failed to remove partial download");
                }
                Err(e)
            }
        }
    }

    async fn receive_into(
        &mut self,
        remote_dir: &str,
        filename: &str,
        file: &mut File,
    ) -> Result<u64, ClientError> {
        let mut continuation: Option<Continuation> = None;
        let mut written = 0u64;

        loop {
            let operation = Operation::Download(DownloadRequest {
                path: remote_dir.to_string(),
                filename: filename.to_string(),
                continuation,
            });
            let window = match self.call(&operation).await? {
                Reply::Download(window) => window,
                other => {
                    return Err(ClientError::UnexpectedReply(format!(
                        "download returned {:?}",
                        other
                    )))
                }
            };

            if window.is_done() {
                break;
            }

            let data = window.data()?;
            if data.is_empty() {
                return Err(ClientError::UnexpectedReply(format!(
                    "empty chunk {} of {}",
                    window.chunk_index, window.total_chunk_count
                )));
            }

            file.write_all(&data).await?;
            written += data.len() as u64;
            debug!(
                chunk = window.chunk_index,
                total_chunks = window.total_chunk_count,
                bytes = data.len(),
                "Chunk received"
            );
            continuation = Some(window.continuation());
        }

        file.flush().await?;
        Ok(written)
    }

    /// List one directory level.
    pub async fn list(&mut self, path: &str) -> Result<ListReply, ClientError> {
        let operation = Operation::List(ListRequest {
            path: path.to_string(),
        });
        match self.call(&operation).await? {
            Reply::Listing(listing) => Ok(listing),
            other => Err(ClientError::UnexpectedReply(format!(
                "list returned {:?}",
                other
            ))),
        }
    }

    /// Create one directory.
    pub async fn make_dir(&mut self, path: &str, name: &str) -> Result<StatusReply, ClientError> {
        self.call_status(&Operation::MakeDir(MakeDirRequest {
            path: path.to_string(),
            name: name.to_string(),
        }))
        .await
    }

    /// Remove one file.
    pub async fn delete(&mut self, path: &str, name: &str) -> Result<StatusReply, ClientError> {
        self.call_status(&Operation::Delete(DeleteRequest {
            path: path.to_string(),
            name: name.to_string(),
        }))
        .await
    }
}
