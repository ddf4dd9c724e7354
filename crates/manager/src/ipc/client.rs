//! IPC client for talking to the gateway over Unix Domain Sockets.
//!
//! The client connects to the gateway's Unix socket and sends requests,
//! receiving responses in a request-response pattern.

use std::io;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::messages::{IpcRequest, IpcResponse};
use super::server::IpcError;

/// Default timeout for client operations in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A client for communicating with the gateway via IPC.
pub struct IpcClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    timeout: Duration,
}

fn timed_out(what: &str) -> IpcError {
    IpcError::Io(io::Error::new(io::ErrorKind::TimedOut, format!("{} timed out", what)))
}

impl IpcClient {
    /// Connect to the gateway at the specified socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    /// This typically indicates that the gateway is not running.
    pub async fn connect(path: &Path) -> Result<Self, IpcError> {
        Self::connect_with_timeout(path, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await
    }

    /// Connect to the gateway with a custom timeout.
    ///
    /// The timeout applies to the connect itself and to every later request.
    pub async fn connect_with_timeout(path: &Path, timeout: Duration) -> Result<Self, IpcError> {
        let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
            .await
            .map_err(|_| timed_out("connection"))??;

        let (read_half, write_half) = tokio::io::split(stream);

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout,
        })
    }

    /// Set the timeout for operations.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a request to the gateway and wait for a response.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request cannot be serialized or sent
    /// - The response cannot be read or parsed
    /// - The operation times out
    pub async fn send(&mut self, request: IpcRequest) -> Result<IpcResponse, IpcError> {
        tokio::time::timeout(self.timeout, self.send_internal(request))
            .await
            .map_err(|_| timed_out("operation"))?
    }

    async fn send_internal(&mut self, request: IpcRequest) -> Result<IpcResponse, IpcError> {
        let mut json = serde_json::to_string(&request)?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Err(IpcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "gateway closed connection",
            )));
        }

        Ok(serde_json::from_str(line.trim())?)
    }

    /// Send a ping request to check if the gateway is responsive.
    pub async fn ping(&mut self) -> Result<bool, IpcError> {
        let response = self.send(IpcRequest::Ping).await?;
        Ok(matches!(response, IpcResponse::Pong))
    }

    /// Filesystem ids served by the gateway.
    pub async fn filesystems(&mut self) -> Result<Vec<String>, IpcError> {
        match self.send(IpcRequest::Filesystems).await? {
            IpcResponse::Filesystems { ids } => Ok(ids),
            IpcResponse::Error { message } => Err(IpcError::Remote(message)),
            other => Err(IpcError::UnexpectedResponse(format!("{:?}", other))),
        }
    }

    /// Run one backend invocation and return its result envelope.
    ///
    /// An application-level failure (for example `statusCode: 500`) is a
    /// successful invocation; only transport failures are errors here.
    pub async fn invoke(&mut self, filesystem_id: &str, event: Value) -> Result<Value, IpcError> {
        let request = IpcRequest::Invoke {
            filesystem_id: filesystem_id.to_string(),
            event,
        };
        match self.send(request).await? {
            IpcResponse::Invoked { payload } => Ok(payload),
            IpcResponse::Error { message } => Err(IpcError::Remote(message)),
            other => Err(IpcError::UnexpectedResponse(format!("{:?}", other))),
        }
    }
}
