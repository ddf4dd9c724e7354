//! IPC server accepting gateway clients on a Unix Domain Socket.
//!
//! Each connection carries newline-delimited JSON requests. Connections are
//! independent and nothing survives between requests.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use super::messages::{IpcRequest, IpcResponse};

/// Largest accepted request line.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Room in a request line for everything besides the encoded chunk.
pub const FRAME_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Request line length needed to carry an upload chunk of `chunk_size` bytes.
pub fn frame_len_for_chunk(chunk_size: u64) -> u64 {
    chunk_size.div_ceil(3) * 4 + FRAME_OVERHEAD_BYTES
}

/// A server that listens for IPC connections on a Unix Domain Socket.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Bind the server to the specified socket path.
    ///
    /// Parent directories are created with mode `0700` and any stale socket
    /// file at the path is removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The parent directories cannot be created
    /// - The existing socket cannot be removed
    /// - The socket cannot be bound
    pub async fn bind(path: &Path) -> Result<Self, io::Error> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
                }
            }
        }

        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Path the server is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept a new incoming connection.
    pub async fn accept(&self) -> Result<IpcConnection, io::Error> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(IpcConnection::new(stream))
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// A connection to an IPC client.
///
/// This struct wraps a Unix stream and provides methods for reading
/// requests and sending responses using JSON newline-delimited protocol.
pub struct IpcConnection {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
}

impl IpcConnection {
    fn new(stream: UnixStream) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Read the next request from the client.
    ///
    /// Returns `None` if the client has disconnected. A line longer than
    /// [`MAX_FRAME_BYTES`] is discarded up to its newline, so the connection
    /// can carry on with the next request.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be read, is longer than
    /// [`MAX_FRAME_BYTES`], or is not a valid request.
    pub async fn read_request(&mut self) -> Result<Option<IpcRequest>, IpcError> {
        let mut line = Vec::new();
        let bytes_read = (&mut self.reader)
            .take(MAX_FRAME_BYTES as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;

        if bytes_read == 0 {
            return Ok(None);
        }
        if bytes_read > MAX_FRAME_BYTES {
            let discarded = if line.ends_with(b"\n") {
                0
            } else {
                self.discard_line().await?
            };
            return Err(IpcError::FrameTooLarge(bytes_read + discarded));
        }

        let request = serde_json::from_slice(line.trim_ascii())?;
        Ok(Some(request))
    }

    /// Skip input through the next newline. Returns the bytes skipped.
    async fn discard_line(&mut self) -> Result<usize, io::Error> {
        let mut discarded = 0;
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(discarded);
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.reader.consume(end + 1);
                    return Ok(discarded + end + 1);
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                    discarded += len;
                }
            }
        }
    }

    /// Send a response to the client.
    pub async fn send_response(&mut self, response: &IpcResponse) -> Result<(), IpcError> {
        let mut json = serde_json::to_string(response)?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;

        Ok(())
    }
}

/// Errors that can occur during IPC communication.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A JSON serialization/deserialization error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request line exceeded the frame limit.
    #[error("request of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    /// The gateway answered with an error.
    #[error("gateway error: {0}")]
    Remote(String),

    /// The gateway answered with a response of the wrong kind.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
