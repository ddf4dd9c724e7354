//! Resumable chunked transfer with no server-side session.
//!
//! Every call stands alone:
//! - Uploads write one chunk at its declared byte offset and check the total
//!   size when the final chunk lands
//! - Downloads read one fixed window at the offset the client echoes back,
//!   and return the bookkeeping for the next call
//!
//! A crashed invocation loses at most the chunk it was handling; the client
//! retries it at the same offset.

use std::io;
use std::sync::Arc;

use protocol::messages::{encode_chunk, DownloadReply, DownloadRequest, UploadChunk};
use protocol::{Reply, StatusCode, StatusReply};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::locks::TargetLocks;
use super::store::ByteStore;
use super::target::{TargetError, TargetPath};

/// Default transfer unit (2 MB).
pub const DEFAULT_CHUNK_SIZE: u64 = 2_000_000;

/// Byte Store operation that failed, used to pick a stable reply message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    /// Chunk write or the stat that follows it.
    Write,
    /// Download stat or read.
    Read,
    /// Directory enumeration.
    List,
    /// Directory creation.
    MakeDir,
    /// File removal.
    Delete,
}

impl IoOperation {
    fn public_message(self) -> &'static str {
        match self {
            IoOperation::Write => "couldn't write the file to disk",
            IoOperation::Read => "couldn't read the file from disk",
            IoOperation::List => "unable to list files",
            IoOperation::MakeDir => "couldn't create the directory",
            IoOperation::Delete => "couldn't delete the file",
        }
    }
}

/// Errors that can occur while handling a file operation.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Malformed target name.
    #[error("invalid target: {0}")]
    Target(#[from] TargetError),

    /// Chunk 0 of an upload names a target that already exists.
    #[error("file already exists: {0}")]
    Conflict(TargetPath),

    /// Upload chunk larger than the transfer unit.
    #[error("chunk of {size} bytes exceeds the transfer unit of {limit} bytes")]
    ChunkTooLarge { size: u64, limit: u64 },

    /// Continuation that cannot be advanced.
    #[error("invalid continuation: {0}")]
    InvalidContinuation(String),

    /// Byte Store failure.
    #[error("{operation:?} failed for {target}: {source}")]
    Io {
        operation: IoOperation,
        target: TargetPath,
        #[source]
        source: io::Error,
    },

    /// Final chunk written but the file size disagrees with the declared total.
    #[error("size mismatch for {target}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        target: TargetPath,
        expected: u64,
        actual: u64,
    },
}

impl TransferError {
    fn io(operation: IoOperation, target: &TargetPath) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| TransferError::Io {
            operation,
            target: target.clone(),
            source,
        }
    }

    /// Application status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            TransferError::Target(_)
            | TransferError::Conflict(_)
            | TransferError::ChunkTooLarge { .. }
            | TransferError::InvalidContinuation(_) => StatusCode::BAD_REQUEST,
            TransferError::Io { .. } | TransferError::IntegrityMismatch { .. } => {
                StatusCode::INTERNAL_ERROR
            }
        }
    }

    /// Message safe to return to a client. Never includes raw I/O detail.
    pub fn public_message(&self) -> String {
        match self {
            TransferError::Conflict(_) => "File already exists".to_string(),
            TransferError::IntegrityMismatch { .. } => "Size mismatch".to_string(),
            TransferError::Io { operation, .. } => operation.public_message().to_string(),
            other => other.to_string(),
        }
    }
}

impl From<TransferError> for Reply {
    fn from(err: TransferError) -> Self {
        Reply::Status(StatusReply::new(err.status_code(), err.public_message()))
    }
}

/// Result of a successfully written chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Intermediate chunk stored.
    ChunkAccepted { chunk_index: u64, total_chunk_count: u64 },
    /// Final chunk stored and the file size matches.
    Complete { total_file_size: u64 },
}

impl UploadOutcome {
    /// Stable reply message.
    pub fn message(&self) -> &'static str {
        match self {
            UploadOutcome::ChunkAccepted { .. } => "chunk accepted",
            UploadOutcome::Complete { .. } => "upload complete",
        }
    }
}

impl From<UploadOutcome> for Reply {
    fn from(outcome: UploadOutcome) -> Self {
        Reply::Status(StatusReply::new(StatusCode::OK, outcome.message()))
    }
}

/// Chunk upload and download handler over a Byte Store.
pub struct FileTransfer<S: ByteStore> {
    store: Arc<S>,
    /// Download window and default upload bound.
    chunk_size: u64,
    /// Largest decoded upload chunk accepted.
    max_upload_chunk: u64,
    /// Present when writers to the same target are serialised.
    locks: Option<Arc<TargetLocks>>,
}

impl<S: ByteStore> FileTransfer<S> {
    /// Create a handler with the given transfer unit.
    pub fn new(store: Arc<S>, chunk_size: u64) -> Self {
        Self {
            store,
            chunk_size,
            max_upload_chunk: chunk_size,
            locks: None,
        }
    }

    /// Set the largest accepted upload chunk.
    pub fn with_max_upload_chunk(mut self, max_upload_chunk: u64) -> Self {
        self.max_upload_chunk = max_upload_chunk;
        self
    }

    /// Serialise chunk writes per target through `locks`.
    pub fn with_target_locks(mut self, locks: Arc<TargetLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Write one chunk at its declared offset.
    ///
    /// Chunk 0 to an existing target is a conflict and writes nothing. On the
    /// final chunk the resulting file size is compared to the declared total;
    /// a mismatch leaves the partial file in place.
    pub fn write_chunk(&self, chunk: &UploadChunk) -> Result<UploadOutcome, TransferError> {
        let size = chunk.content.len() as u64;
        if size > self.max_upload_chunk {
            return Err(TransferError::ChunkTooLarge {
                size,
                limit: self.max_upload_chunk,
            });
        }

        let target = TargetPath::entry(&chunk.path, &chunk.filename)?;

        match &self.locks {
            Some(locks) => locks.with_lock(&target, || self.write_chunk_unlocked(&target, chunk)),
            None => self.write_chunk_unlocked(&target, chunk),
        }
    }

    fn write_chunk_unlocked(
        &self,
        target: &TargetPath,
        chunk: &UploadChunk,
    ) -> Result<UploadOutcome, TransferError> {
        if chunk.chunk_index == 0
            && self
                .store
                .exists(target)
                .map_err(TransferError::io(IoOperation::Write, target))?
        {
            warn!(target = %target, "Refusing to restart upload over existing file");
            return Err(TransferError::Conflict(target.clone()));
        }

        self.store
            .write_at(target, chunk.chunk_byte_offset, &chunk.content)
            .map_err(TransferError::io(IoOperation::Write, target))?;

        if !chunk.is_final() {
            debug!(
                target = %target,
                chunk = chunk.chunk_index + 1,
                total_chunks = chunk.total_chunk_count,
                offset = chunk.chunk_byte_offset,
                "Chunk written"
            );
            return Ok(UploadOutcome::ChunkAccepted {
                chunk_index: chunk.chunk_index,
                total_chunk_count: chunk.total_chunk_count,
            });
        }

        let expected = chunk.total_file_size.ok_or_else(|| {
            TransferError::InvalidContinuation("final chunk without dztotalfilesize".to_string())
        })?;
        let actual = self
            .store
            .size(target)
            .map_err(TransferError::io(IoOperation::Write, target))?;

        if actual != expected {
            warn!(
                target = %target,
                expected,
                actual,
                "Upload completed with a size mismatch"
            );
            return Err(TransferError::IntegrityMismatch {
                target: target.clone(),
                expected,
                actual,
            });
        }

        info!(target = %target, size = actual, "Upload complete");
        Ok(UploadOutcome::Complete {
            total_file_size: actual,
        })
    }

    /// Read one window of a file.
    ///
    /// Without a continuation the window starts at 0 and is reported as
    /// index 0. With one, the window starts at the echoed offset and the
    /// index advances by one. The chunk count is recomputed from the current
    /// file size on every call.
    pub fn read_chunk(&self, request: &DownloadRequest) -> Result<DownloadReply, TransferError> {
        let target = TargetPath::entry(&request.path, &request.filename)?;

        let (chunk_index, offset) = match request.continuation {
            None => (0, 0),
            Some(cont) => {
                let next = cont.chunk_index.checked_add(1).ok_or_else(|| {
                    TransferError::InvalidContinuation(format!(
                        "chunk index {} cannot be advanced",
                        cont.chunk_index
                    ))
                })?;
                (next, cont.byte_offset)
            }
        };

        let file_size = self
            .store
            .size(&target)
            .map_err(TransferError::io(IoOperation::Read, &target))?;
        let total_chunk_count = file_size.div_ceil(self.chunk_size);

        let data = self
            .store
            .read_at(&target, offset, self.chunk_size)
            .map_err(TransferError::io(IoOperation::Read, &target))?;

        debug!(
            target = %target,
            chunk = chunk_index,
            total_chunks = total_chunk_count,
            offset,
            bytes = data.len(),
            "Chunk read"
        );

        Ok(DownloadReply {
            status_code: StatusCode::OK,
            message: "chunk read".to_string(),
            chunk_index,
            total_chunk_count,
            next_byte_offset: offset.saturating_add(self.chunk_size),
            chunk_data: encode_chunk(&data),
            total_file_size: file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::store::{DirectoryListing, LocalByteStore};
    use protocol::Continuation;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn transfer(root: &Path, chunk_size: u64) -> FileTransfer<LocalByteStore> {
        let store = Arc::new(LocalByteStore::new(root).unwrap());
        FileTransfer::new(store, chunk_size)
    }

    fn chunk(index: u64, total: u64, offset: u64, content: &[u8], total_size: Option<u64>) -> UploadChunk {
        UploadChunk {
            path: "/".to_string(),
            filename: "upload.bin".to_string(),
            uuid: Some("10f726ea-ae1d-4363-9a97-4bf6772cd4df".to_string()),
            chunk_index: index,
            chunk_size: Some(content.len() as u64),
            total_chunk_count: total,
            chunk_byte_offset: offset,
            total_file_size: total_size,
            content: content.to_vec(),
        }
    }

    fn download(continuation: Option<Continuation>) -> DownloadRequest {
        DownloadRequest {
            path: "/".to_string(),
            filename: "file.bin".to_string(),
            continuation,
        }
    }

    /// Byte Store whose every operation fails.
    struct FailingStore;

    impl ByteStore for FailingStore {
        fn exists(&self, _: &TargetPath) -> io::Result<bool> {
            Ok(false)
        }
        fn size(&self, _: &TargetPath) -> io::Result<u64> {
            Err(io::Error::other("stat failed"))
        }
        fn write_at(&self, _: &TargetPath, _: u64, _: &[u8]) -> io::Result<()> {
            Err(io::Error::other("disk on fire"))
        }
        fn read_at(&self, _: &TargetPath, _: u64, _: u64) -> io::Result<Vec<u8>> {
            Err(io::Error::other("read failed"))
        }
        fn list(&self, _: &TargetPath) -> io::Result<DirectoryListing> {
            Err(io::Error::other("list failed"))
        }
        fn make_dir(&self, _: &TargetPath) -> io::Result<()> {
            Err(io::Error::other("mkdir failed"))
        }
        fn remove(&self, _: &TargetPath) -> io::Result<()> {
            Err(io::Error::other("remove failed"))
        }
    }

    #[test]
    fn test_upload_in_order_completes_on_final_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        let first = transfer.write_chunk(&chunk(0, 3, 0, b"Hell", None)).unwrap();
        assert_eq!(
            first,
            UploadOutcome::ChunkAccepted {
                chunk_index: 0,
                total_chunk_count: 3
            }
        );
        transfer.write_chunk(&chunk(1, 3, 4, b"o, W", None)).unwrap();
        let last = transfer.write_chunk(&chunk(2, 3, 8, b"orld", Some(12))).unwrap();

        assert_eq!(last, UploadOutcome::Complete { total_file_size: 12 });
        assert_eq!(fs::read(temp_dir.path().join("upload.bin")).unwrap(), b"Hello, World");
    }

    #[test]
    fn test_single_chunk_upload() {
        let temp_dir = TempDir::new().unwrap();
        let transfer = transfer(temp_dir.path(), 1024);

        let outcome = transfer.write_chunk(&chunk(0, 1, 0, b"test", Some(4))).unwrap();
        assert_eq!(outcome.message(), "upload complete");
    }

    #[test]
    fn test_restart_at_chunk_zero_is_conflict() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("upload.bin"), b"existing").unwrap();
        let transfer = transfer(temp_dir.path(), 1024);

        let err = transfer.write_chunk(&chunk(0, 2, 0, b"new!", None)).unwrap_err();

        assert!(matches!(err, TransferError::Conflict(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "File already exists");
        assert_eq!(fs::read(temp_dir.path().join("upload.bin")).unwrap(), b"existing");
    }

    #[test]
    fn test_restart_conflict_with_empty_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("upload.bin"), b"").unwrap();
        let transfer = transfer(temp_dir.path(), 1024);

        let err = transfer.write_chunk(&chunk(0, 1, 0, b"", Some(0))).unwrap_err();
        assert!(matches!(err, TransferError::Conflict(_)));
    }

    #[test]
    fn test_redelivered_chunk_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        transfer.write_chunk(&chunk(0, 2, 0, b"abcd", None)).unwrap();
        transfer.write_chunk(&chunk(1, 2, 4, b"ef", Some(6))).unwrap();
        let once = fs::read(temp_dir.path().join("upload.bin")).unwrap();

        // Same non-zero chunk again at the same offset.
        transfer.write_chunk(&chunk(1, 2, 4, b"ef", Some(6))).unwrap();
        let twice = fs::read(temp_dir.path().join("upload.bin")).unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice, b"abcdef");
    }

    #[test]
    fn test_size_mismatch_on_final_chunk_only() {
        let temp_dir = TempDir::new().unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        // The declared total is wrong but only the final chunk checks it.
        let first = transfer.write_chunk(&chunk(0, 2, 0, b"abcd", Some(100)));
        assert!(first.is_ok());

        let err = transfer.write_chunk(&chunk(1, 2, 4, b"ef", Some(100))).unwrap_err();
        match &err {
            TransferError::IntegrityMismatch { expected, actual, .. } => {
                assert_eq!(*expected, 100);
                assert_eq!(*actual, 6);
            }
            other => panic!("expected IntegrityMismatch, got {other:?}"),
        }
        assert_eq!(err.status_code(), StatusCode::INTERNAL_ERROR);
        assert_eq!(err.public_message(), "Size mismatch");

        // Partial file stays in place.
        assert!(temp_dir.path().join("upload.bin").exists());
    }

    #[test]
    fn test_out_of_order_gap_detected_by_size_check() {
        let temp_dir = TempDir::new().unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        transfer.write_chunk(&chunk(0, 3, 0, b"abcd", None)).unwrap();
        // Chunk 1 never arrives; the final chunk lands past a gap.
        let outcome = transfer.write_chunk(&chunk(2, 3, 8, b"ij", Some(9)));

        assert!(matches!(
            outcome,
            Err(TransferError::IntegrityMismatch { actual: 10, .. })
        ));
    }

    #[test]
    fn test_chunk_larger_than_unit_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        let err = transfer.write_chunk(&chunk(0, 1, 0, b"too long", Some(8))).unwrap_err();
        assert!(matches!(err, TransferError::ChunkTooLarge { size: 8, limit: 4 }));
        assert!(!temp_dir.path().join("upload.bin").exists());
    }

    #[test]
    fn test_upload_traversal_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let transfer = transfer(temp_dir.path(), 4);
        let mut bad = chunk(0, 1, 0, b"x", Some(1));
        bad.path = "../outside".to_string();

        let err = transfer.write_chunk(&bad).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upload_through_dangling_symlink_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let planted = outside.path().join("planted.bin");
        std::os::unix::fs::symlink(&planted, temp_dir.path().join("upload.bin")).unwrap();
        let transfer = transfer(temp_dir.path(), 1024);

        let err = transfer.write_chunk(&chunk(0, 1, 0, b"owned", Some(5))).unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_ERROR);
        assert!(!planted.exists());
    }

    #[test]
    fn test_write_failure_is_io_error_with_stable_message() {
        let transfer = FileTransfer::new(Arc::new(FailingStore), 1024);

        let err = transfer.write_chunk(&chunk(0, 1, 0, b"test", Some(4))).unwrap_err();

        assert!(matches!(
            err,
            TransferError::Io {
                operation: IoOperation::Write,
                ..
            }
        ));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_ERROR);
        assert_eq!(err.public_message(), "couldn't write the file to disk");
        assert!(!err.public_message().contains("disk on fire"));
    }

    #[test]
    fn test_serialised_writers_still_write() {
        let temp_dir = TempDir::new().unwrap();
        let locks = Arc::new(TargetLocks::new());
        let transfer = transfer(temp_dir.path(), 4).with_target_locks(Arc::clone(&locks));

        transfer.write_chunk(&chunk(0, 1, 0, b"lock", Some(4))).unwrap();

        assert_eq!(locks.active(), 0);
        assert_eq!(fs::read(temp_dir.path().join("upload.bin")).unwrap(), b"lock");
    }

    #[test]
    fn test_download_first_call() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("file.bin"), b"0123456789").unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        let reply = transfer.read_chunk(&download(None)).unwrap();

        assert_eq!(reply.chunk_index, 0);
        assert_eq!(reply.total_chunk_count, 3);
        assert_eq!(reply.next_byte_offset, 4);
        assert_eq!(reply.total_file_size, 10);
        assert_eq!(reply.data().unwrap(), b"0123");
    }

    #[test]
    fn test_download_continuation_and_short_last_window() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("file.bin"), b"0123456789").unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        let reply = transfer
            .read_chunk(&download(Some(Continuation {
                chunk_index: 1,
                byte_offset: 8,
            })))
            .unwrap();

        assert_eq!(reply.chunk_index, 2);
        assert_eq!(reply.next_byte_offset, 12);
        assert_eq!(reply.data().unwrap(), b"89");
        assert!(!reply.is_done());
    }

    #[test]
    fn test_download_sequence_reconstructs_file() {
        let temp_dir = TempDir::new().unwrap();
        let original: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        fs::write(temp_dir.path().join("file.bin"), &original).unwrap();
        let transfer = transfer(temp_dir.path(), 64);

        let mut rebuilt = Vec::new();
        let mut continuation = None;
        let mut windows = 0;
        loop {
            let reply = transfer.read_chunk(&download(continuation)).unwrap();
            if reply.is_done() {
                break;
            }
            rebuilt.extend(reply.data().unwrap());
            windows += 1;
            continuation = Some(reply.continuation());
        }

        assert_eq!(rebuilt, original);
        assert_eq!(windows, 1000u64.div_ceil(64));
    }

    #[test]
    fn test_download_empty_file_is_done_immediately() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("file.bin"), b"").unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        let reply = transfer.read_chunk(&download(None)).unwrap();

        assert_eq!(reply.total_chunk_count, 0);
        assert!(reply.is_done());
        assert!(reply.data().unwrap().is_empty());
    }

    #[test]
    fn test_download_missing_file_is_read_failure() {
        let temp_dir = TempDir::new().unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        let err = transfer.read_chunk(&download(None)).unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_ERROR);
        assert_eq!(err.public_message(), "couldn't read the file from disk");
    }

    #[test]
    fn test_download_read_failure_on_continuation() {
        let transfer = FileTransfer::new(Arc::new(FailingStore), 4);

        let err = transfer
            .read_chunk(&download(Some(Continuation {
                chunk_index: 0,
                byte_offset: 0,
            })))
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Io {
                operation: IoOperation::Read,
                ..
            }
        ));
    }

    #[test]
    fn test_download_unadvanceable_continuation() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("file.bin"), b"x").unwrap();
        let transfer = transfer(temp_dir.path(), 4);

        let err = transfer
            .read_chunk(&download(Some(Continuation {
                chunk_index: u64::MAX,
                byte_offset: 0,
            })))
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidContinuation(_)));
    }
}
