//! Flat directory operations: list, make_dir and delete.
//!
//! Each operation touches exactly one directory level. Nothing here recurses.

use std::sync::Arc;

use protocol::messages::{DeleteRequest, ListReply, ListRequest, MakeDirRequest};
use protocol::{StatusCode, StatusReply};
use tracing::{debug, info};

use super::store::ByteStore;
use super::target::TargetPath;
use super::transfer::{IoOperation, TransferError};

/// Directory browser over a Byte Store.
pub struct DirectoryBrowser<S: ByteStore> {
    store: Arc<S>,
}

impl<S: ByteStore> DirectoryBrowser<S> {
    /// Create a browser sharing `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Enumerate one level of `request.path`.
    pub fn list(&self, request: &ListRequest) -> Result<ListReply, TransferError> {
        let dir = TargetPath::dir(&request.path)?;
        let listing = self.store.list(&dir).map_err(|source| TransferError::Io {
            operation: IoOperation::List,
            target: dir.clone(),
            source,
        })?;

        debug!(
            path = %dir,
            directories = listing.directories.len(),
            files = listing.files.len(),
            "Directory listed"
        );

        Ok(ListReply {
            status_code: StatusCode::OK,
            message: "listing complete".to_string(),
            path: request.path.clone(),
            directories: listing.directories,
            files: listing.files,
        })
    }

    /// Create one directory. The parent must already exist.
    pub fn make_dir(&self, request: &MakeDirRequest) -> Result<StatusReply, TransferError> {
        let dir = TargetPath::entry(&request.path, &request.name)?;
        self.store.make_dir(&dir).map_err(|source| TransferError::Io {
            operation: IoOperation::MakeDir,
            target: dir.clone(),
            source,
        })?;

        info!(path = %dir, "Directory created");
        Ok(StatusReply::new(StatusCode::OK, "directory creation successful"))
    }

    /// Remove one file.
    pub fn delete(&self, request: &DeleteRequest) -> Result<StatusReply, TransferError> {
        let target = TargetPath::entry(&request.path, &request.name)?;
        self.store.remove(&target).map_err(|source| TransferError::Io {
            operation: IoOperation::Delete,
            target: target.clone(),
            source,
        })?;

        info!(path = %target, "File deleted");
        Ok(StatusReply::new(StatusCode::OK, "file deletion successful"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::store::LocalByteStore;
    use std::fs;
    use tempfile::TempDir;

    fn browser() -> (DirectoryBrowser<LocalByteStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(LocalByteStore::new(temp_dir.path()).unwrap());
        (DirectoryBrowser::new(store), temp_dir)
    }

    #[test]
    fn test_list_directory() {
        let (browser, temp_dir) = browser();
        fs::create_dir(temp_dir.path().join("subdir")).unwrap();
        fs::write(temp_dir.path().join("file.txt"), "hello").unwrap();

        let reply = browser
            .list(&ListRequest {
                path: "/".to_string(),
            })
            .unwrap();

        assert_eq!(reply.message, "listing complete");
        assert_eq!(reply.path, "/");
        assert_eq!(reply.directories, vec!["subdir"]);
        assert_eq!(reply.files, vec!["file.txt"]);
    }

    #[test]
    fn test_list_missing_directory_fails() {
        let (browser, _temp_dir) = browser();

        let err = browser
            .list(&ListRequest {
                path: "/nope".to_string(),
            })
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_ERROR);
        assert_eq!(err.public_message(), "unable to list files");
    }

    #[test]
    fn test_list_traversal_is_validation_error() {
        let (browser, _temp_dir) = browser();

        let err = browser
            .list(&ListRequest {
                path: "../..".to_string(),
            })
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_make_dir_creates_one_level() {
        let (browser, temp_dir) = browser();

        let reply = browser
            .make_dir(&MakeDirRequest {
                path: "/".to_string(),
                name: "reports".to_string(),
            })
            .unwrap();

        assert_eq!(reply.message, "directory creation successful");
        assert!(temp_dir.path().join("reports").is_dir());
    }

    #[test]
    fn test_make_dir_existing_fails() {
        let (browser, temp_dir) = browser();
        fs::create_dir(temp_dir.path().join("reports")).unwrap();

        let err = browser
            .make_dir(&MakeDirRequest {
                path: "/".to_string(),
                name: "reports".to_string(),
            })
            .unwrap_err();

        assert_eq!(err.public_message(), "couldn't create the directory");
    }

    #[test]
    fn test_delete_file() {
        let (browser, temp_dir) = browser();
        fs::create_dir(temp_dir.path().join("docs")).unwrap();
        fs::write(temp_dir.path().join("docs/old.txt"), "x").unwrap();

        let reply = browser
            .delete(&DeleteRequest {
                path: "/docs".to_string(),
                name: "old.txt".to_string(),
            })
            .unwrap();

        assert_eq!(reply.message, "file deletion successful");
        assert!(!temp_dir.path().join("docs/old.txt").exists());
    }

    #[test]
    fn test_delete_directory_fails() {
        let (browser, temp_dir) = browser();
        fs::create_dir(temp_dir.path().join("keep")).unwrap();

        let err = browser
            .delete(&DeleteRequest {
                path: "/".to_string(),
                name: "keep".to_string(),
            })
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_ERROR);
        assert_eq!(err.public_message(), "couldn't delete the file");
        assert!(temp_dir.path().join("keep").is_dir());
    }
}
