//! File manager handlers backed by a Byte Store.
//!
//! This module provides:
//! - Target naming rooted in the store
//! - Offset-addressed chunk uploads and windowed downloads
//! - Flat list, make_dir and delete
//! - Optional per-target writer serialisation
//!
//! # Security
//!
//! Envelope paths never leave the store root: `..` is rejected when a
//! target is named, and the local store refuses anything that resolves
//! outside its root through a symlink.

pub mod browser;
pub mod locks;
pub mod store;
pub mod target;
pub mod transfer;

pub use browser::DirectoryBrowser;
pub use locks::TargetLocks;
pub use store::{ByteStore, DirectoryListing, LocalByteStore};
pub use target::{TargetError, TargetPath};
pub use transfer::{FileTransfer, IoOperation, TransferError, UploadOutcome, DEFAULT_CHUNK_SIZE};
