//! Byte Store: the file primitives the transfer handlers are built on.
//!
//! Handlers only see the [`ByteStore`] trait so tests can substitute a
//! store that fails on demand. [`LocalByteStore`] is the production
//! implementation over a mounted directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::target::TargetPath;

/// Names found one level below a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Subdirectory names, sorted.
    pub directories: Vec<String>,
    /// Non-directory names, sorted.
    pub files: Vec<String>,
}

/// File read/write/seek/stat primitives.
///
/// Implementations must be safe to share between invocations. They do not
/// serialise writers to the same target; see
/// [`TargetLocks`](super::locks::TargetLocks).
pub trait ByteStore: Send + Sync {
    /// Whether anything exists at `target`.
    fn exists(&self, target: &TargetPath) -> io::Result<bool>;

    /// Size in bytes of the regular file at `target`.
    fn size(&self, target: &TargetPath) -> io::Result<u64>;

    /// Write `data` at `offset`, creating the file if needed. Bytes outside
    /// `[offset, offset + data.len())` are left untouched.
    fn write_at(&self, target: &TargetPath, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Read up to `len` bytes starting at `offset`. Returns fewer bytes only
    /// at end of file.
    fn read_at(&self, target: &TargetPath, offset: u64, len: u64) -> io::Result<Vec<u8>>;

    /// One-level enumeration of the directory at `dir`.
    fn list(&self, dir: &TargetPath) -> io::Result<DirectoryListing>;

    /// Create exactly one directory.
    fn make_dir(&self, dir: &TargetPath) -> io::Result<()>;

    /// Remove one file.
    fn remove(&self, target: &TargetPath) -> io::Result<()>;
}

/// Byte Store over a local (or network-mounted) directory tree.
#[derive(Debug, Clone)]
pub struct LocalByteStore {
    root: PathBuf,
}

impl LocalByteStore {
    /// Create a store rooted at `root`. The directory must exist.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = fs::canonicalize(root.into())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("store root is not a directory: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    /// Canonical root of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a target to a host path, refusing anything whose nearest existing
    /// ancestor resolves outside the root (for example through a symlink).
    ///
    /// A dangling symlink anywhere on the path is refused too: creating the
    /// file would follow it to wherever it points.
    fn resolve(&self, target: &TargetPath) -> io::Result<PathBuf> {
        let path = self.root.join(target.as_path());

        let mut probe = path.as_path();
        let existing = loop {
            match fs::canonicalize(probe) {
                Ok(canonical) => break canonical,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if fs::symlink_metadata(probe).is_ok() {
                        return Err(io::Error::new(
                            io::ErrorKind::PermissionDenied,
                            format!("{} passes through a dangling symlink", target),
                        ));
                    }
                    match probe.parent() {
                        Some(parent) => probe = parent,
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        };

        if !existing.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} resolves outside the store root", target),
            ));
        }

        Ok(path)
    }
}

impl ByteStore for LocalByteStore {
    fn exists(&self, target: &TargetPath) -> io::Result<bool> {
        let path = self.resolve(target)?;
        path.try_exists()
    }

    fn size(&self, target: &TargetPath) -> io::Result<u64> {
        let metadata = fs::metadata(self.resolve(target)?)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", target),
            ));
        }
        Ok(metadata.len())
    }

    fn write_at(&self, target: &TargetPath, offset: u64, data: &[u8]) -> io::Result<()> {
        let path = self.resolve(target)?;
        let mut file = OpenOptions::new().write(true).create(true).open(&path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()
    }

    fn read_at(&self, target: &TargetPath, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        let path = self.resolve(target)?;
        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = Vec::new();
        file.take(len).read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn list(&self, dir: &TargetPath) -> io::Result<DirectoryListing> {
        let path = self.resolve(dir)?;
        let mut listing = DirectoryListing::default();

        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() {
                listing.directories.push(name);
            } else {
                listing.files.push(name);
            }
        }

        listing.directories.sort();
        listing.files.sort();
        Ok(listing)
    }

    fn make_dir(&self, dir: &TargetPath) -> io::Result<()> {
        fs::create_dir(self.resolve(dir)?)
    }

    fn remove(&self, target: &TargetPath) -> io::Result<()> {
        fs::remove_file(self.resolve(target)?)
    }
}
