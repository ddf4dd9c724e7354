//! Target naming inside a Byte Store.
//!
//! Envelope paths are interpreted relative to the store root: a leading `/`
//! is dropped, `.` components are ignored and `..` is rejected outright.
//! File and directory names must be a single normal component.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Errors raised while normalising an envelope path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// Path tries to climb out of the store root.
    #[error("path traversal detected: {0}")]
    PathTraversal(String),

    /// Name is empty or contains a separator.
    #[error("invalid name: {0:?}")]
    InvalidName(String),
}

/// Normalised, root-relative location in a Byte Store.
///
/// Two envelopes naming the same `(path, filename)` pair after normalisation
/// resolve to equal `TargetPath`s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetPath(PathBuf);

impl TargetPath {
    /// A directory location.
    pub fn dir(path: &str) -> Result<Self, TargetError> {
        let mut normalised = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => normalised.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(TargetError::PathTraversal(path.to_string()));
                }
            }
        }
        Ok(Self(normalised))
    }

    /// A named entry inside directory `path`.
    pub fn entry(path: &str, name: &str) -> Result<Self, TargetError> {
        let mut target = Self::dir(path)?;
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if !name.contains(['/', '\\']) => {
                target.0.push(part);
                Ok(target)
            }
            _ => Err(TargetError::InvalidName(name.to_string())),
        }
    }

    /// Root-relative path. Empty for the root itself.
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.display())
    }
}
