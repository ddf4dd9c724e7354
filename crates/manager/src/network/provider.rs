//! Rule Provider: the source of security group rules.
//!
//! The analyzer calls the provider once per group. [`Inventory`] is an
//! offline provider backed by a JSON snapshot of a filesystem's mount
//! targets and the rules of their groups.

use std::fs;
use std::path::{Path, PathBuf};

use protocol::rules::{MountTarget, SecurityGroupRule};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by a Rule Provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Snapshot could not be read.
    #[error("failed to read inventory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot is not valid inventory JSON.
    #[error("failed to parse inventory: {0}")]
    Parse(#[from] serde_json::Error),

    /// The rule source could not answer.
    #[error("rule source unavailable: {0}")]
    Unavailable(String),
}

/// Source of inbound and outbound rules for a security group.
pub trait RuleProvider {
    /// All rules attached to `group_id`.
    fn describe_group_rules(&self, group_id: &str) -> Result<Vec<SecurityGroupRule>, ProviderError>;
}

impl<P: RuleProvider + ?Sized> RuleProvider for &P {
    fn describe_group_rules(&self, group_id: &str) -> Result<Vec<SecurityGroupRule>, ProviderError> {
        (**self).describe_group_rules(group_id)
    }
}

/// Snapshot of mount targets and security group rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Inventory {
    /// The filesystem's mount targets.
    #[serde(default)]
    pub mount_targets: Vec<MountTarget>,
    /// Rules for every group referenced by the mount targets.
    #[serde(default)]
    pub security_group_rules: Vec<SecurityGroupRule>,
}

impl Inventory {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let content = fs::read_to_string(path).map_err(|source| ProviderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ProviderError> {
        Ok(serde_json::from_str(content)?)
    }
}

impl RuleProvider for Inventory {
    fn describe_group_rules(&self, group_id: &str) -> Result<Vec<SecurityGroupRule>, ProviderError> {
        Ok(self
            .security_group_rules
            .iter()
            .filter(|rule| rule.group_id == group_id)
            .cloned()
            .collect())
    }
}
