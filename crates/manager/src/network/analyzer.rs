//! Mount target reachability analysis.
//!
//! For each mount target, every attached security group is checked on its
//! own: the group is viable when any of its inbound rules admits the
//! target's address on the NFS port. Finding a match stops the scan of that
//! group's rules only; other groups and other targets are always evaluated.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use protocol::rules::MountTarget;
use protocol::StatusCode;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::matcher::{Rule, NFS_PORT};
use super::provider::{ProviderError, RuleProvider};

/// Errors raised by the analyzer.
#[derive(Debug, Error)]
pub enum ReachError {
    /// The Rule Provider failed for a group.
    #[error("failed to describe rules for {group_id}: {source}")]
    Provider {
        group_id: String,
        #[source]
        source: ProviderError,
    },

    /// Mount target address is not an IPv4 address.
    #[error("mount target {id} has invalid address {address:?}")]
    InvalidEndpoint { id: String, address: String },

    /// No mount target has a viable group.
    #[error("No mount target available with required network configuration")]
    Unreachable,
}

impl ReachError {
    /// Application status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReachError::Unreachable => StatusCode::BAD_REQUEST,
            ReachError::Provider { .. } | ReachError::InvalidEndpoint { .. } => {
                StatusCode::INTERNAL_ERROR
            }
        }
    }

    /// Message safe to return to a caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            ReachError::Unreachable => {
                "No mount target available with required network configuration"
            }
            ReachError::Provider { .. } => "couldn't describe security group rules",
            ReachError::InvalidEndpoint { .. } => "mount target has an invalid address",
        }
    }
}

/// A mount target as seen by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub id: String,
    pub address: Ipv4Addr,
    pub subnet_id: String,
    pub group_ids: BTreeSet<String>,
}

impl TryFrom<&MountTarget> for Endpoint {
    type Error = ReachError;

    fn try_from(target: &MountTarget) -> Result<Self, Self::Error> {
        let address = target
            .ip_address
            .parse()
            .map_err(|_| ReachError::InvalidEndpoint {
                id: target.mount_target_id.clone(),
                address: target.ip_address.clone(),
            })?;

        Ok(Self {
            id: target.mount_target_id.clone(),
            address,
            subnet_id: target.subnet_id.clone(),
            group_ids: target.security_groups.iter().cloned().collect(),
        })
    }
}

/// Viable groups found for one mount target.
///
/// Serializes as `{"<mount target id>": {"security_groups": [...], "subnet_id": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTargetReport {
    pub mount_target_id: String,
    pub security_groups: BTreeSet<String>,
    pub subnet_id: String,
}

impl MountTargetReport {
    /// Whether any group makes the target reachable.
    pub fn is_reachable(&self) -> bool {
        !self.security_groups.is_empty()
    }
}

struct ReportBody<'a>(&'a MountTargetReport);

impl Serialize for ReportBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("MountTargetReport", 2)?;
        body.serialize_field("security_groups", &self.0.security_groups)?;
        body.serialize_field("subnet_id", &self.0.subnet_id)?;
        body.end()
    }
}

impl Serialize for MountTargetReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.mount_target_id, &ReportBody(self))?;
        map.end()
    }
}

/// Decides which security groups let a mount target be reached.
pub struct ReachabilityAnalyzer<P: RuleProvider> {
    provider: P,
    port: u16,
}

impl<P: RuleProvider> ReachabilityAnalyzer<P> {
    /// Analyzer probing the NFS port.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            port: NFS_PORT,
        }
    }

    /// Probe a different port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Groups of `endpoint` through which it is reachable.
    pub fn viable_groups(&self, endpoint: &Endpoint) -> Result<BTreeSet<String>, ReachError> {
        let mut viable = BTreeSet::new();

        for group_id in &endpoint.group_ids {
            let records = self
                .provider
                .describe_group_rules(group_id)
                .map_err(|source| ReachError::Provider {
                    group_id: group_id.clone(),
                    source,
                })?;

            let matched = records.iter().any(|record| match Rule::try_from(record) {
                Ok(rule) => rule.admits(endpoint.address, self.port),
                Err(e) => {
                    warn!(group = %group_id, error = %e, "Skipping rule with unusable CIDR");
                    false
                }
            });

            debug!(
                mount_target = %endpoint.id,
                group = %group_id,
                rules = records.len(),
                viable = matched,
                "Security group evaluated"
            );

            if matched {
                viable.insert(group_id.clone());
            }
        }

        Ok(viable)
    }

    /// Analyze every endpoint.
    ///
    /// Reports are returned for all endpoints, including those with no
    /// viable group. Fails with [`ReachError::Unreachable`] when none is
    /// reachable.
    pub fn analyze(&self, endpoints: &[Endpoint]) -> Result<Vec<MountTargetReport>, ReachError> {
        let mut reports = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            reports.push(MountTargetReport {
                mount_target_id: endpoint.id.clone(),
                security_groups: self.viable_groups(endpoint)?,
                subnet_id: endpoint.subnet_id.clone(),
            });
        }

        let reachable = reports.iter().filter(|r| r.is_reachable()).count();
        if reachable == 0 {
            warn!(mount_targets = endpoints.len(), port = self.port, "No reachable mount target");
            return Err(ReachError::Unreachable);
        }

        info!(
            mount_targets = endpoints.len(),
            reachable,
            port = self.port,
            "Reachability analysis complete"
        );
        Ok(reports)
    }
}
