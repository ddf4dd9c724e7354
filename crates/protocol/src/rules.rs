//! Firewall rule and mount target records as returned by the network API.
//!
//! These mirror the collaborator's response shape (PascalCase keys, unknown
//! keys ignored). Matching semantics live in the manager crate.

use serde::{Deserialize, Serialize};

/// Port sentinel meaning "all ports" for protocol-wide rules.
pub const ALL_PORTS: i32 = -1;

fn all_ports() -> i32 {
    ALL_PORTS
}

/// Group referenced as a rule's traffic source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferencedGroupInfo {
    /// Referenced security group id.
    pub group_id: String,
}

/// One security group rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupRule {
    /// `true` for outbound rules.
    pub is_egress: bool,
    /// `"-1"` (all protocols), `"tcp"`, or anything else.
    pub ip_protocol: String,
    /// First port of the range, `-1` for all ports.
    #[serde(default = "all_ports")]
    pub from_port: i32,
    /// Last port of the range, `-1` for all ports.
    #[serde(default = "all_ports")]
    pub to_port: i32,
    /// IPv4 source range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_ipv4: Option<String>,
    /// Source group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_group_info: Option<ReferencedGroupInfo>,
    /// Group this rule is attached to.
    pub group_id: String,
}

/// A filesystem mount target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountTarget {
    /// Mount target id.
    pub mount_target_id: String,
    /// IPv4 address of the target's network interface.
    pub ip_address: String,
    /// Subnet the target lives in.
    pub subnet_id: String,
    /// Security groups attached to the target.
    #[serde(default)]
    pub security_groups: Vec<String>,
}
