//! Network reachability for filesystem mount targets.
//!
//! This module provides:
//! - IPv4 CIDR blocks
//! - The port-rule matcher over security group rules
//! - The Rule Provider seam and an inventory-backed provider
//! - The analyzer that reports viable groups per mount target

pub mod analyzer;
pub mod cidr;
pub mod matcher;
pub mod provider;

pub use analyzer::{Endpoint, MountTargetReport, ReachError, ReachabilityAnalyzer};
pub use cidr::{CidrParseError, Ipv4Cidr};
pub use matcher::{permits_port, IpProtocol, Rule, NFS_PORT};
pub use provider::{Inventory, ProviderError, RuleProvider};
