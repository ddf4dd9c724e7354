//! Port-rule matching.
//!
//! A [`Rule`] is the domain view of a security group rule: the protocol is
//! an enum and the source is either a CIDR block, a referenced group, or
//! both. Matching is a pure function of the rule and the probe.

use std::net::Ipv4Addr;

use protocol::rules::{SecurityGroupRule, ALL_PORTS};

use super::cidr::{CidrParseError, Ipv4Cidr};

/// NFS port, the one a mount needs.
pub const NFS_PORT: u16 = 2049;

/// IP protocol a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpProtocol {
    /// `"-1"`: every protocol.
    All,
    /// `"tcp"`.
    Tcp,
    /// Anything else (`"udp"`, `"icmp"`, numeric protocol ids, ...).
    Other(String),
}

impl From<&str> for IpProtocol {
    fn from(value: &str) -> Self {
        match value {
            "-1" => IpProtocol::All,
            v if v.eq_ignore_ascii_case("tcp") => IpProtocol::Tcp,
            other => IpProtocol::Other(other.to_string()),
        }
    }
}

/// A firewall rule in domain form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub is_egress: bool,
    pub ip_protocol: IpProtocol,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr: Option<Ipv4Cidr>,
    pub referenced_group_id: Option<String>,
    pub owner_group_id: String,
}

impl TryFrom<&SecurityGroupRule> for Rule {
    type Error = CidrParseError;

    fn try_from(record: &SecurityGroupRule) -> Result<Self, Self::Error> {
        let cidr = record
            .cidr_ipv4
            .as_deref()
            .map(str::parse::<Ipv4Cidr>)
            .transpose()?;

        Ok(Self {
            is_egress: record.is_egress,
            ip_protocol: IpProtocol::from(record.ip_protocol.as_str()),
            from_port: record.from_port,
            to_port: record.to_port,
            cidr,
            referenced_group_id: record
                .referenced_group_info
                .as_ref()
                .map(|info| info.group_id.clone()),
            owner_group_id: record.group_id.clone(),
        })
    }
}

/// Whether `rule` lets traffic reach `port`.
///
/// Only the all-protocols and TCP rules apply. A rule permits the port when
/// both ends are the all-ports sentinel or when the port lies in
/// `[from_port, to_port]`.
pub fn permits_port(rule: &Rule, port: u16) -> bool {
    match rule.ip_protocol {
        IpProtocol::All | IpProtocol::Tcp => {}
        IpProtocol::Other(_) => return false,
    }

    if rule.from_port == ALL_PORTS && rule.to_port == ALL_PORTS {
        return true;
    }

    let port = i32::from(port);
    rule.from_port <= port && port <= rule.to_port
}

impl Rule {
    /// Whether the rule's source is the group it is attached to.
    pub fn is_self_referencing(&self) -> bool {
        self.referenced_group_id.as_deref() == Some(self.owner_group_id.as_str())
    }

    /// Whether this inbound rule admits `address` on `port`, either through
    /// CIDR containment or through a self-reference.
    pub fn admits(&self, address: Ipv4Addr, port: u16) -> bool {
        if self.is_egress {
            return false;
        }

        let by_cidr = self.cidr.is_some_and(|cidr| cidr.contains(address));
        (by_cidr || self.is_self_referencing()) && permits_port(self, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::rules::ReferencedGroupInfo;

    fn rule(protocol: &str, from: i32, to: i32) -> Rule {
        Rule {
            is_egress: false,
            ip_protocol: IpProtocol::from(protocol),
            from_port: from,
            to_port: to,
            cidr: None,
            referenced_group_id: None,
            owner_group_id: "sg-1".to_string(),
        }
    }

    #[test]
    fn test_exact_port() {
        assert!(permits_port(&rule("tcp", 2049, 2049), NFS_PORT));
    }

    #[test]
    fn test_all_ports_sentinel() {
        assert!(permits_port(&rule("-1", -1, -1), NFS_PORT));
        assert!(permits_port(&rule("tcp", -1, -1), NFS_PORT));
    }

    #[test]
    fn test_port_range() {
        assert!(permits_port(&rule("tcp", 2000, 3000), NFS_PORT));
        assert!(permits_port(&rule("tcp", 0, 65535), NFS_PORT));
        assert!(!permits_port(&rule("tcp", 100, 200), NFS_PORT));
        assert!(!permits_port(&rule("tcp", 2050, 3000), NFS_PORT));
    }

    #[test]
    fn test_half_sentinel_is_a_range() {
        // Only both ends at -1 is the sentinel; -1..=2049 is an ordinary range.
        assert!(permits_port(&rule("tcp", -1, 2049), NFS_PORT));
        assert!(!permits_port(&rule("tcp", 2049, -1), NFS_PORT));
    }

    #[test]
    fn test_other_protocols_never_permit() {
        assert!(!permits_port(&rule("udp", 2049, 2049), NFS_PORT));
        assert!(!permits_port(&rule("icmp", -1, -1), NFS_PORT));
        assert!(!permits_port(&rule("6", 2049, 2049), NFS_PORT));
    }

    #[test]
    fn test_from_record() {
        let record = SecurityGroupRule {
            is_egress: false,
            ip_protocol: "tcp".to_string(),
            from_port: 2049,
            to_port: 2049,
            cidr_ipv4: Some("10.0.0.0/24".to_string()),
            referenced_group_info: Some(ReferencedGroupInfo {
                group_id: "sg-1".to_string(),
            }),
            group_id: "sg-1".to_string(),
        };

        let rule = Rule::try_from(&record).unwrap();
        assert_eq!(rule.ip_protocol, IpProtocol::Tcp);
        assert_eq!(rule.cidr.unwrap().to_string(), "10.0.0.0/24");
        assert!(rule.is_self_referencing());
    }

    #[test]
    fn test_from_record_bad_cidr() {
        let record = SecurityGroupRule {
            is_egress: false,
            ip_protocol: "tcp".to_string(),
            from_port: 2049,
            to_port: 2049,
            cidr_ipv4: Some("not-a-cidr".to_string()),
            referenced_group_info: None,
            group_id: "sg-1".to_string(),
        };
        assert!(Rule::try_from(&record).is_err());
    }

    #[test]
    fn test_admits_by_cidr() {
        let mut r = rule("tcp", 2049, 2049);
        r.cidr = Some("10.0.0.0/24".parse().unwrap());

        assert!(r.admits("10.0.0.5".parse().unwrap(), NFS_PORT));
        assert!(!r.admits("10.0.1.5".parse().unwrap(), NFS_PORT));
    }

    #[test]
    fn test_admits_by_self_reference_only() {
        let mut r = rule("-1", -1, -1);
        r.referenced_group_id = Some("sg-1".to_string());
        assert!(r.admits("172.16.0.1".parse().unwrap(), NFS_PORT));

        r.referenced_group_id = Some("sg-other".to_string());
        assert!(!r.admits("172.16.0.1".parse().unwrap(), NFS_PORT));
    }

    #[test]
    fn test_egress_never_admits() {
        let mut r = rule("-1", -1, -1);
        r.is_egress = true;
        r.cidr = Some("0.0.0.0/0".parse().unwrap());
        assert!(!r.admits("10.0.0.5".parse().unwrap(), NFS_PORT));
    }
}
