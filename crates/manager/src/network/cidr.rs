//! IPv4 CIDR blocks.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use thiserror::Error;

/// Errors parsing a CIDR block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrParseError {
    /// Address part is not a dotted-quad IPv4 address.
    #[error("invalid IPv4 address in {0:?}")]
    Address(String),

    /// Prefix is not a number in `0..=32`.
    #[error("invalid prefix length in {0:?}")]
    Prefix(String),
}

/// An IPv4 network in `a.b.c.d/n` notation.
///
/// Host bits in the address part are masked off when parsing, so
/// `10.0.0.7/24` and `10.0.0.0/24` denote the same block. A bare address
/// parses as a `/32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Build a block from a network address and prefix length.
    pub fn new(address: Ipv4Addr, prefix: u8) -> Option<Self> {
        if prefix > 32 {
            return None;
        }
        Some(Self {
            network: Ipv4Addr::from(u32::from(address) & mask(prefix)),
            prefix,
        })
    }

    /// Prefix length.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Whether `address` lies inside this block.
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & mask(self.prefix) == u32::from(self.network)
    }
}

fn mask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        n => u32::MAX << (32 - u32::from(n)),
    }
}

impl FromStr for Ipv4Cidr {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (address, prefix) = match s.split_once('/') {
            Some((address, prefix)) => {
                let prefix = prefix
                    .parse::<u8>()
                    .map_err(|_| CidrParseError::Prefix(s.to_string()))?;
                (address, prefix)
            }
            None => (s, 32),
        };

        let address = address
            .parse::<Ipv4Addr>()
            .map_err(|_| CidrParseError::Address(s.to_string()))?;

        Self::new(address, prefix).ok_or_else(|| CidrParseError::Prefix(s.to_string()))
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}
