//! Address planning for virtual network subnets.
//!
//! Turns a CIDR block into the host interface address and the DHCP range
//! served on it, and inverts that mapping when reading a live definition
//! back: the host keeps `10.0.0.1/24`, the user asked for `10.0.0.0/24`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};

/// Blocks with fewer usable addresses than this are rejected.
pub const MIN_USABLE_ADDRESSES: u128 = 4;

/// Address family of a subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Family of a single address.
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// Address width in bits (32 or 128).
    pub fn bits(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// Inclusive range of addresses leased by DHCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpRange {
    pub start: IpAddr,
    pub end: IpAddr,
}

/// Result of planning one CIDR block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPlan {
    /// Network address of the block (host bits cleared).
    pub network: IpAddr,
    /// Host interface address (network + 1).
    pub interface: IpAddr,
    /// Prefix length of the block.
    pub prefix: u8,
    pub family: AddressFamily,
    /// Broadcast (last) address of the block.
    pub broadcast: IpAddr,
    /// DHCP range, `None` when DHCP is disabled.
    pub dhcp: Option<DhcpRange>,
}

impl AddressPlan {
    /// The block in canonical CIDR notation (e.g. "10.0.0.0/24").
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.network, self.prefix)
    }
}

/// Parse a CIDR block, clearing any host bits.
pub fn parse_cidr(cidr: &str) -> Result<IpNet> {
    let net: IpNet = cidr
        .trim()
        .parse()
        .map_err(|e| NetError::invalid_address(cidr, e))?;
    Ok(net.trunc())
}

/// Number of usable addresses in a block: total minus network and broadcast.
pub fn usable_addresses(net: &IpNet) -> u128 {
    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    let total = 1u128.checked_shl(host_bits).unwrap_or(u128::MAX);
    total.saturating_sub(2)
}

/// Plan the interface address and DHCP range for a CIDR block.
///
/// For `192.168.100.0/24` the interface is `192.168.100.1` and the range is
/// `192.168.100.2`–`192.168.100.254`. With `dhcp_enabled = false` no range is
/// produced at all.
pub fn plan(cidr: &str, dhcp_enabled: bool) -> Result<AddressPlan> {
    let net = parse_cidr(cidr)?;
    let family = match net {
        IpNet::V4(_) => AddressFamily::Ipv4,
        IpNet::V6(_) => AddressFamily::Ipv6,
    };

    let usable = usable_addresses(&net);
    if usable < MIN_USABLE_ADDRESSES {
        return Err(NetError::RangeTooSmall {
            cidr: cidr.to_string(),
            usable,
            family: family.to_string(),
        });
    }

    let network = net.network();
    let broadcast = net.broadcast();
    let interface = offset(network, 1);

    let dhcp = dhcp_enabled.then(|| DhcpRange {
        start: offset(network, 2),
        end: offset(broadcast, -1),
    });

    Ok(AddressPlan {
        network,
        interface,
        prefix: net.prefix_len(),
        family,
        broadcast,
        dhcp,
    })
}

/// Mask an interface address down to its network CIDR.
///
/// Inverse of [`plan`]: `mask_to_network("10.0.0.1", 24)` is `"10.0.0.0/24"`.
pub fn mask_to_network(address: &str, prefix: u8) -> Result<String> {
    let addr: IpAddr = address
        .trim()
        .parse()
        .map_err(|e| NetError::invalid_address(address, e))?;
    let net = IpNet::new(addr, prefix).map_err(|e| NetError::invalid_address(address, e))?;
    Ok(net.trunc().to_string())
}

/// Prefix length of a dotted-quad netmask (e.g. "255.255.255.0" is 24).
pub fn netmask_to_prefix(netmask: &str) -> Result<u8> {
    let mask: Ipv4Addr = netmask
        .trim()
        .parse()
        .map_err(|e| NetError::invalid_address(netmask, e))?;
    ipnet::ipv4_mask_to_prefix(mask).map_err(|e| NetError::invalid_address(netmask, e))
}

/// Canonical form of a CIDR string for comparisons; unparseable input is
/// returned as given.
pub fn canonical_cidr(cidr: &str) -> String {
    parse_cidr(cidr)
        .map(|net| net.to_string())
        .unwrap_or_else(|_| cidr.trim().to_string())
}

/// Move an address by `delta` within its family. Callers guarantee the
/// result stays inside the block.
fn offset(addr: IpAddr, delta: i8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let base = u32::from(v4);
            let moved = if delta >= 0 {
                base.wrapping_add(u32::from(delta.unsigned_abs()))
            } else {
                base.wrapping_sub(u32::from(delta.unsigned_abs()))
            };
            IpAddr::V4(Ipv4Addr::from(moved))
        }
        IpAddr::V6(v6) => {
            let base = u128::from(v6);
            let moved = if delta >= 0 {
                base.wrapping_add(u128::from(delta.unsigned_abs()))
            } else {
                base.wrapping_sub(u128::from(delta.unsigned_abs()))
            };
            IpAddr::V6(Ipv6Addr::from(moved))
        }
    }
}
