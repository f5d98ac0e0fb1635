//! Network definition submitted to the virtualization host.
//!
//! The types mirror the host's `<network>` document: attribute fields carry
//! an `@` rename so the XML codec can (de)serialize them directly. `build`
//! derives a complete definition from a [`NetworkSpec`].

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::address::{self, AddressFamily};
use crate::error::{NetError, Result};
use crate::network::{DnsForwarder, ForwardMode, NetworkSpec};

/// Complete network definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename = "network")]
pub struct NetworkDefinition {
    pub name: String,

    /// Assigned by the host; only present on live definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<Forward>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<Bridge>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Dns>,

    #[serde(rename = "ip", default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<NetworkIp>,
}

/// `<forward mode=".."/>`; absent for isolated and bridged networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forward {
    #[serde(rename = "@mode")]
    pub mode: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat: Option<ForwardNat>,
}

impl Forward {
    /// NAT is implied by mode `nat`, with or without an explicit `<nat>`.
    pub fn nat_enabled(&self) -> bool {
        self.mode.eq_ignore_ascii_case("nat")
    }
}

/// Explicit `<nat>` sub-element. Port ranges the host may report are not
/// modelled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForwardNat {}

/// `<bridge name=".." stp="on"/>`. An empty name lets the host pick one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bridge {
    #[serde(rename = "@name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "@stp", default, skip_serializing_if = "String::is_empty")]
    pub stp: String,
}

/// Two-valued flag as the host spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    Yes,
    No,
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        if value {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }
}

/// `<domain name=".." localOnly="yes"/>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@localOnly", default, skip_serializing_if = "Option::is_none")]
    pub local_only: Option<YesNo>,
}

impl Domain {
    pub fn is_local_only(&self) -> bool {
        self.local_only == Some(YesNo::Yes)
    }
}

/// `<dns>` block with upstream forwarders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dns {
    #[serde(rename = "forwarder", default, skip_serializing_if = "Vec::is_empty")]
    pub forwarders: Vec<DnsForwarderEntry>,
}

/// `<forwarder addr=".." domain=".."/>`; empty strings mean unset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DnsForwarderEntry {
    #[serde(rename = "@addr", default, skip_serializing_if = "String::is_empty")]
    pub addr: String,

    #[serde(rename = "@domain", default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
}

/// `<ip address=".." prefix=".." family="..">` with optional DHCP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkIp {
    /// Host interface address.
    #[serde(rename = "@address")]
    pub address: String,

    #[serde(rename = "@prefix", default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<u8>,

    /// Hosts may report a dotted netmask instead of a prefix.
    #[serde(rename = "@netmask", default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,

    #[serde(rename = "@family", default, skip_serializing_if = "Option::is_none")]
    pub family: Option<AddressFamily>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<Dhcp>,
}

impl NetworkIp {
    /// Prefix length, falling back to the netmask when no prefix is given.
    pub fn prefix_len(&self) -> Result<u8> {
        if let Some(prefix) = self.prefix {
            return Ok(prefix);
        }
        match &self.netmask {
            Some(mask) => address::netmask_to_prefix(mask),
            None => {
                let addr: IpAddr = self
                    .address
                    .parse()
                    .map_err(|e| NetError::invalid_address(&self.address, e))?;
                Ok(AddressFamily::of(&addr).bits())
            }
        }
    }

    /// The block this interface address belongs to, in CIDR notation.
    pub fn network_cidr(&self) -> Result<String> {
        address::mask_to_network(&self.address, self.prefix_len()?)
    }

    /// First DHCP range, if any.
    pub fn dhcp_range(&self) -> Option<&DhcpRangeEntry> {
        self.dhcp.as_ref().and_then(|d| d.ranges.first())
    }
}

/// `<dhcp>` block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dhcp {
    #[serde(rename = "range", default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<DhcpRangeEntry>,
}

/// `<range start=".." end=".."/>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpRangeEntry {
    #[serde(rename = "@start")]
    pub start: String,

    #[serde(rename = "@end")]
    pub end: String,
}

/// Build a complete definition from a spec.
///
/// The mode is validated before any address is planned, and any failure
/// aborts the whole build.
pub fn build(spec: &NetworkSpec) -> Result<NetworkDefinition> {
    let mode = spec.forward_mode()?;

    let bridge_name = spec
        .bridge
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let mut def = NetworkDefinition {
        name: spec.name.clone(),
        bridge: Some(Bridge {
            name: bridge_name,
            stp: "on".to_string(),
        }),
        domain: spec.domain.as_ref().map(|name| Domain {
            name: name.clone(),
            local_only: spec.dns_local_only.then_some(YesNo::Yes),
        }),
        ..Default::default()
    };

    match mode {
        ForwardMode::Bridge => {
            let named = def.bridge.as_ref().is_some_and(|b| !b.name.is_empty());
            if !named {
                return Err(NetError::MissingBridge);
            }
            // Bridged networks do not own addressing.
            def.forward = None;
        }
        ForwardMode::Isolated | ForwardMode::Nat | ForwardMode::Route => {
            def.forward = mode.forward_attr().map(|m| Forward {
                mode: m.to_string(),
                nat: None,
            });
            def.ips = plan_ips(&spec.addresses, spec.dhcp_enabled)?;
            def.dns = build_dns(&spec.dns_forwarders)?;
        }
    }

    tracing::debug!(name = %def.name, mode = %mode, ips = def.ips.len(), "Built network definition");
    Ok(def)
}

fn plan_ips(addresses: &[String], dhcp_enabled: bool) -> Result<Vec<NetworkIp>> {
    addresses
        .iter()
        .map(|cidr| {
            let plan = address::plan(cidr, dhcp_enabled)?;
            Ok(NetworkIp {
                address: plan.interface.to_string(),
                prefix: Some(plan.prefix),
                netmask: None,
                family: Some(plan.family),
                dhcp: plan.dhcp.map(|range| Dhcp {
                    ranges: vec![DhcpRangeEntry {
                        start: range.start.to_string(),
                        end: range.end.to_string(),
                    }],
                }),
            })
        })
        .collect()
}

fn build_dns(forwarders: &[DnsForwarder]) -> Result<Option<Dns>> {
    if forwarders.is_empty() {
        return Ok(None);
    }

    let entries = forwarders
        .iter()
        .map(|fwd| {
            let addr = match fwd.address.as_deref().filter(|a| !a.is_empty()) {
                Some(raw) => raw
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|e| NetError::invalid_address(raw, e))?
                    .to_string(),
                None => String::new(),
            };
            Ok(DnsForwarderEntry {
                addr,
                domain: fwd.domain.clone().unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(Dns {
        forwarders: entries,
    }))
}
