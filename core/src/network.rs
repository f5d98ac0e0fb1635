//! User-facing network types.
//!
//! `NetworkSpec` is the declarative input, `NetworkState` is what the
//! orchestrator records between invocations (the host-assigned UUID plus the
//! last observed user-facing fields).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::address::canonical_cidr;
use crate::error::{NetError, Result};

/// Forwarding mode used when `mode` is omitted.
pub const DEFAULT_MODE: &str = "nat";

/// Forwarding mode of a virtual network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    /// No forwarding; guests only reach each other and the host.
    Isolated,
    /// Outbound traffic is masqueraded behind the host address.
    #[default]
    Nat,
    /// Traffic is routed to the physical network without translation.
    Route,
    /// Guests are attached to an existing host bridge.
    Bridge,
}

impl ForwardMode {
    /// Value of the `<forward mode=..>` attribute, `None` for modes that
    /// carry no forward block.
    pub fn forward_attr(&self) -> Option<&'static str> {
        match self {
            ForwardMode::Nat => Some("nat"),
            ForwardMode::Route => Some("route"),
            ForwardMode::Isolated | ForwardMode::Bridge => None,
        }
    }
}

impl FromStr for ForwardMode {
    type Err = NetError;

    /// Case-insensitive; `none` is accepted as an alias of `isolated`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "isolated" | "none" => Ok(ForwardMode::Isolated),
            "nat" => Ok(ForwardMode::Nat),
            "route" => Ok(ForwardMode::Route),
            "bridge" => Ok(ForwardMode::Bridge),
            other => Err(NetError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardMode::Isolated => write!(f, "isolated"),
            ForwardMode::Nat => write!(f, "nat"),
            ForwardMode::Route => write!(f, "route"),
            ForwardMode::Bridge => write!(f, "bridge"),
        }
    }
}

/// Upstream DNS server (optionally scoped to a domain).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DnsForwarder {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Declarative description of a virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Network name (identity key at the host).
    pub name: String,

    /// DNS domain served by the network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Forwarding mode: isolated, nat, route or bridge (case-insensitive).
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Bridge device; required in bridge mode, host-assigned otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,

    /// Subnets in CIDR notation (at most one IPv4 and one IPv6).
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Serve DHCP on every subnet.
    #[serde(default = "default_true")]
    pub dhcp_enabled: bool,

    /// Answer queries for `domain` locally without forwarding upstream.
    #[serde(default)]
    pub dns_local_only: bool,

    #[serde(default)]
    pub dns_forwarders: Vec<DnsForwarder>,

    /// Start the network when the host boots. `None` leaves the host default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

fn default_true() -> bool {
    true
}

impl NetworkSpec {
    /// Create a spec with the given name and all other fields defaulted.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            domain: None,
            mode: default_mode(),
            bridge: None,
            addresses: Vec::new(),
            dhcp_enabled: true,
            dns_local_only: false,
            dns_forwarders: Vec::new(),
            autostart: None,
        }
    }

    /// Parsed forwarding mode.
    pub fn forward_mode(&self) -> Result<ForwardMode> {
        self.mode.parse()
    }

    /// Load a spec from YAML.
    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }
}

/// Persisted record of a network managed by virtnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    /// UUID assigned by the host at creation.
    pub id: String,

    #[serde(flatten)]
    pub spec: NetworkSpec,
}

impl NetworkState {
    pub fn new(id: impl Into<String>, spec: NetworkSpec) -> Self {
        Self {
            id: id.into(),
            spec,
        }
    }

    /// State for a network adopted by UUID; every user-facing field is
    /// filled in by the first read.
    pub fn imported(id: impl Into<String>) -> Self {
        Self::new(id, NetworkSpec::new(""))
    }
}

/// How a desired spec relates to the recorded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Nothing to do.
    Unchanged,
    /// Only `autostart` differs; applied in place.
    InPlace,
    /// Immutable fields differ; the network must be destroyed and recreated.
    Replace { fields: Vec<String> },
}

/// Classify `desired` against the last recorded spec.
///
/// Every field except `autostart` is immutable. A `bridge` left unset in
/// `desired` accepts whatever name the host assigned.
pub fn plan_change(recorded: &NetworkSpec, desired: &NetworkSpec) -> Change {
    let mut fields = Vec::new();

    if recorded.name != desired.name {
        fields.push("name");
    }
    if recorded.domain != desired.domain {
        fields.push("domain");
    }
    if !same_mode(&recorded.mode, &desired.mode) {
        fields.push("mode");
    }
    let desired_bridge = canonical_bridge(desired.bridge.as_deref());
    if desired_bridge.is_some() && canonical_bridge(recorded.bridge.as_deref()) != desired_bridge {
        fields.push("bridge");
    }
    let recorded_addrs: Vec<String> = recorded.addresses.iter().map(|a| canonical_cidr(a)).collect();
    let desired_addrs: Vec<String> = desired.addresses.iter().map(|a| canonical_cidr(a)).collect();
    if recorded_addrs != desired_addrs {
        fields.push("addresses");
    }
    if recorded.dhcp_enabled != desired.dhcp_enabled {
        fields.push("dhcp_enabled");
    }
    if recorded.dns_local_only != desired.dns_local_only {
        fields.push("dns_local_only");
    }
    if canonical_forwarders(&recorded.dns_forwarders) != canonical_forwarders(&desired.dns_forwarders) {
        fields.push("dns_forwarders");
    }

    if !fields.is_empty() {
        return Change::Replace {
            fields: fields.into_iter().map(String::from).collect(),
        };
    }

    match desired.autostart {
        Some(wanted) if recorded.autostart != Some(wanted) => Change::InPlace,
        _ => Change::Unchanged,
    }
}

/// Trimmed bridge name; blank means unset.
fn canonical_bridge(bridge: Option<&str>) -> Option<&str> {
    bridge.map(str::trim).filter(|b| !b.is_empty())
}

/// Forwarders as the host stores them: addresses in canonical text, blank
/// fields unset.
fn canonical_forwarders(forwarders: &[DnsForwarder]) -> Vec<(Option<String>, Option<String>)> {
    forwarders
        .iter()
        .map(|fwd| {
            let address = fwd
                .address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(|a| a.parse::<IpAddr>().map_or_else(|_| a.to_string(), |ip| ip.to_string()));
            let domain = fwd
                .domain
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            (address, domain)
        })
        .collect()
}

fn same_mode(a: &str, b: &str) -> bool {
    match (a.parse::<ForwardMode>(), b.parse::<ForwardMode>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}
