//! Drift detection: project a live definition back onto recorded state.

use virtnet_core::error::Result;
use virtnet_core::{DnsForwarder, ForwardMode, NetworkState};

use crate::codec;
use crate::service::{NetworkHandle, VirtService};

/// Read the live definition of `net` and fold its user-facing fields into
/// `previous`.
///
/// Fields the host does not report (or reports empty) keep their recorded
/// value. Mode and DHCP are only taken from the host when adopting a network
/// (`previous` carries no name); otherwise they keep their recorded value.
pub async fn observe<S: VirtService + ?Sized>(
    service: &S,
    net: &NetworkHandle,
    previous: &NetworkState,
) -> Result<NetworkState> {
    let xml = service.xml_desc(net).await?;
    let live = codec::decode(&xml)?;
    let autostart = service.get_autostart(net).await?;

    let adopting = previous.spec.name.is_empty();

    let mut state = previous.clone();
    state.id = net.uuid().to_string();
    state.spec.name = live.name;

    if adopting {
        state.spec.mode = match &live.forward {
            Some(forward) => forward.mode.trim().to_lowercase(),
            None => ForwardMode::Isolated.to_string(),
        };
        if !live.ips.is_empty() {
            state.spec.dhcp_enabled = live.ips.iter().any(|ip| ip.dhcp_range().is_some());
        }
    }

    if let Some(bridge) = live.bridge.filter(|b| !b.name.is_empty()) {
        state.spec.bridge = Some(bridge.name);
    }

    if let Some(domain) = live.domain {
        state.spec.dns_local_only = domain.is_local_only();
        state.spec.domain = Some(domain.name);
    }

    state.spec.autostart = Some(autostart);

    let addresses = live
        .ips
        .iter()
        .map(|ip| ip.network_cidr())
        .collect::<Result<Vec<_>>>()?;
    if !addresses.is_empty() {
        state.spec.addresses = addresses;
    }

    if let Some(dns) = live.dns {
        for (i, entry) in dns.forwarders.into_iter().enumerate() {
            if i >= state.spec.dns_forwarders.len() {
                state.spec.dns_forwarders.push(DnsForwarder::default());
            }
            let slot = &mut state.spec.dns_forwarders[i];
            if !entry.addr.is_empty() {
                slot.address = Some(entry.addr);
            }
            if !entry.domain.is_empty() {
                slot.domain = Some(entry.domain);
            }
        }
    }

    tracing::debug!(
        network = %state.spec.name,
        uuid = %state.id,
        addresses = state.spec.addresses.len(),
        "Observed live network"
    );
    Ok(state)
}
