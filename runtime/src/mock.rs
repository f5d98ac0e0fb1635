//! In-memory virtualization host.
//!
//! `MockService` behaves like a real host for the operations virtnet uses:
//! names are unique, UUIDs and bridge names are assigned on define, a
//! network must be active to be stopped, and convergence can be delayed or
//! disturbed with injected faults. Every mutating call is recorded.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use virtnet_core::definition::Bridge;
use virtnet_core::error::{NetError, Result};
use virtnet_core::NetworkDefinition;

use crate::codec;
use crate::service::{NetworkHandle, VirtService};

/// Mutating call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Define(String),
    Activate,
    Deactivate,
    Undefine,
    SetAutostart(bool),
}

#[derive(Debug, Clone)]
struct MockNetwork {
    def: NetworkDefinition,
    active: bool,
    autostart: bool,
    /// `is_active` keeps reporting false this many more times after start.
    pending_active_probes: u32,
}

#[derive(Debug, Default)]
struct MockState {
    networks: HashMap<String, MockNetwork>,
    /// Undefined networks still visible to this many more lookups.
    lingering: HashMap<String, u32>,
    faults: HashMap<&'static str, u32>,
    calls: Vec<MockCall>,
    activation_lag: u32,
    removal_lag: u32,
    next_bridge: u32,
}

/// In-memory `VirtService`.
#[derive(Debug, Default)]
pub struct MockService {
    state: Mutex<MockState>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newly started networks report inactive for `probes` checks.
    pub fn with_activation_lag(self, probes: u32) -> Self {
        self.state.lock().activation_lag = probes;
        self
    }

    /// Undefined networks stay visible to `lookups` more lookups.
    pub fn with_removal_lag(self, lookups: u32) -> Self {
        self.state.lock().removal_lag = lookups;
        self
    }

    /// Fail the next `times` calls of `op` (e.g. "is_active") with an
    /// external error.
    pub fn inject_fault(&self, op: &'static str, times: u32) {
        self.state.lock().faults.insert(op, times);
    }

    /// Simulate the network being stopped behind virtnet's back.
    pub fn force_state(&self, uuid: &str, active: bool) {
        if let Some(net) = self.state.lock().networks.get_mut(uuid) {
            net.active = active;
            net.pending_active_probes = 0;
        }
    }

    /// Mutating calls in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn is_defined(&self, uuid: &str) -> bool {
        self.state.lock().networks.contains_key(uuid)
    }

    pub fn is_running(&self, uuid: &str) -> bool {
        self.state
            .lock()
            .networks
            .get(uuid)
            .is_some_and(|n| n.active)
    }

    pub fn autostart_of(&self, uuid: &str) -> Option<bool> {
        self.state.lock().networks.get(uuid).map(|n| n.autostart)
    }

    /// UUID of the network with the given name.
    pub fn uuid_of(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .networks
            .iter()
            .find(|(_, n)| n.def.name == name)
            .map(|(uuid, _)| uuid.clone())
    }

    /// Replace the live definition of a network (simulates out-of-band edits).
    pub fn edit_definition(&self, uuid: &str, edit: impl FnOnce(&mut NetworkDefinition)) {
        if let Some(net) = self.state.lock().networks.get_mut(uuid) {
            edit(&mut net.def);
        }
    }
}

impl MockState {
    fn check_fault(&mut self, op: &'static str) -> Result<()> {
        if let Some(remaining) = self.faults.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(NetError::External(format!("injected fault in {op}")));
            }
        }
        Ok(())
    }

    fn network(&mut self, net: &NetworkHandle) -> Result<&mut MockNetwork> {
        self.networks
            .get_mut(net.uuid())
            .ok_or_else(|| {
                NetError::External(format!(
                    "Network not found: no network with matching uuid '{}'",
                    net.uuid()
                ))
            })
    }
}

#[async_trait]
impl VirtService for MockService {
    async fn uri(&self) -> Result<String> {
        Ok("test:///default".to_string())
    }

    async fn define_network(&self, xml: &str) -> Result<NetworkHandle> {
        let mut state = self.state.lock();
        state.check_fault("define_network")?;

        let mut def = codec::decode(xml)?;
        if let Some((uuid, _)) = state.networks.iter().find(|(_, n)| n.def.name == def.name) {
            return Err(NetError::External(format!(
                "operation failed: network '{}' already exists with uuid {}",
                def.name, uuid
            )));
        }

        let uuid = uuid::Uuid::new_v4().to_string();
        def.uuid = Some(uuid.clone());
        let bridge = def.bridge.get_or_insert_with(Bridge::default);
        if bridge.name.is_empty() {
            bridge.name = format!("virbr{}", state.next_bridge + 1);
            state.next_bridge += 1;
        }

        state.calls.push(MockCall::Define(def.name.clone()));
        state.networks.insert(
            uuid.clone(),
            MockNetwork {
                def,
                active: false,
                autostart: false,
                pending_active_probes: 0,
            },
        );
        Ok(NetworkHandle::new(uuid))
    }

    async fn lookup_by_uuid(&self, uuid: &str) -> Result<NetworkHandle> {
        let mut state = self.state.lock();
        state.check_fault("lookup_by_uuid")?;

        if state.networks.contains_key(uuid) {
            return Ok(NetworkHandle::new(uuid));
        }
        if let Some(remaining) = state.lingering.get_mut(uuid) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(NetworkHandle::new(uuid));
            }
        }
        Err(NetError::NotFound(format!(
            "no network with matching uuid '{uuid}'"
        )))
    }

    async fn activate(&self, net: &NetworkHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.check_fault("activate")?;
        state.calls.push(MockCall::Activate);

        let lag = state.activation_lag;
        let network = state.network(net)?;
        if !network.active {
            network.active = true;
            network.pending_active_probes = lag;
        }
        Ok(())
    }

    async fn deactivate(&self, net: &NetworkHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.check_fault("deactivate")?;
        state.calls.push(MockCall::Deactivate);

        let network = state.network(net)?;
        if !network.active {
            return Err(NetError::External(
                "Requested operation is not valid: network is not active".to_string(),
            ));
        }
        network.active = false;
        Ok(())
    }

    async fn undefine(&self, net: &NetworkHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.check_fault("undefine")?;
        state.calls.push(MockCall::Undefine);

        state.network(net)?;
        state.networks.remove(net.uuid());
        let lag = state.removal_lag;
        if lag > 0 {
            state.lingering.insert(net.uuid().to_string(), lag);
        }
        Ok(())
    }

    async fn is_active(&self, net: &NetworkHandle) -> Result<bool> {
        let mut state = self.state.lock();
        state.check_fault("is_active")?;

        let network = state.network(net)?;
        if network.active && network.pending_active_probes > 0 {
            network.pending_active_probes -= 1;
            return Ok(false);
        }
        Ok(network.active)
    }

    async fn get_autostart(&self, net: &NetworkHandle) -> Result<bool> {
        let mut state = self.state.lock();
        state.check_fault("get_autostart")?;
        Ok(state.network(net)?.autostart)
    }

    async fn set_autostart(&self, net: &NetworkHandle, autostart: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.check_fault("set_autostart")?;
        state.calls.push(MockCall::SetAutostart(autostart));
        state.network(net)?.autostart = autostart;
        Ok(())
    }

    async fn xml_desc(&self, net: &NetworkHandle) -> Result<String> {
        let mut state = self.state.lock();
        state.check_fault("xml_desc")?;
        let def = state.network(net)?.def.clone();
        codec::encode(&def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use virtnet_core::{build, NetworkSpec};

    fn xml(name: &str) -> String {
        let mut spec = NetworkSpec::new(name);
        spec.addresses = vec!["10.17.3.0/24".to_string()];
        codec::encode(&build(&spec).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_define_assigns_uuid_and_bridge() {
        let mock = MockService::new();
        let handle = mock.define_network(&xml("k8snet")).await.unwrap();
        assert!(mock.is_defined(handle.uuid()));
        assert!(!mock.is_running(handle.uuid()));

        let live = codec::decode(&mock.xml_desc(&handle).await.unwrap()).unwrap();
        assert_eq!(live.uuid.as_deref(), Some(handle.uuid()));
        assert_eq!(live.bridge.unwrap().name, "virbr1");
    }

    #[tokio::test]
    async fn test_define_duplicate_name_conflicts() {
        let mock = MockService::new();
        mock.define_network(&xml("k8snet")).await.unwrap();
        let err = mock.define_network(&xml("k8snet")).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_lookup_missing_is_not_found() {
        let mock = MockService::new();
        let err = mock.lookup_by_uuid("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_network_outside_lookup_is_external() {
        let mock = MockService::new();
        let err = mock.activate(&NetworkHandle::new("nope")).await.unwrap_err();
        assert!(matches!(err, NetError::External(_)));
    }

    #[tokio::test]
    async fn test_activation_lag() {
        let mock = MockService::new().with_activation_lag(2);
        let handle = mock.define_network(&xml("k8snet")).await.unwrap();
        mock.activate(&handle).await.unwrap();
        assert!(!mock.is_active(&handle).await.unwrap());
        assert!(!mock.is_active(&handle).await.unwrap());
        assert!(mock.is_active(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let mock = MockService::new();
        let handle = mock.define_network(&xml("k8snet")).await.unwrap();
        mock.activate(&handle).await.unwrap();
        mock.activate(&handle).await.unwrap();
        assert!(mock.is_active(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_deactivate_inactive_fails() {
        let mock = MockService::new();
        let handle = mock.define_network(&xml("k8snet")).await.unwrap();
        assert!(mock.deactivate(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_removal_lag() {
        let mock = MockService::new().with_removal_lag(1);
        let handle = mock.define_network(&xml("k8snet")).await.unwrap();
        mock.undefine(&handle).await.unwrap();
        assert!(mock.lookup_by_uuid(handle.uuid()).await.is_ok());
        assert!(mock
            .lookup_by_uuid(handle.uuid())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_inject_fault() {
        let mock = MockService::new();
        let handle = mock.define_network(&xml("k8snet")).await.unwrap();
        mock.inject_fault("get_autostart", 1);
        assert!(mock.get_autostart(&handle).await.is_err());
        assert!(!mock.get_autostart(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_calls_recorded() {
        let mock = MockService::new();
        let handle = mock.define_network(&xml("k8snet")).await.unwrap();
        mock.activate(&handle).await.unwrap();
        mock.set_autostart(&handle, true).await.unwrap();
        assert_eq!(
            mock.calls(),
            vec![
                MockCall::Define("k8snet".to_string()),
                MockCall::Activate,
                MockCall::SetAutostart(true),
            ]
        );
        assert_eq!(mock.autostart_of(handle.uuid()), Some(true));
    }
}
