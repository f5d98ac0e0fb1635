//! Lifecycle reconciliation of virtual networks.
//!
//! A network moves through `Absent -> Defined -> Build -> Active`, and on
//! removal through `Destroying -> NotExists`. `NetworkResource` drives those
//! transitions against an injected `VirtService`, waiting for the host to
//! converge with the shared poll primitive.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use virtnet_core::error::{NetError, Result};
use virtnet_core::{build, plan_change, Change, NetworkSpec, NetworkState, PollConfig, VirtnetConfig};

use crate::codec;
use crate::drift;
use crate::poll;
use crate::service::{NetworkHandle, VirtService};

/// Lifecycle phase of a managed network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkPhase {
    /// Not known to the host.
    Absent,
    /// Definition accepted, not started.
    Defined,
    /// Start requested, waiting for the host.
    Build,
    Active,
    Destroying,
    /// Gone from the host.
    NotExists,
}

impl fmt::Display for NetworkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkPhase::Absent => write!(f, "ABSENT"),
            NetworkPhase::Defined => write!(f, "DEFINED"),
            NetworkPhase::Build => write!(f, "BUILD"),
            NetworkPhase::Active => write!(f, "ACTIVE"),
            NetworkPhase::Destroying => write!(f, "DESTROYING"),
            NetworkPhase::NotExists => write!(f, "NOT_EXISTS"),
        }
    }
}

/// Create/read/update/delete/exists contract of a managed resource.
#[async_trait]
pub trait Resource: Send + Sync {
    /// User input.
    type Desired: Send + Sync;
    /// Recorded state, identified by an id assigned at creation.
    type State: Send + Sync;

    async fn create(&self, desired: &Self::Desired) -> Result<Self::State>;

    /// Refresh `state` from the host.
    async fn read(&self, state: &Self::State) -> Result<Self::State>;

    async fn update(&self, state: &Self::State, desired: &Self::Desired) -> Result<Self::State>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Absence is `Ok(false)`, not an error.
    async fn exists(&self, id: &str) -> Result<bool>;
}

/// Virtual network resource backed by a `VirtService`.
pub struct NetworkResource<S: VirtService + ?Sized> {
    service: Arc<S>,
    create_poll: PollConfig,
    delete_poll: PollConfig,
}

impl<S: VirtService + ?Sized> NetworkResource<S> {
    /// Resource with the default poll cadence.
    pub fn new(service: Arc<S>) -> Self {
        Self::with_poll(service, PollConfig::default(), PollConfig::default())
    }

    pub fn with_poll(service: Arc<S>, create_poll: PollConfig, delete_poll: PollConfig) -> Self {
        Self {
            service,
            create_poll,
            delete_poll,
        }
    }

    pub fn from_config(service: Arc<S>, config: &VirtnetConfig) -> Self {
        Self::with_poll(service, config.create_poll, config.delete_poll)
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Start the network and wait until the host reports it active.
    async fn activate_and_wait(&self, name: &str, net: &NetworkHandle) -> Result<()> {
        tracing::debug!(network = %name, phase = %NetworkPhase::Build, "Starting network");
        self.service.activate(net).await?;

        let service = &self.service;
        poll::wait_for(
            name,
            &NetworkPhase::Active.to_string(),
            &self.create_poll,
            move || async move { service.is_active(net).await },
        )
        .await
    }

    async fn finish_create(&self, desired: &NetworkSpec, net: &NetworkHandle) -> Result<NetworkState> {
        self.activate_and_wait(&desired.name, net).await?;

        if let Some(autostart) = desired.autostart {
            self.service.set_autostart(net, autostart).await?;
        }

        let recorded = NetworkState::new(net.uuid(), desired.clone());
        drift::observe(self.service.as_ref(), net, &recorded).await
    }
}

#[async_trait]
impl<S: VirtService + ?Sized + 'static> Resource for NetworkResource<S> {
    type Desired = NetworkSpec;
    type State = NetworkState;

    async fn create(&self, desired: &NetworkSpec) -> Result<NetworkState> {
        let def = build(desired)?;
        let xml = codec::encode(&def)?;

        let uri = self.service.uri().await?;
        tracing::info!(network = %desired.name, uri = %uri, phase = %NetworkPhase::Absent, "Creating network");
        tracing::debug!(network = %desired.name, xml = %xml, "Submitting definition");

        let net = self.service.define_network(&xml).await?;
        tracing::debug!(network = %desired.name, uuid = %net, phase = %NetworkPhase::Defined, "Network defined");

        match self.finish_create(desired, &net).await {
            Ok(state) => {
                tracing::info!(network = %desired.name, uuid = %state.id, "Network created");
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    network = %desired.name,
                    uuid = %net,
                    error = %e,
                    "Network left defined after failed create"
                );
                Err(e)
            }
        }
    }

    async fn read(&self, state: &NetworkState) -> Result<NetworkState> {
        let net = self.service.lookup_by_uuid(&state.id).await?;
        drift::observe(self.service.as_ref(), &net, state).await
    }

    async fn update(&self, state: &NetworkState, desired: &NetworkSpec) -> Result<NetworkState> {
        let change = plan_change(&state.spec, desired);
        if let Change::Replace { fields } = &change {
            return Err(NetError::ReplacementRequired {
                name: desired.name.clone(),
                fields: fields.clone(),
            });
        }

        let net = self.service.lookup_by_uuid(&state.id).await?;

        // Repairs a network stopped out of band; a no-op when already active.
        tracing::debug!(network = %desired.name, uuid = %net, "Reactivating before update");
        self.service.activate(&net).await?;

        if change == Change::InPlace {
            if let Some(autostart) = desired.autostart {
                tracing::info!(network = %desired.name, autostart, "Updating autostart");
                self.service.set_autostart(&net, autostart).await?;
            }
        }

        drift::observe(self.service.as_ref(), &net, state).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let net = self.service.lookup_by_uuid(id).await?;
        tracing::info!(uuid = %net, phase = %NetworkPhase::Destroying, "Deleting network");

        // The host refuses to tear down some inactive networks.
        tracing::debug!(uuid = %net, "Reactivating before destroy");
        self.service.activate(&net).await?;
        self.service.deactivate(&net).await?;
        self.service.undefine(&net).await?;

        let service = &self.service;
        poll::wait_for(
            id,
            &NetworkPhase::NotExists.to_string(),
            &self.delete_poll,
            move || async move {
                match service.lookup_by_uuid(id).await {
                    Ok(_) => Ok(false),
                    Err(e) if e.is_not_found() => Ok(true),
                    Err(e) => Err(e),
                }
            },
        )
        .await?;

        tracing::info!(uuid = %id, "Network deleted");
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        match self.service.lookup_by_uuid(id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::debug!(uuid = %id, phase = %NetworkPhase::Absent, "Network not on host");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
