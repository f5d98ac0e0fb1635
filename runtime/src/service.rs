//! VirtService - Trait for virtualization host backends.

use async_trait::async_trait;
use std::fmt;
use virtnet_core::error::Result;

/// Opaque reference to a network object on the host, keyed by its UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkHandle {
    uuid: String,
}

impl NetworkHandle {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }

    /// UUID assigned by the host.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
}

impl fmt::Display for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uuid)
    }
}

/// Network operations offered by a virtualization host.
///
/// Every call is a single transaction on the host. `lookup_by_uuid` reports
/// a missing network as `NetError::NotFound`; every other failure is
/// `NetError::External` with the host's message.
#[async_trait]
pub trait VirtService: Send + Sync {
    /// Connection URI, for logging.
    async fn uri(&self) -> Result<String>;

    /// Define (but do not start) a network from its XML definition.
    /// A name already in use is rejected by the host.
    async fn define_network(&self, xml: &str) -> Result<NetworkHandle>;

    async fn lookup_by_uuid(&self, uuid: &str) -> Result<NetworkHandle>;

    /// Start the network. Starting an active network is a no-op.
    async fn activate(&self, net: &NetworkHandle) -> Result<()>;

    /// Stop the network.
    async fn deactivate(&self, net: &NetworkHandle) -> Result<()>;

    /// Permanently remove the network definition.
    async fn undefine(&self, net: &NetworkHandle) -> Result<()>;

    async fn is_active(&self, net: &NetworkHandle) -> Result<bool>;

    async fn get_autostart(&self, net: &NetworkHandle) -> Result<bool>;

    async fn set_autostart(&self, net: &NetworkHandle, autostart: bool) -> Result<()>;

    /// The live XML definition as reported by the host.
    async fn xml_desc(&self, net: &NetworkHandle) -> Result<String>;
}
