//! virtnet core - network specification types and planning.
//!
//! Pure building blocks with no host access: the error taxonomy, the
//! declarative `NetworkSpec`, address planning, and the definition builder
//! that turns a spec into a complete network definition.

pub mod address;
pub mod config;
pub mod definition;
pub mod error;
pub mod network;

// Re-export commonly used types
pub use address::{AddressFamily, AddressPlan, DhcpRange};
pub use config::{PollConfig, VirtnetConfig};
pub use definition::{build, NetworkDefinition};
pub use error::{NetError, Result};
pub use network::{plan_change, Change, DnsForwarder, ForwardMode, NetworkSpec, NetworkState};

/// virtnet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
