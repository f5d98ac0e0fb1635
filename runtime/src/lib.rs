//! virtnet runtime - virtual network lifecycle against a virtualization host.
//!
//! This module provides the host-facing half of virtnet: the `VirtService`
//! abstraction with a `virsh` backend and an in-memory mock, the XML codec,
//! the poll primitive, the lifecycle reconciler and the drift reader.

#![allow(clippy::result_large_err)]

pub mod codec;
pub mod drift;
pub mod mock;
pub mod poll;
pub mod reconcile;
pub mod service;
pub mod virsh;

// Re-export common types
pub use mock::{MockCall, MockService};
pub use poll::wait_for;
pub use reconcile::{NetworkPhase, NetworkResource, Resource};
pub use service::{NetworkHandle, VirtService};
pub use virsh::VirshService;

/// virtnet runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
