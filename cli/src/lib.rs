//! virtnet CLI - declarative libvirt virtual networks.

pub mod commands;
pub mod output;
pub mod store;
