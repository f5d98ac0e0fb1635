//! CLI command definitions and dispatch.

mod apply;
mod autostart;
mod exists;
mod import;
mod ls;
mod render;
mod rm;
mod show;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use virtnet_core::{NetworkSpec, VirtnetConfig};
use virtnet_runtime::{NetworkResource, VirshService, VirtService};

use crate::store::NetworkStore;

pub use apply::{apply_spec, ApplyAction};

/// virtnet - declarative libvirt virtual networks.
#[derive(Parser)]
#[command(name = "virtnet", version, about)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: <home>/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create or reconcile a network from a YAML spec
    Apply(apply::ApplyArgs),
    /// Print the XML definition for a spec without contacting the host
    Render(render::RenderArgs),
    /// Refresh a recorded network from the host and print it as JSON
    Show(show::ShowArgs),
    /// Enable or disable starting a network at host boot
    Autostart(autostart::AutostartArgs),
    /// Destroy a network and forget it
    Rm(rm::RmArgs),
    /// Report whether a recorded network still exists on the host
    Exists(exists::ExistsArgs),
    /// Adopt an existing network by UUID
    Import(import::ImportArgs),
    /// List recorded networks
    Ls(ls::LsArgs),
}

/// Host access and local records shared by the commands.
pub struct Context<S: VirtService + ?Sized> {
    pub resource: NetworkResource<S>,
    pub store: NetworkStore,
}

impl<S: VirtService + ?Sized> Context<S> {
    pub fn new(service: Arc<S>, config: &VirtnetConfig, store: NetworkStore) -> Self {
        Self {
            resource: NetworkResource::from_config(service, config),
            store,
        }
    }
}

/// Context backed by `virsh` and the default state file.
fn open_context(config_path: Option<&Path>) -> Result<Context<VirshService>, Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => VirtnetConfig::load(path)?,
        None => VirtnetConfig::load_default()?,
    };
    let service = Arc::new(VirshService::from_config(&config));
    Ok(Context::new(service, &config, NetworkStore::default_path()?))
}

/// Read a YAML spec file.
pub(crate) fn load_spec(path: &Path) -> Result<NetworkSpec, Box<dyn std::error::Error>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    Ok(NetworkSpec::from_yaml(&data)?)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Render(args) => render::execute(args).await,
        Command::Ls(args) => ls::execute(args, &NetworkStore::default_path()?).await,
        Command::Apply(args) => apply::execute(args, &open_context(config)?).await,
        Command::Show(args) => show::execute(args, &open_context(config)?).await,
        Command::Autostart(args) => autostart::execute(args, &open_context(config)?).await,
        Command::Rm(args) => rm::execute(args, &open_context(config)?).await,
        Command::Exists(args) => exists::execute(args, &open_context(config)?).await,
        Command::Import(args) => import::execute(args, &open_context(config)?).await,
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use virtnet_core::PollConfig;
    use virtnet_runtime::MockService;

    pub fn fast_config() -> VirtnetConfig {
        let fast = PollConfig {
            delay_ms: 1,
            interval_ms: 2,
            timeout_ms: 500,
        };
        VirtnetConfig {
            create_poll: fast,
            delete_poll: fast,
            ..Default::default()
        }
    }

    /// Mock-backed context with a throwaway state file.
    pub fn mock_context() -> (tempfile::TempDir, Arc<MockService>, Context<MockService>) {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockService::new());
        let store = NetworkStore::new(dir.path().join("networks.json"));
        let ctx = Context::new(mock.clone(), &fast_config(), store);
        (dir, mock, ctx)
    }

    pub fn k8snet() -> NetworkSpec {
        let mut spec = NetworkSpec::new("k8snet");
        spec.domain = Some("k8s.local".to_string());
        spec.addresses = vec!["10.17.3.0/24".to_string()];
        spec
    }

    pub fn write_spec(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join("spec.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }
}
