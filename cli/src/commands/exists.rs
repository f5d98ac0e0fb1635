//! `virtnet exists` command - Check a recorded network against the host.

use clap::Args;
use virtnet_runtime::{Resource, VirtService};

use super::Context;

#[derive(Args)]
pub struct ExistsArgs {
    /// Network name
    pub name: String,
}

pub async fn execute<S: VirtService + ?Sized + 'static>(
    args: ExistsArgs,
    ctx: &Context<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", network_exists(&args.name, ctx).await?);
    Ok(())
}

/// Unrecorded names and networks that vanished from the host are absent.
pub(crate) async fn network_exists<S: VirtService + ?Sized + 'static>(
    name: &str,
    ctx: &Context<S>,
) -> Result<bool, Box<dyn std::error::Error>> {
    match ctx.store.get(name)? {
        Some(recorded) => Ok(ctx.resource.exists(&recorded.id).await?),
        None => Ok(false),
    }
}
