//! `virtnet import` command - Adopt an existing network by UUID.

use clap::Args;
use virtnet_core::NetworkState;
use virtnet_runtime::{Resource, VirtService};

use super::Context;

#[derive(Args)]
pub struct ImportArgs {
    /// UUID of the network on the host
    pub uuid: String,
}

pub async fn execute<S: VirtService + ?Sized + 'static>(
    args: ImportArgs,
    ctx: &Context<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = ctx.resource.read(&NetworkState::imported(&args.uuid)).await?;

    if let Some(existing) = ctx.store.get(&state.spec.name)? {
        if existing.id != state.id {
            return Err(format!(
                "a different network named '{}' is already recorded ({})",
                state.spec.name, existing.id
            )
            .into());
        }
    }

    ctx.store.put(state.clone())?;
    println!("{}", state.spec.name);
    Ok(())
}
