//! `virtnet show` command - Refresh a recorded network and print it as JSON.

use clap::Args;
use virtnet_runtime::{Resource, VirtService};

use super::Context;

#[derive(Args)]
pub struct ShowArgs {
    /// Network name
    pub name: String,
}

pub async fn execute<S: VirtService + ?Sized + 'static>(
    args: ShowArgs,
    ctx: &Context<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let recorded = ctx.store.require(&args.name)?;
    let state = ctx.resource.read(&recorded).await?;
    ctx.store.put(state.clone())?;

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
