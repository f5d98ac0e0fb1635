//! `virtnet rm` command - Destroy a network and forget it.

use clap::Args;
use virtnet_runtime::{Resource, VirtService};

use super::Context;

#[derive(Args)]
pub struct RmArgs {
    /// Network name(s) to remove
    #[arg(required = true)]
    pub names: Vec<String>,
}

pub async fn execute<S: VirtService + ?Sized + 'static>(
    args: RmArgs,
    ctx: &Context<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut errors: Vec<String> = Vec::new();

    for name in &args.names {
        match remove_one(name, ctx).await {
            Ok(()) => println!("{name}"),
            Err(e) => errors.push(format!("{name}: {e}")),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("\n").into())
    }
}

async fn remove_one<S: VirtService + ?Sized + 'static>(
    name: &str,
    ctx: &Context<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let recorded = ctx.store.require(name)?;

    match ctx.resource.delete(&recorded.id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::warn!(network = %name, uuid = %recorded.id, "Network already gone from host");
        }
        Err(e) => return Err(e.into()),
    }

    ctx.store.remove(name)?;
    Ok(())
}
