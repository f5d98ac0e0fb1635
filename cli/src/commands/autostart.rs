//! `virtnet autostart` command - Toggle starting a network at host boot.

use clap::{ArgGroup, Args};
use virtnet_runtime::{Resource, VirtService};

use super::Context;

#[derive(Args)]
#[command(group(ArgGroup::new("toggle").required(true).args(["enable", "disable"])))]
pub struct AutostartArgs {
    /// Network name
    pub name: String,

    /// Start the network at boot
    #[arg(long)]
    pub enable: bool,

    /// Do not start the network at boot
    #[arg(long)]
    pub disable: bool,
}

pub async fn execute<S: VirtService + ?Sized + 'static>(
    args: AutostartArgs,
    ctx: &Context<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let recorded = ctx.store.require(&args.name)?;

    let mut desired = recorded.spec.clone();
    desired.autostart = Some(args.enable);
    let state = ctx.resource.update(&recorded, &desired).await?;
    ctx.store.put(state)?;

    println!("{}", args.name);
    Ok(())
}
