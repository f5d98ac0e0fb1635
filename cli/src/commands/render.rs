//! `virtnet render` command - Print the XML definition for a spec.

use std::path::PathBuf;

use clap::Args;
use virtnet_runtime::codec;

use super::load_spec;

#[derive(Args)]
pub struct RenderArgs {
    /// YAML network spec
    #[arg(short, long)]
    pub file: PathBuf,
}

pub async fn execute(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let spec = load_spec(&args.file)?;
    let def = virtnet_core::build(&spec)?;
    println!("{}", codec::encode(&def)?);
    Ok(())
}
