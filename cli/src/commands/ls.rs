//! `virtnet ls` command - List recorded networks.

use clap::Args;
use virtnet_core::NetworkState;

use crate::output;
use crate::store::NetworkStore;

#[derive(Args)]
pub struct LsArgs {
    /// Only display network names
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: LsArgs, store: &NetworkStore) -> Result<(), Box<dyn std::error::Error>> {
    let networks = store.list()?;

    if args.quiet {
        for state in &networks {
            println!("{}", state.spec.name);
        }
        return Ok(());
    }

    let mut table = output::new_table(&["NAME", "UUID", "MODE", "BRIDGE", "ADDRESSES", "AUTOSTART"]);
    for state in &networks {
        table.add_row(row(state));
    }

    println!("{table}");
    Ok(())
}

fn row(state: &NetworkState) -> [String; 6] {
    [
        state.spec.name.clone(),
        output::short_uuid(&state.id),
        state.spec.mode.to_lowercase(),
        state.spec.bridge.clone().unwrap_or_else(|| "-".to_string()),
        output::join_or_dash(&state.spec.addresses),
        output::format_flag(state.spec.autostart),
    ]
}
