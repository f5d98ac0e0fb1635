//! `virtnet apply` command - Create or reconcile a network from a spec.

use std::fmt;
use std::path::PathBuf;

use clap::Args;
use virtnet_core::{build, plan_change, Change, NetworkSpec, NetworkState};
use virtnet_runtime::{Resource, VirtService};

use super::{load_spec, Context};

#[derive(Args)]
pub struct ApplyArgs {
    /// YAML network spec
    #[arg(short, long)]
    pub file: PathBuf,
}

/// What `apply` did to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Created,
    Updated,
    Replaced,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyAction::Created => write!(f, "created"),
            ApplyAction::Updated => write!(f, "updated"),
            ApplyAction::Replaced => write!(f, "replaced"),
        }
    }
}

pub async fn execute<S: VirtService + ?Sized + 'static>(
    args: ApplyArgs,
    ctx: &Context<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = load_spec(&args.file)?;
    let (action, state) = apply_spec(ctx, &spec).await?;
    println!("{} {} ({})", state.spec.name, action, state.id);
    Ok(())
}

/// Bring the host in line with `spec` and record the result.
///
/// A network is created when it is not recorded or has vanished from the
/// host, updated in place when only autostart differs, and destroyed and
/// recreated when an immutable field changed.
pub async fn apply_spec<S: VirtService + ?Sized + 'static>(
    ctx: &Context<S>,
    spec: &NetworkSpec,
) -> Result<(ApplyAction, NetworkState), Box<dyn std::error::Error>> {
    // Reject an invalid spec before anything is torn down.
    build(spec)?;

    let recorded = match ctx.store.get(&spec.name)? {
        Some(state) => {
            if ctx.resource.exists(&state.id).await? {
                Some(state)
            } else {
                tracing::warn!(network = %spec.name, uuid = %state.id, "Recorded network vanished from host, recreating");
                None
            }
        }
        None => None,
    };

    let (action, state) = match recorded {
        None => (ApplyAction::Created, ctx.resource.create(spec).await?),
        Some(current) => match plan_change(&current.spec, spec) {
            Change::Replace { fields } => {
                tracing::info!(network = %spec.name, fields = %fields.join(","), "Replacing network");
                ctx.resource.delete(&current.id).await?;
                ctx.store.remove(&current.spec.name)?;
                (ApplyAction::Replaced, ctx.resource.create(spec).await?)
            }
            Change::InPlace | Change::Unchanged => {
                (ApplyAction::Updated, ctx.resource.update(&current, spec).await?)
            }
        },
    };

    ctx.store.put(state.clone())?;
    Ok((action, state))
}
