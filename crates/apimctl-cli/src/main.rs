// SPDX-License-Identifier: MIT OR Apache-2.0
mod commands;
mod config;
mod error;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use apimctl_state::build_backend;

use commands::{ApplyArgs, ExtractArgs, PlanArgs};
use config::{AuthFlagArgs, BackendFlagArgs, TargetCoordsArgs, resolve_backend_args, resolve_target_coords};
use error::CliError;

/// Exit code for hard failures (errors, not plan/apply diffs).
const EXIT_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "apimctl", version, about = "Declarative deployment engine for an API gateway control plane")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(flatten)]
    target: TargetFlags,

    #[command(flatten)]
    backend: BackendFlags,

    #[command(flatten)]
    auth: AuthFlags,
}

#[derive(clap::Args, Debug, Default)]
struct TargetFlags {
    #[arg(long, global = true)]
    subscription_id: Option<String>,
    #[arg(long, global = true)]
    resource_group: Option<String>,
    #[arg(long, global = true)]
    service_name: Option<String>,
}

#[derive(clap::Args, Debug, Default)]
struct BackendFlags {
    /// State backend: "local" (default) or "azure".
    #[arg(long, global = true)]
    backend: Option<String>,
    #[arg(long, global = true)]
    state_file: Option<String>,
    #[arg(long = "backend-storage-account", global = true)]
    storage_account: Option<String>,
    #[arg(long = "backend-storage-sas-token", global = true)]
    storage_sas_token: Option<String>,
    #[arg(long = "backend-container", global = true)]
    container: Option<String>,
    #[arg(long = "backend-blob", global = true)]
    blob: Option<String>,
}

#[derive(clap::Args, Debug, Default)]
struct AuthFlags {
    #[arg(long, global = true)]
    client_id: Option<String>,
    #[arg(long, global = true)]
    client_secret: Option<String>,
    #[arg(long, global = true)]
    tenant_id: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Creates a brand new, empty state for the target coordinates.
    Init,

    /// Shows the difference between the local tree and the persisted state.
    Plan {
        #[arg(long, default_value = ".")]
        source_dir: PathBuf,
        /// Write the computed plan to this path for a later `apply --plan`.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Restrict the diff to these kinds. Can be repeated.
        #[arg(long)]
        only: Vec<String>,
        /// Print the full per-change listing, not just the summary line.
        #[arg(long)]
        verbose: bool,
    },

    /// Executes the plan (computed fresh, or read from `--plan`) against the control plane.
    Apply {
        #[arg(long, default_value = ".")]
        source_dir: PathBuf,
        /// Apply a plan saved earlier by `plan --out`.
        #[arg(long)]
        plan: Option<PathBuf>,
        /// Skip the differ entirely: clear state and PUT every local artifact.
        #[arg(long)]
        force: bool,
        /// Apply without the pending-changes prompt.
        #[arg(long)]
        auto_approve: bool,
        /// Restrict the run to these kinds. Can be repeated.
        #[arg(long)]
        only: Vec<String>,
    },

    /// Snapshots the live control plane into the tree format.
    Extract {
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// Restrict extraction to these kinds. Can be repeated.
        #[arg(long)]
        only: Vec<String>,
        /// Replace the persisted state with the extracted set.
        #[arg(long)]
        update_state: bool,
    },

    /// Clears a stuck lock left behind by a crashed `apply`.
    ForceUnlock,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("apimctl=debug")
    } else {
        EnvFilter::new("apimctl=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_ERROR
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let backend_args = resolve_backend_args(&BackendFlagArgs {
        backend: cli.backend.backend,
        state_file: cli.backend.state_file,
        storage_account: cli.backend.storage_account,
        storage_sas_token: cli.backend.storage_sas_token,
        container: cli.backend.container,
        blob: cli.backend.blob,
    });
    let store = build_backend(&backend_args)?;

    let auth = AuthFlagArgs {
        client_id: cli.auth.client_id,
        client_secret: cli.auth.client_secret,
        tenant_id: cli.auth.tenant_id,
    };

    match cli.command {
        Commands::Init => {
            let coords_args = TargetCoordsArgs {
                subscription_id: cli.target.subscription_id,
                resource_group: cli.target.resource_group,
                service_name: cli.target.service_name,
            };
            let coords = resolve_target_coords(&coords_args, None).map_err(CliError::Config)?;
            commands::cmd_init(&store, &coords).await
        }
        Commands::Plan { source_dir, out, only, verbose } => {
            let only = none_if_empty(only);
            let plan_args = PlanArgs { source_dir, out, only, verbose };
            commands::cmd_plan(&store, &plan_args).await
        }
        Commands::Apply { source_dir, plan, force, auto_approve, only } => {
            let state = store.read().await.ok();
            let coords_args = TargetCoordsArgs {
                subscription_id: cli.target.subscription_id,
                resource_group: cli.target.resource_group,
                service_name: cli.target.service_name,
            };
            let coords = resolve_target_coords(&coords_args, state.as_ref()).map_err(CliError::Config)?;
            let only = none_if_empty(only);
            let apply_args = ApplyArgs { source_dir, plan_path: plan, force, auto_approve, only };
            commands::cmd_apply(&store, &coords, &auth, &apply_args).await
        }
        Commands::Extract { output_dir, only, update_state } => {
            let state = store.read().await.ok();
            let coords_args = TargetCoordsArgs {
                subscription_id: cli.target.subscription_id,
                resource_group: cli.target.resource_group,
                service_name: cli.target.service_name,
            };
            let coords = resolve_target_coords(&coords_args, state.as_ref()).map_err(CliError::Config)?;
            let only = none_if_empty(only);
            let extract_args = ExtractArgs { output_dir, only, update_state };
            commands::cmd_extract(&store, &coords, &auth, &extract_args).await
        }
        Commands::ForceUnlock => commands::cmd_force_unlock(&store).await,
    }
}

fn none_if_empty(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() { None } else { Some(v) }
}
