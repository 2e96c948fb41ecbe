// SPDX-License-Identifier: MIT OR Apache-2.0
//! The five verb implementations. Each takes its already-resolved
//! arguments and returns the process exit code, so `main` only has to
//! parse flags and print the final error, if any.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use apimctl_core::empty_state;
use apimctl_engine::{apply as engine_apply, apply_force, extract as engine_extract, plan as engine_plan, read_plan, write_plan};
use apimctl_state::StateBackend;
use apimctl_transport::ApimClient;

use crate::config::{AuthFlagArgs, TargetCoords, build_token_source};
use crate::error::CliError;
use crate::render::render_plan;

fn build_client(coords: &TargetCoords, auth: &AuthFlagArgs) -> ApimClient {
    let http = reqwest::Client::new();
    let tokens = build_token_source(auth, http.clone());
    ApimClient::new(http, &coords.subscription_id, &coords.resource_group, &coords.service_name, tokens)
}

pub async fn cmd_init(store: &Arc<dyn StateBackend>, coords: &TargetCoords) -> Result<i32, CliError> {
    store
        .init(&coords.subscription_id, &coords.resource_group, &coords.service_name)
        .await?;
    info!("initialized state for {}/{}/{}", coords.subscription_id, coords.resource_group, coords.service_name);
    Ok(0)
}

pub struct PlanArgs {
    pub source_dir: PathBuf,
    pub out: Option<PathBuf>,
    pub only: Option<Vec<String>>,
    pub verbose: bool,
}

pub async fn cmd_plan(store: &Arc<dyn StateBackend>, plan_args: &PlanArgs) -> Result<i32, CliError> {
    let state = store.read().await?;
    let only = plan_args.only.as_deref();
    let doc = engine_plan(&plan_args.source_dir, &state, only).await?;

    if plan_args.verbose {
        print!("{}", render_plan(&doc));
    } else {
        println!(
            "Plan: {} to create, {} to update, {} to delete, {} unchanged.",
            doc.summary.create, doc.summary.update, doc.summary.delete, doc.summary.noop
        );
    }

    if let Some(out) = &plan_args.out {
        write_plan(out, &doc)?;
    }

    Ok(doc.exit_code())
}

pub struct ApplyArgs {
    pub source_dir: PathBuf,
    pub plan_path: Option<PathBuf>,
    pub force: bool,
    pub auto_approve: bool,
    pub only: Option<Vec<String>>,
}

pub async fn cmd_apply(
    store: &Arc<dyn StateBackend>,
    coords: &TargetCoords,
    auth: &AuthFlagArgs,
    apply_args: &ApplyArgs,
) -> Result<i32, CliError> {
    store.lock().await?;
    let result = cmd_apply_locked(store, coords, auth, apply_args).await;
    store.unlock().await?;
    result
}

async fn cmd_apply_locked(
    store: &Arc<dyn StateBackend>,
    coords: &TargetCoords,
    auth: &AuthFlagArgs,
    apply_args: &ApplyArgs,
) -> Result<i32, CliError> {
    let client = build_client(coords, auth);
    let mut state = store.read().await?;

    if apply_args.force {
        apply_force(&apply_args.source_dir, &client, store, &mut state, apply_args.only.as_deref())
            .await
            .map_err(|errors| CliError::Apply(errors.join("; ")))?;
        return Ok(0);
    }

    let changes = if let Some(plan_path) = &apply_args.plan_path {
        read_plan(plan_path)?.changes
    } else {
        let only = apply_args.only.as_deref();
        engine_plan(&apply_args.source_dir, &state, only).await?.changes
    };

    if !apply_args.auto_approve {
        let pending = changes.iter().filter(|c| c.action != apimctl_engine::Action::Noop).count();
        if pending > 0 {
            print!("{}", render_pending(&changes));
            println!("\n{pending} change(s) pending. Pass --auto-approve to apply without prompting.");
            return Ok(2);
        }
    }

    let outcome = engine_apply(&changes, &client, store, &mut state).await;
    info!(succeeded = outcome.succeeded, total = outcome.total, "apply finished");
    match outcome.error {
        Some(err) => Err(CliError::Apply(err)),
        None => Ok(0),
    }
}

fn render_pending(changes: &[apimctl_engine::Change]) -> String {
    changes
        .iter()
        .filter(|c| c.action != apimctl_engine::Action::Noop)
        .map(|c| format!("  {:?} {}\n", c.action, c.key))
        .collect()
}

pub struct ExtractArgs {
    pub output_dir: PathBuf,
    pub only: Option<Vec<String>>,
    pub update_state: bool,
}

pub async fn cmd_extract(
    store: &Arc<dyn StateBackend>,
    coords: &TargetCoords,
    auth: &AuthFlagArgs,
    extract_args: &ExtractArgs,
) -> Result<i32, CliError> {
    let client = build_client(coords, auth);
    let only = extract_args.only.as_deref();

    let outcome = if extract_args.update_state {
        store.lock().await?;
        let mut state = store.read().await.unwrap_or_else(|_| {
            empty_state(&coords.subscription_id, &coords.resource_group, &coords.service_name)
        });
        let outcome = engine_extract(&client, &extract_args.output_dir, only, true, Some(store), Some(&mut state)).await;
        store.unlock().await?;
        outcome.map_err(|e| CliError::Apply(e.to_string()))?
    } else {
        engine_extract(&client, &extract_args.output_dir, only, false, None, None)
            .await
            .map_err(|e| CliError::Apply(e.to_string()))?
    };

    for kind in &outcome.kinds {
        match &kind.error {
            Some(err) => eprintln!("{}: {err}", kind.kind),
            None => info!(kind = kind.kind, count = kind.count, "extracted"),
        }
    }

    Ok(if outcome.had_errors() { 1 } else { 0 })
}

pub async fn cmd_force_unlock(store: &Arc<dyn StateBackend>) -> Result<i32, CliError> {
    store.force_unlock().await?;
    Ok(0)
}
