// SPDX-License-Identifier: MIT OR Apache-2.0
//! Executes an ordered plan against the live control plane, persisting
//! state after every single successful change so a partial run is always
//! recoverable from where it stopped.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use apimctl_core::State;
use apimctl_kinds::{find, registry};
use apimctl_state::StateBackend;
use apimctl_transport::ApimClient;

use crate::differ::{Action, Change};
use crate::planner::order;

/// Outcome of a full `apply` run: how many of the ordered changes
/// succeeded before either exhausting the list or hitting an error, the
/// total attempted, and the formatted error (if any) that stopped the run.
pub struct ApplyOutcome {
    pub succeeded: usize,
    pub total: usize,
    pub error: Option<String>,
}

/// Executes `changes` in dependency order against `client`, persisting
/// `state` via `store` after every successful change. `state` is assumed
/// already loaded under the caller's lock.
pub async fn apply(
    changes: &[Change],
    client: &ApimClient,
    store: &Arc<dyn StateBackend>,
    state: &mut State,
) -> ApplyOutcome {
    let ordered = order(changes);
    let total = ordered.len();
    let mut succeeded = 0;

    for change in &ordered {
        if let Err(e) = apply_one(change, client).await {
            warn!(key = %change.key, error = %e, "apply stopped on error");
            let _ = store.write(state).await;
            return ApplyOutcome {
                succeeded,
                total,
                error: Some(format_error(&change.key, &e)),
            };
        }
        mutate_state(state, change);
        if let Err(e) = store.write(state).await {
            return ApplyOutcome {
                succeeded,
                total,
                error: Some(format!("state write failed after {}: {e}", change.key)),
            };
        }
        succeeded += 1;
        info!(key = %change.key, action = ?change.action, "applied change");
    }

    state.last_applied = Some(Utc::now().to_rfc3339());
    let _ = store.write(state).await;

    ApplyOutcome { succeeded, total, error: None }
}

async fn apply_one(change: &Change, client: &ApimClient) -> Result<(), apimctl_transport::TransportError> {
    let Some(kind) = find(&change.kind) else {
        return Ok(());
    };
    match change.action {
        Action::Create | Action::Update => {
            let new = change.new.as_ref().expect("CREATE/UPDATE carries a new artifact");
            let path = kind.resource_path(&change.id);
            let payload = kind.to_rest_payload(new);
            client.put(&path, &payload).await?;
            for (op_id, op_payload) in kind.to_operation_payloads(new) {
                let op_path = format!("/apis/{}/operations/{op_id}", change.id);
                client.put(&op_path, &op_payload).await?;
            }
        }
        Action::Delete => {
            let path = kind.resource_path(&change.id);
            client.delete(&path).await?;
        }
        Action::Noop => {}
    }
    Ok(())
}

fn mutate_state(state: &mut State, change: &Change) {
    match change.action {
        Action::Create | Action::Update => {
            if let Some(new) = &change.new {
                state.artifacts.insert(change.key.clone(), new.clone());
            }
        }
        Action::Delete => {
            state.artifacts.remove(&change.key);
        }
        Action::Noop => {}
    }
}

fn format_error(key: &str, err: &apimctl_transport::TransportError) -> String {
    format!("applying {key}: {err}")
}

/// Bypasses the differ entirely: clears `state.artifacts`, then reads and
/// PUTs every kind (optionally restricted to `only`) from `source_dir` in
/// forward registry order, continuing past any single artifact's failure
/// and collecting every error string for the final report. Used when
/// state is known to have drifted from the remote and a full resync is
/// cheaper than reasoning about a diff.
pub async fn apply_force(
    source_dir: &std::path::Path,
    client: &ApimClient,
    store: &Arc<dyn StateBackend>,
    state: &mut State,
    only: Option<&[String]>,
) -> Result<(), Vec<String>> {
    state.artifacts.clear();
    let mut errors = Vec::new();

    for kind in registry() {
        if let Some(only) = only {
            if !only.iter().any(|k| k == kind.name()) {
                continue;
            }
        }
        let artifacts = match kind.read_local(source_dir).await {
            Ok(a) => a,
            Err(e) => {
                errors.push(format!("reading {}: {e}", kind.name()));
                continue;
            }
        };
        for artifact in artifacts {
            let path = kind.resource_path(&artifact.id);
            let payload = kind.to_rest_payload(&artifact);
            let put_result = client.put(&path, &payload).await;
            match put_result {
                Ok(_) => {
                    for (op_id, op_payload) in kind.to_operation_payloads(&artifact) {
                        let op_path = format!("/apis/{}/operations/{op_id}", artifact.id);
                        if let Err(e) = client.put(&op_path, &op_payload).await {
                            errors.push(format!("applying {}: {e}", artifact.key));
                        }
                    }
                    state.artifacts.insert(artifact.key.clone(), artifact);
                }
                Err(e) => errors.push(format!("applying {}: {e}", artifact.key)),
            }
        }
    }

    state.last_applied = Some(Utc::now().to_rfc3339());
    let _ = store.write(state).await;

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mutate_state_inserts_on_create_and_removes_on_delete() {
        let mut state = apimctl_core::empty_state("sub", "rg", "svc");
        let artifact = apimctl_core::Artifact::new("tag", "t1", json!({}), "sha256:x".into());
        let create = Change {
            action: Action::Create,
            key: "tag:t1".into(),
            kind: "tag".into(),
            id: "t1".into(),
            display_name: "t1".into(),
            detail: String::new(),
            old: None,
            new: Some(artifact.clone()),
        };
        mutate_state(&mut state, &create);
        assert!(state.artifacts.contains_key("tag:t1"));

        let delete = Change {
            action: Action::Delete,
            key: "tag:t1".into(),
            kind: "tag".into(),
            id: "t1".into(),
            display_name: "t1".into(),
            detail: String::new(),
            old: Some(artifact),
            new: None,
        };
        mutate_state(&mut state, &delete);
        assert!(!state.artifacts.contains_key("tag:t1"));
    }
}
