// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reads the source tree, diffs it against state, and orders the result
//! into the sequence the applier must execute.

use std::collections::BTreeMap;
use std::path::Path;

use apimctl_core::{Artifact, State};
use apimctl_kinds::{deployment_rank, registry};

use crate::differ::{Action, Change, diff};
use crate::error::EngineError;
use crate::plan_doc::{PlanDocument, TargetCoordinates};

/// Reads every kind (optionally restricted to `only`) under `source_dir`,
/// diffs the union against `state`, and returns the resulting plan.
/// `only`, when present, also restricts which state artifacts participate
/// in the diff, so that e.g. `plan --only backend` never reports deletes
/// for resources of a kind that was never read.
pub async fn plan(source_dir: &Path, state: &State, only: Option<&[String]>) -> Result<PlanDocument, EngineError> {
    if let Some(only) = only {
        for kind in only {
            if deployment_rank(kind).is_none() {
                return Err(EngineError::UnknownKind(kind.clone()));
            }
        }
    }

    let mut local: BTreeMap<String, Artifact> = BTreeMap::new();
    for kind in registry() {
        if let Some(only) = only {
            if !only.iter().any(|k| k == kind.name()) {
                continue;
            }
        }
        for artifact in kind.read_local(source_dir).await? {
            local.insert(artifact.key.clone(), artifact);
        }
    }

    let filtered_state: BTreeMap<String, Artifact> = match only {
        Some(only) => state
            .artifacts
            .iter()
            .filter(|(_, a)| only.iter().any(|k| k == &a.kind))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        None => state.artifacts.clone(),
    };

    let changes = diff(&local, &filtered_state);
    let coords = TargetCoordinates {
        subscription_id: state.subscription_id.clone(),
        resource_group: state.resource_group.clone(),
        service_name: state.service_name.clone(),
    };
    Ok(PlanDocument::new(
        now_iso8601(),
        source_dir.display().to_string(),
        coords,
        changes,
    ))
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Orders `changes` for execution: CREATE and UPDATE in forward kind
/// order, DELETE in reverse kind order, NOOPs dropped, ties within one
/// kind broken by lexicographic key.
pub fn order(changes: &[Change]) -> Vec<Change> {
    let mut creates_updates: Vec<Change> = changes
        .iter()
        .filter(|c| matches!(c.action, Action::Create | Action::Update))
        .cloned()
        .collect();
    creates_updates.sort_by(|a, b| rank(&a.kind).cmp(&rank(&b.kind)).then_with(|| a.key.cmp(&b.key)));

    let mut deletes: Vec<Change> = changes.iter().filter(|c| c.action == Action::Delete).cloned().collect();
    deletes.sort_by(|a, b| rank(&b.kind).cmp(&rank(&a.kind)).then_with(|| a.key.cmp(&b.key)));

    creates_updates.into_iter().chain(deletes).collect()
}

fn rank(kind: &str) -> usize {
    deployment_rank(kind).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(action: Action, kind: &str, id: &str) -> Change {
        Change {
            action,
            key: format!("{kind}:{id}"),
            kind: kind.to_string(),
            id: id.to_string(),
            display_name: id.to_string(),
            detail: String::new(),
            old: None,
            new: None,
        }
    }

    #[test]
    fn order_drops_noops() {
        let changes = vec![change(Action::Noop, "tag", "t1"), change(Action::Create, "tag", "t2")];
        let ordered = order(&changes);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].id, "t2");
    }

    #[test]
    fn creates_and_updates_run_forward_deletes_run_reverse() {
        let changes = vec![
            change(Action::Delete, "product", "p1"),
            change(Action::Create, "named_value", "nv1"),
            change(Action::Delete, "named_value", "nv2"),
            change(Action::Update, "product", "p2"),
        ];
        let ordered = order(&changes);
        let kinds: Vec<&str> = ordered.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, ["named_value", "product", "product", "named_value"]);
    }

    #[test]
    fn ties_within_a_kind_are_lexicographic_by_key() {
        let changes = vec![change(Action::Create, "tag", "b"), change(Action::Create, "tag", "a")];
        let ordered = order(&changes);
        assert_eq!(ordered[0].id, "a");
        assert_eq!(ordered[1].id, "b");
    }

    #[tokio::test]
    async fn plan_rejects_unknown_only_kind() {
        let dir = tempfile::tempdir().unwrap();
        let state = apimctl_core::empty_state("sub", "rg", "svc");
        let err = plan(dir.path(), &state, Some(&["not_a_kind".to_string()])).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownKind(_)));
    }

    #[tokio::test]
    async fn plan_reports_create_for_new_local_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("backends")).unwrap();
        std::fs::write(dir.path().join("backends/b1.json"), json!({"url": "https://x"}).to_string()).unwrap();
        let state = apimctl_core::empty_state("sub", "rg", "svc");
        let doc = plan(dir.path(), &state, None).await.unwrap();
        assert_eq!(doc.summary.create, 1);
        assert_eq!(doc.exit_code(), 2);
    }
}
