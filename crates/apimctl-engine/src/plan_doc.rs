// SPDX-License-Identifier: MIT OR Apache-2.0
//! The plan document: the JSON artifact `plan` writes to `--out` and
//! `apply --plan` reads back, so a plan computed once can be reviewed and
//! then applied without recomputing the diff against a state that may
//! have moved on.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::differ::{Action, Change};
use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetCoordinates {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub noop: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub generated_at: String,
    pub source_dir: String,
    pub target_coords: TargetCoordinates,
    pub summary: PlanSummary,
    pub changes: Vec<Change>,
}

impl PlanDocument {
    pub fn new(generated_at: String, source_dir: String, target_coords: TargetCoordinates, changes: Vec<Change>) -> Self {
        let mut summary = PlanSummary::default();
        for change in &changes {
            match change.action {
                Action::Create => summary.create += 1,
                Action::Update => summary.update += 1,
                Action::Delete => summary.delete += 1,
                Action::Noop => summary.noop += 1,
            }
        }
        Self {
            generated_at,
            source_dir,
            target_coords,
            summary,
            changes,
        }
    }

    /// `0` if the plan has no changes, `2` if it has any, matching the
    /// CLI's `plan` exit-code convention.
    pub fn exit_code(&self) -> i32 {
        if self.summary.create + self.summary.update + self.summary.delete == 0 { 0 } else { 2 }
    }
}

pub fn write(path: &Path, plan: &PlanDocument) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(plan).map_err(|source| EngineError::PlanWrite {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
    })?;
    std::fs::write(path, json).map_err(|source| EngineError::PlanWrite {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read(path: &Path) -> Result<PlanDocument, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|source| EngineError::PlanRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| EngineError::PlanParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::Action;
    use tempfile::tempdir;

    fn coords() -> TargetCoordinates {
        TargetCoordinates {
            subscription_id: "sub".into(),
            resource_group: "rg".into(),
            service_name: "svc".into(),
        }
    }

    fn change(action: Action) -> Change {
        Change {
            action,
            key: "tag:t1".into(),
            kind: "tag".into(),
            id: "t1".into(),
            display_name: "t1".into(),
            detail: String::new(),
            old: None,
            new: None,
        }
    }

    #[test]
    fn summary_counts_each_action() {
        let plan = PlanDocument::new(
            "2026-01-01T00:00:00Z".into(),
            "src".into(),
            coords(),
            vec![change(Action::Create), change(Action::Update), change(Action::Noop)],
        );
        assert_eq!(plan.summary, PlanSummary { create: 1, update: 1, delete: 0, noop: 1 });
        assert_eq!(plan.exit_code(), 2);
    }

    #[test]
    fn no_changes_exits_zero() {
        let plan = PlanDocument::new("t".into(), "src".into(), coords(), vec![change(Action::Noop)]);
        assert_eq!(plan.exit_code(), 0);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let plan = PlanDocument::new("t".into(), "src".into(), coords(), vec![change(Action::Create)]);
        write(&path, &plan).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back.summary, plan.summary);
        assert_eq!(back.changes.len(), 1);
    }
}
