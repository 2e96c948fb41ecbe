// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshots the live control plane into the tree format. Extraction is
//! never atomic: each kind is read and written independently, and one
//! kind's failure never stops the others.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use apimctl_core::State;
use apimctl_kinds::registry;
use apimctl_state::StateBackend;
use apimctl_transport::{ApimClient, TransportError};

/// Per-kind result of one `extract` run.
pub struct KindOutcome {
    pub kind: &'static str,
    pub count: usize,
    /// Present when this kind's `read_live` failed; the label distinguishes
    /// a retryable fault from one that needs a fix before it's worth
    /// rerunning.
    pub error: Option<String>,
}

pub struct ExtractOutcome {
    pub kinds: Vec<KindOutcome>,
}

impl ExtractOutcome {
    pub fn had_errors(&self) -> bool {
        self.kinds.iter().any(|k| k.error.is_some())
    }
}

fn error_hint(err: &apimctl_kinds::KindError) -> String {
    let transient = matches!(err, apimctl_kinds::KindError::Transport(e) if e.is_transient());
    let hint = if transient { "may work on next run" } else { "fix and re-run" };
    format!("{err} ({hint})")
}

/// Reads every kind (optionally restricted to `only`) from `client` and
/// writes it to `output_dir`. When `update_state` is set, `state.artifacts`
/// is wholly replaced by the extracted set and `state.last_applied` is
/// stamped, then written through `store`.
pub async fn extract(
    client: &ApimClient,
    output_dir: &Path,
    only: Option<&[String]>,
    update_state: bool,
    store: Option<&Arc<dyn StateBackend>>,
    state: Option<&mut State>,
) -> Result<ExtractOutcome, std::io::Error> {
    let mut kinds_out = Vec::new();
    let mut all_artifacts: BTreeMap<String, apimctl_core::Artifact> = BTreeMap::new();

    for kind in registry() {
        if let Some(only) = only {
            if !only.iter().any(|k| k == kind.name()) {
                continue;
            }
        }
        match kind.read_live(client).await {
            Ok(artifacts) => {
                if let Err(e) = kind.write_local(output_dir, &artifacts) {
                    warn!(kind = kind.name(), error = %e, "failed to write extracted artifacts");
                    kinds_out.push(KindOutcome {
                        kind: kind.name(),
                        count: 0,
                        error: Some(error_hint(&e)),
                    });
                    continue;
                }
                for artifact in &artifacts {
                    all_artifacts.insert(artifact.key.clone(), artifact.clone());
                }
                kinds_out.push(KindOutcome {
                    kind: kind.name(),
                    count: artifacts.len(),
                    error: None,
                });
            }
            Err(e) => {
                warn!(kind = kind.name(), error = %e, "extraction of one kind failed, continuing");
                kinds_out.push(KindOutcome {
                    kind: kind.name(),
                    count: 0,
                    error: Some(error_hint(&e)),
                });
            }
        }
    }

    if update_state {
        if let (Some(store), Some(state)) = (store, state) {
            state.artifacts = all_artifacts;
            state.last_applied = Some(Utc::now().to_rfc3339());
            let _ = store.write(state).await;
        }
    }

    Ok(ExtractOutcome { kinds: kinds_out })
}

/// Whether a transport-layer failure is worth retrying without operator
/// intervention; re-exported here so the extractor's label logic matches
/// the same taxonomy the applier consults.
pub fn is_transient(err: &TransportError) -> bool {
    err.is_transient()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_had_errors_reflects_any_failed_kind() {
        let outcome = ExtractOutcome {
            kinds: vec![
                KindOutcome { kind: "tag", count: 2, error: None },
                KindOutcome { kind: "backend", count: 0, error: Some("boom (fix and re-run)".into()) },
            ],
        };
        assert!(outcome.had_errors());
    }

    #[test]
    fn outcome_clean_when_no_kind_failed() {
        let outcome = ExtractOutcome {
            kinds: vec![KindOutcome { kind: "tag", count: 2, error: None }],
        };
        assert!(!outcome.had_errors());
    }
}
