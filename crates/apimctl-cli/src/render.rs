// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plain-text plan rendering. No color crate is carried here, in keeping
//! with the rest of the dependency stack: a plus/minus/tilde prefix per
//! line, the same approach every `terraform plan`-alike uses before it
//! reaches for a terminal-color library.

use apimctl_engine::{Action, PlanDocument};

pub fn render_plan(plan: &PlanDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "apimctl plan for {}/{}/{}\n",
        plan.target_coords.subscription_id, plan.target_coords.resource_group, plan.target_coords.service_name
    ));
    out.push_str(&format!("source: {}\n\n", plan.source_dir));

    for change in &plan.changes {
        if change.action == Action::Noop {
            continue;
        }
        let symbol = match change.action {
            Action::Create => '+',
            Action::Update => '~',
            Action::Delete => '-',
            Action::Noop => ' ',
        };
        let mut line = format!("  {symbol} {} ({})", change.key, change.display_name);
        if !change.detail.is_empty() {
            line.push_str(&format!(": {}", change.detail));
        }
        out.push_str(&line);
        out.push('\n');
    }

    out.push('\n');
    out.push_str(&format!(
        "Plan: {} to create, {} to update, {} to delete, {} unchanged.\n",
        plan.summary.create, plan.summary.update, plan.summary.delete, plan.summary.noop
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use apimctl_engine::{Change, PlanSummary, TargetCoordinates};

    fn coords() -> TargetCoordinates {
        TargetCoordinates {
            subscription_id: "sub".into(),
            resource_group: "rg".into(),
            service_name: "svc".into(),
        }
    }

    #[test]
    fn renders_one_line_per_non_noop_change() {
        let plan = PlanDocument {
            generated_at: "t".into(),
            source_dir: "src".into(),
            target_coords: coords(),
            summary: PlanSummary { create: 1, update: 0, delete: 0, noop: 1 },
            changes: vec![
                Change {
                    action: Action::Create,
                    key: "tag:t1".into(),
                    kind: "tag".into(),
                    id: "t1".into(),
                    display_name: "t1".into(),
                    detail: String::new(),
                    old: None,
                    new: None,
                },
                Change {
                    action: Action::Noop,
                    key: "tag:t2".into(),
                    kind: "tag".into(),
                    id: "t2".into(),
                    display_name: "t2".into(),
                    detail: String::new(),
                    old: None,
                    new: None,
                },
            ],
        };
        let rendered = render_plan(&plan);
        assert!(rendered.contains("+ tag:t1"));
        assert!(!rendered.contains("tag:t2"));
        assert!(rendered.contains("Plan: 1 to create, 0 to update, 0 to delete, 1 unchanged."));
    }
}
