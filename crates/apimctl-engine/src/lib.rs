// SPDX-License-Identifier: MIT OR Apache-2.0
//! The reconciliation engine: differ, planner, applier and extractor,
//! plus the plan document codec that lets `apply` run from a plan saved
//! by an earlier `plan` invocation.

mod applier;
mod differ;
mod error;
mod extractor;
mod plan_doc;
mod planner;

pub use applier::{ApplyOutcome, apply, apply_force};
pub use differ::{Action, Change, diff};
pub use error::EngineError;
pub use extractor::{ExtractOutcome, KindOutcome, extract};
pub use plan_doc::{PlanDocument, PlanSummary, TargetCoordinates, read as read_plan, write as write_plan};
pub use planner::{order, plan};
