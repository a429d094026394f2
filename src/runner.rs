//! Run orchestration - drives the [`PatchEngine`] over a [`RunPlan`].
//!
//! Fixes run strictly one at a time in plan order. What happens after a
//! failure is an explicit [`FailurePolicy`]:
//! - `FailFast` (default) stops at the first failed fix and records every
//!   remaining target as skipped
//! - `ContinueOnError` attempts every fix regardless

use crate::engine::{PatchEngine, PatchResult};
use crate::plan::RunPlan;
use std::fmt;
use std::path::PathBuf;

/// What the runner does after a fix fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    FailFast,
    ContinueOnError,
}

/// Aggregate outcome of a run.
#[derive(Debug, Default)]
#[must_use = "Summary should be checked for failures"]
pub struct Summary {
    /// One result per attempted fix, in plan order
    pub results: Vec<PatchResult>,
    /// Targets never attempted because the run stopped early
    pub skipped: Vec<PathBuf>,
}

impl Summary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded).count()
    }

    /// Successful fixes whose content actually changed.
    pub fn changed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.succeeded && r.changed)
            .count()
    }

    /// True when every planned fix ran and succeeded.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped.is_empty()
    }

    pub fn first_failure(&self) -> Option<&PatchResult> {
        self.results.iter().find(|r| !r.succeeded)
    }

    /// Fold another run's results into this one.
    pub fn merge(&mut self, other: Summary) {
        self.results.extend(other.results);
        self.skipped.extend(other.skipped);
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fixed, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped.len()
        )
    }
}

/// Applies every fix in a plan through one engine.
#[derive(Debug, Clone)]
pub struct Runner {
    engine: PatchEngine,
    policy: FailurePolicy,
}

impl Runner {
    pub fn new(engine: PatchEngine) -> Self {
        Self {
            engine,
            policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn engine(&self) -> &PatchEngine {
        &self.engine
    }

    pub fn run(&self, plan: &RunPlan) -> Summary {
        self.run_with(plan, |_| {})
    }

    /// Run `plan`, handing each result to `observer` as soon as it exists.
    pub fn run_with<F>(&self, plan: &RunPlan, mut observer: F) -> Summary
    where
        F: FnMut(&PatchResult),
    {
        log::debug!(
            "running plan '{}': {} fix(es), {} rule(s), policy {:?}",
            plan.name(),
            plan.len(),
            plan.rule_count(),
            self.policy
        );

        let mut summary = Summary::default();
        let mut fixes = plan.iter();

        for fix in fixes.by_ref() {
            let result = self.engine.apply_fix(fix);
            observer(&result);
            let failed = !result.succeeded;
            summary.results.push(result);

            if failed && self.policy == FailurePolicy::FailFast {
                break;
            }
        }

        summary.skipped = fixes.map(|fix| fix.target().to_path_buf()).collect();
        if !summary.skipped.is_empty() {
            log::warn!(
                "plan '{}' stopped early; {} fix(es) not attempted",
                plan.name(),
                summary.skipped.len()
            );
        }

        summary
    }
}
