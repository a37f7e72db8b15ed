//! One reconciliation pass
//!
//! Given the requested executables `R` and the managed entries `E` found in
//! the store (both keyed by application path):
//!
//! - add `R − E`
//! - remove `E − R`
//! - leave `R ∩ E` alone, except entries of `R ∩ E` whose inbound rule is
//!   missing, which get it back
//!
//! Adds and repairs are applied before removes. A pair that fails is
//! recorded in the report and the pass continues with the next entry.

use crate::core::blocklist::BlockRequest;
use crate::core::error::Result;
use crate::core::policy::{FirewallPolicy, PairFailure};
use crate::core::store::RuleStore;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ChangeKind {
    #[strum(serialize = "Blocked")]
    Blocked,
    #[strum(serialize = "Unblocked")]
    Unblocked,
}

/// The diff between requested and existing entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Application path → display key of pairs to create
    pub to_add: BTreeMap<String, String>,
    /// Application path → display key of pairs to delete
    pub to_remove: BTreeMap<String, String>,
    /// Application path → display key of requested pairs missing their inbound rule
    pub to_repair: BTreeMap<String, String>,
    /// Application paths already blocked and still requested
    pub kept: BTreeSet<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_repair.is_empty()
    }

    /// Moves kept entries listed in `incomplete` to [`to_repair`](Self::to_repair)
    ///
    /// Incomplete entries that are not kept are already scheduled for removal.
    pub fn schedule_repairs(&mut self, incomplete: BTreeMap<String, String>) {
        for (application, display_key) in incomplete {
            if self.kept.remove(&application) {
                self.to_repair.insert(application, display_key);
            }
        }
    }
}

/// Outcome of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub blocked: Vec<String>,
    pub unblocked: Vec<String>,
    pub kept: usize,
    pub failures: Vec<(ChangeKind, PairFailure)>,
}

impl ReconcileReport {
    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn unblocked_count(&self) -> usize {
        self.unblocked.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Computes the diff
///
/// `existing` maps application path → display key of managed entries.
pub fn plan(mut requested: BlockRequest, existing: BTreeMap<String, String>) -> ReconcilePlan {
    let mut result = ReconcilePlan::default();

    for (application, display_key) in existing {
        if requested.remove(&application).is_some() {
            result.kept.insert(application);
        } else {
            result.to_remove.insert(application, display_key);
        }
    }
    result.to_add = requested;
    result
}

/// Enumerates the store and plans against `requested`, including repairs
///
/// # Errors
///
/// Returns `Err` if the store cannot be enumerated.
pub fn prepare<S: RuleStore>(
    policy: &FirewallPolicy<S>,
    requested: BlockRequest,
) -> Result<ReconcilePlan> {
    let existing = policy.managed_entries()?;
    let incomplete = policy.incomplete_entries(&existing)?;
    let mut result = plan(requested, existing);
    result.schedule_repairs(incomplete);
    Ok(result)
}

/// Applies a plan: adds and repairs first, then removes
///
/// `on_change` fires once per fully changed pair. A repaired pair is
/// reported as blocked.
pub fn apply<S: RuleStore>(
    policy: &mut FirewallPolicy<S>,
    plan: &ReconcilePlan,
    mut on_change: impl FnMut(ChangeKind, &str),
) -> ReconcileReport {
    let mut report = ReconcileReport {
        kept: plan.kept.len(),
        ..ReconcileReport::default()
    };

    let added = policy.add_block_rules(&plan.to_add, |application| {
        on_change(ChangeKind::Blocked, application);
        report.blocked.push(application.to_string());
    });
    report
        .failures
        .extend(added.failures.into_iter().map(|f| (ChangeKind::Blocked, f)));

    let repaired = policy.repair_block_rules(&plan.to_repair, |application| {
        on_change(ChangeKind::Blocked, application);
        report.blocked.push(application.to_string());
    });
    report
        .failures
        .extend(repaired.failures.into_iter().map(|f| (ChangeKind::Blocked, f)));

    let removed = policy.remove_block_rules(&plan.to_remove, |application| {
        on_change(ChangeKind::Unblocked, application);
        report.unblocked.push(application.to_string());
    });
    report
        .failures
        .extend(removed.failures.into_iter().map(|f| (ChangeKind::Unblocked, f)));

    info!(
        "Reconciled: {} blocked, {} unblocked, {} kept, {} failed",
        report.blocked.len(),
        report.unblocked.len(),
        report.kept,
        report.failures.len()
    );
    report
}

/// Prepares and applies a plan in one go
///
/// # Errors
///
/// Returns `Err` if the store cannot be enumerated. Failures of individual
/// pairs are reported in [`ReconcileReport::failures`] instead.
pub fn reconcile<S: RuleStore>(
    policy: &mut FirewallPolicy<S>,
    requested: BlockRequest,
    on_change: impl FnMut(ChangeKind, &str),
) -> Result<ReconcileReport> {
    let plan = prepare(policy, requested)?;
    Ok(apply(policy, &plan, on_change))
}
