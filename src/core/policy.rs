//! Paired-rule operations over a [`RuleStore`]
//!
//! [`FirewallPolicy`] hides the IN/OUT pairing behind per-entry operations:
//!
//! - [`enumerate`](FirewallPolicy::enumerate): application path → rule name
//! - [`add_paired`](FirewallPolicy::add_paired): create both directions, with a
//!   compensating delete when only the first one lands
//! - [`remove_paired`](FirewallPolicy::remove_paired): remove both directions
//! - [`repair_paired`](FirewallPolicy::repair_paired): restore a missing
//!   inbound half
//!
//! A pair only counts as changed when both directions succeeded.

use crate::core::error::{Error, Result};
use crate::core::rule::{self, DEFAULT_DESCRIPTION, Direction, ManagedRule, RuleQuery};
use crate::core::store::RuleStore;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, info, warn};

/// Result of a paired add or remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// Both directions changed
    Applied,
    /// The pair was not changed; the store holds no half-pair from this call
    Failed { reason: String },
    /// The pair was not changed and a single direction is left behind
    FailedOrphaned { reason: String, orphan: String },
}

impl PairOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PairOutcome::Applied)
    }
}

/// A pair that could not be changed during a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairFailure {
    pub application: String,
    pub outcome: PairOutcome,
}

/// Counts and failures of a batch of paired operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub changed: usize,
    pub failures: Vec<PairFailure>,
}

/// Owns a rule store and manages FWMFW's paired rules in it
pub struct FirewallPolicy<S: RuleStore> {
    store: S,
    description: String,
}

impl<S: RuleStore> FirewallPolicy<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }

    /// Description attached to created rules
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Lists rules matching `query` as application path → rule name
    ///
    /// Rules with an empty name or application path are skipped. When several
    /// rules share an application path, the last one enumerated wins.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the store cannot be enumerated.
    pub fn enumerate(&self, query: &RuleQuery) -> Result<BTreeMap<String, String>> {
        let rules = self.store.rules().inspect_err(|e| {
            debug!("Failed to enumerate rules: {e}");
        })?;

        let mut result = BTreeMap::new();
        for rule in rules {
            if rule.name.is_empty() || rule.application.is_empty() {
                continue;
            }
            if query.matches(&rule) {
                result.insert(rule.application, rule.name);
            }
        }
        debug!("Enumerated {} matching rule(s)", result.len());
        Ok(result)
    }

    /// Lists managed entries as application path → display key
    ///
    /// # Errors
    ///
    /// Returns `Err` if the store cannot be enumerated.
    pub fn managed_entries(&self) -> Result<BTreeMap<String, String>> {
        let rules = self.enumerate(&RuleQuery::managed())?;
        Ok(rules
            .into_iter()
            .filter_map(|(application, name)| {
                rule::display_key(Direction::Out, &name)
                    .map(|key| (application, key.to_string()))
            })
            .collect())
    }

    /// Managed entries whose inbound rule is missing
    ///
    /// Takes the output of [`managed_entries`](Self::managed_entries) and
    /// returns the subset (application path → display key) for which the
    /// store holds no `FWMFW_IN_<display key>` rule.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the store cannot be enumerated.
    pub fn incomplete_entries(
        &self,
        entries: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let query = RuleQuery::default().with_name_prefix(Direction::In.name_prefix());
        let inbound: HashSet<String> = self
            .store
            .rules()?
            .into_iter()
            .filter(|r| query.matches(r))
            .map(|r| r.name)
            .collect();

        let missing: BTreeMap<String, String> = entries
            .iter()
            .filter(|(_, key)| !inbound.contains(&rule::rule_name(Direction::In, key)))
            .map(|(application, key)| (application.clone(), key.clone()))
            .collect();
        if !missing.is_empty() {
            warn!("{} managed entries lack an inbound rule", missing.len());
        }
        Ok(missing)
    }

    /// Recreates the inbound rule of an entry whose outbound rule exists
    pub fn repair_paired(&mut self, application: &str, display_key: &str) -> PairOutcome {
        let spec = ManagedRule::new(application, display_key).spec(Direction::In, &self.description);
        match self.store.add_rule(&spec) {
            Ok(()) => {
                info!("Restored {} for {application}", spec.name);
                PairOutcome::Applied
            }
            Err(e) => {
                warn!("Failed to restore {}: {e}", spec.name);
                PairOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Creates the inbound and outbound blocking rules for one application
    ///
    /// If the outbound rule fails after the inbound one was created, the
    /// inbound rule is removed again before reporting the failure.
    pub fn add_paired(&mut self, application: &str, display_key: &str) -> PairOutcome {
        let entry = ManagedRule::new(application, display_key);
        let mut added: Vec<String> = Vec::with_capacity(2);

        for direction in Direction::BOTH {
            let spec = entry.spec(direction, &self.description);
            if let Err(e) = self.store.add_rule(&spec) {
                warn!("Failed to add {} rule for {application}: {e}", direction);
                return self.compensate_add(&added, e.to_string());
            }
            added.push(spec.name);
        }

        info!("Added rule pair for {application}");
        PairOutcome::Applied
    }

    fn compensate_add(&mut self, added: &[String], reason: String) -> PairOutcome {
        for name in added {
            if let Err(e) = self.store.remove_rule(name) {
                error!("Compensating delete of {name} failed: {e}");
                return PairOutcome::FailedOrphaned {
                    reason,
                    orphan: name.clone(),
                };
            }
            debug!("Rolled back {name}");
        }
        PairOutcome::Failed { reason }
    }

    /// Removes the inbound and outbound rules for one application
    ///
    /// Both names are computed from `display_key`. Both removals are always
    /// attempted. A direction the store no longer holds counts as removed,
    /// so the pair is removed once neither rule is left.
    pub fn remove_paired(&mut self, application: &str, display_key: &str) -> PairOutcome {
        let entry = ManagedRule::new(application, display_key);
        let mut failed: Vec<(String, String)> = Vec::new();

        for direction in Direction::BOTH {
            let name = entry.rule_name(direction);
            match self.store.remove_rule(&name) {
                Ok(()) => {}
                Err(Error::RuleNotFound(_)) => debug!("{name} was already absent"),
                Err(e) => {
                    warn!("Failed to remove {name}: {e}");
                    failed.push((name, e.to_string()));
                }
            }
        }

        match failed.as_slice() {
            [] => {
                info!("Removed rule pair for {application}");
                PairOutcome::Applied
            }
            // The other direction is gone, so the one still present is an orphan
            [(name, reason)] => PairOutcome::FailedOrphaned {
                reason: reason.clone(),
                orphan: name.clone(),
            },
            _ => PairOutcome::Failed {
                reason: failed
                    .iter()
                    .map(|(_, reason)| reason.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            },
        }
    }

    /// Adds a pair for every entry (application path → display key)
    ///
    /// `on_added` is called with the application path of each fully added pair.
    pub fn add_block_rules(
        &mut self,
        entries: &BTreeMap<String, String>,
        mut on_added: impl FnMut(&str),
    ) -> BatchResult {
        let mut result = BatchResult::default();
        for (application, display_key) in entries {
            let outcome = self.add_paired(application, display_key);
            record(&mut result, application, outcome, &mut on_added);
        }
        result
    }

    /// Restores the missing inbound rule of every entry (application path → display key)
    ///
    /// `on_repaired` is called with the application path of each completed pair.
    pub fn repair_block_rules(
        &mut self,
        entries: &BTreeMap<String, String>,
        mut on_repaired: impl FnMut(&str),
    ) -> BatchResult {
        let mut result = BatchResult::default();
        for (application, display_key) in entries {
            let outcome = self.repair_paired(application, display_key);
            record(&mut result, application, outcome, &mut on_repaired);
        }
        result
    }

    /// Removes the pair of every entry (application path → display key)
    ///
    /// `on_removed` is called with the application path of each fully removed pair.
    pub fn remove_block_rules(
        &mut self,
        entries: &BTreeMap<String, String>,
        mut on_removed: impl FnMut(&str),
    ) -> BatchResult {
        let mut result = BatchResult::default();
        for (application, display_key) in entries {
            let outcome = self.remove_paired(application, display_key);
            record(&mut result, application, outcome, &mut on_removed);
        }
        result
    }
}

fn record(
    result: &mut BatchResult,
    application: &str,
    outcome: PairOutcome,
    callback: &mut impl FnMut(&str),
) {
    if outcome.is_applied() {
        result.changed += 1;
        callback(application);
    } else {
        result.failures.push(PairFailure {
            application: application.to_string(),
            outcome,
        });
    }
}
