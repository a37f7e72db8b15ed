//! Command-line driver
//!
//! Argument definitions, the run itself and the mapping from its result to
//! console output and process exit codes. `main` only wires these to the
//! real stdout/stderr and calls `std::process::exit`.

use crate::audit;
use crate::config::AppConfig;
use crate::core::blocklist::read_block_list;
use crate::core::error::{Error, Result, StoreErrorPattern};
use crate::core::policy::{PairFailure, PairOutcome};
use crate::core::reconcile::{self, ChangeKind, ReconcilePlan, ReconcileReport};
use crate::core::store::{Backend, OpenStore};
use clap::Parser;
use clap::error::ErrorKind;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = -1;
pub const EXIT_MISSING_ARGUMENT: i32 = -2;

/// Printed on stderr when the block-list argument is missing
pub const MISSING_ARGUMENT_USAGE: &str = "\
Error: missing argument.
Usage: fwmfw <LIST_FILE> [--dry-run] [--store-file PATH]
  LIST_FILE  text file with one executable or directory per line
";

#[derive(Debug, Parser)]
#[command(name = "fwmfw", version)]
#[command(about = "Firewall Me From Within - block executables with paired firewall rules", long_about = None)]
pub struct Cli {
    /// Block list: one executable or directory per line, `#` starts a comment
    pub list_file: PathBuf,

    /// Print the changes without touching the rule store
    #[arg(long)]
    pub dry_run: bool,

    /// Reconcile a JSON rule file instead of the Windows Firewall
    #[arg(long, value_name = "PATH", env = "FWMFW_RULE_STORE_FILE")]
    pub store_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Exit code for an argument error this program handles itself
///
/// `None` means clap should report the error (or help/version) and exit.
pub fn usage_exit_code(e: &clap::Error) -> Option<i32> {
    (e.kind() == ErrorKind::MissingRequiredArgument).then_some(EXIT_MISSING_ARGUMENT)
}

pub fn change_line(kind: ChangeKind, application: &str) -> String {
    format!("{kind}: \"{application}\"")
}

pub fn summary_line(report: &ReconcileReport) -> String {
    format!(
        "Done. Blocked {} files. Unblocked {} files.",
        report.blocked_count(),
        report.unblocked_count()
    )
}

pub fn failure_line(kind: ChangeKind, failure: &PairFailure) -> Option<String> {
    match &failure.outcome {
        PairOutcome::Applied => None,
        PairOutcome::Failed { reason } => {
            Some(format!("Not {kind}: \"{}\": {reason}", failure.application))
        }
        PairOutcome::FailedOrphaned { reason, orphan } => Some(format!(
            "Not {kind}: \"{}\": {reason} (rule {orphan} left behind)",
            failure.application
        )),
    }
}

pub fn dry_run_lines(plan: &ReconcilePlan) -> Vec<String> {
    let mut lines: Vec<String> = plan
        .to_add
        .keys()
        .chain(plan.to_repair.keys())
        .map(|application| format!("Would block: \"{application}\""))
        .collect();
    lines.extend(
        plan.to_remove
            .keys()
            .map(|application| format!("Would unblock: \"{application}\"")),
    );
    lines.push(format!(
        "Dry run. Would block {} files. Would unblock {} files.",
        plan.to_add.len() + plan.to_repair.len(),
        plan.to_remove.len()
    ));
    lines
}

/// Runs one reconciliation (or dry run) of `cli.list_file`
///
/// Per-change lines and the summary go to `out`, pair failures to `err`.
///
/// # Errors
///
/// Returns `Err` if the store or block list cannot be opened, or
/// [`Error::PartialFailure`] if any pair could not be changed.
pub fn run(cli: &Cli, config: &AppConfig, out: &mut impl Write, err: &mut impl Write) -> Result<()> {
    let list_name = cli.list_file.display().to_string();

    let mut store = OpenStore::open(&Backend::select(cli.store_file.clone()))?;
    store.policy.set_description(config.description.clone());

    let requested = read_block_list(&cli.list_file, &config.extension)?;

    if cli.dry_run {
        let plan = reconcile::prepare(&store.policy, requested)?;
        for line in dry_run_lines(&plan) {
            writeln!(out, "{line}")?;
        }
        if config.audit_log {
            audit::record(&audit::dry_run_event(
                &list_name,
                plan.to_add.len() + plan.to_repair.len(),
                plan.to_remove.len(),
            ));
        }
        return Ok(());
    }

    let mut write_error = None;
    let report = reconcile::reconcile(&mut store.policy, requested, |kind, application| {
        if let Err(e) = writeln!(out, "{}", change_line(kind, application)) {
            write_error.get_or_insert(e);
        }
    })?;
    if let Some(e) = write_error {
        return Err(e.into());
    }

    for (kind, failure) in &report.failures {
        if let Some(line) = failure_line(*kind, failure) {
            writeln!(err, "{line}")?;
        }
    }
    writeln!(out, "{}", summary_line(&report))?;
    info!("Reconciliation of {list_name} finished");

    if config.audit_log {
        audit::record(&audit::reconcile_event(&list_name, &report));
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(Error::PartialFailure {
            failed: report.failures.len(),
        })
    }
}

/// Reports the outcome of [`run`] on `err` and returns the exit code
pub fn finish(result: Result<()>, err: &mut impl Write) -> i32 {
    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            debug!("Run failed: {e:?}");
            let _ = report_error(&e, err);
            EXIT_FAILURE
        }
    }
}

fn report_error(e: &Error, err: &mut impl Write) -> std::io::Result<()> {
    writeln!(err, "An error has occurred: {e}")?;
    let translation = StoreErrorPattern::match_error(&e.to_string());
    writeln!(err, "{}", translation.user_message)?;
    for suggestion in &translation.suggestions {
        writeln!(err, "  - {suggestion}")?;
    }
    Ok(())
}
