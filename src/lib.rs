//! FWMFW - Firewall Me From Within
//!
//! Keeps a set of paired inbound/outbound blocking rules in the Windows
//! Firewall in sync with a plain-text block list of executables.
//!
//! # Architecture
//!
//! - [`core`] - Rule model, rule stores, paired operations and reconciliation
//! - [`cli`] - Command-line driver, console output and exit codes
//! - [`audit`] - Audit log of every run
//! - [`config`] - Configuration persistence
//! - [`utils`] - String, path and directory helpers
//!
//! # Ownership
//!
//! Every rule FWMFW creates carries the `FWMFW_IN_` or `FWMFW_OUT_` name
//! prefix. Rules without it are never modified or removed.

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod cli;
pub mod config;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::reconcile::{ChangeKind, ReconcileReport};
