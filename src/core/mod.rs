//! Core reconciliation functionality
//!
//! This module contains the types and logic for keeping FWMFW's paired
//! firewall rules in sync with a block list. It provides:
//!
//! - [`rule`]: Rule data structures and the naming convention
//! - [`store`]: The rule store trait, backend selection and session handling
//! - [`policy`]: Paired add/remove/enumerate over a store
//! - [`blocklist`]: Block-list parsing
//! - [`reconcile`]: Diff and apply
//! - [`file_store`]: JSON rule file backend
//! - `windows_firewall`: `INetFwPolicy2` backend (Windows only)
//! - [`error`]: Error types

pub mod blocklist;
pub mod error;
pub mod file_store;
pub mod policy;
pub mod reconcile;
pub mod rule;
pub mod store;
#[cfg(windows)]
pub mod windows_firewall;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
