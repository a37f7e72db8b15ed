//! Shared test utilities for core module tests
//!
//! Provides common fixtures to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::core::blocklist::BlockRequest;
use crate::core::policy::FirewallPolicy;
use crate::core::rule::{Action, Direction, RuleSpec};
use crate::core::store::MemoryRuleStore;
use std::fs;
use std::path::{MAIN_SEPARATOR, Path};
use tempfile::TempDir;

/// Joins path components with the native separator.
pub fn native(parts: &[&str]) -> String {
    parts.join(&MAIN_SEPARATOR.to_string())
}

/// Builds a request from (application path, display key) pairs.
pub fn request(entries: &[(&str, &str)]) -> BlockRequest {
    entries
        .iter()
        .map(|(app, key)| ((*app).to_string(), (*key).to_string()))
        .collect()
}

/// A rule owned by some other program, which reconciliation must not touch.
pub fn foreign_rule(name: &str, application: &str) -> RuleSpec {
    RuleSpec {
        name: name.to_string(),
        application: application.to_string(),
        direction: Direction::Out,
        action: Action::Allow,
        enabled: true,
        description: "Some other program".to_string(),
    }
}

/// A policy over an empty in-memory store.
pub fn memory_policy() -> FirewallPolicy<MemoryRuleStore> {
    FirewallPolicy::new(MemoryRuleStore::new())
}

/// Temporary install tree used by block-list tests.
///
/// ```text
/// <root>/Games/Foo/foo.exe
/// <root>/Games/Foo/notes.txt
/// <root>/Tools/Bar/bar.exe
/// <root>/Tools/Bar/sub/x.exe
/// ```
pub struct InstallTree {
    pub temp: TempDir,
}

impl InstallTree {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path();
        for dir in [
            root.join("Games").join("Foo"),
            root.join("Tools").join("Bar").join("sub"),
        ] {
            fs::create_dir_all(dir).expect("Failed to create fixture dir");
        }
        for file in [
            root.join("Games").join("Foo").join("foo.exe"),
            root.join("Games").join("Foo").join("notes.txt"),
            root.join("Tools").join("Bar").join("bar.exe"),
            root.join("Tools").join("Bar").join("sub").join("x.exe"),
        ] {
            fs::write(file, b"MZ").expect("Failed to create fixture file");
        }
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Native path string of a file or directory below the root.
    pub fn path(&self, parts: &[&str]) -> String {
        let mut all = vec![self.root().to_str().expect("temp dir is UTF-8")];
        all.extend_from_slice(parts);
        native(&all)
    }
}
