//! JSON rule file standing in for the host firewall
//!
//! Selected with `--store-file <PATH>` or `FWMFW_RULE_STORE_FILE`. Every
//! mutation is persisted immediately, like a real store, using an atomic
//! write (temp file in the same directory, then rename).
//!
//! # Format
//!
//! ```json
//! {
//!   "rules": [
//!     { "name": "FWMFW_IN_Foo\\foo.exe", "application": "C:\\Foo\\foo.exe",
//!       "direction": "in", "action": "block", "enabled": true,
//!       "description": "Blocked using FWMFW." }
//!   ]
//! }
//! ```

use crate::core::error::{Error, Result};
use crate::core::rule::{RuleSpec, StoreRule};
use crate::core::store::RuleStore;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

/// Rule store persisted as a JSON document
#[derive(Debug)]
pub struct FileRuleStore {
    path: PathBuf,
    rules: Vec<RuleSpec>,
}

impl FileRuleStore {
    /// Loads the rule file; a missing file is an empty store
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the file exists but cannot be
    /// read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rules = match std::fs::read_to_string(&path) {
            Ok(json) => {
                let file: RuleFile = serde_json::from_str(&json).map_err(|e| {
                    Error::StoreUnavailable(format!("{}: JSON error: {e}", path.display()))
                })?;
                file.rules
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Rule file {:?} does not exist yet, starting empty", path);
                Vec::new()
            }
            Err(e) => {
                return Err(Error::StoreUnavailable(format!(
                    "{}: {e}",
                    path.display()
                )));
            }
        };

        Ok(Self { path, rules })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn specs(&self) -> &[RuleSpec] {
        &self.rules
    }

    fn persist(&self) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let json = serde_json::to_string_pretty(&RuleFile {
            rules: self.rules.clone(),
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl RuleStore for FileRuleStore {
    fn rules(&self) -> Result<Vec<StoreRule>> {
        Ok(self.rules.iter().map(StoreRule::from).collect())
    }

    fn add_rule(&mut self, spec: &RuleSpec) -> Result<()> {
        let operation = format!("adding rule {}", spec.name);
        if self.rules.iter().any(|r| r.name == spec.name) {
            return Err(Error::rule_store(
                operation,
                "a rule with this name already exists",
            ));
        }

        self.rules.push(spec.clone());
        if let Err(e) = self.persist() {
            self.rules.pop();
            error!("Failed to write rule file {:?}: {e}", self.path);
            return Err(Error::rule_store(operation, e.to_string()));
        }
        Ok(())
    }

    fn remove_rule(&mut self, name: &str) -> Result<()> {
        let operation = format!("removing rule {name}");
        let Some(index) = self.rules.iter().position(|r| r.name == name) else {
            return Err(Error::RuleNotFound(name.to_string()));
        };

        let removed = self.rules.remove(index);
        if let Err(e) = self.persist() {
            self.rules.insert(index, removed);
            error!("Failed to write rule file {:?}: {e}", self.path);
            return Err(Error::rule_store(operation, e.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rule::{Direction, ManagedRule};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileRuleStore::open(dir.path().join("rules.json")).unwrap();

        assert!(store.rules().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_mutations_are_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        let entry = ManagedRule::new("/apps/Foo/foo.exe", "Foo/foo.exe");

        let mut store = FileRuleStore::open(&path).unwrap();
        store.add_rule(&entry.spec(Direction::In, "d")).unwrap();
        store.add_rule(&entry.spec(Direction::Out, "d")).unwrap();

        let reopened = FileRuleStore::open(&path).unwrap();
        assert_eq!(reopened.specs().len(), 2);
        assert_eq!(reopened.specs()[1].name, "FWMFW_OUT_Foo/foo.exe");

        let mut reopened = reopened;
        reopened.remove_rule("FWMFW_IN_Foo/foo.exe").unwrap();
        let again = FileRuleStore::open(&path).unwrap();
        assert_eq!(again.specs().len(), 1);
    }

    #[test]
    fn test_duplicate_and_missing_names_fail() {
        let dir = TempDir::new().unwrap();
        let mut store = FileRuleStore::open(dir.path().join("rules.json")).unwrap();
        let spec = ManagedRule::new("/a.exe", "a.exe").spec(Direction::In, "d");

        store.add_rule(&spec).unwrap();
        assert!(store.add_rule(&spec).is_err());
        assert!(matches!(
            store.remove_rule("FWMFW_OUT_a.exe"),
            Err(Error::RuleNotFound(_))
        ));
        assert_eq!(store.specs().len(), 1);
    }

    #[test]
    fn test_invalid_json_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileRuleStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }

    #[test]
    fn test_accepts_hand_written_rules_without_optional_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"rules":[{"name":"Other app","application":"/other","direction":"out","action":"allow"}]}"#,
        )
        .unwrap();

        let store = FileRuleStore::open(&path).unwrap();
        let rules = store.rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].direction, Some(Direction::Out));
    }
}
