//! Rule store abstraction and backend selection
//!
//! A [`RuleStore`] exposes the three primitives FWMFW relies on: enumerate,
//! create and remove-by-name. Backends:
//!
//! - Windows Firewall (`INetFwPolicy2`), Windows only
//! - [`FileRuleStore`](crate::core::file_store::FileRuleStore), a JSON rule
//!   file selected with `--store-file` or `FWMFW_RULE_STORE_FILE`
//! - [`MemoryRuleStore`], in-process, with fault injection for tests
//!
//! The process-wide subsystem setup is owned by [`StoreSession`], which tears
//! down in `Drop` so every exit path releases it.

use crate::core::error::{Error, Result};
use crate::core::file_store::FileRuleStore;
use crate::core::policy::FirewallPolicy;
use crate::core::rule::{RuleSpec, StoreRule};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

/// Primitive operations of an external firewall rule store
pub trait RuleStore {
    /// Returns every rule currently in the store
    fn rules(&self) -> Result<Vec<StoreRule>>;

    /// Creates a single rule
    fn add_rule(&mut self, spec: &RuleSpec) -> Result<()>;

    /// Removes a single rule by name
    fn remove_rule(&mut self, name: &str) -> Result<()>;
}

impl<T: RuleStore + ?Sized> RuleStore for Box<T> {
    fn rules(&self) -> Result<Vec<StoreRule>> {
        (**self).rules()
    }

    fn add_rule(&mut self, spec: &RuleSpec) -> Result<()> {
        (**self).add_rule(spec)
    }

    fn remove_rule(&mut self, name: &str) -> Result<()> {
        (**self).remove_rule(name)
    }
}

/// In-process rule store
///
/// Names registered with [`fail_add`](Self::fail_add) or
/// [`fail_remove`](Self::fail_remove) make the corresponding call fail
/// without touching the stored rules.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: Vec<RuleSpec>,
    failing_adds: HashSet<String>,
    failing_removes: HashSet<String>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing rules (e.g. rules owned by other programs)
    pub fn with_rules(rules: impl IntoIterator<Item = RuleSpec>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn fail_add(&mut self, name: impl Into<String>) {
        self.failing_adds.insert(name.into());
    }

    pub fn fail_remove(&mut self, name: impl Into<String>) {
        self.failing_removes.insert(name.into());
    }

    pub fn specs(&self) -> &[RuleSpec] {
        &self.rules
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl RuleStore for MemoryRuleStore {
    fn rules(&self) -> Result<Vec<StoreRule>> {
        Ok(self.rules.iter().map(StoreRule::from).collect())
    }

    fn add_rule(&mut self, spec: &RuleSpec) -> Result<()> {
        if self.failing_adds.contains(&spec.name) {
            return Err(Error::rule_store(
                format!("adding rule {}", spec.name),
                "injected failure",
            ));
        }
        if self.contains(&spec.name) {
            return Err(Error::rule_store(
                format!("adding rule {}", spec.name),
                "a rule with this name already exists",
            ));
        }
        self.rules.push(spec.clone());
        Ok(())
    }

    fn remove_rule(&mut self, name: &str) -> Result<()> {
        if self.failing_removes.contains(name) {
            return Err(Error::rule_store(
                format!("removing rule {name}"),
                "injected failure",
            ));
        }
        let before = self.rules.len();
        self.rules.retain(|r| r.name != name);
        if self.rules.len() == before {
            return Err(Error::RuleNotFound(name.to_string()));
        }
        Ok(())
    }
}

/// Which store a run reconciles against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// The host's Windows Firewall policy
    WindowsFirewall,
    /// A JSON rule file
    File(PathBuf),
}

impl Backend {
    /// Picks the rule file when one is given, the host firewall otherwise
    pub fn select(store_file: Option<PathBuf>) -> Self {
        match store_file {
            Some(path) => Backend::File(path),
            None => Backend::WindowsFirewall,
        }
    }
}

/// Process-wide store subsystem setup, torn down on drop
///
/// Must outlive every store object created under it.
#[derive(Debug)]
pub struct StoreSession {
    #[cfg_attr(not(windows), allow(dead_code))]
    com_initialized: bool,
}

impl StoreSession {
    /// Performs the subsystem setup the backend needs
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] when setup fails or the backend does
    /// not exist on this platform.
    pub fn initialize(backend: &Backend) -> Result<Self> {
        match backend {
            Backend::File(_) => Ok(Self {
                com_initialized: false,
            }),
            #[cfg(windows)]
            Backend::WindowsFirewall => {
                crate::core::windows_firewall::com_initialize()?;
                tracing::debug!("COM initialized");
                Ok(Self {
                    com_initialized: true,
                })
            }
            #[cfg(not(windows))]
            Backend::WindowsFirewall => Err(Error::Initialization(
                "Windows Firewall is only available on Windows".to_string(),
            )),
        }
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        #[cfg(windows)]
        if self.com_initialized {
            crate::core::windows_firewall::com_uninitialize();
            tracing::debug!("COM uninitialized");
        }
    }
}

/// An opened store together with the session it lives in
///
/// Field order matters: the policy (and every handle it owns) is dropped
/// before the session is torn down.
pub struct OpenStore {
    pub policy: FirewallPolicy<Box<dyn RuleStore>>,
    _session: StoreSession,
}

impl OpenStore {
    /// Initializes the backend's subsystem and acquires the policy handle
    ///
    /// # Errors
    ///
    /// - [`Error::Initialization`] if subsystem setup fails
    /// - [`Error::StoreUnavailable`] if the policy cannot be obtained
    pub fn open(backend: &Backend) -> Result<Self> {
        let session = StoreSession::initialize(backend)?;
        let store: Box<dyn RuleStore> = match backend {
            Backend::File(path) => Box::new(FileRuleStore::open(path)?),
            #[cfg(windows)]
            Backend::WindowsFirewall => {
                Box::new(crate::core::windows_firewall::WindowsFirewallStore::open()?)
            }
            #[cfg(not(windows))]
            Backend::WindowsFirewall => {
                return Err(Error::StoreUnavailable(
                    "Windows Firewall is only available on Windows".to_string(),
                ));
            }
        };
        info!("Opened rule store: {:?}", backend);

        Ok(Self {
            policy: FirewallPolicy::new(store),
            _session: session,
        })
    }
}
