//! Rule data structures and the managed-rule naming convention
//!
//! Every logical block entry owned by FWMFW is stored as two physical rules
//! that share a display key and differ only in direction:
//!
//! - `FWMFW_IN_<display key>` (inbound)
//! - `FWMFW_OUT_<display key>` (outbound)
//!
//! The name prefix is the only thing that marks a rule as ours across runs,
//! so it is fixed and not configurable.
//!
//! # Example
//!
//! ```
//! use fwmfw::core::rule::{Direction, ManagedRule};
//!
//! let rule = ManagedRule::new(r"C:\Games\Foo\foo.exe", r"Foo\foo.exe");
//! assert_eq!(rule.rule_name(Direction::In), r"FWMFW_IN_Foo\foo.exe");
//! assert_eq!(rule.rule_name(Direction::Out), r"FWMFW_OUT_Foo\foo.exe");
//! ```

use serde::{Deserialize, Serialize};

/// Common prefix of every rule name this program creates
pub const RULE_NAME_PREFIX: &str = "FWMFW_";

/// Description attached to every created rule unless configured otherwise
pub const DEFAULT_DESCRIPTION: &str = "Blocked using FWMFW.";

/// Traffic direction of a single firewall rule
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "out")]
    Out,
}

impl Direction {
    /// Both directions, in the order pairs are created
    pub const BOTH: [Direction; 2] = [Direction::In, Direction::Out];

    /// Rule name prefix for this direction
    pub const fn name_prefix(self) -> &'static str {
        match self {
            Direction::In => "FWMFW_IN_",
            Direction::Out => "FWMFW_OUT_",
        }
    }
}

/// Rule action
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[strum(serialize = "allow")]
    Allow,
    #[default]
    #[strum(serialize = "block")]
    Block,
}

/// A rule as handed to the store for creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleSpec {
    pub name: String,
    pub application: String,
    pub direction: Direction,
    #[serde(default)]
    pub action: Action,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

/// A rule as seen through store enumeration
///
/// `direction` is `None` for rules whose direction the store reports in a
/// form this program does not model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRule {
    pub name: String,
    pub application: String,
    pub direction: Option<Direction>,
}

impl From<&RuleSpec> for StoreRule {
    fn from(spec: &RuleSpec) -> Self {
        Self {
            name: spec.name.clone(),
            application: spec.application.clone(),
            direction: Some(spec.direction),
        }
    }
}

/// One logical block entry: an application path and its display key
///
/// Both physical rule names are computed from the same display key; neither
/// is ever derived from the other's string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRule {
    pub application: String,
    pub display_key: String,
}

impl ManagedRule {
    pub fn new(application: impl Into<String>, display_key: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            display_key: display_key.into(),
        }
    }

    /// Store rule name for the given direction
    pub fn rule_name(&self, direction: Direction) -> String {
        rule_name(direction, &self.display_key)
    }

    /// Builds the blocking rule for one direction of this entry
    pub fn spec(&self, direction: Direction, description: &str) -> RuleSpec {
        RuleSpec {
            name: self.rule_name(direction),
            application: self.application.clone(),
            direction,
            action: Action::Block,
            enabled: true,
            description: description.to_string(),
        }
    }
}

/// Formats a managed rule name
pub fn rule_name(direction: Direction, display_key: &str) -> String {
    format!("{}{display_key}", direction.name_prefix())
}

/// Recovers the display key from a managed rule name
///
/// Exact inverse of [`rule_name`]. Returns `None` for names that do not
/// carry the direction's prefix.
pub fn display_key(direction: Direction, name: &str) -> Option<&str> {
    name.strip_prefix(direction.name_prefix())
}

/// Enumeration options
///
/// All set fields must match (logical AND). `name_prefix` applies to the rule
/// name and `application` to the application path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleQuery {
    pub name_prefix: Option<String>,
    pub application: Option<String>,
    pub direction: Option<Direction>,
}

impl RuleQuery {
    /// Query matching the outbound half of every managed pair
    pub fn managed() -> Self {
        Self::default()
            .with_name_prefix(Direction::Out.name_prefix())
            .with_direction(Direction::Out)
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn matches(&self, rule: &StoreRule) -> bool {
        if let Some(prefix) = &self.name_prefix
            && !crate::utils::starts_with(&rule.name, prefix)
        {
            return false;
        }
        if let Some(application) = &self.application
            && rule.application != *application
        {
            return false;
        }
        if let Some(direction) = self.direction
            && rule.direction != Some(direction)
        {
            return false;
        }
        true
    }
}
