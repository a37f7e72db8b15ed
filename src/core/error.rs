use crate::utils;
use thiserror::Error;

/// Core error types for FWMFW
#[derive(Debug, Error)]
pub enum Error {
    /// Process-wide store subsystem setup failed
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// The firewall policy (or its rule collection) could not be obtained
    #[error("Rule store unavailable: {0}")]
    StoreUnavailable(String),

    /// A rule store call failed
    #[error("Error {operation}: {message}")]
    RuleStore { operation: String, message: String },

    /// Removal named a rule the store does not hold
    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    /// A rule store call failed without any usable diagnostic
    #[error("An unknown error has occurred: {0}")]
    UnknownStore(String),

    /// Text could not be converted between UTF-8 and the store's wide form
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Some rule pairs could not be changed; the rest of the run completed
    #[error("{failed} rule change(s) failed")]
    PartialFailure { failed: usize },
}

impl Error {
    pub fn rule_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleStore {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Known rule store failure patterns and their translations
pub struct StoreErrorPattern;

impl StoreErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();
        let has = |needle: &str| utils::contains(&lower, needle);

        // E_ACCESSDENIED
        if has("access is denied") || has("0x80070005") {
            return ErrorTranslation::new("Insufficient permissions to modify firewall rules")
                .with_suggestion("Run fwmfw from an elevated (Administrator) prompt")
                .with_suggestion("Check that Group Policy does not lock local firewall rules");
        }

        // RPC_S_SERVER_UNAVAILABLE / EPT_S_NOT_REGISTERED: MpsSvc is stopped
        if has("0x800706ba") || has("0x800706d9") || has("no more endpoints") {
            return ErrorTranslation::new("The Windows Firewall service is not running")
                .with_suggestion("Start it: sc start MpsSvc")
                .with_suggestion("Verify the service state: sc query MpsSvc");
        }

        // REGDB_E_CLASSNOTREG
        if has("class not registered") || has("0x80040154") {
            return ErrorTranslation::new("The firewall policy COM class is not registered")
                .with_suggestion("This Windows edition may not ship Windows Firewall with Advanced Security");
        }

        // CO_E_NOTINITIALIZED
        if has("coinitialize") || has("0x800401f0") {
            return ErrorTranslation::new("COM was not initialized on this thread")
                .with_suggestion("This is a bug; please report it with the log output (-vv)");
        }

        if has("only available on windows") {
            return ErrorTranslation::new("No firewall backend is available on this platform")
                .with_suggestion("Pass --store-file <PATH> to reconcile against a rule file")
                .with_suggestion("Or set FWMFW_RULE_STORE_FILE");
        }

        if has("json error") || has("expected value") {
            return ErrorTranslation::new("The rule file is not valid JSON")
                .with_suggestion("Restore the rule file from a backup or delete it to start empty");
        }

        // Generic fallback
        ErrorTranslation::new(format!("Firewall error: {msg}"))
            .with_suggestion("Re-run with -vv for detailed logs")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
