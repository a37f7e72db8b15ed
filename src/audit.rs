/// Audit logging for rule store changes
///
/// Every run appends one JSON line describing what it did to the store.
use crate::core::reconcile::ReconcileReport;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

/// Types of auditable events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Reconcile,
    DryRun,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Type of event
    pub event_type: EventType,

    /// Whether the operation succeeded
    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    /// Creates a new audit event
    pub fn new(
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Creates an audit log in the state directory
    ///
    /// # Errors
    ///
    /// Returns `Err` if the state directory cannot be determined or created
    pub fn new() -> std::io::Result<Self> {
        let mut log_path = crate::utils::get_state_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        crate::utils::ensure_dirs()?;
        log_path.push("audit.log");

        Ok(Self { log_path })
    }

    /// Creates an audit log at an explicit path
    pub fn at(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    /// Appends an event as one JSON line
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub fn log(&self, event: &AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(event)?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        Ok(())
    }

    /// Reads the most recent events from the log, newest first
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    pub fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = std::fs::read_to_string(&self.log_path)?;

        Ok(content
            .lines()
            .rev()
            .take(count)
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

/// Builds the event for a completed reconciliation
pub fn reconcile_event(list_file: &str, report: &ReconcileReport) -> AuditEvent {
    let failed: Vec<&str> = report
        .failures
        .iter()
        .map(|(_, f)| f.application.as_str())
        .collect();

    AuditEvent::new(
        EventType::Reconcile,
        report.is_complete(),
        serde_json::json!({
            "list_file": list_file,
            "blocked": report.blocked,
            "unblocked": report.unblocked,
            "kept": report.kept,
            "failed": failed,
        }),
        (!report.is_complete()).then(|| format!("{} rule change(s) failed", failed.len())),
    )
}

/// Builds the event for a dry run
pub fn dry_run_event(list_file: &str, to_add: usize, to_remove: usize) -> AuditEvent {
    AuditEvent::new(
        EventType::DryRun,
        true,
        serde_json::json!({
            "list_file": list_file,
            "to_add": to_add,
            "to_remove": to_remove,
        }),
        None,
    )
}

/// Appends `event` to the default audit log, warning on failure
pub fn record(event: &AuditEvent) {
    match AuditLog::new() {
        Ok(audit) => {
            if let Err(e) = audit.log(event) {
                tracing::warn!("Failed to write audit log {:?}: {}", audit.path(), e);
            }
        }
        Err(e) => tracing::warn!("Audit log unavailable: {}", e),
    }
}
