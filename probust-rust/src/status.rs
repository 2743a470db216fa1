//! Accumulated status trail.
//!
//! Every stage of a batch appends entries here instead of returning early
//! with an error, so a caller can inspect the whole validation trail after
//! the fact. Downstream stages consult [`StatusLog::has_error`] before doing
//! any work.

use serde::Serialize;
use std::fmt;

/// Severity of a status entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Info => write!(f, "INFO"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// What a status entry is about. Tests and callers match on these rather
/// than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    CoefficientAcquired,
    CoefficientUndefined,
    CoefficientMalformed,
    CoefficientNotDefined,
    InvertedBounds,
    DimensionNotEvaluated,
    DimensionInconsistent,
    ScenarioCountAcquired,
    ScenarioCountUndefined,
    ScenarioCountInvalid,
    BatchCreated,
    BatchCreationFailed,
    ScenariosGenerated,
    ScenariosSolved,
    TreeBuilt,
    TreeSolved,
    QualityMeasured,
    FreshScenarioCountInvalid,
    StageFailed,
    StageSkipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEntry {
    pub severity: Severity,
    pub code: StatusCode,
    pub message: String,
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusLog {
    entries: Vec<StatusEntry>,
    #[serde(skip)]
    failed: bool,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(&mut self, code: StatusCode, message: impl Into<String>) {
        self.push(Severity::Ok, code, message.into());
    }

    pub fn info(&mut self, code: StatusCode, message: impl Into<String>) {
        self.push(Severity::Info, code, message.into());
    }

    pub fn error(&mut self, code: StatusCode, message: impl Into<String>) {
        self.push(Severity::Error, code, message.into());
    }

    fn push(&mut self, severity: Severity, code: StatusCode, message: String) {
        if severity == Severity::Error {
            self.failed = true;
            tracing::warn!(code = ?code, "{}", message);
        } else {
            tracing::debug!(code = ?code, "{}", message);
        }
        self.entries.push(StatusEntry {
            severity,
            code,
            message,
        });
    }

    /// True once any error entry has been appended. Never resets.
    pub fn has_error(&self) -> bool {
        self.failed
    }

    pub fn contains(&self, code: StatusCode) -> bool {
        self.entries.iter().any(|e| e.code == code)
    }

    pub fn contains_error(&self, code: StatusCode) -> bool {
        self.entries
            .iter()
            .any(|e| e.code == code && e.severity == Severity::Error)
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Error)
    }

    /// Appends every entry of `other`, keeping its error flag.
    pub fn extend(&mut self, other: StatusLog) {
        self.failed |= other.failed;
        self.entries.extend(other.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_flag_is_sticky() {
        let mut log = StatusLog::new();
        assert!(!log.has_error());

        log.ok(StatusCode::CoefficientAcquired, "acquired objective");
        assert!(!log.has_error());

        log.error(StatusCode::DimensionInconsistent, "Dimension inconsistency detected");
        log.ok(StatusCode::BatchCreated, "late success");
        assert!(log.has_error());
        assert_eq!(log.errors().count(), 1);
    }

    #[test]
    fn test_contains_error_checks_severity() {
        let mut log = StatusLog::new();
        log.info(StatusCode::StageSkipped, "just a note");
        assert!(log.contains(StatusCode::StageSkipped));
        assert!(!log.contains_error(StatusCode::StageSkipped));
    }

    #[test]
    fn test_extend_carries_failure() {
        let mut a = StatusLog::new();
        let mut b = StatusLog::new();
        b.error(StatusCode::ScenarioCountInvalid, "negative");
        a.extend(b);
        assert!(a.has_error());
        assert_eq!(a.entries().len(), 1);
    }

    #[test]
    fn test_entry_display() {
        let entry = StatusEntry {
            severity: Severity::Error,
            code: StatusCode::BatchCreationFailed,
            message: "Optimization batch creation failed".to_string(),
        };
        assert_eq!(entry.to_string(), "[ERROR] Optimization batch creation failed");
    }
}
