//! Diagnostics collected during a run
//!
//! Every pass report is flattened into [`DiagnosticMark`]s, so callers get
//! one list of problems for the whole run, each tagged with the pass that
//! found it and its source line. Pairing checks over a finished tree live in
//! [`pairing`].

pub mod pairing;

use serde::{Deserialize, Serialize};

use crate::pipeline::PassId;

/// Severity level for diagnostic marks
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// A diagnostic mark highlighting an issue at a specific location
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DiagnosticMark {
    /// Source line in the MusicXML input (0 when unknown)
    pub line: usize,
    /// Pass that reported the issue
    pub pass: PassId,
    /// Severity level
    pub severity: DiagnosticSeverity,
    /// Kind identifier (e.g., "unterminated_tie", "orphan_stop")
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Voice or measure the issue is confined to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl DiagnosticMark {
    /// Create a new diagnostic mark
    pub fn new(
        line: usize,
        pass: PassId,
        severity: DiagnosticSeverity,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            line,
            pass,
            severity,
            kind: kind.into(),
            message: message.into(),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Collection of diagnostic marks for a whole run
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Diagnostics {
    /// All diagnostic marks
    pub marks: Vec<DiagnosticMark>,
}

impl Diagnostics {
    /// Create empty diagnostics
    pub fn new() -> Self {
        Self { marks: Vec::new() }
    }

    /// Add a mark
    pub fn add(&mut self, mark: DiagnosticMark) {
        self.marks.push(mark);
    }

    /// Extend with multiple marks
    pub fn extend(&mut self, marks: impl IntoIterator<Item = DiagnosticMark>) {
        self.marks.extend(marks);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.marks
            .iter()
            .any(|m| m.severity == DiagnosticSeverity::Error)
    }

    /// Check if there are any diagnostics
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn count(&self, severity: DiagnosticSeverity) -> usize {
        self.marks.iter().filter(|m| m.severity == severity).count()
    }

    /// Marks of one kind, e.g. "unterminated_tie"
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a DiagnosticMark> + 'a {
        self.marks.iter().filter(move |m| m.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_mark_creation() {
        let mark = DiagnosticMark::new(
            12,
            PassId::Build,
            DiagnosticSeverity::Error,
            "test_error",
            "Test error message",
        )
        .with_scope("part P1 staff 1 voice 1");

        assert_eq!(mark.line, 12);
        assert_eq!(mark.pass, PassId::Build);
        assert_eq!(mark.severity, DiagnosticSeverity::Error);
        assert_eq!(mark.kind, "test_error");
        assert_eq!(mark.scope.as_deref(), Some("part P1 staff 1 voice 1"));
    }

    #[test]
    fn test_diagnostics_has_errors() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());

        diags.add(DiagnosticMark::new(
            0,
            PassId::Build,
            DiagnosticSeverity::Warning,
            "warn",
            "Warning",
        ));
        assert!(!diags.has_errors());

        diags.add(DiagnosticMark::new(
            1,
            PassId::Transform,
            DiagnosticSeverity::Error,
            "err",
            "Error",
        ));
        assert!(diags.has_errors());
        assert_eq!(diags.count(DiagnosticSeverity::Warning), 1);
        assert_eq!(diags.of_kind("err").count(), 1);
    }
}
