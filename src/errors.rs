//! Error types for a conversion run
//!
//! - [`ConfigurationError`]: the run configuration is contradictory; rejected
//!   before any pass runs
//! - [`ParseError`]: the input could not be read as a MusicXML tree at all
//! - [`SemanticError`]: the score contradicts itself inside one voice or
//!   measure; fails the pass that found it
//! - [`StructuralWarning`]: something was repaired or dropped; never fails a pass
//! - [`InternalFault`]: a converter met a node combination the tree
//!   invariants forbid, meaning an earlier pass has a bug
//!
//! Passes collect semantic errors, warnings and faults into a [`PassReport`].

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::diagnostics::{DiagnosticMark, DiagnosticSeverity};
use crate::models::WholeNotes;
use crate::pipeline::PassId;

/// Invalid run configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Configuration is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("The pass list is empty")]
    EmptyPassList,

    #[error("Unknown pass number: {0} (passes are numbered 1 to 4)")]
    UnknownPass(u8),

    #[error("Passes must be listed in increasing order, got {0:?}")]
    PassesOutOfOrder(Vec<u8>),

    #[error("Pass {0} needs pass {1}, which is not scheduled")]
    MissingPrerequisite(u8, u8),

    #[error("stop-after pass {0} is not in the pass list")]
    StopAfterNotScheduled(u8),

    #[error("Both keep and ignore sets are given for {0}")]
    ConflictingFilterSets(&'static str),

    #[error("Transform {0} is enabled more than once")]
    DuplicateTransform(String),
}

/// The input is not a usable MusicXML document
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ParseError {
    /// XML is malformed (not well-formed)
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    /// MusicXML format not supported (e.g., timewise instead of partwise)
    #[error("Unsupported MusicXML format: {0}")]
    UnsupportedFormat(String),

    /// Required structural element is missing
    #[error("Missing required element: {0}")]
    MissingRequiredElement(String),
}

/// Where a semantic error applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum ErrorScope {
    Voice {
        part: String,
        staff: u32,
        voice: u32,
    },
    Measure {
        part: String,
        staff: u32,
        voice: u32,
        measure: String,
    },
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorScope::Voice { part, staff, voice } => {
                write!(f, "part {} staff {} voice {}", part, staff, voice)
            }
            ErrorScope::Measure {
                part,
                staff,
                voice,
                measure,
            } => write!(
                f,
                "part {} staff {} voice {} measure {}",
                part, staff, voice, measure
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SemanticErrorKind {
    #[error("tie started on {pitch} is never stopped")]
    UnterminatedTie { pitch: String },

    #[error("tie stopped on {pitch} was never started")]
    UnmatchedTieStop { pitch: String },

    #[error("measure lasts {actual} but the time signature allows {expected}")]
    MeasureOverflow {
        expected: WholeNotes,
        actual: WholeNotes,
    },

    #[error("tuplet member lasts {actual} but its written value gives {expected}")]
    TupletDurationMismatch {
        expected: WholeNotes,
        actual: WholeNotes,
    },

    #[error("chord member written as {member} but the chord is written as {first}")]
    ChordDurationMismatch { first: String, member: String },

    #[error("invalid <{element}> value {value:?}")]
    InvalidValue { element: String, value: String },
}

/// A contradiction inside one voice or measure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} ({scope}, line {line})")]
pub struct SemanticError {
    pub scope: ErrorScope,
    pub kind: SemanticErrorKind,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnterminatedChord,
    UnterminatedTuplet,
    OrphanStart,
    OrphanStop,
    EmptyPart,
    SkippedElement,
    UnknownValue,
}

impl WarningKind {
    pub fn name(&self) -> &'static str {
        match self {
            WarningKind::UnterminatedChord => "unterminated_chord",
            WarningKind::UnterminatedTuplet => "unterminated_tuplet",
            WarningKind::OrphanStart => "orphan_start",
            WarningKind::OrphanStop => "orphan_stop",
            WarningKind::EmptyPart => "empty_part",
            WarningKind::SkippedElement => "skipped_element",
            WarningKind::UnknownValue => "unknown_value",
        }
    }
}

/// A recoverable problem; the pass repaired or dropped the offending element
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} (line {line})")]
pub struct StructuralWarning {
    pub kind: WarningKind,
    pub line: usize,
    pub message: String,
}

/// A broken tree invariant met by a later pass
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("internal fault in pass {pass}: {message} (line {line})")]
pub struct InternalFault {
    pub pass: PassId,
    pub line: usize,
    pub message: String,
}

/// Why a pass failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum PassFailure {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0} semantic error(s)")]
    Semantic(usize),

    #[error(transparent)]
    Internal(#[from] InternalFault),

    #[error("Rendering failed: {0}")]
    Render(String),
}

/// Everything one pass found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass: PassId,
    pub errors: Vec<SemanticError>,
    pub warnings: Vec<StructuralWarning>,
    pub faults: Vec<InternalFault>,
}

impl PassReport {
    pub fn new(pass: PassId) -> Self {
        Self {
            pass,
            errors: Vec::new(),
            warnings: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Errors and faults fail a pass; warnings never do
    pub fn is_failure(&self) -> bool {
        !self.errors.is_empty() || !self.faults.is_empty()
    }

    /// The failure this report amounts to, faults first
    pub fn failure(&self) -> Option<PassFailure> {
        if let Some(fault) = self.faults.first() {
            return Some(PassFailure::Internal(fault.clone()));
        }
        if !self.errors.is_empty() {
            return Some(PassFailure::Semantic(self.errors.len()));
        }
        None
    }

    /// Diagnostic marks for every entry, errors first
    pub fn to_marks(&self) -> Vec<DiagnosticMark> {
        let pass = self.pass;
        let errors = self.errors.iter().map(|e| {
            DiagnosticMark::new(
                e.line,
                pass,
                DiagnosticSeverity::Error,
                semantic_kind_name(&e.kind),
                e.to_string(),
            )
            .with_scope(e.scope.to_string())
        });
        let faults = self.faults.iter().map(|f| {
            DiagnosticMark::new(
                f.line,
                pass,
                DiagnosticSeverity::Error,
                "internal_fault",
                f.message.clone(),
            )
        });
        let warnings = self.warnings.iter().map(|w| {
            DiagnosticMark::new(
                w.line,
                pass,
                DiagnosticSeverity::Warning,
                w.kind.name(),
                w.message.clone(),
            )
        });
        errors.chain(faults).chain(warnings).collect()
    }
}

fn semantic_kind_name(kind: &SemanticErrorKind) -> &'static str {
    match kind {
        SemanticErrorKind::UnterminatedTie { .. } => "unterminated_tie",
        SemanticErrorKind::UnmatchedTieStop { .. } => "unmatched_tie_stop",
        SemanticErrorKind::MeasureOverflow { .. } => "measure_overflow",
        SemanticErrorKind::TupletDurationMismatch { .. } => "tuplet_duration_mismatch",
        SemanticErrorKind::ChordDurationMismatch { .. } => "chord_duration_mismatch",
        SemanticErrorKind::InvalidValue { .. } => "invalid_value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice_scope() -> ErrorScope {
        ErrorScope::Voice {
            part: "P1".into(),
            staff: 1,
            voice: 1,
        }
    }

    #[test]
    fn test_warnings_do_not_fail_a_pass() {
        let mut report = PassReport::new(PassId::Build);
        report.warnings.push(StructuralWarning {
            kind: WarningKind::EmptyPart,
            line: 3,
            message: "part P2 has no measures".into(),
        });
        assert!(!report.is_failure());
        assert!(report.failure().is_none());

        report.errors.push(SemanticError {
            scope: voice_scope(),
            kind: SemanticErrorKind::UnterminatedTie { pitch: "C4".into() },
            line: 12,
        });
        assert!(report.is_failure());
        assert_eq!(report.failure(), Some(PassFailure::Semantic(1)));
    }

    #[test]
    fn test_semantic_error_message_names_scope() {
        let error = SemanticError {
            scope: voice_scope(),
            kind: SemanticErrorKind::UnterminatedTie { pitch: "C4".into() },
            line: 12,
        };
        assert_eq!(
            error.to_string(),
            "tie started on C4 is never stopped (part P1 staff 1 voice 1, line 12)"
        );
    }

    #[test]
    fn test_marks_put_errors_first() {
        let mut report = PassReport::new(PassId::Build);
        report.warnings.push(StructuralWarning {
            kind: WarningKind::OrphanStop,
            line: 1,
            message: "slur stop without start".into(),
        });
        report.errors.push(SemanticError {
            scope: voice_scope(),
            kind: SemanticErrorKind::UnmatchedTieStop { pitch: "D4".into() },
            line: 2,
        });
        let marks = report.to_marks();
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].severity, DiagnosticSeverity::Error);
        assert_eq!(marks[0].kind, "unmatched_tie_stop");
        assert_eq!(marks[1].kind, "orphan_stop");
    }
}
