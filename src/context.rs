//! Run-scoped state threaded through every pass
//!
//! There are no global singletons: the builder, the transforms and the
//! converters all receive the [`RunContext`] of the current run and record
//! what they find through it.

use log::{debug, warn};

use crate::config::RunConfig;
use crate::diagnostics::Diagnostics;
use crate::errors::{
    ErrorScope, InternalFault, PassReport, SemanticError, SemanticErrorKind, StructuralWarning,
    WarningKind,
};
use crate::pipeline::PassId;
use crate::utils::performance::{PerformanceMonitor, TimingRecord};

#[derive(Debug)]
pub struct RunContext {
    config: RunConfig,
    report: PassReport,
    reports: Vec<PassReport>,
    diagnostics: Diagnostics,
    performance: PerformanceMonitor,
}

impl RunContext {
    /// A context whose current pass is pass 1
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            report: PassReport::new(PassId::Build),
            reports: Vec::new(),
            diagnostics: Diagnostics::new(),
            performance: PerformanceMonitor::new(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn current_pass(&self) -> PassId {
        self.report.pass
    }

    /// Start collecting for `pass`, dropping anything recorded without a pass
    pub fn begin_pass(&mut self, pass: PassId) {
        self.report = PassReport::new(pass);
    }

    /// Close the current pass: its report is kept and flattened into diagnostics
    pub fn finish_pass(&mut self) -> PassReport {
        let pass = self.report.pass;
        let report = std::mem::replace(&mut self.report, PassReport::new(pass));
        self.diagnostics.extend(report.to_marks());
        self.reports.push(report.clone());
        report
    }

    /// What the current pass has recorded so far
    pub fn report(&self) -> &PassReport {
        &self.report
    }

    pub fn warn(&mut self, kind: WarningKind, line: usize, message: impl Into<String>) {
        let message = message.into();
        warn!("line {}: {}", line, message);
        self.report.warnings.push(StructuralWarning {
            kind,
            line,
            message,
        });
    }

    pub fn error(&mut self, scope: ErrorScope, kind: SemanticErrorKind, line: usize) {
        debug!("line {}: {} ({})", line, kind, scope);
        self.report.errors.push(SemanticError { scope, kind, line });
    }

    pub fn fault(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        warn!("internal fault in pass {} at line {}: {}", self.report.pass, line, message);
        self.report.faults.push(InternalFault {
            pass: self.report.pass,
            line,
            message,
        });
    }

    pub fn performance_mut(&mut self) -> &mut PerformanceMonitor {
        &mut self.performance
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Finished reports, diagnostics and timings, in pass order
    pub fn into_parts(self) -> (Vec<PassReport>, Diagnostics, Vec<TimingRecord>) {
        (self.reports, self.diagnostics, self.performance.into_records())
    }
}
