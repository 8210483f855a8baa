//! Pass pipeline controller
//!
//! A run sequences up to four numbered passes:
//!
//! 1. build the score tree from the MusicXML tree
//! 2. apply the enabled score tree transforms
//! 3. convert the score tree to the requested backend trees
//! 4. generate output text from the backend trees
//!
//! ```text
//! NotStarted → Running(pass) → Completed
//!                            → StoppedEarly(pass)
//!                            → Failed(pass, failure)
//! ```
//!
//! Each pass is timed and reports into its own [`PassReport`]. A pass with a
//! semantic error or an internal fault fails the run; warnings never do.
//! The stop-after boundary is checked only after a pass succeeded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use log::{info, warn};

use crate::config::{Backend, RunConfig};
use crate::context::RunContext;
use crate::converters::{
    build_score_tree, score_to_bsr, score_to_guido, score_to_lpsr, score_to_musicxml, BsrScore,
    GuidoScore, LpsrScore,
};
use crate::diagnostics::pairing::analyze_pairs;
use crate::diagnostics::Diagnostics;
use crate::errors::{ConfigurationError, PassFailure, PassReport};
use crate::ir::ScoreTree;
use crate::musicxml::{read_musicxml, write_musicxml, MusicXmlTree};
use crate::renderers::{render_braille, render_guido, render_lilypond_score};
use crate::transforms::apply_transforms;
use crate::utils::performance::{elapsed_ms, TimingRecord};

/// Pass numbers, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassId {
    Build = 1,
    Transform = 2,
    Convert = 3,
    Generate = 4,
}

impl PassId {
    pub const ALL: [PassId; 4] = [PassId::Build, PassId::Transform, PassId::Convert, PassId::Generate];

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        PassId::ALL.into_iter().find(|p| p.number() == number)
    }

    pub fn description(&self) -> &'static str {
        match self {
            PassId::Build => "build score tree",
            PassId::Transform => "transform score tree",
            PassId::Convert => "convert to backend trees",
            PassId::Generate => "generate output text",
        }
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunState {
    NotStarted,
    Running(PassId),
    Completed,
    StoppedEarly(PassId),
    Failed(PassId, PassFailure),
}

impl RunState {
    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Completed | RunState::StoppedEarly(_))
    }
}

/// Backend trees produced by pass 3
#[derive(Debug, Clone, Default)]
pub struct BackendTrees {
    pub lpsr: Option<LpsrScore>,
    pub bsr: Option<BsrScore>,
    pub guido: Option<GuidoScore>,
    pub musicxml: Option<MusicXmlTree>,
}

impl BackendTrees {
    pub fn is_empty(&self) -> bool {
        self.lpsr.is_none() && self.bsr.is_none() && self.guido.is_none() && self.musicxml.is_none()
    }
}

/// Everything a run produced, successful or not
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    /// The score tree after the last pass that touched it
    pub score: Option<ScoreTree>,
    pub backends: BackendTrees,
    /// Generated text per backend
    pub texts: BTreeMap<Backend, String>,
    pub diagnostics: Diagnostics,
    pub reports: Vec<PassReport>,
    pub timings: Vec<TimingRecord>,
}

impl RunOutcome {
    pub fn text(&self, backend: Backend) -> Option<&str> {
        self.texts.get(&backend).map(String::as_str)
    }

    pub fn report(&self, pass: PassId) -> Option<&PassReport> {
        self.reports.iter().find(|r| r.pass == pass)
    }
}

/// Runs the passes a validated [`RunConfig`] schedules
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: RunConfig,
}

/// Work carried from one pass to the next
#[derive(Default)]
struct RunProducts {
    score: Option<ScoreTree>,
    backends: BackendTrees,
    texts: BTreeMap<Backend, String>,
}

impl Pipeline {
    /// Validate `config`; nothing runs when it is rejected
    pub fn new(config: RunConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Parse MusicXML text, then run
    pub fn run_str(&self, source_name: &str, xml: &str) -> RunOutcome {
        match read_musicxml(source_name, xml) {
            Ok(tree) => self.run(&tree),
            Err(e) => {
                warn!("{}: {}", source_name, e);
                let mut context = RunContext::new(self.config.clone());
                context.begin_pass(PassId::Build);
                context.finish_pass();
                let (reports, diagnostics, timings) = context.into_parts();
                RunOutcome {
                    state: RunState::Failed(PassId::Build, PassFailure::Parse(e)),
                    score: None,
                    backends: BackendTrees::default(),
                    texts: BTreeMap::new(),
                    diagnostics,
                    reports,
                    timings,
                }
            }
        }
    }

    /// Run every scheduled pass over `input`
    pub fn run(&self, input: &MusicXmlTree) -> RunOutcome {
        let mut context = RunContext::new(self.config.clone());
        let mut products = RunProducts::default();
        let stop_after = self.config.stop_after_pass();
        let mut state = RunState::NotStarted;

        for pass in self.config.pass_ids() {
            state = RunState::Running(pass);
            info!("pass {} ({}) started on {}", pass, pass.description(), input.source_name);
            context.begin_pass(pass);
            let started = Instant::now();

            let result = match pass {
                PassId::Build => self.build(input, &mut context, &mut products),
                PassId::Transform => self.transform(&mut context, &mut products),
                PassId::Convert => self.convert(&mut context, &mut products),
                PassId::Generate => self.generate(&mut context, &mut products),
            };

            let elapsed = elapsed_ms(started);
            context
                .performance_mut()
                .record_measurement(&format!("pass {}", pass), elapsed);
            let report = context.finish_pass();
            info!(
                "pass {} finished in {:.2} ms: {} error(s), {} warning(s), {} fault(s)",
                pass,
                elapsed,
                report.errors.len(),
                report.warnings.len(),
                report.faults.len()
            );

            let failure = match result {
                Err(failure) => Some(failure),
                Ok(()) => report.failure(),
            };
            if let Some(failure) = failure {
                warn!("pass {} failed: {}", pass, failure);
                state = RunState::Failed(pass, failure);
                break;
            }
            if stop_after == Some(pass) {
                info!("stopping after pass {}", pass);
                state = RunState::StoppedEarly(pass);
                break;
            }
        }
        if let RunState::Running(_) = state {
            state = RunState::Completed;
        }

        let (reports, diagnostics, timings) = context.into_parts();
        RunOutcome {
            state,
            score: products.score,
            backends: products.backends,
            texts: products.texts,
            diagnostics,
            reports,
            timings,
        }
    }

    fn build(
        &self,
        input: &MusicXmlTree,
        context: &mut RunContext,
        products: &mut RunProducts,
    ) -> Result<(), PassFailure> {
        let tree = build_score_tree(input, context)?;
        // the builder drops every orphan end, so any finding here is a builder bug
        for mark in analyze_pairs(&tree, PassId::Build) {
            context.fault(mark.line, format!("{}: {}", mark.kind, mark.message));
        }
        products.score = Some(tree);
        Ok(())
    }

    fn transform(&self, context: &mut RunContext, products: &mut RunProducts) -> Result<(), PassFailure> {
        if let Some(tree) = products.score.take() {
            products.score = Some(apply_transforms(tree, context));
        }
        Ok(())
    }

    fn convert(&self, context: &mut RunContext, products: &mut RunProducts) -> Result<(), PassFailure> {
        let Some(tree) = products.score.as_ref() else {
            context.fault(0, "no score tree to convert");
            return Ok(());
        };
        for backend in &self.config.backends {
            let started = Instant::now();
            match backend {
                Backend::Lilypond => products.backends.lpsr = Some(score_to_lpsr(tree, context)),
                Backend::Braille => products.backends.bsr = Some(score_to_bsr(tree, context)),
                Backend::Guido => products.backends.guido = Some(score_to_guido(tree, context)),
                Backend::Musicxml => {
                    products.backends.musicxml = Some(score_to_musicxml(tree, context))
                }
            }
            context
                .performance_mut()
                .record_measurement(&format!("convert {}", backend.name()), elapsed_ms(started));
        }
        Ok(())
    }

    fn generate(&self, _context: &mut RunContext, products: &mut RunProducts) -> Result<(), PassFailure> {
        let backends = &products.backends;
        if let Some(lpsr) = &backends.lpsr {
            let text = render_lilypond_score(lpsr, &self.config.lilypond)
                .map_err(|e| PassFailure::Render(e.to_string()))?;
            products.texts.insert(Backend::Lilypond, text);
        }
        if let Some(bsr) = &backends.bsr {
            products.texts.insert(Backend::Braille, render_braille(bsr));
        }
        if let Some(guido) = &backends.guido {
            products.texts.insert(Backend::Guido, render_guido(guido));
        }
        if let Some(musicxml) = &backends.musicxml {
            let text = write_musicxml(musicxml).map_err(|e| PassFailure::Render(e.to_string()))?;
            products.texts.insert(Backend::Musicxml, text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_NOTE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list><score-part id="P1"><part-name>Flute</part-name></score-part></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions><time><beats>1</beats><beat-type>4</beat-type></time></attributes>
      <note><pitch><step>A</step><octave>4</octave></pitch><duration>1</duration><type>quarter</type></note>
    </measure>
  </part>
</score-partwise>"#;

    #[test]
    fn test_pass_id_numbers() {
        assert_eq!(PassId::from_number(3), Some(PassId::Convert));
        assert_eq!(PassId::from_number(0), None);
        assert_eq!(PassId::Generate.to_string(), "4");
    }

    #[test]
    fn test_invalid_config_is_rejected_before_running() {
        let mut config = RunConfig::default();
        config.passes = vec![2, 3];
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn test_full_run_completes_with_timings() {
        let pipeline = Pipeline::new(RunConfig::default()).unwrap();
        let outcome = pipeline.run_str("one.xml", ONE_NOTE);
        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(outcome.reports.len(), 4);
        assert!(outcome.text(Backend::Lilypond).is_some());
        let passes: Vec<&str> = outcome
            .timings
            .iter()
            .filter(|t| t.operation.starts_with("pass"))
            .map(|t| t.operation.as_str())
            .collect();
        assert_eq!(passes, vec!["pass 1", "pass 2", "pass 3", "pass 4"]);
    }

    #[test]
    fn test_stop_after_last_pass_reports_stopped_early() {
        let mut config = RunConfig::default();
        config.passes = vec![1];
        config.stop_after = Some(1);
        let outcome = Pipeline::new(config).unwrap().run_str("one.xml", ONE_NOTE);
        assert_eq!(outcome.state, RunState::StoppedEarly(PassId::Build));
        assert!(outcome.score.is_some());
    }

    #[test]
    fn test_malformed_input_fails_pass_one() {
        let outcome = Pipeline::new(RunConfig::default())
            .unwrap()
            .run_str("bad.xml", "<score-partwise>");
        assert!(matches!(
            outcome.state,
            RunState::Failed(PassId::Build, PassFailure::Parse(_))
        ));
    }
}
