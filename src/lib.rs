//! Score tree intermediate representation and conversion pipeline
//!
//! MusicXML is read into a [`ScoreTree`], optionally reshaped by score tree
//! transforms, converted into backend trees (LilyPond-oriented, Braille,
//! Guido, regenerated MusicXML) and finally written out as text.
//!
//! ```rust,ignore
//! use score_ir::{Backend, Pipeline, RunConfig};
//!
//! let mut config = RunConfig::default();
//! config.backends = vec![Backend::Lilypond];
//! let outcome = Pipeline::new(config)?.run_str("song.musicxml", &xml);
//! if let Some(ly) = outcome.text(Backend::Lilypond) {
//!     println!("{}", ly);
//! }
//! ```

pub mod config;
pub mod context;
pub mod converters;
pub mod diagnostics;
pub mod errors;
pub mod ir;
pub mod models;
pub mod musicxml;
pub mod pipeline;
pub mod renderers;
pub mod transforms;
pub mod utils;

// Re-export commonly used types
pub use config::{Backend, LilypondSettings, PitchLanguage, RunConfig, TransformConfig, TransformName};
pub use context::RunContext;
pub use diagnostics::{DiagnosticMark, DiagnosticSeverity, Diagnostics};
pub use errors::{
    ConfigurationError, ParseError, PassFailure, PassReport, SemanticError, SemanticErrorKind,
    WarningKind,
};
pub use ir::{flat_view, ScoreTree, Visitor};
pub use musicxml::{read_musicxml, write_musicxml, MusicXmlTree};
pub use pipeline::{PassId, Pipeline, RunOutcome, RunState};
