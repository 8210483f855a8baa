//! Output text generation (pass 4)
//!
//! Each renderer turns one backend tree into text. MusicXML text comes from
//! [`crate::musicxml::write_musicxml`].

pub mod braille;
pub mod guido;
pub mod lilypond;

pub use braille::render_braille;
pub use guido::render_guido;
pub use lilypond::render_lilypond_score;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("LilyPond template failed: {0}")]
    Template(#[from] mustache::Error),
}
