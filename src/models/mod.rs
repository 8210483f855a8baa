//! Value types shared by every representation
//!
//! Durations and pitches are plain `Copy` values; they carry no tree
//! structure and are used unchanged by the score tree and every backend.

pub mod duration;
pub mod pitch;

pub use duration::{DisplayDuration, NoteType, Rational, TupletFactor, WholeNotes};
pub use pitch::{AccidentalKind, Alteration, Pitch, Step};
