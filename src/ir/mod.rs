//! Score Tree: the intermediate representation every pass works on
//!
//! # Architecture
//!
//! ```text
//! Score
//!   └─ PartGroup (nested)
//!        └─ Part
//!             └─ Staff
//!                  └─ Voice
//!                       └─ Measure
//!                            └─ Note | Chord | Tuplet | Clef | Key | Time | BarLine | Tempo
//! ```
//!
//! Nodes live in per-kind arenas inside [`ScoreTree`] and refer to each other
//! through typed indices. Notes carry their decorations and grace notes
//! groups; chords carry links to the beams, slurs and grace notes of their
//! members.
//!
//! # Modules
//!
//! - **arena**: typed index arenas
//! - **links**: uplinks, shortcuts, pairs and chord links
//! - **score**: hierarchy nodes and measure attributes
//! - **notes**: notes, chords, tuplets, grace notes groups
//! - **decorations**: elements attached to notes
//! - **tree**: the [`ScoreTree`] container and its construction API
//! - **element**: the [`Element`] / [`Visitor`] traversal protocol
//! - **flat_view**: line-number-free textual view used to compare trees
//!
//! # Usage
//!
//! ```rust,ignore
//! use score_ir::ir::{flat_view, ScoreTree};
//!
//! let tree: ScoreTree = build_score_tree(&musicxml, &config, &mut context)?;
//! for line in flat_view(&tree) {
//!     println!("{}", line);
//! }
//! ```

pub mod arena;
pub mod decorations;
pub mod element;
pub mod flat_view;
pub mod links;
pub mod notes;
pub mod score;
pub mod tree;

pub use arena::{Arena, Idx};
pub use decorations::{
    ArticulationKind, BeamValue, Decoration, DecorationKind, DynamicKind, OrnamentKind, PairRole,
    PedalKind, Placement, SpannerKind, StemDirection, TechnicalKind, WedgeKind,
};
pub use element::{AttachedDecoration, Element, Visitor};
pub use flat_view::{flat_view, FlatViewVisitor};
pub use links::{
    ChordBeamLink, ChordGraceNotesGroupLink, ChordSlurLink, ChordUplink, DecorationSlot,
    GracePosition, NoteUplink, Pair, PairId, PairKind, Shortcut, TupletUplink, Uplink,
};
pub use notes::{
    Chord, ChordId, GraceMember, GraceNotesGroup, GraceNotesGroupId, Note, NoteId, NoteKind,
    Tuplet, TupletId, TupletMember,
};
pub use score::{
    BarLine, BarLineLocation, BarStyle, Clef, ClefSign, Ending, EndingType, GroupSymbol,
    Identification, Key, KeyMode, Measure, MeasureElement, Part, PartGroup, PartGroupElement,
    Repeat, RepeatDirection, Score, Staff, Tempo, Time, Voice,
};
pub use tree::{MeasureId, PartGroupId, PartId, ScoreTree, StaffId, VoiceId};
