//! Non-owning references between score tree nodes
//!
//! Four relationships exist between nodes, and each has its own type so they
//! cannot be confused:
//!
//! - **Ownership**: a parent lists the child's [`Idx`] in its children. Only
//!   ownership makes a node reachable from the score.
//! - **Uplink**: child → container. Followed to climb the tree, never to drop.
//! - **Shortcut**: a cached index skipping several levels (note → measure,
//!   note → innermost tuplet).
//! - **Sidelink**: peer ↔ peer. Paired decorations (tie, slur, wedge, spanner,
//!   ligature) share one [`Pair`] whose two ends are set by a single call, so a
//!   half-linked pair cannot be built.

use super::arena::Idx;
use super::notes::{Chord, GraceNotesGroup, Note, Tuplet};
use super::score::Measure;

/// Child → container reference
#[derive(Debug)]
pub struct Uplink<T>(Idx<T>);

impl<T> Uplink<T> {
    pub fn new(target: Idx<T>) -> Self {
        Uplink(target)
    }

    pub fn target(&self) -> Idx<T> {
        self.0
    }
}

impl<T> Clone for Uplink<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Uplink<T> {}

impl<T> PartialEq for Uplink<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Uplink<T> {}

/// Cached reference for O(1) access across several tree levels
#[derive(Debug)]
pub struct Shortcut<T>(Idx<T>);

impl<T> Shortcut<T> {
    pub fn new(target: Idx<T>) -> Self {
        Shortcut(target)
    }

    pub fn target(&self) -> Idx<T> {
        self.0
    }
}

impl<T> Clone for Shortcut<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Shortcut<T> {}

impl<T> PartialEq for Shortcut<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Shortcut<T> {}

/// Container of a note: exactly one of these holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteUplink {
    /// Not placed yet (only while the builder assembles it)
    Detached,
    Measure(Uplink<Measure>),
    Chord(Uplink<Chord>),
    Tuplet(Uplink<Tuplet>),
    GraceNotesGroup(Uplink<GraceNotesGroup>),
}

/// Container of a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordUplink {
    Detached,
    Measure(Uplink<Measure>),
    Tuplet(Uplink<Tuplet>),
    GraceNotesGroup(Uplink<GraceNotesGroup>),
}

/// Container of a tuplet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupletUplink {
    Detached,
    Measure(Uplink<Measure>),
    Tuplet(Uplink<Tuplet>),
}

// ============================================================================
// PAIRED DECORATIONS
// ============================================================================

/// Kind of a paired construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PairKind {
    Tie,
    Slur,
    Wedge,
    Spanner,
    Ligature,
}

impl PairKind {
    pub fn name(&self) -> &'static str {
        match self {
            PairKind::Tie => "tie",
            PairKind::Slur => "slur",
            PairKind::Wedge => "wedge",
            PairKind::Spanner => "spanner",
            PairKind::Ligature => "ligature",
        }
    }
}

pub type PairId = Idx<Pair>;

/// The sidelink shared by the start and stop decorations of one construct
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub kind: PairKind,
    pub start: Idx<Note>,
    pub stop: Idx<Note>,
}

impl Pair {
    /// The note at the other end, seen from `note`
    pub fn peer_of(&self, note: Idx<Note>) -> Option<Idx<Note>> {
        if note == self.start {
            Some(self.stop)
        } else if note == self.stop {
            Some(self.start)
        } else {
            None
        }
    }
}

// ============================================================================
// CHORD LINKS
// ============================================================================

/// Position of a decoration inside a note's decoration list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationSlot {
    pub note: Idx<Note>,
    pub position: usize,
}

/// A beam carried by a chord member, rendered once for the whole chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordBeamLink {
    pub original: DecorationSlot,
    pub chord: Uplink<Chord>,
}

/// A slur carried by a chord member, rendered once for the whole chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordSlurLink {
    pub original: DecorationSlot,
    pub chord: Uplink<Chord>,
}

/// Whether a grace notes group precedes or follows its principal note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GracePosition {
    Before,
    After,
}

/// A grace notes group owned by a chord member, rendered for the whole chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordGraceNotesGroupLink {
    pub group: Idx<GraceNotesGroup>,
    pub position: GracePosition,
    pub chord: Uplink<Chord>,
}
