//! Timed nodes: notes, chords, tuplets and grace notes groups

use super::arena::Idx;
use super::decorations::Decoration;
use super::links::{
    ChordBeamLink, ChordGraceNotesGroupLink, ChordSlurLink, ChordUplink, GracePosition,
    NoteUplink, Shortcut, TupletUplink, Uplink,
};
use super::score::Measure;
use crate::models::{AccidentalKind, DisplayDuration, Pitch, TupletFactor, WholeNotes};

pub type NoteId = Idx<Note>;
pub type ChordId = Idx<Chord>;
pub type TupletId = Idx<Tuplet>;
pub type GraceNotesGroupId = Idx<GraceNotesGroup>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Pitched(Pitch),
    /// `display` is the staff position of a positioned rest
    Rest { display: Option<Pitch> },
    /// Percussion note drawn at `display`
    Unpitched { display: Option<Pitch> },
    /// Invisible time filler (from `<forward>` or a merged rest)
    Skip,
}

impl NoteKind {
    pub fn is_rest(&self) -> bool {
        matches!(self, NoteKind::Rest { .. })
    }

    pub fn pitch(&self) -> Option<Pitch> {
        match *self {
            NoteKind::Pitched(pitch) => Some(pitch),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NoteKind::Pitched(_) => "note",
            NoteKind::Rest { .. } => "rest",
            NoteKind::Unpitched { .. } => "unpitched",
            NoteKind::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub line: usize,
    pub kind: NoteKind,
    /// Time actually taken in the voice, zero for grace notes
    pub sounding: WholeNotes,
    /// Written value; `None` for skips and whole-measure rests without `<type>`
    pub display: Option<DisplayDuration>,
    pub accidental: Option<AccidentalKind>,
    pub grace: bool,
    /// Whole-measure rest (`<rest measure="yes"/>`)
    pub measure_rest: bool,
    pub staff: u32,
    pub voice: u32,
    /// Sorted by [`Decoration::rank`]
    pub decorations: Vec<Decoration>,
    pub grace_before: Option<GraceNotesGroupId>,
    pub grace_after: Option<GraceNotesGroupId>,
    pub uplink: NoteUplink,
    pub measure: Option<Shortcut<Measure>>,
    /// Innermost enclosing tuplet
    pub tuplet: Option<Shortcut<Tuplet>>,
}

impl Note {
    pub fn new(line: usize, kind: NoteKind, sounding: WholeNotes) -> Self {
        Self {
            line,
            kind,
            sounding,
            display: None,
            accidental: None,
            grace: false,
            measure_rest: false,
            staff: 1,
            voice: 1,
            decorations: Vec::new(),
            grace_before: None,
            grace_after: None,
            uplink: NoteUplink::Detached,
            measure: None,
            tuplet: None,
        }
    }

    /// Written length including dots, falling back to the sounding length
    pub fn display_whole_notes(&self) -> WholeNotes {
        self.display
            .map(|d| d.whole_notes())
            .unwrap_or(self.sounding)
    }

    pub fn is_chord_member(&self) -> bool {
        matches!(self.uplink, NoteUplink::Chord(_))
    }

    pub fn is_rest(&self) -> bool {
        self.kind.is_rest()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    pub line: usize,
    /// Never empty once the chord is placed
    pub notes: Vec<NoteId>,
    pub sounding: WholeNotes,
    pub display: Option<DisplayDuration>,
    pub beam_links: Vec<ChordBeamLink>,
    pub slur_links: Vec<ChordSlurLink>,
    pub grace_before: Option<ChordGraceNotesGroupLink>,
    pub grace_after: Option<ChordGraceNotesGroupLink>,
    pub uplink: ChordUplink,
    pub measure: Option<Shortcut<Measure>>,
    pub tuplet: Option<Shortcut<Tuplet>>,
}

impl Chord {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            notes: Vec::new(),
            sounding: WholeNotes::zero(),
            display: None,
            beam_links: Vec::new(),
            slur_links: Vec::new(),
            grace_before: None,
            grace_after: None,
            uplink: ChordUplink::Detached,
            measure: None,
            tuplet: None,
        }
    }

    pub fn display_whole_notes(&self) -> WholeNotes {
        self.display
            .map(|d| d.whole_notes())
            .unwrap_or(self.sounding)
    }
}

/// Member of a tuplet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupletMember {
    Note(NoteId),
    Chord(ChordId),
    Tuplet(TupletId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tuplet {
    pub line: usize,
    /// `number` attribute of `<tuplet>`
    pub number: u32,
    /// Own factor, not composed with enclosing tuplets
    pub factor: TupletFactor,
    pub members: Vec<TupletMember>,
    pub uplink: TupletUplink,
    pub measure: Option<Shortcut<Measure>>,
}

impl Tuplet {
    pub fn new(line: usize, number: u32, factor: TupletFactor) -> Self {
        Self {
            line,
            number,
            factor,
            members: Vec::new(),
            uplink: TupletUplink::Detached,
            measure: None,
        }
    }
}

/// Member of a grace notes group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceMember {
    Note(NoteId),
    Chord(ChordId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraceNotesGroup {
    pub line: usize,
    pub position: GracePosition,
    /// Acciaccatura stroke
    pub slashed: bool,
    pub members: Vec<GraceMember>,
    /// Principal note the group is attached to
    pub owner: Option<Uplink<Note>>,
}

impl GraceNotesGroup {
    pub fn new(line: usize, position: GracePosition, slashed: bool) -> Self {
        Self {
            line,
            position,
            slashed,
            members: Vec::new(),
            owner: None,
        }
    }
}
