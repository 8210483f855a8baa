//! LilyPond-oriented tree (LPSR)
//!
//! Mirrors the score hierarchy down to measures, then holds music items the
//! way LilyPond writes them: chords as `< >`, tuplets as nested `\tuplet`,
//! grace notes as prefixes or `\afterGrace`. Spelling into text (pitch
//! language, durations, escapes) is left to the LilyPond renderer.

use crate::ir::{
    ArticulationKind, DynamicKind, GroupSymbol, KeyMode, OrnamentKind, PedalKind, Placement,
    StemDirection, TechnicalKind, WedgeKind,
};
use crate::models::{NoteType, Pitch, WholeNotes};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LpsrHeader {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub composer: Option<String>,
    pub arranger: Option<String>,
    pub copyright: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LpsrScore {
    pub header: LpsrHeader,
    /// Top-level parts and groups in score order
    pub items: Vec<LpsrGroupItem>,
}

impl LpsrScore {
    /// Parts in score order, groups flattened
    pub fn parts(&self) -> Vec<&LpsrPart> {
        fn collect<'a>(items: &'a [LpsrGroupItem], out: &mut Vec<&'a LpsrPart>) {
            for item in items {
                match item {
                    LpsrGroupItem::Part(part) => out.push(part),
                    LpsrGroupItem::Group(group) => collect(&group.items, out),
                }
            }
        }
        let mut parts = Vec::new();
        collect(&self.items, &mut parts);
        parts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LpsrGroupItem {
    Group(LpsrPartGroup),
    Part(LpsrPart),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrPartGroup {
    pub name: Option<String>,
    pub symbol: GroupSymbol,
    pub items: Vec<LpsrGroupItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrPart {
    pub id: String,
    pub name: String,
    pub abbreviation: Option<String>,
    pub staves: Vec<LpsrStaff>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrStaff {
    pub number: u32,
    pub voices: Vec<LpsrVoice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrVoice {
    /// Context name, e.g. "P1-staff1-voice2"
    pub name: String,
    pub number: u32,
    pub measures: Vec<LpsrMeasure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrMeasure {
    pub number: String,
    /// Pickup or otherwise uncounted measure
    pub implicit: bool,
    /// Written durations scaled by their composed tuplet factors
    pub duration: WholeNotes,
    pub music: Vec<LpsrMusic>,
}

/// Written duration, optionally scaled (`1*3/4`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpsrDuration {
    pub note_type: NoteType,
    pub dots: u8,
    /// `(numerator, denominator)` scaling factor
    pub multiplier: Option<(i64, i64)>,
}

impl LpsrDuration {
    pub fn new(note_type: NoteType, dots: u8) -> Self {
        Self {
            note_type,
            dots,
            multiplier: None,
        }
    }

    /// Spell a length, as a plain value when one exists, else a scaled whole note
    pub fn of_length(length: WholeNotes) -> Self {
        match crate::models::DisplayDuration::from_whole_notes(length) {
            Some(display) => Self::new(display.note_type, display.dots),
            None => Self {
                note_type: NoteType::Whole,
                dots: 0,
                multiplier: Some((length.numer(), length.denom())),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpsrNoteKind {
    Pitched(Pitch),
    /// Rest, positioned on the staff when `position` is given
    Rest { position: Option<Pitch> },
    /// Whole-measure rest (`R`)
    MeasureRest,
    Skip,
    /// Percussion note drawn at `position`
    Unpitched { position: Option<Pitch> },
}

/// Something attached to a note or chord
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LpsrEvent {
    /// `\stemUp` and friends, written before the note
    Stem(StemDirection),
    /// `\[`, written before the note
    LigatureStart,
    LigatureStop,
    Tie,
    SlurStart(u32),
    SlurStop(u32),
    BeamStart,
    BeamStop,
    Articulation(ArticulationKind),
    Ornament(OrnamentKind),
    Technical {
        kind: TechnicalKind,
        text: Option<String>,
    },
    Glissando,
    Dynamic(DynamicKind),
    Words {
        text: String,
        placement: Option<Placement>,
    },
    WedgeStart(WedgeKind),
    WedgeStop,
    Pedal(PedalKind),
    TextSpanStart,
    TextSpanStop,
    TrillSpanStart,
    TrillSpanStop,
}

impl LpsrEvent {
    /// Written before the note rather than after it
    pub fn is_prefix(&self) -> bool {
        matches!(self, LpsrEvent::Stem(_) | LpsrEvent::LigatureStart)
    }

    /// Directions, omitted when direction conversion is off
    pub fn is_direction(&self) -> bool {
        matches!(
            self,
            LpsrEvent::Dynamic(_)
                | LpsrEvent::Words { .. }
                | LpsrEvent::WedgeStart(_)
                | LpsrEvent::WedgeStop
                | LpsrEvent::Pedal(_)
                | LpsrEvent::TextSpanStart
                | LpsrEvent::TextSpanStop
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrNote {
    pub kind: LpsrNoteKind,
    pub duration: LpsrDuration,
    /// Accidental printed even when the key implies it
    pub forced_accidental: bool,
    pub events: Vec<LpsrEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrChordMember {
    pub pitch: Pitch,
    pub forced_accidental: bool,
    pub tie: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrChord {
    pub members: Vec<LpsrChordMember>,
    pub duration: LpsrDuration,
    /// Beams and slurs come from the chord's links, once per chord
    pub events: Vec<LpsrEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpsrTempo {
    pub words: Option<String>,
    pub unit: Option<LpsrDuration>,
    pub per_minute: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LpsrMusic {
    Note(LpsrNote),
    Chord(LpsrChord),
    /// `\tuplet actual/normal { ... }`
    Tuplet {
        actual: u32,
        normal: u32,
        music: Vec<LpsrMusic>,
    },
    /// `\grace { }`, or `\acciaccatura { }` when slashed
    Grace {
        slashed: bool,
        music: Vec<LpsrMusic>,
    },
    /// `\afterGrace main { grace }`
    AfterGrace {
        main: Box<LpsrMusic>,
        grace: Vec<LpsrMusic>,
    },
    /// Clef name as LilyPond spells it, e.g. "treble_8"
    Clef(String),
    Key {
        tonic: Pitch,
        mode: KeyMode,
    },
    Time {
        beats: u32,
        beat_type: u32,
    },
    /// Unmetered music from here on
    Cadenza,
    /// `\bar` glyph, e.g. "|." or ":|."
    BarLine(String),
    Tempo(LpsrTempo),
    /// `count` empty measures of `measure_length` each
    MultipleRest {
        measure_length: WholeNotes,
        count: u32,
    },
}
