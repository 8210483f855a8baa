//! Braille-oriented tree (BSR)

use super::cells::BrailleCell;
use crate::models::WholeNotes;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BsrScore {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub parts: Vec<BsrPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BsrPart {
    pub name: String,
    pub voices: Vec<BsrVoice>,
}

/// One voice written as a sequence of measures, staves flattened
#[derive(Debug, Clone, PartialEq)]
pub struct BsrVoice {
    /// Heading line, e.g. "Flute, staff 1, voice 1"
    pub label: String,
    pub measures: Vec<BsrMeasure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BsrMeasure {
    pub number: String,
    /// Written durations scaled by their composed tuplet factors
    pub duration: WholeNotes,
    pub elements: Vec<BsrElement>,
}

impl BsrMeasure {
    pub fn cells(&self) -> impl Iterator<Item = BrailleCell> + '_ {
        self.elements.iter().flat_map(|e| e.cells.iter().copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BsrElementKind {
    Clef,
    Key,
    Time,
    Note,
    Rest,
    Chord,
    Tuplet,
    Grace,
    BarLine,
    Dynamic,
    Words,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BsrElement {
    pub kind: BsrElementKind,
    pub cells: Vec<BrailleCell>,
}

impl BsrElement {
    pub fn new(kind: BsrElementKind, cells: Vec<BrailleCell>) -> Self {
        Self { kind, cells }
    }
}
