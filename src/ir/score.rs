//! Score hierarchy nodes: Score → PartGroup → Part → Staff → Voice → Measure
//!
//! Each level owns the next through an index list and keeps an [`Uplink`] to
//! its container. Measure-level attributes (clef, key, time, bar lines,
//! tempo) are small values stored inline in the measure's element sequence.

use serde::{Deserialize, Serialize};

use super::arena::Idx;
use super::links::Uplink;
use super::notes::{Chord, Note, Tuplet};
use crate::models::NoteType;

// ============================================================================
// HIERARCHY
// ============================================================================

/// Work and creator information from `<work>`, `<movement-title>` and
/// `<identification>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identification {
    pub work_title: Option<String>,
    pub movement_title: Option<String>,
    pub composers: Vec<String>,
    pub arrangers: Vec<String>,
    pub rights: Vec<String>,
    pub software: Vec<String>,
}

impl Identification {
    pub fn is_empty(&self) -> bool {
        *self == Identification::default()
    }

    /// Title to show: the work title, else the movement title
    pub fn title(&self) -> Option<&str> {
        self.work_title
            .as_deref()
            .or(self.movement_title.as_deref())
    }
}

/// Root of the tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    pub line: usize,
    pub identification: Identification,
    pub part_groups: Vec<Idx<PartGroup>>,
}

/// Bracket drawn in front of a part group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupSymbol {
    None,
    Brace,
    Bracket,
    Line,
    Square,
}

impl GroupSymbol {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        let symbol = match value.trim() {
            "none" => GroupSymbol::None,
            "brace" => GroupSymbol::Brace,
            "bracket" => GroupSymbol::Bracket,
            "line" => GroupSymbol::Line,
            "square" => GroupSymbol::Square,
            _ => return None,
        };
        Some(symbol)
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            GroupSymbol::None => "none",
            GroupSymbol::Brace => "brace",
            GroupSymbol::Bracket => "bracket",
            GroupSymbol::Line => "line",
            GroupSymbol::Square => "square",
        }
    }
}

/// Child of a part group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartGroupElement {
    Part(Idx<Part>),
    PartGroup(Idx<PartGroup>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartGroup {
    pub line: usize,
    /// `number` attribute of `<part-group>`, 0 for the implicit outer group
    pub number: u32,
    pub name: Option<String>,
    pub symbol: GroupSymbol,
    /// Whether bar lines are drawn through the whole group
    pub barline: bool,
    /// Created by the builder to hold the parts, not present in the source
    pub implicit: bool,
    pub elements: Vec<PartGroupElement>,
    /// `None` for groups owned directly by the score
    pub uplink: Option<Uplink<PartGroup>>,
}

impl PartGroup {
    pub fn implicit() -> Self {
        Self {
            line: 0,
            number: 0,
            name: None,
            symbol: GroupSymbol::None,
            barline: false,
            implicit: true,
            elements: Vec::new(),
            uplink: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub line: usize,
    /// `id` attribute, e.g. "P1"
    pub id: String,
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    /// Sorted by staff number
    pub staves: Vec<Idx<Staff>>,
    pub uplink: Uplink<PartGroup>,
}

impl Part {
    /// Display name, falling back to the part id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Staff {
    pub line: usize,
    pub number: u32,
    /// In creation order
    pub voices: Vec<Idx<Voice>>,
    pub uplink: Uplink<Part>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub line: usize,
    pub number: u32,
    pub measures: Vec<Idx<Measure>>,
    pub uplink: Uplink<Staff>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub line: usize,
    /// `number` attribute, kept as text ("1", "X1", "7a" all occur)
    pub number: String,
    /// Set when the measure is outside the regular count (pickups, cadenzas)
    pub implicit: bool,
    pub elements: Vec<MeasureElement>,
    /// Number of measures this one stands for after empty-measure coalescing
    pub multiple_rest: Option<u32>,
    pub uplink: Uplink<Voice>,
}

impl Measure {
    /// Notes, chords and tuplets of the measure, without attributes
    pub fn timed_elements(&self) -> impl Iterator<Item = &MeasureElement> {
        self.elements.iter().filter(|e| e.is_timed())
    }

    pub fn time(&self) -> Option<&Time> {
        self.elements.iter().find_map(|e| match e {
            MeasureElement::Time(time) => Some(time),
            _ => None,
        })
    }
}

/// Entry in a measure's element sequence
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureElement {
    Note(Idx<Note>),
    Chord(Idx<Chord>),
    Tuplet(Idx<Tuplet>),
    Clef(Clef),
    Key(Key),
    Time(Time),
    BarLine(BarLine),
    Tempo(Tempo),
}

impl MeasureElement {
    pub fn is_timed(&self) -> bool {
        matches!(
            self,
            MeasureElement::Note(_) | MeasureElement::Chord(_) | MeasureElement::Tuplet(_)
        )
    }
}

// ============================================================================
// MEASURE ATTRIBUTES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClefSign {
    G,
    F,
    C,
    Percussion,
    Tab,
    None,
}

impl ClefSign {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        let sign = match value.trim() {
            "G" => ClefSign::G,
            "F" => ClefSign::F,
            "C" => ClefSign::C,
            "percussion" => ClefSign::Percussion,
            "TAB" => ClefSign::Tab,
            "none" => ClefSign::None,
            _ => return None,
        };
        Some(sign)
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            ClefSign::G => "G",
            ClefSign::F => "F",
            ClefSign::C => "C",
            ClefSign::Percussion => "percussion",
            ClefSign::Tab => "TAB",
            ClefSign::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clef {
    pub line: usize,
    pub sign: ClefSign,
    /// Staff line the sign sits on, counted from the bottom
    pub staff_line: Option<u8>,
    /// `<clef-octave-change>`, e.g. -1 for a tenor G clef
    pub octave_change: i8,
}

impl Clef {
    pub fn treble() -> Self {
        Self {
            line: 0,
            sign: ClefSign::G,
            staff_line: Some(2),
            octave_change: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Ionian,
    Locrian,
    None,
}

impl KeyMode {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        let mode = match value.trim() {
            "major" => KeyMode::Major,
            "minor" => KeyMode::Minor,
            "dorian" => KeyMode::Dorian,
            "phrygian" => KeyMode::Phrygian,
            "lydian" => KeyMode::Lydian,
            "mixolydian" => KeyMode::Mixolydian,
            "aeolian" => KeyMode::Aeolian,
            "ionian" => KeyMode::Ionian,
            "locrian" => KeyMode::Locrian,
            "none" => KeyMode::None,
            _ => return None,
        };
        Some(mode)
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            KeyMode::Major => "major",
            KeyMode::Minor => "minor",
            KeyMode::Dorian => "dorian",
            KeyMode::Phrygian => "phrygian",
            KeyMode::Lydian => "lydian",
            KeyMode::Mixolydian => "mixolydian",
            KeyMode::Aeolian => "aeolian",
            KeyMode::Ionian => "ionian",
            KeyMode::Locrian => "locrian",
            KeyMode::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub line: usize,
    /// Position on the circle of fifths, -7 ..= 7
    pub fifths: i8,
    pub mode: Option<KeyMode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Time {
    pub line: usize,
    pub beats: u32,
    pub beat_type: u32,
    /// `<senza-misura>`: no measure length is enforced
    pub senza_misura: bool,
}

impl Time {
    pub fn new(beats: u32, beat_type: u32) -> Self {
        Self {
            line: 0,
            beats,
            beat_type,
            senza_misura: false,
        }
    }

    /// Nominal measure length, `None` without a meter
    pub fn measure_length(&self) -> Option<crate::models::WholeNotes> {
        if self.senza_misura {
            return None;
        }
        crate::models::WholeNotes::checked_new(self.beats as i64, self.beat_type as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarLineLocation {
    Left,
    Middle,
    Right,
}

impl BarLineLocation {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        match value.trim() {
            "left" => Some(BarLineLocation::Left),
            "middle" => Some(BarLineLocation::Middle),
            "right" => Some(BarLineLocation::Right),
            _ => None,
        }
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            BarLineLocation::Left => "left",
            BarLineLocation::Middle => "middle",
            BarLineLocation::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarStyle {
    Regular,
    Dotted,
    Dashed,
    Heavy,
    LightLight,
    LightHeavy,
    HeavyLight,
    HeavyHeavy,
    Tick,
    Short,
    None,
}

impl BarStyle {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        let style = match value.trim() {
            "regular" => BarStyle::Regular,
            "dotted" => BarStyle::Dotted,
            "dashed" => BarStyle::Dashed,
            "heavy" => BarStyle::Heavy,
            "light-light" => BarStyle::LightLight,
            "light-heavy" => BarStyle::LightHeavy,
            "heavy-light" => BarStyle::HeavyLight,
            "heavy-heavy" => BarStyle::HeavyHeavy,
            "tick" => BarStyle::Tick,
            "short" => BarStyle::Short,
            "none" => BarStyle::None,
            _ => return None,
        };
        Some(style)
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            BarStyle::Regular => "regular",
            BarStyle::Dotted => "dotted",
            BarStyle::Dashed => "dashed",
            BarStyle::Heavy => "heavy",
            BarStyle::LightLight => "light-light",
            BarStyle::LightHeavy => "light-heavy",
            BarStyle::HeavyLight => "heavy-light",
            BarStyle::HeavyHeavy => "heavy-heavy",
            BarStyle::Tick => "tick",
            BarStyle::Short => "short",
            BarStyle::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatDirection {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeat {
    pub direction: RepeatDirection,
    pub times: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndingType {
    Start,
    Stop,
    Discontinue,
}

impl EndingType {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        match value.trim() {
            "start" => Some(EndingType::Start),
            "stop" => Some(EndingType::Stop),
            "discontinue" => Some(EndingType::Discontinue),
            _ => None,
        }
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            EndingType::Start => "start",
            EndingType::Stop => "stop",
            EndingType::Discontinue => "discontinue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ending {
    /// Ending numbers as written, e.g. "1, 2"
    pub number: String,
    pub ending_type: EndingType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarLine {
    pub line: usize,
    pub location: BarLineLocation,
    pub style: Option<BarStyle>,
    pub repeat: Option<Repeat>,
    pub ending: Option<Ending>,
}

impl BarLine {
    pub fn forward_repeat() -> Self {
        Self {
            line: 0,
            location: BarLineLocation::Left,
            style: Some(BarStyle::HeavyLight),
            repeat: Some(Repeat {
                direction: RepeatDirection::Forward,
                times: None,
            }),
            ending: None,
        }
    }

    pub fn repeat_direction(&self) -> Option<RepeatDirection> {
        self.repeat.as_ref().map(|r| r.direction)
    }
}

/// Metronome mark: `beat_unit` (plus dots) = `per_minute`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tempo {
    pub line: usize,
    pub words: Option<String>,
    pub beat_unit: Option<NoteType>,
    pub beat_unit_dots: u8,
    pub per_minute: Option<u32>,
}
