//! Pitches, alterations and written accidentals

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diatonic step (C=0 ... B=6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub fn from_musicxml(name: &str) -> Option<Self> {
        let step = match name.trim() {
            "C" => Step::C,
            "D" => Step::D,
            "E" => Step::E,
            "F" => Step::F,
            "G" => Step::G,
            "A" => Step::A,
            "B" => Step::B,
            _ => return None,
        };
        Some(step)
    }

    pub fn letter(&self) -> &'static str {
        match self {
            Step::C => "C",
            Step::D => "D",
            Step::E => "E",
            Step::F => "F",
            Step::G => "G",
            Step::A => "A",
            Step::B => "B",
        }
    }

    /// Index 0-6 from C
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Semitones above C in the natural scale
    pub fn semitones(&self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }
}

/// Chromatic alteration in quarter-tone steps, as found in MusicXML `<alter>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Alteration {
    DoubleFlat,
    ThreeQuartersFlat,
    Flat,
    QuarterFlat,
    Natural,
    QuarterSharp,
    Sharp,
    ThreeQuartersSharp,
    DoubleSharp,
}

impl Alteration {
    /// Map a semitone offset (-2.0 ..= 2.0 in steps of 0.5) to an alteration
    pub fn from_semitones(semitones: f32) -> Option<Self> {
        let quarters = (semitones * 2.0).round() as i32;
        if ((quarters as f32) / 2.0 - semitones).abs() > 0.01 {
            return None;
        }
        let alteration = match quarters {
            -4 => Alteration::DoubleFlat,
            -3 => Alteration::ThreeQuartersFlat,
            -2 => Alteration::Flat,
            -1 => Alteration::QuarterFlat,
            0 => Alteration::Natural,
            1 => Alteration::QuarterSharp,
            2 => Alteration::Sharp,
            3 => Alteration::ThreeQuartersSharp,
            4 => Alteration::DoubleSharp,
            _ => return None,
        };
        Some(alteration)
    }

    /// Offset in quarter tones (-4 ..= 4)
    pub fn quarter_tones(&self) -> i32 {
        match self {
            Alteration::DoubleFlat => -4,
            Alteration::ThreeQuartersFlat => -3,
            Alteration::Flat => -2,
            Alteration::QuarterFlat => -1,
            Alteration::Natural => 0,
            Alteration::QuarterSharp => 1,
            Alteration::Sharp => 2,
            Alteration::ThreeQuartersSharp => 3,
            Alteration::DoubleSharp => 4,
        }
    }

    /// MusicXML `<alter>` text, `None` for naturals
    pub fn musicxml_alter(&self) -> Option<String> {
        match self.quarter_tones() {
            0 => None,
            q if q % 2 == 0 => Some(format!("{}", q / 2)),
            q => Some(format!("{:.1}", q as f32 / 2.0)),
        }
    }
}

/// A sounding pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub step: Step,
    pub alteration: Alteration,
    /// Scientific octave, middle C is C4
    pub octave: i8,
}

impl Pitch {
    pub fn new(step: Step, alteration: Alteration, octave: i8) -> Self {
        Self { step, alteration, octave }
    }

    pub fn natural(step: Step, octave: i8) -> Self {
        Self::new(step, Alteration::Natural, octave)
    }

    /// Diatonic position counted in steps from C0, used for interval sizes
    pub fn diatonic_number(&self) -> i32 {
        self.octave as i32 * 7 + self.step.index() as i32
    }

    /// Position in quarter tones from C0, used for tie matching and ordering
    pub fn quarter_tone_number(&self) -> i32 {
        (self.octave as i32 * 12 + self.step.semitones()) * 2 + self.alteration.quarter_tones()
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accidental = match self.alteration {
            Alteration::DoubleFlat => "bb",
            Alteration::ThreeQuartersFlat => "b-",
            Alteration::Flat => "b",
            Alteration::QuarterFlat => "-",
            Alteration::Natural => "",
            Alteration::QuarterSharp => "+",
            Alteration::Sharp => "#",
            Alteration::ThreeQuartersSharp => "#+",
            Alteration::DoubleSharp => "##",
        };
        write!(f, "{}{}{}", self.step.letter(), accidental, self.octave)
    }
}

/// Written accidental sign (MusicXML `<accidental>`), independent of the pitch alteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccidentalKind {
    Sharp,
    Natural,
    Flat,
    DoubleSharp,
    SharpSharp,
    FlatFlat,
    NaturalSharp,
    NaturalFlat,
    QuarterFlat,
    QuarterSharp,
    ThreeQuartersFlat,
    ThreeQuartersSharp,
}

impl AccidentalKind {
    pub fn from_musicxml(name: &str) -> Option<Self> {
        let kind = match name.trim() {
            "sharp" => AccidentalKind::Sharp,
            "natural" => AccidentalKind::Natural,
            "flat" => AccidentalKind::Flat,
            "double-sharp" => AccidentalKind::DoubleSharp,
            "sharp-sharp" => AccidentalKind::SharpSharp,
            "flat-flat" => AccidentalKind::FlatFlat,
            "natural-sharp" => AccidentalKind::NaturalSharp,
            "natural-flat" => AccidentalKind::NaturalFlat,
            "quarter-flat" => AccidentalKind::QuarterFlat,
            "quarter-sharp" => AccidentalKind::QuarterSharp,
            "three-quarters-flat" => AccidentalKind::ThreeQuartersFlat,
            "three-quarters-sharp" => AccidentalKind::ThreeQuartersSharp,
            _ => return None,
        };
        Some(kind)
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            AccidentalKind::Sharp => "sharp",
            AccidentalKind::Natural => "natural",
            AccidentalKind::Flat => "flat",
            AccidentalKind::DoubleSharp => "double-sharp",
            AccidentalKind::SharpSharp => "sharp-sharp",
            AccidentalKind::FlatFlat => "flat-flat",
            AccidentalKind::NaturalSharp => "natural-sharp",
            AccidentalKind::NaturalFlat => "natural-flat",
            AccidentalKind::QuarterFlat => "quarter-flat",
            AccidentalKind::QuarterSharp => "quarter-sharp",
            AccidentalKind::ThreeQuartersFlat => "three-quarters-flat",
            AccidentalKind::ThreeQuartersSharp => "three-quarters-sharp",
        }
    }
}
