//! Braille music cells
//!
//! Cells are six-dot patterns; dot `n` is bit `n - 1`. The tables below
//! follow the Music Braille Code for notes, rests, octave marks, accidentals
//! and the signs this crate writes.

use crate::ir::{ArticulationKind, BarStyle, ClefSign};
use crate::models::{AccidentalKind, NoteType, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrailleCell(u8);

impl BrailleCell {
    pub const SPACE: BrailleCell = BrailleCell(0);

    /// Cell from its dot numbers written as digits, e.g. `1456`
    pub const fn dots(mut digits: u32) -> Self {
        let mut bits = 0u8;
        while digits > 0 {
            let dot = digits % 10;
            if dot >= 1 && dot <= 6 {
                bits |= 1 << (dot - 1);
            }
            digits /= 10;
        }
        BrailleCell(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_space(self) -> bool {
        self.0 == 0
    }

    /// Unicode Braille pattern character
    pub fn to_char(self) -> char {
        char::from_u32(0x2800 + self.0 as u32).unwrap_or(' ')
    }
}

const fn cells<const N: usize>(digits: [u32; N]) -> [BrailleCell; N] {
    let mut out = [BrailleCell::SPACE; N];
    let mut i = 0;
    while i < N {
        out[i] = BrailleCell::dots(digits[i]);
        i += 1;
    }
    out
}

pub const DOT: BrailleCell = BrailleCell::dots(3);
pub const NUMBER_SIGN: BrailleCell = BrailleCell::dots(3456);
pub const MEASURE_SPACE: BrailleCell = BrailleCell::SPACE;
pub const TIE: [BrailleCell; 2] = cells([4, 14]);
pub const SLUR_OPEN: [BrailleCell; 2] = cells([56, 12]);
pub const SLUR_CLOSE: [BrailleCell; 2] = cells([45, 23]);
pub const WORD_SIGN: BrailleCell = BrailleCell::dots(345);
pub const TRIPLET: BrailleCell = BrailleCell::dots(23);
pub const TUPLET_PREFIX: BrailleCell = BrailleCell::dots(456);

/// Duration families: eighths and 128ths share cells, as do quarters and 64ths...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    WholeOr16th,
    HalfOr32nd,
    QuarterOr64th,
    EighthOr128th,
}

impl ValueClass {
    pub fn of(note_type: NoteType) -> Self {
        match note_type {
            NoteType::Maxima
            | NoteType::Long
            | NoteType::Breve
            | NoteType::Whole
            | NoteType::N16th
            | NoteType::N256th => ValueClass::WholeOr16th,
            NoteType::Half | NoteType::N32nd | NoteType::N512th => ValueClass::HalfOr32nd,
            NoteType::Quarter | NoteType::N64th | NoteType::N1024th => ValueClass::QuarterOr64th,
            NoteType::Eighth | NoteType::N128th => ValueClass::EighthOr128th,
        }
    }
}

/// Note cell: step in dots 1245, value in dots 3 and 6
pub fn note_cell(step: Step, note_type: NoteType) -> BrailleCell {
    let base = match step {
        Step::C => BrailleCell::dots(145),
        Step::D => BrailleCell::dots(15),
        Step::E => BrailleCell::dots(124),
        Step::F => BrailleCell::dots(1245),
        Step::G => BrailleCell::dots(125),
        Step::A => BrailleCell::dots(24),
        Step::B => BrailleCell::dots(245),
    };
    let value = match ValueClass::of(note_type) {
        ValueClass::EighthOr128th => 0,
        ValueClass::QuarterOr64th => BrailleCell::dots(6).0,
        ValueClass::HalfOr32nd => BrailleCell::dots(3).0,
        ValueClass::WholeOr16th => BrailleCell::dots(36).0,
    };
    BrailleCell(base.0 | value)
}

pub fn rest_cell(note_type: NoteType) -> BrailleCell {
    match ValueClass::of(note_type) {
        ValueClass::WholeOr16th => BrailleCell::dots(134),
        ValueClass::HalfOr32nd => BrailleCell::dots(136),
        ValueClass::QuarterOr64th => BrailleCell::dots(1236),
        ValueClass::EighthOr128th => BrailleCell::dots(1346),
    }
}

/// Octave mark, middle C starting octave 4
pub fn octave_mark(octave: i8) -> Vec<BrailleCell> {
    match octave {
        i8::MIN..=0 => cells([4, 4]).to_vec(),
        1 => vec![BrailleCell::dots(4)],
        2 => vec![BrailleCell::dots(45)],
        3 => vec![BrailleCell::dots(456)],
        4 => vec![BrailleCell::dots(5)],
        5 => vec![BrailleCell::dots(46)],
        6 => vec![BrailleCell::dots(56)],
        7 => vec![BrailleCell::dots(6)],
        _ => cells([6, 6]).to_vec(),
    }
}

const SHARP: BrailleCell = BrailleCell::dots(146);
const FLAT: BrailleCell = BrailleCell::dots(126);
const NATURAL: BrailleCell = BrailleCell::dots(16);

pub fn accidental(kind: AccidentalKind) -> Vec<BrailleCell> {
    let quarter = BrailleCell::dots(4);
    let three_quarters = BrailleCell::dots(456);
    match kind {
        AccidentalKind::Sharp => vec![SHARP],
        AccidentalKind::Flat => vec![FLAT],
        AccidentalKind::Natural => vec![NATURAL],
        AccidentalKind::DoubleSharp | AccidentalKind::SharpSharp => vec![SHARP, SHARP],
        AccidentalKind::FlatFlat => vec![FLAT, FLAT],
        AccidentalKind::NaturalSharp => vec![NATURAL, SHARP],
        AccidentalKind::NaturalFlat => vec![NATURAL, FLAT],
        AccidentalKind::QuarterSharp => vec![quarter, SHARP],
        AccidentalKind::QuarterFlat => vec![quarter, FLAT],
        AccidentalKind::ThreeQuartersSharp => vec![three_quarters, SHARP],
        AccidentalKind::ThreeQuartersFlat => vec![three_quarters, FLAT],
    }
}

/// Digit in the upper part of the cell, as after the number sign
pub fn upper_digit(digit: u32) -> BrailleCell {
    const UPPER: [BrailleCell; 10] = cells([245, 1, 12, 14, 145, 15, 124, 1245, 125, 24]);
    UPPER[(digit % 10) as usize]
}

/// Digit dropped to the lower part of the cell, for time signature denominators
pub fn lower_digit(digit: u32) -> BrailleCell {
    const LOWER: [BrailleCell; 10] = cells([356, 2, 23, 25, 256, 26, 235, 2356, 236, 35]);
    LOWER[(digit % 10) as usize]
}

fn digits_of(number: u32) -> Vec<u32> {
    number
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect()
}

pub fn upper_number(number: u32) -> Vec<BrailleCell> {
    digits_of(number).into_iter().map(upper_digit).collect()
}

pub fn lower_number(number: u32) -> Vec<BrailleCell> {
    digits_of(number).into_iter().map(lower_digit).collect()
}

pub fn time_signature(beats: u32, beat_type: u32) -> Vec<BrailleCell> {
    let mut out = vec![NUMBER_SIGN];
    out.extend(upper_number(beats));
    out.extend(lower_number(beat_type));
    out
}

/// Key signature: up to three signs repeated, else a count then the sign
pub fn key_signature(fifths: i8) -> Vec<BrailleCell> {
    let sign = if fifths >= 0 { SHARP } else { FLAT };
    let count = fifths.unsigned_abs() as u32;
    match count {
        0 => Vec::new(),
        1..=3 => vec![sign; count as usize],
        _ => {
            let mut out = vec![NUMBER_SIGN];
            out.extend(upper_number(count));
            out.push(sign);
            out
        }
    }
}

pub fn clef(sign: ClefSign) -> Option<Vec<BrailleCell>> {
    match sign {
        ClefSign::G => Some(cells([345, 34, 123]).to_vec()),
        ClefSign::F => Some(cells([345, 3456, 123]).to_vec()),
        ClefSign::C => Some(cells([345, 346, 123]).to_vec()),
        _ => None,
    }
}

pub fn bar_line(style: BarStyle) -> Option<Vec<BrailleCell>> {
    match style {
        BarStyle::LightHeavy | BarStyle::HeavyHeavy => Some(cells([126, 13]).to_vec()),
        BarStyle::LightLight | BarStyle::HeavyLight => Some(cells([126, 13, 3]).to_vec()),
        BarStyle::Dotted | BarStyle::Dashed => Some(cells([13]).to_vec()),
        _ => None,
    }
}

pub const FORWARD_REPEAT: [BrailleCell; 2] = cells([126, 2356]);
pub const BACKWARD_REPEAT: [BrailleCell; 2] = cells([126, 23]);

/// Interval sign for a chord member `steps` diatonic steps below the written note
pub fn interval(steps: u32) -> BrailleCell {
    match steps % 7 {
        1 => BrailleCell::dots(34),
        2 => BrailleCell::dots(346),
        3 => BrailleCell::dots(3456),
        4 => BrailleCell::dots(35),
        5 => BrailleCell::dots(356),
        6 => BrailleCell::dots(25),
        _ => BrailleCell::dots(36),
    }
}

pub fn tuplet(actual: u32) -> Vec<BrailleCell> {
    if actual == 3 {
        return vec![TRIPLET];
    }
    let mut out = vec![TUPLET_PREFIX];
    out.extend(upper_number(actual));
    out.push(DOT);
    out
}

pub fn grace(slashed: bool) -> Vec<BrailleCell> {
    if slashed {
        cells([5, 26]).to_vec()
    } else {
        cells([26]).to_vec()
    }
}

pub fn articulation(kind: ArticulationKind) -> Option<Vec<BrailleCell>> {
    let out = match kind {
        ArticulationKind::Staccato => cells([236]).to_vec(),
        ArticulationKind::Staccatissimo => cells([6, 236]).to_vec(),
        ArticulationKind::Tenuto => cells([456, 236]).to_vec(),
        ArticulationKind::Accent => cells([46, 236]).to_vec(),
        ArticulationKind::StrongAccent => cells([56, 236]).to_vec(),
        ArticulationKind::DetachedLegato => cells([5, 236]).to_vec(),
        ArticulationKind::Fermata => cells([126, 123]).to_vec(),
        ArticulationKind::BreathMark => cells([6, 34]).to_vec(),
        _ => return None,
    };
    Some(out)
}

/// Letters a to z, uncontracted
const LETTERS: [BrailleCell; 26] = cells([
    1, 12, 14, 145, 15, 124, 1245, 125, 24, 245, 13, 123, 134, 1345, 135, 1234, 12345, 1235, 234,
    2345, 136, 1236, 2456, 1346, 13456, 1356,
]);

/// Word sign then the letters of `text`; other characters are dropped
pub fn word(text: &str) -> Vec<BrailleCell> {
    let mut out = vec![WORD_SIGN];
    out.extend(
        text.chars()
            .filter(char::is_ascii_alphabetic)
            .map(|c| LETTERS[(c.to_ascii_lowercase() as u8 - b'a') as usize]),
    );
    out
}
