//! Exact musical durations
//!
//! Every length in the score tree is measured in whole notes and stored as a
//! reduced fraction, so sums of tuplet members or dotted values never drift:
//! three triplet eighths add up to exactly 1/4.
//!
//! - [`WholeNotes`]: a duration (sounding or display) in whole notes
//! - [`NoteType`]: the graphic note value written in the score (quarter, 16th, ...)
//! - [`DisplayDuration`]: a note type plus augmentation dots
//! - [`TupletFactor`]: the `actual : normal` ratio of a tuplet

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

/// Rational type used for all duration arithmetic
pub type Rational = Rational64;

// ============================================================================
// WHOLE NOTES
// ============================================================================

/// A duration expressed as an exact fraction of a whole note
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WholeNotes(Rational);

impl WholeNotes {
    /// The empty duration
    pub fn zero() -> Self {
        WholeNotes(Rational::from_integer(0))
    }

    /// Create a duration of `numerator / denominator` whole notes.
    ///
    /// Panics if `denominator` is zero; use [`WholeNotes::checked_new`] for
    /// values coming from input files.
    pub fn new(numerator: i64, denominator: i64) -> Self {
        WholeNotes(Rational::new(numerator, denominator))
    }

    /// Create a duration, returning `None` for a zero denominator
    pub fn checked_new(numerator: i64, denominator: i64) -> Option<Self> {
        if denominator == 0 {
            None
        } else {
            Some(Self::new(numerator, denominator))
        }
    }

    pub fn from_rational(value: Rational) -> Self {
        WholeNotes(value)
    }

    pub fn as_rational(&self) -> Rational {
        self.0
    }

    pub fn numer(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.0.denom()
    }

    pub fn is_zero(&self) -> bool {
        *self.0.numer() == 0
    }

    /// Convert a MusicXML `<duration>` value to whole notes.
    ///
    /// `divisions_per_quarter` is the current `<divisions>` value; a quarter
    /// note lasts that many divisions, so a whole note lasts four times as many.
    pub fn from_divisions(duration: i64, divisions_per_quarter: i64) -> Option<Self> {
        Self::checked_new(duration, divisions_per_quarter.checked_mul(4)?)
    }

    /// Convert back to MusicXML divisions, if the duration is a whole number of them
    pub fn to_divisions(&self, divisions_per_quarter: i64) -> Option<i64> {
        let scaled = self.0 * Rational::from_integer(divisions_per_quarter * 4);
        if scaled.is_integer() {
            Some(scaled.to_integer())
        } else {
            None
        }
    }

    /// Approximate value, for logging only
    pub fn to_f64(&self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }
}

impl Default for WholeNotes {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for WholeNotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.numer(), self.0.denom())
    }
}

/// Serialized as its "n/d" text so reports stay exact
impl Serialize for WholeNotes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Add for WholeNotes {
    type Output = WholeNotes;
    fn add(self, rhs: WholeNotes) -> WholeNotes {
        WholeNotes(self.0 + rhs.0)
    }
}

impl AddAssign for WholeNotes {
    fn add_assign(&mut self, rhs: WholeNotes) {
        self.0 += rhs.0;
    }
}

impl Sub for WholeNotes {
    type Output = WholeNotes;
    fn sub(self, rhs: WholeNotes) -> WholeNotes {
        WholeNotes(self.0 - rhs.0)
    }
}

impl SubAssign for WholeNotes {
    fn sub_assign(&mut self, rhs: WholeNotes) {
        self.0 -= rhs.0;
    }
}

impl Mul<Rational> for WholeNotes {
    type Output = WholeNotes;
    fn mul(self, rhs: Rational) -> WholeNotes {
        WholeNotes(self.0 * rhs)
    }
}

impl Div<Rational> for WholeNotes {
    type Output = WholeNotes;
    fn div(self, rhs: Rational) -> WholeNotes {
        WholeNotes(self.0 / rhs)
    }
}

impl Div for WholeNotes {
    type Output = Rational;
    fn div(self, rhs: WholeNotes) -> Rational {
        self.0 / rhs.0
    }
}

impl Sum for WholeNotes {
    fn sum<I: Iterator<Item = WholeNotes>>(iter: I) -> WholeNotes {
        iter.fold(WholeNotes::zero(), |acc, d| acc + d)
    }
}

// ============================================================================
// NOTE TYPES
// ============================================================================

/// Graphic note value, as written in MusicXML `<type>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NoteType {
    Maxima,
    Long,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    N16th,
    N32nd,
    N64th,
    N128th,
    N256th,
    N512th,
    N1024th,
}

impl NoteType {
    pub const ALL: [NoteType; 14] = [
        NoteType::Maxima,
        NoteType::Long,
        NoteType::Breve,
        NoteType::Whole,
        NoteType::Half,
        NoteType::Quarter,
        NoteType::Eighth,
        NoteType::N16th,
        NoteType::N32nd,
        NoteType::N64th,
        NoteType::N128th,
        NoteType::N256th,
        NoteType::N512th,
        NoteType::N1024th,
    ];

    /// Parse a MusicXML `<type>` value
    pub fn from_musicxml(name: &str) -> Option<Self> {
        let note_type = match name.trim() {
            "maxima" => NoteType::Maxima,
            "long" => NoteType::Long,
            "breve" => NoteType::Breve,
            "whole" => NoteType::Whole,
            "half" => NoteType::Half,
            "quarter" => NoteType::Quarter,
            "eighth" => NoteType::Eighth,
            "16th" => NoteType::N16th,
            "32nd" => NoteType::N32nd,
            "64th" => NoteType::N64th,
            "128th" => NoteType::N128th,
            "256th" => NoteType::N256th,
            "512th" => NoteType::N512th,
            "1024th" => NoteType::N1024th,
            _ => return None,
        };
        Some(note_type)
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            NoteType::Maxima => "maxima",
            NoteType::Long => "long",
            NoteType::Breve => "breve",
            NoteType::Whole => "whole",
            NoteType::Half => "half",
            NoteType::Quarter => "quarter",
            NoteType::Eighth => "eighth",
            NoteType::N16th => "16th",
            NoteType::N32nd => "32nd",
            NoteType::N64th => "64th",
            NoteType::N128th => "128th",
            NoteType::N256th => "256th",
            NoteType::N512th => "512th",
            NoteType::N1024th => "1024th",
        }
    }

    /// Binary exponent relative to the whole note: whole=0, half=1, quarter=2,
    /// breve=-1, long=-2, maxima=-3
    pub fn log(&self) -> i32 {
        match self {
            NoteType::Maxima => -3,
            NoteType::Long => -2,
            NoteType::Breve => -1,
            NoteType::Whole => 0,
            NoteType::Half => 1,
            NoteType::Quarter => 2,
            NoteType::Eighth => 3,
            NoteType::N16th => 4,
            NoteType::N32nd => 5,
            NoteType::N64th => 6,
            NoteType::N128th => 7,
            NoteType::N256th => 8,
            NoteType::N512th => 9,
            NoteType::N1024th => 10,
        }
    }

    /// Undotted length of this note value
    pub fn whole_notes(&self) -> WholeNotes {
        let log = self.log();
        if log >= 0 {
            WholeNotes::new(1, 1 << log)
        } else {
            WholeNotes::new(1 << (-log), 1)
        }
    }
}

/// Note type plus augmentation dots: the duration a reader sees on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayDuration {
    pub note_type: NoteType,
    pub dots: u8,
}

impl DisplayDuration {
    pub fn new(note_type: NoteType, dots: u8) -> Self {
        Self { note_type, dots }
    }

    /// Length including dots: base * (2 - 1/2^dots)
    pub fn whole_notes(&self) -> WholeNotes {
        let dots = self.dots.min(8) as i64;
        let multiplier = Rational::new((1 << (dots + 1)) - 1, 1 << dots);
        self.note_type.whole_notes() * multiplier
    }

    /// Find the note type and dot count (at most three dots) that spell `duration` exactly
    pub fn from_whole_notes(duration: WholeNotes) -> Option<Self> {
        for note_type in NoteType::ALL {
            for dots in 0..=3u8 {
                let candidate = DisplayDuration::new(note_type, dots);
                if candidate.whole_notes() == duration {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

impl fmt::Display for DisplayDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.note_type.musicxml_name(), ".".repeat(self.dots as usize))
    }
}

// ============================================================================
// TUPLET FACTOR
// ============================================================================

/// Tuplet ratio: `actual` notes are played in the time of `normal` notes.
///
/// Kept unreduced (6:4 stays 6:4) because the written numbers matter for
/// display; arithmetic goes through [`TupletFactor::as_rational`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupletFactor {
    pub actual: u32,
    pub normal: u32,
}

impl TupletFactor {
    pub fn new(actual: u32, normal: u32) -> Option<Self> {
        if actual == 0 || normal == 0 {
            None
        } else {
            Some(Self { actual, normal })
        }
    }

    pub fn identity() -> Self {
        Self { actual: 1, normal: 1 }
    }

    pub fn is_identity(&self) -> bool {
        self.actual == self.normal
    }

    /// Multiplier applied to display durations: normal / actual
    pub fn as_rational(&self) -> Rational {
        Rational::new(self.normal as i64, self.actual as i64)
    }

    /// Factor of a tuplet nested inside `self`, `None` when the numbers overflow
    pub fn compose(&self, inner: TupletFactor) -> Option<TupletFactor> {
        Some(TupletFactor {
            actual: self.actual.checked_mul(inner.actual)?,
            normal: self.normal.checked_mul(inner.normal)?,
        })
    }

    /// Build a factor from a `normal / actual` multiplier
    pub fn from_multiplier(multiplier: Rational) -> Option<Self> {
        let normal = u32::try_from(*multiplier.numer()).ok()?;
        let actual = u32::try_from(*multiplier.denom()).ok()?;
        Self::new(actual, normal)
    }
}

impl fmt::Display for TupletFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.actual, self.normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triplet_eighths_sum_to_quarter() {
        let eighth = DisplayDuration::new(NoteType::Eighth, 0).whole_notes();
        let factor = TupletFactor::new(3, 2).unwrap();
        let total: WholeNotes = (0..3).map(|_| eighth * factor.as_rational()).sum();
        assert_eq!(total, WholeNotes::new(1, 4));
    }

    #[test]
    fn test_dotted_values() {
        assert_eq!(DisplayDuration::new(NoteType::Quarter, 1).whole_notes(), WholeNotes::new(3, 8));
        assert_eq!(DisplayDuration::new(NoteType::Half, 2).whole_notes(), WholeNotes::new(7, 8));
        assert_eq!(DisplayDuration::new(NoteType::Breve, 0).whole_notes(), WholeNotes::new(2, 1));
    }

    #[test]
    fn test_from_whole_notes_finds_dotted_spelling() {
        let found = DisplayDuration::from_whole_notes(WholeNotes::new(3, 16)).unwrap();
        assert_eq!(found, DisplayDuration::new(NoteType::Eighth, 1));
        assert!(DisplayDuration::from_whole_notes(WholeNotes::new(1, 12)).is_none());
    }

    #[test]
    fn test_divisions_conversion_is_exact() {
        let d = WholeNotes::from_divisions(2, 6).unwrap();
        assert_eq!(d, WholeNotes::new(1, 12));
        assert_eq!(d.to_divisions(6), Some(2));
        assert_eq!(d.to_divisions(4), None);
        assert!(WholeNotes::from_divisions(1, 0).is_none());
    }

    #[test]
    fn test_nested_factor_composition() {
        let outer = TupletFactor::new(3, 2).unwrap();
        let inner = TupletFactor::new(5, 4).unwrap();
        let composed = outer.compose(inner).unwrap();
        assert_eq!(composed, TupletFactor { actual: 15, normal: 8 });
        assert_eq!(composed.as_rational(), outer.as_rational() * inner.as_rational());
        assert_eq!(
            TupletFactor::from_multiplier(Rational::new(4, 5)),
            Some(TupletFactor { actual: 5, normal: 4 })
        );
    }

    #[test]
    fn test_composition_overflow_is_refused() {
        let wide = TupletFactor::new(70000, 2).unwrap();
        assert_eq!(wide.compose(wide), None);
        let tall = TupletFactor::new(2, 70000).unwrap();
        assert_eq!(tall.compose(tall), None);
    }
}
