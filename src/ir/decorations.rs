//! Elements attached to notes
//!
//! A note keeps its decorations in one list sorted by [`DecorationKind::rank`],
//! which is also the order the visitor sees them in. Paired kinds (tie, slur,
//! wedge, spanner, ligature) carry the [`PairId`] of their shared [`Pair`]
//! once both ends are known.
//!
//! [`Pair`]: super::links::Pair

use serde::{Deserialize, Serialize};

use super::links::{PairId, PairKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Above,
    Below,
}

impl Placement {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        match value.trim() {
            "above" => Some(Placement::Above),
            "below" => Some(Placement::Below),
            _ => None,
        }
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            Placement::Above => "above",
            Placement::Below => "below",
        }
    }
}

/// Which end of a paired construct a decoration is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairRole {
    Start,
    Continue,
    Stop,
}

impl PairRole {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        match value.trim() {
            "start" => Some(PairRole::Start),
            "continue" => Some(PairRole::Continue),
            "stop" => Some(PairRole::Stop),
            _ => None,
        }
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            PairRole::Start => "start",
            PairRole::Continue => "continue",
            PairRole::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StemDirection {
    Up,
    Down,
    Double,
    None,
}

impl StemDirection {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        let direction = match value.trim() {
            "up" => StemDirection::Up,
            "down" => StemDirection::Down,
            "double" => StemDirection::Double,
            "none" => StemDirection::None,
            _ => return None,
        };
        Some(direction)
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            StemDirection::Up => "up",
            StemDirection::Down => "down",
            StemDirection::Double => "double",
            StemDirection::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeamValue {
    Begin,
    Continue,
    End,
    ForwardHook,
    BackwardHook,
}

impl BeamValue {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        let beam = match value.trim() {
            "begin" => BeamValue::Begin,
            "continue" => BeamValue::Continue,
            "end" => BeamValue::End,
            "forward hook" => BeamValue::ForwardHook,
            "backward hook" => BeamValue::BackwardHook,
            _ => return None,
        };
        Some(beam)
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            BeamValue::Begin => "begin",
            BeamValue::Continue => "continue",
            BeamValue::End => "end",
            BeamValue::ForwardHook => "forward hook",
            BeamValue::BackwardHook => "backward hook",
        }
    }
}

macro_rules! musicxml_names {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $xml:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_musicxml(value: &str) -> Option<Self> {
                match value.trim() {
                    $($xml => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn musicxml_name(&self) -> &'static str {
                match self {
                    $($name::$variant => $xml),+
                }
            }
        }
    };
}

musicxml_names!(
    /// Children of `<articulations>`, plus `<fermata>` from `<notations>`
    ArticulationKind {
        Accent => "accent",
        StrongAccent => "strong-accent",
        Staccato => "staccato",
        Staccatissimo => "staccatissimo",
        Tenuto => "tenuto",
        DetachedLegato => "detached-legato",
        Spiccato => "spiccato",
        BreathMark => "breath-mark",
        Caesura => "caesura",
        Fermata => "fermata",
    }
);

musicxml_names!(
    /// Children of `<technical>`
    TechnicalKind {
        UpBow => "up-bow",
        DownBow => "down-bow",
        Harmonic => "harmonic",
        OpenString => "open-string",
        ThumbPosition => "thumb-position",
        Fingering => "fingering",
        Pluck => "pluck",
        String => "string",
        Fret => "fret",
        Stopped => "stopped",
        SnapPizzicato => "snap-pizzicato",
    }
);

musicxml_names!(
    /// Children of `<ornaments>`
    OrnamentKind {
        TrillMark => "trill-mark",
        Turn => "turn",
        InvertedTurn => "inverted-turn",
        DelayedTurn => "delayed-turn",
        Mordent => "mordent",
        InvertedMordent => "inverted-mordent",
        Shake => "shake",
        Schleifer => "schleifer",
        Tremolo => "tremolo",
    }
);

musicxml_names!(
    /// Children of `<dynamics>`
    DynamicKind {
        PPPPP => "ppppp",
        PPPP => "pppp",
        PPP => "ppp",
        PP => "pp",
        P => "p",
        MP => "mp",
        MF => "mf",
        F => "f",
        FF => "ff",
        FFF => "fff",
        FFFF => "ffff",
        FFFFF => "fffff",
        FP => "fp",
        FZ => "fz",
        RF => "rf",
        RFZ => "rfz",
        SF => "sf",
        SFP => "sfp",
        SFPP => "sfpp",
        SFZ => "sfz",
        SFFZ => "sffz",
    }
);

musicxml_names!(
    /// Dashes and wavy lines: spanners that are not slurs, wedges or ligatures
    SpannerKind {
        Dashes => "dashes",
        WavyLine => "wavy-line",
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WedgeKind {
    Crescendo,
    Diminuendo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PedalKind {
    Start,
    Stop,
    Change,
    Continue,
}

impl PedalKind {
    pub fn from_musicxml(value: &str) -> Option<Self> {
        match value.trim() {
            "start" => Some(PedalKind::Start),
            "stop" => Some(PedalKind::Stop),
            "change" => Some(PedalKind::Change),
            "continue" => Some(PedalKind::Continue),
            _ => None,
        }
    }

    pub fn musicxml_name(&self) -> &'static str {
        match self {
            PedalKind::Start => "start",
            PedalKind::Stop => "stop",
            PedalKind::Change => "change",
            PedalKind::Continue => "continue",
        }
    }
}

/// What a decoration is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecorationKind {
    Stem(StemDirection),
    Beam {
        number: u8,
        value: BeamValue,
    },
    Articulation(ArticulationKind),
    Spanner {
        kind: SpannerKind,
        role: PairRole,
        number: u32,
        pair: Option<PairId>,
    },
    Technical {
        kind: TechnicalKind,
        /// Fingering digit, string number, fret...
        text: Option<String>,
    },
    Ornament(OrnamentKind),
    Glissando {
        role: PairRole,
        number: u32,
        text: Option<String>,
    },
    Tie {
        role: PairRole,
        pair: Option<PairId>,
    },
    Dynamic(DynamicKind),
    Words(String),
    Slur {
        role: PairRole,
        number: u32,
        pair: Option<PairId>,
    },
    Ligature {
        role: PairRole,
        number: u32,
        pair: Option<PairId>,
    },
    Pedal(PedalKind),
    Wedge {
        /// Known on the start end, copied to the stop end when linked
        kind: WedgeKind,
        role: PairRole,
        number: u32,
        pair: Option<PairId>,
    },
}

impl DecorationKind {
    /// Position in the note's traversal order
    pub fn rank(&self) -> u8 {
        match self {
            DecorationKind::Stem(_) => 0,
            DecorationKind::Beam { .. } => 1,
            DecorationKind::Articulation(_) => 2,
            DecorationKind::Spanner { .. } => 3,
            DecorationKind::Technical { .. } => 4,
            DecorationKind::Ornament(_) => 5,
            DecorationKind::Glissando { .. } => 6,
            DecorationKind::Tie { .. } => 7,
            DecorationKind::Dynamic(_) => 8,
            DecorationKind::Words(_) => 9,
            DecorationKind::Slur { .. } => 10,
            DecorationKind::Ligature { .. } => 11,
            DecorationKind::Pedal(_) => 12,
            DecorationKind::Wedge { .. } => 13,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DecorationKind::Stem(_) => "stem",
            DecorationKind::Beam { .. } => "beam",
            DecorationKind::Articulation(_) => "articulation",
            DecorationKind::Spanner { .. } => "spanner",
            DecorationKind::Technical { .. } => "technical",
            DecorationKind::Ornament(_) => "ornament",
            DecorationKind::Glissando { .. } => "glissando",
            DecorationKind::Tie { .. } => "tie",
            DecorationKind::Dynamic(_) => "dynamic",
            DecorationKind::Words(_) => "words",
            DecorationKind::Slur { .. } => "slur",
            DecorationKind::Ligature { .. } => "ligature",
            DecorationKind::Pedal(_) => "pedal",
            DecorationKind::Wedge { .. } => "wedge",
        }
    }

    /// Paired kind, role and number of this decoration (ties always use number 0)
    pub fn pairing(&self) -> Option<(PairKind, PairRole, u32)> {
        match *self {
            DecorationKind::Tie { role, .. } => Some((PairKind::Tie, role, 0)),
            DecorationKind::Slur { role, number, .. } => Some((PairKind::Slur, role, number)),
            DecorationKind::Wedge { role, number, .. } => Some((PairKind::Wedge, role, number)),
            DecorationKind::Spanner { role, number, .. } => {
                Some((PairKind::Spanner, role, number))
            }
            DecorationKind::Ligature { role, number, .. } => {
                Some((PairKind::Ligature, role, number))
            }
            _ => None,
        }
    }

    pub fn pair(&self) -> Option<PairId> {
        match *self {
            DecorationKind::Tie { pair, .. }
            | DecorationKind::Slur { pair, .. }
            | DecorationKind::Wedge { pair, .. }
            | DecorationKind::Spanner { pair, .. }
            | DecorationKind::Ligature { pair, .. } => pair,
            _ => None,
        }
    }

    pub(crate) fn set_pair(&mut self, id: PairId) {
        match self {
            DecorationKind::Tie { pair, .. }
            | DecorationKind::Slur { pair, .. }
            | DecorationKind::Wedge { pair, .. }
            | DecorationKind::Spanner { pair, .. }
            | DecorationKind::Ligature { pair, .. } => *pair = Some(id),
            _ => {}
        }
    }
}

/// A decoration attached to one note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub line: usize,
    pub placement: Option<Placement>,
    pub kind: DecorationKind,
}

impl Decoration {
    pub fn new(line: usize, kind: DecorationKind) -> Self {
        Self {
            line,
            placement: None,
            kind,
        }
    }

    pub fn with_placement(mut self, placement: Option<Placement>) -> Self {
        self.placement = placement;
        self
    }

    pub fn rank(&self) -> u8 {
        self.kind.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_follows_traversal_order() {
        let stem = DecorationKind::Stem(StemDirection::Up);
        let tie = DecorationKind::Tie {
            role: PairRole::Start,
            pair: None,
        };
        let wedge = DecorationKind::Wedge {
            kind: WedgeKind::Crescendo,
            role: PairRole::Start,
            number: 1,
            pair: None,
        };
        assert!(stem.rank() < tie.rank());
        assert!(tie.rank() < wedge.rank());
    }

    #[test]
    fn test_generated_name_tables() {
        assert_eq!(DynamicKind::from_musicxml("sfz"), Some(DynamicKind::SFZ));
        assert_eq!(DynamicKind::MF.musicxml_name(), "mf");
        assert_eq!(
            ArticulationKind::from_musicxml("strong-accent"),
            Some(ArticulationKind::StrongAccent)
        );
        assert_eq!(OrnamentKind::ALL.len(), 9);
        assert!(TechnicalKind::from_musicxml("bogus").is_none());
    }

    #[test]
    fn test_pairing_of_ties_uses_number_zero() {
        let tie = DecorationKind::Tie {
            role: PairRole::Stop,
            pair: None,
        };
        assert_eq!(tie.pairing(), Some((PairKind::Tie, PairRole::Stop, 0)));
        assert!(DecorationKind::Words("dolce".into()).pairing().is_none());
    }
}
