//! Score tree → LilyPond-oriented tree (LPSR)
//!
//! [`LpsrBuilder`] browses the score tree once. Notes and chords are turned
//! into music items when the visitor reaches them; their grace notes are read
//! from the tree at that point, so grace notes groups met later in the
//! traversal are skipped. Chord beams and slurs come from the chord's
//! [`ChordBeamLink`] and [`ChordSlurLink`] callbacks, never from the members.

mod types;


pub use types::{
    LpsrChord, LpsrChordMember, LpsrDuration, LpsrEvent, LpsrGroupItem, LpsrHeader, LpsrMeasure,
    LpsrMusic, LpsrNote, LpsrNoteKind, LpsrPart, LpsrPartGroup, LpsrScore, LpsrStaff, LpsrTempo,
    LpsrVoice,
};

use log::debug;
use once_cell::sync::Lazy;

use super::measure_displayed_length;
use crate::context::RunContext;
use crate::ir::{
    BarLine, BarStyle, BeamValue, Chord, ChordBeamLink, ChordId, ChordSlurLink, Clef, ClefSign,
    Decoration, DecorationKind, GraceMember, GraceNotesGroup, GraceNotesGroupId, Idx, Key,
    KeyMode, Measure, Note, NoteId, NoteKind, PairRole, Part, PartGroup, RepeatDirection, Score,
    ScoreTree, SpannerKind, Staff, Tempo, Time, Tuplet, Visitor, Voice,
};
use crate::models::{Alteration, Pitch, Step};

/// Build the LPSR tree of a score tree
pub fn score_to_lpsr(tree: &ScoreTree, context: &mut RunContext) -> LpsrScore {
    let mut builder = LpsrBuilder::new(context);
    tree.browse(&mut builder);
    builder.finish()
}

/// Major-key tonics by circle-of-fifths position, from -8 (F flat) to 12 (B sharp)
static TONICS: Lazy<Vec<Pitch>> = Lazy::new(|| {
    use Alteration::{Flat, Natural, Sharp};
    [
        (Step::F, Flat),
        (Step::C, Flat),
        (Step::G, Flat),
        (Step::D, Flat),
        (Step::A, Flat),
        (Step::E, Flat),
        (Step::B, Flat),
        (Step::F, Natural),
        (Step::C, Natural),
        (Step::G, Natural),
        (Step::D, Natural),
        (Step::A, Natural),
        (Step::E, Natural),
        (Step::B, Natural),
        (Step::F, Sharp),
        (Step::C, Sharp),
        (Step::G, Sharp),
        (Step::D, Sharp),
        (Step::A, Sharp),
        (Step::E, Sharp),
        (Step::B, Sharp),
    ]
    .into_iter()
    .map(|(step, alteration)| Pitch::new(step, alteration, 4))
    .collect()
});

/// Tonic of a key signature in the given mode
pub fn key_tonic(fifths: i8, mode: KeyMode) -> Pitch {
    let offset = match mode {
        KeyMode::Major | KeyMode::Ionian | KeyMode::None => 0,
        KeyMode::Minor | KeyMode::Aeolian => 3,
        KeyMode::Dorian => 2,
        KeyMode::Phrygian => 4,
        KeyMode::Lydian => -1,
        KeyMode::Mixolydian => 1,
        KeyMode::Locrian => 5,
    };
    let index = (fifths as i32 + offset + 8).clamp(0, TONICS.len() as i32 - 1) as usize;
    TONICS[index]
}

/// LilyPond clef name, `None` for clefs LilyPond cannot draw
pub fn clef_name(clef: &Clef) -> Option<String> {
    let base = match (clef.sign, clef.staff_line) {
        (ClefSign::G, Some(1)) => "french",
        (ClefSign::G, _) => "treble",
        (ClefSign::F, Some(3)) => "varbaritone",
        (ClefSign::F, Some(5)) => "subbass",
        (ClefSign::F, _) => "bass",
        (ClefSign::C, Some(1)) => "soprano",
        (ClefSign::C, Some(2)) => "mezzosoprano",
        (ClefSign::C, Some(4)) => "tenor",
        (ClefSign::C, Some(5)) => "baritone",
        (ClefSign::C, _) => "alto",
        (ClefSign::Percussion, _) => "percussion",
        (ClefSign::Tab, _) => "tab",
        (ClefSign::None, _) => return None,
    };
    let name = match clef.octave_change {
        0 => base.to_string(),
        -1 => format!("{}_8", base),
        -2 => format!("{}_15", base),
        1 => format!("{}^8", base),
        2 => format!("{}^15", base),
        _ => base.to_string(),
    };
    Some(name)
}

/// `\bar` glyph of a bar line, `None` when nothing needs to be written
pub fn bar_glyph(bar_line: &BarLine) -> Option<&'static str> {
    match bar_line.repeat_direction() {
        Some(RepeatDirection::Forward) => return Some(".|:"),
        Some(RepeatDirection::Backward) => return Some(":|."),
        None => {}
    }
    match bar_line.style? {
        BarStyle::Regular => None,
        BarStyle::Dotted => Some(";"),
        BarStyle::Dashed => Some("!"),
        BarStyle::Heavy => Some("."),
        BarStyle::LightLight => Some("||"),
        BarStyle::LightHeavy => Some("|."),
        BarStyle::HeavyLight => Some(".|"),
        BarStyle::HeavyHeavy => Some(".."),
        BarStyle::Tick => Some("'"),
        BarStyle::Short => Some(","),
        BarStyle::None => Some(""),
    }
}

struct GroupFrame {
    implicit: bool,
    group: LpsrPartGroup,
}

/// Visitor assembling an [`LpsrScore`]
pub struct LpsrBuilder<'c> {
    context: &'c mut RunContext,
    header: LpsrHeader,
    items: Vec<LpsrGroupItem>,
    groups: Vec<GroupFrame>,
    part: Option<LpsrPart>,
    staff: Option<LpsrStaff>,
    voice: Option<LpsrVoice>,
    measure: Option<LpsrMeasure>,
    /// The measure's music first, then one container per open tuplet
    music: Vec<Vec<LpsrMusic>>,
    chord: Option<LpsrChord>,
    chord_grace_after: Option<GraceNotesGroupId>,
    grace_depth: usize,
    /// Timed content of a coalesced measure is replaced by one multiple rest
    in_multiple_rest: bool,
    pending_multiple_rest: Option<LpsrMusic>,
}

impl<'c> LpsrBuilder<'c> {
    pub fn new(context: &'c mut RunContext) -> Self {
        Self {
            context,
            header: LpsrHeader::default(),
            items: Vec::new(),
            groups: Vec::new(),
            part: None,
            staff: None,
            voice: None,
            measure: None,
            music: Vec::new(),
            chord: None,
            chord_grace_after: None,
            grace_depth: 0,
            in_multiple_rest: false,
            pending_multiple_rest: None,
        }
    }

    pub fn finish(self) -> LpsrScore {
        LpsrScore {
            header: self.header,
            items: self.items,
        }
    }

    fn target_items(&mut self) -> &mut Vec<LpsrGroupItem> {
        match self.groups.last_mut() {
            Some(frame) => &mut frame.group.items,
            None => &mut self.items,
        }
    }

    fn push_music(&mut self, line: usize, music: LpsrMusic) {
        match self.music.last_mut() {
            Some(container) => container.push(music),
            None => self.context.fault(line, "music item outside of a measure"),
        }
    }

    /// Timed content is converted only outside grace notes and multiple rests
    fn converts_timed(&self) -> bool {
        self.grace_depth == 0 && !self.in_multiple_rest
    }
}

// ============================================================================
// NOTES AND CHORDS
// ============================================================================

fn duration_of(note: &Note) -> LpsrDuration {
    match note.display {
        Some(display) => LpsrDuration::new(display.note_type, display.dots),
        None => LpsrDuration::of_length(note.sounding),
    }
}

/// Events of one decoration; beams and slurs only when `with_beams_and_slurs`
fn decoration_event(decoration: &Decoration, with_beams_and_slurs: bool) -> Option<LpsrEvent> {
    let event = match &decoration.kind {
        DecorationKind::Stem(direction) => LpsrEvent::Stem(*direction),
        DecorationKind::Beam { number: 1, value } if with_beams_and_slurs => {
            return beam_event(*value);
        }
        DecorationKind::Beam { .. } => return None,
        DecorationKind::Slur { role, number, .. } if with_beams_and_slurs => match role {
            PairRole::Start => LpsrEvent::SlurStart(*number),
            PairRole::Stop => LpsrEvent::SlurStop(*number),
            PairRole::Continue => return None,
        },
        DecorationKind::Slur { .. } => return None,
        DecorationKind::Articulation(kind) => LpsrEvent::Articulation(*kind),
        DecorationKind::Technical { kind, text } => LpsrEvent::Technical {
            kind: *kind,
            text: text.clone(),
        },
        DecorationKind::Ornament(kind) => LpsrEvent::Ornament(*kind),
        DecorationKind::Glissando {
            role: PairRole::Start,
            ..
        } => LpsrEvent::Glissando,
        DecorationKind::Glissando { .. } => return None,
        DecorationKind::Tie {
            role: PairRole::Start,
            ..
        } => LpsrEvent::Tie,
        DecorationKind::Tie { .. } => return None,
        DecorationKind::Dynamic(kind) => LpsrEvent::Dynamic(*kind),
        DecorationKind::Words(text) => LpsrEvent::Words {
            text: text.clone(),
            placement: decoration.placement,
        },
        DecorationKind::Ligature { role, .. } => match role {
            PairRole::Start => LpsrEvent::LigatureStart,
            PairRole::Stop => LpsrEvent::LigatureStop,
            PairRole::Continue => return None,
        },
        DecorationKind::Pedal(kind) => LpsrEvent::Pedal(*kind),
        DecorationKind::Wedge { kind, role, .. } => match role {
            PairRole::Start => LpsrEvent::WedgeStart(*kind),
            PairRole::Stop => LpsrEvent::WedgeStop,
            PairRole::Continue => return None,
        },
        DecorationKind::Spanner { kind, role, .. } => match (kind, role) {
            (SpannerKind::Dashes, PairRole::Start) => LpsrEvent::TextSpanStart,
            (SpannerKind::Dashes, PairRole::Stop) => LpsrEvent::TextSpanStop,
            (SpannerKind::WavyLine, PairRole::Start) => LpsrEvent::TrillSpanStart,
            (SpannerKind::WavyLine, PairRole::Stop) => LpsrEvent::TrillSpanStop,
            (_, PairRole::Continue) => return None,
        },
    };
    Some(event)
}

fn beam_event(value: BeamValue) -> Option<LpsrEvent> {
    match value {
        BeamValue::Begin => Some(LpsrEvent::BeamStart),
        BeamValue::End => Some(LpsrEvent::BeamStop),
        _ => None,
    }
}

fn plain_note(note: &Note) -> LpsrNote {
    let kind = match note.kind {
        NoteKind::Pitched(pitch) => LpsrNoteKind::Pitched(pitch),
        NoteKind::Rest { .. } if note.measure_rest => LpsrNoteKind::MeasureRest,
        NoteKind::Rest { display } => LpsrNoteKind::Rest { position: display },
        NoteKind::Unpitched { display } => LpsrNoteKind::Unpitched { position: display },
        NoteKind::Skip => LpsrNoteKind::Skip,
    };
    LpsrNote {
        kind,
        duration: duration_of(note),
        forced_accidental: note.accidental.is_some(),
        events: note
            .decorations
            .iter()
            .filter_map(|d| decoration_event(d, true))
            .collect(),
    }
}

/// Chord with every member decoration except ties, which stay per member.
///
/// Beams and slurs are included only when the chord's links will not be
/// visited, i.e. for chords inside grace notes groups.
fn chord_body(tree: &ScoreTree, chord: ChordId, with_beams_and_slurs: bool) -> LpsrChord {
    let c = tree.chord(chord);
    let mut members = Vec::new();
    let mut events: Vec<LpsrEvent> = Vec::new();
    for &id in &c.notes {
        let note = tree.note(id);
        let pitch = match note.kind {
            NoteKind::Pitched(pitch) => pitch,
            NoteKind::Unpitched {
                display: Some(pitch),
            } => pitch,
            _ => {
                debug!("non-pitched chord member {:?} dropped", id);
                continue;
            }
        };
        let mut tie = false;
        for decoration in &note.decorations {
            match decoration_event(decoration, with_beams_and_slurs) {
                Some(LpsrEvent::Tie) => tie = true,
                Some(event) if !events.contains(&event) => events.push(event),
                _ => {}
            }
        }
        members.push(LpsrChordMember {
            pitch,
            forced_accidental: note.accidental.is_some(),
            tie,
        });
    }
    let duration = match c.display {
        Some(display) => LpsrDuration::new(display.note_type, display.dots),
        None => LpsrDuration::of_length(c.sounding),
    };
    LpsrChord {
        members,
        duration,
        events,
    }
}

fn grace_music(tree: &ScoreTree, group: GraceNotesGroupId) -> Vec<LpsrMusic> {
    tree.grace_group(group)
        .members
        .iter()
        .map(|member| match *member {
            GraceMember::Note(n) => LpsrMusic::Note(plain_note(tree.note(n))),
            GraceMember::Chord(c) => LpsrMusic::Chord(chord_body(tree, c, true)),
        })
        .collect()
}

fn grace_prefix(tree: &ScoreTree, group: GraceNotesGroupId) -> LpsrMusic {
    LpsrMusic::Grace {
        slashed: tree.grace_group(group).slashed,
        music: grace_music(tree, group),
    }
}

fn with_grace_after(tree: &ScoreTree, main: LpsrMusic, group: Option<GraceNotesGroupId>) -> LpsrMusic {
    match group {
        Some(group) => LpsrMusic::AfterGrace {
            main: Box::new(main),
            grace: grace_music(tree, group),
        },
        None => main,
    }
}

// ============================================================================
// VISITOR
// ============================================================================

impl Visitor for LpsrBuilder<'_> {
    fn visit_score_start(&mut self, _tree: &ScoreTree, score: &Score) {
        let identification = &score.identification;
        let join = |values: &[String]| (!values.is_empty()).then(|| values.join(", "));
        self.header = LpsrHeader {
            title: identification.title().map(str::to_string),
            subtitle: identification
                .work_title
                .as_ref()
                .and(identification.movement_title.clone()),
            composer: join(&identification.composers),
            arranger: join(&identification.arrangers),
            copyright: join(&identification.rights),
        };
    }

    fn visit_part_group_start(&mut self, _tree: &ScoreTree, _id: Idx<PartGroup>, group: &PartGroup) {
        self.groups.push(GroupFrame {
            implicit: group.implicit,
            group: LpsrPartGroup {
                name: group.name.clone(),
                symbol: group.symbol,
                items: Vec::new(),
            },
        });
    }

    fn visit_part_group_end(&mut self, _tree: &ScoreTree, _id: Idx<PartGroup>, group: &PartGroup) {
        let Some(frame) = self.groups.pop() else {
            self.context.fault(group.line, "part group end without a start");
            return;
        };
        if frame.implicit {
            self.target_items().extend(frame.group.items);
        } else {
            self.target_items().push(LpsrGroupItem::Group(frame.group));
        }
    }

    fn visit_part_start(&mut self, _tree: &ScoreTree, _id: Idx<Part>, part: &Part) {
        self.part = Some(LpsrPart {
            id: part.id.clone(),
            name: part.display_name().to_string(),
            abbreviation: part.abbreviation.clone(),
            staves: Vec::new(),
        });
    }

    fn visit_part_end(&mut self, _tree: &ScoreTree, _id: Idx<Part>, part: &Part) {
        match self.part.take() {
            Some(lpsr_part) => self.target_items().push(LpsrGroupItem::Part(lpsr_part)),
            None => self.context.fault(part.line, "part end without a start"),
        }
    }

    fn visit_staff_start(&mut self, _tree: &ScoreTree, _id: Idx<Staff>, staff: &Staff) {
        self.staff = Some(LpsrStaff {
            number: staff.number,
            voices: Vec::new(),
        });
    }

    fn visit_staff_end(&mut self, _tree: &ScoreTree, _id: Idx<Staff>, staff: &Staff) {
        match (self.part.as_mut(), self.staff.take()) {
            (Some(part), Some(lpsr_staff)) => part.staves.push(lpsr_staff),
            _ => self.context.fault(staff.line, "staff outside of a part"),
        }
    }

    fn visit_voice_start(&mut self, tree: &ScoreTree, id: Idx<Voice>, voice: &Voice) {
        let staff = tree.staff_of_voice(id);
        let part = tree.part(tree.part_of_staff(staff));
        self.voice = Some(LpsrVoice {
            name: format!(
                "{}-staff{}-voice{}",
                part.id,
                tree.staff(staff).number,
                voice.number
            ),
            number: voice.number,
            measures: Vec::new(),
        });
    }

    fn visit_voice_end(&mut self, _tree: &ScoreTree, _id: Idx<Voice>, voice: &Voice) {
        match (self.staff.as_mut(), self.voice.take()) {
            (Some(staff), Some(lpsr_voice)) => staff.voices.push(lpsr_voice),
            _ => self.context.fault(voice.line, "voice outside of a staff"),
        }
    }

    fn visit_measure_start(&mut self, tree: &ScoreTree, id: Idx<Measure>, measure: &Measure) {
        self.measure = Some(LpsrMeasure {
            number: measure.number.clone(),
            implicit: measure.implicit,
            duration: measure_displayed_length(tree, id),
            music: Vec::new(),
        });
        self.music = vec![Vec::new()];
        self.in_multiple_rest = false;
        if let Some(count) = measure.multiple_rest {
            let measure_length = measure
                .time()
                .and_then(Time::measure_length)
                .unwrap_or_else(|| tree.measure_sounding(id));
            // attributes are still visited, timed content collapses into one item
            self.in_multiple_rest = true;
            self.pending_multiple_rest = Some(LpsrMusic::MultipleRest {
                measure_length,
                count,
            });
        }
    }

    fn visit_measure_end(&mut self, _tree: &ScoreTree, _id: Idx<Measure>, measure: &Measure) {
        if let Some(rest) = self.pending_multiple_rest.take() {
            self.push_music(measure.line, rest);
        }
        if self.music.len() != 1 {
            self.context
                .fault(measure.line, format!("measure {} ends inside a tuplet", measure.number));
        }
        let music: Vec<LpsrMusic> = self.music.drain(..).flatten().collect();
        self.in_multiple_rest = false;
        match (self.voice.as_mut(), self.measure.take()) {
            (Some(voice), Some(mut lpsr_measure)) => {
                lpsr_measure.music = music;
                voice.measures.push(lpsr_measure);
            }
            _ => self.context.fault(measure.line, "measure outside of a voice"),
        }
    }

    fn visit_note_start(&mut self, tree: &ScoreTree, _id: NoteId, note: &Note) {
        if !self.converts_timed() || note.grace || note.is_chord_member() {
            return;
        }
        if let Some(group) = note.grace_before {
            self.push_music(note.line, grace_prefix(tree, group));
        }
        let main = with_grace_after(tree, LpsrMusic::Note(plain_note(note)), note.grace_after);
        self.push_music(note.line, main);
    }

    fn visit_chord_start(&mut self, tree: &ScoreTree, id: ChordId, chord: &Chord) {
        if !self.converts_timed() {
            return;
        }
        if chord.notes.is_empty() {
            self.context.fault(chord.line, "chord without notes");
            return;
        }
        if let Some(link) = &chord.grace_before {
            self.push_music(chord.line, grace_prefix(tree, link.group));
        }
        self.chord = Some(chord_body(tree, id, false));
        self.chord_grace_after = chord.grace_after.map(|link| link.group);
    }

    fn visit_chord_beam_link_start(&mut self, tree: &ScoreTree, link: &ChordBeamLink) {
        if self.grace_depth > 0 {
            return;
        }
        let original = link.original;
        let event = tree
            .note(original.note)
            .decorations
            .get(original.position)
            .and_then(|d| decoration_event(d, true));
        if let (Some(chord), Some(event)) = (self.chord.as_mut(), event) {
            chord.events.push(event);
        }
    }

    fn visit_chord_slur_link_start(&mut self, tree: &ScoreTree, link: &ChordSlurLink) {
        if self.grace_depth > 0 {
            return;
        }
        let original = link.original;
        let event = tree
            .note(original.note)
            .decorations
            .get(original.position)
            .and_then(|d| decoration_event(d, true));
        if let (Some(chord), Some(event)) = (self.chord.as_mut(), event) {
            chord.events.push(event);
        }
    }

    fn visit_chord_end(&mut self, tree: &ScoreTree, _id: ChordId, chord: &Chord) {
        if !self.converts_timed() {
            return;
        }
        if let Some(lpsr_chord) = self.chord.take() {
            let group = self.chord_grace_after.take();
            let main = with_grace_after(tree, LpsrMusic::Chord(lpsr_chord), group);
            self.push_music(chord.line, main);
        }
    }

    fn visit_tuplet_start(&mut self, _tree: &ScoreTree, _id: Idx<Tuplet>, _tuplet: &Tuplet) {
        if self.converts_timed() {
            self.music.push(Vec::new());
        }
    }

    fn visit_tuplet_end(&mut self, _tree: &ScoreTree, _id: Idx<Tuplet>, tuplet: &Tuplet) {
        if !self.converts_timed() {
            return;
        }
        if self.music.len() < 2 {
            self.context.fault(tuplet.line, "tuplet end without a start");
            return;
        }
        let music = self.music.pop().unwrap_or_default();
        self.push_music(
            tuplet.line,
            LpsrMusic::Tuplet {
                actual: tuplet.factor.actual,
                normal: tuplet.factor.normal,
                music,
            },
        );
    }

    fn visit_grace_notes_group_start(&mut self, _tree: &ScoreTree, _id: GraceNotesGroupId, _group: &GraceNotesGroup) {
        self.grace_depth += 1;
    }

    fn visit_grace_notes_group_end(&mut self, _tree: &ScoreTree, _id: GraceNotesGroupId, _group: &GraceNotesGroup) {
        self.grace_depth = self.grace_depth.saturating_sub(1);
    }

    fn visit_clef(&mut self, _tree: &ScoreTree, clef: &Clef) {
        match clef_name(clef) {
            Some(name) => self.push_music(clef.line, LpsrMusic::Clef(name)),
            None => debug!("clef {:?} at line {} not drawn", clef.sign, clef.line),
        }
    }

    fn visit_key(&mut self, _tree: &ScoreTree, key: &Key) {
        let mode = match key.mode.unwrap_or(KeyMode::Major) {
            KeyMode::None | KeyMode::Ionian => KeyMode::Major,
            KeyMode::Aeolian => KeyMode::Minor,
            mode => mode,
        };
        self.push_music(
            key.line,
            LpsrMusic::Key {
                tonic: key_tonic(key.fifths, mode),
                mode,
            },
        );
    }

    fn visit_time(&mut self, _tree: &ScoreTree, time: &Time) {
        let music = if time.senza_misura {
            LpsrMusic::Cadenza
        } else {
            LpsrMusic::Time {
                beats: time.beats,
                beat_type: time.beat_type,
            }
        };
        self.push_music(time.line, music);
    }

    fn visit_bar_line(&mut self, _tree: &ScoreTree, bar_line: &BarLine) {
        if let Some(ending) = &bar_line.ending {
            debug!("ending {} at line {} not converted", ending.number, bar_line.line);
        }
        if let Some(glyph) = bar_glyph(bar_line) {
            self.push_music(bar_line.line, LpsrMusic::BarLine(glyph.to_string()));
        }
    }

    fn visit_tempo(&mut self, _tree: &ScoreTree, tempo: &Tempo) {
        self.push_music(
            tempo.line,
            LpsrMusic::Tempo(LpsrTempo {
                words: tempo.words.clone(),
                unit: tempo
                    .beat_unit
                    .map(|unit| LpsrDuration::new(unit, tempo.beat_unit_dots)),
                per_minute: tempo.per_minute,
            }),
        );
    }
}
