//! Score tree → Braille-oriented tree (BSR)
//!
//! Each voice becomes a run of measures of Braille cells. Notes carry an
//! octave mark when the melodic interval from the previous note calls for
//! one; the first note of every measure is always marked. Chords write
//! their highest note followed by interval signs.

pub mod cells;
mod types;


pub use types::{BsrElement, BsrElementKind, BsrMeasure, BsrPart, BsrScore, BsrVoice};

use log::debug;

use self::cells::BrailleCell;
use super::{chord_member_decorations, linked_decoration, measure_displayed_length};
use crate::context::RunContext;
use crate::ir::{
    BarLine, Chord, ChordId, ChordSlurLink, Clef, Decoration, DecorationKind, GraceMember, GraceNotesGroup,
    GraceNotesGroupId, Idx, Key, Measure, Note, NoteId, NoteKind, PairRole, Part, RepeatDirection,
    Score, ScoreTree, Staff, Tempo, Time, Tuplet, Visitor, Voice,
};
use crate::models::{DisplayDuration, NoteType, Pitch};

/// Build the BSR tree of a score tree
pub fn score_to_bsr(tree: &ScoreTree, context: &mut RunContext) -> BsrScore {
    let mut builder = BsrBuilder::new(context);
    tree.browse(&mut builder);
    builder.score
}

/// Octave mark rule between two consecutive written pitches
pub fn needs_octave_mark(previous: Option<Pitch>, current: Pitch) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    match (current.diatonic_number() - previous.diatonic_number()).unsigned_abs() {
        0..=2 => false,
        3 | 4 => current.octave != previous.octave,
        _ => true,
    }
}

fn written_value(note: &Note) -> DisplayDuration {
    note.display
        .or_else(|| DisplayDuration::from_whole_notes(note.sounding))
        .unwrap_or(DisplayDuration::new(NoteType::Quarter, 0))
}

/// Visitor assembling a [`BsrScore`]
pub struct BsrBuilder<'c> {
    context: &'c mut RunContext,
    score: BsrScore,
    part: Option<BsrPart>,
    staff_number: u32,
    voice: Option<BsrVoice>,
    measure: Option<BsrMeasure>,
    previous_pitch: Option<Pitch>,
    /// Slurs of the chord being visited, gathered from its links
    chord_slurs: Option<Vec<Decoration>>,
    grace_depth: usize,
}

impl<'c> BsrBuilder<'c> {
    pub fn new(context: &'c mut RunContext) -> Self {
        Self {
            context,
            score: BsrScore::default(),
            part: None,
            staff_number: 1,
            voice: None,
            measure: None,
            previous_pitch: None,
            chord_slurs: None,
            grace_depth: 0,
        }
    }

    fn push(&mut self, line: usize, element: BsrElement) {
        match self.measure.as_mut() {
            Some(measure) => measure.elements.push(element),
            None => self.context.fault(line, "Braille element outside of a measure"),
        }
    }

    fn pitch_cells(&mut self, pitch: Pitch, value: DisplayDuration, out: &mut Vec<BrailleCell>) {
        if needs_octave_mark(self.previous_pitch, pitch) {
            out.extend(cells::octave_mark(pitch.octave));
        }
        out.push(cells::note_cell(pitch.step, value.note_type));
        out.extend(std::iter::repeat(cells::DOT).take(value.dots as usize));
        self.previous_pitch = Some(pitch);
    }

    /// Cells of one note, its accidental and its attached signs
    fn note_element(&mut self, note: &Note) -> Option<BsrElement> {
        let value = written_value(note);
        let mut out = Vec::new();
        if note.decorations.iter().any(|d| is_slur(d, PairRole::Start)) {
            out.extend(cells::SLUR_OPEN);
        }
        let kind = match note.kind {
            NoteKind::Pitched(pitch) | NoteKind::Unpitched { display: Some(pitch) } => {
                if let Some(accidental) = note.accidental {
                    out.extend(cells::accidental(accidental));
                }
                self.pitch_cells(pitch, value, &mut out);
                BsrElementKind::Note
            }
            NoteKind::Unpitched { display: None } => {
                self.pitch_cells(Pitch::natural(crate::models::Step::B, 4), value, &mut out);
                BsrElementKind::Note
            }
            NoteKind::Rest { .. } => {
                let note_type = if note.measure_rest {
                    NoteType::Whole
                } else {
                    value.note_type
                };
                out.push(cells::rest_cell(note_type));
                if !note.measure_rest {
                    out.extend(std::iter::repeat(cells::DOT).take(value.dots as usize));
                }
                BsrElementKind::Rest
            }
            NoteKind::Skip => return None,
        };
        out.extend(trailing_signs(&note.decorations));
        Some(BsrElement::new(kind, out))
    }

    /// Highest member written, the others as interval signs below it.
    ///
    /// `slurs` are the member slurs the chord's links stand for.
    fn chord_element(&mut self, tree: &ScoreTree, chord: &Chord, slurs: &[Decoration]) -> Option<BsrElement> {
        let mut members: Vec<(&Note, Pitch)> = chord
            .notes
            .iter()
            .map(|&id| tree.note(id))
            .filter_map(|note| match note.kind {
                NoteKind::Pitched(pitch) | NoteKind::Unpitched { display: Some(pitch) } => {
                    Some((note, pitch))
                }
                _ => None,
            })
            .collect();
        members.sort_by_key(|(_, pitch)| std::cmp::Reverse(pitch.diatonic_number()));
        let (top_note, top) = *members.first()?;

        let mut out = Vec::new();
        if slurs.iter().any(|d| is_slur(d, PairRole::Start)) {
            out.extend(cells::SLUR_OPEN);
        }
        if let Some(accidental) = top_note.accidental {
            out.extend(cells::accidental(accidental));
        }
        self.pitch_cells(top, written_value(top_note), &mut out);
        for (note, pitch) in members.iter().skip(1) {
            let steps = (top.diatonic_number() - pitch.diatonic_number()).unsigned_abs();
            if let Some(accidental) = note.accidental {
                out.extend(cells::accidental(accidental));
            }
            if steps > 7 {
                out.extend(cells::octave_mark(pitch.octave));
            }
            out.push(cells::interval(steps));
        }
        out.extend(trailing_signs(&chord_member_decorations(tree, chord)));
        if slurs.iter().any(|d| is_slur(d, PairRole::Stop)) {
            out.extend(cells::SLUR_CLOSE);
        }
        Some(BsrElement::new(BsrElementKind::Chord, out))
    }

    fn grace_element(&mut self, tree: &ScoreTree, group: GraceNotesGroupId) -> BsrElement {
        let group = tree.grace_group(group);
        let mut out = cells::grace(group.slashed);
        for member in &group.members {
            let element = match *member {
                GraceMember::Note(n) => self.note_element(tree.note(n)),
                GraceMember::Chord(c) => {
                    let chord = tree.chord(c);
                    let slurs: Vec<Decoration> = chord
                        .slur_links
                        .iter()
                        .filter_map(|link| linked_decoration(tree, link.original).cloned())
                        .collect();
                    self.chord_element(tree, chord, &slurs)
                }
            };
            if let Some(element) = element {
                out.extend(element.cells);
            }
        }
        BsrElement::new(BsrElementKind::Grace, out)
    }

    /// Dynamics and words written before the note they are attached to
    fn push_directions(&mut self, line: usize, decorations: &[Decoration]) {
        for decoration in decorations {
            let element = match &decoration.kind {
                DecorationKind::Dynamic(kind) => {
                    BsrElement::new(BsrElementKind::Dynamic, cells::word(kind.musicxml_name()))
                }
                DecorationKind::Words(text) => {
                    BsrElement::new(BsrElementKind::Words, cells::word(text))
                }
                _ => continue,
            };
            self.push(line, element);
        }
    }
}

fn is_slur(decoration: &Decoration, wanted: PairRole) -> bool {
    matches!(decoration.kind, DecorationKind::Slur { role, .. } if role == wanted)
}

/// Articulations, ties and slur ends follow the note
fn trailing_signs(decorations: &[Decoration]) -> Vec<BrailleCell> {
    let mut out = Vec::new();
    for decoration in decorations {
        if let DecorationKind::Articulation(kind) = decoration.kind {
            if let Some(sign) = cells::articulation(kind) {
                out.extend(sign);
            }
        }
    }
    if decorations.iter().any(|d| {
        matches!(
            d.kind,
            DecorationKind::Tie {
                role: PairRole::Start,
                ..
            }
        )
    }) {
        out.extend(cells::TIE);
    }
    if decorations.iter().any(|d| is_slur(d, PairRole::Stop)) {
        out.extend(cells::SLUR_CLOSE);
    }
    out
}

impl Visitor for BsrBuilder<'_> {
    fn visit_score_start(&mut self, _tree: &ScoreTree, score: &Score) {
        self.score.title = score.identification.title().map(str::to_string);
        self.score.composer = score.identification.composers.first().cloned();
    }

    fn visit_part_start(&mut self, _tree: &ScoreTree, _id: Idx<Part>, part: &Part) {
        self.part = Some(BsrPart {
            name: part.display_name().to_string(),
            voices: Vec::new(),
        });
    }

    fn visit_part_end(&mut self, _tree: &ScoreTree, _id: Idx<Part>, part: &Part) {
        match self.part.take() {
            Some(bsr_part) => self.score.parts.push(bsr_part),
            None => self.context.fault(part.line, "part end without a start"),
        }
    }

    fn visit_staff_start(&mut self, _tree: &ScoreTree, _id: Idx<Staff>, staff: &Staff) {
        self.staff_number = staff.number;
    }

    fn visit_voice_start(&mut self, _tree: &ScoreTree, _id: Idx<Voice>, voice: &Voice) {
        let part_name = self.part.as_ref().map(|p| p.name.as_str()).unwrap_or_default();
        self.voice = Some(BsrVoice {
            label: format!(
                "{}, staff {}, voice {}",
                part_name, self.staff_number, voice.number
            ),
            measures: Vec::new(),
        });
    }

    fn visit_voice_end(&mut self, _tree: &ScoreTree, _id: Idx<Voice>, voice: &Voice) {
        match (self.part.as_mut(), self.voice.take()) {
            (Some(part), Some(bsr_voice)) => part.voices.push(bsr_voice),
            _ => self.context.fault(voice.line, "voice outside of a part"),
        }
    }

    fn visit_measure_start(&mut self, tree: &ScoreTree, id: Idx<Measure>, measure: &Measure) {
        self.previous_pitch = None;
        self.measure = Some(BsrMeasure {
            number: measure.number.clone(),
            duration: measure_displayed_length(tree, id),
            elements: Vec::new(),
        });
    }

    fn visit_measure_end(&mut self, _tree: &ScoreTree, _id: Idx<Measure>, measure: &Measure) {
        match (self.voice.as_mut(), self.measure.take()) {
            (Some(voice), Some(bsr_measure)) => voice.measures.push(bsr_measure),
            _ => self.context.fault(measure.line, "measure outside of a voice"),
        }
    }

    fn visit_note_start(&mut self, tree: &ScoreTree, _id: NoteId, note: &Note) {
        if self.grace_depth > 0 || note.grace || note.is_chord_member() {
            return;
        }
        self.push_directions(note.line, &note.decorations);
        if let Some(group) = note.grace_before {
            let element = self.grace_element(tree, group);
            self.push(note.line, element);
        }
        if let Some(element) = self.note_element(note) {
            self.push(note.line, element);
        }
        if let Some(group) = note.grace_after {
            let element = self.grace_element(tree, group);
            self.push(note.line, element);
        }
    }

    fn visit_chord_start(&mut self, tree: &ScoreTree, _id: ChordId, chord: &Chord) {
        if self.grace_depth > 0 {
            return;
        }
        self.push_directions(chord.line, &chord_member_decorations(tree, chord));
        if let Some(link) = chord.grace_before {
            let element = self.grace_element(tree, link.group);
            self.push(chord.line, element);
        }
        self.chord_slurs = Some(Vec::new());
    }

    fn visit_chord_slur_link_start(&mut self, tree: &ScoreTree, link: &ChordSlurLink) {
        if self.grace_depth > 0 {
            return;
        }
        let slur = linked_decoration(tree, link.original).cloned();
        if let (Some(slurs), Some(slur)) = (self.chord_slurs.as_mut(), slur) {
            slurs.push(slur);
        }
    }

    fn visit_chord_end(&mut self, tree: &ScoreTree, _id: ChordId, chord: &Chord) {
        if self.grace_depth > 0 {
            return;
        }
        let slurs = self.chord_slurs.take().unwrap_or_default();
        match self.chord_element(tree, chord, &slurs) {
            Some(element) => self.push(chord.line, element),
            None => self.context.fault(chord.line, "chord without pitched notes"),
        }
        if let Some(link) = chord.grace_after {
            let element = self.grace_element(tree, link.group);
            self.push(chord.line, element);
        }
    }

    fn visit_tuplet_start(&mut self, _tree: &ScoreTree, _id: Idx<Tuplet>, tuplet: &Tuplet) {
        if self.grace_depth == 0 {
            self.push(
                tuplet.line,
                BsrElement::new(BsrElementKind::Tuplet, cells::tuplet(tuplet.factor.actual)),
            );
        }
    }

    fn visit_grace_notes_group_start(&mut self, _tree: &ScoreTree, _id: GraceNotesGroupId, _group: &GraceNotesGroup) {
        self.grace_depth += 1;
    }

    fn visit_grace_notes_group_end(&mut self, _tree: &ScoreTree, _id: GraceNotesGroupId, _group: &GraceNotesGroup) {
        self.grace_depth = self.grace_depth.saturating_sub(1);
    }

    fn visit_clef(&mut self, _tree: &ScoreTree, clef: &Clef) {
        match cells::clef(clef.sign) {
            Some(sign) => self.push(clef.line, BsrElement::new(BsrElementKind::Clef, sign)),
            None => debug!("no Braille clef sign for {:?}", clef.sign),
        }
    }

    fn visit_key(&mut self, _tree: &ScoreTree, key: &Key) {
        let signature = cells::key_signature(key.fifths);
        if !signature.is_empty() {
            self.push(key.line, BsrElement::new(BsrElementKind::Key, signature));
        }
    }

    fn visit_time(&mut self, _tree: &ScoreTree, time: &Time) {
        if time.senza_misura {
            return;
        }
        self.push(
            time.line,
            BsrElement::new(
                BsrElementKind::Time,
                cells::time_signature(time.beats, time.beat_type),
            ),
        );
    }

    fn visit_bar_line(&mut self, _tree: &ScoreTree, bar_line: &BarLine) {
        let sign = match bar_line.repeat_direction() {
            Some(RepeatDirection::Forward) => Some(cells::FORWARD_REPEAT.to_vec()),
            Some(RepeatDirection::Backward) => Some(cells::BACKWARD_REPEAT.to_vec()),
            None => bar_line.style.and_then(cells::bar_line),
        };
        if let Some(sign) = sign {
            self.push(bar_line.line, BsrElement::new(BsrElementKind::BarLine, sign));
        }
    }

    fn visit_tempo(&mut self, _tree: &ScoreTree, tempo: &Tempo) {
        if let Some(words) = &tempo.words {
            self.push(tempo.line, BsrElement::new(BsrElementKind::Words, cells::word(words)));
        }
    }
}
