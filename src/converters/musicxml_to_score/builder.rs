//! One linear scan of a `<part>`: places notes, chords, tuplets, grace notes
//! groups, attributes and directions into the score tree
//!
//! A global position follows `<backup>` and `<forward>`; each voice keeps its
//! own cursor (see [`VoiceCursor`]). Voice measures are created on demand,
//! so attributes and left bar lines met before a voice's first note wait in
//! `leading` and are copied into its measure when it appears.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};

use super::attributes::{parse_attributes, parse_barline, AttributeValues};
use super::directions::{parse_direction, DirectionValues};
use super::notes::{parse_note, NoteValues, TupletMark, MAX_DURATION};
use super::voice::{VoiceCursor, VoiceState};
use crate::context::RunContext;
use crate::errors::{ErrorScope, SemanticErrorKind, WarningKind};
use crate::ir::{
    BarLine, BarLineLocation, Clef, Decoration, DecorationSlot, GraceMember, GracePosition, Key,
    MeasureElement, MeasureId, Note, NoteId, NoteKind, NoteUplink, PairKind, PairRole, PartId,
    ScoreTree, Time, TupletMember,
};
use crate::models::{DisplayDuration, TupletFactor, WholeNotes};
use crate::musicxml::MusicXmlElement;

/// Largest composed tuplet numbers accepted for nested tuplets
const MAX_COMPOSED_TUPLET: u32 = 1 << 16;

#[derive(Debug, Clone, Default)]
struct StaffState {
    clef: Option<Clef>,
    key: Option<Key>,
    time: Option<Time>,
}

#[derive(Debug, Clone)]
struct MeasureInfo {
    number: String,
    line: usize,
    implicit: bool,
    multiple_rest: Option<u32>,
    /// Furthest position reached, known once the measure is closed
    length: WholeNotes,
}

pub(super) struct PartBuilder<'a> {
    tree: &'a mut ScoreTree,
    context: &'a mut RunContext,
    part: PartId,
    part_id: String,
    divisions: i64,
    staff_count: u32,
    staves: BTreeMap<u32, StaffState>,
    /// In creation order
    voices: Vec<VoiceCursor>,
    measures: Vec<MeasureInfo>,
    position: WholeNotes,
    /// Attributes and bar lines of the current measure; `None` scope is part-wide
    leading: Vec<(Option<u32>, MeasureElement)>,
    /// Right bar lines, appended when the measure closes
    trailing: Vec<BarLine>,
    /// Directions waiting for the next note of their staff and voice
    directions: Vec<DirectionValues>,
}

impl<'a> PartBuilder<'a> {
    pub fn new(tree: &'a mut ScoreTree, context: &'a mut RunContext, part: PartId, part_id: &str) -> Self {
        Self {
            tree,
            context,
            part,
            part_id: part_id.to_string(),
            divisions: 1,
            staff_count: 1,
            staves: BTreeMap::new(),
            voices: Vec::new(),
            measures: Vec::new(),
            position: WholeNotes::zero(),
            leading: Vec::new(),
            trailing: Vec::new(),
            directions: Vec::new(),
        }
    }

    pub fn build(mut self, part_element: &MusicXmlElement) {
        for measure in part_element.children_named("measure") {
            self.scan_measure(measure);
        }
        self.finish_part();
        debug!(
            "part {}: {} measure(s), {} voice(s)",
            self.part_id,
            self.measures.len(),
            self.voices.len()
        );
    }

    // ========================================================================
    // MEASURES
    // ========================================================================

    fn scan_measure(&mut self, element: &MusicXmlElement) {
        let number = element
            .attribute("number")
            .map(str::to_string)
            .unwrap_or_else(|| (self.measures.len() + 1).to_string());
        self.measures.push(MeasureInfo {
            number,
            line: element.line,
            implicit: element.attribute("implicit") == Some("yes"),
            multiple_rest: None,
            length: WholeNotes::zero(),
        });
        self.position = WholeNotes::zero();
        self.leading.clear();
        self.trailing.clear();

        for child in &element.children {
            match child.name.as_str() {
                "attributes" => {
                    let values = parse_attributes(child, self.context);
                    self.apply_attributes(values);
                }
                "note" => self.scan_note(child),
                "backup" => {
                    if let Some(duration) = self.duration_of(child) {
                        self.position = if duration > self.position {
                            WholeNotes::zero()
                        } else {
                            self.position - duration
                        };
                    }
                }
                "forward" => self.scan_forward(child),
                "direction" => {
                    let values = parse_direction(child, self.context);
                    if !values.is_empty() {
                        self.directions.push(values);
                    }
                }
                "barline" => {
                    let bar_line = parse_barline(child, self.context);
                    match bar_line.location {
                        BarLineLocation::Right => self.trailing.push(bar_line),
                        _ => self.distribute(None, MeasureElement::BarLine(bar_line)),
                    }
                }
                other => trace!("<{}> at line {} not converted", other, child.line),
            }
        }
        self.close_measure();
    }

    fn close_measure(&mut self) {
        let current = self.current_measure();
        let length = self
            .voices
            .iter()
            .filter(|c| c.measure.is_some())
            .map(|c| c.position)
            .fold(self.position, WholeNotes::max);

        // voices silent in this measure get a skip of the measure's length
        for index in 0..self.voices.len() {
            if self.voices[index].measure.is_none() {
                let measure = self.create_voice_measure(index, current);
                if !length.is_zero() {
                    let line = self.measures[current].line;
                    self.push_skip(index, measure, length, line);
                }
                self.voices[index].measure = Some(measure);
                self.voices[index].position = length;
            }
        }

        self.flush_directions();

        for index in 0..self.voices.len() {
            let Some(measure) = self.voices[index].measure else {
                continue;
            };
            for bar_line in self.trailing.clone() {
                self.tree
                    .push_element(measure, MeasureElement::BarLine(bar_line));
            }
            self.close_voice_measure(index, measure);
        }
        self.measures[current].length = length;
    }

    fn close_voice_measure(&mut self, index: usize, measure: MeasureId) {
        self.close_chord(index);
        self.close_grace_chord(index);

        let measure_number = self.measures[self.current_measure()].number.clone();
        let open = std::mem::take(&mut self.voices[index].tuplets);
        for tuplet in open {
            let tuplet = self.tree.tuplet(tuplet);
            let (line, number) = (tuplet.line, tuplet.number);
            self.context.warn(
                WarningKind::UnterminatedTuplet,
                line,
                format!(
                    "tuplet {} not stopped before the end of measure {}",
                    number, measure_number
                ),
            );
        }

        let staff = self.voices[index].staff;
        let expected = self
            .staves
            .get(&staff)
            .and_then(|s| s.time.as_ref())
            .and_then(Time::measure_length);
        if let Some(expected) = expected {
            let actual = self.tree.measure_sounding(measure);
            if actual > expected {
                let line = self.tree.measure(measure).line;
                let scope = self.measure_scope(index);
                self.context
                    .error(scope, SemanticErrorKind::MeasureOverflow { expected, actual }, line);
            }
        }
        self.voices[index].reset_for_next_measure();
    }

    fn finish_part(&mut self) {
        for index in 0..self.voices.len() {
            if let Some(group) = self.voices[index].pending_grace.take() {
                self.close_grace_chord(index);
                match self.voices[index].last_principal {
                    Some(note) => {
                        self.tree.grace_group_mut(group).position = GracePosition::After;
                        self.tree.attach_grace_group(note, group);
                        self.refinalize_chord_of(note);
                    }
                    None => {
                        let line = self.tree.grace_group(group).line;
                        self.context.warn(
                            WarningKind::SkippedElement,
                            line,
                            "grace notes without a principal note dropped",
                        );
                    }
                }
            }

            let mut ties: Vec<NoteId> = self.voices[index].pending_ties.drain().map(|(_, n)| n).collect();
            ties.sort();
            for note in ties {
                let (line, pitch) = (self.tree.note(note).line, pitch_label(self.tree.note(note).kind));
                let scope = self.voice_scope(index);
                self.context
                    .error(scope, SemanticErrorKind::UnterminatedTie { pitch }, line);
                self.voices[index].failed = true;
            }

            let mut pairs: Vec<((PairKind, u32), NoteId)> =
                self.voices[index].pending_pairs.drain().collect();
            pairs.sort();
            for ((kind, number), note) in pairs {
                let line = self.tree.note(note).line;
                self.context.warn(
                    WarningKind::OrphanStart,
                    line,
                    format!("{} {} never stopped", kind.name(), number),
                );
                self.drop_start(note, kind, number);
            }

            if self.voices[index].failed {
                let cursor = &self.voices[index];
                debug!(
                    "part {} staff {} voice {} dropped",
                    self.part_id, cursor.staff, cursor.number
                );
                self.tree.remove_voice(cursor.voice);
            }
        }
    }

    // ========================================================================
    // ATTRIBUTES, BAR LINES, DIRECTIONS
    // ========================================================================

    fn apply_attributes(&mut self, values: AttributeValues) {
        if let Some(divisions) = values.divisions {
            self.divisions = divisions;
        }
        if let Some(staves) = values.staves {
            self.staff_count = staves;
        }
        if let Some(count) = values.multiple_rest {
            if let Some(info) = self.measures.last_mut() {
                info.multiple_rest = Some(count);
            }
            for measure in self.voices.iter().filter_map(|c| c.measure) {
                self.tree.measure_mut(measure).multiple_rest = Some(count);
            }
        }
        let mut placed: Vec<(u32, MeasureElement)> = Vec::new();
        for (staff, clef) in values.clefs {
            self.staves.entry(staff).or_default().clef = Some(clef.clone());
            placed.push((staff, MeasureElement::Clef(clef)));
        }
        for (number, key) in values.keys {
            for staff in self.target_staves(number) {
                self.staves.entry(staff).or_default().key = Some(key.clone());
                placed.push((staff, MeasureElement::Key(key.clone())));
            }
        }
        for (number, time) in values.times {
            for staff in self.target_staves(number) {
                self.staves.entry(staff).or_default().time = Some(time.clone());
                placed.push((staff, MeasureElement::Time(time.clone())));
            }
        }
        for (staff, element) in placed {
            self.distribute(Some(staff), element);
        }
    }

    /// Staff `number`, or every staff known so far
    fn target_staves(&self, number: Option<u32>) -> BTreeSet<u32> {
        match number {
            Some(number) => BTreeSet::from([number]),
            None => (1..=self.staff_count)
                .chain(self.staves.keys().copied())
                .collect(),
        }
    }

    /// Push into the open voice measures in scope, and remember for later ones
    fn distribute(&mut self, scope: Option<u32>, element: MeasureElement) {
        for cursor in &self.voices {
            if let (Some(measure), true) = (cursor.measure, in_scope(scope, cursor.staff)) {
                self.tree.push_element(measure, element.clone());
            }
        }
        self.leading.push((scope, element));
    }

    /// Hand the waiting directions of this staff and voice over to a note
    fn take_directions(&mut self, index: usize, measure: MeasureId) -> Vec<Decoration> {
        let (staff, voice) = (self.voices[index].staff, self.voices[index].number);
        let mut decorations = Vec::new();
        for direction in std::mem::take(&mut self.directions) {
            if direction.staff == staff && direction.voice.map_or(true, |v| v == voice) {
                if let Some(tempo) = direction.tempo {
                    self.tree.push_element(measure, MeasureElement::Tempo(tempo));
                }
                decorations.extend(direction.decorations);
            } else {
                self.directions.push(direction);
            }
        }
        decorations
    }

    /// Directions not followed by a note go to the last note of their voice
    fn flush_directions(&mut self) {
        for direction in std::mem::take(&mut self.directions) {
            let matches = |c: &VoiceCursor| {
                c.staff == direction.staff
                    && direction.voice.map_or(true, |v| v == c.number)
                    && c.measure.is_some()
            };
            let target = self
                .voices
                .iter()
                .position(|c| matches(c) && c.last_note.is_some())
                .or_else(|| self.voices.iter().position(matches));
            let Some(index) = target else {
                self.context.warn(
                    WarningKind::SkippedElement,
                    direction.line,
                    format!("direction on staff {} has no voice to attach to", direction.staff),
                );
                continue;
            };
            if let (Some(tempo), Some(measure)) = (direction.tempo, self.voices[index].measure) {
                self.tree.push_element(measure, MeasureElement::Tempo(tempo));
            }
            if direction.decorations.is_empty() {
                continue;
            }
            match self.voices[index].last_note {
                Some(note) => self.process_decorations(index, note, direction.decorations),
                None => self.context.warn(
                    WarningKind::SkippedElement,
                    direction.line,
                    "direction has no note to attach to",
                ),
            }
        }
    }

    // ========================================================================
    // VOICES
    // ========================================================================

    fn current_measure(&self) -> usize {
        self.measures.len().saturating_sub(1)
    }

    /// Cursor of `(staff, voice)`, created and back-filled on first use
    fn cursor(&mut self, staff: u32, voice: u32, line: usize) -> usize {
        if let Some(index) = self
            .voices
            .iter()
            .position(|c| c.staff == staff && c.number == voice)
        {
            return index;
        }
        let staff_id = self.tree.staff_for(self.part, staff, line);
        let voice_id = self.tree.add_voice(staff_id, voice, line);
        debug!("part {}: new voice {} on staff {}", self.part_id, voice, staff);
        self.voices.push(VoiceCursor::new(voice_id, staff, voice));
        let index = self.voices.len() - 1;

        for earlier in 0..self.current_measure() {
            let measure = self.create_voice_measure(index, earlier);
            let (length, line) = (self.measures[earlier].length, self.measures[earlier].line);
            if !length.is_zero() {
                self.push_skip(index, measure, length, line);
            }
        }
        index
    }

    fn create_voice_measure(&mut self, index: usize, measure_index: usize) -> MeasureId {
        let info = self.measures[measure_index].clone();
        let (voice, staff) = (self.voices[index].voice, self.voices[index].staff);
        let measure = self.tree.append_measure(voice, info.number, info.line);
        self.tree.measure_mut(measure).implicit = info.implicit;
        self.tree.measure_mut(measure).multiple_rest = info.multiple_rest;

        let first = !self.voices[index].started;
        self.voices[index].started = true;
        if first {
            // the staff state already reflects this measure's attributes
            let state = self.staves.get(&staff).cloned().unwrap_or_default();
            let prefix = [
                state.clef.map(MeasureElement::Clef),
                state.key.map(MeasureElement::Key),
                state.time.map(MeasureElement::Time),
            ];
            for element in prefix.into_iter().flatten() {
                self.tree.push_element(measure, element);
            }
        }
        if measure_index == self.current_measure() {
            let leading: Vec<MeasureElement> = self
                .leading
                .iter()
                .filter(|(scope, element)| {
                    in_scope(*scope, staff) && (!first || matches!(element, MeasureElement::BarLine(_)))
                })
                .map(|(_, element)| element.clone())
                .collect();
            for element in leading {
                self.tree.push_element(measure, element);
            }
        }
        measure
    }

    fn voice_measure(&mut self, index: usize) -> MeasureId {
        if let Some(measure) = self.voices[index].measure {
            return measure;
        }
        let measure = self.create_voice_measure(index, self.current_measure());
        self.voices[index].measure = Some(measure);
        measure
    }

    fn push_skip(&mut self, index: usize, measure: MeasureId, duration: WholeNotes, line: usize) {
        let mut skip = Note::new(line, NoteKind::Skip, duration);
        skip.staff = self.voices[index].staff;
        skip.voice = self.voices[index].number;
        let skip = self.tree.new_note(skip);
        self.place(index, measure, skip);
    }

    /// Fill the time this voice missed with a skip (not inside tuplets)
    fn fill_gap(&mut self, index: usize, measure: MeasureId, line: usize) {
        let cursor = &self.voices[index];
        if cursor.state() != VoiceState::Idle || self.position <= cursor.position {
            return;
        }
        let gap = self.position - cursor.position;
        self.push_skip(index, measure, gap, line);
        self.voices[index].position = self.position;
    }

    /// Put a note into the innermost open tuplet, else into the measure
    fn place(&mut self, index: usize, measure: MeasureId, note: NoteId) {
        match self.voices[index].innermost_tuplet() {
            Some(tuplet) => self.tree.add_tuplet_member(tuplet, TupletMember::Note(note)),
            None => self.tree.push_element(measure, MeasureElement::Note(note)),
        }
    }

    fn voice_scope(&self, index: usize) -> ErrorScope {
        ErrorScope::Voice {
            part: self.part_id.clone(),
            staff: self.voices[index].staff,
            voice: self.voices[index].number,
        }
    }

    fn measure_scope(&self, index: usize) -> ErrorScope {
        self.measure_scope_for(self.voices[index].staff, self.voices[index].number)
    }

    fn measure_scope_for(&self, staff: u32, voice: u32) -> ErrorScope {
        ErrorScope::Measure {
            part: self.part_id.clone(),
            staff,
            voice,
            measure: self.measures[self.current_measure()].number.clone(),
        }
    }

    // ========================================================================
    // NOTES
    // ========================================================================

    fn duration_of(&mut self, element: &MusicXmlElement) -> Option<WholeNotes> {
        let text = element.child_text("duration").unwrap_or("");
        let duration = text
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|d| (0..=MAX_DURATION).contains(d))
            .and_then(|d| WholeNotes::from_divisions(d, self.divisions));
        if duration.is_none() {
            self.context.warn(
                WarningKind::UnknownValue,
                element.line,
                format!("<{}> duration {:?} ignored", element.name, text),
            );
        }
        duration
    }

    fn scan_forward(&mut self, element: &MusicXmlElement) {
        let Some(duration) = self.duration_of(element) else {
            return;
        };
        if let Some(voice) = element.child_text_as::<u32>("voice") {
            let staff = element.child_text_as::<u32>("staff").unwrap_or(1);
            let index = self.cursor(staff, voice, element.line);
            self.close_chord(index);
            let measure = self.voice_measure(index);
            self.fill_gap(index, measure, element.line);
            self.push_skip(index, measure, duration, element.line);
            self.voices[index].position += duration;
        }
        self.position += duration;
    }

    fn scan_note(&mut self, element: &MusicXmlElement) {
        let values = match parse_note(element, self.divisions, self.context) {
            Ok(values) => values,
            Err(kind) => {
                let staff = element.child_text_as::<u32>("staff").unwrap_or(1);
                let voice = element.child_text_as::<u32>("voice").unwrap_or(1);
                let scope = self.measure_scope_for(staff, voice);
                self.context.error(scope, kind, element.line);
                return;
            }
        };
        let index = self.cursor(values.staff, values.voice, values.line);
        if values.grace.is_some() {
            self.place_grace(index, values);
        } else if values.chord {
            self.place_chord_member(index, values);
        } else {
            self.place_principal(index, values);
        }
    }

    fn create_note(&mut self, values: &NoteValues) -> NoteId {
        let mut note = Note::new(values.line, values.kind, values.sounding);
        note.display = values.display;
        note.accidental = values.accidental;
        note.grace = values.grace.is_some();
        note.measure_rest = values.measure_rest;
        note.staff = values.staff;
        note.voice = values.voice;
        self.tree.new_note(note)
    }

    fn place_principal(&mut self, index: usize, values: NoteValues) {
        self.close_chord(index);
        let measure = self.voice_measure(index);
        self.fill_gap(index, measure, values.line);

        for mark in values.tuplets.iter().filter(|m| m.role == PairRole::Start) {
            self.open_tuplet(index, measure, mark, values.time_modification);
        }

        let note = self.create_note(&values);
        let mut decorations = self.take_directions(index, measure);
        decorations.extend(values.decorations.iter().cloned());
        self.place(index, measure, note);

        if let (Some(tuplet), Some(display)) = (self.voices[index].innermost_tuplet(), values.display) {
            let expected = display.whole_notes() * self.tree.composed_factor(tuplet).as_rational();
            if expected != values.sounding {
                let scope = self.measure_scope(index);
                self.context.error(
                    scope,
                    SemanticErrorKind::TupletDurationMismatch {
                        expected,
                        actual: values.sounding,
                    },
                    values.line,
                );
            }
        }

        if let Some(group) = self.voices[index].pending_grace.take() {
            self.close_grace_chord(index);
            self.tree.attach_grace_group(note, group);
            self.voices[index].last_grace = None;
        }

        self.process_decorations(index, note, decorations);

        for mark in values.tuplets.iter().filter(|m| m.role == PairRole::Stop) {
            self.close_tuplet(index, mark);
        }

        let cursor = &mut self.voices[index];
        cursor.last_note = Some(note);
        cursor.last_principal = Some(note);
        cursor.position += values.sounding;
        self.position += values.sounding;
    }

    fn place_chord_member(&mut self, index: usize, mut values: NoteValues) {
        let Some(previous) = self.voices[index].last_note else {
            self.context.warn(
                WarningKind::UnterminatedChord,
                values.line,
                "chord note without a preceding note, placed as a note",
            );
            values.chord = false;
            return self.place_principal(index, values);
        };
        let chord = match self.voices[index].chord {
            Some(chord) => chord,
            None => match self.tree.convert_to_chord(previous) {
                Some(chord) => {
                    self.voices[index].chord = Some(chord);
                    trace!("voice {} is {:?}", self.voices[index].number, self.voices[index].state());
                    chord
                }
                None => {
                    self.context
                        .fault(values.line, "previous note cannot become a chord");
                    return;
                }
            },
        };
        let note = self.create_note(&values);
        self.tree.add_chord_note(chord, note);

        let first = self.tree.chord(chord).display;
        if first != values.display {
            let scope = self.measure_scope(index);
            self.context.error(
                scope,
                SemanticErrorKind::ChordDurationMismatch {
                    first: display_label(first),
                    member: display_label(values.display),
                },
                values.line,
            );
        }
        self.process_decorations(index, note, values.decorations);
    }

    fn place_grace(&mut self, index: usize, values: NoteValues) {
        let note = self.create_note(&values);
        if values.chord {
            if let Some(previous) = self.voices[index].last_grace {
                let chord = match self.voices[index].grace_chord {
                    Some(chord) => Some(chord),
                    None => self.tree.convert_to_chord(previous),
                };
                if let Some(chord) = chord {
                    self.voices[index].grace_chord = Some(chord);
                    self.tree.add_chord_note(chord, note);
                    self.process_decorations(index, note, values.decorations);
                    return;
                }
            }
        }

        // a grace note ends the chord before it
        self.close_chord(index);
        self.close_grace_chord(index);
        let group = match self.voices[index].pending_grace {
            Some(group) => group,
            None => {
                let group = self.tree.new_grace_group(
                    values.line,
                    GracePosition::Before,
                    values.grace.unwrap_or(false),
                );
                self.voices[index].pending_grace = Some(group);
                group
            }
        };
        self.tree.add_grace_member(group, GraceMember::Note(note));
        self.voices[index].last_grace = Some(note);
        self.process_decorations(index, note, values.decorations);
    }

    fn close_chord(&mut self, index: usize) {
        if let Some(chord) = self.voices[index].chord.take() {
            self.tree.finalize_chord(chord);
        }
    }

    fn close_grace_chord(&mut self, index: usize) {
        if let Some(chord) = self.voices[index].grace_chord.take() {
            self.tree.finalize_chord(chord);
        }
    }

    /// Rebuild the links of an already closed chord after its members changed
    fn refinalize_chord_of(&mut self, note: NoteId) {
        if let NoteUplink::Chord(chord) = self.tree.note(note).uplink {
            let chord = chord.target();
            let open = self
                .voices
                .iter()
                .any(|c| c.chord == Some(chord) || c.grace_chord == Some(chord));
            if !open {
                self.tree.finalize_chord(chord);
            }
        }
    }

    // ========================================================================
    // TUPLETS
    // ========================================================================

    fn open_tuplet(
        &mut self,
        index: usize,
        measure: MeasureId,
        mark: &TupletMark,
        time_modification: Option<TupletFactor>,
    ) {
        let outer = self.voices[index].innermost_tuplet();
        let enclosing = outer
            .map(|t| self.tree.composed_factor(t))
            .unwrap_or_else(TupletFactor::identity);
        // <time-modification> is the product of every enclosing tuplet
        let factor = mark.factor.or_else(|| {
            time_modification.and_then(|tm| {
                TupletFactor::from_multiplier(tm.as_rational() / enclosing.as_rational())
            })
        });
        let Some(factor) = factor else {
            self.context.warn(
                WarningKind::SkippedElement,
                mark.line,
                format!("tuplet {} has neither numbers nor a time modification", mark.number),
            );
            return;
        };
        let composed = enclosing
            .compose(factor)
            .filter(|f| f.actual <= MAX_COMPOSED_TUPLET && f.normal <= MAX_COMPOSED_TUPLET);
        if composed.is_none() {
            self.context.warn(
                WarningKind::SkippedElement,
                mark.line,
                format!("tuplet {} nested as {} inside {} is out of range", mark.number, factor, enclosing),
            );
            return;
        }
        let tuplet = self.tree.new_tuplet(mark.line, mark.number, factor);
        match outer {
            Some(outer) => self
                .tree
                .add_tuplet_member(outer, TupletMember::Tuplet(tuplet)),
            None => self.tree.push_element(measure, MeasureElement::Tuplet(tuplet)),
        }
        self.voices[index].tuplets.push(tuplet);
        trace!("voice {} is {:?}", self.voices[index].number, self.voices[index].state());
    }

    fn close_tuplet(&mut self, index: usize, mark: &TupletMark) {
        let found = self.voices[index]
            .tuplets
            .iter()
            .rposition(|t| self.tree.tuplet(*t).number == mark.number);
        let Some(position) = found else {
            self.context.warn(
                WarningKind::OrphanStop,
                mark.line,
                format!("tuplet {} stopped but never started", mark.number),
            );
            return;
        };
        let inner: Vec<_> = self.voices[index].tuplets.drain(position..).skip(1).collect();
        for tuplet in inner {
            let number = self.tree.tuplet(tuplet).number;
            self.context.warn(
                WarningKind::UnterminatedTuplet,
                mark.line,
                format!("tuplet {} closed by its enclosing tuplet {}", number, mark.number),
            );
        }
    }

    // ========================================================================
    // DECORATIONS AND PAIRS
    // ========================================================================

    /// Attach decorations to `note`, pairing ties, slurs, wedges, spanners
    /// and ligatures with their open starts. Stops go first so a note may
    /// end one slur and start the next.
    fn process_decorations(&mut self, index: usize, note: NoteId, decorations: Vec<Decoration>) {
        let (stops, others): (Vec<Decoration>, Vec<Decoration>) = decorations
            .into_iter()
            .partition(|d| matches!(d.kind.pairing(), Some((_, PairRole::Stop, _))));
        for decoration in stops.into_iter().chain(others) {
            match decoration.kind.pairing() {
                None => {
                    self.tree.add_decoration(note, decoration);
                }
                Some((kind, PairRole::Continue, _)) => {
                    trace!("{} continuation at line {} dropped", kind.name(), decoration.line)
                }
                Some((PairKind::Tie, role, _)) => self.place_tie(index, note, decoration, role),
                Some((kind, role, number)) => {
                    self.place_paired(index, note, decoration, kind, role, number)
                }
            }
        }
        self.refinalize_chord_of(note);
    }

    fn place_tie(&mut self, index: usize, note: NoteId, decoration: Decoration, role: PairRole) {
        let kind = self.tree.note(note).kind;
        let Some(key) = tie_key(kind) else {
            debug!("tie on a {} at line {} ignored", kind.name(), decoration.line);
            return;
        };
        let line = decoration.line;
        match role {
            PairRole::Stop => match self.voices[index].pending_ties.remove(&key) {
                Some(start) => {
                    let position = self.tree.add_decoration(note, decoration);
                    self.link(PairKind::Tie, start, DecorationSlot { note, position }, 0, line);
                }
                None => {
                    let scope = self.voice_scope(index);
                    self.context.error(
                        scope,
                        SemanticErrorKind::UnmatchedTieStop {
                            pitch: pitch_label(kind),
                        },
                        line,
                    );
                    self.voices[index].failed = true;
                }
            },
            _ => {
                self.tree.add_decoration(note, decoration);
                if let Some(previous) = self.voices[index].pending_ties.insert(key, note) {
                    let previous_line = self.tree.note(previous).line;
                    let scope = self.voice_scope(index);
                    self.context.error(
                        scope,
                        SemanticErrorKind::UnterminatedTie {
                            pitch: pitch_label(kind),
                        },
                        previous_line,
                    );
                    self.voices[index].failed = true;
                }
            }
        }
    }

    fn place_paired(
        &mut self,
        index: usize,
        note: NoteId,
        decoration: Decoration,
        kind: PairKind,
        role: PairRole,
        number: u32,
    ) {
        if self.chord_sibling_has(note, kind, role, number) {
            trace!("{} already carried by the chord, line {}", kind.name(), decoration.line);
            return;
        }
        let line = decoration.line;
        match role {
            PairRole::Stop => match self.voices[index].pending_pairs.remove(&(kind, number)) {
                Some(start) => {
                    let position = self.tree.add_decoration(note, decoration);
                    self.link(kind, start, DecorationSlot { note, position }, number, line);
                }
                None => self.context.warn(
                    WarningKind::OrphanStop,
                    line,
                    format!("{} {} stopped but never started", kind.name(), number),
                ),
            },
            _ => {
                if let Some(previous) = self.voices[index].pending_pairs.insert((kind, number), note) {
                    self.context.warn(
                        WarningKind::OrphanStart,
                        self.tree.note(previous).line,
                        format!("{} {} started again before it stopped", kind.name(), number),
                    );
                    self.drop_start(previous, kind, number);
                }
                self.tree.add_decoration(note, decoration);
            }
        }
    }

    fn chord_sibling_has(&self, note: NoteId, kind: PairKind, role: PairRole, number: u32) -> bool {
        let NoteUplink::Chord(chord) = self.tree.note(note).uplink else {
            return false;
        };
        self.tree
            .chord(chord.target())
            .notes
            .iter()
            .filter(|n| **n != note)
            .any(|n| {
                self.tree
                    .note(*n)
                    .decorations
                    .iter()
                    .any(|d| d.kind.pairing() == Some((kind, role, number)))
            })
    }

    fn link(&mut self, kind: PairKind, start: NoteId, stop: DecorationSlot, number: u32, line: usize) {
        let linked = self
            .tree
            .find_unlinked(start, kind, PairRole::Start, number)
            .and_then(|start| self.tree.link_pair(kind, start, stop));
        if linked.is_none() {
            self.context
                .fault(line, format!("{} {} could not be linked to its start", kind.name(), number));
        }
    }

    fn drop_start(&mut self, note: NoteId, kind: PairKind, number: u32) {
        if let Some(slot) = self.tree.find_unlinked(note, kind, PairRole::Start, number) {
            self.tree.remove_decoration(slot);
            self.refinalize_chord_of(note);
        }
    }
}

fn in_scope(scope: Option<u32>, staff: u32) -> bool {
    scope.map_or(true, |s| s == staff)
}

fn tie_key(kind: NoteKind) -> Option<i32> {
    match kind {
        NoteKind::Pitched(pitch) => Some(pitch.quarter_tone_number()),
        NoteKind::Unpitched { display } => {
            Some(display.map(|p| p.quarter_tone_number()).unwrap_or(i32::MIN))
        }
        NoteKind::Rest { .. } | NoteKind::Skip => None,
    }
}

fn pitch_label(kind: NoteKind) -> String {
    match kind {
        NoteKind::Pitched(pitch) => pitch.to_string(),
        NoteKind::Unpitched { display: Some(pitch) } => format!("unpitched {}", pitch),
        other => other.name().to_string(),
    }
}

fn display_label(display: Option<DisplayDuration>) -> String {
    display
        .map(|d| d.to_string())
        .unwrap_or_else(|| "no type".to_string())
}
