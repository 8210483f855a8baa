//! The score tree: arenas for every node kind plus the construction API
//!
//! All structural edits go through [`ScoreTree`] methods so that uplinks and
//! shortcuts always agree with ownership: placing a node in a container sets
//! its uplink, and placing anything inside a measure (directly, or through a
//! chord, tuplet or grace notes group) sets the measure shortcut of every
//! note below it.

use log::{debug, warn};

use super::arena::{Arena, Idx};
use super::decorations::{Decoration, DecorationKind, PairRole};
use super::links::{
    ChordBeamLink, ChordGraceNotesGroupLink, ChordSlurLink, ChordUplink, DecorationSlot,
    GracePosition, NoteUplink, Pair, PairId, PairKind, Shortcut, TupletUplink, Uplink,
};
use super::notes::{
    Chord, ChordId, GraceMember, GraceNotesGroup, GraceNotesGroupId, Note, NoteId, NoteKind,
    Tuplet, TupletId, TupletMember,
};
use super::score::{
    Measure, MeasureElement, Part, PartGroup, PartGroupElement, Score, Staff, Voice,
};
use crate::models::{TupletFactor, WholeNotes};

pub type PartGroupId = Idx<PartGroup>;
pub type PartId = Idx<Part>;
pub type StaffId = Idx<Staff>;
pub type VoiceId = Idx<Voice>;
pub type MeasureId = Idx<Measure>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTree {
    source_name: String,
    score: Score,
    part_groups: Arena<PartGroup>,
    parts: Arena<Part>,
    staves: Arena<Staff>,
    voices: Arena<Voice>,
    measures: Arena<Measure>,
    notes: Arena<Note>,
    chords: Arena<Chord>,
    tuplets: Arena<Tuplet>,
    grace_groups: Arena<GraceNotesGroup>,
    pairs: Arena<Pair>,
}

impl ScoreTree {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            ..Self::default()
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn score_mut(&mut self) -> &mut Score {
        &mut self.score
    }

    pub fn part_group(&self, id: PartGroupId) -> &PartGroup {
        &self.part_groups[id]
    }

    pub fn part_group_mut(&mut self, id: PartGroupId) -> &mut PartGroup {
        &mut self.part_groups[id]
    }

    pub fn part(&self, id: PartId) -> &Part {
        &self.parts[id]
    }

    pub fn part_mut(&mut self, id: PartId) -> &mut Part {
        &mut self.parts[id]
    }

    pub fn staff(&self, id: StaffId) -> &Staff {
        &self.staves[id]
    }

    pub fn staff_mut(&mut self, id: StaffId) -> &mut Staff {
        &mut self.staves[id]
    }

    pub fn voice(&self, id: VoiceId) -> &Voice {
        &self.voices[id]
    }

    pub fn voice_mut(&mut self, id: VoiceId) -> &mut Voice {
        &mut self.voices[id]
    }

    pub fn measure(&self, id: MeasureId) -> &Measure {
        &self.measures[id]
    }

    pub fn measure_mut(&mut self, id: MeasureId) -> &mut Measure {
        &mut self.measures[id]
    }

    pub fn note(&self, id: NoteId) -> &Note {
        &self.notes[id]
    }

    pub fn note_mut(&mut self, id: NoteId) -> &mut Note {
        &mut self.notes[id]
    }

    pub fn chord(&self, id: ChordId) -> &Chord {
        &self.chords[id]
    }

    pub fn chord_mut(&mut self, id: ChordId) -> &mut Chord {
        &mut self.chords[id]
    }

    pub fn tuplet(&self, id: TupletId) -> &Tuplet {
        &self.tuplets[id]
    }

    pub fn grace_group(&self, id: GraceNotesGroupId) -> &GraceNotesGroup {
        &self.grace_groups[id]
    }

    pub fn grace_group_mut(&mut self, id: GraceNotesGroupId) -> &mut GraceNotesGroup {
        &mut self.grace_groups[id]
    }

    pub fn pair(&self, id: PairId) -> &Pair {
        &self.pairs[id]
    }

    /// Every pair ever linked, including pairs whose notes were later pruned
    pub fn pairs(&self) -> impl Iterator<Item = (PairId, &Pair)> {
        self.pairs.iter()
    }

    // ------------------------------------------------------------------------
    // Hierarchy construction
    // ------------------------------------------------------------------------

    /// Add a part group under `parent`, or under the score when `parent` is `None`
    pub fn add_part_group(&mut self, parent: Option<PartGroupId>, mut group: PartGroup) -> PartGroupId {
        group.uplink = parent.map(Uplink::new);
        let id = self.part_groups.alloc(group);
        match parent {
            Some(parent) => self.part_groups[parent]
                .elements
                .push(PartGroupElement::PartGroup(id)),
            None => self.score.part_groups.push(id),
        }
        id
    }

    pub fn add_part(&mut self, group: PartGroupId, id: impl Into<String>, line: usize) -> PartId {
        let part = self.parts.alloc(Part {
            line,
            id: id.into(),
            name: None,
            abbreviation: None,
            staves: Vec::new(),
            uplink: Uplink::new(group),
        });
        self.part_groups[group]
            .elements
            .push(PartGroupElement::Part(part));
        part
    }

    /// Staff `number` of `part`, created in number order if missing
    pub fn staff_for(&mut self, part: PartId, number: u32, line: usize) -> StaffId {
        if let Some(existing) = self.find_staff(part, number) {
            return existing;
        }
        let staff = self.staves.alloc(Staff {
            line,
            number,
            voices: Vec::new(),
            uplink: Uplink::new(part),
        });
        let position = self.parts[part]
            .staves
            .iter()
            .position(|s| self.staves[*s].number > number)
            .unwrap_or(self.parts[part].staves.len());
        self.parts[part].staves.insert(position, staff);
        staff
    }

    pub fn find_staff(&self, part: PartId, number: u32) -> Option<StaffId> {
        self.parts[part]
            .staves
            .iter()
            .copied()
            .find(|s| self.staves[*s].number == number)
    }

    pub fn add_voice(&mut self, staff: StaffId, number: u32, line: usize) -> VoiceId {
        let voice = self.voices.alloc(Voice {
            line,
            number,
            measures: Vec::new(),
            uplink: Uplink::new(staff),
        });
        self.staves[staff].voices.push(voice);
        voice
    }

    pub fn find_voice(&self, staff: StaffId, number: u32) -> Option<VoiceId> {
        self.staves[staff]
            .voices
            .iter()
            .copied()
            .find(|v| self.voices[*v].number == number)
    }

    /// Unlist a voice from its staff; its nodes become unreachable
    pub fn remove_voice(&mut self, voice: VoiceId) -> bool {
        let staff = self.voices[voice].uplink.target();
        let voices = &mut self.staves[staff].voices;
        let before = voices.len();
        voices.retain(|v| *v != voice);
        before != voices.len()
    }

    /// Unlist a staff from its part
    pub fn remove_staff(&mut self, staff: StaffId) -> bool {
        let part = self.staves[staff].uplink.target();
        let staves = &mut self.parts[part].staves;
        let before = staves.len();
        staves.retain(|s| *s != staff);
        before != staves.len()
    }

    /// Unlist a part from its group
    pub fn remove_part(&mut self, part: PartId) -> bool {
        let group = self.parts[part].uplink.target();
        let elements = &mut self.part_groups[group].elements;
        let before = elements.len();
        elements.retain(|e| *e != PartGroupElement::Part(part));
        before != elements.len()
    }

    /// Unlist a measure from its voice
    pub fn remove_measure(&mut self, measure: MeasureId) -> bool {
        let voice = self.measures[measure].uplink.target();
        let measures = &mut self.voices[voice].measures;
        let before = measures.len();
        measures.retain(|m| *m != measure);
        before != measures.len()
    }

    pub fn append_measure(&mut self, voice: VoiceId, number: impl Into<String>, line: usize) -> MeasureId {
        let measure = self.measures.alloc(Measure {
            line,
            number: number.into(),
            implicit: false,
            elements: Vec::new(),
            multiple_rest: None,
            uplink: Uplink::new(voice),
        });
        self.voices[voice].measures.push(measure);
        measure
    }

    // ------------------------------------------------------------------------
    // Measure contents
    // ------------------------------------------------------------------------

    pub fn push_element(&mut self, measure: MeasureId, element: MeasureElement) {
        let index = self.measures[measure].elements.len();
        self.insert_element(measure, index, element);
    }

    pub fn insert_element(&mut self, measure: MeasureId, index: usize, element: MeasureElement) {
        let uplink = Uplink::new(measure);
        match element {
            MeasureElement::Note(note) => self.notes[note].uplink = NoteUplink::Measure(uplink),
            MeasureElement::Chord(chord) => self.chords[chord].uplink = ChordUplink::Measure(uplink),
            MeasureElement::Tuplet(tuplet) => {
                self.tuplets[tuplet].uplink = TupletUplink::Measure(uplink)
            }
            _ => {}
        }
        self.propagate_measure(&element, measure);
        self.measures[measure].elements.insert(index, element);
    }

    pub fn new_note(&mut self, note: Note) -> NoteId {
        self.notes.alloc(note)
    }

    pub fn new_chord(&mut self, line: usize) -> ChordId {
        self.chords.alloc(Chord::new(line))
    }

    /// Add a member to a chord; the first member fixes the chord's durations
    pub fn add_chord_note(&mut self, chord: ChordId, note: NoteId) {
        let (measure, tuplet) = (self.chords[chord].measure, self.chords[chord].tuplet);
        {
            let n = &mut self.notes[note];
            n.uplink = NoteUplink::Chord(Uplink::new(chord));
            n.measure = measure;
            n.tuplet = tuplet;
        }
        let (sounding, display) = (self.notes[note].sounding, self.notes[note].display);
        let c = &mut self.chords[chord];
        if c.notes.is_empty() {
            c.sounding = sounding;
            c.display = display;
        }
        c.notes.push(note);
        if let Some(measure) = measure {
            self.propagate_grace_groups(note, measure.target());
        }
    }

    /// Replace an already placed note by a chord holding it as first member.
    ///
    /// Returns `None` when the note is detached or already a chord member.
    pub fn convert_to_chord(&mut self, note: NoteId) -> Option<ChordId> {
        let line = self.notes[note].line;
        let uplink = self.notes[note].uplink;
        let chord = self.chords.next_idx();
        let chord_uplink = match uplink {
            NoteUplink::Measure(m) => {
                let elements = &mut self.measures[m.target()].elements;
                let slot = elements
                    .iter_mut()
                    .find(|e| **e == MeasureElement::Note(note))?;
                *slot = MeasureElement::Chord(chord);
                ChordUplink::Measure(m)
            }
            NoteUplink::Tuplet(t) => {
                let members = &mut self.tuplets[t.target()].members;
                let slot = members.iter_mut().find(|m| **m == TupletMember::Note(note))?;
                *slot = TupletMember::Chord(chord);
                ChordUplink::Tuplet(t)
            }
            NoteUplink::GraceNotesGroup(g) => {
                let members = &mut self.grace_groups[g.target()].members;
                let slot = members.iter_mut().find(|m| **m == GraceMember::Note(note))?;
                *slot = GraceMember::Chord(chord);
                ChordUplink::GraceNotesGroup(g)
            }
            NoteUplink::Chord(_) | NoteUplink::Detached => return None,
        };
        let mut new_chord = Chord::new(line);
        new_chord.uplink = chord_uplink;
        new_chord.measure = self.notes[note].measure;
        new_chord.tuplet = self.notes[note].tuplet;
        let allocated = self.chords.alloc(new_chord);
        debug_assert_eq!(allocated, chord);
        self.add_chord_note(chord, note);
        Some(chord)
    }

    /// Build the chord's beam, slur and grace notes links from its members.
    ///
    /// The first member carrying a given beam number, or a given slur role and
    /// number, provides the link; later carriers are not linked.
    pub fn finalize_chord(&mut self, chord: ChordId) {
        let members = self.chords[chord].notes.clone();
        let uplink = Uplink::new(chord);
        let mut beam_links: Vec<ChordBeamLink> = Vec::new();
        let mut slur_links: Vec<ChordSlurLink> = Vec::new();
        let mut seen_beams = Vec::new();
        let mut seen_slurs = Vec::new();
        for note in &members {
            for (position, decoration) in self.notes[*note].decorations.iter().enumerate() {
                let slot = DecorationSlot {
                    note: *note,
                    position,
                };
                match decoration.kind {
                    DecorationKind::Beam { number, .. } if !seen_beams.contains(&number) => {
                        seen_beams.push(number);
                        beam_links.push(ChordBeamLink {
                            original: slot,
                            chord: uplink,
                        });
                    }
                    DecorationKind::Slur { role, number, .. } if !seen_slurs.contains(&(role, number)) => {
                        seen_slurs.push((role, number));
                        slur_links.push(ChordSlurLink {
                            original: slot,
                            chord: uplink,
                        });
                    }
                    _ => {}
                }
            }
        }
        let first = members.first().map(|n| &self.notes[*n]);
        let grace_before = first.and_then(|n| n.grace_before).map(|group| ChordGraceNotesGroupLink {
            group,
            position: GracePosition::Before,
            chord: uplink,
        });
        let grace_after = first.and_then(|n| n.grace_after).map(|group| ChordGraceNotesGroupLink {
            group,
            position: GracePosition::After,
            chord: uplink,
        });
        let c = &mut self.chords[chord];
        c.beam_links = beam_links;
        c.slur_links = slur_links;
        c.grace_before = grace_before;
        c.grace_after = grace_after;
    }

    pub fn new_tuplet(&mut self, line: usize, number: u32, factor: TupletFactor) -> TupletId {
        self.tuplets.alloc(Tuplet::new(line, number, factor))
    }

    pub fn add_tuplet_member(&mut self, tuplet: TupletId, member: TupletMember) {
        let uplink = Uplink::new(tuplet);
        let shortcut = Some(Shortcut::new(tuplet));
        match member {
            TupletMember::Note(note) => {
                let n = &mut self.notes[note];
                n.uplink = NoteUplink::Tuplet(uplink);
                n.tuplet = shortcut;
            }
            TupletMember::Chord(chord) => {
                self.chords[chord].uplink = ChordUplink::Tuplet(uplink);
                self.chords[chord].tuplet = shortcut;
                for note in self.chords[chord].notes.clone() {
                    self.notes[note].tuplet = shortcut;
                }
            }
            TupletMember::Tuplet(inner) => {
                self.tuplets[inner].uplink = TupletUplink::Tuplet(uplink);
            }
        }
        self.tuplets[tuplet].members.push(member);
        if let Some(measure) = self.tuplets[tuplet].measure {
            self.propagate_measure(&member.into(), measure.target());
        }
    }

    pub fn new_grace_group(&mut self, line: usize, position: GracePosition, slashed: bool) -> GraceNotesGroupId {
        self.grace_groups
            .alloc(GraceNotesGroup::new(line, position, slashed))
    }

    pub fn add_grace_member(&mut self, group: GraceNotesGroupId, member: GraceMember) {
        let uplink = Uplink::new(group);
        match member {
            GraceMember::Note(note) => self.notes[note].uplink = NoteUplink::GraceNotesGroup(uplink),
            GraceMember::Chord(chord) => {
                self.chords[chord].uplink = ChordUplink::GraceNotesGroup(uplink)
            }
        }
        self.grace_groups[group].members.push(member);
    }

    /// Hang a grace notes group before or after its principal note
    pub fn attach_grace_group(&mut self, note: NoteId, group: GraceNotesGroupId) {
        self.grace_groups[group].owner = Some(Uplink::new(note));
        match self.grace_groups[group].position {
            GracePosition::Before => self.notes[note].grace_before = Some(group),
            GracePosition::After => self.notes[note].grace_after = Some(group),
        }
        if let Some(measure) = self.notes[note].measure {
            self.propagate_grace_groups(note, measure.target());
        }
    }

    fn propagate_measure(&mut self, element: &MeasureElement, measure: MeasureId) {
        let shortcut = Some(Shortcut::new(measure));
        match *element {
            MeasureElement::Note(note) => {
                self.notes[note].measure = shortcut;
                self.propagate_grace_groups(note, measure);
            }
            MeasureElement::Chord(chord) => {
                self.chords[chord].measure = shortcut;
                for note in self.chords[chord].notes.clone() {
                    self.notes[note].measure = shortcut;
                    self.propagate_grace_groups(note, measure);
                }
            }
            MeasureElement::Tuplet(tuplet) => {
                self.tuplets[tuplet].measure = shortcut;
                for member in self.tuplets[tuplet].members.clone() {
                    self.propagate_measure(&member.into(), measure);
                }
            }
            _ => {}
        }
    }

    fn propagate_grace_groups(&mut self, note: NoteId, measure: MeasureId) {
        let shortcut = Some(Shortcut::new(measure));
        let groups = [self.notes[note].grace_before, self.notes[note].grace_after];
        for group in groups.into_iter().flatten() {
            for member in self.grace_groups[group].members.clone() {
                match member {
                    GraceMember::Note(n) => self.notes[n].measure = shortcut,
                    GraceMember::Chord(c) => {
                        self.chords[c].measure = shortcut;
                        for n in self.chords[c].notes.clone() {
                            self.notes[n].measure = shortcut;
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Decorations and pairs
    // ------------------------------------------------------------------------

    /// Insert a decoration keeping the list sorted by rank; returns its position
    pub fn add_decoration(&mut self, note: NoteId, decoration: Decoration) -> usize {
        let decorations = &mut self.notes[note].decorations;
        let position = decorations
            .iter()
            .position(|d| d.rank() > decoration.rank())
            .unwrap_or(decorations.len());
        decorations.insert(position, decoration);
        position
    }

    /// Remove an unpaired decoration
    pub fn remove_decoration(&mut self, slot: DecorationSlot) -> Option<Decoration> {
        let decorations = &mut self.notes[slot.note].decorations;
        let decoration = decorations.get(slot.position)?;
        if decoration.kind.pair().is_some() {
            return None;
        }
        Some(decorations.remove(slot.position))
    }

    /// Locate the unlinked decoration of `kind` with `role` and `number` on `note`
    pub fn find_unlinked(&self, note: NoteId, kind: PairKind, role: PairRole, number: u32) -> Option<DecorationSlot> {
        self.notes[note]
            .decorations
            .iter()
            .position(|d| {
                d.kind.pair().is_none() && d.kind.pairing() == Some((kind, role, number))
            })
            .map(|position| DecorationSlot { note, position })
    }

    /// Link the start and stop decorations of a paired construct.
    ///
    /// Both ends get the same [`PairId`] in one step. Returns `None`, changing
    /// nothing, unless `start` is an unlinked start of `kind` and `stop` an
    /// unlinked stop of the same kind.
    pub fn link_pair(&mut self, kind: PairKind, start: DecorationSlot, stop: DecorationSlot) -> Option<PairId> {
        let start_kind = self.notes[start.note].decorations.get(start.position)?.kind.clone();
        let stop_kind = &self.notes[stop.note].decorations.get(stop.position)?.kind;
        match (start_kind.pairing(), stop_kind.pairing()) {
            (Some((k1, PairRole::Start, _)), Some((k2, PairRole::Stop, _))) if k1 == kind && k2 == kind => {}
            _ => return None,
        }
        if start_kind.pair().is_some() || stop_kind.pair().is_some() {
            return None;
        }
        let id = self.pairs.alloc(Pair {
            kind,
            start: start.note,
            stop: stop.note,
        });
        self.notes[start.note].decorations[start.position].kind.set_pair(id);
        let stop_decoration = &mut self.notes[stop.note].decorations[stop.position].kind;
        stop_decoration.set_pair(id);
        if let (
            DecorationKind::Wedge { kind: wedge_kind, .. },
            DecorationKind::Wedge { kind: stop_wedge, .. },
        ) = (&start_kind, stop_decoration)
        {
            *stop_wedge = *wedge_kind;
        }
        debug!("linked {} {:?} -> {:?}", kind.name(), start.note, stop.note);
        Some(id)
    }

    // ------------------------------------------------------------------------
    // Navigation and durations
    // ------------------------------------------------------------------------

    /// Part groups, then parts, depth first in document order
    pub fn parts_in_order(&self) -> Vec<PartId> {
        fn walk(tree: &ScoreTree, group: PartGroupId, out: &mut Vec<PartId>) {
            for element in &tree.part_groups[group].elements {
                match *element {
                    PartGroupElement::Part(part) => out.push(part),
                    PartGroupElement::PartGroup(inner) => walk(tree, inner, out),
                }
            }
        }
        let mut parts = Vec::new();
        for group in &self.score.part_groups {
            walk(self, *group, &mut parts);
        }
        parts
    }

    /// Voices of a part, staff by staff
    pub fn voices_of_part(&self, part: PartId) -> Vec<VoiceId> {
        self.parts[part]
            .staves
            .iter()
            .flat_map(|s| self.staves[*s].voices.iter().copied())
            .collect()
    }

    pub fn voice_of_measure(&self, measure: MeasureId) -> VoiceId {
        self.measures[measure].uplink.target()
    }

    pub fn staff_of_voice(&self, voice: VoiceId) -> StaffId {
        self.voices[voice].uplink.target()
    }

    pub fn part_of_staff(&self, staff: StaffId) -> PartId {
        self.staves[staff].uplink.target()
    }

    /// Factor of `tuplet` composed with every enclosing tuplet.
    ///
    /// The builder rejects nestings whose product overflows; should one
    /// reach here anyway, composition stops at the overflowing level.
    pub fn composed_factor(&self, tuplet: TupletId) -> TupletFactor {
        let mut factor = self.tuplets[tuplet].factor;
        let mut current = self.tuplets[tuplet].uplink;
        while let TupletUplink::Tuplet(outer) = current {
            let outer = &self.tuplets[outer.target()];
            match outer.factor.compose(factor) {
                Some(composed) => factor = composed,
                None => {
                    warn!("tuplet factors overflow at line {}", outer.line);
                    break;
                }
            }
            current = outer.uplink;
        }
        factor
    }

    /// Composed factor applying to a note, identity outside tuplets
    pub fn note_factor(&self, note: NoteId) -> TupletFactor {
        self.notes[note]
            .tuplet
            .map(|t| self.composed_factor(t.target()))
            .unwrap_or_else(TupletFactor::identity)
    }

    pub fn tuplet_sounding(&self, tuplet: TupletId) -> WholeNotes {
        self.tuplets[tuplet]
            .members
            .iter()
            .map(|m| match *m {
                TupletMember::Note(n) => self.notes[n].sounding,
                TupletMember::Chord(c) => self.chords[c].sounding,
                TupletMember::Tuplet(t) => self.tuplet_sounding(t),
            })
            .sum()
    }

    pub fn element_sounding(&self, element: &MeasureElement) -> WholeNotes {
        match *element {
            MeasureElement::Note(n) => self.notes[n].sounding,
            MeasureElement::Chord(c) => self.chords[c].sounding,
            MeasureElement::Tuplet(t) => self.tuplet_sounding(t),
            _ => WholeNotes::zero(),
        }
    }

    /// Summed sounding duration of a measure
    pub fn measure_sounding(&self, measure: MeasureId) -> WholeNotes {
        self.measures[measure]
            .elements
            .iter()
            .map(|e| self.element_sounding(e))
            .sum()
    }

    /// Whether a measure holds only rests and skips (attributes allowed)
    pub fn is_rest_only(&self, measure: MeasureId) -> bool {
        self.measures[measure].elements.iter().all(|e| match *e {
            MeasureElement::Note(n) => {
                let note = &self.notes[n];
                note.is_rest() || note.kind == NoteKind::Skip
            }
            MeasureElement::Chord(_) | MeasureElement::Tuplet(_) => false,
            _ => true,
        })
    }
}

impl From<TupletMember> for MeasureElement {
    fn from(member: TupletMember) -> Self {
        match member {
            TupletMember::Note(n) => MeasureElement::Note(n),
            TupletMember::Chord(c) => MeasureElement::Chord(c),
            TupletMember::Tuplet(t) => MeasureElement::Tuplet(t),
        }
    }
}
