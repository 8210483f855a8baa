//! Score tree → MusicXML tree
//!
//! The regenerated document reads back into a score tree with the same
//! structure: one partwise part per score part, voices of a measure written
//! one after the other with `<backup>` between them, decorations the builder
//! reads from `<direction>` written as directions before their note.
//!
//! MusicXML interleaves voices inside each measure, so parts are written
//! measure by measure across voices rather than through a single browse.

use std::collections::HashSet;

use log::{debug, info};

use crate::context::RunContext;
use crate::ir::{
    ArticulationKind, BarLine, ChordId, Clef, Decoration, DecorationKind, GraceMember,
    GraceNotesGroupId, Key, MeasureElement, MeasureId, Note, NoteId, NoteKind, PairRole, Part,
    PartGroupElement, PartGroupId, PartId, RepeatDirection, ScoreTree, SpannerKind, Tempo, Time, TupletId,
    TupletMember, Visitor, VoiceId, WedgeKind,
};
use crate::models::{Pitch, TupletFactor, WholeNotes};
use crate::musicxml::{MusicXmlElement, MusicXmlTree};
use crate::utils::{gcd, lcm};

const SOFTWARE: &str = concat!("score-ir ", env!("CARGO_PKG_VERSION"));

/// Regenerate a partwise MusicXML tree from a score tree
pub fn score_to_musicxml(tree: &ScoreTree, context: &mut RunContext) -> MusicXmlTree {
    let divisions = divisions_for(tree);
    debug!("regenerating MusicXML with {} division(s) per quarter", divisions);

    let mut root = MusicXmlElement::new("score-partwise").with_attribute("version", "4.0");
    identification_elements(tree, &mut root);

    let mut part_list = MusicXmlElement::new("part-list");
    for &group in &tree.score().part_groups {
        part_list_entries(tree, group, &mut part_list);
    }
    root.push(part_list);

    let parts = tree.parts_in_order();
    for &part in &parts {
        let mut writer = PartWriter::new(tree, context, part, divisions);
        root.push(writer.write());
    }
    info!("regenerated MusicXML for {} part(s)", parts.len());
    MusicXmlTree::new(tree.source_name(), root)
}

// ============================================================================
// DIVISIONS
// ============================================================================

/// Collects the denominators of every sounding duration
#[derive(Default)]
struct DenominatorVisitor {
    lcm: i64,
}

impl Visitor for DenominatorVisitor {
    fn visit_note_start(&mut self, _tree: &ScoreTree, _id: NoteId, note: &Note) {
        if note.sounding.is_zero() {
            return;
        }
        match lcm(self.lcm, note.sounding.denom()) {
            Some(value) => self.lcm = value,
            None => debug!("divisions overflow at {}, keeping {}", note.sounding, self.lcm),
        }
    }
}

/// Smallest divisions per quarter note expressing every duration exactly
pub fn divisions_for(tree: &ScoreTree) -> i64 {
    let mut visitor = DenominatorVisitor { lcm: 1 };
    tree.browse(&mut visitor);
    (visitor.lcm / gcd(visitor.lcm, 4)).max(1)
}

// ============================================================================
// HEADER AND PART LIST
// ============================================================================

fn identification_elements(tree: &ScoreTree, root: &mut MusicXmlElement) {
    let identification = &tree.score().identification;
    if let Some(title) = &identification.work_title {
        root.push(MusicXmlElement::new("work").with_child(MusicXmlElement::text_element("work-title", title)));
    }
    if let Some(title) = &identification.movement_title {
        root.push(MusicXmlElement::text_element("movement-title", title));
    }

    let mut ident = MusicXmlElement::new("identification");
    for composer in &identification.composers {
        ident.push(MusicXmlElement::text_element("creator", composer).with_attribute("type", "composer"));
    }
    for arranger in &identification.arrangers {
        ident.push(MusicXmlElement::text_element("creator", arranger).with_attribute("type", "arranger"));
    }
    for rights in &identification.rights {
        ident.push(MusicXmlElement::text_element("rights", rights));
    }
    let mut encoding = MusicXmlElement::new("encoding");
    for software in &identification.software {
        encoding.push(MusicXmlElement::text_element("software", software));
    }
    if identification.software.is_empty() {
        encoding.push(MusicXmlElement::text_element("software", SOFTWARE));
    }
    ident.push(encoding);
    root.push(ident);
}

fn score_part(part: &Part) -> MusicXmlElement {
    let mut name = MusicXmlElement::new("part-name");
    name.text = part.name.clone();
    let mut element = MusicXmlElement::new("score-part")
        .with_attribute("id", &part.id)
        .with_child(name);
    if let Some(abbreviation) = &part.abbreviation {
        element.push(MusicXmlElement::text_element("part-abbreviation", abbreviation));
    }
    element
}

/// Explicit groups become start/stop pairs around their contents
fn part_list_entries(tree: &ScoreTree, group: PartGroupId, part_list: &mut MusicXmlElement) {
    let g = tree.part_group(group);
    if !g.implicit {
        let mut start = MusicXmlElement::new("part-group")
            .with_attribute("type", "start")
            .with_attribute("number", g.number);
        if let Some(name) = &g.name {
            start.push(MusicXmlElement::text_element("group-name", name));
        }
        start.push(MusicXmlElement::text_element("group-symbol", g.symbol.musicxml_name()));
        if g.barline {
            start.push(MusicXmlElement::text_element("group-barline", "yes"));
        }
        part_list.push(start);
    }
    for element in &g.elements {
        match *element {
            PartGroupElement::Part(part) => part_list.push(score_part(tree.part(part))),
            PartGroupElement::PartGroup(inner) => part_list_entries(tree, inner, part_list),
        }
    }
    if !g.implicit {
        part_list.push(
            MusicXmlElement::new("part-group")
                .with_attribute("type", "stop")
                .with_attribute("number", g.number),
        );
    }
}

// ============================================================================
// NOTES
// ============================================================================

/// One `<note>` to write, with the tuplet marks it carries
#[derive(Debug)]
struct NoteItem {
    note: NoteId,
    /// Innermost enclosing tuplet, for `<time-modification>`
    tuplet: Option<TupletId>,
    chord_member: bool,
    /// `(number, factor)`, outermost first
    tuplet_starts: Vec<(u32, TupletFactor)>,
    tuplet_stops: Vec<u32>,
}

impl NoteItem {
    fn new(note: NoteId, tuplet: Option<TupletId>) -> Self {
        Self {
            note,
            tuplet,
            chord_member: false,
            tuplet_starts: Vec::new(),
            tuplet_stops: Vec::new(),
        }
    }

    /// Principal notes open and close tuplets; grace notes and later chord members do not
    fn is_principal(&self, tree: &ScoreTree) -> bool {
        !self.chord_member && !tree.note(self.note).grace
    }
}

fn flatten_grace_group(tree: &ScoreTree, group: GraceNotesGroupId, out: &mut Vec<NoteItem>) {
    for member in &tree.grace_group(group).members {
        match *member {
            GraceMember::Note(note) => out.push(NoteItem::new(note, None)),
            GraceMember::Chord(chord) => flatten_chord_members(tree, chord, None, out),
        }
    }
}

fn flatten_chord_members(tree: &ScoreTree, chord: ChordId, tuplet: Option<TupletId>, out: &mut Vec<NoteItem>) {
    for (i, &note) in tree.chord(chord).notes.iter().enumerate() {
        let mut item = NoteItem::new(note, tuplet);
        item.chord_member = i > 0;
        out.push(item);
    }
}

fn flatten_note(tree: &ScoreTree, note: NoteId, tuplet: Option<TupletId>, out: &mut Vec<NoteItem>) {
    let n = tree.note(note);
    if let Some(group) = n.grace_before {
        flatten_grace_group(tree, group, out);
    }
    out.push(NoteItem::new(note, tuplet));
    if let Some(group) = n.grace_after {
        flatten_grace_group(tree, group, out);
    }
}

fn flatten_chord(tree: &ScoreTree, chord: ChordId, tuplet: Option<TupletId>, out: &mut Vec<NoteItem>) {
    let c = tree.chord(chord);
    if let Some(link) = c.grace_before {
        flatten_grace_group(tree, link.group, out);
    }
    flatten_chord_members(tree, chord, tuplet, out);
    if let Some(link) = c.grace_after {
        flatten_grace_group(tree, link.group, out);
    }
}

/// Flatten a tuplet; `depth` numbers nested tuplets from 1 outward in
fn flatten_tuplet(tree: &ScoreTree, tuplet: TupletId, depth: u32, out: &mut Vec<NoteItem>) {
    let from = out.len();
    for member in &tree.tuplet(tuplet).members {
        match *member {
            TupletMember::Note(note) => flatten_note(tree, note, Some(tuplet), out),
            TupletMember::Chord(chord) => flatten_chord(tree, chord, Some(tuplet), out),
            TupletMember::Tuplet(inner) => flatten_tuplet(tree, inner, depth + 1, out),
        }
    }
    let factor = tree.tuplet(tuplet).factor;
    let first = (from..out.len()).find(|&i| out[i].is_principal(tree));
    let last = (from..out.len()).rev().find(|&i| out[i].is_principal(tree));
    if let (Some(first), Some(last)) = (first, last) {
        out[first].tuplet_starts.insert(0, (depth, factor));
        out[last].tuplet_stops.push(depth);
    }
}

fn pitch_element(name: &str, step: &str, octave: &str, pitch: Pitch) -> MusicXmlElement {
    let mut element = MusicXmlElement::new(name).with_child(MusicXmlElement::text_element(step, pitch.step.letter()));
    if let Some(alter) = pitch.alteration.musicxml_alter() {
        element.push(MusicXmlElement::text_element("alter", alter));
    }
    element.with_child(MusicXmlElement::text_element(octave, pitch.octave))
}

fn placed(mut element: MusicXmlElement, decoration: &Decoration) -> MusicXmlElement {
    if let Some(placement) = decoration.placement {
        element = element.with_attribute("placement", placement.musicxml_name());
    }
    element
}

/// Append to the last child named `group`, creating it when needed
fn grouped(notations: &mut MusicXmlElement, group: &str, child: MusicXmlElement) {
    match notations.children.last_mut() {
        Some(last) if last.name == group => last.push(child),
        _ => notations.push(MusicXmlElement::new(group).with_child(child)),
    }
}

/// Decorations read back from `<direction>`: dynamics, words, pedals,
/// wedges, dashes and brackets
fn direction_type(decoration: &Decoration) -> Option<MusicXmlElement> {
    let element = match &decoration.kind {
        DecorationKind::Dynamic(kind) => {
            MusicXmlElement::new("dynamics").with_child(MusicXmlElement::new(kind.musicxml_name()))
        }
        DecorationKind::Words(text) => MusicXmlElement::text_element("words", text),
        DecorationKind::Pedal(kind) => MusicXmlElement::new("pedal").with_attribute("type", kind.musicxml_name()),
        DecorationKind::Wedge { kind, role, number, .. } => {
            let wedge_type = match (role, kind) {
                (PairRole::Start, WedgeKind::Crescendo) => "crescendo",
                (PairRole::Start, WedgeKind::Diminuendo) => "diminuendo",
                (PairRole::Stop, _) => "stop",
                (PairRole::Continue, _) => "continue",
            };
            MusicXmlElement::new("wedge")
                .with_attribute("type", wedge_type)
                .with_attribute("number", number)
        }
        DecorationKind::Spanner {
            kind: SpannerKind::Dashes,
            role,
            number,
            ..
        } => MusicXmlElement::new("dashes")
            .with_attribute("type", role.musicxml_name())
            .with_attribute("number", number),
        DecorationKind::Ligature { role, number, .. } => MusicXmlElement::new("bracket")
            .with_attribute("type", role.musicxml_name())
            .with_attribute("number", number)
            .with_attribute("line-end", "none"),
        _ => return None,
    };
    Some(element)
}

fn notations_for(decorations: &[Decoration], tuplet_starts: &[(u32, TupletFactor)], tuplet_stops: &[u32]) -> MusicXmlElement {
    let mut notations = MusicXmlElement::new("notations");
    for decoration in decorations {
        match &decoration.kind {
            DecorationKind::Tie { role, .. } => {
                notations.push(MusicXmlElement::new("tied").with_attribute("type", role.musicxml_name()))
            }
            DecorationKind::Slur { role, number, .. } => notations.push(placed(
                MusicXmlElement::new("slur")
                    .with_attribute("type", role.musicxml_name())
                    .with_attribute("number", number),
                decoration,
            )),
            DecorationKind::Articulation(ArticulationKind::Fermata) if decoration.placement.is_none() => {
                notations.push(MusicXmlElement::new("fermata"))
            }
            DecorationKind::Articulation(kind) => grouped(
                &mut notations,
                "articulations",
                placed(MusicXmlElement::new(kind.musicxml_name()), decoration),
            ),
            DecorationKind::Technical { kind, text } => {
                let mut element = placed(MusicXmlElement::new(kind.musicxml_name()), decoration);
                element.text = text.clone();
                grouped(&mut notations, "technical", element);
            }
            DecorationKind::Ornament(kind) => grouped(
                &mut notations,
                "ornaments",
                placed(MusicXmlElement::new(kind.musicxml_name()), decoration),
            ),
            DecorationKind::Spanner {
                kind: SpannerKind::WavyLine,
                role,
                number,
                ..
            } => grouped(
                &mut notations,
                "ornaments",
                placed(
                    MusicXmlElement::new("wavy-line")
                        .with_attribute("type", role.musicxml_name())
                        .with_attribute("number", number),
                    decoration,
                ),
            ),
            DecorationKind::Glissando { role, number, text } => {
                let mut element = MusicXmlElement::new("glissando")
                    .with_attribute("type", role.musicxml_name())
                    .with_attribute("number", number);
                element.text = text.clone();
                notations.push(element);
            }
            _ => {}
        }
    }
    for (number, factor) in tuplet_starts {
        notations.push(
            MusicXmlElement::new("tuplet")
                .with_attribute("type", "start")
                .with_attribute("number", number)
                .with_child(
                    MusicXmlElement::new("tuplet-actual")
                        .with_child(MusicXmlElement::text_element("tuplet-number", factor.actual)),
                )
                .with_child(
                    MusicXmlElement::new("tuplet-normal")
                        .with_child(MusicXmlElement::text_element("tuplet-number", factor.normal)),
                ),
        );
    }
    for number in tuplet_stops {
        notations.push(
            MusicXmlElement::new("tuplet")
                .with_attribute("type", "stop")
                .with_attribute("number", number),
        );
    }
    notations
}

fn clef_element(clef: &Clef, number: Option<u32>) -> MusicXmlElement {
    let mut element = MusicXmlElement::new("clef");
    if let Some(number) = number {
        element = element.with_attribute("number", number);
    }
    element.push(MusicXmlElement::text_element("sign", clef.sign.musicxml_name()));
    if let Some(line) = clef.staff_line {
        element.push(MusicXmlElement::text_element("line", line));
    }
    if clef.octave_change != 0 {
        element.push(MusicXmlElement::text_element("clef-octave-change", clef.octave_change));
    }
    element
}

fn key_element(key: &Key, number: Option<u32>) -> MusicXmlElement {
    let mut element = MusicXmlElement::new("key");
    if let Some(number) = number {
        element = element.with_attribute("number", number);
    }
    element.push(MusicXmlElement::text_element("fifths", key.fifths));
    if let Some(mode) = key.mode {
        element.push(MusicXmlElement::text_element("mode", mode.musicxml_name()));
    }
    element
}

fn time_element(time: &Time, number: Option<u32>) -> MusicXmlElement {
    let mut element = MusicXmlElement::new("time");
    if let Some(number) = number {
        element = element.with_attribute("number", number);
    }
    if time.senza_misura {
        element.push(MusicXmlElement::new("senza-misura"));
    } else {
        element.push(MusicXmlElement::text_element("beats", time.beats));
        element.push(MusicXmlElement::text_element("beat-type", time.beat_type));
    }
    element
}

fn barline_element(bar_line: &BarLine) -> MusicXmlElement {
    let mut element = MusicXmlElement::new("barline").with_attribute("location", bar_line.location.musicxml_name());
    if let Some(style) = bar_line.style {
        element.push(MusicXmlElement::text_element("bar-style", style.musicxml_name()));
    }
    if let Some(ending) = &bar_line.ending {
        element.push(
            MusicXmlElement::new("ending")
                .with_attribute("number", &ending.number)
                .with_attribute("type", ending.ending_type.musicxml_name()),
        );
    }
    if let Some(repeat) = &bar_line.repeat {
        let direction = match repeat.direction {
            RepeatDirection::Forward => "forward",
            RepeatDirection::Backward => "backward",
        };
        let mut element_repeat = MusicXmlElement::new("repeat").with_attribute("direction", direction);
        if let Some(times) = repeat.times {
            element_repeat = element_repeat.with_attribute("times", times);
        }
        element.push(element_repeat);
    }
    element
}

fn tempo_direction_types(tempo: &Tempo) -> Vec<MusicXmlElement> {
    let mut types = Vec::new();
    if let Some(words) = &tempo.words {
        types.push(MusicXmlElement::new("direction-type").with_child(MusicXmlElement::text_element("words", words)));
    }
    let mut metronome = MusicXmlElement::new("metronome");
    if let Some(unit) = tempo.beat_unit {
        metronome.push(MusicXmlElement::text_element("beat-unit", unit.musicxml_name()));
        for _ in 0..tempo.beat_unit_dots {
            metronome.push(MusicXmlElement::new("beat-unit-dot"));
        }
    }
    if let Some(per_minute) = tempo.per_minute {
        metronome.push(MusicXmlElement::text_element("per-minute", per_minute));
    }
    types.push(MusicXmlElement::new("direction-type").with_child(metronome));
    types
}

// ============================================================================
// PARTS
// ============================================================================

struct PartWriter<'t, 'c> {
    tree: &'t ScoreTree,
    context: &'c mut RunContext,
    part: PartId,
    divisions: i64,
    multi_staff: bool,
    voices: Vec<VoiceId>,
    /// First voice of each staff writes that staff's attributes
    attribute_writers: HashSet<VoiceId>,
}

impl<'t, 'c> PartWriter<'t, 'c> {
    fn new(tree: &'t ScoreTree, context: &'c mut RunContext, part: PartId, divisions: i64) -> Self {
        let staves = &tree.part(part).staves;
        let multi_staff = staves.len() > 1 || staves.iter().any(|&s| tree.staff(s).number != 1);
        let attribute_writers = staves
            .iter()
            .filter_map(|&s| tree.staff(s).voices.first().copied())
            .collect();
        Self {
            tree,
            context,
            part,
            divisions,
            multi_staff,
            voices: tree.voices_of_part(part),
            attribute_writers,
        }
    }

    fn write(&mut self) -> MusicXmlElement {
        let tree = self.tree;
        let mut part = MusicXmlElement::new("part").with_attribute("id", &tree.part(self.part).id);
        let measure_count = self
            .voices
            .iter()
            .map(|&v| tree.voice(v).measures.len())
            .max()
            .unwrap_or(0);

        for index in 0..measure_count {
            let Some(reference) = self
                .voices
                .iter()
                .find_map(|&v| tree.voice(v).measures.get(index).copied())
            else {
                continue;
            };
            let info = tree.measure(reference);
            let mut measure = MusicXmlElement::new("measure").with_attribute("number", &info.number);
            if info.implicit {
                measure = measure.with_attribute("implicit", "yes");
            }
            if index == 0 {
                let mut attributes = MusicXmlElement::new("attributes")
                    .with_child(MusicXmlElement::text_element("divisions", self.divisions));
                if self.multi_staff {
                    attributes.push(MusicXmlElement::text_element("staves", tree.part(self.part).staves.len()));
                }
                measure.push(attributes);
            }
            if let Some(count) = info.multiple_rest {
                measure.push(MusicXmlElement::new("attributes").with_child(
                    MusicXmlElement::new("measure-style")
                        .with_child(MusicXmlElement::text_element("multiple-rest", count)),
                ));
            }

            let mut previous_length = WholeNotes::zero();
            let voices = self.voices.clone();
            for (position, &voice) in voices.iter().enumerate() {
                let Some(&voice_measure) = tree.voice(voice).measures.get(index) else {
                    continue;
                };
                if !previous_length.is_zero() {
                    let duration = self.divisions_of(previous_length, info.line);
                    measure.push(
                        MusicXmlElement::new("backup")
                            .with_child(MusicXmlElement::text_element("duration", duration)),
                    );
                }
                self.write_voice_measure(voice, voice_measure, position == 0, &mut measure);
                previous_length = tree.measure_sounding(voice_measure);
            }
            part.push(measure);
        }
        part
    }

    fn divisions_of(&mut self, length: WholeNotes, line: usize) -> i64 {
        match length.to_divisions(self.divisions) {
            Some(duration) => duration,
            None => {
                self.context
                    .fault(line, format!("{} is not a whole number of divisions", length));
                0
            }
        }
    }

    fn write_voice_measure(&mut self, voice: VoiceId, measure: MeasureId, part_leader: bool, out: &mut MusicXmlElement) {
        let tree = self.tree;
        let writes_attributes = self.attribute_writers.contains(&voice);
        let staff_number = tree.staff(tree.staff_of_voice(voice)).number;
        let voice_number = tree.voice(voice).number;
        let number = self.multi_staff.then_some(staff_number);

        let mut attributes: Option<MusicXmlElement> = None;
        let flush = |attributes: &mut Option<MusicXmlElement>, out: &mut MusicXmlElement| {
            if let Some(element) = attributes.take() {
                out.push(element);
            }
        };
        // MusicXML orders attributes key, time, clef
        let attribute = |attributes: &mut Option<MusicXmlElement>, child: MusicXmlElement| {
            let element = attributes.get_or_insert_with(|| MusicXmlElement::new("attributes"));
            let rank = |name: &str| match name {
                "key" => 0,
                "time" => 1,
                _ => 2,
            };
            let at = element
                .children
                .iter()
                .position(|c| rank(&c.name) > rank(&child.name))
                .unwrap_or(element.children.len());
            element.children.insert(at, child);
        };

        let mut pending_tempo: Vec<&Tempo> = Vec::new();
        for element in &tree.measure(measure).elements {
            match element {
                MeasureElement::Clef(clef) if writes_attributes => {
                    attribute(&mut attributes, clef_element(clef, number))
                }
                MeasureElement::Key(key) if writes_attributes => attribute(&mut attributes, key_element(key, number)),
                MeasureElement::Time(time) if writes_attributes => {
                    attribute(&mut attributes, time_element(time, number))
                }
                MeasureElement::Clef(_) | MeasureElement::Key(_) | MeasureElement::Time(_) => {}
                MeasureElement::BarLine(bar_line) => {
                    flush(&mut attributes, out);
                    if part_leader {
                        out.push(barline_element(bar_line));
                    }
                }
                MeasureElement::Tempo(tempo) => {
                    flush(&mut attributes, out);
                    pending_tempo.push(tempo);
                }
                timed => {
                    flush(&mut attributes, out);
                    for tempo in pending_tempo.drain(..) {
                        out.push(self.tempo_direction(tempo, staff_number, voice_number));
                    }
                    let mut items = Vec::new();
                    match *timed {
                        MeasureElement::Note(note) => flatten_note(tree, note, None, &mut items),
                        MeasureElement::Chord(chord) => flatten_chord(tree, chord, None, &mut items),
                        MeasureElement::Tuplet(tuplet) => flatten_tuplet(tree, tuplet, 1, &mut items),
                        _ => {}
                    }
                    self.write_items(&items, staff_number, voice_number, out);
                }
            }
        }
        flush(&mut attributes, out);
        for tempo in pending_tempo {
            out.push(self.tempo_direction(tempo, staff_number, voice_number));
        }
    }

    fn tempo_direction(&self, tempo: &Tempo, staff: u32, voice: u32) -> MusicXmlElement {
        let mut direction = MusicXmlElement::new("direction").with_attribute("placement", "above");
        for direction_type in tempo_direction_types(tempo) {
            direction.push(direction_type);
        }
        direction
            .with_child(MusicXmlElement::text_element("voice", voice))
            .with_child(MusicXmlElement::text_element("staff", staff))
    }

    fn write_items(&mut self, items: &[NoteItem], staff: u32, voice: u32, out: &mut MusicXmlElement) {
        let tree = self.tree;
        // directions of a chord's members all go before its first member
        let mut index = 0;
        while index < items.len() {
            let end = (index + 1..items.len())
                .find(|&i| !items[i].chord_member)
                .unwrap_or(items.len());
            for item in &items[index..end] {
                for decoration in &tree.note(item.note).decorations {
                    if let Some(direction_type) = direction_type(decoration) {
                        out.push(self.direction(decoration, direction_type, staff, voice));
                    }
                }
            }
            for item in &items[index..end] {
                let element = self.note_element(item, staff, voice);
                out.push(element);
            }
            index = end;
        }
    }

    fn direction(&self, decoration: &Decoration, direction_type: MusicXmlElement, staff: u32, voice: u32) -> MusicXmlElement {
        placed(MusicXmlElement::new("direction"), decoration)
            .with_child(MusicXmlElement::new("direction-type").with_child(direction_type))
            .with_child(MusicXmlElement::text_element("voice", voice))
            .with_child(MusicXmlElement::text_element("staff", staff))
    }

    fn note_element(&mut self, item: &NoteItem, staff: u32, voice: u32) -> MusicXmlElement {
        let tree = self.tree;
        let note = tree.note(item.note);
        if note.kind == NoteKind::Skip {
            let duration = self.divisions_of(note.sounding, note.line);
            return MusicXmlElement::new("forward")
                .with_child(MusicXmlElement::text_element("duration", duration))
                .with_child(MusicXmlElement::text_element("voice", voice))
                .with_child(MusicXmlElement::text_element("staff", staff));
        }

        let mut element = MusicXmlElement::new("note");
        if note.grace {
            let slashed = match note.uplink {
                crate::ir::NoteUplink::GraceNotesGroup(group) => tree.grace_group(group.target()).slashed,
                crate::ir::NoteUplink::Chord(chord) => self.grace_chord_slashed(chord.target()),
                _ => false,
            };
            let mut grace = MusicXmlElement::new("grace");
            if slashed {
                grace = grace.with_attribute("slash", "yes");
            }
            element.push(grace);
        }
        if item.chord_member {
            element.push(MusicXmlElement::new("chord"));
        }
        element.push(match note.kind {
            NoteKind::Pitched(pitch) => pitch_element("pitch", "step", "octave", pitch),
            NoteKind::Rest { display } => {
                let mut rest = match display {
                    Some(pitch) => pitch_element("rest", "display-step", "display-octave", pitch),
                    None => MusicXmlElement::new("rest"),
                };
                if note.measure_rest {
                    rest = rest.with_attribute("measure", "yes");
                }
                rest
            }
            NoteKind::Unpitched { display } => match display {
                Some(pitch) => pitch_element("unpitched", "display-step", "display-octave", pitch),
                None => MusicXmlElement::new("unpitched"),
            },
            NoteKind::Skip => MusicXmlElement::new("rest"),
        });
        if !note.grace {
            let duration = self.divisions_of(note.sounding, note.line);
            element.push(MusicXmlElement::text_element("duration", duration));
        }
        for decoration in &note.decorations {
            if let DecorationKind::Tie { role, .. } = decoration.kind {
                element.push(MusicXmlElement::new("tie").with_attribute("type", role.musicxml_name()));
            }
        }
        element.push(MusicXmlElement::text_element("voice", voice));
        if let Some(display) = note.display {
            element.push(MusicXmlElement::text_element("type", display.note_type.musicxml_name()));
            for _ in 0..display.dots {
                element.push(MusicXmlElement::new("dot"));
            }
        }
        if let Some(accidental) = note.accidental {
            element.push(MusicXmlElement::text_element("accidental", accidental.musicxml_name()));
        }
        if let Some(tuplet) = item.tuplet {
            let factor = tree.composed_factor(tuplet);
            element.push(
                MusicXmlElement::new("time-modification")
                    .with_child(MusicXmlElement::text_element("actual-notes", factor.actual))
                    .with_child(MusicXmlElement::text_element("normal-notes", factor.normal)),
            );
        }
        for decoration in &note.decorations {
            if let DecorationKind::Stem(direction) = decoration.kind {
                element.push(MusicXmlElement::text_element("stem", direction.musicxml_name()));
            }
        }
        if self.multi_staff {
            element.push(MusicXmlElement::text_element("staff", staff));
        }
        for decoration in &note.decorations {
            if let DecorationKind::Beam { number, value } = decoration.kind {
                element.push(MusicXmlElement::text_element("beam", value.musicxml_name()).with_attribute("number", number));
            }
        }
        let notations = notations_for(&note.decorations, &item.tuplet_starts, &item.tuplet_stops);
        if !notations.children.is_empty() {
            element.push(notations);
        }
        element
    }

    fn grace_chord_slashed(&self, chord: ChordId) -> bool {
        match self.tree.chord(chord).uplink {
            crate::ir::ChordUplink::GraceNotesGroup(group) => self.tree.grace_group(group.target()).slashed,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::test_support::{build, note, score, triplet_measure, ATTRIBUTES};
    use crate::ir::flat_view;
    use crate::musicxml::{read_musicxml, write_musicxml};

    fn round_trip(xml: &str) -> (ScoreTree, ScoreTree) {
        let (tree, mut context) = build(xml);
        let regenerated = score_to_musicxml(&tree, &mut context);
        assert!(context.report().faults.is_empty(), "{:?}", context.report().faults);
        let text = write_musicxml(&regenerated).unwrap();
        let (again, context) = build(&text);
        assert!(context.report().errors.is_empty(), "{:?}", context.report().errors);
        (tree, again)
    }

    #[test]
    fn test_divisions_cover_triplets() {
        let (tree, _) = build(&score(&triplet_measure()));
        assert_eq!(divisions_for(&tree), 3);
    }

    #[test]
    fn test_round_trip_keeps_tuplets_and_header() {
        let (tree, again) = round_trip(&score(&triplet_measure()));
        assert_eq!(flat_view(&again), flat_view(&tree));
        assert_eq!(again.score().identification.work_title.as_deref(), Some("Etude"));
        assert_eq!(again.score().identification.software, vec![SOFTWARE.to_string()]);
    }

    #[test]
    fn test_round_trip_keeps_chords_ties_graces_and_directions() {
        let grace = r#"<note><grace slash="yes"/><pitch><step>B</step><octave>4</octave></pitch><voice>1</voice><type>16th</type></note>"#;
        let xml = score(&format!(
            r#"<measure number="1">{attributes}
                 <direction placement="below"><direction-type><dynamics><p/></dynamics></direction-type></direction>
                 {grace}{c}{e}{g}
                 <direction placement="above"><direction-type><words>dolce</words></direction-type></direction>
                 {tie_start}
               </measure>
               <measure number="2">{tie_stop}
                 <barline location="right"><bar-style>light-heavy</bar-style><repeat direction="backward"/></barline>
               </measure>"#,
            attributes = ATTRIBUTES,
            grace = grace,
            c = note("C", 4, 3, "eighth", r#"<beam number="1">begin</beam><notations><slur type="start" number="1"/></notations>"#),
            e = note("E", 4, 3, "eighth", "").replace("<pitch>", "<chord/><pitch>"),
            g = note("G", 4, 3, "eighth", r#"<beam number="1">end</beam><notations><slur type="stop" number="1"/><articulations><accent placement="above"/></articulations></notations>"#),
            tie_start = note("A", 4, 6, "quarter", r#"<notations><tied type="start"/></notations>"#),
            tie_stop = note("A", 4, 12, "half", r#"<notations><tied type="stop"/></notations>"#),
        ));
        let (tree, again) = round_trip(&xml);
        assert_eq!(flat_view(&again), flat_view(&tree));
    }

    #[test]
    fn test_round_trip_keeps_two_voices_and_tempo() {
        let voice_two = |step: &str| {
            format!(
                "<note><pitch><step>{}</step><octave>3</octave></pitch><duration>12</duration><voice>2</voice><type>half</type></note>",
                step
            )
        };
        let xml = score(&format!(
            r#"<measure number="1">{}
                 <direction><direction-type><words>Allegro</words></direction-type>
                   <direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>120</per-minute></metronome></direction-type></direction>
                 {}{}<backup><duration>12</duration></backup>{}</measure>
               <measure number="2">{}<backup><duration>12</duration></backup>{}</measure>"#,
            ATTRIBUTES,
            note("C", 5, 6, "quarter", ""),
            note("D", 5, 6, "quarter", ""),
            voice_two("C"),
            note("E", 5, 12, "half", ""),
            voice_two("G"),
        ));
        let (tree, again) = round_trip(&xml);
        assert_eq!(flat_view(&again), flat_view(&tree));
        assert_eq!(tree.voices_of_part(tree.parts_in_order()[0]).len(), 2);
    }

    #[test]
    fn test_generated_document_declares_partwise_doctype() {
        let (tree, mut context) = build(&score(&triplet_measure()));
        let regenerated = score_to_musicxml(&tree, &mut context);
        let text = write_musicxml(&regenerated).unwrap();
        assert!(text.contains("<!DOCTYPE score-partwise"));
        let read = read_musicxml("again", &text).unwrap();
        let part = read.root.child("part").unwrap();
        assert_eq!(part.attribute("id"), Some("P1"));
        let first = part.child("measure").unwrap();
        assert_eq!(first.descendant(&["attributes", "divisions"]).and_then(|d| d.text.as_deref()), Some("3"));
    }
}
