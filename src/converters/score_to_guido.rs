//! Score tree → Guido Music Notation tree
//!
//! Every voice of every staff becomes one Guido sequence. Durations are
//! written as sounding fractions of a whole note, so tuplets only add a
//! `\tuplet` range around their members.

use log::debug;

use super::{chord_member_decorations, displayed_length, linked_decoration};
use crate::context::RunContext;
use crate::ir::{
    ArticulationKind, BarLine, BarStyle, Chord, ChordId, ChordSlurLink, Clef, ClefSign, Decoration,
    DecorationKind, GraceMember, GraceNotesGroup, GraceNotesGroupId, Idx, Key, Measure,
    MeasureElement, Note, NoteId, NoteKind, OrnamentKind, PairRole, Part, RepeatDirection, Score,
    ScoreTree, Staff, Tempo, Time, Tuplet, Visitor, Voice, WedgeKind,
};
use crate::models::{DisplayDuration, Pitch, TupletFactor, WholeNotes};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuidoScore {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub voices: Vec<GuidoVoice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuidoVoice {
    pub part: String,
    /// Staff number counted across the whole score, from 1
    pub staff: u32,
    pub elements: Vec<GuidoElement>,
}

/// `\name:id<params>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidoTag {
    pub name: String,
    pub id: Option<u32>,
    /// Already spelled parameters, strings quoted
    pub params: Vec<String>,
}

impl GuidoTag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            params: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.params
            .push(format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")));
        self
    }

    pub fn with_number(mut self, number: i64) -> Self {
        self.params.push(number.to_string());
        self
    }
}

/// A note or rest with its duration as a fraction of a whole note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuidoNote {
    /// `None` for rests
    pub pitch: Option<Pitch>,
    pub numerator: i64,
    pub denominator: i64,
    pub dots: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuidoElement {
    Tag(GuidoTag),
    /// `\tag( ... )`
    Range {
        tag: GuidoTag,
        elements: Vec<GuidoElement>,
    },
    Note(GuidoNote),
    Chord(Vec<GuidoNote>),
}

/// Build the Guido tree of a score tree
pub fn score_to_guido(tree: &ScoreTree, context: &mut RunContext) -> GuidoScore {
    let mut builder = GuidoBuilder::new(context);
    tree.browse(&mut builder);
    builder.score
}

fn clef_param(clef: &Clef) -> Option<String> {
    let name = match clef.sign {
        ClefSign::G => format!("g{}", clef.staff_line.unwrap_or(2)),
        ClefSign::F => format!("f{}", clef.staff_line.unwrap_or(4)),
        ClefSign::C => format!("c{}", clef.staff_line.unwrap_or(3)),
        ClefSign::Percussion => "perc".to_string(),
        ClefSign::Tab => "tab".to_string(),
        ClefSign::None => return None,
    };
    Some(match clef.octave_change {
        -1 => format!("{}-8", name),
        1 => format!("{}+8", name),
        _ => name,
    })
}

/// Written value when it is plain, else the displayed length as a fraction
fn guido_note(tree: &ScoreTree, id: NoteId, note: &Note) -> GuidoNote {
    let pitch = match note.kind {
        NoteKind::Pitched(pitch) => Some(pitch),
        NoteKind::Unpitched { display } => display,
        NoteKind::Rest { .. } | NoteKind::Skip => None,
    };
    let unscaled = tree.note_factor(id).as_rational() == TupletFactor::identity().as_rational();
    let plain = note
        .display
        .filter(|d| unscaled && d.note_type.log() >= 0);
    match plain {
        Some(display) => GuidoNote {
            pitch,
            numerator: 1,
            denominator: 1 << display.note_type.log(),
            dots: display.dots,
        },
        None => {
            let length: WholeNotes = displayed_length(tree, &MeasureElement::Note(id));
            GuidoNote {
                pitch,
                numerator: length.numer(),
                denominator: length.denom(),
                dots: 0,
            }
        }
    }
}

/// Articulations and ornaments that Guido writes as ranges around the note
fn range_tag(decoration: &Decoration) -> Option<GuidoTag> {
    let name = match decoration.kind {
        DecorationKind::Articulation(kind) => match kind {
            ArticulationKind::Staccato | ArticulationKind::Staccatissimo => "stacc",
            ArticulationKind::Accent => "accent",
            ArticulationKind::StrongAccent => "marcato",
            ArticulationKind::Tenuto => "ten",
            ArticulationKind::Fermata => "fermata",
            ArticulationKind::BreathMark => "breathMark",
            _ => return None,
        },
        DecorationKind::Ornament(kind) => match kind {
            OrnamentKind::TrillMark => "trill",
            OrnamentKind::Turn | OrnamentKind::DelayedTurn => "turn",
            OrnamentKind::Mordent | OrnamentKind::InvertedMordent => "mord",
            _ => return None,
        },
        _ => return None,
    };
    Some(GuidoTag::new(name))
}

/// Tags written before the note
fn opening_tags(decorations: &[Decoration]) -> Vec<GuidoTag> {
    let mut tags = Vec::new();
    for decoration in decorations {
        let tag = match &decoration.kind {
            DecorationKind::Dynamic(kind) => GuidoTag::new("intens").with_text(kind.musicxml_name()),
            DecorationKind::Words(text) => GuidoTag::new("text").with_text(text),
            DecorationKind::Tie {
                role: PairRole::Start,
                ..
            } => GuidoTag::new("tieBegin"),
            DecorationKind::Slur {
                role: PairRole::Start,
                number,
                ..
            } => GuidoTag::new("slurBegin").with_id(*number),
            DecorationKind::Wedge {
                kind,
                role: PairRole::Start,
                ..
            } => GuidoTag::new(match kind {
                WedgeKind::Crescendo => "crescBegin",
                WedgeKind::Diminuendo => "dimBegin",
            }),
            _ => continue,
        };
        tags.push(tag);
    }
    tags
}

/// Tags written after the note; wedge ends need the kind of the open wedge
fn closing_tags(decorations: &[Decoration], open_wedge: &mut Option<WedgeKind>) -> Vec<GuidoTag> {
    let mut tags = Vec::new();
    for decoration in decorations {
        let tag = match &decoration.kind {
            DecorationKind::Tie {
                role: PairRole::Stop,
                ..
            } => GuidoTag::new("tieEnd"),
            DecorationKind::Slur {
                role: PairRole::Stop,
                number,
                ..
            } => GuidoTag::new("slurEnd").with_id(*number),
            DecorationKind::Wedge {
                role: PairRole::Start,
                kind,
                ..
            } => {
                *open_wedge = Some(*kind);
                continue;
            }
            DecorationKind::Wedge {
                role: PairRole::Stop,
                ..
            } => match open_wedge.take() {
                Some(WedgeKind::Diminuendo) => GuidoTag::new("dimEnd"),
                _ => GuidoTag::new("crescEnd"),
            },
            _ => continue,
        };
        tags.push(tag);
    }
    tags
}

/// Wrap `element` in the range tags of its decorations
fn wrap_in_ranges(element: GuidoElement, decorations: &[Decoration]) -> GuidoElement {
    let mut seen: Vec<GuidoTag> = Vec::new();
    decorations
        .iter()
        .filter_map(range_tag)
        .filter(|tag| {
            let fresh = !seen.contains(tag);
            if fresh {
                seen.push(tag.clone());
            }
            fresh
        })
        .fold(element, |inner, tag| GuidoElement::Range {
            tag,
            elements: vec![inner],
        })
}

/// Visitor assembling a [`GuidoScore`]
pub struct GuidoBuilder<'c> {
    context: &'c mut RunContext,
    score: GuidoScore,
    part_name: String,
    staff_count: u32,
    first_measure: bool,
    /// The voice's elements first, then one container per open tuplet
    stack: Vec<Vec<GuidoElement>>,
    open_wedge: Option<WedgeKind>,
    chord: Option<PendingChord>,
    grace_depth: usize,
}

/// A chord whose slurs are still arriving through its links
struct PendingChord {
    notes: Vec<GuidoNote>,
    decorations: Vec<Decoration>,
}

impl<'c> GuidoBuilder<'c> {
    pub fn new(context: &'c mut RunContext) -> Self {
        Self {
            context,
            score: GuidoScore::default(),
            part_name: String::new(),
            staff_count: 0,
            first_measure: true,
            stack: Vec::new(),
            open_wedge: None,
            chord: None,
            grace_depth: 0,
        }
    }

    fn push(&mut self, line: usize, element: GuidoElement) {
        match self.stack.last_mut() {
            Some(container) => container.push(element),
            None => self.context.fault(line, "Guido element outside of a voice"),
        }
    }

    fn push_tag(&mut self, line: usize, tag: GuidoTag) {
        self.push(line, GuidoElement::Tag(tag));
    }

    fn grace_range(&mut self, tree: &ScoreTree, group: GraceNotesGroupId) -> GuidoElement {
        let elements = tree
            .grace_group(group)
            .members
            .iter()
            .map(|member| match *member {
                GraceMember::Note(n) => GuidoElement::Note(guido_note(tree, n, tree.note(n))),
                GraceMember::Chord(c) => GuidoElement::Chord(
                    tree.chord(c)
                        .notes
                        .iter()
                        .map(|&n| guido_note(tree, n, tree.note(n)))
                        .collect(),
                ),
            })
            .collect();
        GuidoElement::Range {
            tag: GuidoTag::new("grace"),
            elements,
        }
    }

    /// Push `main` between its opening and closing tags and its grace ranges
    fn push_timed(
        &mut self,
        tree: &ScoreTree,
        line: usize,
        main: GuidoElement,
        decorations: &[Decoration],
        grace_before: Option<GraceNotesGroupId>,
        grace_after: Option<GraceNotesGroupId>,
    ) {
        for tag in opening_tags(decorations) {
            self.push_tag(line, tag);
        }
        if let Some(group) = grace_before {
            let range = self.grace_range(tree, group);
            self.push(line, range);
        }
        self.push(line, wrap_in_ranges(main, decorations));
        if let Some(group) = grace_after {
            let range = self.grace_range(tree, group);
            self.push(line, range);
        }
        for tag in closing_tags(decorations, &mut self.open_wedge) {
            self.push_tag(line, tag);
        }
    }
}

impl Visitor for GuidoBuilder<'_> {
    fn visit_score_start(&mut self, _tree: &ScoreTree, score: &Score) {
        self.score.title = score.identification.title().map(str::to_string);
        self.score.composer = score.identification.composers.first().cloned();
    }

    fn visit_part_start(&mut self, _tree: &ScoreTree, _id: Idx<Part>, part: &Part) {
        self.part_name = part.display_name().to_string();
    }

    fn visit_staff_start(&mut self, _tree: &ScoreTree, _id: Idx<Staff>, _staff: &Staff) {
        self.staff_count += 1;
    }

    fn visit_voice_start(&mut self, _tree: &ScoreTree, _id: Idx<Voice>, _voice: &Voice) {
        self.stack = vec![Vec::new()];
        self.first_measure = true;
        self.open_wedge = None;
        let staff = self.staff_count;
        self.push_tag(0, GuidoTag::new("staff").with_number(staff as i64));
        if self.score.voices.is_empty() {
            if let Some(title) = self.score.title.clone() {
                self.push_tag(0, GuidoTag::new("title").with_text(&title));
            }
            if let Some(composer) = self.score.composer.clone() {
                self.push_tag(0, GuidoTag::new("composer").with_text(&composer));
            }
        }
    }

    fn visit_voice_end(&mut self, _tree: &ScoreTree, _id: Idx<Voice>, voice: &Voice) {
        if self.stack.len() != 1 {
            self.context.fault(voice.line, "voice ends inside a tuplet");
        }
        let elements = self.stack.drain(..).flatten().collect();
        self.score.voices.push(GuidoVoice {
            part: self.part_name.clone(),
            staff: self.staff_count,
            elements,
        });
    }

    fn visit_measure_start(&mut self, _tree: &ScoreTree, _id: Idx<Measure>, measure: &Measure) {
        if !self.first_measure {
            self.push_tag(measure.line, GuidoTag::new("bar"));
        }
        self.first_measure = false;
    }

    fn visit_note_start(&mut self, tree: &ScoreTree, id: NoteId, note: &Note) {
        if self.grace_depth > 0 || note.grace || note.is_chord_member() {
            return;
        }
        let main = GuidoElement::Note(guido_note(tree, id, note));
        self.push_timed(tree, note.line, main, &note.decorations, note.grace_before, note.grace_after);
    }

    fn visit_chord_start(&mut self, tree: &ScoreTree, _id: ChordId, chord: &Chord) {
        if self.grace_depth > 0 {
            return;
        }
        if chord.notes.is_empty() {
            self.context.fault(chord.line, "chord without notes");
            return;
        }
        let notes = chord
            .notes
            .iter()
            .map(|&n| guido_note(tree, n, tree.note(n)))
            .collect();
        self.chord = Some(PendingChord {
            notes,
            decorations: chord_member_decorations(tree, chord),
        });
    }

    fn visit_chord_slur_link_start(&mut self, tree: &ScoreTree, link: &ChordSlurLink) {
        if self.grace_depth > 0 {
            return;
        }
        let slur = linked_decoration(tree, link.original).cloned();
        if let (Some(chord), Some(slur)) = (self.chord.as_mut(), slur) {
            chord.decorations.push(slur);
        }
    }

    fn visit_chord_end(&mut self, tree: &ScoreTree, _id: ChordId, chord: &Chord) {
        if self.grace_depth > 0 {
            return;
        }
        if let Some(pending) = self.chord.take() {
            self.push_timed(
                tree,
                chord.line,
                GuidoElement::Chord(pending.notes),
                &pending.decorations,
                chord.grace_before.map(|link| link.group),
                chord.grace_after.map(|link| link.group),
            );
        }
    }

    fn visit_tuplet_start(&mut self, _tree: &ScoreTree, _id: Idx<Tuplet>, _tuplet: &Tuplet) {
        if self.grace_depth == 0 {
            self.stack.push(Vec::new());
        }
    }

    fn visit_tuplet_end(&mut self, _tree: &ScoreTree, _id: Idx<Tuplet>, tuplet: &Tuplet) {
        if self.grace_depth > 0 {
            return;
        }
        if self.stack.len() < 2 {
            self.context.fault(tuplet.line, "tuplet end without a start");
            return;
        }
        let elements = self.stack.pop().unwrap_or_default();
        let tag = GuidoTag::new("tuplet").with_text(&format!("-{}-", tuplet.factor.actual));
        self.push(tuplet.line, GuidoElement::Range { tag, elements });
    }

    fn visit_grace_notes_group_start(&mut self, _tree: &ScoreTree, _id: GraceNotesGroupId, _group: &GraceNotesGroup) {
        self.grace_depth += 1;
    }

    fn visit_grace_notes_group_end(&mut self, _tree: &ScoreTree, _id: GraceNotesGroupId, _group: &GraceNotesGroup) {
        self.grace_depth = self.grace_depth.saturating_sub(1);
    }

    fn visit_clef(&mut self, _tree: &ScoreTree, clef: &Clef) {
        if let Some(param) = clef_param(clef) {
            self.push_tag(clef.line, GuidoTag::new("clef").with_text(&param));
        }
    }

    fn visit_key(&mut self, _tree: &ScoreTree, key: &Key) {
        self.push_tag(key.line, GuidoTag::new("key").with_number(key.fifths as i64));
    }

    fn visit_time(&mut self, _tree: &ScoreTree, time: &Time) {
        if time.senza_misura {
            debug!("senza misura at line {} has no Guido meter", time.line);
            return;
        }
        let meter = format!("{}/{}", time.beats, time.beat_type);
        self.push_tag(time.line, GuidoTag::new("meter").with_text(&meter));
    }

    fn visit_bar_line(&mut self, _tree: &ScoreTree, bar_line: &BarLine) {
        let name = match (bar_line.repeat_direction(), bar_line.style) {
            (Some(RepeatDirection::Forward), _) => "repeatBegin",
            (Some(RepeatDirection::Backward), _) => "repeatEnd",
            (None, Some(BarStyle::LightHeavy)) => "endBar",
            (None, Some(BarStyle::LightLight)) => "doubleBar",
            _ => return,
        };
        self.push_tag(bar_line.line, GuidoTag::new(name));
    }

    fn visit_tempo(&mut self, _tree: &ScoreTree, tempo: &Tempo) {
        let mut tag = GuidoTag::new("tempo").with_text(tempo.words.as_deref().unwrap_or(""));
        if let (Some(unit), Some(per_minute)) = (tempo.beat_unit, tempo.per_minute) {
            let length = DisplayDuration::new(unit, tempo.beat_unit_dots).whole_notes();
            tag = tag.with_text(&format!("{}/{}={}", length.numer(), length.denom(), per_minute));
        }
        self.push_tag(tempo.line, tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::test_support::{build, note, score, triplet_measure, ATTRIBUTES};

    fn convert(xml: &str) -> GuidoScore {
        let (tree, mut context) = build(xml);
        let guido = score_to_guido(&tree, &mut context);
        assert!(context.report().faults.is_empty());
        guido
    }

    #[test]
    fn test_voice_header_and_attributes() {
        let guido = convert(&score(&triplet_measure()));
        assert_eq!(guido.voices.len(), 1);
        let elements = &guido.voices[0].elements;
        assert_eq!(elements[0], GuidoElement::Tag(GuidoTag::new("staff").with_number(1)));
        assert_eq!(elements[1], GuidoElement::Tag(GuidoTag::new("title").with_text("Etude")));
        assert!(elements.contains(&GuidoElement::Tag(GuidoTag::new("meter").with_text("2/4"))));
        assert!(elements.contains(&GuidoElement::Tag(GuidoTag::new("clef").with_text("g2"))));
    }

    #[test]
    fn test_triplet_notes_carry_sounding_fractions() {
        let guido = convert(&score(&triplet_measure()));
        let range = guido.voices[0]
            .elements
            .iter()
            .find_map(|e| match e {
                GuidoElement::Range { tag, elements } if tag.name == "tuplet" => Some((tag, elements)),
                _ => None,
            })
            .unwrap();
        assert_eq!(range.0.params, vec!["\"-3-\"".to_string()]);
        assert_eq!(range.1.len(), 3);
        let GuidoElement::Note(first) = range.1[0] else {
            panic!("expected a note");
        };
        assert_eq!((first.numerator, first.denominator), (1, 12));
    }

    #[test]
    fn test_ties_and_articulations() {
        let xml = score(&format!(
            r#"<measure number="1">{}{}{}</measure><measure number="2">{}</measure>"#,
            ATTRIBUTES,
            note("C", 4, 6, "quarter", "<notations><articulations><staccato/></articulations></notations>"),
            note("D", 4, 6, "quarter", r#"<notations><tied type="start"/></notations>"#),
            note("D", 4, 12, "half", r#"<notations><tied type="stop"/></notations>"#),
        ));
        let guido = convert(&xml);
        let elements = &guido.voices[0].elements;
        assert!(elements.iter().any(|e| matches!(
            e,
            GuidoElement::Range { tag, .. } if tag.name == "stacc"
        )));
        let names: Vec<&str> = elements
            .iter()
            .filter_map(|e| match e {
                GuidoElement::Tag(tag) => Some(tag.name.as_str()),
                _ => None,
            })
            .collect();
        let begin = names.iter().position(|n| *n == "tieBegin").unwrap();
        let bar = names.iter().position(|n| *n == "bar").unwrap();
        let end = names.iter().position(|n| *n == "tieEnd").unwrap();
        assert!(begin < bar && bar < end);
    }

    #[test]
    fn test_chord_slur_written_once_from_its_link() {
        let xml = score(&format!(
            r#"<measure number="1">{}{}{}{}</measure>"#,
            ATTRIBUTES,
            note("C", 4, 6, "quarter", r#"<notations><slur type="start" number="1"/><articulations><accent/></articulations></notations>"#),
            note("E", 4, 6, "quarter", "<notations><articulations><accent/></articulations></notations>")
                .replace("<pitch>", "<chord/><pitch>"),
            note("D", 4, 6, "quarter", r#"<notations><slur type="stop" number="1"/></notations>"#),
        ));
        let guido = convert(&xml);
        let elements = &guido.voices[0].elements;
        let tags: Vec<&GuidoTag> = elements
            .iter()
            .filter_map(|e| match e {
                GuidoElement::Tag(tag) => Some(tag),
                _ => None,
            })
            .collect();
        let begins: Vec<_> = tags.iter().filter(|t| t.name == "slurBegin").collect();
        assert_eq!(begins.len(), 1);
        assert_eq!(begins[0].id, Some(1));
        assert_eq!(tags.iter().filter(|t| t.name == "slurEnd").count(), 1);

        let accent = elements
            .iter()
            .find_map(|e| match e {
                GuidoElement::Range { tag, elements } if tag.name == "accent" => Some(elements),
                _ => None,
            })
            .unwrap();
        assert!(matches!(&accent[..], [GuidoElement::Chord(notes)] if notes.len() == 2));
    }
}
