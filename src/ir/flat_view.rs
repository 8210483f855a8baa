//! Indented one-line-per-node description of a score tree
//!
//! Source line numbers and arena indices are left out, so two trees built
//! from different files (or re-built after a round trip) describe the same
//! way exactly when they have the same musical structure. Paired decorations
//! print whether they are linked, and to which kind of peer.

use super::arena::Idx;
use super::decorations::{Decoration, DecorationKind};
use super::element::Visitor;
use super::links::{ChordBeamLink, ChordGraceNotesGroupLink, ChordSlurLink, GracePosition};
use super::notes::{Chord, GraceNotesGroup, Note, NoteId, NoteKind, Tuplet};
use super::score::{
    BarLine, Clef, Key, Measure, Part, PartGroup, Score, Staff, Tempo, Time, Voice,
};
use super::tree::ScoreTree;

#[derive(Debug, Default)]
pub struct FlatViewVisitor {
    depth: usize,
    lines: Vec<String>,
}

impl FlatViewVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    fn push(&mut self, text: String) {
        self.lines.push(format!("{}{}", "  ".repeat(self.depth), text));
    }

    fn open(&mut self, text: String) {
        self.push(text);
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Flat view of a whole tree
pub fn flat_view(tree: &ScoreTree) -> Vec<String> {
    let mut visitor = FlatViewVisitor::new();
    tree.browse(&mut visitor);
    visitor.into_lines()
}

fn describe_note(note: &Note) -> String {
    let what = match note.kind {
        NoteKind::Pitched(pitch) => format!("note {}", pitch),
        NoteKind::Rest { display: Some(p) } => format!("rest at {}", p),
        NoteKind::Rest { display: None } => "rest".to_string(),
        NoteKind::Unpitched { display: Some(p) } => format!("unpitched at {}", p),
        NoteKind::Unpitched { display: None } => "unpitched".to_string(),
        NoteKind::Skip => "skip".to_string(),
    };
    let mut text = format!("{} sounding {}", what, note.sounding);
    if let Some(display) = note.display {
        text.push_str(&format!(" display {}", display));
    }
    if let Some(accidental) = note.accidental {
        text.push_str(&format!(" accidental {}", accidental.musicxml_name()));
    }
    if note.grace {
        text.push_str(" grace");
    }
    if note.measure_rest {
        text.push_str(" measure-rest");
    }
    text
}

fn describe_decoration(tree: &ScoreTree, owner: NoteId, decoration: &Decoration) -> String {
    let mut text = match &decoration.kind {
        DecorationKind::Stem(direction) => format!("stem {:?}", direction),
        DecorationKind::Beam { number, value } => {
            format!("beam {} {}", number, value.musicxml_name())
        }
        DecorationKind::Articulation(kind) => format!("articulation {}", kind.musicxml_name()),
        DecorationKind::Spanner { kind, role, number, .. } => format!(
            "spanner {} {} {}",
            kind.musicxml_name(),
            role.musicxml_name(),
            number
        ),
        DecorationKind::Technical { kind, text } => match text {
            Some(text) => format!("technical {} {}", kind.musicxml_name(), text),
            None => format!("technical {}", kind.musicxml_name()),
        },
        DecorationKind::Ornament(kind) => format!("ornament {}", kind.musicxml_name()),
        DecorationKind::Glissando { role, number, .. } => {
            format!("glissando {} {}", role.musicxml_name(), number)
        }
        DecorationKind::Tie { role, .. } => format!("tie {}", role.musicxml_name()),
        DecorationKind::Dynamic(kind) => format!("dynamic {}", kind.musicxml_name()),
        DecorationKind::Words(words) => format!("words {:?}", words),
        DecorationKind::Slur { role, number, .. } => {
            format!("slur {} {}", role.musicxml_name(), number)
        }
        DecorationKind::Ligature { role, number, .. } => {
            format!("ligature {} {}", role.musicxml_name(), number)
        }
        DecorationKind::Pedal(kind) => format!("pedal {}", kind.musicxml_name()),
        DecorationKind::Wedge { kind, role, number, .. } => {
            format!("wedge {:?} {} {}", kind, role.musicxml_name(), number)
        }
    };
    if let Some(placement) = decoration.placement {
        text.push_str(&format!(" {}", placement.musicxml_name()));
    }
    if let Some(pair) = decoration.kind.pair() {
        match tree.pair(pair).peer_of(owner) {
            Some(peer) => text.push_str(&format!(" -> {}", describe_note(tree.note(peer)))),
            None => text.push_str(" -> ?"),
        }
    } else if decoration.kind.pairing().is_some() {
        text.push_str(" unlinked");
    }
    text
}

impl Visitor for FlatViewVisitor {
    fn visit_score_start(&mut self, _tree: &ScoreTree, score: &Score) {
        let mut text = "score".to_string();
        if let Some(title) = score.identification.title() {
            text.push_str(&format!(" {:?}", title));
        }
        self.open(text);
    }

    fn visit_score_end(&mut self, _tree: &ScoreTree, _score: &Score) {
        self.close();
    }

    fn visit_part_group_start(&mut self, _tree: &ScoreTree, _id: Idx<PartGroup>, group: &PartGroup) {
        if group.implicit {
            self.open("part-group (implicit)".to_string());
        } else {
            self.open(format!(
                "part-group {} {}{}",
                group.number,
                group.symbol.musicxml_name(),
                if group.barline { " barline" } else { "" }
            ));
        }
    }

    fn visit_part_group_end(&mut self, _tree: &ScoreTree, _id: Idx<PartGroup>, _group: &PartGroup) {
        self.close();
    }

    fn visit_part_start(&mut self, _tree: &ScoreTree, _id: Idx<Part>, part: &Part) {
        self.open(format!("part {} {:?}", part.id, part.name.as_deref().unwrap_or("")));
    }

    fn visit_part_end(&mut self, _tree: &ScoreTree, _id: Idx<Part>, _part: &Part) {
        self.close();
    }

    fn visit_staff_start(&mut self, _tree: &ScoreTree, _id: Idx<Staff>, staff: &Staff) {
        self.open(format!("staff {}", staff.number));
    }

    fn visit_staff_end(&mut self, _tree: &ScoreTree, _id: Idx<Staff>, _staff: &Staff) {
        self.close();
    }

    fn visit_voice_start(&mut self, _tree: &ScoreTree, _id: Idx<Voice>, voice: &Voice) {
        self.open(format!("voice {}", voice.number));
    }

    fn visit_voice_end(&mut self, _tree: &ScoreTree, _id: Idx<Voice>, _voice: &Voice) {
        self.close();
    }

    fn visit_measure_start(&mut self, _tree: &ScoreTree, _id: Idx<Measure>, measure: &Measure) {
        let mut text = format!("measure {}", measure.number);
        if let Some(count) = measure.multiple_rest {
            text.push_str(&format!(" multiple-rest {}", count));
        }
        self.open(text);
    }

    fn visit_measure_end(&mut self, _tree: &ScoreTree, _id: Idx<Measure>, _measure: &Measure) {
        self.close();
    }

    fn visit_note_start(&mut self, _tree: &ScoreTree, _id: NoteId, note: &Note) {
        self.open(describe_note(note));
    }

    fn visit_note_end(&mut self, _tree: &ScoreTree, _id: NoteId, _note: &Note) {
        self.close();
    }

    fn visit_chord_start(&mut self, _tree: &ScoreTree, _id: Idx<Chord>, chord: &Chord) {
        self.open(format!("chord sounding {}", chord.sounding));
    }

    fn visit_chord_end(&mut self, _tree: &ScoreTree, _id: Idx<Chord>, _chord: &Chord) {
        self.close();
    }

    fn visit_tuplet_start(&mut self, _tree: &ScoreTree, _id: Idx<Tuplet>, tuplet: &Tuplet) {
        self.open(format!("tuplet {}", tuplet.factor));
    }

    fn visit_tuplet_end(&mut self, _tree: &ScoreTree, _id: Idx<Tuplet>, _tuplet: &Tuplet) {
        self.close();
    }

    fn visit_grace_notes_group_start(&mut self, _tree: &ScoreTree, _id: Idx<GraceNotesGroup>, group: &GraceNotesGroup) {
        let position = match group.position {
            GracePosition::Before => "before",
            GracePosition::After => "after",
        };
        let slash = if group.slashed { " slashed" } else { "" };
        self.open(format!("grace-notes {}{}", position, slash));
    }

    fn visit_grace_notes_group_end(&mut self, _tree: &ScoreTree, _id: Idx<GraceNotesGroup>, _group: &GraceNotesGroup) {
        self.close();
    }

    fn visit_chord_beam_link_start(&mut self, tree: &ScoreTree, link: &ChordBeamLink) {
        let note = tree.note(link.original.note);
        let beam = note
            .decorations
            .get(link.original.position)
            .map(|d| d.kind.name())
            .unwrap_or("?");
        self.push(format!("chord-beam-link {}", beam));
    }

    fn visit_chord_slur_link_start(&mut self, tree: &ScoreTree, link: &ChordSlurLink) {
        let text = tree
            .note(link.original.note)
            .decorations
            .get(link.original.position)
            .map(|d| describe_decoration(tree, link.original.note, d))
            .unwrap_or_else(|| "?".to_string());
        self.push(format!("chord-slur-link {}", text));
    }

    fn visit_chord_grace_notes_group_link_start(&mut self, _tree: &ScoreTree, link: &ChordGraceNotesGroupLink) {
        self.push(format!("chord-grace-link {:?}", link.position));
    }

    fn visit_clef(&mut self, _tree: &ScoreTree, clef: &Clef) {
        self.push(format!(
            "clef {} {} {}",
            clef.sign.musicxml_name(),
            clef.staff_line.map(|l| l.to_string()).unwrap_or_default(),
            clef.octave_change
        ));
    }

    fn visit_key(&mut self, _tree: &ScoreTree, key: &Key) {
        let mode = key.mode.map(|m| m.musicxml_name()).unwrap_or("");
        self.push(format!("key {} {}", key.fifths, mode));
    }

    fn visit_time(&mut self, _tree: &ScoreTree, time: &Time) {
        if time.senza_misura {
            self.push("time senza-misura".to_string());
        } else {
            self.push(format!("time {}/{}", time.beats, time.beat_type));
        }
    }

    fn visit_bar_line(&mut self, _tree: &ScoreTree, bar_line: &BarLine) {
        let mut text = format!("barline {}", bar_line.location.musicxml_name());
        if let Some(style) = bar_line.style {
            text.push_str(&format!(" {}", style.musicxml_name()));
        }
        if let Some(repeat) = &bar_line.repeat {
            text.push_str(&format!(" repeat {:?}", repeat.direction));
        }
        if let Some(ending) = &bar_line.ending {
            text.push_str(&format!(" ending {} {}", ending.number, ending.ending_type.musicxml_name()));
        }
        self.push(text);
    }

    fn visit_tempo(&mut self, _tree: &ScoreTree, tempo: &Tempo) {
        let unit = tempo.beat_unit.map(|u| u.musicxml_name()).unwrap_or("");
        let per_minute = tempo.per_minute.map(|p| p.to_string()).unwrap_or_default();
        self.push(format!(
            "tempo {:?} {}{} = {}",
            tempo.words.as_deref().unwrap_or(""),
            unit,
            ".".repeat(tempo.beat_unit_dots as usize),
            per_minute
        ));
    }

    fn visit_decoration_start(&mut self, tree: &ScoreTree, owner: NoteId, decoration: &Decoration) {
        self.push(describe_decoration(tree, owner, decoration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::score::MeasureElement;
    use crate::models::WholeNotes;

    #[test]
    fn test_flat_view_ignores_line_numbers() {
        let build = |line: usize| {
            let mut tree = ScoreTree::new("flat");
            let group = tree.add_part_group(None, PartGroup::implicit());
            let part = tree.add_part(group, "P1", line);
            let staff = tree.staff_for(part, 1, line);
            let voice = tree.add_voice(staff, 1, line);
            let measure = tree.append_measure(voice, "1", line);
            let rest = tree.new_note(Note::new(line, NoteKind::Rest { display: None }, WholeNotes::new(1, 1)));
            tree.push_element(measure, MeasureElement::Note(rest));
            tree
        };
        let a = flat_view(&build(3));
        let b = flat_view(&build(40));
        assert_eq!(a, b);
        assert_eq!(a.last().map(|s| s.trim()), Some("rest sounding 1/1"));
    }
}
