//! Traversal protocol over the score tree
//!
//! Every node kind implements [`Element`]: `accept_in` hands the node to the
//! visitor's `*_start` callback, `browse_children` walks the owned children in
//! their fixed order, and `accept_out` calls the `*_end` callback. A
//! [`Visitor`] only overrides the callbacks it cares about; the rest are
//! no-ops, so unhandled kinds are skipped silently while their children are
//! still visited.
//!
//! Handles ([`Idx`]) implement `Element` by looking the node up in the tree;
//! inline values (measure attributes, decorations, chord links) implement it
//! directly.

use super::arena::Idx;
use super::decorations::Decoration;
use super::links::{ChordBeamLink, ChordGraceNotesGroupLink, ChordSlurLink};
use super::notes::{
    Chord, GraceMember, GraceNotesGroup, Note, NoteId, Tuplet, TupletMember,
};
use super::score::{
    BarLine, Clef, Key, Measure, MeasureElement, Part, PartGroup, PartGroupElement, Score, Staff,
    Tempo, Time, Voice,
};
use super::tree::ScoreTree;

/// Callbacks invoked while browsing a score tree
#[allow(unused_variables)]
pub trait Visitor {
    fn visit_score_start(&mut self, tree: &ScoreTree, score: &Score) {}
    fn visit_score_end(&mut self, tree: &ScoreTree, score: &Score) {}

    fn visit_part_group_start(&mut self, tree: &ScoreTree, id: Idx<PartGroup>, group: &PartGroup) {}
    fn visit_part_group_end(&mut self, tree: &ScoreTree, id: Idx<PartGroup>, group: &PartGroup) {}

    fn visit_part_start(&mut self, tree: &ScoreTree, id: Idx<Part>, part: &Part) {}
    fn visit_part_end(&mut self, tree: &ScoreTree, id: Idx<Part>, part: &Part) {}

    fn visit_staff_start(&mut self, tree: &ScoreTree, id: Idx<Staff>, staff: &Staff) {}
    fn visit_staff_end(&mut self, tree: &ScoreTree, id: Idx<Staff>, staff: &Staff) {}

    fn visit_voice_start(&mut self, tree: &ScoreTree, id: Idx<Voice>, voice: &Voice) {}
    fn visit_voice_end(&mut self, tree: &ScoreTree, id: Idx<Voice>, voice: &Voice) {}

    fn visit_measure_start(&mut self, tree: &ScoreTree, id: Idx<Measure>, measure: &Measure) {}
    fn visit_measure_end(&mut self, tree: &ScoreTree, id: Idx<Measure>, measure: &Measure) {}

    fn visit_note_start(&mut self, tree: &ScoreTree, id: NoteId, note: &Note) {}
    fn visit_note_end(&mut self, tree: &ScoreTree, id: NoteId, note: &Note) {}

    fn visit_chord_start(&mut self, tree: &ScoreTree, id: Idx<Chord>, chord: &Chord) {}
    fn visit_chord_end(&mut self, tree: &ScoreTree, id: Idx<Chord>, chord: &Chord) {}

    fn visit_tuplet_start(&mut self, tree: &ScoreTree, id: Idx<Tuplet>, tuplet: &Tuplet) {}
    fn visit_tuplet_end(&mut self, tree: &ScoreTree, id: Idx<Tuplet>, tuplet: &Tuplet) {}

    fn visit_grace_notes_group_start(&mut self, tree: &ScoreTree, id: Idx<GraceNotesGroup>, group: &GraceNotesGroup) {}
    fn visit_grace_notes_group_end(&mut self, tree: &ScoreTree, id: Idx<GraceNotesGroup>, group: &GraceNotesGroup) {}

    fn visit_chord_beam_link_start(&mut self, tree: &ScoreTree, link: &ChordBeamLink) {}
    fn visit_chord_beam_link_end(&mut self, tree: &ScoreTree, link: &ChordBeamLink) {}

    fn visit_chord_slur_link_start(&mut self, tree: &ScoreTree, link: &ChordSlurLink) {}
    fn visit_chord_slur_link_end(&mut self, tree: &ScoreTree, link: &ChordSlurLink) {}

    fn visit_chord_grace_notes_group_link_start(&mut self, tree: &ScoreTree, link: &ChordGraceNotesGroupLink) {}
    fn visit_chord_grace_notes_group_link_end(&mut self, tree: &ScoreTree, link: &ChordGraceNotesGroupLink) {}

    fn visit_clef(&mut self, tree: &ScoreTree, clef: &Clef) {}
    fn visit_key(&mut self, tree: &ScoreTree, key: &Key) {}
    fn visit_time(&mut self, tree: &ScoreTree, time: &Time) {}
    fn visit_bar_line(&mut self, tree: &ScoreTree, bar_line: &BarLine) {}
    fn visit_tempo(&mut self, tree: &ScoreTree, tempo: &Tempo) {}

    /// Any decoration, with the note that owns it
    fn visit_decoration_start(&mut self, tree: &ScoreTree, owner: NoteId, decoration: &Decoration) {}
    fn visit_decoration_end(&mut self, tree: &ScoreTree, owner: NoteId, decoration: &Decoration) {}
}

/// A node that can be browsed by a [`Visitor`]
pub trait Element {
    /// Source line the node was built from, 0 when synthesized
    fn line(&self, tree: &ScoreTree) -> usize;

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor);

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor);

    fn browse_children(&self, _tree: &ScoreTree, _visitor: &mut dyn Visitor) {}

    /// Visit this node and everything it owns
    fn browse(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        self.accept_in(tree, visitor);
        self.browse_children(tree, visitor);
        self.accept_out(tree, visitor);
    }
}

impl ScoreTree {
    /// Browse the whole tree from the score
    pub fn browse(&self, visitor: &mut dyn Visitor) {
        self.score().browse(self, visitor);
    }
}

impl Element for Score {
    fn line(&self, _tree: &ScoreTree) -> usize {
        self.line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_score_start(tree, self);
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_score_end(tree, self);
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        for group in &self.part_groups {
            group.browse(tree, visitor);
        }
    }
}

impl Element for Idx<PartGroup> {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.part_group(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_part_group_start(tree, *self, tree.part_group(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_part_group_end(tree, *self, tree.part_group(*self));
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        for element in &tree.part_group(*self).elements {
            match element {
                PartGroupElement::Part(part) => part.browse(tree, visitor),
                PartGroupElement::PartGroup(group) => group.browse(tree, visitor),
            }
        }
    }
}

impl Element for Idx<Part> {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.part(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_part_start(tree, *self, tree.part(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_part_end(tree, *self, tree.part(*self));
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        for staff in &tree.part(*self).staves {
            staff.browse(tree, visitor);
        }
    }
}

impl Element for Idx<Staff> {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.staff(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_staff_start(tree, *self, tree.staff(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_staff_end(tree, *self, tree.staff(*self));
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        for voice in &tree.staff(*self).voices {
            voice.browse(tree, visitor);
        }
    }
}

impl Element for Idx<Voice> {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.voice(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_voice_start(tree, *self, tree.voice(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_voice_end(tree, *self, tree.voice(*self));
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        for measure in &tree.voice(*self).measures {
            measure.browse(tree, visitor);
        }
    }
}

impl Element for Idx<Measure> {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.measure(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_measure_start(tree, *self, tree.measure(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_measure_end(tree, *self, tree.measure(*self));
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        for element in &tree.measure(*self).elements {
            element.browse(tree, visitor);
        }
    }
}

impl Element for MeasureElement {
    fn line(&self, tree: &ScoreTree) -> usize {
        match self {
            MeasureElement::Note(n) => n.line(tree),
            MeasureElement::Chord(c) => c.line(tree),
            MeasureElement::Tuplet(t) => t.line(tree),
            MeasureElement::Clef(clef) => clef.line,
            MeasureElement::Key(key) => key.line,
            MeasureElement::Time(time) => time.line,
            MeasureElement::BarLine(bar_line) => bar_line.line,
            MeasureElement::Tempo(tempo) => tempo.line,
        }
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        match self {
            MeasureElement::Note(n) => n.accept_in(tree, visitor),
            MeasureElement::Chord(c) => c.accept_in(tree, visitor),
            MeasureElement::Tuplet(t) => t.accept_in(tree, visitor),
            MeasureElement::Clef(clef) => visitor.visit_clef(tree, clef),
            MeasureElement::Key(key) => visitor.visit_key(tree, key),
            MeasureElement::Time(time) => visitor.visit_time(tree, time),
            MeasureElement::BarLine(bar_line) => visitor.visit_bar_line(tree, bar_line),
            MeasureElement::Tempo(tempo) => visitor.visit_tempo(tree, tempo),
        }
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        match self {
            MeasureElement::Note(n) => n.accept_out(tree, visitor),
            MeasureElement::Chord(c) => c.accept_out(tree, visitor),
            MeasureElement::Tuplet(t) => t.accept_out(tree, visitor),
            _ => {}
        }
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        match self {
            MeasureElement::Note(n) => n.browse_children(tree, visitor),
            MeasureElement::Chord(c) => c.browse_children(tree, visitor),
            MeasureElement::Tuplet(t) => t.browse_children(tree, visitor),
            _ => {}
        }
    }
}

impl Element for NoteId {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.note(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_note_start(tree, *self, tree.note(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_note_end(tree, *self, tree.note(*self));
    }

    /// Grace notes before, decorations by rank, grace notes after
    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        let note = tree.note(*self);
        if let Some(group) = note.grace_before {
            group.browse(tree, visitor);
        }
        for decoration in &note.decorations {
            AttachedDecoration {
                owner: *self,
                decoration,
            }
            .browse(tree, visitor);
        }
        if let Some(group) = note.grace_after {
            group.browse(tree, visitor);
        }
    }
}

impl Element for Idx<Chord> {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.chord(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_chord_start(tree, *self, tree.chord(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_chord_end(tree, *self, tree.chord(*self));
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        let chord = tree.chord(*self);
        if let Some(link) = &chord.grace_before {
            link.browse(tree, visitor);
        }
        for note in &chord.notes {
            note.browse(tree, visitor);
        }
        for link in &chord.beam_links {
            link.browse(tree, visitor);
        }
        for link in &chord.slur_links {
            link.browse(tree, visitor);
        }
        if let Some(link) = &chord.grace_after {
            link.browse(tree, visitor);
        }
    }
}

impl Element for Idx<Tuplet> {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.tuplet(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_tuplet_start(tree, *self, tree.tuplet(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_tuplet_end(tree, *self, tree.tuplet(*self));
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        for member in &tree.tuplet(*self).members {
            match member {
                TupletMember::Note(n) => n.browse(tree, visitor),
                TupletMember::Chord(c) => c.browse(tree, visitor),
                TupletMember::Tuplet(t) => t.browse(tree, visitor),
            }
        }
    }
}

impl Element for Idx<GraceNotesGroup> {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.grace_group(*self).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_grace_notes_group_start(tree, *self, tree.grace_group(*self));
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_grace_notes_group_end(tree, *self, tree.grace_group(*self));
    }

    fn browse_children(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        for member in &tree.grace_group(*self).members {
            match member {
                GraceMember::Note(n) => n.browse(tree, visitor),
                GraceMember::Chord(c) => c.browse(tree, visitor),
            }
        }
    }
}

impl Element for ChordBeamLink {
    fn line(&self, tree: &ScoreTree) -> usize {
        decoration_line(tree, self.original.note, self.original.position)
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_chord_beam_link_start(tree, self);
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_chord_beam_link_end(tree, self);
    }
}

impl Element for ChordSlurLink {
    fn line(&self, tree: &ScoreTree) -> usize {
        decoration_line(tree, self.original.note, self.original.position)
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_chord_slur_link_start(tree, self);
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_chord_slur_link_end(tree, self);
    }
}

impl Element for ChordGraceNotesGroupLink {
    fn line(&self, tree: &ScoreTree) -> usize {
        tree.grace_group(self.group).line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_chord_grace_notes_group_link_start(tree, self);
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_chord_grace_notes_group_link_end(tree, self);
    }
}

/// A decoration together with the note owning it
pub struct AttachedDecoration<'a> {
    pub owner: NoteId,
    pub decoration: &'a Decoration,
}

impl Element for AttachedDecoration<'_> {
    fn line(&self, _tree: &ScoreTree) -> usize {
        self.decoration.line
    }

    fn accept_in(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_decoration_start(tree, self.owner, self.decoration);
    }

    fn accept_out(&self, tree: &ScoreTree, visitor: &mut dyn Visitor) {
        visitor.visit_decoration_end(tree, self.owner, self.decoration);
    }
}

fn decoration_line(tree: &ScoreTree, note: NoteId, position: usize) -> usize {
    tree.note(note)
        .decorations
        .get(position)
        .map(|d| d.line)
        .unwrap_or_else(|| tree.note(note).line)
}
