//! Pairing diagnostics - checks the sidelinks of paired decorations
//!
//! Walks a finished score tree and verifies, for every tie, slur, wedge,
//! spanner and ligature decoration that can be reached from the score:
//! - it is linked to a pair (an unlinked end is an orphan)
//! - the pair names the owning note as one of its ends
//! - the peer note carries the matching end with the same pair
//! - both ends are in the same voice

use std::collections::HashMap;

use crate::ir::{
    Decoration, Element, Idx, Note, NoteId, PairId, PairRole, ScoreTree, Visitor, Voice,
};
use crate::pipeline::PassId;

use super::{DiagnosticMark, DiagnosticSeverity};

/// Collects every reachable paired decoration with its owner and voice
#[derive(Default)]
struct PairedEnds {
    current_voice: Option<Idx<Voice>>,
    ends: Vec<(NoteId, Option<Idx<Voice>>, Decoration)>,
    voice_of_note: HashMap<NoteId, Idx<Voice>>,
}

impl Visitor for PairedEnds {
    fn visit_voice_start(&mut self, _tree: &ScoreTree, id: Idx<Voice>, _voice: &Voice) {
        self.current_voice = Some(id);
    }

    fn visit_voice_end(&mut self, _tree: &ScoreTree, _id: Idx<Voice>, _voice: &Voice) {
        self.current_voice = None;
    }

    fn visit_note_start(&mut self, _tree: &ScoreTree, id: NoteId, _note: &Note) {
        if let Some(voice) = self.current_voice {
            self.voice_of_note.insert(id, voice);
        }
    }

    fn visit_decoration_start(&mut self, _tree: &ScoreTree, owner: NoteId, decoration: &Decoration) {
        if decoration.kind.pairing().is_some() {
            self.ends
                .push((owner, self.current_voice, decoration.clone()));
        }
    }
}

/// Analyze every paired decoration of a tree, returning one mark per problem
pub fn analyze_pairs(tree: &ScoreTree, pass: PassId) -> Vec<DiagnosticMark> {
    let mut collector = PairedEnds::default();
    tree.browse(&mut collector);

    let mut marks = Vec::new();
    for (owner, voice, decoration) in &collector.ends {
        let Some((kind, role, _)) = decoration.kind.pairing() else {
            continue;
        };
        // a tie "continue" never appears on its own; other continues are not paired
        if role == PairRole::Continue {
            continue;
        }
        let Some(pair_id) = decoration.kind.pair() else {
            let which = if role == PairRole::Start { "start" } else { "stop" };
            marks.push(DiagnosticMark::new(
                decoration.line,
                pass,
                DiagnosticSeverity::Error,
                format!("{}_orphan_{}", kind.name(), which),
                format!("Unmatched {} {} (no sidelink to its peer)", kind.name(), which),
            ));
            continue;
        };
        let pair = tree.pair(pair_id);
        let Some(peer) = pair.peer_of(*owner) else {
            marks.push(broken(decoration, pass, "pair does not name the owning note"));
            continue;
        };
        if !peer_has_end(tree, peer, pair_id, role) {
            marks.push(broken(decoration, pass, "peer note lacks the matching end"));
            continue;
        }
        let peer_voice = collector.voice_of_note.get(&peer).copied();
        if peer_voice.is_none() {
            marks.push(broken(decoration, pass, "peer note is not reachable from the score"));
        } else if peer_voice != *voice {
            marks.push(broken(decoration, pass, "ends are in different voices"));
        }
    }
    marks
}

fn peer_has_end(tree: &ScoreTree, peer: NoteId, pair_id: PairId, role: PairRole) -> bool {
    let wanted = match role {
        PairRole::Start => PairRole::Stop,
        _ => PairRole::Start,
    };
    tree.note(peer).decorations.iter().any(|d| {
        d.kind.pair() == Some(pair_id)
            && d.kind.pairing().map(|(_, r, _)| r) == Some(wanted)
    })
}

fn broken(decoration: &Decoration, pass: PassId, message: &str) -> DiagnosticMark {
    let name = decoration.kind.name();
    DiagnosticMark::new(
        decoration.line,
        pass,
        DiagnosticSeverity::Error,
        format!("{}_broken_pair", name),
        format!("Broken {} sidelink: {}", name, message),
    )
}

/// Count of paired ends reachable from the score, for logging
pub fn count_paired_ends(tree: &ScoreTree) -> usize {
    let mut collector = PairedEnds::default();
    tree.score().browse(tree, &mut collector);
    collector.ends.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DecorationKind, DecorationSlot, MeasureElement, NoteKind, PairKind, PartGroup};
    use crate::models::{Pitch, Step, WholeNotes};

    fn two_notes() -> (ScoreTree, NoteId, NoteId) {
        let mut tree = ScoreTree::new("pairs");
        let group = tree.add_part_group(None, PartGroup::implicit());
        let part = tree.add_part(group, "P1", 0);
        let staff = tree.staff_for(part, 1, 0);
        let voice = tree.add_voice(staff, 1, 0);
        let measure = tree.append_measure(voice, "1", 0);
        let pitch = NoteKind::Pitched(Pitch::natural(Step::G, 4));
        let a = tree.new_note(Note::new(1, pitch, WholeNotes::new(1, 2)));
        let b = tree.new_note(Note::new(2, pitch, WholeNotes::new(1, 2)));
        tree.push_element(measure, MeasureElement::Note(a));
        tree.push_element(measure, MeasureElement::Note(b));
        (tree, a, b)
    }

    fn slur(role: PairRole) -> Decoration {
        Decoration::new(
            5,
            DecorationKind::Slur {
                role,
                number: 1,
                pair: None,
            },
        )
    }

    #[test]
    fn test_linked_slur_is_clean() {
        let (mut tree, a, b) = two_notes();
        let start = tree.add_decoration(a, slur(PairRole::Start));
        let stop = tree.add_decoration(b, slur(PairRole::Stop));
        tree.link_pair(
            PairKind::Slur,
            DecorationSlot { note: a, position: start },
            DecorationSlot { note: b, position: stop },
        )
        .unwrap();
        assert!(analyze_pairs(&tree, PassId::Build).is_empty());
        assert_eq!(count_paired_ends(&tree), 2);
    }

    #[test]
    fn test_unlinked_start_is_reported() {
        let (mut tree, a, _) = two_notes();
        tree.add_decoration(a, slur(PairRole::Start));
        let marks = analyze_pairs(&tree, PassId::Build);
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].kind, "slur_orphan_start");
        assert_eq!(marks[0].line, 5);
    }
}
