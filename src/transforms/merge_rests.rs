//! Coincident rests across the voices of a staff

use log::debug;

use crate::config::TransformName;
use crate::context::RunContext;
use crate::ir::{MeasureElement, MeasureId, NoteId, NoteKind, ScoreTree, VoiceId};
use crate::models::WholeNotes;

use super::ScoreTransform;

/// A rest seen at `onset` within its measure
#[derive(Debug, Clone, Copy)]
struct PlacedRest {
    onset: WholeNotes,
    length: WholeNotes,
    note: NoteId,
}

/// Rests at the same onset with the same duration in every voice of a
/// multi-voice staff stay in the first voice and become skips elsewhere.
/// Rests carrying a tie, slur or other paired mark are left alone.
pub struct MergeRests;

impl MergeRests {
    fn rests_of(tree: &ScoreTree, measure: MeasureId) -> Vec<PlacedRest> {
        let mut onset = WholeNotes::zero();
        let mut rests = Vec::new();
        for element in &tree.measure(measure).elements {
            if let MeasureElement::Note(note) = *element {
                let n = tree.note(note);
                let unpaired = n.decorations.iter().all(|d| d.kind.pairing().is_none());
                if n.is_rest() && unpaired {
                    rests.push(PlacedRest {
                        onset,
                        length: n.sounding,
                        note,
                    });
                }
            }
            onset += tree.element_sounding(element);
        }
        rests
    }

    fn merge_measure(tree: &mut ScoreTree, voices: &[VoiceId], index: usize) -> usize {
        let measures: Option<Vec<MeasureId>> = voices
            .iter()
            .map(|&v| tree.voice(v).measures.get(index).copied())
            .collect();
        let Some(measures) = measures else {
            return 0;
        };
        let per_voice: Vec<Vec<PlacedRest>> = measures.iter().map(|&m| Self::rests_of(tree, m)).collect();

        let mut skipped = Vec::new();
        for kept in &per_voice[0] {
            let matches: Option<Vec<NoteId>> = per_voice[1..]
                .iter()
                .map(|rests| {
                    rests
                        .iter()
                        .find(|r| r.onset == kept.onset && r.length == kept.length)
                        .map(|r| r.note)
                })
                .collect();
            if let Some(matches) = matches {
                skipped.extend(matches);
            }
        }
        for &note in &skipped {
            let n = tree.note_mut(note);
            n.kind = NoteKind::Skip;
            n.display = None;
            n.measure_rest = false;
            n.accidental = None;
            n.decorations.clear();
        }
        skipped.len()
    }
}

impl ScoreTransform for MergeRests {
    fn name(&self) -> TransformName {
        TransformName::MergeRests
    }

    fn apply(&self, tree: &mut ScoreTree, _context: &mut RunContext) -> usize {
        let mut changes = 0;
        for part in tree.parts_in_order() {
            for staff in tree.part(part).staves.clone() {
                let voices = tree.staff(staff).voices.clone();
                if voices.len() < 2 {
                    continue;
                }
                let count = voices
                    .iter()
                    .map(|&v| tree.voice(v).measures.len())
                    .min()
                    .unwrap_or(0);
                let merged: usize = (0..count).map(|i| Self::merge_measure(tree, &voices, i)).sum();
                if merged > 0 {
                    debug!(
                        "merged {} rest(s) in staff {} of {}",
                        merged,
                        tree.staff(staff).number,
                        tree.part(part).id
                    );
                }
                changes += merged;
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::converters::test_support::build;
    use crate::transforms::tests::PIANO;

    fn first_kinds(tree: &ScoreTree, voice: VoiceId, measure: usize) -> Vec<&'static str> {
        let m = tree.voice(voice).measures[measure];
        tree.measure(m)
            .elements
            .iter()
            .filter_map(|e| match *e {
                MeasureElement::Note(n) => Some(tree.note(n).kind.name()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_coincident_rests_become_skips_after_the_first_voice() {
        let (tree, _) = build(PIANO);
        let merged = MergeRests.transform(&tree, &mut RunContext::new(RunConfig::default()));
        let voices = merged.voices_of_part(merged.parts_in_order()[0]);
        assert_eq!(first_kinds(&merged, voices[0], 0), vec!["rest", "note"]);
        assert_eq!(first_kinds(&merged, voices[1], 0), vec!["skip", "note"]);
        assert_eq!(first_kinds(&merged, voices[1], 1), vec!["skip"]);
        // staff 2 has a single voice
        assert_eq!(first_kinds(&merged, voices[2], 1), vec!["rest"]);
    }

    #[test]
    fn test_rests_at_different_onsets_are_kept() {
        let (tree, _) = build(PIANO);
        let mut copy = tree.clone();
        let voices = copy.voices_of_part(copy.parts_in_order()[0]);
        // put voice 2's first-measure rest after its note
        let m = copy.voice(voices[1]).measures[0];
        let elements = &mut copy.measure_mut(m).elements;
        let timed: Vec<usize> = (0..elements.len()).filter(|&i| elements[i].is_timed()).collect();
        elements.swap(timed[0], timed[1]);
        let merged = MergeRests.transform(&copy, &mut RunContext::new(RunConfig::default()));
        assert_eq!(first_kinds(&merged, voices[1], 0), vec!["note", "rest"]);
    }
}
