//! Score tree builders and converters
//!
//! - **musicxml_to_score**: MusicXML tree → score tree (pass 1)
//! - **score_to_lpsr**: score tree → LilyPond-oriented tree
//! - **score_to_bsr**: score tree → Braille-oriented tree
//! - **score_to_guido**: score tree → Guido Music Notation tree
//! - **score_to_musicxml**: score tree → MusicXML tree
//!
//! The backend converters are visitors: they browse the score tree read-only
//! and report node combinations the tree invariants forbid as internal faults.
//! The MusicXML regenerator walks parts measure by measure instead, since
//! MusicXML interleaves the voices of a measure.

pub mod musicxml_to_score;
pub mod score_to_bsr;
pub mod score_to_guido;
pub mod score_to_lpsr;
pub mod score_to_musicxml;

#[cfg(test)]
pub(crate) mod test_support;

pub use musicxml_to_score::build_score_tree;
pub use score_to_bsr::{score_to_bsr, BsrScore};
pub use score_to_guido::{score_to_guido, GuidoScore};
pub use score_to_lpsr::{score_to_lpsr, LpsrScore};
pub use score_to_musicxml::score_to_musicxml;

use crate::ir::{Chord, Decoration, DecorationKind, DecorationSlot, MeasureElement, MeasureId, ScoreTree};
use crate::models::WholeNotes;

/// Written length of a timed element, scaled by its composed tuplet factor.
///
/// Skips and measure rests without a written value contribute their
/// sounding length unchanged.
pub(crate) fn displayed_length(tree: &ScoreTree, element: &MeasureElement) -> WholeNotes {
    match *element {
        MeasureElement::Note(id) => {
            let note = tree.note(id);
            match note.display {
                Some(display) => display.whole_notes() * tree.note_factor(id).as_rational(),
                None => note.sounding,
            }
        }
        MeasureElement::Chord(id) => {
            let chord = tree.chord(id);
            match (chord.display, chord.tuplet) {
                (Some(display), Some(tuplet)) => {
                    display.whole_notes() * tree.composed_factor(tuplet.target()).as_rational()
                }
                (Some(display), None) => display.whole_notes(),
                (None, _) => chord.sounding,
            }
        }
        MeasureElement::Tuplet(id) => tree
            .tuplet(id)
            .members
            .iter()
            .map(|member| displayed_length(tree, &MeasureElement::from(*member)))
            .sum(),
        _ => WholeNotes::zero(),
    }
}

/// Summed [`displayed_length`] of a measure's timed elements
pub(crate) fn measure_displayed_length(tree: &ScoreTree, measure: MeasureId) -> WholeNotes {
    tree.measure(measure)
        .timed_elements()
        .map(|e| displayed_length(tree, e))
        .sum()
}

/// Member decorations a chord writes once, beams and slurs excluded.
///
/// Beams and slurs reach converters through the chord's links. Paired marks
/// are told apart by kind, role and number only.
pub(crate) fn chord_member_decorations(tree: &ScoreTree, chord: &Chord) -> Vec<Decoration> {
    let mut out: Vec<Decoration> = Vec::new();
    for &id in &chord.notes {
        for decoration in &tree.note(id).decorations {
            if matches!(
                decoration.kind,
                DecorationKind::Beam { .. } | DecorationKind::Slur { .. }
            ) {
                continue;
            }
            let duplicate = out.iter().any(|d| match (d.kind.pairing(), decoration.kind.pairing()) {
                (Some(a), Some(b)) => a == b,
                _ => d.kind == decoration.kind,
            });
            if !duplicate {
                out.push(decoration.clone());
            }
        }
    }
    out
}

/// The member decoration a chord link stands for
pub(crate) fn linked_decoration(tree: &ScoreTree, slot: DecorationSlot) -> Option<&Decoration> {
    tree.note(slot.note).decorations.get(slot.position)
}
