//! Forward repeat for a staff that only repeats backward

use log::debug;

use crate::config::TransformName;
use crate::context::RunContext;
use crate::ir::{BarLine, MeasureElement, RepeatDirection, ScoreTree, StaffId};

use super::ScoreTransform;

/// A staff whose first repeat bar line is backward gets a forward repeat at
/// the start of its first measure, after the leading clef, key and time.
pub struct ImplicitInitialRepeatBarline;

impl ImplicitInitialRepeatBarline {
    fn first_repeat(tree: &ScoreTree, staff: StaffId) -> Option<RepeatDirection> {
        let voice = *tree.staff(staff).voices.first()?;
        tree.voice(voice)
            .measures
            .iter()
            .flat_map(|&m| tree.measure(m).elements.iter())
            .find_map(|e| match e {
                MeasureElement::BarLine(bar_line) => bar_line.repeat_direction(),
                _ => None,
            })
    }
}

impl ScoreTransform for ImplicitInitialRepeatBarline {
    fn name(&self) -> TransformName {
        TransformName::ImplicitInitialRepeatBarline
    }

    fn apply(&self, tree: &mut ScoreTree, _context: &mut RunContext) -> usize {
        let mut changes = 0;
        for part in tree.parts_in_order() {
            for staff in tree.part(part).staves.clone() {
                if Self::first_repeat(tree, staff) != Some(RepeatDirection::Backward) {
                    continue;
                }
                for voice in tree.staff(staff).voices.clone() {
                    let Some(&first) = tree.voice(voice).measures.first() else {
                        continue;
                    };
                    let at = tree
                        .measure(first)
                        .elements
                        .iter()
                        .position(|e| {
                            !matches!(e, MeasureElement::Clef(_) | MeasureElement::Key(_) | MeasureElement::Time(_))
                        })
                        .unwrap_or(tree.measure(first).elements.len());
                    tree.insert_element(first, at, MeasureElement::BarLine(BarLine::forward_repeat()));
                }
                debug!(
                    "added an initial forward repeat to staff {} of {}",
                    tree.staff(staff).number,
                    tree.part(part).id
                );
                changes += 1;
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

    #[test]
    fn test_backward_repeat_gets_an_initial_forward_repeat() {
        let (tree, _) = build(PIANO);
        let repeated = ImplicitInitialRepeatBarline.transform(&tree, &mut RunContext::new(RunConfig::default()));
        let piano = repeated.parts_in_order()[0];
        for voice in repeated.voices_of_part(piano) {
            let first = repeated.voice(voice).measures[0];
            let bar_lines: Vec<_> = repeated
                .measure(first)
                .elements
                .iter()
                .filter_map(|e| match e {
                    MeasureElement::BarLine(b) => b.repeat_direction(),
                    _ => None,
                })
                .collect();
            assert_eq!(bar_lines, vec![RepeatDirection::Forward]);
        }
        // the bass part has no repeat at all
        let bass = repeated.parts_in_order()[1];
        let first = repeated.voice(repeated.voices_of_part(bass)[0]).measures[0];
        assert!(!repeated
            .measure(first)
            .elements
            .iter()
            .any(|e| matches!(e, MeasureElement::BarLine(_))));
    }
}
