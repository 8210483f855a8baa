//! Runs of empty measures → one multiple-rest measure

use log::debug;

use crate::config::TransformName;
use crate::context::RunContext;
use crate::ir::{MeasureElement, PartId, ScoreTree, VoiceId};

use super::ScoreTransform;

/// Consecutive measures that are rest-only in every voice collapse into the
/// first of them, which records the run length in `multiple_rest`.
///
/// Runs are found across all staves of a part so that the staves keep the
/// same measures. A measure holding clefs, keys, times, bar lines or tempos
/// may only open a run, never extend one.
pub struct CoalesceEmptyMeasures;

impl CoalesceEmptyMeasures {
    fn is_empty_at(tree: &ScoreTree, voices: &[VoiceId], index: usize) -> bool {
        voices.iter().all(|&voice| {
            tree.voice(voice)
                .measures
                .get(index)
                .is_some_and(|&m| tree.measure(m).multiple_rest.is_none() && tree.is_rest_only(m))
        })
    }

    fn is_bare_at(tree: &ScoreTree, voices: &[VoiceId], index: usize) -> bool {
        voices.iter().all(|&voice| {
            tree.voice(voice).measures.get(index).is_some_and(|&m| {
                tree.measure(m)
                    .elements
                    .iter()
                    .all(|e| matches!(e, MeasureElement::Note(_)))
            })
        })
    }

    fn coalesce_part(tree: &mut ScoreTree, part: PartId) -> usize {
        let voices = tree.voices_of_part(part);
        let Some(count) = voices.iter().map(|&v| tree.voice(v).measures.len()).max() else {
            return 0;
        };
        let mut changes = 0;
        let mut index = 0;
        // indices shift as measures are removed, so runs are applied as found
        let mut remaining = count;
        while index < remaining {
            if !Self::is_empty_at(tree, &voices, index) {
                index += 1;
                continue;
            }
            let mut end = index + 1;
            while end < remaining && Self::is_empty_at(tree, &voices, end) && Self::is_bare_at(tree, &voices, end) {
                end += 1;
            }
            let run = end - index;
            if run > 1 {
                for &voice in &voices {
                    let measures = tree.voice(voice).measures[index..end].to_vec();
                    tree.measure_mut(measures[0]).multiple_rest = Some(run as u32);
                    for &measure in &measures[1..] {
                        tree.remove_measure(measure);
                    }
                }
                debug!(
                    "coalesced {} empty measures from {} in {}",
                    run,
                    tree.measure(tree.voice(voices[0]).measures[index]).number,
                    tree.part(part).id
                );
                remaining -= run - 1;
                changes += 1;
            }
            index += 1;
        }
        changes
    }
}

impl ScoreTransform for CoalesceEmptyMeasures {
    fn name(&self) -> TransformName {
        TransformName::CoalesceEmptyMeasures
    }

    fn apply(&self, tree: &mut ScoreTree, _context: &mut RunContext) -> usize {
        tree.parts_in_order()
            .into_iter()
            .map(|part| Self::coalesce_part(tree, part))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::converters::test_support::build;
    use crate::transforms::tests::PIANO;

    #[test]
    fn test_empty_run_becomes_one_multiple_rest_measure() {
        let (tree, _) = build(PIANO);
        let coalesced = CoalesceEmptyMeasures.transform(&tree, &mut RunContext::new(RunConfig::default()));
        let piano = coalesced.parts_in_order()[0];
        for voice in coalesced.voices_of_part(piano) {
            let measures = &coalesced.voice(voice).measures;
            let numbers: Vec<&str> = measures
                .iter()
                .map(|m| coalesced.measure(*m).number.as_str())
                .collect();
            assert_eq!(numbers, vec!["1", "2", "4"]);
            assert_eq!(coalesced.measure(measures[1]).multiple_rest, Some(2));
            assert_eq!(coalesced.measure(measures[0]).multiple_rest, None);
        }
    }

    #[test]
    fn test_single_empty_measure_is_left_alone() {
        let (tree, _) = build(PIANO);
        let mut context = RunContext::new(RunConfig::default());
        let once = CoalesceEmptyMeasures.transform(&tree, &mut context);
        let mut copy = once.clone();
        assert_eq!(CoalesceEmptyMeasures.apply(&mut copy, &mut context), 0);
    }
}
