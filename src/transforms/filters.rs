//! Part, staff and voice filters

use log::debug;

use crate::config::{FilterSets, TransformName};
use crate::context::RunContext;
use crate::errors::WarningKind;
use crate::ir::{PartId, ScoreTree};

use super::ScoreTransform;

fn warn_if_emptied(tree: &ScoreTree, part: PartId, context: &mut RunContext) {
    let p = tree.part(part);
    if tree.voices_of_part(part).is_empty() {
        context.warn(
            WarningKind::EmptyPart,
            p.line,
            format!("part {} has nothing left after filtering", p.id),
        );
    }
}

/// Keeps or ignores parts by id or name
pub struct PartFilter {
    sets: FilterSets<String>,
}

impl PartFilter {
    pub fn new(sets: FilterSets<String>) -> Self {
        Self { sets }
    }
}

impl ScoreTransform for PartFilter {
    fn name(&self) -> TransformName {
        TransformName::PartFilter
    }

    fn apply(&self, tree: &mut ScoreTree, _context: &mut RunContext) -> usize {
        let rejected: Vec<PartId> = tree
            .parts_in_order()
            .into_iter()
            .filter(|&id| {
                let part = tree.part(id);
                let names = std::iter::once(&part.id).chain(part.name.as_ref());
                !self.sets.admits_any(names)
            })
            .collect();
        for &part in &rejected {
            debug!("part filter drops {}", tree.part(part).id);
            tree.remove_part(part);
        }
        rejected.len()
    }
}

/// Keeps or ignores staves by number, in every part
pub struct StaffFilter {
    sets: FilterSets<u32>,
}

impl StaffFilter {
    pub fn new(sets: FilterSets<u32>) -> Self {
        Self { sets }
    }
}

impl ScoreTransform for StaffFilter {
    fn name(&self) -> TransformName {
        TransformName::StaffFilter
    }

    fn apply(&self, tree: &mut ScoreTree, context: &mut RunContext) -> usize {
        let mut removed = 0;
        for part in tree.parts_in_order() {
            let rejected: Vec<_> = tree
                .part(part)
                .staves
                .iter()
                .copied()
                .filter(|&s| !self.sets.admits(&tree.staff(s).number))
                .collect();
            if rejected.is_empty() {
                continue;
            }
            for staff in rejected {
                debug!("staff filter drops staff {} of {}", tree.staff(staff).number, tree.part(part).id);
                tree.remove_staff(staff);
                removed += 1;
            }
            warn_if_emptied(tree, part, context);
        }
        removed
    }
}

/// Keeps or ignores voices by number, in every staff
pub struct VoiceFilter {
    sets: FilterSets<u32>,
}

impl VoiceFilter {
    pub fn new(sets: FilterSets<u32>) -> Self {
        Self { sets }
    }
}

impl ScoreTransform for VoiceFilter {
    fn name(&self) -> TransformName {
        TransformName::VoiceFilter
    }

    fn apply(&self, tree: &mut ScoreTree, context: &mut RunContext) -> usize {
        let mut removed = 0;
        for part in tree.parts_in_order() {
            let rejected: Vec<_> = tree
                .voices_of_part(part)
                .into_iter()
                .filter(|&v| !self.sets.admits(&tree.voice(v).number))
                .collect();
            if rejected.is_empty() {
                continue;
            }
            for voice in rejected {
                debug!("voice filter drops voice {} of {}", tree.voice(voice).number, tree.part(part).id);
                tree.remove_voice(voice);
                removed += 1;
            }
            warn_if_emptied(tree, part, context);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::converters::test_support::build;
    use crate::transforms::tests::PIANO;

    fn context() -> RunContext {
        RunContext::new(RunConfig::default())
    }

    #[test]
    fn test_part_filter_matches_ids_and_names() {
        let (tree, _) = build(PIANO);
        let filter = PartFilter::new(FilterSets::ignoring(vec!["Bass".to_string()]));
        let filtered = filter.transform(&tree, &mut context());
        let ids: Vec<&str> = filtered
            .parts_in_order()
            .into_iter()
            .map(|p| filtered.part(p).id.as_str())
            .collect();
        assert_eq!(ids, vec!["P1"]);

        let keep = PartFilter::new(FilterSets::keep_only(vec!["P2".to_string()]));
        assert_eq!(keep.transform(&tree, &mut context()).parts_in_order().len(), 1);
    }

    #[test]
    fn test_staff_filter_keeps_listed_staves() {
        let (tree, _) = build(PIANO);
        let mut context = context();
        let filtered = StaffFilter::new(FilterSets::keep_only(vec![2])).transform(&tree, &mut context);
        let piano = filtered.parts_in_order()[0];
        let numbers: Vec<u32> = filtered
            .part(piano)
            .staves
            .iter()
            .map(|s| filtered.staff(*s).number)
            .collect();
        assert_eq!(numbers, vec![2]);
        // P2 has only staff 1
        assert_eq!(context.report().warnings.len(), 1);
        assert_eq!(context.report().warnings[0].kind, WarningKind::EmptyPart);
    }

    #[test]
    fn test_voice_filter_drops_ignored_voices() {
        let (tree, _) = build(PIANO);
        let filtered = VoiceFilter::new(FilterSets::ignoring(vec![2])).transform(&tree, &mut context());
        let piano = filtered.parts_in_order()[0];
        let numbers: Vec<u32> = filtered
            .voices_of_part(piano)
            .into_iter()
            .map(|v| filtered.voice(v).number)
            .collect();
        assert_eq!(numbers, vec![1, 5]);
    }
}
