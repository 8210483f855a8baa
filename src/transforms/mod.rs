//! Score tree → score tree transforms (pass 2)
//!
//! Each transform is total and idempotent. It works on a clone, so the tree
//! it was given is never touched. Transforms run in the order the
//! configuration enables them.

mod coalesce;
mod filters;
mod merge_rests;
mod repeats;

pub use coalesce::CoalesceEmptyMeasures;
pub use filters::{PartFilter, StaffFilter, VoiceFilter};
pub use merge_rests::MergeRests;
pub use repeats::ImplicitInitialRepeatBarline;

use std::time::Instant;

use log::debug;

use crate::config::{TransformConfig, TransformName};
use crate::context::RunContext;
use crate::ir::ScoreTree;
use crate::utils::performance::elapsed_ms;

pub trait ScoreTransform {
    fn name(&self) -> TransformName;

    /// Edit `tree` in place, returning the number of changes made
    fn apply(&self, tree: &mut ScoreTree, context: &mut RunContext) -> usize;

    /// Transformed copy of `tree`
    fn transform(&self, tree: &ScoreTree, context: &mut RunContext) -> ScoreTree {
        let mut copy = tree.clone();
        let changes = self.apply(&mut copy, context);
        debug!("{}: {} change(s)", self.name().name(), changes);
        copy
    }
}

/// The transform a configuration entry names
pub fn transform_for(name: TransformName, config: &TransformConfig) -> Box<dyn ScoreTransform> {
    match name {
        TransformName::PartFilter => Box::new(PartFilter::new(config.part_filter.clone())),
        TransformName::StaffFilter => Box::new(StaffFilter::new(config.staff_filter.clone())),
        TransformName::VoiceFilter => Box::new(VoiceFilter::new(config.voice_filter.clone())),
        TransformName::CoalesceEmptyMeasures => Box::new(CoalesceEmptyMeasures),
        TransformName::MergeRests => Box::new(MergeRests),
        TransformName::ImplicitInitialRepeatBarline => Box::new(ImplicitInitialRepeatBarline),
    }
}

/// Apply every enabled transform in order, timing each
pub fn apply_transforms(tree: ScoreTree, context: &mut RunContext) -> ScoreTree {
    let config = context.config().transforms.clone();
    let mut tree = tree;
    for name in &config.enabled {
        let transform = transform_for(*name, &config);
        let started = Instant::now();
        tree = transform.transform(&tree, context);
        context
            .performance_mut()
            .record_measurement(&format!("transform {}", name.name()), elapsed_ms(started));
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterSets, RunConfig};
    use crate::converters::test_support::build;
    use crate::ir::flat_view;

    /// Two staves, two voices on staff 1, coincident rests, an empty stretch
    /// and a backward repeat
    pub(crate) const PIANO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list>
    <score-part id="P1"><part-name>Piano</part-name></score-part>
    <score-part id="P2"><part-name>Bass</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions><time><beats>2</beats><beat-type>4</beat-type></time><staves>2</staves>
        <clef number="1"><sign>G</sign><line>2</line></clef><clef number="2"><sign>F</sign><line>4</line></clef></attributes>
      <note><rest/><duration>1</duration><voice>1</voice><type>quarter</type><staff>1</staff></note>
      <note><pitch><step>E</step><octave>5</octave></pitch><duration>1</duration><voice>1</voice><type>quarter</type><staff>1</staff></note>
      <backup><duration>2</duration></backup>
      <note><rest/><duration>1</duration><voice>2</voice><type>quarter</type><staff>1</staff></note>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration><voice>2</voice><type>quarter</type><staff>1</staff></note>
      <backup><duration>2</duration></backup>
      <note><pitch><step>C</step><octave>3</octave></pitch><duration>2</duration><voice>5</voice><type>half</type><staff>2</staff></note>
    </measure>
    <measure number="2">
      <note><rest measure="yes"/><duration>2</duration><voice>1</voice><staff>1</staff></note>
      <backup><duration>2</duration></backup>
      <note><rest measure="yes"/><duration>2</duration><voice>2</voice><staff>1</staff></note>
      <backup><duration>2</duration></backup>
      <note><rest measure="yes"/><duration>2</duration><voice>5</voice><staff>2</staff></note>
    </measure>
    <measure number="3">
      <note><rest measure="yes"/><duration>2</duration><voice>1</voice><staff>1</staff></note>
      <backup><duration>2</duration></backup>
      <note><rest measure="yes"/><duration>2</duration><voice>2</voice><staff>1</staff></note>
      <backup><duration>2</duration></backup>
      <note><rest measure="yes"/><duration>2</duration><voice>5</voice><staff>2</staff></note>
    </measure>
    <measure number="4">
      <note><pitch><step>D</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice><type>half</type><staff>1</staff></note>
      <backup><duration>2</duration></backup>
      <note><pitch><step>B</step><octave>3</octave></pitch><duration>2</duration><voice>2</voice><type>half</type><staff>1</staff></note>
      <backup><duration>2</duration></backup>
      <note><pitch><step>G</step><octave>2</octave></pitch><duration>2</duration><voice>5</voice><type>half</type><staff>2</staff></note>
      <barline location="right"><bar-style>light-heavy</bar-style><repeat direction="backward"/></barline>
    </measure>
  </part>
  <part id="P2">
    <measure number="1">
      <attributes><divisions>1</divisions><time><beats>2</beats><beat-type>4</beat-type></time></attributes>
      <note><pitch><step>C</step><octave>2</octave></pitch><duration>2</duration><voice>1</voice><type>half</type></note>
    </measure>
  </part>
</score-partwise>"#;

    fn context_with(enabled: Vec<TransformName>) -> RunContext {
        let mut config = RunConfig::default();
        config.transforms.enabled = enabled;
        config.transforms.part_filter = FilterSets::ignoring(vec!["Bass".to_string()]);
        config.transforms.staff_filter = FilterSets::keep_only(vec![1]);
        config.transforms.voice_filter = FilterSets::ignoring(vec![2]);
        RunContext::new(config)
    }

    #[test]
    fn test_every_transform_is_idempotent() {
        let (tree, _) = build(PIANO);
        let all = [
            TransformName::PartFilter,
            TransformName::StaffFilter,
            TransformName::VoiceFilter,
            TransformName::CoalesceEmptyMeasures,
            TransformName::MergeRests,
            TransformName::ImplicitInitialRepeatBarline,
        ];
        for name in all {
            let mut context = context_with(vec![name]);
            let transform = transform_for(name, &context.config().transforms.clone());
            let once = transform.transform(&tree, &mut context);
            let twice = transform.transform(&once, &mut context);
            assert_eq!(flat_view(&twice), flat_view(&once), "{} is not idempotent", name.name());
            assert!(context.report().faults.is_empty());
        }
    }

    #[test]
    fn test_input_tree_is_left_untouched() {
        let (tree, _) = build(PIANO);
        let before = flat_view(&tree);
        let mut context = context_with(vec![TransformName::MergeRests, TransformName::PartFilter]);
        let transformed = apply_transforms(tree.clone(), &mut context);
        assert_eq!(flat_view(&tree), before);
        assert_ne!(flat_view(&transformed), before);
    }

    #[test]
    fn test_transforms_are_timed_in_order() {
        let (tree, _) = build(PIANO);
        let mut context = context_with(vec![TransformName::VoiceFilter, TransformName::PartFilter]);
        apply_transforms(tree, &mut context);
        let (_, _, timings) = context.into_parts();
        let names: Vec<&str> = timings.iter().map(|t| t.operation.as_str()).collect();
        assert_eq!(names, vec!["transform voice-filter", "transform part-filter"]);
    }
}
