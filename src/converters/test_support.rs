//! MusicXML fixtures shared by the converter tests

use crate::config::RunConfig;
use crate::context::RunContext;
use crate::ir::ScoreTree;
use crate::musicxml::read_musicxml;

use super::build_score_tree;

/// One-part partwise score around the given measures
pub fn score(measures: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <work><work-title>Etude</work-title></work>
  <identification><creator type="composer">A. Composer</creator></identification>
  <part-list>
    <score-part id="P1"><part-name>Flute</part-name></score-part>
  </part-list>
  <part id="P1">
{}
  </part>
</score-partwise>"#,
        measures
    )
}

/// Divisions 6, C major, 2/4, treble clef
pub const ATTRIBUTES: &str = r#"<attributes><divisions>6</divisions>
  <key><fifths>0</fifths></key><time><beats>2</beats><beat-type>4</beat-type></time>
  <clef><sign>G</sign><line>2</line></clef></attributes>"#;

pub fn note(step: &str, octave: u8, duration: u32, note_type: &str, extra: &str) -> String {
    format!(
        "<note><pitch><step>{}</step><octave>{}</octave></pitch><duration>{}</duration><voice>1</voice><type>{}</type>{}</note>",
        step, octave, duration, note_type, extra
    )
}

/// Triplet eighth at divisions 6, `notations` carries the tuplet start or stop
pub fn triplet_note(step: &str, notations: &str) -> String {
    format!(
        "<note><pitch><step>{}</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice><type>eighth</type>\
         <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>{}</note>",
        step, notations
    )
}

/// Three triplet eighths and a quarter, filling 2/4
pub fn triplet_measure() -> String {
    format!(
        r#"<measure number="1">{}{}{}{}{}</measure>"#,
        ATTRIBUTES,
        triplet_note("C", r#"<notations><tuplet type="start" number="1"/></notations>"#),
        triplet_note("D", ""),
        triplet_note("E", r#"<notations><tuplet type="stop" number="1"/></notations>"#),
        note("F", 4, 6, "quarter", ""),
    )
}

pub fn build(xml: &str) -> (ScoreTree, RunContext) {
    let input = read_musicxml("test.musicxml", xml).unwrap();
    let mut context = RunContext::new(RunConfig::default());
    let tree = build_score_tree(&input, &mut context).unwrap();
    (tree, context)
}
