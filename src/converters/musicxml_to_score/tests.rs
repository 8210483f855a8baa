use super::*;
use crate::config::RunConfig;
use crate::errors::{ErrorScope, SemanticErrorKind};
use crate::ir::{
    DecorationKind, MeasureElement, MeasureId, NoteKind, NoteUplink, PairKind, PairRole,
    TupletMember, VoiceId,
};
use crate::models::{Pitch, Step, TupletFactor, WholeNotes};
use crate::musicxml::read_musicxml;

fn score(measures: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list>
    <score-part id="P1"><part-name>Piano</part-name></score-part>
  </part-list>
  <part id="P1">
{}
  </part>
</score-partwise>"#,
        measures
    )
}

const ATTRIBUTES: &str = r#"<attributes><divisions>2</divisions>
  <key><fifths>0</fifths></key><time><beats>2</beats><beat-type>4</beat-type></time>
  <clef><sign>G</sign><line>2</line></clef></attributes>"#;

fn note(step: &str, octave: u8, duration: u32, note_type: &str, extra: &str) -> String {
    format!(
        "<note><pitch><step>{}</step><octave>{}</octave></pitch><duration>{}</duration><voice>1</voice><type>{}</type>{}</note>",
        step, octave, duration, note_type, extra
    )
}

fn build(xml: &str) -> (Option<ScoreTree>, RunContext) {
    let input = read_musicxml("test.musicxml", xml).unwrap();
    let mut context = RunContext::new(RunConfig::default());
    let tree = build_score_tree(&input, &mut context).ok();
    (tree, context)
}

fn first_voice(tree: &ScoreTree) -> VoiceId {
    let part = tree.parts_in_order()[0];
    tree.voices_of_part(part)[0]
}

fn measures(tree: &ScoreTree, voice: VoiceId) -> Vec<MeasureId> {
    tree.voice(voice).measures.clone()
}

#[test]
fn test_single_voice_measures_and_attributes() {
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}</measure>
           <measure number="2">{}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 2, "quarter", ""),
        note("D", 4, 2, "quarter", ""),
        note("E", 4, 4, "half", ""),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().errors.is_empty());

    let voice = first_voice(&tree);
    let measures = measures(&tree, voice);
    assert_eq!(measures.len(), 2);
    let first = &tree.measure(measures[0]).elements;
    assert!(matches!(first[0], MeasureElement::Clef(_)));
    assert!(matches!(first[1], MeasureElement::Key(_)));
    assert!(matches!(first[2], MeasureElement::Time(_)));
    assert_eq!(tree.measure_sounding(measures[0]), WholeNotes::new(1, 2));
    assert_eq!(tree.measure(measures[1]).number, "2");
    assert_eq!(tree.measure_sounding(measures[1]), WholeNotes::new(1, 2));
}

#[test]
fn test_chord_members_share_one_slot() {
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}{}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 2, "quarter", ""),
        note("E", 4, 2, "quarter", "").replace("<pitch>", "<chord/><pitch>"),
        note("G", 4, 2, "quarter", ""),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().errors.is_empty());

    let measure = measures(&tree, first_voice(&tree))[0];
    let timed: Vec<&MeasureElement> = tree.measure(measure).timed_elements().collect();
    assert_eq!(timed.len(), 2);
    let MeasureElement::Chord(chord) = *timed[0] else {
        panic!("expected a chord first, got {:?}", timed[0]);
    };
    assert_eq!(tree.chord(chord).notes.len(), 2);
    assert_eq!(tree.chord(chord).sounding, WholeNotes::new(1, 4));
    assert_eq!(tree.measure_sounding(measure), WholeNotes::new(1, 2));
}

#[test]
fn test_chord_display_mismatch_is_a_measure_error() {
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 2, "quarter", ""),
        note("E", 4, 2, "eighth", "").replace("<pitch>", "<chord/><pitch>"),
    ));
    let (_, context) = build(&xml);
    let errors = &context.report().errors;
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].kind, SemanticErrorKind::ChordDurationMismatch { .. }));
    assert!(matches!(errors[0].scope, ErrorScope::Measure { .. }));
}

#[test]
fn test_tie_across_bar_line_is_linked() {
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}</measure>
           <measure number="2">{}{}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 2, "quarter", ""),
        note("D", 4, 2, "quarter", r#"<notations><tied type="start"/></notations>"#),
        note("D", 4, 2, "quarter", r#"<notations><tied type="stop"/></notations>"#),
        note("E", 4, 2, "quarter", ""),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().errors.is_empty());

    let (id, pair) = tree.pairs().next().unwrap();
    assert_eq!(pair.kind, PairKind::Tie);
    let start = tree.note(pair.start);
    let stop = tree.note(pair.stop);
    assert_eq!(start.kind, NoteKind::Pitched(Pitch::natural(Step::D, 4)));
    assert_ne!(start.measure, stop.measure);
    assert!(stop.decorations.iter().any(|d| d.kind.pair() == Some(id)));
}

#[test]
fn test_unterminated_tie_drops_only_its_voice() {
    let voice_two = |step: &str| {
        note(step, 3, 4, "half", "").replace("<voice>1</voice>", "<voice>2</voice>")
    };
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}<backup><duration>4</duration></backup>{}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 2, "quarter", r#"<notations><tied type="start"/></notations>"#),
        note("E", 4, 2, "quarter", ""),
        voice_two("C"),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();

    let errors = &context.report().errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].scope,
        ErrorScope::Voice {
            part: "P1".into(),
            staff: 1,
            voice: 1
        }
    );
    let part = tree.parts_in_order()[0];
    let voices = tree.voices_of_part(part);
    assert_eq!(voices.len(), 1);
    assert_eq!(tree.voice(voices[0]).number, 2);
}

#[test]
fn test_triplet_eighths_fill_a_quarter() {
    let triplet = |step: &str, tuplet: &str| {
        format!(
            "<note><pitch><step>{}</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice><type>eighth</type>\
             <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>{}</note>",
            step, tuplet
        )
    };
    let xml = score(&format!(
        r#"<measure number="1"><attributes><divisions>6</divisions><time><beats>2</beats><beat-type>4</beat-type></time></attributes>
           {}{}{}{}</measure>"#,
        triplet("C", r#"<notations><tuplet type="start" number="1"/></notations>"#),
        triplet("D", ""),
        triplet("E", r#"<notations><tuplet type="stop" number="1"/></notations>"#),
        note("F", 4, 6, "quarter", ""),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().errors.is_empty(), "{:?}", context.report().errors);
    assert!(context.report().warnings.is_empty());

    let measure = measures(&tree, first_voice(&tree))[0];
    let timed: Vec<&MeasureElement> = tree.measure(measure).timed_elements().collect();
    let MeasureElement::Tuplet(tuplet) = *timed[0] else {
        panic!("expected a tuplet first");
    };
    assert_eq!(tree.tuplet(tuplet).factor, TupletFactor { actual: 3, normal: 2 });
    assert_eq!(tree.tuplet(tuplet).members.len(), 3);
    for member in &tree.tuplet(tuplet).members {
        let TupletMember::Note(n) = *member else {
            panic!("expected notes inside the tuplet");
        };
        assert_eq!(tree.note(n).sounding, WholeNotes::new(1, 12));
        assert_eq!(tree.note(n).tuplet.map(|t| t.target()), Some(tuplet));
    }
    assert_eq!(tree.tuplet_sounding(tuplet), WholeNotes::new(1, 4));
    assert_eq!(tree.measure_sounding(measure), WholeNotes::new(1, 2));
}

#[test]
fn test_tuplet_left_open_is_closed_with_a_warning() {
    let xml = score(&format!(
        r#"<measure number="1"><attributes><divisions>3</divisions></attributes>{}</measure>"#,
        r#"<note><rest/><duration>1</duration><type>eighth</type>
             <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>
             <notations><tuplet type="start"/></notations></note>"#,
    ));
    let (tree, context) = build(&xml);
    assert!(tree.is_some());
    assert!(context.report().errors.is_empty());
    let warnings = &context.report().warnings;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::UnterminatedTuplet);
}

#[test]
fn test_tuplet_duration_contradiction() {
    let xml = score(
        r#"<measure number="1"><attributes><divisions>6</divisions></attributes>
             <note><pitch><step>C</step><octave>4</octave></pitch><duration>3</duration><type>eighth</type>
               <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>
               <notations><tuplet type="start"/><tuplet type="stop"/></notations></note>
           </measure>"#,
    );
    let (_, context) = build(&xml);
    let errors = &context.report().errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].kind,
        SemanticErrorKind::TupletDurationMismatch {
            expected: WholeNotes::new(1, 12),
            actual: WholeNotes::new(1, 8),
        }
    );
}

#[test]
fn test_measure_overflow() {
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 4, "half", ""),
        note("D", 4, 2, "quarter", ""),
    ));
    let (_, context) = build(&xml);
    let errors = &context.report().errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].kind,
        SemanticErrorKind::MeasureOverflow {
            expected: WholeNotes::new(1, 2),
            actual: WholeNotes::new(3, 4),
        }
    );
}

#[test]
fn test_second_voice_and_forward() {
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}</measure>
           <measure number="2">{}<backup><duration>4</duration></backup>
             <forward><duration>2</duration><voice>2</voice></forward>{}</measure>"#,
        ATTRIBUTES,
        note("C", 5, 2, "quarter", ""),
        note("D", 5, 2, "quarter", ""),
        note("E", 5, 4, "half", ""),
        note("G", 4, 2, "quarter", "").replace("<voice>1</voice>", "<voice>2</voice>"),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().errors.is_empty());

    let part = tree.parts_in_order()[0];
    let voices = tree.voices_of_part(part);
    assert_eq!(voices.len(), 2);
    let second = measures(&tree, voices[1]);
    assert_eq!(second.len(), 2);

    // measure 1 is back-filled with one skip
    let filled: Vec<&MeasureElement> = tree.measure(second[0]).timed_elements().collect();
    assert_eq!(filled.len(), 1);
    let MeasureElement::Note(skip) = *filled[0] else {
        panic!("expected a skip");
    };
    assert_eq!(tree.note(skip).kind, NoteKind::Skip);
    assert_eq!(tree.note(skip).sounding, WholeNotes::new(1, 2));

    // the forward becomes a skip before the note
    let timed: Vec<&MeasureElement> = tree.measure(second[1]).timed_elements().collect();
    assert_eq!(timed.len(), 2);
    assert_eq!(tree.measure_sounding(second[1]), WholeNotes::new(1, 2));
}

#[test]
fn test_orphan_slur_stop_is_dropped() {
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 2, "quarter", r#"<notations><slur type="stop"/></notations>"#),
        note("D", 4, 2, "quarter", r#"<notations><slur type="start" number="2"/></notations>"#),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().errors.is_empty());
    let kinds: Vec<WarningKind> = context.report().warnings.iter().map(|w| w.kind).collect();
    assert_eq!(kinds, vec![WarningKind::OrphanStop, WarningKind::OrphanStart]);

    let measure = measures(&tree, first_voice(&tree))[0];
    for element in tree.measure(measure).timed_elements() {
        let MeasureElement::Note(n) = *element else { continue };
        assert!(tree
            .note(n)
            .decorations
            .iter()
            .all(|d| !matches!(d.kind, DecorationKind::Slur { .. })));
    }
}

#[test]
fn test_directions_attach_to_next_note() {
    let xml = score(&format!(
        r#"<measure number="1">{}
             <direction placement="below"><direction-type><dynamics><p/></dynamics></direction-type></direction>
             <direction><direction-type><wedge type="crescendo"/></direction-type></direction>
             {}
             <direction><direction-type><wedge type="stop"/></direction-type></direction>
             {}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 2, "quarter", ""),
        note("D", 4, 2, "quarter", ""),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().warnings.is_empty());

    let (_, pair) = tree.pairs().next().unwrap();
    assert_eq!(pair.kind, PairKind::Wedge);
    let first = tree.note(pair.start);
    let names: Vec<&str> = first.decorations.iter().map(|d| d.kind.name()).collect();
    assert_eq!(names, vec!["dynamic", "wedge"]);
    let stop = tree.note(pair.stop);
    assert!(stop.decorations.iter().any(|d| d.kind.pairing().map(|p| p.1) == Some(PairRole::Stop)));
}

#[test]
fn test_grace_notes_before_and_after() {
    let grace = |step: &str| {
        format!(
            r#"<note><grace slash="yes"/><pitch><step>{}</step><octave>5</octave></pitch><voice>1</voice><type>16th</type></note>"#,
            step
        )
    };
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}{}{}</measure>"#,
        ATTRIBUTES,
        grace("B"),
        note("C", 5, 4, "half", ""),
        grace("D"),
        grace("E"),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().warnings.is_empty());

    let measure = measures(&tree, first_voice(&tree))[0];
    let MeasureElement::Note(principal) = *tree.measure(measure).timed_elements().next().unwrap() else {
        panic!("expected a note");
    };
    let before = tree.note(principal).grace_before.unwrap();
    let after = tree.note(principal).grace_after.unwrap();
    assert!(tree.grace_group(before).slashed);
    assert_eq!(tree.grace_group(before).members.len(), 1);
    assert_eq!(tree.grace_group(after).members.len(), 2);
    let crate::ir::GraceMember::Note(grace_note) = tree.grace_group(after).members[0] else {
        panic!("expected a grace note");
    };
    assert!(matches!(tree.note(grace_note).uplink, NoteUplink::GraceNotesGroup(_)));
    assert_eq!(tree.note(grace_note).measure.map(|m| m.target()), Some(measure));
}

#[test]
fn test_timewise_input_is_rejected() {
    let input = read_musicxml("t", "<score-timewise><part-list/></score-timewise>").unwrap();
    let mut context = RunContext::new(RunConfig::default());
    assert!(matches!(
        build_score_tree(&input, &mut context),
        Err(ParseError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_declared_part_without_measures_is_a_warning() {
    let xml = r#"<score-partwise>
      <part-list>
        <score-part id="P1"><part-name>A</part-name></score-part>
        <score-part id="P2"><part-name>B</part-name></score-part>
      </part-list>
      <part id="P1"><measure number="1"><note><rest/><duration>4</duration></note></measure></part>
    </score-partwise>"#;
    let (tree, context) = build(xml);
    assert_eq!(tree.unwrap().parts_in_order().len(), 2);
    let warnings = &context.report().warnings;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::EmptyPart);
}

#[test]
fn test_tie_from_chord_member_links_to_next_note() {
    let xml = score(
        r#"<measure number="1">
      <attributes><divisions>1</divisions><time><beats>2</beats><beat-type>4</beat-type></time></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration><voice>1</voice><type>quarter</type>
        <notations><tied type="start"/></notations></note>
      <note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration><voice>1</voice><type>quarter</type></note>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration><voice>1</voice><type>quarter</type>
        <notations><tied type="stop"/></notations></note>
    </measure>
    <measure number="2">
      <note><pitch><step>G</step><octave>4</octave></pitch><duration>2</duration><voice>1</voice><type>half</type></note>
    </measure>"#,
    );
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context.report().errors.is_empty(), "{:?}", context.report().errors);

    let measure = measures(&tree, first_voice(&tree))[0];
    let timed: Vec<&MeasureElement> = tree.measure(measure).timed_elements().collect();
    let (&MeasureElement::Chord(chord), &MeasureElement::Note(next)) = (timed[0], timed[1]) else {
        panic!("expected a chord then a note");
    };
    let c4 = tree.chord(chord).notes[0];
    assert_eq!(tree.note(c4).kind, NoteKind::Pitched(Pitch::natural(Step::C, 4)));

    let pairs: Vec<_> = tree.pairs().collect();
    assert_eq!(pairs.len(), 1);
    let (id, pair) = pairs[0];
    assert_eq!(pair.kind, PairKind::Tie);
    assert_eq!(pair.start, c4);
    assert_eq!(pair.stop, next);
    assert!(tree.note(c4).decorations.iter().any(|d| d.kind.pair() == Some(id)));
    assert!(tree.note(next).decorations.iter().any(|d| d.kind.pair() == Some(id)));
}

/// Two quarters and a nested eighth triplet inside a quarter triplet, at divisions 9
const NESTED_TRIPLETS: &str = r#"<measure number="1">
      <attributes><divisions>9</divisions><time><beats>2</beats><beat-type>4</beat-type></time></attributes>
      <note><pitch><step>C</step><octave>5</octave></pitch><duration>6</duration><voice>1</voice><type>quarter</type>
        <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification>
        <notations><tuplet type="start" number="1"/></notations></note>
      <note><pitch><step>D</step><octave>5</octave></pitch><duration>6</duration><voice>1</voice><type>quarter</type>
        <time-modification><actual-notes>3</actual-notes><normal-notes>2</normal-notes></time-modification></note>
      <note><pitch><step>E</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice><type>eighth</type>
        <time-modification><actual-notes>9</actual-notes><normal-notes>4</normal-notes></time-modification>
        <notations><tuplet type="start" number="2"/></notations></note>
      <note><pitch><step>F</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice><type>eighth</type>
        <time-modification><actual-notes>9</actual-notes><normal-notes>4</normal-notes></time-modification></note>
      <note><pitch><step>G</step><octave>5</octave></pitch><duration>2</duration><voice>1</voice><type>eighth</type>
        <time-modification><actual-notes>9</actual-notes><normal-notes>4</normal-notes></time-modification>
        <notations><tuplet type="stop" number="2"/><tuplet type="stop" number="1"/></notations></note>
    </measure>"#;

#[test]
fn test_nested_triplets_compose_their_factors() {
    let (tree, context) = build(&score(NESTED_TRIPLETS));
    let tree = tree.unwrap();
    assert!(context.report().errors.is_empty(), "{:?}", context.report().errors);
    assert!(context.report().warnings.is_empty(), "{:?}", context.report().warnings);

    let measure = measures(&tree, first_voice(&tree))[0];
    let timed: Vec<&MeasureElement> = tree.measure(measure).timed_elements().collect();
    assert_eq!(timed.len(), 1);
    let MeasureElement::Tuplet(outer) = *timed[0] else {
        panic!("expected the outer tuplet");
    };
    let members = &tree.tuplet(outer).members;
    assert_eq!(members.len(), 3);
    let TupletMember::Tuplet(inner) = members[2] else {
        panic!("expected the inner tuplet last");
    };
    assert_eq!(tree.tuplet(inner).factor, TupletFactor { actual: 3, normal: 2 });
    assert_eq!(tree.composed_factor(inner), TupletFactor { actual: 9, normal: 4 });

    for member in &members[..2] {
        let TupletMember::Note(n) = *member else {
            panic!("expected quarter notes");
        };
        assert_eq!(tree.note(n).sounding, WholeNotes::new(1, 6));
    }
    for member in &tree.tuplet(inner).members {
        let TupletMember::Note(n) = *member else {
            panic!("expected eighth notes");
        };
        assert_eq!(tree.note(n).sounding, WholeNotes::new(1, 18));
    }
    assert_eq!(tree.tuplet_sounding(inner), WholeNotes::new(1, 6));
    assert_eq!(tree.measure_sounding(measure), WholeNotes::new(1, 2));
}

#[test]
fn test_huge_durations_are_reported_not_summed() {
    let huge = |step: &str| {
        note(step, 4, 1, "quarter", "").replace("<duration>1</duration>", "<duration>9223372036854775807</duration>")
    };
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}<forward><duration>9223372036854775807</duration></forward></measure>"#,
        ATTRIBUTES,
        huge("C"),
        huge("D"),
    ));
    let (tree, context) = build(&xml);
    assert!(tree.is_some());
    let errors = &context.report().errors;
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(
        &e.kind,
        SemanticErrorKind::InvalidValue { element, .. } if element == "duration"
    )));
    assert!(context
        .report()
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::UnknownValue));
}

#[test]
fn test_oversized_tuplet_numbers_are_ignored() {
    let start = |number: u32| {
        format!(
            r#"<notations><tuplet type="start" number="{}"><tuplet-actual><tuplet-number>70000</tuplet-number></tuplet-actual><tuplet-normal><tuplet-number>2</tuplet-number></tuplet-normal></tuplet></notations>"#,
            number
        )
    };
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}</measure>"#,
        ATTRIBUTES,
        note("C", 4, 2, "quarter", &start(1)),
        note("D", 4, 2, "quarter", &start(2)),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    let warnings = &context.report().warnings;
    assert_eq!(
        warnings.iter().filter(|w| w.kind == WarningKind::UnknownValue).count(),
        2
    );
    let measure = measures(&tree, first_voice(&tree))[0];
    assert!(tree
        .measure(measure)
        .timed_elements()
        .all(|e| matches!(e, MeasureElement::Note(_))));
    assert_eq!(tree.measure_sounding(measure), WholeNotes::new(1, 2));
}

#[test]
fn test_nesting_beyond_the_composed_bound_is_skipped() {
    let tuplet_note = |step: &str, notations: &str| {
        format!(
            "<note><pitch><step>{}</step><octave>4</octave></pitch><duration>2</duration><voice>1</voice><type>quarter</type>{}</note>",
            step, notations
        )
    };
    let wide = |number: u32| {
        format!(
            r#"<tuplet type="start" number="{}"><tuplet-actual><tuplet-number>1000</tuplet-number></tuplet-actual><tuplet-normal><tuplet-number>1000</tuplet-number></tuplet-normal></tuplet>"#,
            number
        )
    };
    let xml = score(&format!(
        r#"<measure number="1">{}{}{}</measure>"#,
        ATTRIBUTES,
        tuplet_note("C", &format!("<notations>{}{}</notations>", wide(1), wide(2))),
        tuplet_note(
            "D",
            r#"<notations><tuplet type="stop" number="2"/><tuplet type="stop" number="1"/></notations>"#
        ),
    ));
    let (tree, context) = build(&xml);
    let tree = tree.unwrap();
    assert!(context
        .report()
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::SkippedElement));

    let measure = measures(&tree, first_voice(&tree))[0];
    let timed: Vec<&MeasureElement> = tree.measure(measure).timed_elements().collect();
    assert_eq!(timed.len(), 1);
    let MeasureElement::Tuplet(outer) = *timed[0] else {
        panic!("expected one tuplet");
    };
    assert!(tree
        .tuplet(outer)
        .members
        .iter()
        .all(|m| matches!(m, TupletMember::Note(_))));
    assert_eq!(tree.measure_sounding(measure), WholeNotes::new(1, 2));
}
