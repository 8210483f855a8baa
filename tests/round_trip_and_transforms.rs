//! Regenerated MusicXML, configured transforms and written output files

use std::fs;

use score_ir::config::{FilterSets, TransformName};
use score_ir::transforms::transform_for;
use score_ir::{flat_view, Backend, Pipeline, RunConfig, RunContext, RunState};

const QUARTET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <work><work-title>Round</work-title></work>
  <identification><creator type="composer">Anon.</creator></identification>
  <part-list>
    <part-group type="start" number="1"><group-symbol>brace</group-symbol></part-group>
    <score-part id="P1"><part-name>Piano</part-name></score-part>
    <part-group type="stop" number="1"/>
    <score-part id="P2"><part-name>Bass</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>2</divisions><key><fifths>-1</fifths><mode>major</mode></key>
        <time><beats>2</beats><beat-type>4</beat-type></time><staves>2</staves>
        <clef number="1"><sign>G</sign><line>2</line></clef><clef number="2"><sign>F</sign><line>4</line></clef></attributes>
      <note><rest/><duration>2</duration><voice>1</voice><type>quarter</type><staff>1</staff></note>
      <note><pitch><step>B</step><alter>-1</alter><octave>4</octave></pitch><duration>1</duration><voice>1</voice><type>eighth</type><staff>1</staff>
        <beam number="1">begin</beam><notations><slur type="start" number="1"/></notations></note>
      <note><pitch><step>A</step><octave>4</octave></pitch><duration>1</duration><voice>1</voice><type>eighth</type><staff>1</staff>
        <beam number="1">end</beam><notations><slur type="stop" number="1"/></notations></note>
      <backup><duration>4</duration></backup>
      <note><rest/><duration>2</duration><voice>2</voice><type>quarter</type><staff>1</staff></note>
      <note><pitch><step>F</step><octave>4</octave></pitch><duration>2</duration><voice>2</voice><type>quarter</type><staff>1</staff></note>
      <backup><duration>4</duration></backup>
      <note><pitch><step>F</step><octave>3</octave></pitch><duration>4</duration><voice>5</voice><type>half</type><staff>2</staff></note>
    </measure>
    <measure number="2">
      <note><rest measure="yes"/><duration>4</duration><voice>1</voice><staff>1</staff></note>
      <backup><duration>4</duration></backup>
      <note><rest measure="yes"/><duration>4</duration><voice>2</voice><staff>1</staff></note>
      <backup><duration>4</duration></backup>
      <note><rest measure="yes"/><duration>4</duration><voice>5</voice><staff>2</staff></note>
    </measure>
    <measure number="3">
      <note><rest measure="yes"/><duration>4</duration><voice>1</voice><staff>1</staff></note>
      <backup><duration>4</duration></backup>
      <note><rest measure="yes"/><duration>4</duration><voice>2</voice><staff>1</staff></note>
      <backup><duration>4</duration></backup>
      <note><rest measure="yes"/><duration>4</duration><voice>5</voice><staff>2</staff></note>
    </measure>
    <measure number="4">
      <note><pitch><step>F</step><octave>5</octave></pitch><duration>4</duration><voice>1</voice><type>half</type><staff>1</staff></note>
      <backup><duration>4</duration></backup>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><voice>2</voice><type>half</type><staff>1</staff></note>
      <backup><duration>4</duration></backup>
      <note><pitch><step>F</step><octave>2</octave></pitch><duration>4</duration><voice>5</voice><type>half</type><staff>2</staff></note>
      <barline location="right"><bar-style>light-heavy</bar-style><repeat direction="backward"/></barline>
    </measure>
  </part>
  <part id="P2">
    <measure number="1">
      <attributes><divisions>2</divisions><time><beats>2</beats><beat-type>4</beat-type></time>
        <clef><sign>F</sign><line>4</line></clef></attributes>
      <note><pitch><step>F</step><octave>2</octave></pitch><duration>4</duration><voice>1</voice><type>half</type></note>
    </measure>
  </part>
</score-partwise>"#;

const ALL_TRANSFORMS: [TransformName; 6] = [
    TransformName::PartFilter,
    TransformName::StaffFilter,
    TransformName::VoiceFilter,
    TransformName::CoalesceEmptyMeasures,
    TransformName::MergeRests,
    TransformName::ImplicitInitialRepeatBarline,
];

fn build_only() -> RunConfig {
    RunConfig {
        passes: vec![1],
        ..RunConfig::default()
    }
}

#[test]
fn test_regenerated_musicxml_builds_the_same_tree() {
    let config = RunConfig {
        backends: vec![Backend::Musicxml],
        ..RunConfig::default()
    };
    let first = Pipeline::new(config).unwrap().run_str("quartet.musicxml", QUARTET);
    assert_eq!(first.state, RunState::Completed);
    let regenerated = first.text(Backend::Musicxml).unwrap();

    let second = Pipeline::new(build_only())
        .unwrap()
        .run_str("regenerated.musicxml", regenerated);
    assert_eq!(second.state, RunState::Completed);
    assert_eq!(
        flat_view(second.score.as_ref().unwrap()),
        flat_view(first.score.as_ref().unwrap())
    );
}

#[test]
fn test_configured_transforms_reach_every_backend() {
    let config = RunConfig::from_json(
        r#"{
            "backends": ["lilypond", "musicxml"],
            "transforms": {
                "enabled": ["part-filter", "merge-rests", "coalesce-empty-measures", "implicit-initial-repeat-barline"],
                "part_filter": { "ignore": ["Bass"] }
            }
        }"#,
    )
    .unwrap();
    let outcome = Pipeline::new(config).unwrap().run_str("quartet.musicxml", QUARTET);
    assert_eq!(outcome.state, RunState::Completed);

    let tree = outcome.score.as_ref().unwrap();
    assert_eq!(tree.parts_in_order().len(), 1);

    let ly = outcome.text(Backend::Lilypond).unwrap();
    assert!(!ly.contains("Bass"));
    assert!(ly.contains("\\bar \".|:\""));
    assert!(ly.contains("R2*2"));
    assert!(ly.contains("\\new PianoStaff"));

    let xml = outcome.text(Backend::Musicxml).unwrap();
    assert!(xml.contains("<multiple-rest>2</multiple-rest>"));
    assert!(xml.contains("<forward>"));
    assert!(!xml.contains("P2"));

    let transformed: Vec<&str> = outcome
        .timings
        .iter()
        .filter_map(|t| t.operation.strip_prefix("transform "))
        .collect();
    assert_eq!(
        transformed,
        vec!["part-filter", "merge-rests", "coalesce-empty-measures", "implicit-initial-repeat-barline"]
    );
}

#[test]
fn test_transforms_leave_their_own_output_alone() {
    let mut config = build_only();
    config.transforms.part_filter = FilterSets::keep_only(vec!["P1".to_string()]);
    config.transforms.staff_filter = FilterSets::ignoring(vec![2]);
    config.transforms.voice_filter = FilterSets::keep_only(vec![1, 5]);
    let built = Pipeline::new(build_only()).unwrap().run_str("quartet.musicxml", QUARTET);
    let tree = built.score.unwrap();

    for name in ALL_TRANSFORMS {
        let mut context = RunContext::new(config.clone());
        let transform = transform_for(name, &config.transforms);
        let once = transform.transform(&tree, &mut context);
        let mut twice = once.clone();
        assert_eq!(transform.apply(&mut twice, &mut context), 0, "{}", name.name());
        assert_eq!(flat_view(&twice), flat_view(&once));
    }
}

#[test]
fn test_rendered_texts_written_to_disk() {
    let config = RunConfig {
        backends: vec![Backend::Lilypond, Backend::Braille, Backend::Guido, Backend::Musicxml],
        ..RunConfig::default()
    };
    let outcome = Pipeline::new(config).unwrap().run_str("quartet.musicxml", QUARTET);
    assert_eq!(outcome.state, RunState::Completed);

    let dir = tempfile::tempdir().unwrap();
    for (backend, text) in &outcome.texts {
        let extension = match backend {
            Backend::Lilypond => "ly",
            Backend::Braille => "brf",
            Backend::Guido => "gmn",
            Backend::Musicxml => "musicxml",
        };
        fs::write(dir.path().join(format!("quartet.{}", extension)), text).unwrap();
    }

    let ly = fs::read_to_string(dir.path().join("quartet.ly")).unwrap();
    assert!(ly.starts_with("\\version \"2.24.0\""));
    assert!(ly.contains("title = \"Round\""));
    assert!(ly.contains("\\key f \\major"));
    assert!(ly.contains("bes'8"));

    let gmn = fs::read_to_string(dir.path().join("quartet.gmn")).unwrap();
    assert!(gmn.starts_with('{'));
    let braille = fs::read_to_string(dir.path().join("quartet.brf")).unwrap();
    assert!(braille.starts_with("Round\nAnon.\n"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
}
