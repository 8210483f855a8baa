use super::*;
use crate::config::RunConfig;
use crate::context::RunContext;
use crate::converters::score_to_lpsr::{score_to_lpsr, LpsrChordMember, LpsrHeader};
use crate::converters::test_support::{build, score, triplet_measure};
use crate::models::Step;

fn settings(language: PitchLanguage) -> LilypondSettings {
    LilypondSettings {
        language,
        ..LilypondSettings::default()
    }
}

fn render(xml: &str, settings: &LilypondSettings) -> String {
    let (tree, _) = build(xml);
    let lpsr = score_to_lpsr(&tree, &mut RunContext::new(RunConfig::default()));
    render_lilypond_score(&lpsr, settings).unwrap()
}

fn note(kind: LpsrNoteKind, note_type: NoteType, events: Vec<LpsrEvent>) -> LpsrNote {
    LpsrNote {
        kind,
        duration: LpsrDuration::new(note_type, 0),
        forced_accidental: false,
        events,
    }
}

fn one_voice_score(music: Vec<LpsrMusic>, implicit: bool) -> LpsrScore {
    LpsrScore {
        header: LpsrHeader::default(),
        items: vec![LpsrGroupItem::Part(LpsrPart {
            id: "P1".to_string(),
            name: "Oboe".to_string(),
            abbreviation: None,
            staves: vec![LpsrStaff {
                number: 1,
                voices: vec![LpsrVoice {
                    name: "P1-staff1-voice1".to_string(),
                    number: 1,
                    measures: vec![LpsrMeasure {
                        number: "0".to_string(),
                        implicit,
                        duration: crate::models::WholeNotes::new(1, 4),
                        music,
                    }],
                }],
            }],
        })],
    }
}

#[test]
fn test_pitch_spelling_per_language() {
    let b_flat = Pitch::new(Step::B, Alteration::Flat, 3);
    let e_flat = Pitch::new(Step::E, Alteration::Flat, 5);
    let f_sharp = Pitch::new(Step::F, Alteration::Sharp, 4);
    let c_quarter_sharp = Pitch::new(Step::C, Alteration::QuarterSharp, 2);

    assert_eq!(pitch_to_lilypond(b_flat, PitchLanguage::Nederlands), "bes");
    assert_eq!(pitch_to_lilypond(e_flat, PitchLanguage::Nederlands), "es''");
    assert_eq!(pitch_to_lilypond(f_sharp, PitchLanguage::Nederlands), "fis'");
    assert_eq!(pitch_to_lilypond(c_quarter_sharp, PitchLanguage::Nederlands), "cih,");

    assert_eq!(pitch_to_lilypond(b_flat, PitchLanguage::English), "bf");
    assert_eq!(pitch_to_lilypond(c_quarter_sharp, PitchLanguage::English), "cqs,");

    assert_eq!(pitch_to_lilypond(b_flat, PitchLanguage::Deutsch), "b");
    assert_eq!(pitch_to_lilypond(Pitch::natural(Step::B, 4), PitchLanguage::Deutsch), "h'");

    assert_eq!(pitch_to_lilypond(f_sharp, PitchLanguage::Italiano), "fad'");
    assert_eq!(pitch_to_lilypond(b_flat, PitchLanguage::Italiano), "sib");
}

#[test]
fn test_duration_spelling() {
    assert_eq!(duration_to_lilypond(&LpsrDuration::new(NoteType::Quarter, 1)), "4.");
    assert_eq!(duration_to_lilypond(&LpsrDuration::new(NoteType::Breve, 0)), "\\breve");
    assert_eq!(duration_to_lilypond(&LpsrDuration::new(NoteType::N16th, 2)), "16..");
    let scaled = LpsrDuration::of_length(crate::models::WholeNotes::new(5, 8));
    assert_eq!(duration_to_lilypond(&scaled), "1*5/8");
}

#[test]
fn test_full_document_from_musicxml() {
    let ly = render(&score(&triplet_measure()), &settings(PitchLanguage::Nederlands));
    assert!(ly.starts_with("\\version \"2.24.0\"\n\\language \"nederlands\""));
    assert!(ly.contains("  title = \"Etude\"\n"));
    assert!(ly.contains("  composer = \"A. Composer\"\n"));
    assert!(ly.contains("\\new Staff = \"P1-staff1\" \\with { instrumentName = \"Flute\" } <<"));
    assert!(ly.contains("\\new Voice = \"P1-staff1-voice1\" {"));
    assert!(ly.contains("\\clef \"treble\" \\key c \\major \\time 2/4 \\tuplet 3/2 {"));
    assert!(ly.contains("f'4 |"));
    assert!(!ly.contains("\\voiceOne"));
}

#[test]
fn test_title_override_wins_over_the_score() {
    let settings = LilypondSettings {
        title: Some("Study \"No. 1\"".to_string()),
        ..LilypondSettings::default()
    };
    let ly = render(&score(&triplet_measure()), &settings);
    assert!(ly.contains("  title = \"Study \\\"No. 1\\\"\"\n"));
    assert!(!ly.contains("Etude"));
}

#[test]
fn test_headerless_score_uses_minimal_template() {
    let music = vec![LpsrMusic::Note(note(LpsrNoteKind::Rest { position: None }, NoteType::Quarter, vec![]))];
    let ly = render_lilypond_score(&one_voice_score(music, true), &LilypondSettings::default()).unwrap();
    assert!(!ly.contains("\\header"));
    assert!(ly.contains("\\partial 4 r4 |"));
}

#[test]
fn test_events_surround_the_note() {
    let events = vec![
        LpsrEvent::Stem(StemDirection::Up),
        LpsrEvent::Articulation(ArticulationKind::Staccato),
        LpsrEvent::SlurStart(1),
        LpsrEvent::SlurStart(2),
        LpsrEvent::Dynamic(DynamicKind::SFZ),
        LpsrEvent::WedgeStart(WedgeKind::Crescendo),
        LpsrEvent::Tie,
    ];
    let music = vec![LpsrMusic::Note(note(
        LpsrNoteKind::Pitched(Pitch::natural(Step::G, 4)),
        NoteType::Eighth,
        events,
    ))];
    let lpsr = one_voice_score(music, false);

    let ly = render_lilypond_score(&lpsr, &LilypondSettings::default()).unwrap();
    assert!(ly.contains("\\stemUp g'8-.(\\=2(\\sfz\\< ~ |"));

    let quiet = LilypondSettings {
        convert_directions: false,
        ..LilypondSettings::default()
    };
    let ly = render_lilypond_score(&lpsr, &quiet).unwrap();
    assert!(ly.contains("\\stemUp g'8-.(\\=2( ~ |"));
}

#[test]
fn test_unusual_dynamics_become_markup() {
    assert_eq!(dynamic(DynamicKind::FF), "\\ff");
    assert_eq!(dynamic(DynamicKind::RF), "_\\markup { \\dynamic rf }");
}

#[test]
fn test_chords_rests_and_grouping() {
    let chord = LpsrChord {
        members: vec![
            LpsrChordMember {
                pitch: Pitch::natural(Step::C, 4),
                forced_accidental: false,
                tie: true,
            },
            LpsrChordMember {
                pitch: Pitch::new(Step::E, Alteration::Flat, 4),
                forced_accidental: true,
                tie: false,
            },
        ],
        duration: LpsrDuration::new(NoteType::Half, 0),
        events: vec![LpsrEvent::BeamStart],
    };
    let music = vec![
        LpsrMusic::Chord(chord),
        LpsrMusic::Note(note(LpsrNoteKind::MeasureRest, NoteType::Whole, vec![])),
        LpsrMusic::Note(note(LpsrNoteKind::Skip, NoteType::Quarter, vec![])),
        LpsrMusic::MultipleRest {
            measure_length: crate::models::WholeNotes::new(3, 4),
            count: 4,
        },
    ];
    let mut lpsr = one_voice_score(music, false);
    let part = lpsr.items.remove(0);
    lpsr.items.push(LpsrGroupItem::Group(LpsrPartGroup {
        name: Some("Winds".to_string()),
        symbol: GroupSymbol::Bracket,
        items: vec![part],
    }));

    let ly = render_lilypond_score(&lpsr, &LilypondSettings::default()).unwrap();
    assert!(ly.contains("<c'~ es'!>2[ R1 s4 R2.*4 |"));
    assert!(ly.contains("\\new StaffGroup \\with { instrumentName = \"Winds\" } <<"));
    assert!(ly.contains("\\compressMMRests {"));
}

#[test]
fn test_two_voices_get_voice_commands() {
    let rest = || LpsrMusic::Note(note(LpsrNoteKind::Rest { position: None }, NoteType::Quarter, vec![]));
    let mut lpsr = one_voice_score(vec![rest()], false);
    let LpsrGroupItem::Part(part) = &mut lpsr.items[0] else {
        unreachable!()
    };
    let mut second = part.staves[0].voices[0].clone();
    second.name = "P1-staff1-voice2".to_string();
    second.number = 2;
    part.staves[0].voices.push(second);

    let ly = render_lilypond_score(&lpsr, &LilypondSettings::default()).unwrap();
    assert!(ly.contains("\\voiceOne"));
    assert!(ly.contains("\\voiceTwo"));
}
