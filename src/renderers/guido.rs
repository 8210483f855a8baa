//! Guido tree → GMN text
//!
//! A score is a segment `{ ... }` of sequences `[ ... ]`, one per voice.
//! Guido octave 1 holds middle C.

use crate::converters::score_to_guido::{GuidoElement, GuidoNote, GuidoScore, GuidoTag};
use crate::models::{Alteration, Pitch};

pub fn render_guido(score: &GuidoScore) -> String {
    let voices = score
        .voices
        .iter()
        .map(|voice| format!("[ {} ]", sequence(&voice.elements)))
        .collect::<Vec<_>>()
        .join(",\n  ");
    format!("{{\n  {}\n}}\n", voices)
}

fn sequence(elements: &[GuidoElement]) -> String {
    elements.iter().map(element).collect::<Vec<_>>().join(" ")
}

fn element(element: &GuidoElement) -> String {
    match element {
        GuidoElement::Tag(tag) => render_tag(tag),
        GuidoElement::Range { tag, elements } => format!("{}( {} )", render_tag(tag), sequence(elements)),
        GuidoElement::Note(note) => render_note(note),
        GuidoElement::Chord(notes) => format!(
            "{{{}}}",
            notes.iter().map(render_note).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// `\name:id<p1,p2>`
pub fn render_tag(tag: &GuidoTag) -> String {
    let mut out = format!("\\{}", tag.name);
    if let Some(id) = tag.id {
        out.push_str(&format!(":{}", id));
    }
    if !tag.params.is_empty() {
        out.push_str(&format!("<{}>", tag.params.join(",")));
    }
    out
}

/// Guido has no quarter tones; they round toward the nearer semitone
fn accidental(alteration: Alteration) -> &'static str {
    match alteration {
        Alteration::DoubleFlat => "&&",
        Alteration::ThreeQuartersFlat | Alteration::Flat => "&",
        Alteration::QuarterFlat | Alteration::Natural | Alteration::QuarterSharp => "",
        Alteration::Sharp | Alteration::ThreeQuartersSharp => "#",
        Alteration::DoubleSharp => "##",
    }
}

pub fn pitch_name(pitch: Pitch) -> String {
    format!(
        "{}{}{}",
        pitch.step.letter().to_ascii_lowercase(),
        accidental(pitch.alteration),
        pitch.octave - 3
    )
}

/// e.g. `c#1/4.`, `_/2`, `e1*3/16`
pub fn render_note(note: &GuidoNote) -> String {
    let name = note.pitch.map(pitch_name).unwrap_or_else(|| "_".to_string());
    let duration = if note.numerator == 1 {
        format!("/{}", note.denominator)
    } else {
        format!("*{}/{}", note.numerator, note.denominator)
    };
    format!("{}{}{}", name, duration, ".".repeat(note.dots as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::context::RunContext;
    use crate::converters::score_to_guido::{score_to_guido, GuidoVoice};
    use crate::converters::test_support::{build, score, triplet_measure};
    use crate::models::Step;

    fn note(pitch: Option<Pitch>, numerator: i64, denominator: i64, dots: u8) -> GuidoNote {
        GuidoNote {
            pitch,
            numerator,
            denominator,
            dots,
        }
    }

    #[test]
    fn test_note_spelling() {
        let c_sharp = Pitch::new(Step::C, Alteration::Sharp, 4);
        assert_eq!(render_note(&note(Some(c_sharp), 1, 4, 1)), "c#1/4.");
        let b_double_flat = Pitch::new(Step::B, Alteration::DoubleFlat, 2);
        assert_eq!(render_note(&note(Some(b_double_flat), 1, 2, 0)), "b&&-1/2");
        assert_eq!(render_note(&note(None, 1, 1, 0)), "_/1");
        assert_eq!(render_note(&note(Some(Pitch::natural(Step::E, 5)), 1, 12, 0)), "e2/12");
        assert_eq!(render_note(&note(Some(Pitch::natural(Step::E, 5)), 3, 16, 0)), "e2*3/16");
    }

    #[test]
    fn test_tags_ranges_and_chords() {
        let score = GuidoScore {
            title: None,
            composer: None,
            voices: vec![GuidoVoice {
                part: "P1".to_string(),
                staff: 1,
                elements: vec![
                    GuidoElement::Tag(GuidoTag::new("staff").with_number(1)),
                    GuidoElement::Tag(GuidoTag::new("slurBegin").with_id(2)),
                    GuidoElement::Range {
                        tag: GuidoTag::new("stacc"),
                        elements: vec![GuidoElement::Chord(vec![
                            note(Some(Pitch::natural(Step::C, 4)), 1, 4, 0),
                            note(Some(Pitch::natural(Step::G, 4)), 1, 4, 0),
                        ])],
                    },
                ],
            }],
        };
        assert_eq!(
            render_guido(&score),
            "{\n  [ \\staff<1> \\slurBegin:2 \\stacc( {c1/4, g1/4} ) ]\n}\n"
        );
    }

    #[test]
    fn test_triplet_score_renders_one_sequence() {
        let (tree, _) = build(&score(&triplet_measure()));
        let guido = score_to_guido(&tree, &mut RunContext::new(RunConfig::default()));
        let text = render_guido(&guido);
        assert!(text.starts_with("{\n  [ \\staff<1> \\title<\"Etude\">"));
        assert!(text.contains("\\meter<\"2/4\">"));
        assert!(text.contains("c2/12 d2/12 e2/12"));
        assert!(text.trim_end().ends_with("]\n}"));
    }
}
