//! `<direction>` element → decorations for the next note, or a tempo mark

use log::debug;

use super::notes::parse_dynamics;
use crate::context::RunContext;
use crate::errors::WarningKind;
use crate::ir::{
    Decoration, DecorationKind, PairRole, PedalKind, Placement, SpannerKind, Tempo, WedgeKind,
};
use crate::models::NoteType;
use crate::musicxml::MusicXmlElement;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct DirectionValues {
    pub line: usize,
    pub staff: u32,
    /// Voice the direction names; the builder falls back to the next note's voice
    pub voice: Option<u32>,
    pub decorations: Vec<Decoration>,
    pub tempo: Option<Tempo>,
}

impl DirectionValues {
    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty() && self.tempo.is_none()
    }
}

pub(super) fn parse_direction(element: &MusicXmlElement, context: &mut RunContext) -> DirectionValues {
    let placement = element.attribute("placement").and_then(Placement::from_musicxml);
    let mut decorations = Vec::new();
    let mut words = Vec::new();
    let mut tempo: Option<Tempo> = None;

    for direction_type in element.children_named("direction-type") {
        for child in &direction_type.children {
            let line = child.line;
            match child.name.as_str() {
                "dynamics" => {
                    for decoration in parse_dynamics(child, context) {
                        decorations.push(decoration.with_placement(placement));
                    }
                }
                "words" => {
                    if let Some(text) = child.text.as_deref().filter(|t| !t.is_empty()) {
                        words.push((line, text.to_string()));
                    }
                }
                "pedal" => match child.attribute("type").and_then(PedalKind::from_musicxml) {
                    Some(kind) => decorations.push(
                        Decoration::new(line, DecorationKind::Pedal(kind)).with_placement(placement),
                    ),
                    None => skipped(context, child),
                },
                "wedge" => {
                    let number = child.attribute_as::<u32>("number").unwrap_or(1);
                    let (kind, role) = match child.attribute("type") {
                        Some("crescendo") => (WedgeKind::Crescendo, PairRole::Start),
                        Some("diminuendo") => (WedgeKind::Diminuendo, PairRole::Start),
                        // the stop learns its kind when linked to its start
                        Some("stop") => (WedgeKind::Crescendo, PairRole::Stop),
                        Some("continue") => continue,
                        _ => {
                            skipped(context, child);
                            continue;
                        }
                    };
                    decorations.push(
                        Decoration::new(
                            line,
                            DecorationKind::Wedge {
                                kind,
                                role,
                                number,
                                pair: None,
                            },
                        )
                        .with_placement(placement),
                    );
                }
                "dashes" => {
                    if let Some(role) = start_or_stop(child) {
                        decorations.push(
                            Decoration::new(
                                line,
                                DecorationKind::Spanner {
                                    kind: SpannerKind::Dashes,
                                    role,
                                    number: child.attribute_as::<u32>("number").unwrap_or(1),
                                    pair: None,
                                },
                            )
                            .with_placement(placement),
                        );
                    }
                }
                "bracket" => {
                    if let Some(role) = start_or_stop(child) {
                        decorations.push(
                            Decoration::new(
                                line,
                                DecorationKind::Ligature {
                                    role,
                                    number: child.attribute_as::<u32>("number").unwrap_or(1),
                                    pair: None,
                                },
                            )
                            .with_placement(placement),
                        );
                    }
                }
                "metronome" => tempo = parse_metronome(child, context),
                _ => debug!("direction type <{}> at line {} not converted", child.name, line),
            }
        }
    }

    // <sound tempo> supplies a rate when the metronome mark omits one
    if let Some(sound_tempo) = element
        .child("sound")
        .and_then(|s| s.attribute_as::<f64>("tempo"))
    {
        if let Some(tempo) = tempo.as_mut() {
            if tempo.per_minute.is_none() {
                tempo.per_minute = Some(sound_tempo.round() as u32);
            }
        }
    }

    match tempo.as_mut() {
        Some(tempo) if !words.is_empty() => {
            tempo.words = Some(
                words
                    .iter()
                    .map(|(_, text)| text.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            );
        }
        _ => {
            for (line, text) in words {
                decorations.push(
                    Decoration::new(line, DecorationKind::Words(text)).with_placement(placement),
                );
            }
        }
    }

    DirectionValues {
        line: element.line,
        staff: element.child_text_as::<u32>("staff").unwrap_or(1),
        voice: element.child_text_as::<u32>("voice"),
        decorations,
        tempo,
    }
}

fn parse_metronome(element: &MusicXmlElement, context: &mut RunContext) -> Option<Tempo> {
    let beat_unit = match element.child_text("beat-unit") {
        Some(name) => match NoteType::from_musicxml(name) {
            Some(note_type) => Some(note_type),
            None => {
                context.warn(
                    WarningKind::UnknownValue,
                    element.line,
                    format!("unknown beat unit {:?}", name),
                );
                return None;
            }
        },
        None => None,
    };
    Some(Tempo {
        line: element.line,
        words: None,
        beat_unit,
        beat_unit_dots: element.children_named("beat-unit-dot").count() as u8,
        per_minute: element
            .child_text("per-minute")
            .and_then(|t| t.trim().parse::<f64>().ok())
            .map(|bpm| bpm.round() as u32),
    })
}

fn start_or_stop(element: &MusicXmlElement) -> Option<PairRole> {
    match element.attribute("type").and_then(PairRole::from_musicxml) {
        Some(PairRole::Continue) | None => None,
        role => role,
    }
}

fn skipped(context: &mut RunContext, element: &MusicXmlElement) {
    context.warn(
        WarningKind::SkippedElement,
        element.line,
        format!("<{}> {:?} not supported", element.name, element.attribute("type").unwrap_or("")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::ir::DynamicKind;
    use crate::musicxml::read_musicxml;

    fn direction(xml: &str) -> DirectionValues {
        let root = read_musicxml("direction", xml).unwrap().root;
        let mut context = RunContext::new(RunConfig::default());
        parse_direction(&root, &mut context)
    }

    #[test]
    fn test_dynamics_and_wedge_keep_placement() {
        let values = direction(
            r#"<direction placement="below">
                 <direction-type><dynamics><mf/></dynamics></direction-type>
                 <direction-type><wedge type="crescendo" number="1"/></direction-type>
                 <staff>2</staff>
               </direction>"#,
        );
        assert_eq!(values.staff, 2);
        assert_eq!(values.voice, None);
        assert_eq!(values.decorations[0].kind, DecorationKind::Dynamic(DynamicKind::MF));
        assert_eq!(values.decorations[0].placement, Some(Placement::Below));
        assert!(matches!(
            values.decorations[1].kind,
            DecorationKind::Wedge {
                kind: WedgeKind::Crescendo,
                role: PairRole::Start,
                number: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_metronome_absorbs_words() {
        let values = direction(
            r#"<direction>
                 <direction-type><words>Allegro</words></direction-type>
                 <direction-type><metronome><beat-unit>quarter</beat-unit><beat-unit-dot/><per-minute>96</per-minute></metronome></direction-type>
                 <voice>1</voice>
               </direction>"#,
        );
        let tempo = values.tempo.unwrap();
        assert_eq!(tempo.words.as_deref(), Some("Allegro"));
        assert_eq!(tempo.beat_unit, Some(NoteType::Quarter));
        assert_eq!(tempo.beat_unit_dots, 1);
        assert_eq!(tempo.per_minute, Some(96));
        assert!(values.decorations.is_empty());
        assert_eq!(values.voice, Some(1));
    }

    #[test]
    fn test_bracket_becomes_ligature() {
        let values = direction(
            r#"<direction><direction-type><bracket type="start" number="2" line-end="down"/></direction-type></direction>"#,
        );
        assert_eq!(
            values.decorations[0].kind,
            DecorationKind::Ligature {
                role: PairRole::Start,
                number: 2,
                pair: None
            }
        );
    }
}
