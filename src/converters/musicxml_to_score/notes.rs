//! `<note>` element → [`NoteValues`]
//!
//! Parsing only: nothing here touches the score tree. Values the builder
//! cannot work without (pitch, duration) are returned as errors; unknown
//! optional values are warned about and skipped.

use log::debug;

use crate::context::RunContext;
use crate::errors::{SemanticErrorKind, WarningKind};
use crate::ir::{
    ArticulationKind, BeamValue, Decoration, DecorationKind, DynamicKind, NoteKind, OrnamentKind,
    PairRole, Placement, SpannerKind, StemDirection, TechnicalKind,
};
use crate::models::{
    AccidentalKind, Alteration, DisplayDuration, NoteType, Pitch, Step, TupletFactor, WholeNotes,
};
use crate::musicxml::MusicXmlElement;

/// Largest `<duration>` accepted, in divisions
pub(super) const MAX_DURATION: i64 = 1 << 30;
/// Largest `<divisions>` accepted
pub(super) const MAX_DIVISIONS: i64 = 1 << 20;
/// Largest tuplet number accepted, in `<actual-notes>` as in `<tuplet-number>`
pub(super) const MAX_TUPLET_NUMBER: u32 = 1 << 10;

/// A `<tuplet>` notation on a note
#[derive(Debug, Clone, PartialEq)]
pub(super) struct TupletMark {
    pub role: PairRole,
    pub number: u32,
    /// From `<tuplet-actual>` / `<tuplet-normal>` when both are given
    pub factor: Option<TupletFactor>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct NoteValues {
    pub line: usize,
    pub kind: NoteKind,
    /// From `<duration>`, or derived from the written value when absent
    pub sounding: WholeNotes,
    pub display: Option<DisplayDuration>,
    pub accidental: Option<AccidentalKind>,
    /// `Some(slashed)` for grace notes
    pub grace: Option<bool>,
    pub chord: bool,
    pub measure_rest: bool,
    pub staff: u32,
    pub voice: u32,
    pub time_modification: Option<TupletFactor>,
    pub tuplets: Vec<TupletMark>,
    pub decorations: Vec<Decoration>,
}

pub(super) fn parse_note(
    element: &MusicXmlElement,
    divisions: i64,
    context: &mut RunContext,
) -> Result<NoteValues, SemanticErrorKind> {
    let line = element.line;
    let kind = parse_kind(element)?;

    let display = match element.child("type") {
        Some(type_element) => {
            let name = type_element.text.as_deref().unwrap_or("");
            match NoteType::from_musicxml(name) {
                Some(note_type) => Some(DisplayDuration::new(
                    note_type,
                    element.children_named("dot").count() as u8,
                )),
                None => {
                    context.warn(
                        WarningKind::UnknownValue,
                        type_element.line,
                        format!("unknown note type {:?}", name),
                    );
                    None
                }
            }
        }
        None => None,
    };

    let time_modification = match element.child("time-modification") {
        Some(tm) => {
            let actual = tm.child_text_as::<u32>("actual-notes");
            let normal = tm.child_text_as::<u32>("normal-notes");
            let factor = actual.zip(normal).and_then(|(a, n)| TupletFactor::new(a, n));
            match factor {
                Some(f) if f.actual > MAX_TUPLET_NUMBER || f.normal > MAX_TUPLET_NUMBER => {
                    context.warn(
                        WarningKind::UnknownValue,
                        tm.line,
                        format!("time modification {} out of range, ignored", f),
                    );
                    None
                }
                factor => factor,
            }
        }
        None => None,
    };

    let grace = element
        .child("grace")
        .map(|g| g.attribute("slash") == Some("yes"));

    let sounding = if grace.is_some() {
        WholeNotes::zero()
    } else {
        match element.child_text("duration") {
            Some(text) => text
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|d| (0..=MAX_DURATION).contains(d))
                .and_then(|d| WholeNotes::from_divisions(d, divisions))
                .ok_or_else(|| SemanticErrorKind::InvalidValue {
                    element: "duration".into(),
                    value: text.to_string(),
                })?,
            None => match display {
                Some(display) => {
                    let factor = time_modification.unwrap_or_else(TupletFactor::identity);
                    display.whole_notes() * factor.as_rational()
                }
                None => {
                    return Err(SemanticErrorKind::InvalidValue {
                        element: "duration".into(),
                        value: String::new(),
                    })
                }
            },
        }
    };

    let accidental = element.child("accidental").and_then(|a| {
        let name = a.text.as_deref().unwrap_or("");
        let parsed = AccidentalKind::from_musicxml(name);
        if parsed.is_none() {
            context.warn(WarningKind::UnknownValue, a.line, format!("unknown accidental {:?}", name));
        }
        parsed
    });

    let voice = match element.child_text("voice") {
        Some(text) => text.trim().parse::<u32>().unwrap_or_else(|_| {
            context.warn(
                WarningKind::UnknownValue,
                line,
                format!("voice {:?} is not a number, using voice 1", text),
            );
            1
        }),
        None => 1,
    };

    let mut decorations = Vec::new();
    let mut tuplets = Vec::new();
    if let Some(stem) = element.child("stem") {
        if let Some(direction) = stem.text.as_deref().and_then(StemDirection::from_musicxml) {
            decorations.push(Decoration::new(stem.line, DecorationKind::Stem(direction)));
        }
    }
    for beam in element.children_named("beam") {
        let number = beam.attribute_as::<u8>("number").unwrap_or(1);
        let value = beam.text.as_deref().and_then(BeamValue::from_musicxml);
        match value {
            Some(value) if (1..=8).contains(&number) => {
                decorations.push(Decoration::new(beam.line, DecorationKind::Beam { number, value }))
            }
            _ => context.warn(
                WarningKind::UnknownValue,
                beam.line,
                format!("beam {} {:?} ignored", number, beam.text.as_deref().unwrap_or("")),
            ),
        }
    }

    let tied_from_notations = element
        .children_named("notations")
        .any(|n| n.has_child("tied"));
    if !tied_from_notations {
        // <tie> is the sound-only twin of <tied>; use it when the notation is missing
        for tie in element.children_named("tie") {
            if let Some(role) = tie_role(tie) {
                decorations.push(Decoration::new(tie.line, DecorationKind::Tie { role, pair: None }));
            }
        }
    }
    for notations in element.children_named("notations") {
        parse_notations(notations, &mut decorations, &mut tuplets, context);
    }

    Ok(NoteValues {
        line,
        kind,
        sounding,
        display,
        accidental,
        grace,
        chord: element.has_child("chord"),
        measure_rest: element
            .child("rest")
            .map(|r| r.attribute("measure") == Some("yes"))
            .unwrap_or(false),
        staff: element.child_text_as::<u32>("staff").unwrap_or(1),
        voice,
        time_modification,
        tuplets,
        decorations,
    })
}

fn parse_kind(element: &MusicXmlElement) -> Result<NoteKind, SemanticErrorKind> {
    if let Some(pitch) = element.child("pitch") {
        return Ok(NoteKind::Pitched(parse_pitch(pitch, "step", "octave")?));
    }
    if let Some(rest) = element.child("rest") {
        let display = if rest.has_child("display-step") {
            Some(parse_pitch(rest, "display-step", "display-octave")?)
        } else {
            None
        };
        return Ok(NoteKind::Rest { display });
    }
    if let Some(unpitched) = element.child("unpitched") {
        let display = if unpitched.has_child("display-step") {
            Some(parse_pitch(unpitched, "display-step", "display-octave")?)
        } else {
            None
        };
        return Ok(NoteKind::Unpitched { display });
    }
    Err(SemanticErrorKind::InvalidValue {
        element: "note".into(),
        value: "no pitch, rest or unpitched".into(),
    })
}

fn parse_pitch(element: &MusicXmlElement, step: &str, octave: &str) -> Result<Pitch, SemanticErrorKind> {
    let step_text = element.child_text(step).unwrap_or("");
    let parsed_step = Step::from_musicxml(step_text).ok_or_else(|| SemanticErrorKind::InvalidValue {
        element: step.into(),
        value: step_text.into(),
    })?;
    let octave_text = element.child_text(octave).unwrap_or("");
    let parsed_octave = octave_text
        .trim()
        .parse::<i8>()
        .ok()
        .filter(|o| (0..=9).contains(o))
        .ok_or_else(|| SemanticErrorKind::InvalidValue {
            element: octave.into(),
            value: octave_text.into(),
        })?;
    let alteration = match element.child_text("alter") {
        Some(text) => text
            .trim()
            .parse::<f32>()
            .ok()
            .and_then(Alteration::from_semitones)
            .ok_or_else(|| SemanticErrorKind::InvalidValue {
                element: "alter".into(),
                value: text.into(),
            })?,
        None => Alteration::Natural,
    };
    Ok(Pitch::new(parsed_step, alteration, parsed_octave))
}

fn tie_role(element: &MusicXmlElement) -> Option<PairRole> {
    match element.attribute("type") {
        Some("start") => Some(PairRole::Start),
        Some("stop") => Some(PairRole::Stop),
        // continue and let-ring carry no pairing of their own
        _ => None,
    }
}

fn paired_role(element: &MusicXmlElement) -> Option<PairRole> {
    element.attribute("type").and_then(PairRole::from_musicxml)
}

fn placement(element: &MusicXmlElement) -> Option<Placement> {
    element.attribute("placement").and_then(Placement::from_musicxml)
}

fn number(element: &MusicXmlElement) -> u32 {
    element.attribute_as::<u32>("number").unwrap_or(1)
}

fn parse_notations(
    notations: &MusicXmlElement,
    decorations: &mut Vec<Decoration>,
    tuplets: &mut Vec<TupletMark>,
    context: &mut RunContext,
) {
    for child in &notations.children {
        let line = child.line;
        match child.name.as_str() {
            "tied" => {
                if let Some(role) = tie_role(child) {
                    decorations.push(Decoration::new(line, DecorationKind::Tie { role, pair: None }));
                }
            }
            "slur" => match paired_role(child) {
                Some(role) => decorations.push(
                    Decoration::new(
                        line,
                        DecorationKind::Slur {
                            role,
                            number: number(child),
                            pair: None,
                        },
                    )
                    .with_placement(placement(child)),
                ),
                None => unknown(context, child),
            },
            "tuplet" => match paired_role(child) {
                Some(role @ (PairRole::Start | PairRole::Stop)) => {
                    let actual = child
                        .descendant(&["tuplet-actual", "tuplet-number"])
                        .and_then(|n| n.text.as_deref()?.trim().parse::<u32>().ok());
                    let normal = child
                        .descendant(&["tuplet-normal", "tuplet-number"])
                        .and_then(|n| n.text.as_deref()?.trim().parse::<u32>().ok());
                    let mut factor = actual.zip(normal).and_then(|(a, n)| TupletFactor::new(a, n));
                    if let Some(f) = factor.filter(|f| f.actual > MAX_TUPLET_NUMBER || f.normal > MAX_TUPLET_NUMBER) {
                        context.warn(
                            WarningKind::UnknownValue,
                            line,
                            format!("tuplet numbers {} out of range, ignored", f),
                        );
                        factor = None;
                    }
                    tuplets.push(TupletMark {
                        role,
                        number: number(child),
                        factor,
                        line,
                    });
                }
                _ => unknown(context, child),
            },
            "articulations" => {
                for articulation in &child.children {
                    match ArticulationKind::from_musicxml(&articulation.name) {
                        Some(kind) => decorations.push(
                            Decoration::new(articulation.line, DecorationKind::Articulation(kind))
                                .with_placement(placement(articulation)),
                        ),
                        None => unknown(context, articulation),
                    }
                }
            }
            "fermata" => decorations.push(Decoration::new(
                line,
                DecorationKind::Articulation(ArticulationKind::Fermata),
            )),
            "technical" => {
                for technical in &child.children {
                    match TechnicalKind::from_musicxml(&technical.name) {
                        Some(kind) => decorations.push(
                            Decoration::new(
                                technical.line,
                                DecorationKind::Technical {
                                    kind,
                                    text: technical.text.clone(),
                                },
                            )
                            .with_placement(placement(technical)),
                        ),
                        None => unknown(context, technical),
                    }
                }
            }
            "ornaments" => {
                for ornament in &child.children {
                    if ornament.name == "wavy-line" {
                        match paired_role(ornament) {
                            Some(role @ (PairRole::Start | PairRole::Stop)) => decorations.push(
                                Decoration::new(
                                    ornament.line,
                                    DecorationKind::Spanner {
                                        kind: SpannerKind::WavyLine,
                                        role,
                                        number: number(ornament),
                                        pair: None,
                                    },
                                )
                                .with_placement(placement(ornament)),
                            ),
                            _ => debug!("wavy-line continuation at line {} ignored", ornament.line),
                        }
                        continue;
                    }
                    match OrnamentKind::from_musicxml(&ornament.name) {
                        Some(kind) => decorations.push(
                            Decoration::new(ornament.line, DecorationKind::Ornament(kind))
                                .with_placement(placement(ornament)),
                        ),
                        None => unknown(context, ornament),
                    }
                }
            }
            "glissando" | "slide" => match paired_role(child) {
                Some(role) => decorations.push(Decoration::new(
                    line,
                    DecorationKind::Glissando {
                        role,
                        number: number(child),
                        text: child.text.clone(),
                    },
                )),
                None => unknown(context, child),
            },
            "dynamics" => decorations.extend(parse_dynamics(child, context)),
            _ => debug!("notation <{}> at line {} not converted", child.name, line),
        }
    }
}

/// Children of a `<dynamics>` element
pub(super) fn parse_dynamics(dynamics: &MusicXmlElement, context: &mut RunContext) -> Vec<Decoration> {
    let mut found = Vec::new();
    for mark in &dynamics.children {
        match DynamicKind::from_musicxml(&mark.name) {
            Some(kind) => found.push(
                Decoration::new(mark.line, DecorationKind::Dynamic(kind))
                    .with_placement(placement(dynamics)),
            ),
            None => unknown(context, mark),
        }
    }
    found
}

fn unknown(context: &mut RunContext, element: &MusicXmlElement) {
    context.warn(
        WarningKind::SkippedElement,
        element.line,
        format!("<{}> {:?} not supported", element.name, element.attribute("type").unwrap_or("")),
    );
}
