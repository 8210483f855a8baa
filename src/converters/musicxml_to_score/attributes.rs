//! `<attributes>` and `<barline>` parsing

use super::notes::MAX_DIVISIONS;
use crate::context::RunContext;
use crate::errors::WarningKind;
use crate::ir::{
    BarLine, BarLineLocation, BarStyle, Clef, ClefSign, Ending, EndingType, Key, KeyMode, Repeat,
    RepeatDirection, Time,
};
use crate::musicxml::MusicXmlElement;

/// Contents of one `<attributes>` element; `None` staff means every staff
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct AttributeValues {
    pub divisions: Option<i64>,
    pub staves: Option<u32>,
    pub keys: Vec<(Option<u32>, Key)>,
    pub times: Vec<(Option<u32>, Time)>,
    pub clefs: Vec<(u32, Clef)>,
    /// `<measure-style><multiple-rest>` count
    pub multiple_rest: Option<u32>,
}

pub(super) fn parse_attributes(element: &MusicXmlElement, context: &mut RunContext) -> AttributeValues {
    let mut values = AttributeValues::default();

    if let Some(divisions) = element.child("divisions") {
        match divisions.text.as_deref().and_then(|t| t.trim().parse::<i64>().ok()) {
            Some(value) if value > 0 && value <= MAX_DIVISIONS => values.divisions = Some(value),
            _ => context.warn(
                WarningKind::UnknownValue,
                divisions.line,
                format!(
                    "divisions {:?} ignored",
                    divisions.text.as_deref().unwrap_or("")
                ),
            ),
        }
    }
    values.staves = element.child_text_as::<u32>("staves").filter(|s| *s > 0);
    values.multiple_rest = element
        .descendant(&["measure-style", "multiple-rest"])
        .and_then(|m| m.text.as_deref()?.trim().parse::<u32>().ok())
        .filter(|count| *count > 0);

    for key in element.children_named("key") {
        match key.child_text_as::<i8>("fifths") {
            Some(fifths) if (-7..=7).contains(&fifths) => {
                let mode = key.child_text("mode").and_then(KeyMode::from_musicxml);
                values.keys.push((
                    key.attribute_as::<u32>("number"),
                    Key {
                        line: key.line,
                        fifths,
                        mode,
                    },
                ));
            }
            _ => context.warn(
                WarningKind::SkippedElement,
                key.line,
                "key without a usable <fifths> ignored",
            ),
        }
    }

    for time in element.children_named("time") {
        let number = time.attribute_as::<u32>("number");
        if time.has_child("senza-misura") {
            values.times.push((
                number,
                Time {
                    line: time.line,
                    beats: 0,
                    beat_type: 0,
                    senza_misura: true,
                },
            ));
            continue;
        }
        // composite meters like 3+2 are summed
        let beats = time.child_text("beats").and_then(|b| {
            b.split('+')
                .map(|part| part.trim().parse::<u32>().ok())
                .sum::<Option<u32>>()
        });
        let beat_type = time.child_text_as::<u32>("beat-type").filter(|b| *b > 0);
        match beats.zip(beat_type) {
            Some((beats, beat_type)) => values.times.push((
                number,
                Time {
                    line: time.line,
                    beats,
                    beat_type,
                    senza_misura: false,
                },
            )),
            None => context.warn(
                WarningKind::SkippedElement,
                time.line,
                "time signature without usable beats ignored",
            ),
        }
    }

    for clef in element.children_named("clef") {
        let sign_text = clef.child_text("sign").unwrap_or("");
        match ClefSign::from_musicxml(sign_text) {
            Some(sign) => values.clefs.push((
                clef.attribute_as::<u32>("number").unwrap_or(1),
                Clef {
                    line: clef.line,
                    sign,
                    staff_line: clef.child_text_as::<u8>("line"),
                    octave_change: clef.child_text_as::<i8>("clef-octave-change").unwrap_or(0),
                },
            )),
            None => context.warn(
                WarningKind::UnknownValue,
                clef.line,
                format!("unknown clef sign {:?}", sign_text),
            ),
        }
    }
    values
}

pub(super) fn parse_barline(element: &MusicXmlElement, context: &mut RunContext) -> BarLine {
    let location = element
        .attribute("location")
        .and_then(BarLineLocation::from_musicxml)
        .unwrap_or(BarLineLocation::Right);
    let style = element.child("bar-style").and_then(|s| {
        let text = s.text.as_deref().unwrap_or("");
        let parsed = BarStyle::from_musicxml(text);
        if parsed.is_none() {
            context.warn(WarningKind::UnknownValue, s.line, format!("unknown bar style {:?}", text));
        }
        parsed
    });
    let repeat = element.child("repeat").and_then(|r| {
        let direction = match r.attribute("direction") {
            Some("forward") => RepeatDirection::Forward,
            Some("backward") => RepeatDirection::Backward,
            _ => return None,
        };
        Some(Repeat {
            direction,
            times: r.attribute_as::<u32>("times"),
        })
    });
    let ending = element.child("ending").and_then(|e| {
        Some(Ending {
            number: e.attribute("number")?.to_string(),
            ending_type: EndingType::from_musicxml(e.attribute("type")?)?,
        })
    });
    BarLine {
        line: element.line,
        location,
        style,
        repeat,
        ending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::musicxml::read_musicxml;

    #[test]
    fn test_attributes_with_composite_meter_and_two_clefs() {
        let root = read_musicxml(
            "attributes",
            r#"<attributes>
                 <divisions>8</divisions>
                 <key><fifths>-3</fifths><mode>minor</mode></key>
                 <time><beats>3+2</beats><beat-type>8</beat-type></time>
                 <staves>2</staves>
                 <clef number="1"><sign>G</sign><line>2</line></clef>
                 <clef number="2"><sign>F</sign><line>4</line></clef>
               </attributes>"#,
        )
        .unwrap()
        .root;
        let mut context = RunContext::new(RunConfig::default());
        let values = parse_attributes(&root, &mut context);
        assert_eq!(values.divisions, Some(8));
        assert_eq!(values.staves, Some(2));
        assert_eq!(values.keys[0].1.fifths, -3);
        assert_eq!(values.keys[0].1.mode, Some(KeyMode::Minor));
        assert_eq!((values.times[0].1.beats, values.times[0].1.beat_type), (5, 8));
        assert_eq!(values.clefs.len(), 2);
        assert_eq!(values.clefs[1].0, 2);
        assert_eq!(values.clefs[1].1.sign, ClefSign::F);
        assert_eq!(values.multiple_rest, None);
    }

    #[test]
    fn test_multiple_rest_measure_style() {
        let root = read_musicxml(
            "attributes",
            "<attributes><measure-style><multiple-rest>4</multiple-rest></measure-style></attributes>",
        )
        .unwrap()
        .root;
        let mut context = RunContext::new(RunConfig::default());
        assert_eq!(parse_attributes(&root, &mut context).multiple_rest, Some(4));
    }

    #[test]
    fn test_backward_repeat_with_ending() {
        let root = read_musicxml(
            "barline",
            r#"<barline location="right">
                 <bar-style>light-heavy</bar-style>
                 <ending number="1" type="stop"/>
                 <repeat direction="backward" times="2"/>
               </barline>"#,
        )
        .unwrap()
        .root;
        let mut context = RunContext::new(RunConfig::default());
        let bar_line = parse_barline(&root, &mut context);
        assert_eq!(bar_line.style, Some(BarStyle::LightHeavy));
        assert_eq!(bar_line.repeat_direction(), Some(RepeatDirection::Backward));
        assert_eq!(bar_line.repeat.unwrap().times, Some(2));
        assert_eq!(bar_line.ending.unwrap().ending_type, EndingType::Stop);
    }
}
