//! BSR → Unicode braille text
//!
//! Headings stay in print; music lines hold braille pattern characters,
//! measures separated by a blank cell and lines broken between measures.

use crate::converters::score_to_bsr::cells::{BrailleCell, MEASURE_SPACE};
use crate::converters::score_to_bsr::{BsrMeasure, BsrScore, BsrVoice};

/// Cells per braille line
pub const LINE_WIDTH: usize = 40;

pub fn render_braille(score: &BsrScore) -> String {
    let mut out = String::new();
    for heading in [&score.title, &score.composer].into_iter().flatten() {
        out.push_str(heading);
        out.push('\n');
    }
    for part in &score.parts {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&part.name);
        out.push('\n');
        for voice in &part.voices {
            out.push_str(&voice.label);
            out.push('\n');
            for line in voice_lines(voice) {
                out.extend(line.into_iter().map(BrailleCell::to_char));
                out.push('\n');
            }
        }
    }
    out
}

/// Measures packed into lines of at most [`LINE_WIDTH`] cells.
///
/// A measure wider than a line gets a line of its own.
pub fn voice_lines(voice: &BsrVoice) -> Vec<Vec<BrailleCell>> {
    let mut lines = Vec::new();
    let mut line: Vec<BrailleCell> = Vec::new();
    for measure in &voice.measures {
        let cells = measure_cells(measure);
        if cells.is_empty() {
            continue;
        }
        if !line.is_empty() && line.len() + 1 + cells.len() > LINE_WIDTH {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(MEASURE_SPACE);
        }
        line.extend(cells);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn measure_cells(measure: &BsrMeasure) -> Vec<BrailleCell> {
    measure.cells().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::score_to_bsr::{BsrElement, BsrElementKind, BsrPart};
    use crate::models::WholeNotes;

    fn measure(number: &str, width: usize) -> BsrMeasure {
        BsrMeasure {
            number: number.to_string(),
            duration: WholeNotes::new(1, 1),
            elements: vec![BsrElement::new(
                BsrElementKind::Note,
                vec![BrailleCell::dots(145); width],
            )],
        }
    }

    fn voice(measures: Vec<BsrMeasure>) -> BsrVoice {
        BsrVoice {
            label: "Flute, staff 1, voice 1".to_string(),
            measures,
        }
    }

    #[test]
    fn test_lines_break_between_measures() {
        let lines = voice_lines(&voice(vec![measure("1", 20), measure("2", 19), measure("3", 5)]));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 40);
        assert!(lines[0][20].is_space());
        assert_eq!(lines[1].len(), 5);
    }

    #[test]
    fn test_wide_measure_keeps_its_cells_together() {
        let lines = voice_lines(&voice(vec![measure("1", 3), measure("2", 50)]));
        assert_eq!(lines.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 50]);
    }

    #[test]
    fn test_headings_then_braille_lines() {
        let score = BsrScore {
            title: Some("Etude".to_string()),
            composer: None,
            parts: vec![BsrPart {
                name: "Flute".to_string(),
                voices: vec![voice(vec![measure("1", 2), measure("2", 1)])],
            }],
        };
        let text = render_braille(&score);
        assert_eq!(text, "Etude\n\nFlute\nFlute, staff 1, voice 1\n⠙⠙⠀⠙\n");
    }
}
