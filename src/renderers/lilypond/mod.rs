//! LPSR → LilyPond source
//!
//! Pitches are written absolute (`c'` is middle C) in the configured note
//! name language. Each measure goes on its own line, ended by a bar check.

pub mod templates;

use log::debug;

use self::templates::{render_lilypond, LilyPondTemplate, TemplateContext};
use super::RenderError;
use crate::config::{LilypondSettings, PitchLanguage};
use crate::converters::score_to_lpsr::{
    LpsrChord, LpsrDuration, LpsrEvent, LpsrGroupItem, LpsrMeasure, LpsrMusic, LpsrNote,
    LpsrNoteKind, LpsrPart, LpsrPartGroup, LpsrScore, LpsrStaff, LpsrTempo, LpsrVoice,
};
use crate::ir::{
    ArticulationKind, DynamicKind, GroupSymbol, KeyMode, OrnamentKind, PedalKind, Placement,
    StemDirection, TechnicalKind, WedgeKind,
};
use crate::models::{Alteration, NoteType, Pitch};

/// Render a complete LilyPond document
pub fn render_lilypond_score(score: &LpsrScore, settings: &LilypondSettings) -> Result<String, RenderError> {
    let renderer = LilypondRenderer { settings };
    let staves = score
        .items
        .iter()
        .map(|item| renderer.group_item(item, 4))
        .collect::<Vec<_>>()
        .join("\n");

    let header = &score.header;
    let title = settings.title.clone().or_else(|| header.title.clone());
    let composer = settings.composer.clone().or_else(|| header.composer.clone());
    let context = TemplateContext::builder(
        settings.target_lilypond_version.clone(),
        settings.language.lilypond_name().to_string(),
        staves,
    )
    .title(title.as_deref().map(escape_lilypond_string))
    .subtitle(header.subtitle.as_deref().map(escape_lilypond_string))
    .composer(composer.as_deref().map(escape_lilypond_string))
    .arranger(header.arranger.as_deref().map(escape_lilypond_string))
    .copyright(header.copyright.as_deref().map(escape_lilypond_string))
    .build();

    let template = if context.has_header() {
        LilyPondTemplate::Standard
    } else {
        LilyPondTemplate::Minimal
    };
    debug!("rendering LilyPond with the {:?} template", template);
    render_lilypond(template, &context)
}

/// Escape special characters for LilyPond strings
pub fn escape_lilypond_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ============================================================================
// PITCHES AND DURATIONS
// ============================================================================

/// Note name without octave marks
pub fn note_name(pitch: Pitch, language: PitchLanguage) -> String {
    let index = pitch.step.index() as usize;
    let (base, suffix) = match language {
        PitchLanguage::Nederlands | PitchLanguage::Deutsch => {
            let mut base = ["c", "d", "e", "f", "g", "a", "b"][index];
            if language == PitchLanguage::Deutsch && index == 6 {
                base = "h";
            }
            let suffix = match pitch.alteration {
                Alteration::DoubleFlat => "eses",
                Alteration::ThreeQuartersFlat => "eseh",
                Alteration::Flat => "es",
                Alteration::QuarterFlat => "eh",
                Alteration::Natural => "",
                Alteration::QuarterSharp => "ih",
                Alteration::Sharp => "is",
                Alteration::ThreeQuartersSharp => "isih",
                Alteration::DoubleSharp => "isis",
            };
            (base, suffix)
        }
        PitchLanguage::English => {
            let suffix = match pitch.alteration {
                Alteration::DoubleFlat => "ff",
                Alteration::ThreeQuartersFlat => "tqf",
                Alteration::Flat => "f",
                Alteration::QuarterFlat => "qf",
                Alteration::Natural => "",
                Alteration::QuarterSharp => "qs",
                Alteration::Sharp => "s",
                Alteration::ThreeQuartersSharp => "tqs",
                Alteration::DoubleSharp => "ss",
            };
            (["c", "d", "e", "f", "g", "a", "b"][index], suffix)
        }
        PitchLanguage::Italiano => {
            let suffix = match pitch.alteration {
                Alteration::DoubleFlat => "bb",
                Alteration::ThreeQuartersFlat => "bsb",
                Alteration::Flat => "b",
                Alteration::QuarterFlat => "sb",
                Alteration::Natural => "",
                Alteration::QuarterSharp => "sd",
                Alteration::Sharp => "d",
                Alteration::ThreeQuartersSharp => "dsd",
                Alteration::DoubleSharp => "dd",
            };
            (["do", "re", "mi", "fa", "sol", "la", "si"][index], suffix)
        }
    };
    if matches!(language, PitchLanguage::Nederlands | PitchLanguage::Deutsch) {
        match (base, pitch.alteration) {
            ("e" | "a", Alteration::Flat | Alteration::DoubleFlat) => {
                return format!("{}{}", base, &suffix[1..]);
            }
            ("h", Alteration::Flat) => return "b".to_string(),
            _ => {}
        }
    }
    format!("{}{}", base, suffix)
}

/// Absolute octave marks: c' is octave 4, c is octave 3
pub fn octave_marks(octave: i8) -> String {
    if octave >= 4 {
        "'".repeat((octave - 3) as usize)
    } else {
        ",".repeat((3 - octave) as usize)
    }
}

pub fn pitch_to_lilypond(pitch: Pitch, language: PitchLanguage) -> String {
    format!("{}{}", note_name(pitch, language), octave_marks(pitch.octave))
}

/// e.g. "4", "8.", "\breve", "1*5/8"
pub fn duration_to_lilypond(duration: &LpsrDuration) -> String {
    let base = match duration.note_type {
        NoteType::Maxima => "\\maxima".to_string(),
        NoteType::Long => "\\longa".to_string(),
        NoteType::Breve => "\\breve".to_string(),
        other => (1u32 << other.log()).to_string(),
    };
    let dots = ".".repeat(duration.dots as usize);
    match duration.multiplier {
        Some((numerator, denominator)) => format!("{}{}*{}/{}", base, dots, numerator, denominator),
        None => format!("{}{}", base, dots),
    }
}

fn key_mode(mode: KeyMode) -> &'static str {
    match mode {
        KeyMode::Major | KeyMode::Ionian | KeyMode::None => "\\major",
        KeyMode::Minor | KeyMode::Aeolian => "\\minor",
        KeyMode::Dorian => "\\dorian",
        KeyMode::Phrygian => "\\phrygian",
        KeyMode::Lydian => "\\lydian",
        KeyMode::Mixolydian => "\\mixolydian",
        KeyMode::Locrian => "\\locrian",
    }
}

// ============================================================================
// EVENTS
// ============================================================================

fn stem(direction: StemDirection) -> &'static str {
    match direction {
        StemDirection::Up => "\\stemUp ",
        StemDirection::Down => "\\stemDown ",
        StemDirection::Double | StemDirection::None => "\\stemNeutral ",
    }
}

fn articulation(kind: ArticulationKind) -> &'static str {
    match kind {
        ArticulationKind::Accent => "->",
        ArticulationKind::StrongAccent => "-^",
        ArticulationKind::Staccato => "-.",
        ArticulationKind::Staccatissimo => "-!",
        ArticulationKind::Tenuto => "--",
        ArticulationKind::DetachedLegato => "-_",
        ArticulationKind::Spiccato => "\\staccatissimo",
        ArticulationKind::BreathMark => " \\breathe",
        ArticulationKind::Caesura => " \\caesura",
        ArticulationKind::Fermata => "\\fermata",
    }
}

fn ornament(kind: OrnamentKind) -> &'static str {
    match kind {
        OrnamentKind::TrillMark => "\\trill",
        OrnamentKind::Turn | OrnamentKind::DelayedTurn => "\\turn",
        OrnamentKind::InvertedTurn => "\\reverseturn",
        OrnamentKind::Mordent => "\\mordent",
        OrnamentKind::InvertedMordent | OrnamentKind::Shake => "\\prall",
        OrnamentKind::Schleifer => "\\slashturn",
        OrnamentKind::Tremolo => ":32",
    }
}

fn technical(kind: TechnicalKind, text: Option<&str>) -> String {
    match (kind, text) {
        (TechnicalKind::UpBow, _) => "\\upbow".to_string(),
        (TechnicalKind::DownBow, _) => "\\downbow".to_string(),
        (TechnicalKind::Harmonic, _) => "\\flageolet".to_string(),
        (TechnicalKind::OpenString, _) => "\\open".to_string(),
        (TechnicalKind::ThumbPosition, _) => "\\thumb".to_string(),
        (TechnicalKind::Stopped, _) => "\\stopped".to_string(),
        (TechnicalKind::SnapPizzicato, _) => "\\snappizzicato".to_string(),
        (TechnicalKind::Fingering, Some(text)) if text.chars().all(|c| c.is_ascii_digit()) => format!("-{}", text),
        (TechnicalKind::String, Some(text)) if text.chars().all(|c| c.is_ascii_digit()) => format!("\\{}", text),
        (_, Some(text)) => format!("^\"{}\"", escape_lilypond_string(text)),
        (_, None) => String::new(),
    }
}

/// Dynamics LilyPond predefines; others become markups
const PREDEFINED_DYNAMICS: &[&str] = &[
    "ppppp", "pppp", "ppp", "pp", "p", "mp", "mf", "f", "ff", "fff", "ffff", "fffff", "fp", "sf",
    "sfp", "sfpp", "sfz", "rfz",
];

fn dynamic(kind: DynamicKind) -> String {
    let name = kind.musicxml_name();
    if PREDEFINED_DYNAMICS.contains(&name) {
        format!("\\{}", name)
    } else {
        format!("_\\markup {{ \\dynamic {} }}", name)
    }
}

fn placed_text(text: &str, placement: Option<Placement>) -> String {
    let direction = match placement {
        Some(Placement::Above) => '^',
        Some(Placement::Below) => '_',
        None => '-',
    };
    format!("{}\"{}\"", direction, escape_lilypond_string(text))
}

fn event(event: &LpsrEvent) -> String {
    match event {
        LpsrEvent::Stem(direction) => stem(*direction).to_string(),
        LpsrEvent::LigatureStart => "\\[ ".to_string(),
        LpsrEvent::LigatureStop => "\\]".to_string(),
        LpsrEvent::Tie => " ~".to_string(),
        LpsrEvent::SlurStart(1) => "(".to_string(),
        LpsrEvent::SlurStart(number) => format!("\\={}(", number),
        LpsrEvent::SlurStop(1) => ")".to_string(),
        LpsrEvent::SlurStop(number) => format!("\\={})", number),
        LpsrEvent::BeamStart => "[".to_string(),
        LpsrEvent::BeamStop => "]".to_string(),
        LpsrEvent::Articulation(kind) => articulation(*kind).to_string(),
        LpsrEvent::Ornament(kind) => ornament(*kind).to_string(),
        LpsrEvent::Technical { kind, text } => technical(*kind, text.as_deref()),
        LpsrEvent::Glissando => "\\glissando".to_string(),
        LpsrEvent::Dynamic(kind) => dynamic(*kind),
        LpsrEvent::Words { text, placement } => placed_text(text, *placement),
        LpsrEvent::WedgeStart(WedgeKind::Crescendo) => "\\<".to_string(),
        LpsrEvent::WedgeStart(WedgeKind::Diminuendo) => "\\>".to_string(),
        LpsrEvent::WedgeStop => "\\!".to_string(),
        LpsrEvent::Pedal(PedalKind::Start) => "\\sustainOn".to_string(),
        LpsrEvent::Pedal(PedalKind::Stop) => "\\sustainOff".to_string(),
        LpsrEvent::Pedal(PedalKind::Change) => "\\sustainOff\\sustainOn".to_string(),
        LpsrEvent::Pedal(PedalKind::Continue) => String::new(),
        LpsrEvent::TextSpanStart => "\\startTextSpan".to_string(),
        LpsrEvent::TextSpanStop => "\\stopTextSpan".to_string(),
        LpsrEvent::TrillSpanStart => "\\startTrillSpan".to_string(),
        LpsrEvent::TrillSpanStop => "\\stopTrillSpan".to_string(),
    }
}

// ============================================================================
// MUSIC
// ============================================================================

struct LilypondRenderer<'s> {
    settings: &'s LilypondSettings,
}

impl LilypondRenderer<'_> {
    fn language(&self) -> PitchLanguage {
        self.settings.language
    }

    fn kept<'e>(&self, events: &'e [LpsrEvent]) -> impl Iterator<Item = &'e LpsrEvent> + 'e {
        let directions = self.settings.convert_directions;
        events.iter().filter(move |e| directions || !e.is_direction())
    }

    /// Prefix events, the body, then postfix events
    fn with_events(&self, body: String, events: &[LpsrEvent]) -> String {
        let mut out = String::new();
        for e in self.kept(events).filter(|e| e.is_prefix()) {
            out.push_str(&event(e));
        }
        out.push_str(&body);
        for e in self.kept(events).filter(|e| !e.is_prefix()) {
            out.push_str(&event(e));
        }
        out
    }

    fn note(&self, note: &LpsrNote) -> String {
        let duration = duration_to_lilypond(&note.duration);
        let body = match note.kind {
            LpsrNoteKind::Pitched(pitch) => format!(
                "{}{}{}",
                pitch_to_lilypond(pitch, self.language()),
                if note.forced_accidental { "!" } else { "" },
                duration
            ),
            LpsrNoteKind::Rest { position: Some(pitch) } => {
                format!("{}{}\\rest", pitch_to_lilypond(pitch, self.language()), duration)
            }
            LpsrNoteKind::Rest { position: None } => format!("r{}", duration),
            LpsrNoteKind::MeasureRest => format!("R{}", duration),
            LpsrNoteKind::Skip => format!("s{}", duration),
            LpsrNoteKind::Unpitched { position } => {
                let pitch = position.map(|p| pitch_to_lilypond(p, self.language()));
                format!("{}{}", pitch.as_deref().unwrap_or("c'"), duration)
            }
        };
        self.with_events(body, &note.events)
    }

    fn chord(&self, chord: &LpsrChord) -> String {
        let members = chord
            .members
            .iter()
            .map(|m| {
                format!(
                    "{}{}{}",
                    pitch_to_lilypond(m.pitch, self.language()),
                    if m.forced_accidental { "!" } else { "" },
                    if m.tie { "~" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let body = format!("<{}>{}", members, duration_to_lilypond(&chord.duration));
        self.with_events(body, &chord.events)
    }

    fn tempo(&self, tempo: &LpsrTempo) -> String {
        let mut parts = Vec::new();
        if let Some(words) = &tempo.words {
            parts.push(format!("\"{}\"", escape_lilypond_string(words)));
        }
        if let Some(per_minute) = tempo.per_minute {
            let unit = tempo
                .unit
                .as_ref()
                .map(duration_to_lilypond)
                .unwrap_or_else(|| "4".to_string());
            parts.push(format!("{} = {}", unit, per_minute));
        }
        if parts.is_empty() {
            return String::new();
        }
        format!("\\tempo {}", parts.join(" "))
    }

    fn sequence(&self, music: &[LpsrMusic]) -> String {
        music
            .iter()
            .map(|m| self.music(m))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn music(&self, music: &LpsrMusic) -> String {
        match music {
            LpsrMusic::Note(note) => self.note(note),
            LpsrMusic::Chord(chord) => self.chord(chord),
            LpsrMusic::Tuplet { actual, normal, music } => {
                format!("\\tuplet {}/{} {{ {} }}", actual, normal, self.sequence(music))
            }
            LpsrMusic::Grace { slashed, music } => {
                let command = if *slashed { "\\acciaccatura" } else { "\\grace" };
                format!("{} {{ {} }}", command, self.sequence(music))
            }
            LpsrMusic::AfterGrace { main, grace } => {
                format!("\\afterGrace {} {{ {} }}", self.music(main), self.sequence(grace))
            }
            LpsrMusic::Clef(name) => format!("\\clef \"{}\"", name),
            LpsrMusic::Key { tonic, mode } => format!(
                "\\key {} {}",
                note_name(*tonic, self.language()),
                key_mode(*mode)
            ),
            LpsrMusic::Time { beats, beat_type } => format!("\\time {}/{}", beats, beat_type),
            LpsrMusic::Cadenza => "\\cadenzaOn".to_string(),
            LpsrMusic::BarLine(glyph) => format!("\\bar \"{}\"", glyph),
            LpsrMusic::Tempo(tempo) => self.tempo(tempo),
            LpsrMusic::MultipleRest { measure_length, count } => {
                let duration = LpsrDuration::of_length(*measure_length);
                format!("R{}*{}", duration_to_lilypond(&duration), count)
            }
        }
    }

    fn measure(&self, measure: &LpsrMeasure, first: bool) -> String {
        let mut line = String::new();
        if first && measure.implicit && !measure.duration.is_zero() {
            let partial = LpsrDuration::of_length(measure.duration);
            line.push_str(&format!("\\partial {} ", duration_to_lilypond(&partial)));
        }
        line.push_str(&self.sequence(&measure.music));
        line.push_str(" |");
        line
    }

    fn voice(&self, voice: &LpsrVoice, position: usize, voices: usize, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = format!("{}\\new Voice = \"{}\" {{\n", pad, voice.name);
        if voices > 1 && position < 4 {
            let names = ["\\voiceOne", "\\voiceTwo", "\\voiceThree", "\\voiceFour"];
            out.push_str(&format!("{}  {}\n", pad, names[position]));
        }
        out.push_str(&format!("{}  \\compressMMRests {{\n", pad));
        for (i, measure) in voice.measures.iter().enumerate() {
            out.push_str(&format!(
                "{}    {}  % {}\n",
                pad,
                self.measure(measure, i == 0),
                measure.number
            ));
        }
        out.push_str(&format!("{}  }}\n{}}}", pad, pad));
        out
    }

    fn staff(&self, staff: &LpsrStaff, part: &LpsrPart, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut with = Vec::new();
        if part.staves.len() == 1 {
            with.push(format!("instrumentName = \"{}\"", escape_lilypond_string(&part.name)));
            if let Some(abbreviation) = &part.abbreviation {
                with.push(format!("shortInstrumentName = \"{}\"", escape_lilypond_string(abbreviation)));
            }
        }
        let with = if with.is_empty() {
            String::new()
        } else {
            format!("\\with {{ {} }} ", with.join(" "))
        };
        let voices = staff
            .voices
            .iter()
            .enumerate()
            .map(|(i, v)| self.voice(v, i, staff.voices.len(), indent + 2))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}\\new Staff = \"{}-staff{}\" {}<<\n{}\n{}>>",
            pad, part.id, staff.number, with, voices, pad
        )
    }

    fn part(&self, part: &LpsrPart, indent: usize) -> String {
        if part.staves.len() == 1 {
            return self.staff(&part.staves[0], part, indent);
        }
        let pad = " ".repeat(indent);
        let staves = part
            .staves
            .iter()
            .map(|s| self.staff(s, part, indent + 2))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}\\new PianoStaff \\with {{ instrumentName = \"{}\" }} <<\n{}\n{}>>",
            pad,
            escape_lilypond_string(&part.name),
            staves,
            pad
        )
    }

    fn group(&self, group: &LpsrPartGroup, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let context = match group.symbol {
            GroupSymbol::Brace => "\\new GrandStaff ",
            GroupSymbol::Bracket | GroupSymbol::Square | GroupSymbol::Line => "\\new StaffGroup ",
            GroupSymbol::None => "",
        };
        let with = group
            .name
            .as_ref()
            .filter(|_| !context.is_empty())
            .map(|name| format!("\\with {{ instrumentName = \"{}\" }} ", escape_lilypond_string(name)))
            .unwrap_or_default();
        let items = group
            .items
            .iter()
            .map(|item| self.group_item(item, indent + 2))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}{}{}<<\n{}\n{}>>", pad, context, with, items, pad)
    }

    fn group_item(&self, item: &LpsrGroupItem, indent: usize) -> String {
        match item {
            LpsrGroupItem::Group(group) => self.group(group, indent),
            LpsrGroupItem::Part(part) => self.part(part, indent),
        }
    }
}

#[cfg(test)]
mod tests;
