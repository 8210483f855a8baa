//! Per-voice cursor used while scanning one part
//!
//! ## Voice States
//! - Idle: no chord or tuplet open
//! - InChord: the last note placed has chord members following it
//! - InTuplet: at least one tuplet is open
//! - InTupletChord: a chord is open inside an open tuplet
//!
//! The state is derived from the open chord and the tuplet stack, so it can
//! never disagree with them.

use std::collections::HashMap;

use crate::ir::{
    ChordId, GraceNotesGroupId, MeasureId, NoteId, PairKind, TupletId, VoiceId,
};
use crate::models::WholeNotes;

/// FSM state of one voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum VoiceState {
    /// No chord or tuplet open
    Idle,
    /// A chord is open
    InChord,
    /// One or more tuplets are open
    InTuplet,
    /// A chord is open inside a tuplet
    InTupletChord,
}

#[derive(Debug)]
pub(super) struct VoiceCursor {
    pub voice: VoiceId,
    pub staff: u32,
    pub number: u32,

    /// This voice's measure for the part measure being scanned
    pub measure: Option<MeasureId>,
    /// Whether the voice got any measure yet
    pub started: bool,
    /// Time used so far in the current measure
    pub position: WholeNotes,

    /// Last principal note placed in the current measure
    pub last_note: Option<NoteId>,
    /// Last principal note placed in the part
    pub last_principal: Option<NoteId>,
    pub chord: Option<ChordId>,
    /// Innermost tuplet last
    pub tuplets: Vec<TupletId>,

    pub pending_grace: Option<GraceNotesGroupId>,
    pub last_grace: Option<NoteId>,
    pub grace_chord: Option<ChordId>,

    /// Open tie starts, keyed by quarter-tone pitch number
    pub pending_ties: HashMap<i32, NoteId>,
    /// Open slur, wedge, spanner and ligature starts
    pub pending_pairs: HashMap<(PairKind, u32), NoteId>,

    /// Set by a voice-scoped semantic error; the voice is dropped at part end
    pub failed: bool,
}

impl VoiceCursor {
    pub fn new(voice: VoiceId, staff: u32, number: u32) -> Self {
        Self {
            voice,
            staff,
            number,
            measure: None,
            started: false,
            position: WholeNotes::zero(),
            last_note: None,
            last_principal: None,
            chord: None,
            tuplets: Vec::new(),
            pending_grace: None,
            last_grace: None,
            grace_chord: None,
            pending_ties: HashMap::new(),
            pending_pairs: HashMap::new(),
            failed: false,
        }
    }

    pub fn state(&self) -> VoiceState {
        match (self.chord.is_some(), self.tuplets.is_empty()) {
            (false, true) => VoiceState::Idle,
            (true, true) => VoiceState::InChord,
            (false, false) => VoiceState::InTuplet,
            (true, false) => VoiceState::InTupletChord,
        }
    }

    pub fn innermost_tuplet(&self) -> Option<TupletId> {
        self.tuplets.last().copied()
    }

    /// Forget everything that cannot cross a bar line
    pub fn reset_for_next_measure(&mut self) {
        self.measure = None;
        self.position = WholeNotes::zero();
        self.last_note = None;
        self.chord = None;
        self.tuplets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Idx;

    #[test]
    fn test_state_follows_chord_and_tuplets() {
        let mut cursor = VoiceCursor::new(Idx::from_raw(0), 1, 1);
        assert_eq!(cursor.state(), VoiceState::Idle);
        cursor.tuplets.push(Idx::from_raw(0));
        assert_eq!(cursor.state(), VoiceState::InTuplet);
        cursor.chord = Some(Idx::from_raw(0));
        assert_eq!(cursor.state(), VoiceState::InTupletChord);
        cursor.tuplets.clear();
        assert_eq!(cursor.state(), VoiceState::InChord);
        cursor.reset_for_next_measure();
        assert_eq!(cursor.state(), VoiceState::Idle);
    }
}
