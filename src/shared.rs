// Grid dimensions and the handful of closed enums that cross every layer
// (store, scheduler, render engine, persistence).

use serde::{Deserialize, Serialize};

pub const NUM_TRACKS: usize = 4;
pub const NUM_STEPS: usize = 16;
pub const NUM_NOTES: usize = 12;

// One step is a sixteenth note: 60 / bpm gives one beat, four steps per beat.
pub fn step_duration_secs(tempo_bpm: u32) -> f64 {
    60.0 / tempo_bpm as f64 / 4.0
}

// Piano roll rows run top to bottom: B, A#, A, G#, G, F#, F, E, D#, D, C#, C.
pub const NOTE_NAMES: [&str; NUM_NOTES] = [
    "B", "A#", "A", "G#", "G", "F#", "F", "E", "D#", "D", "C#", "C",
];

/// Frequency in Hz for a piano-roll row at the given octave.
///
/// Row 0 is the B at the top of the grid, row 11 the C at the bottom.
/// Octave follows scientific pitch notation, so `note_frequency(11, 2)`
/// is C2 (~65.4 Hz).
pub fn note_frequency(note_row: usize, octave: u32) -> f32 {
    let semitone = (NUM_NOTES - 1 - note_row) as i32; // C = 0 .. B = 11
    let midi = 12 * (octave as i32 + 1) + semitone;
    440.0 * 2.0_f32.powf((midi - 69) as f32 / 12.0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OscillatorType {
    Sine,
    Square,
    #[default]
    Sawtooth,
    Triangle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
}

/// How a piano-roll cell renders: empty, the head of a note, or the tail of
/// a note started earlier in the same row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteStatus {
    None,
    Start,
    Continuation,
}
