// The pattern is the unit of persistence and playback state: two grids plus
// the per-track and synth/effect parameters. Pure data — every mutation here
// is synchronous and does no audio work. The scheduler reads snapshots of
// this struct; the audio thread never sees it directly.

use serde::{Deserialize, Serialize};

use crate::shared::{
    FilterKind, NoteStatus, OscillatorType, NUM_NOTES, NUM_STEPS, NUM_TRACKS,
};

/// One drum row: which sample it plays and how it sits in the mix.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackConfig {
    pub sound_id: String,
    pub volume: f32, // 0..1
    pub pan: f32,    // -1..1
    pub soloed: bool,
}

impl TrackConfig {
    fn with_sound(sound_id: &str) -> Self {
        Self {
            sound_id: sound_id.to_string(),
            volume: 0.8,
            pan: 0.0,
            soloed: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthConfig {
    pub octave: u32, // 1..5
    pub volume: f32,
    pub pan: f32,
    pub oscillator_type: OscillatorType,
    /// Steps a new note occupies when placed from the UI: 2, 4 or 8.
    pub default_note_duration_steps: u32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            octave: 2,
            volume: 0.7,
            pan: 0.0,
            oscillator_type: OscillatorType::Sawtooth,
            default_note_duration_steps: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub cutoff_hz: f32,    // 20..20000
    pub resonance_q: f32,  // 0..20
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kind: FilterKind::Lowpass,
            cutoff_hz: 12_000.0,
            resonance_q: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    pub time_seconds: f32, // 0..1
    pub feedback: f32,     // 0..0.95
    pub mix: f32,          // 0..1
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            time_seconds: 0.25,
            feedback: 0.35,
            mix: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbConfig {
    pub mix: f32, // 0..1
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self { mix: 0.0 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    /// true = a hit programmed at that step.
    pub drum_grid: [[bool; NUM_STEPS]; NUM_TRACKS],

    /// 0 = empty; n > 0 = a note starting here that sustains for n steps.
    pub piano_roll_grid: [[u32; NUM_STEPS]; NUM_NOTES],

    #[serde(default = "default_track_config")]
    pub track_config: [TrackConfig; NUM_TRACKS],

    #[serde(default)]
    pub synth: SynthConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub delay: DelayConfig,

    #[serde(default)]
    pub reverb: ReverbConfig,

    #[serde(default = "default_tempo")]
    pub tempo_bpm: u32, // 40..240
}

fn default_tempo() -> u32 {
    120
}

fn default_track_config() -> [TrackConfig; NUM_TRACKS] {
    [
        TrackConfig::with_sound("kick"),
        TrackConfig::with_sound("snare"),
        TrackConfig::with_sound("hat-closed"),
        TrackConfig::with_sound("clap"),
    ]
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            drum_grid: [[false; NUM_STEPS]; NUM_TRACKS],
            piano_roll_grid: [[0; NUM_STEPS]; NUM_NOTES],
            track_config: default_track_config(),
            synth: SynthConfig::default(),
            filter: FilterConfig::default(),
            delay: DelayConfig::default(),
            reverb: ReverbConfig::default(),
            tempo_bpm: default_tempo(),
        }
    }
}

impl Pattern {
    pub fn toggle_drum_pad(&mut self, track: usize, step: usize) {
        if track < NUM_TRACKS && step < NUM_STEPS {
            self.drum_grid[track][step] = !self.drum_grid[track][step];
        }
    }

    /// Set (duration > 0) or clear (duration == 0) a note start.
    ///
    /// Only the addressed cell changes; overlap with other notes in the row
    /// is allowed and left to the caller to present however it likes.
    pub fn set_piano_roll_note(&mut self, note: usize, step: usize, duration: u32) {
        if note < NUM_NOTES && step < NUM_STEPS {
            self.piano_roll_grid[note][step] = duration.min(NUM_STEPS as u32);
        }
    }

    /// Classify a piano-roll cell for rendering and scheduling.
    ///
    /// A cell is a continuation when some earlier start in the same row,
    /// at most 15 steps back, is still sustaining across it.
    pub fn classify(&self, note: usize, step: usize) -> NoteStatus {
        if note >= NUM_NOTES || step >= NUM_STEPS {
            return NoteStatus::None;
        }
        if self.piano_roll_grid[note][step] > 0 {
            return NoteStatus::Start;
        }
        for back in 1..NUM_STEPS {
            if let Some(earlier) = step.checked_sub(back) {
                if self.piano_roll_grid[note][earlier] as usize > back {
                    return NoteStatus::Continuation;
                }
            }
        }
        NoteStatus::None
    }

    /// Solo rule: if any track is soloed, only soloed tracks sound.
    pub fn track_is_audible(&self, track: usize) -> bool {
        let any_solo = self.track_config.iter().any(|t| t.soloed);
        !any_solo || self.track_config[track].soloed
    }

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo_bpm = bpm.clamp(40, 240);
    }

    pub fn set_track_sound(&mut self, track: usize, sound_id: &str) {
        if track < NUM_TRACKS {
            self.track_config[track].sound_id = sound_id.to_string();
        }
    }

    pub fn set_track_volume(&mut self, track: usize, volume: f32) {
        if track < NUM_TRACKS {
            self.track_config[track].volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn set_track_pan(&mut self, track: usize, pan: f32) {
        if track < NUM_TRACKS {
            self.track_config[track].pan = pan.clamp(-1.0, 1.0);
        }
    }

    pub fn toggle_track_solo(&mut self, track: usize) {
        if track < NUM_TRACKS {
            self.track_config[track].soloed = !self.track_config[track].soloed;
        }
    }

    pub fn set_octave(&mut self, octave: u32) {
        self.synth.octave = octave.clamp(1, 5);
    }

    pub fn set_synth_volume(&mut self, volume: f32) {
        self.synth.volume = volume.clamp(0.0, 1.0);
    }

    pub fn set_synth_pan(&mut self, pan: f32) {
        self.synth.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn set_oscillator_type(&mut self, osc: OscillatorType) {
        self.synth.oscillator_type = osc;
    }

    pub fn set_default_note_duration(&mut self, steps: u32) {
        // snap to the nearest of the three offered lengths
        self.synth.default_note_duration_steps = match steps {
            0..=2 => 2,
            3..=5 => 4,
            _ => 8,
        };
    }

    pub fn set_filter_kind(&mut self, kind: FilterKind) {
        self.filter.kind = kind;
    }

    pub fn set_filter_cutoff(&mut self, hz: f32) {
        self.filter.cutoff_hz = hz.clamp(20.0, 20_000.0);
    }

    pub fn set_filter_resonance(&mut self, q: f32) {
        self.filter.resonance_q = q.clamp(0.0, 20.0);
    }

    pub fn set_delay_time(&mut self, seconds: f32) {
        self.delay.time_seconds = seconds.clamp(0.0, 1.0);
    }

    pub fn set_delay_feedback(&mut self, feedback: f32) {
        self.delay.feedback = feedback.clamp(0.0, 0.95);
    }

    pub fn set_delay_mix(&mut self, mix: f32) {
        self.delay.mix = mix.clamp(0.0, 1.0);
    }

    pub fn set_reverb_mix(&mut self, mix: f32) {
        self.reverb.mix = mix.clamp(0.0, 1.0);
    }

    /// Replace everything with another pattern (preset load, file import).
    pub fn load_preset(&mut self, other: Pattern) {
        *self = other;
        self.clamp_all();
    }

    pub fn load_drum_grid(&mut self, grid: [[bool; NUM_STEPS]; NUM_TRACKS]) {
        self.drum_grid = grid;
    }

    pub fn load_bass_grid(&mut self, grid: [[u32; NUM_STEPS]; NUM_NOTES]) {
        self.piano_roll_grid = grid;
        self.clamp_all();
    }

    /// Zero both grids. Mix and effect parameters stay as they are.
    pub fn clear(&mut self) {
        self.drum_grid = [[false; NUM_STEPS]; NUM_TRACKS];
        self.piano_roll_grid = [[0; NUM_STEPS]; NUM_NOTES];
    }

    /// Pull every numeric field back into its declared range. Out-of-range
    /// values are normalized, never rejected.
    pub fn clamp_all(&mut self) {
        self.tempo_bpm = self.tempo_bpm.clamp(40, 240);
        for row in self.piano_roll_grid.iter_mut() {
            for cell in row.iter_mut() {
                *cell = (*cell).min(NUM_STEPS as u32);
            }
        }
        for t in self.track_config.iter_mut() {
            t.volume = t.volume.clamp(0.0, 1.0);
            t.pan = t.pan.clamp(-1.0, 1.0);
        }
        self.synth.octave = self.synth.octave.clamp(1, 5);
        self.synth.volume = self.synth.volume.clamp(0.0, 1.0);
        self.synth.pan = self.synth.pan.clamp(-1.0, 1.0);
        self.synth.default_note_duration_steps =
            match self.synth.default_note_duration_steps {
                0..=2 => 2,
                3..=5 => 4,
                _ => 8,
            };
        self.filter.cutoff_hz = self.filter.cutoff_hz.clamp(20.0, 20_000.0);
        self.filter.resonance_q = self.filter.resonance_q.clamp(0.0, 20.0);
        self.delay.time_seconds = self.delay.time_seconds.clamp(0.0, 1.0);
        self.delay.feedback = self.delay.feedback.clamp(0.0, 0.95);
        self.delay.mix = self.delay.mix.clamp(0.0, 1.0);
        self.reverb.mix = self.reverb.mix.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_toggle_restores_the_grid() {
        let mut p = Pattern::default();
        let before = p.drum_grid;
        p.toggle_drum_pad(2, 7);
        assert!(p.drum_grid[2][7]);
        p.toggle_drum_pad(2, 7);
        assert_eq!(p.drum_grid, before);
    }

    #[test]
    fn classification_is_exclusive_and_matches_durations() {
        let mut p = Pattern::default();
        p.set_piano_roll_note(5, 2, 4); // covers steps 2,3,4,5
        assert_eq!(p.classify(5, 2), NoteStatus::Start);
        for step in 3..=5 {
            assert_eq!(p.classify(5, step), NoteStatus::Continuation);
        }
        assert_eq!(p.classify(5, 6), NoteStatus::None);
        assert_eq!(p.classify(5, 1), NoteStatus::None);
    }

    #[test]
    fn continuation_lookback_is_bounded_to_fifteen_steps() {
        let mut p = Pattern::default();
        p.set_piano_roll_note(0, 0, 16);
        // every later step in the row is inside the 15-step lookback
        for step in 1..NUM_STEPS {
            assert_eq!(p.classify(0, step), NoteStatus::Continuation);
        }
    }

    #[test]
    fn a_start_is_never_also_a_continuation() {
        let mut p = Pattern::default();
        p.set_piano_roll_note(3, 0, 8);
        p.set_piano_roll_note(3, 4, 2); // overlapping start is allowed
        assert_eq!(p.classify(3, 4), NoteStatus::Start);
    }

    #[test]
    fn clearing_a_start_leaves_other_cells_alone() {
        let mut p = Pattern::default();
        p.set_piano_roll_note(1, 0, 4);
        p.set_piano_roll_note(1, 8, 2);
        p.set_piano_roll_note(1, 0, 0);
        assert_eq!(p.piano_roll_grid[1][0], 0);
        assert_eq!(p.piano_roll_grid[1][8], 2);
    }

    #[test]
    fn tempo_is_clamped_into_range() {
        let mut p = Pattern::default();
        p.set_tempo(999);
        assert_eq!(p.tempo_bpm, 240);
        p.set_tempo(1);
        assert_eq!(p.tempo_bpm, 40);
    }

    #[test]
    fn parameter_setters_clamp() {
        let mut p = Pattern::default();
        p.set_track_volume(0, 3.0);
        assert_eq!(p.track_config[0].volume, 1.0);
        p.set_track_pan(0, -9.0);
        assert_eq!(p.track_config[0].pan, -1.0);
        p.set_filter_cutoff(5.0);
        assert_eq!(p.filter.cutoff_hz, 20.0);
        p.set_delay_feedback(2.0);
        assert_eq!(p.delay.feedback, 0.95);
        p.set_octave(9);
        assert_eq!(p.synth.octave, 5);
    }

    #[test]
    fn clear_zeroes_grids_but_keeps_parameters() {
        let mut p = Pattern::default();
        p.toggle_drum_pad(0, 0);
        p.set_piano_roll_note(2, 2, 4);
        p.set_track_volume(1, 0.5);
        p.set_reverb_mix(0.4);
        p.clear();
        assert!(!p.drum_grid[0][0]);
        assert_eq!(p.piano_roll_grid[2][2], 0);
        assert_eq!(p.track_config[1].volume, 0.5);
        assert_eq!(p.reverb.mix, 0.4);
    }

    #[test]
    fn solo_rule_gates_audibility() {
        let mut p = Pattern::default();
        assert!(p.track_is_audible(0));
        assert!(p.track_is_audible(3));
        p.toggle_track_solo(1);
        assert!(!p.track_is_audible(0));
        assert!(p.track_is_audible(1));
        p.toggle_track_solo(1);
        assert!(p.track_is_audible(0));
    }
}
