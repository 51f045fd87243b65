// Lookahead scheduling. A UI-rate timer is far too sloppy to fire audio
// events directly, so the transport runs a cheap periodic poll and, on each
// tick, converts every step whose trigger time falls inside a short window
// ahead of the audio clock into absolute-time engine commands. Steps are
// read from a pattern snapshot taken at schedule time: edits apply from the
// next unscheduled step onward and never rewrite an event already queued.
//
// Step highlighting for the UI rides a separate, coarser path: each
// scheduled step leaves a time mark, and the poll publishes the mark whose
// playback time has actually arrived.

use std::collections::VecDeque;

use crate::audio_api::{AudioCommand, DrumTrigger, NoteOn};
use crate::loader::SoundBank;
use crate::pipeline::pattern::Pattern;
use crate::shared::{note_frequency, step_duration_secs, NUM_NOTES, NUM_STEPS, NUM_TRACKS};

pub const DEFAULT_LOOKAHEAD_SECS: f64 = 0.100;
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 0.025;

// first step lands slightly ahead of "now" so it is never already late
const START_DELAY_SECS: f64 = 0.05;

// a poll gap this many intervals long counts as drift (timer coalescing,
// suspended process) and re-anchors the window to the current clock
const DRIFT_GAP_FACTOR: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransportEvent {
    StepChanged(Option<usize>),
    PlayStateChanged(bool),
}

pub struct TransportScheduler {
    playing: bool,
    next_step: usize,
    next_step_time: f64,
    step_marks: VecDeque<(f64, usize)>,
    published_step: Option<usize>,
    last_poll: Option<f64>,
    lookahead: f64,
    poll_interval: f64,
}

impl TransportScheduler {
    pub fn new() -> Self {
        Self::with_timing(DEFAULT_LOOKAHEAD_SECS, DEFAULT_POLL_INTERVAL_SECS)
    }

    pub fn with_timing(lookahead_secs: f64, poll_interval_secs: f64) -> Self {
        Self {
            playing: false,
            next_step: 0,
            next_step_time: 0.0,
            step_marks: VecDeque::new(),
            published_step: None,
            last_poll: None,
            lookahead: lookahead_secs,
            poll_interval: poll_interval_secs,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn published_step(&self) -> Option<usize> {
        self.published_step
    }

    pub fn poll_interval_secs(&self) -> f64 {
        self.poll_interval
    }

    /// Start playback from step 0. Already playing: no-op.
    pub fn play(&mut self, now: f64, events: &mut Vec<TransportEvent>) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.next_step = 0;
        self.next_step_time = now + START_DELAY_SECS;
        events.push(TransportEvent::PlayStateChanged(true));
    }

    /// Stop playback, cancelling everything scheduled but not yet heard.
    pub fn stop(&mut self, commands: &mut Vec<AudioCommand>, events: &mut Vec<TransportEvent>) {
        if !self.playing {
            return;
        }
        self.playing = false;
        self.step_marks.clear();
        commands.push(AudioCommand::CancelScheduled);
        if self.published_step.take().is_some() {
            events.push(TransportEvent::StepChanged(None));
        }
        events.push(TransportEvent::PlayStateChanged(false));
    }

    /// One poll: schedule every step inside the lookahead window and publish
    /// any step highlight whose playback time has arrived.
    pub fn tick(
        &mut self,
        now: f64,
        pattern: &Pattern,
        bank: &SoundBank,
        commands: &mut Vec<AudioCommand>,
        events: &mut Vec<TransportEvent>,
    ) {
        self.detect_drift(now);

        while self.playing && self.next_step_time < now + self.lookahead {
            let step = self.next_step;
            let at = self.next_step_time;
            // tempo is re-read per step, so a change mid-flight reshapes
            // only the steps that are not scheduled yet
            let step_secs = step_duration_secs(pattern.tempo_bpm);

            self.schedule_step(pattern, bank, step, at, step_secs, commands);
            self.step_marks.push_back((at, step));

            self.next_step = (step + 1) % NUM_STEPS;
            self.next_step_time = at + step_secs;
        }

        self.publish_due_marks(now, events);
    }

    fn detect_drift(&mut self, now: f64) {
        let gap_limit = self.poll_interval * DRIFT_GAP_FACTOR;
        if let Some(last) = self.last_poll {
            if self.playing && now - last > gap_limit && self.next_step_time < now {
                log::warn!(
                    "scheduler drift: poll gap of {:.0} ms, re-anchoring to the audio clock",
                    (now - last) * 1000.0
                );
                self.next_step_time = now;
                self.step_marks.clear();
            }
        }
        self.last_poll = Some(now);
    }

    fn schedule_step(
        &self,
        pattern: &Pattern,
        bank: &SoundBank,
        step: usize,
        at: f64,
        step_secs: f64,
        commands: &mut Vec<AudioCommand>,
    ) {
        // drums first, in track order
        for track in 0..NUM_TRACKS {
            if !pattern.drum_grid[track][step] || !pattern.track_is_audible(track) {
                continue;
            }
            let config = &pattern.track_config[track];
            let Some(sample) = bank.resolve(&config.sound_id) else {
                log::debug!("skipping trigger: unknown sound id {:?}", config.sound_id);
                continue;
            };
            commands.push(AudioCommand::TriggerDrum(DrumTrigger {
                sample,
                at,
                gain: config.volume,
                pan: config.pan,
            }));
        }

        // then piano-roll rows, top to bottom
        for note in 0..NUM_NOTES {
            let duration = pattern.piano_roll_grid[note][step];
            if duration == 0 {
                continue;
            }
            let synth = &pattern.synth;
            commands.push(AudioCommand::NoteOn(NoteOn {
                note,
                freq: note_frequency(note, synth.octave),
                wave: synth.oscillator_type,
                at,
                gain: synth.volume,
                pan: synth.pan,
            }));
            commands.push(AudioCommand::NoteOff {
                note,
                at: at + duration as f64 * step_secs,
            });
        }
    }

    fn publish_due_marks(&mut self, now: f64, events: &mut Vec<TransportEvent>) {
        let mut due = None;
        while let Some(&(time, step)) = self.step_marks.front() {
            if time > now {
                break;
            }
            self.step_marks.pop_front();
            due = Some(step);
        }
        if let Some(step) = due {
            if self.playing && self.published_step != Some(step) {
                self.published_step = Some(step);
                events.push(TransportEvent::StepChanged(Some(step)));
            }
        }
    }
}

impl Default for TransportScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> SoundBank {
        SoundBank::with_builtin(44_100)
    }

    /// Run the scheduler over simulated polls up to `until`, collecting
    /// every command it emits.
    fn run_until(
        scheduler: &mut TransportScheduler,
        pattern: &Pattern,
        bank: &SoundBank,
        until: f64,
    ) -> (Vec<AudioCommand>, Vec<TransportEvent>) {
        let mut commands = Vec::new();
        let mut events = Vec::new();
        let mut now = 0.0;
        while now <= until {
            scheduler.tick(now, pattern, bank, &mut commands, &mut events);
            now += DEFAULT_POLL_INTERVAL_SECS;
        }
        (commands, events)
    }

    fn drum_times(commands: &[AudioCommand]) -> Vec<f64> {
        commands
            .iter()
            .filter_map(|c| match c {
                AudioCommand::TriggerDrum(t) => Some(t.at),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn kick_on_step_zero_repeats_every_two_seconds_at_120_bpm() {
        let mut pattern = Pattern::default();
        pattern.toggle_drum_pad(0, 0);
        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut events = Vec::new();
        scheduler.play(0.0, &mut events);

        let (commands, _) = run_until(&mut scheduler, &pattern, &bank, 4.5);
        let times = drum_times(&commands);

        assert!(times.len() >= 3, "expected three loops, got {times:?}");
        for pair in times.windows(2) {
            assert!((pair[1] - pair[0] - 2.0).abs() < 1e-9, "loop period off: {pair:?}");
        }
    }

    #[test]
    fn adjacent_steps_are_an_eighth_of_a_second_apart_at_120_bpm() {
        let mut pattern = Pattern::default();
        pattern.toggle_drum_pad(0, 0);
        pattern.toggle_drum_pad(0, 1);
        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut events = Vec::new();
        scheduler.play(0.0, &mut events);

        let (commands, _) = run_until(&mut scheduler, &pattern, &bank, 0.5);
        let times = drum_times(&commands);
        assert!((times[1] - times[0] - 0.125).abs() < 1e-9);
    }

    #[test]
    fn solo_silences_every_other_track() {
        let mut pattern = Pattern::default();
        pattern.toggle_drum_pad(0, 0);
        pattern.toggle_drum_pad(1, 0);
        pattern.toggle_track_solo(1);

        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut events = Vec::new();
        scheduler.play(0.0, &mut events);
        let (commands, _) = run_until(&mut scheduler, &pattern, &bank, 0.3);

        let samples: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                AudioCommand::TriggerDrum(t) => Some(t.sample),
                _ => None,
            })
            .collect();
        assert!(!samples.is_empty());
        // track 1 is the snare in the default kit; only it may fire
        let snare = bank.resolve("snare").unwrap();
        assert!(samples.iter().all(|&s| s == snare));
    }

    #[test]
    fn note_gets_an_on_and_an_off_spanning_its_duration() {
        let mut pattern = Pattern::default();
        pattern.set_piano_roll_note(5, 2, 4);
        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut events = Vec::new();
        scheduler.play(0.0, &mut events);

        let (commands, _) = run_until(&mut scheduler, &pattern, &bank, 1.0);

        let on = commands
            .iter()
            .find_map(|c| match c {
                AudioCommand::NoteOn(n) if n.note == 5 => Some(n.at),
                _ => None,
            })
            .expect("note-on missing");
        let off = commands
            .iter()
            .find_map(|c| match c {
                AudioCommand::NoteOff { note: 5, at } => Some(*at),
                _ => None,
            })
            .expect("note-off missing");

        // on at step 2, off four steps later
        assert!((on - (0.05 + 2.0 * 0.125)).abs() < 1e-9);
        assert!((off - on - 0.5).abs() < 1e-9);
    }

    #[test]
    fn tempo_changes_shape_only_unscheduled_steps() {
        let mut pattern = Pattern::default();
        for step in 0..NUM_STEPS {
            pattern.toggle_drum_pad(0, step);
        }
        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();
        scheduler.play(0.0, &mut events);

        scheduler.tick(0.0, &pattern, &bank, &mut commands, &mut events);
        let scheduled_before = drum_times(&commands);
        assert!(!scheduled_before.is_empty());

        pattern.set_tempo(60); // step becomes 0.25 s
        let mut later = Vec::new();
        let mut now = DEFAULT_POLL_INTERVAL_SECS;
        while now < 1.5 {
            scheduler.tick(now, &pattern, &bank, &mut later, &mut events);
            now += DEFAULT_POLL_INTERVAL_SECS;
        }
        let after = drum_times(&later);
        for pair in after.windows(2) {
            assert!((pair[1] - pair[0] - 0.25).abs() < 1e-9);
        }
        // the already-queued steps kept their original 0.125 spacing
        for pair in scheduled_before.windows(2) {
            assert!((pair[1] - pair[0] - 0.125).abs() < 1e-9);
        }
    }

    #[test]
    fn play_while_playing_is_a_no_op() {
        let mut pattern = Pattern::default();
        pattern.toggle_drum_pad(0, 0);
        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        scheduler.play(0.0, &mut events);
        scheduler.tick(0.0, &pattern, &bank, &mut commands, &mut events);
        let before = commands.len();

        scheduler.play(0.1, &mut events);
        scheduler.tick(0.025, &pattern, &bank, &mut commands, &mut events);
        // a restart would have rewound to step 0 and rescheduled it inside
        // the same window
        let step_zero_triggers = drum_times(&commands)
            .iter()
            .filter(|&&t| (t - 0.05).abs() < 1e-9)
            .count();
        assert_eq!(step_zero_triggers, 1);
        assert!(commands.len() >= before);
    }

    #[test]
    fn stop_cancels_and_resets_the_published_step() {
        let mut pattern = Pattern::default();
        pattern.toggle_drum_pad(0, 0);
        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        scheduler.play(0.0, &mut events);
        scheduler.tick(0.0, &pattern, &bank, &mut commands, &mut events);
        scheduler.tick(0.1, &pattern, &bank, &mut commands, &mut events);
        assert!(scheduler.published_step().is_some());

        events.clear();
        commands.clear();
        scheduler.stop(&mut commands, &mut events);
        assert!(matches!(commands[..], [AudioCommand::CancelScheduled]));
        assert!(events.contains(&TransportEvent::StepChanged(None)));
        assert!(events.contains(&TransportEvent::PlayStateChanged(false)));
        assert_eq!(scheduler.published_step(), None);
    }

    #[test]
    fn a_long_poll_gap_reanchors_instead_of_bursting() {
        let mut pattern = Pattern::default();
        for step in 0..NUM_STEPS {
            pattern.toggle_drum_pad(0, step);
        }
        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        scheduler.play(0.0, &mut events);
        scheduler.tick(0.0, &pattern, &bank, &mut commands, &mut events);
        commands.clear();

        // simulate a 3-second stall (e.g. a backgrounded tab)
        scheduler.tick(3.0, &pattern, &bank, &mut commands, &mut events);
        let times = drum_times(&commands);
        // without drift recovery this would be ~23 stale triggers
        assert!(times.len() <= 2, "burst of stale triggers: {}", times.len());
        assert!(times.iter().all(|&t| t >= 3.0));
    }

    #[test]
    fn step_highlight_follows_playback_time_not_schedule_time() {
        let mut pattern = Pattern::default();
        pattern.toggle_drum_pad(0, 0);
        let bank = bank();
        let mut scheduler = TransportScheduler::new();
        let mut commands = Vec::new();
        let mut events = Vec::new();

        scheduler.play(0.0, &mut events);
        scheduler.tick(0.0, &pattern, &bank, &mut commands, &mut events);
        // step 0 is scheduled for 0.05 but hasn't played yet
        assert_eq!(scheduler.published_step(), None);

        scheduler.tick(0.06, &pattern, &bank, &mut commands, &mut events);
        assert_eq!(scheduler.published_step(), Some(0));
        assert!(events.contains(&TransportEvent::StepChanged(Some(0))));
    }
}
