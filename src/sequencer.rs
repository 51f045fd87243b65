// The collaborator-facing surface: one object that owns the pattern, the
// audio stream, the sound bank and the scheduler worker, and turns UI-side
// calls into store mutations and engine commands. Nothing here blocks; the
// scheduler runs on its own thread against pattern snapshots, so edits and
// playback never wait on each other.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::audio::{start_audio, AudioClock, AudioHandle};
use crate::audio_api::AudioCommand;
use crate::error::{EngineError, Result};
use crate::loader::SoundBank;
use crate::pipeline::pattern::Pattern;
use crate::pipeline::persistence::{self, Document};
use crate::pipeline::presets;
use crate::shared::{FilterKind, OscillatorType, NUM_NOTES, NUM_STEPS};
use crate::transport::{TransportEvent, TransportScheduler};

enum ControlMsg {
    Play,
    Pause,
    Shutdown,
}

pub struct Sequencer {
    pattern: Arc<RwLock<Pattern>>,
    bank: Arc<RwLock<SoundBank>>,
    audio: AudioHandle,
    control_tx: Sender<ControlMsg>,
    events_rx: Receiver<TransportEvent>,
    playing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Sequencer {
    /// Bring the whole engine up: audio stream, built-in sound bank, and
    /// the scheduler worker.
    pub fn start() -> Result<Self> {
        let audio = start_audio()?;
        let bank = SoundBank::with_builtin(audio.sample_rate());
        for (id, buffer) in bank.registrations() {
            audio.send(AudioCommand::RegisterSample { id, buffer });
        }

        let pattern = Arc::new(RwLock::new(Pattern::default()));
        let bank = Arc::new(RwLock::new(bank));
        let playing = Arc::new(AtomicBool::new(false));
        let (control_tx, control_rx) = crossbeam_channel::bounded(64);
        let (events_tx, events_rx) = crossbeam_channel::bounded(256);

        let worker = spawn_scheduler_thread(SchedulerContext {
            scheduler: TransportScheduler::new(),
            clock: audio.clock(),
            command_tx: audio.sender(),
            pattern: Arc::clone(&pattern),
            bank: Arc::clone(&bank),
            playing: Arc::clone(&playing),
            control_rx,
            events_tx,
        });

        let sequencer = Self {
            pattern,
            bank,
            audio,
            control_tx,
            events_rx,
            playing,
            worker: Some(worker),
        };
        sequencer.sync_effects();
        log::info!("sequencer ready");
        Ok(sequencer)
    }

    // ── Transport ─────────────────────────────────────────────────

    pub fn play(&self) {
        let _ = self.control_tx.send(ControlMsg::Play);
    }

    pub fn pause(&self) {
        let _ = self.control_tx.send(ControlMsg::Pause);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Step-change and play-state notifications for rendering. Drained
    /// without blocking; call it from the UI's update tick.
    pub fn poll_events(&self) -> Vec<TransportEvent> {
        self.events_rx.try_iter().collect()
    }

    // ── Pattern edits ─────────────────────────────────────────────

    pub fn set_tempo(&self, bpm: u32) {
        self.write_pattern(|p| p.set_tempo(bpm));
    }

    pub fn toggle_drum_pad(&self, track: usize, step: usize) {
        self.write_pattern(|p| p.toggle_drum_pad(track, step));
    }

    /// Place a note with the configured default duration, or clear the
    /// start already at this cell.
    pub fn toggle_piano_roll_pad(&self, note: usize, step: usize) {
        self.write_pattern(|p| {
            if note >= NUM_NOTES || step >= NUM_STEPS {
                return;
            }
            if p.piano_roll_grid[note][step] > 0 {
                p.set_piano_roll_note(note, step, 0);
            } else {
                let duration = p.synth.default_note_duration_steps;
                p.set_piano_roll_note(note, step, duration);
            }
        });
    }

    pub fn set_piano_roll_note(&self, note: usize, step: usize, duration: u32) {
        self.write_pattern(|p| p.set_piano_roll_note(note, step, duration));
    }

    pub fn set_track_sound(&self, track: usize, sound_id: &str) {
        self.write_pattern(|p| p.set_track_sound(track, sound_id));
    }

    pub fn set_track_volume(&self, track: usize, volume: f32) {
        self.write_pattern(|p| p.set_track_volume(track, volume));
    }

    pub fn set_track_pan(&self, track: usize, pan: f32) {
        self.write_pattern(|p| p.set_track_pan(track, pan));
    }

    pub fn toggle_track_solo(&self, track: usize) {
        self.write_pattern(|p| p.toggle_track_solo(track));
    }

    pub fn set_octave(&self, octave: u32) {
        self.write_pattern(|p| p.set_octave(octave));
    }

    pub fn set_synth_volume(&self, volume: f32) {
        self.write_pattern(|p| p.set_synth_volume(volume));
    }

    pub fn set_synth_pan(&self, pan: f32) {
        self.write_pattern(|p| p.set_synth_pan(pan));
    }

    pub fn set_oscillator_type(&self, osc: OscillatorType) {
        self.write_pattern(|p| p.set_oscillator_type(osc));
    }

    pub fn set_default_note_duration(&self, steps: u32) {
        self.write_pattern(|p| p.set_default_note_duration(steps));
    }

    // Effect setters update the store and push the clamped value to the
    // live chain; it applies from the next rendered block.

    pub fn set_filter_kind(&self, kind: FilterKind) {
        let config = self.write_pattern(|p| {
            p.set_filter_kind(kind);
            p.filter
        });
        self.audio.send(AudioCommand::SetFilter(config));
    }

    pub fn set_filter_cutoff(&self, hz: f32) {
        let config = self.write_pattern(|p| {
            p.set_filter_cutoff(hz);
            p.filter
        });
        self.audio.send(AudioCommand::SetFilter(config));
    }

    pub fn set_filter_resonance(&self, q: f32) {
        let config = self.write_pattern(|p| {
            p.set_filter_resonance(q);
            p.filter
        });
        self.audio.send(AudioCommand::SetFilter(config));
    }

    pub fn set_delay_time(&self, seconds: f32) {
        let config = self.write_pattern(|p| {
            p.set_delay_time(seconds);
            p.delay
        });
        self.audio.send(AudioCommand::SetDelay(config));
    }

    pub fn set_delay_feedback(&self, feedback: f32) {
        let config = self.write_pattern(|p| {
            p.set_delay_feedback(feedback);
            p.delay
        });
        self.audio.send(AudioCommand::SetDelay(config));
    }

    pub fn set_delay_mix(&self, mix: f32) {
        let config = self.write_pattern(|p| {
            p.set_delay_mix(mix);
            p.delay
        });
        self.audio.send(AudioCommand::SetDelay(config));
    }

    pub fn set_reverb_mix(&self, mix: f32) {
        let config = self.write_pattern(|p| {
            p.set_reverb_mix(mix);
            p.reverb
        });
        self.audio.send(AudioCommand::SetReverb(config));
    }

    pub fn clear(&self) {
        self.write_pattern(|p| p.clear());
    }

    // ── Presets ───────────────────────────────────────────────────

    pub fn load_preset(&self, preset: Pattern) {
        self.write_pattern(|p| p.load_preset(preset));
        self.sync_effects();
    }

    pub fn load_drum_preset(&self, name: &str) -> Result<()> {
        let preset = presets::drum_presets()
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::UnknownPreset(name.to_string()))?;
        self.write_pattern(|p| p.load_drum_grid(preset.grid));
        Ok(())
    }

    pub fn load_bass_preset(&self, name: &str) -> Result<()> {
        let preset = presets::bass_presets()
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::UnknownPreset(name.to_string()))?;
        self.write_pattern(|p| p.load_bass_grid(preset.grid));
        Ok(())
    }

    // ── Persistence ───────────────────────────────────────────────

    pub fn export_document(&self) -> Document {
        persistence::export_document(&self.pattern())
    }

    pub fn export_json(&self) -> Result<String> {
        persistence::export_json(&self.pattern())
    }

    pub fn save_to_file(&self, dir: &Path, name: Option<&str>) -> Result<PathBuf> {
        let default_name = persistence::default_file_name();
        let name = name.unwrap_or(&default_name);
        persistence::save_to_file(dir, name, &self.pattern())
    }

    /// Validate and apply an imported document. On error the current
    /// pattern is untouched.
    pub fn import_json(&self, json: &str) -> Result<()> {
        let imported = persistence::import_json(json)?;
        self.load_preset(imported);
        Ok(())
    }

    pub fn load_from_file(&self, path: &Path) -> Result<()> {
        let imported = persistence::load_from_file(path)?;
        self.load_preset(imported);
        Ok(())
    }

    // ── Preview & sounds ──────────────────────────────────────────

    /// Audition a sound outside the sequenced timeline.
    pub fn preview_start(&self, sound_id: &str, volume: f32) -> Result<()> {
        let sample = self
            .bank
            .read()
            .expect("sound bank lock poisoned")
            .resolve(sound_id)
            .ok_or_else(|| EngineError::UnknownSound(sound_id.to_string()))?;
        self.audio.send(AudioCommand::PreviewStart {
            sample,
            gain: volume.clamp(0.0, 1.0),
        });
        Ok(())
    }

    pub fn preview_stop(&self) {
        self.audio.send(AudioCommand::PreviewStop);
    }

    /// Register an extra sound from a WAV file under the given id.
    pub fn load_sound_wav(&self, sound_id: &str, path: &Path) -> Result<()> {
        let (id, buffer) = self
            .bank
            .write()
            .expect("sound bank lock poisoned")
            .load_wav(sound_id, path, self.audio.sample_rate())?;
        self.audio.send(AudioCommand::RegisterSample { id, buffer });
        Ok(())
    }

    pub fn sound_ids(&self) -> Vec<String> {
        self.bank
            .read()
            .expect("sound bank lock poisoned")
            .sound_ids()
    }

    /// Snapshot of the current pattern for rendering.
    pub fn pattern(&self) -> Pattern {
        self.pattern
            .read()
            .expect("pattern lock poisoned")
            .clone()
    }

    // ── Internals ─────────────────────────────────────────────────

    fn write_pattern<T>(&self, f: impl FnOnce(&mut Pattern) -> T) -> T {
        let mut guard = self.pattern.write().expect("pattern lock poisoned");
        f(&mut guard)
    }

    fn sync_effects(&self) {
        let p = self.pattern();
        self.audio.send(AudioCommand::SetFilter(p.filter));
        self.audio.send(AudioCommand::SetDelay(p.delay));
        self.audio.send(AudioCommand::SetReverb(p.reverb));
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        let _ = self.control_tx.send(ControlMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct SchedulerContext {
    scheduler: TransportScheduler,
    clock: AudioClock,
    command_tx: Sender<AudioCommand>,
    pattern: Arc<RwLock<Pattern>>,
    bank: Arc<RwLock<SoundBank>>,
    playing: Arc<AtomicBool>,
    control_rx: Receiver<ControlMsg>,
    events_tx: Sender<TransportEvent>,
}

// The poll loop. Wakes either on a control message or on the poll interval,
// ticks the scheduler against a fresh snapshot, and fans the results out.
fn spawn_scheduler_thread(mut ctx: SchedulerContext) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("nexusbeat-scheduler".into())
        .spawn(move || {
            let poll = Duration::from_secs_f64(ctx.scheduler.poll_interval_secs());
            let mut commands = Vec::new();
            let mut events = Vec::new();

            loop {
                match ctx.control_rx.recv_timeout(poll) {
                    Ok(ControlMsg::Play) => {
                        ctx.scheduler.play(ctx.clock.secs(), &mut events);
                    }
                    Ok(ControlMsg::Pause) => {
                        ctx.scheduler.stop(&mut commands, &mut events);
                    }
                    Ok(ControlMsg::Shutdown) => break,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }

                let now = ctx.clock.secs();
                let snapshot = ctx.pattern.read().expect("pattern lock poisoned").clone();
                {
                    let bank = ctx.bank.read().expect("sound bank lock poisoned");
                    ctx.scheduler
                        .tick(now, &snapshot, &bank, &mut commands, &mut events);
                }

                for cmd in commands.drain(..) {
                    if ctx.command_tx.try_send(cmd).is_err() {
                        log::warn!("audio command queue full, dropping scheduled event");
                    }
                }
                ctx.playing
                    .store(ctx.scheduler.is_playing(), Ordering::Release);
                for event in events.drain(..) {
                    let _ = ctx.events_tx.try_send(event);
                }
            }
            log::info!("scheduler thread shut down");
        })
        .expect("failed to spawn scheduler thread")
}
