// The render core that lives inside the output callback. It drains the
// command queue, arms voices against the absolute sample clock, renders the
// drum and synth buses, and folds them through the shared effect chain.
//
// Everything here is also usable offline: construct an `Engine` without any
// device, feed it commands, and pull blocks with `render_block`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio_api::AudioCommand;
use crate::pipeline::pattern::{DelayConfig, FilterConfig, ReverbConfig};

use super::effect::EffectChain;
use super::frame::StereoFrame;
use super::sample_buffer::{SampleBuffer, SampleId};
use super::voice::{DrumVoice, SynthVoice};

// hard caps so the callback never allocates for voices
const MAX_DRUM_VOICES: usize = 16;
const MAX_SYNTH_VOICES: usize = 24;

const MAX_BLOCK: usize = 4096;

pub struct Engine {
    sample_rate: f32,
    clock: u64,
    shared_clock: Arc<AtomicU64>,
    samples: HashMap<SampleId, SampleBuffer>,
    drum_voices: Vec<DrumVoice>,
    synth_voices: Vec<SynthVoice>,
    preview: Option<DrumVoice>,
    chain: EffectChain,
    bus_drums: Vec<StereoFrame>,
    bus_synth: Vec<StereoFrame>,
}

impl Engine {
    pub fn new(sample_rate: u32, shared_clock: Arc<AtomicU64>) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            sample_rate,
            clock: 0,
            shared_clock,
            samples: HashMap::new(),
            drum_voices: Vec::with_capacity(MAX_DRUM_VOICES),
            synth_voices: Vec::with_capacity(MAX_SYNTH_VOICES),
            preview: None,
            chain: EffectChain::new(
                sample_rate,
                FilterConfig::default(),
                DelayConfig::default(),
                ReverbConfig::default(),
            ),
            bus_drums: vec![StereoFrame::zero(); MAX_BLOCK],
            bus_synth: vec![StereoFrame::zero(); MAX_BLOCK],
        }
    }

    /// Seconds on the audio clock.
    pub fn now(&self) -> f64 {
        self.clock as f64 / self.sample_rate as f64
    }

    fn to_sample(&self, at: f64) -> u64 {
        // anything scheduled in the past starts on the next rendered sample
        ((at * self.sample_rate as f64) as u64).max(self.clock)
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample { id, buffer } => {
                self.samples.insert(id, buffer);
            }
            AudioCommand::TriggerDrum(t) => {
                if !self.samples.contains_key(&t.sample) {
                    return;
                }
                let voice =
                    DrumVoice::new(t.sample, self.to_sample(t.at), t.gain, t.pan, self.sample_rate);
                if self.drum_voices.len() < MAX_DRUM_VOICES {
                    self.drum_voices.push(voice);
                } else if let Some(slot) = self.oldest_drum_slot() {
                    self.drum_voices[slot] = voice;
                }
            }
            AudioCommand::NoteOn(n) => {
                let start = self.to_sample(n.at);
                // monophonic per row: the newcomer trims any earlier voice
                for v in &mut self.synth_voices {
                    if v.active && v.note_row == n.note && v.start_sample < start {
                        v.stop_at(start);
                    }
                }
                let voice = SynthVoice::new(
                    n.note,
                    n.freq,
                    n.wave,
                    start,
                    n.gain,
                    n.pan,
                    self.sample_rate,
                );
                if self.synth_voices.len() < MAX_SYNTH_VOICES {
                    self.synth_voices.push(voice);
                } else if let Some(slot) = self.oldest_synth_slot() {
                    self.synth_voices[slot] = voice;
                }
            }
            AudioCommand::NoteOff { note, at } => {
                let stop = self.to_sample(at);
                // the most recent voice on the row that the off can apply to
                if let Some(v) = self
                    .synth_voices
                    .iter_mut()
                    .filter(|v| v.active && v.note_row == note && v.start_sample <= stop)
                    .max_by_key(|v| v.start_sample)
                {
                    v.stop_at(stop);
                }
            }
            AudioCommand::PreviewStart { sample, gain } => {
                if self.samples.contains_key(&sample) {
                    self.preview =
                        Some(DrumVoice::new(sample, self.clock, gain, 0.0, self.sample_rate));
                }
            }
            AudioCommand::PreviewStop => {
                // stopping with nothing playing is a no-op
                if let Some(p) = &mut self.preview {
                    p.fade_out();
                }
            }
            AudioCommand::CancelScheduled => self.cancel_scheduled(),
            AudioCommand::SetFilter(config) => self.chain.set_filter(config),
            AudioCommand::SetDelay(config) => self.chain.set_delay(config),
            AudioCommand::SetReverb(config) => self.chain.set_reverb(config),
        }
    }

    fn oldest_drum_slot(&self) -> Option<usize> {
        self.drum_voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.start_sample)
            .map(|(i, _)| i)
    }

    fn oldest_synth_slot(&self) -> Option<usize> {
        self.synth_voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.start_sample)
            .map(|(i, _)| i)
    }

    // Transport stop: unstarted voices vanish, sounding voices fade over a
    // few milliseconds. The preview voice is untouched.
    fn cancel_scheduled(&mut self) {
        let clock = self.clock;
        self.drum_voices.retain(|v| v.started(clock));
        for v in &mut self.drum_voices {
            v.fade_out();
        }
        self.synth_voices.retain(|v| v.started(clock));
        for v in &mut self.synth_voices {
            v.stop_at(clock);
        }
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        let mut offset = 0;
        while offset < out.len() {
            let n = (out.len() - offset).min(MAX_BLOCK);
            self.render_chunk(&mut out[offset..offset + n]);
            offset += n;
        }
    }

    fn render_chunk(&mut self, out: &mut [StereoFrame]) {
        let n = out.len();
        let drums = &mut self.bus_drums[..n];
        let synth = &mut self.bus_synth[..n];
        drums.fill(StereoFrame::zero());
        synth.fill(StereoFrame::zero());

        for v in &mut self.drum_voices {
            if let Some(buffer) = self.samples.get(&v.sample) {
                v.render_into(buffer, drums, self.clock);
            } else {
                v.active = false;
            }
        }
        if let Some(p) = &mut self.preview {
            if let Some(buffer) = self.samples.get(&p.sample) {
                p.render_into(buffer, drums, self.clock);
            } else {
                p.active = false;
            }
        }
        for v in &mut self.synth_voices {
            v.render_into(synth, self.clock);
        }

        for i in 0..n {
            out[i] = self.chain.process(synth[i], drums[i]);
        }

        self.drum_voices.retain(|v| v.active);
        self.synth_voices.retain(|v| v.active);
        if self.preview.as_ref().is_some_and(|p| !p.active) {
            self.preview = None;
        }

        self.clock += n as u64;
        self.shared_clock.store(self.clock, Ordering::Release);
    }
}
