// The sound bank maps the pattern's string sound ids to sample buffers the
// render engine can play. It ships a synthesized drum library so the engine
// makes sound with no assets on disk, and can pull extra sounds in from WAV
// files. Buffers are decoded and rendered here, on the control side, then
// registered with the engine over the command channel.

use std::collections::HashMap;
use std::path::Path;

use crate::audio::{next_sample_id, SampleBuffer, SampleId};
use crate::error::{EngineError, Result};

struct Entry {
    sample: SampleId,
    buffer: SampleBuffer,
}

pub struct SoundBank {
    sounds: HashMap<String, Entry>,
    order: Vec<String>,
}

impl SoundBank {
    /// Build the bank with the built-in drum library rendered at the given
    /// engine rate.
    pub fn with_builtin(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let mut bank = Self {
            sounds: HashMap::new(),
            order: Vec::new(),
        };
        bank.insert("kick", SampleBuffer::from_mono(&render_kick(sr, 150.0, 50.0, 0.30)));
        bank.insert("kick-808", SampleBuffer::from_mono(&render_kick(sr, 120.0, 40.0, 0.55)));
        bank.insert("snare", SampleBuffer::from_mono(&render_snare(sr)));
        bank.insert("rim", SampleBuffer::from_mono(&render_rim(sr)));
        bank.insert("hat-closed", SampleBuffer::from_mono(&render_hat(sr, 0.06)));
        bank.insert("hat-open", SampleBuffer::from_mono(&render_hat(sr, 0.35)));
        bank.insert("clap", SampleBuffer::from_mono(&render_clap(sr)));
        bank.insert("tom-low", SampleBuffer::from_mono(&render_tom(sr, 110.0)));
        bank.insert("tom-high", SampleBuffer::from_mono(&render_tom(sr, 196.0)));
        bank
    }

    fn insert(&mut self, id: &str, buffer: SampleBuffer) {
        self.sounds.insert(
            id.to_string(),
            Entry {
                sample: next_sample_id(),
                buffer,
            },
        );
        self.order.push(id.to_string());
    }

    pub fn resolve(&self, sound_id: &str) -> Option<SampleId> {
        self.sounds.get(sound_id).map(|e| e.sample)
    }

    /// Ids in registration order, for building sound-selection menus.
    pub fn sound_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// (id, buffer) pairs to register with a freshly started engine.
    pub fn registrations(&self) -> impl Iterator<Item = (SampleId, SampleBuffer)> + '_ {
        self.order.iter().filter_map(|id| {
            self.sounds
                .get(id)
                .map(|e| (e.sample, e.buffer.clone()))
        })
    }

    /// Load a WAV from disk under a caller-chosen sound id. Returns the
    /// registration pair to forward to the engine.
    pub fn load_wav(
        &mut self,
        sound_id: &str,
        path: &Path,
        sample_rate: u32,
    ) -> Result<(SampleId, SampleBuffer)> {
        let buffer = SampleBuffer::load_wav(path, sample_rate)
            .map_err(|e| EngineError::Audio(format!("failed to load {}: {e}", path.display())))?;
        self.insert(sound_id, buffer);
        let entry = &self.sounds[sound_id];
        Ok((entry.sample, entry.buffer.clone()))
    }
}

// ── Built-in drum synthesis ───────────────────────────────────────
//
// Classic analog-style recipes: kicks and toms are pitch-swept sines, hats
// are differenced noise (a cheap highpass), snare layers tone and noise,
// clap is a few noise bursts in quick succession.

fn render_kick(sr: f32, start_hz: f32, end_hz: f32, decay_secs: f32) -> Vec<f32> {
    let len = (decay_secs * sr) as usize;
    let mut out = Vec::with_capacity(len);
    let mut phase = 0.0f32;
    for i in 0..len {
        let t = i as f32 / sr;
        // pitch drops fast over the first 50 ms
        let sweep = (-t / 0.05).exp();
        let freq = end_hz + (start_hz - end_hz) * sweep;
        phase += freq / sr;
        let env = (-t / (decay_secs * 0.3)).exp();
        out.push((std::f32::consts::TAU * phase).sin() * env);
    }
    out
}

fn render_tom(sr: f32, pitch_hz: f32) -> Vec<f32> {
    render_kick(sr, pitch_hz * 1.5, pitch_hz, 0.25)
}

fn render_snare(sr: f32) -> Vec<f32> {
    let len = (0.25 * sr) as usize;
    let mut noise = NoiseSource::new(0x5eed);
    let mut out = Vec::with_capacity(len);
    let mut phase = 0.0f32;
    for i in 0..len {
        let t = i as f32 / sr;
        phase += 185.0 / sr;
        let tone = (std::f32::consts::TAU * phase).sin() * (-t / 0.05).exp();
        let hiss = noise.next() * (-t / 0.09).exp();
        out.push(tone * 0.5 + hiss * 0.5);
    }
    out
}

fn render_rim(sr: f32) -> Vec<f32> {
    let len = (0.04 * sr) as usize;
    let mut out = Vec::with_capacity(len);
    let mut phase = 0.0f32;
    for i in 0..len {
        let t = i as f32 / sr;
        phase += 1100.0 / sr;
        out.push((std::f32::consts::TAU * phase).sin() * (-t / 0.008).exp());
    }
    out
}

fn render_hat(sr: f32, decay_secs: f32) -> Vec<f32> {
    let len = (decay_secs * sr) as usize;
    let mut noise = NoiseSource::new(0x4a7);
    let mut out = Vec::with_capacity(len);
    let mut prev = 0.0f32;
    for i in 0..len {
        let t = i as f32 / sr;
        let white = noise.next();
        // first difference tilts the noise toward the highs
        let bright = (white - prev) * 0.5;
        prev = white;
        out.push(bright * (-t / (decay_secs * 0.4)).exp() * 0.9);
    }
    out
}

fn render_clap(sr: f32) -> Vec<f32> {
    let len = (0.3 * sr) as usize;
    let mut noise = NoiseSource::new(0xc1a9);
    let burst_gap = (0.01 * sr) as usize;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let t = i as f32 / sr;
        // three quick attacks before the main decay
        let burst = i / burst_gap;
        let env = if burst < 3 {
            (-((i % burst_gap) as f32 / sr) / 0.006).exp()
        } else {
            (-(t - 0.03) / 0.08).exp()
        };
        out.push(noise.next() * env * 0.9);
    }
    out
}

// xorshift noise, deterministic so renders are reproducible
struct NoiseSource {
    state: u64,
}

impl NoiseSource {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_covers_the_default_kit() {
        let bank = SoundBank::with_builtin(44_100);
        for id in ["kick", "snare", "hat-closed", "clap"] {
            assert!(bank.resolve(id).is_some(), "missing builtin sound {id}");
        }
        assert!(bank.resolve("nonexistent").is_none());
    }

    #[test]
    fn rendered_drums_are_audible_and_bounded() {
        let bank = SoundBank::with_builtin(44_100);
        for (_, buffer) in bank.registrations() {
            assert!(!buffer.data.is_empty());
            let peak = buffer
                .data
                .iter()
                .fold(0.0f32, |m, f| m.max(f.left.abs()));
            assert!(peak > 0.05, "drum renders silent");
            assert!(peak <= 1.0, "drum clips");
        }
    }

    #[test]
    fn noise_is_deterministic() {
        let mut a = NoiseSource::new(42);
        let mut b = NoiseSource::new(42);
        for _ in 0..100 {
            assert_eq!(a.next(), b.next());
        }
    }
}
