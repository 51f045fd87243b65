// Sound-producing units. Drum voices replay a registered sample buffer,
// synth voices run a phase-accumulator oscillator between a note-on and a
// note-off. Both kinds are armed with an absolute start expressed in samples
// and stay silent until the render clock reaches it, which is what makes
// batched lookahead scheduling sample-accurate.

use crate::shared::OscillatorType;

use super::frame::{pan_gains, StereoFrame};
use super::sample_buffer::{SampleBuffer, SampleId};

const ATTACK_SECS: f32 = 0.002;
const RELEASE_SECS: f32 = 0.008;

/// One-shot playback of a sample buffer.
#[derive(Clone, Debug)]
pub struct DrumVoice {
    pub sample: SampleId,
    pub start_sample: u64,
    pos: usize,
    gain_left: f32,
    gain_right: f32,
    // set when the transport cancels mid-flight; ramps the voice to zero
    fade: Option<f32>,
    fade_step: f32,
    pub active: bool,
}

impl DrumVoice {
    pub fn new(sample: SampleId, start_sample: u64, gain: f32, pan: f32, sample_rate: f32) -> Self {
        let (pan_l, pan_r) = pan_gains(pan);
        Self {
            sample,
            start_sample,
            pos: 0,
            gain_left: gain * pan_l,
            gain_right: gain * pan_r,
            fade: None,
            fade_step: 1.0 / (RELEASE_SECS * sample_rate),
            active: true,
        }
    }

    pub fn started(&self, clock: u64) -> bool {
        self.start_sample <= clock
    }

    /// Begin a fast fade so a transport stop cuts the tail without a click.
    pub fn fade_out(&mut self) {
        if self.fade.is_none() {
            self.fade = Some(1.0);
        }
    }

    pub fn render_into(&mut self, buffer: &SampleBuffer, out: &mut [StereoFrame], block_start: u64) {
        if !self.active {
            return;
        }
        for (i, frame) in out.iter_mut().enumerate() {
            let t = block_start + i as u64;
            if t < self.start_sample {
                continue;
            }
            let Some(&src) = buffer.data.get(self.pos) else {
                self.active = false;
                return;
            };
            let fade_gain = match &mut self.fade {
                Some(g) => {
                    *g -= self.fade_step;
                    if *g <= 0.0 {
                        self.active = false;
                        return;
                    }
                    *g
                }
                None => 1.0,
            };
            frame.left += src.left * self.gain_left * fade_gain;
            frame.right += src.right * self.gain_right * fade_gain;
            self.pos += 1;
        }
        if self.pos >= buffer.data.len() {
            self.active = false;
        }
    }
}

/// A sustained oscillator note. Monophony per piano-roll row is enforced by
/// the engine, which trims an earlier voice's stop time when a later one is
/// scheduled on the same row.
#[derive(Clone, Copy, Debug)]
pub struct SynthVoice {
    pub note_row: usize,
    pub start_sample: u64,
    pub stop_sample: Option<u64>,
    wave: OscillatorType,
    phase: f32,
    phase_inc: f32,
    gain_left: f32,
    gain_right: f32,
    attack_samples: f32,
    release_samples: f32,
    pub active: bool,
}

// keeps the oscillator itself at a sane level before the mix gain
const OSC_LEVEL: f32 = 0.25;

impl SynthVoice {
    pub fn new(
        note_row: usize,
        freq: f32,
        wave: OscillatorType,
        start_sample: u64,
        gain: f32,
        pan: f32,
        sample_rate: f32,
    ) -> Self {
        let (pan_l, pan_r) = pan_gains(pan);
        Self {
            note_row,
            start_sample,
            stop_sample: None,
            wave,
            phase: 0.0,
            phase_inc: freq / sample_rate,
            gain_left: gain * pan_l * OSC_LEVEL,
            gain_right: gain * pan_r * OSC_LEVEL,
            attack_samples: ATTACK_SECS * sample_rate,
            release_samples: RELEASE_SECS * sample_rate,
            active: true,
        }
    }

    pub fn started(&self, clock: u64) -> bool {
        self.start_sample <= clock
    }

    /// Schedule (or pull forward) the note-off. A later stop never overrides
    /// an earlier one, so retriggers and transport stops compose.
    pub fn stop_at(&mut self, stop_sample: u64) {
        self.stop_sample = Some(match self.stop_sample {
            Some(existing) => existing.min(stop_sample),
            None => stop_sample,
        });
    }

    #[inline]
    fn waveform(&self) -> f32 {
        match self.wave {
            OscillatorType::Sine => (std::f32::consts::TAU * self.phase).sin(),
            OscillatorType::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            OscillatorType::Sawtooth => 2.0 * self.phase - 1.0,
            OscillatorType::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
        }
    }

    #[inline]
    fn envelope(&self, t: u64) -> Option<f32> {
        let since_start = (t - self.start_sample) as f32;
        let attack = (since_start / self.attack_samples).min(1.0);
        let release = match self.stop_sample {
            Some(stop) if t >= stop => {
                let since_stop = (t - stop) as f32;
                let r = 1.0 - since_stop / self.release_samples;
                if r <= 0.0 {
                    return None;
                }
                r
            }
            _ => 1.0,
        };
        Some(attack * release)
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame], block_start: u64) {
        if !self.active {
            return;
        }
        for (i, frame) in out.iter_mut().enumerate() {
            let t = block_start + i as u64;
            if t < self.start_sample {
                continue;
            }
            let Some(env) = self.envelope(t) else {
                self.active = false;
                return;
            };
            let sample = self.waveform() * env;
            frame.left += sample * self.gain_left;
            frame.right += sample * self.gain_right;
            self.phase += self.phase_inc;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44_100.0;

    #[test]
    fn drum_voice_waits_for_its_start_sample() {
        let buffer = SampleBuffer::from_mono(&[1.0; 64]);
        let mut voice = DrumVoice::new(SampleId(0), 100, 1.0, 0.0, SR);
        let mut out = vec![StereoFrame::zero(); 128];
        voice.render_into(&buffer, &mut out, 0);

        assert!(out[..100].iter().all(|f| f.is_silent(0.0)));
        assert!(out[100].left.abs() > 0.1);
    }

    #[test]
    fn drum_voice_dies_when_the_buffer_ends() {
        let buffer = SampleBuffer::from_mono(&[0.5; 10]);
        let mut voice = DrumVoice::new(SampleId(0), 0, 1.0, 0.0, SR);
        let mut out = vec![StereoFrame::zero(); 32];
        voice.render_into(&buffer, &mut out, 0);
        assert!(!voice.active);
        assert!(out[10..].iter().all(|f| f.is_silent(0.0)));
    }

    #[test]
    fn faded_drum_voice_reaches_silence_quickly() {
        let buffer = SampleBuffer::from_mono(&[1.0; 44_100]);
        let mut voice = DrumVoice::new(SampleId(0), 0, 1.0, 0.0, SR);
        let mut out = vec![StereoFrame::zero(); 1024];
        voice.render_into(&buffer, &mut out, 0);
        assert!(voice.active);

        voice.fade_out();
        let mut out = vec![StereoFrame::zero(); 1024];
        voice.render_into(&buffer, &mut out, 1024);
        // 8 ms at 44.1 kHz is ~353 samples
        assert!(!voice.active);
        assert!(out[500..].iter().all(|f| f.is_silent(0.0)));
    }

    #[test]
    fn synth_voice_releases_after_note_off() {
        let mut voice =
            SynthVoice::new(5, 110.0, OscillatorType::Sawtooth, 0, 1.0, 0.0, SR);
        voice.stop_at(1000);
        let mut out = vec![StereoFrame::zero(); 2048];
        voice.render_into(&mut out, 0);

        assert!(!voice.active);
        // release is 8 ms ≈ 353 samples past the stop
        assert!(out[1500..].iter().all(|f| f.is_silent(0.0)));
        assert!(out[..1000].iter().any(|f| !f.is_silent(0.01)));
    }

    #[test]
    fn earlier_stop_wins() {
        let mut voice = SynthVoice::new(0, 110.0, OscillatorType::Sine, 0, 1.0, 0.0, SR);
        voice.stop_at(5000);
        voice.stop_at(2000);
        assert_eq!(voice.stop_sample, Some(2000));
        voice.stop_at(9000);
        assert_eq!(voice.stop_sample, Some(2000));
    }

    #[test]
    fn every_waveform_stays_in_range() {
        for wave in [
            OscillatorType::Sine,
            OscillatorType::Square,
            OscillatorType::Sawtooth,
            OscillatorType::Triangle,
        ] {
            let mut voice = SynthVoice::new(0, 440.0, wave, 0, 1.0, 0.0, SR);
            let mut out = vec![StereoFrame::zero(); 4096];
            voice.render_into(&mut out, 0);
            assert!(out.iter().all(|f| f.left.abs() <= 1.0 && f.right.abs() <= 1.0));
            assert!(out.iter().any(|f| !f.is_silent(0.01)));
        }
    }
}
