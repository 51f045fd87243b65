// The shared effect path: a biquad filter in series on the synth bus, and a
// delay line plus Schroeder reverb running as parallel sends that get summed
// with the dry mix at the master output. Drum voices skip the filter but
// feed the sends at a fixed low level.
//
// Reconfiguration mutates the live processors in place — filter memory and
// delay contents survive every parameter change, so edits mid-playback do
// not click.

use crate::pipeline::pattern::{DelayConfig, FilterConfig, ReverbConfig};
use crate::shared::FilterKind;

use super::frame::StereoFrame;

/// Fixed send level from the drum bus into delay and reverb.
const DRUM_SEND: f32 = 0.15;

/// Longest supported delay tap, matching the delay time range.
const MAX_DELAY_SECS: f32 = 1.0;

// ── Biquad filter ─────────────────────────────────────────────────

// RBJ cookbook biquad, transposed direct form II, one state pair per channel.
struct Biquad {
    sample_rate: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: StereoFrame,
    z2: StereoFrame,
}

impl Biquad {
    fn new(sample_rate: f32, config: FilterConfig) -> Self {
        let mut f = Self {
            sample_rate,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: StereoFrame::zero(),
            z2: StereoFrame::zero(),
        };
        f.configure(config);
        f
    }

    fn configure(&mut self, config: FilterConfig) {
        let cutoff = config.cutoff_hz.clamp(20.0, self.sample_rate * 0.45);
        let q = config.resonance_q.max(0.05);
        let omega = std::f32::consts::TAU * cutoff / self.sample_rate;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);

        let (b0, b1, b2) = match config.kind {
            FilterKind::Lowpass => {
                let b1 = 1.0 - cos;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterKind::Highpass => {
                let b1 = -(1.0 + cos);
                (-b1 / 2.0, b1, -b1 / 2.0)
            }
            FilterKind::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos / a0;
        self.a2 = (1.0 - alpha) / a0;
        // state intentionally kept: coefficient changes must not reset the line
    }

    #[inline]
    fn process(&mut self, x: StereoFrame) -> StereoFrame {
        let y = StereoFrame {
            left: self.b0 * x.left + self.z1.left,
            right: self.b0 * x.right + self.z1.right,
        };
        self.z1 = StereoFrame {
            left: self.b1 * x.left - self.a1 * y.left + self.z2.left,
            right: self.b1 * x.right - self.a1 * y.right + self.z2.right,
        };
        self.z2 = StereoFrame {
            left: self.b2 * x.left - self.a2 * y.left,
            right: self.b2 * x.right - self.a2 * y.right,
        };
        y
    }
}

// ── Delay send ────────────────────────────────────────────────────

struct DelayLine {
    buffer: Vec<StereoFrame>,
    write_pos: usize,
    delay_samples: usize,
    feedback: f32,
}

impl DelayLine {
    fn new(sample_rate: f32, config: DelayConfig) -> Self {
        let capacity = (MAX_DELAY_SECS * sample_rate) as usize + 1;
        let mut line = Self {
            buffer: vec![StereoFrame::zero(); capacity],
            write_pos: 0,
            delay_samples: 1,
            feedback: 0.0,
        };
        line.configure(sample_rate, config);
        line
    }

    fn configure(&mut self, sample_rate: f32, config: DelayConfig) {
        let samples = (config.time_seconds.clamp(0.0, MAX_DELAY_SECS) * sample_rate) as usize;
        self.delay_samples = samples.clamp(1, self.buffer.len() - 1);
        self.feedback = config.feedback.clamp(0.0, 0.95);
    }

    #[inline]
    fn process(&mut self, input: StereoFrame) -> StereoFrame {
        let len = self.buffer.len();
        let read_pos = (self.write_pos + len - self.delay_samples) % len;
        let delayed = self.buffer[read_pos];
        self.buffer[self.write_pos] = StereoFrame {
            left: input.left + delayed.left * self.feedback,
            right: input.right + delayed.right * self.feedback,
        };
        self.write_pos = (self.write_pos + 1) % len;
        delayed
    }
}

// ── Reverb send ───────────────────────────────────────────────────

// Freeverb tunings at 44.1 kHz, scaled to the engine rate. The right
// channel reads the same network offset by a small spread for width.
const COMB_TUNINGS: [usize; 4] = [1116, 1188, 1277, 1356];
const ALLPASS_TUNINGS: [usize; 2] = [556, 441];
const STEREO_SPREAD: usize = 23;
const COMB_FEEDBACK: f32 = 0.84;
const COMB_DAMP: f32 = 0.2;
const ALLPASS_FEEDBACK: f32 = 0.5;
const REVERB_INPUT_GAIN: f32 = 0.03;

struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl Comb {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.pos];
        // one-pole lowpass in the loop absorbs highs like a real room
        self.filter_state = output * (1.0 - COMB_DAMP) + self.filter_state * COMB_DAMP;
        self.buffer[self.pos] = input + self.filter_state * COMB_FEEDBACK;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = -ALLPASS_FEEDBACK * input + delayed;
        self.buffer[self.pos] = input + ALLPASS_FEEDBACK * output;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

struct ReverbChannel {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl ReverbChannel {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = sample_rate / 44_100.0;
        let scaled = |tuning: usize| ((tuning + spread) as f32 * scale) as usize;
        Self {
            combs: COMB_TUNINGS.iter().map(|&t| Comb::new(scaled(t))).collect(),
            allpasses: ALLPASS_TUNINGS
                .iter()
                .map(|&t| Allpass::new(scaled(t)))
                .collect(),
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }
}

struct Reverb {
    left: ReverbChannel,
    right: ReverbChannel,
}

impl Reverb {
    fn new(sample_rate: f32) -> Self {
        Self {
            left: ReverbChannel::new(sample_rate, 0),
            right: ReverbChannel::new(sample_rate, STEREO_SPREAD),
        }
    }

    #[inline]
    fn process(&mut self, input: StereoFrame) -> StereoFrame {
        let mono = (input.left + input.right) * 0.5 * REVERB_INPUT_GAIN;
        StereoFrame {
            left: self.left.process(mono),
            right: self.right.process(mono),
        }
    }
}

// ── The chain ─────────────────────────────────────────────────────

pub struct EffectChain {
    sample_rate: f32,
    filter: Biquad,
    delay: DelayLine,
    reverb: Reverb,
    delay_mix: f32,
    reverb_mix: f32,
}

impl EffectChain {
    pub fn new(
        sample_rate: f32,
        filter: FilterConfig,
        delay: DelayConfig,
        reverb: ReverbConfig,
    ) -> Self {
        Self {
            sample_rate,
            filter: Biquad::new(sample_rate, filter),
            delay: DelayLine::new(sample_rate, delay),
            reverb: Reverb::new(sample_rate),
            delay_mix: delay.mix.clamp(0.0, 1.0),
            reverb_mix: reverb.mix.clamp(0.0, 1.0),
        }
    }

    pub fn set_filter(&mut self, config: FilterConfig) {
        self.filter.configure(config);
    }

    pub fn set_delay(&mut self, config: DelayConfig) {
        self.delay.configure(self.sample_rate, config);
        self.delay_mix = config.mix.clamp(0.0, 1.0);
    }

    pub fn set_reverb(&mut self, config: ReverbConfig) {
        self.reverb_mix = config.mix.clamp(0.0, 1.0);
    }

    /// Mix one frame of the synth and drum buses down to the master output.
    #[inline]
    pub fn process(&mut self, synth: StereoFrame, drums: StereoFrame) -> StereoFrame {
        let filtered = self.filter.process(synth);

        let mut dry = drums;
        dry.add(filtered);

        let mut send = filtered;
        send.add(drums.scaled(DRUM_SEND));

        let delay_wet = self.delay.process(send);
        let reverb_wet = self.reverb.process(send);

        let mut out = dry;
        out.add(delay_wet.scaled(self.delay_mix));
        out.add(reverb_wet.scaled(self.reverb_mix));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_with(filter: FilterConfig, delay: DelayConfig, reverb: ReverbConfig) -> EffectChain {
        EffectChain::new(44_100.0, filter, delay, reverb)
    }

    fn sine(freq: f32, len: usize) -> Vec<StereoFrame> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 44_100.0;
                StereoFrame::splat((std::f32::consts::TAU * freq * t).sin())
            })
            .collect()
    }

    fn peak(frames: &[StereoFrame]) -> f32 {
        frames.iter().fold(0.0f32, |m, f| m.max(f.left.abs()))
    }

    #[test]
    fn lowpass_attenuates_high_frequencies() {
        let filter = FilterConfig {
            kind: FilterKind::Lowpass,
            cutoff_hz: 500.0,
            resonance_q: 0.707,
        };
        let mut chain = chain_with(filter, DelayConfig::default(), ReverbConfig::default());

        let high: Vec<_> = sine(8_000.0, 4096)
            .into_iter()
            .map(|f| chain.process(f, StereoFrame::zero()))
            .collect();

        let mut chain = chain_with(filter, DelayConfig::default(), ReverbConfig::default());
        let low: Vec<_> = sine(100.0, 4096)
            .into_iter()
            .map(|f| chain.process(f, StereoFrame::zero()))
            .collect();

        // skip the transient before measuring
        assert!(peak(&high[1024..]) < 0.1);
        assert!(peak(&low[1024..]) > 0.8);
    }

    #[test]
    fn highpass_attenuates_low_frequencies() {
        let filter = FilterConfig {
            kind: FilterKind::Highpass,
            cutoff_hz: 4_000.0,
            resonance_q: 0.707,
        };
        let mut chain = chain_with(filter, DelayConfig::default(), ReverbConfig::default());
        let low: Vec<_> = sine(100.0, 4096)
            .into_iter()
            .map(|f| chain.process(f, StereoFrame::zero()))
            .collect();
        assert!(peak(&low[1024..]) < 0.1);
    }

    #[test]
    fn delay_send_echoes_after_the_configured_time() {
        let delay = DelayConfig {
            time_seconds: 0.01, // 441 samples
            feedback: 0.0,
            mix: 1.0,
        };
        // wide-open filter so the impulse passes through the synth bus
        let filter = FilterConfig {
            kind: FilterKind::Lowpass,
            cutoff_hz: 20_000.0,
            resonance_q: 0.707,
        };
        let mut chain = chain_with(filter, delay, ReverbConfig::default());

        let mut out = Vec::new();
        for i in 0..1000 {
            let input = if i == 0 {
                StereoFrame::splat(1.0)
            } else {
                StereoFrame::zero()
            };
            out.push(chain.process(input, StereoFrame::zero()));
        }

        // energy well after the dry impulse, centered near sample 441
        let echo_peak = out[430..460].iter().fold(0.0f32, |m, f| m.max(f.left.abs()));
        assert!(echo_peak > 0.1, "expected an echo near 441 samples");
        let gap_peak = out[100..400].iter().fold(0.0f32, |m, f| m.max(f.left.abs()));
        assert!(gap_peak < 0.05, "expected silence between dry hit and echo");
    }

    #[test]
    fn drums_bypass_the_filter() {
        // brick-wall lowpass; drums must still come through dry
        let filter = FilterConfig {
            kind: FilterKind::Lowpass,
            cutoff_hz: 20.0,
            resonance_q: 0.707,
        };
        let mut chain = chain_with(filter, DelayConfig::default(), ReverbConfig::default());
        let out = chain.process(StereoFrame::zero(), StereoFrame::splat(0.8));
        assert!((out.left - 0.8).abs() < 0.01);
    }

    #[test]
    fn reconfiguring_keeps_delay_contents() {
        let delay = DelayConfig {
            time_seconds: 0.01,
            feedback: 0.0,
            mix: 1.0,
        };
        let filter = FilterConfig {
            kind: FilterKind::Lowpass,
            cutoff_hz: 20_000.0,
            resonance_q: 0.707,
        };
        let mut chain = chain_with(filter, delay, ReverbConfig::default());

        chain.process(StereoFrame::splat(1.0), StereoFrame::zero());
        // retune the filter mid-flight; the echo must still arrive
        chain.set_filter(FilterConfig {
            kind: FilterKind::Bandpass,
            cutoff_hz: 1_000.0,
            resonance_q: 2.0,
        });
        let mut heard_echo = false;
        for _ in 0..600 {
            let out = chain.process(StereoFrame::zero(), StereoFrame::zero());
            if out.left.abs() > 0.05 {
                heard_echo = true;
            }
        }
        assert!(heard_echo);
    }
}
