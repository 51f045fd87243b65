// Commands crossing from the control side into the render callback.
//
// Every trigger carries an absolute time on the audio clock (seconds since
// the stream started), never a relative delay, so a whole lookahead batch
// lands sample-accurately no matter when the callback drains it.

pub use crate::audio::{SampleBuffer, SampleId};
use crate::pipeline::pattern::{DelayConfig, FilterConfig, ReverbConfig};
use crate::shared::OscillatorType;

#[derive(Clone, Copy, Debug)]
pub struct DrumTrigger {
    pub sample: SampleId,
    pub at: f64,
    pub gain: f32,
    pub pan: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct NoteOn {
    /// Piano-roll row, used to keep the row monophonic.
    pub note: usize,
    pub freq: f32,
    pub wave: OscillatorType,
    pub at: f64,
    pub gain: f32,
    pub pan: f32,
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't touch the filesystem, so buffers are loaded on the
    // control side and registered before anything can trigger them.
    RegisterSample { id: SampleId, buffer: SampleBuffer },

    TriggerDrum(DrumTrigger),
    NoteOn(NoteOn),
    NoteOff { note: usize, at: f64 },

    // Preview voices live outside the sequenced timeline: they start now,
    // stop on demand, and survive transport stop/start.
    PreviewStart { sample: SampleId, gain: f32 },
    PreviewStop,

    /// Drop every scheduled-but-unstarted voice and fade out whatever is
    /// sounding. Nothing queued before this command fires after it.
    CancelScheduled,

    SetFilter(FilterConfig),
    SetDelay(DelayConfig),
    SetReverb(ReverbConfig),
}
