//! Headless step-sequencer engine: a 4×16 drum grid and a 12×16 bass synth
//! piano roll driven by a lookahead clock, mixed through a shared
//! filter/delay/reverb chain, and persisted as a versioned JSON document.
//!
//! The [`Sequencer`] facade is the whole public surface a UI needs: start
//! it, mutate the pattern, poll transport events for highlighting, and
//! export/import documents. The render engine underneath is also usable
//! offline (see [`audio::Engine`]) for tests and non-realtime rendering.

pub mod audio;
pub mod audio_api;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod sequencer;
pub mod shared;
pub mod transport;

pub use error::{EngineError, Result};
pub use pipeline::pattern::{
    DelayConfig, FilterConfig, Pattern, ReverbConfig, SynthConfig, TrackConfig,
};
pub use pipeline::persistence::Document;
pub use sequencer::Sequencer;
pub use shared::{FilterKind, NoteStatus, OscillatorType, NUM_NOTES, NUM_STEPS, NUM_TRACKS};
pub use transport::TransportEvent;
