use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::AudioCommand;
use crate::error::{EngineError, Result};

mod effect;
mod engine;
mod frame;
mod sample_buffer;
mod voice;

pub use effect::EffectChain;
pub use engine::Engine;
pub use frame::{pan_gains, StereoFrame};
pub use sample_buffer::{next_sample_id, SampleBuffer, SampleId};

/// Read side of the engine's sample counter. Clonable and cheap, so the
/// scheduler thread can watch the clock without owning the stream.
#[derive(Clone)]
pub struct AudioClock {
    clock: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock {
    /// Seconds of audio rendered since the stream started. This is the
    /// clock every scheduled event is expressed in.
    pub fn secs(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }
}

/// Control-side handle to the running output stream. Dropping it shuts the
/// stream down; the render engine itself lives inside the callback.
pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    clock: AudioClock,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    /// Non-blocking; commands the callback has no room for are dropped
    /// rather than stalling the caller.
    pub fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            log::warn!("audio command queue full, dropping command");
        }
    }

    /// A second sender into the same command queue, for the scheduler
    /// thread (the stream itself is not Send).
    pub fn sender(&self) -> Sender<AudioCommand> {
        self.tx.clone()
    }

    pub fn clock(&self) -> AudioClock {
        self.clock.clone()
    }

    pub fn clock_secs(&self) -> f64 {
        self.clock.secs()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub fn start_audio() -> Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| EngineError::Audio("no default output device".into()))?;
    let config = device
        .default_output_config()
        .map_err(|e| EngineError::Audio(format!("no default output config: {e}")))?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    let clock = Arc::new(AtomicU64::new(0));

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let stream = build_output_stream_f32(
                &device,
                &config.into(),
                rx,
                Arc::clone(&clock),
                sample_rate,
                channels,
            )?;
            stream
                .play()
                .map_err(|e| EngineError::Audio(format!("failed to play output stream: {e}")))?;
            log::info!("audio output running at {sample_rate} Hz, {channels} channels");

            Ok(AudioHandle {
                tx,
                clock: AudioClock { clock, sample_rate },
                sample_rate,
                _output_stream: stream,
            })
        }
        other => Err(EngineError::Audio(format!(
            "unsupported sample format {other:?} (only f32 supported)"
        ))),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    clock: Arc<AtomicU64>,
    sample_rate: u32,
    channels: usize,
) -> Result<cpal::Stream> {
    let mut engine = Engine::new(sample_rate, clock);
    let mut frames: Vec<StereoFrame> = Vec::new();

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info| {
                while let Ok(cmd) = rx.try_recv() {
                    engine.handle_cmd(cmd);
                }

                let n_frames = data.len() / channels;
                frames.resize(n_frames, StereoFrame::zero());
                frames.fill(StereoFrame::zero());
                engine.render_block(&mut frames);

                for (frame, chunk) in frames.iter().zip(data.chunks_mut(channels)) {
                    chunk[0] = frame.left;
                    if channels > 1 {
                        chunk[1] = frame.right;
                    }
                    for extra in chunk.iter_mut().skip(2) {
                        *extra = 0.0;
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| EngineError::Audio(format!("failed to build output stream: {e}")))?;

    Ok(stream)
}
