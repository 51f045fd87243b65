use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use super::frame::StereoFrame;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Handle for a buffer registered with the render engine. Ids are handed out
/// from an atomic counter so the loader can mint them from any thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleId(pub u64);

pub fn next_sample_id() -> SampleId {
    SampleId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// An immutable stereo sample, fully decoded and resampled to the engine
/// rate before it gets anywhere near the audio callback.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>,
}

impl SampleBuffer {
    pub fn from_frames(data: Vec<StereoFrame>) -> Self {
        Self { data }
    }

    /// Render a mono signal into a stereo buffer.
    pub fn from_mono(samples: &[f32]) -> Self {
        Self {
            data: samples.iter().map(|&s| StereoFrame::splat(s)).collect(),
        }
    }

    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        self.data.len() as f32 / sample_rate as f32
    }

    /// Decode a WAV file and conform it to the engine's sample rate.
    pub fn load_wav(path: &Path, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i32 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let mut frames: Vec<StereoFrame> = match spec.channels {
            1 => samples.into_iter().map(StereoFrame::splat).collect(),
            2 => samples
                .chunks_exact(2)
                .map(|c| StereoFrame { left: c[0], right: c[1] })
                .collect(),
            n => anyhow::bail!("unsupported channel count: {n}"),
        };

        if spec.sample_rate != target_rate {
            frames = resample_linear(&frames, spec.sample_rate, target_rate);
        }

        Ok(Self { data: frames })
    }
}

// Linear interpolation is plenty for one-shot drum samples.
fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || frames.is_empty() {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        if idx >= frames.len().saturating_sub(1) {
            out.push(*frames.last().unwrap());
        } else {
            let a = frames[idx];
            let b = frames[idx + 1];
            out.push(StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = next_sample_id();
        let b = next_sample_id();
        assert_ne!(a, b);
    }

    #[test]
    fn resampling_scales_length() {
        let frames = vec![StereoFrame::splat(0.5); 1000];
        let up = resample_linear(&frames, 22_050, 44_100);
        assert_eq!(up.len(), 2000);
        let down = resample_linear(&frames, 44_100, 22_050);
        assert_eq!(down.len(), 500);
    }

    #[test]
    fn mono_buffers_duplicate_into_both_channels() {
        let buf = SampleBuffer::from_mono(&[0.25, -0.5]);
        assert_eq!(buf.data[1].left, buf.data[1].right);
        assert_eq!(buf.data[0].left, 0.25);
    }
}
