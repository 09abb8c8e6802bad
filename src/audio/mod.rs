pub mod analysis_interface;
pub mod beat_detector;
pub mod decoder;
pub mod energy;
pub mod fft;
pub mod mel;
pub mod spectral;

pub use analysis_interface::FeatureAnalyzer;
pub use beat_detector::{BeatTrack, BeatTracker};
pub use decoder::{AudioDecoder, DecodeOptions};
pub use energy::{EnergyAnalyzer, EnergyEnvelope};
pub use spectral::{SpectralAnalysis, SpectralAnalyzer, Spectrogram, TimbralFingerprint};

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Decoded mono clip. Immutable once built; analyzers only ever borrow it.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::NoSampleRate);
        }
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Fixed-size overlapping analysis windows shared by every per-frame
/// descriptor, so frame `i` means the same instant in all of them.
///
/// A clip no longer than one frame yields a single frame. Otherwise the grid
/// keeps stepping by `hop_length` until a frame reaches the last sample; the
/// final frame is zero-padded rather than dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameGrid {
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for FrameGrid {
    fn default() -> Self {
        // 50% overlap
        Self {
            frame_length: 2048,
            hop_length: 1024,
        }
    }
}

impl FrameGrid {
    pub fn new(frame_length: usize, hop_length: usize) -> Self {
        Self {
            frame_length: frame_length.max(1),
            hop_length: hop_length.max(1),
        }
    }

    pub fn frame_count(&self, num_samples: usize) -> usize {
        if num_samples == 0 {
            return 0;
        }
        if num_samples <= self.frame_length {
            return 1;
        }
        1 + (num_samples - self.frame_length).div_ceil(self.hop_length)
    }

    /// Samples covered by frame `index`. Shorter than `frame_length` at the
    /// tail; callers zero-pad.
    pub fn frame<'a>(&self, samples: &'a [f32], index: usize) -> &'a [f32] {
        let start = (index * self.hop_length).min(samples.len());
        let end = (start + self.frame_length).min(samples.len());
        &samples[start..end]
    }

    pub fn frame_to_seconds(&self, index: usize, sample_rate: u32) -> f32 {
        (index * self.hop_length) as f32 / sample_rate.max(1) as f32
    }

    pub fn frames_to_seconds(&self, indices: &[usize], sample_rate: u32) -> Vec<f32> {
        indices
            .iter()
            .map(|&index| self.frame_to_seconds(index, sample_rate))
            .collect()
    }

    /// Analysis frames per second of audio.
    pub fn frame_rate(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.hop_length as f32
    }
}
