use serde::{Deserialize, Serialize};

use super::{FeatureAnalyzer, FrameGrid, Waveform};

/// Root-mean-square amplitude per frame. Never negative.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyEnvelope {
    pub values: Vec<f32>,
}

impl EnergyEnvelope {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn peak(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    /// Standard deviation over mean; 0 for a silent envelope.
    pub fn coefficient_of_variation(&self) -> f32 {
        let mean = self.mean();
        if mean <= 0.0 {
            return 0.0;
        }
        let variance = self
            .values
            .iter()
            .map(|&v| (v - mean).powi(2))
            .sum::<f32>()
            / self.values.len() as f32;
        variance.sqrt() / mean
    }
}

pub struct EnergyAnalyzer {
    grid: FrameGrid,
}

impl EnergyAnalyzer {
    pub fn new(grid: FrameGrid) -> Self {
        Self { grid }
    }

    pub fn envelope(&self, waveform: &Waveform) -> EnergyEnvelope {
        let samples = waveform.samples();
        let values = (0..self.grid.frame_count(samples.len()))
            .map(|index| frame_rms(self.grid.frame(samples, index), self.grid.frame_length))
            .collect();
        EnergyEnvelope { values }
    }
}

impl FeatureAnalyzer for EnergyAnalyzer {
    type Output = EnergyEnvelope;

    fn analyze(&self, waveform: &Waveform) -> EnergyEnvelope {
        self.envelope(waveform)
    }

    fn analyzer_type(&self) -> &'static str {
        "energy"
    }
}

/// RMS over a full frame: missing tail samples count as zeros.
fn frame_rms(frame: &[f32], frame_length: usize) -> f32 {
    let sum_sq: f64 = frame
        .iter()
        .filter(|s| s.is_finite())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    (sum_sq / frame_length.max(1) as f64).sqrt() as f32
}
