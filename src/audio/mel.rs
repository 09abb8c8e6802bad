//! Mel-scaled triangular filterbank, log compression and the DCT used for
//! cepstral coefficients.

use super::fft::bin_frequency;

/// Smallest power fed into the log so silent bands stay finite.
const POWER_FLOOR: f32 = 1e-10;

pub struct MelFilterbank {
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelFilterbank {
    /// Triangular filters evenly spaced on the mel scale between `f_min` and
    /// `f_max` (clamped to Nyquist), area-normalised per band.
    pub fn new(sample_rate: u32, frame_length: usize, n_mels: usize, f_min: f32, f_max: f32) -> Self {
        let nyquist = sample_rate.max(1) as f32 * 0.5;
        let f_max = f_max.min(nyquist).max(f_min);
        let mel_min = hz_to_mel(f_min);
        let mel_max = hz_to_mel(f_max);
        let hz_points: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let bins = frame_length / 2 + 1;
        let filters = (0..n_mels)
            .map(|m| {
                let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
                let norm = 2.0 / (right - left).max(f32::EPSILON);
                (0..bins)
                    .filter_map(|bin| {
                        let freq = bin_frequency(bin, sample_rate, frame_length);
                        let rising = (freq - left) / (center - left).max(f32::EPSILON);
                        let falling = (right - freq) / (right - center).max(f32::EPSILON);
                        let weight = rising.min(falling);
                        (weight > 0.0).then_some((bin, weight * norm))
                    })
                    .collect()
            })
            .collect();

        Self { filters }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                filter
                    .iter()
                    .map(|&(bin, weight)| power.get(bin).copied().unwrap_or(0.0).max(0.0) * weight)
                    .sum::<f32>()
            })
            .collect()
    }

    /// Mel band energies in decibels (reference power 1.0).
    pub fn log_energies(&self, power: &[f32]) -> Vec<f32> {
        self.apply(power)
            .into_iter()
            .map(|energy| 10.0 * energy.max(POWER_FLOOR).log10())
            .collect()
    }
}

/// Clamps every value to at most `range_db` below the loudest value across
/// all frames.
pub fn clamp_dynamic_range(frames: &mut [Vec<f32>], range_db: f32) {
    let peak = frames
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    if !peak.is_finite() {
        return;
    }
    let floor = peak - range_db;
    for value in frames.iter_mut().flat_map(|frame| frame.iter_mut()) {
        *value = value.max(floor);
    }
}

/// Orthonormal DCT-II, first `count` coefficients.
pub fn dct_ii(values: &[f32], count: usize) -> Vec<f32> {
    let n = values.len().max(1) as f64;
    (0..count)
        .map(|k| {
            let sum: f64 = values
                .iter()
                .enumerate()
                .map(|(m, &v)| {
                    let angle = std::f64::consts::PI * k as f64 * (m as f64 + 0.5) / n;
                    v as f64 * angle.cos()
                })
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (sum * scale) as f32
        })
        .collect()
}

pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}
