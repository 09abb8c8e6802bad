use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::fft::{bin_frequency, Stft};
use super::mel::{clamp_dynamic_range, dct_ii, MelFilterbank};
use super::{FeatureAnalyzer, FrameGrid, Waveform};

/// Number of cepstral coefficients in a fingerprint.
pub const MFCC_COUNT: usize = 20;

/// Magnitudes below this are treated as silence when converting to decibels.
const AMPLITUDE_FLOOR: f32 = 1e-5;

/// Dynamic range kept in the log-mel energies before the DCT.
const LOG_MEL_RANGE_DB: f32 = 80.0;

/// Per-coefficient mean of the clip's cepstral coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimbralFingerprint(pub [f32; MFCC_COUNT]);

impl TimbralFingerprint {
    pub fn coefficients(&self) -> &[f32; MFCC_COUNT] {
        &self.0
    }

    /// Leading three coefficients, the space the mood model lives in.
    pub fn projection(&self) -> [f32; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

impl Default for TimbralFingerprint {
    fn default() -> Self {
        Self([0.0; MFCC_COUNT])
    }
}

/// Magnitude surface indexed `[frequency_bin, frame]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    magnitudes: Array2<f32>,
    sample_rate: u32,
    grid: FrameGrid,
    db_floor: f32,
}

impl Spectrogram {
    pub fn magnitudes(&self) -> &Array2<f32> {
        &self.magnitudes
    }

    pub fn num_bins(&self) -> usize {
        self.magnitudes.nrows()
    }

    pub fn num_frames(&self) -> usize {
        self.magnitudes.ncols()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn grid(&self) -> FrameGrid {
        self.grid
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin_frequency(bin, self.sample_rate, self.grid.frame_length)
    }

    pub fn peak_magnitude(&self) -> f32 {
        self.magnitudes.iter().copied().fold(0.0, f32::max)
    }

    /// Frequency bin holding the loudest cell across all frames.
    pub fn peak_bin(&self) -> Option<usize> {
        let ((bin, _), magnitude) = self
            .magnitudes
            .indexed_iter()
            .fold(((0, 0), 0.0_f32), |best, (index, &m)| {
                if m > best.1 {
                    (index, m)
                } else {
                    best
                }
            });
        (magnitude > 0.0).then_some(bin)
    }

    /// Decibels relative to the clip's peak magnitude, so the loudest cell is
    /// 0 dB and nothing drops below the configured floor. A silent clip is
    /// the floor everywhere.
    pub fn to_decibels(&self) -> Array2<f32> {
        let peak = self.peak_magnitude();
        if peak <= AMPLITUDE_FLOOR {
            return Array2::from_elem(self.magnitudes.raw_dim(), self.db_floor);
        }
        let reference = 20.0 * peak.log10();
        self.magnitudes.mapv(|m| {
            let db = 20.0 * m.max(AMPLITUDE_FLOOR).log10() - reference;
            db.max(self.db_floor)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectralAnalysis {
    pub spectrogram: Spectrogram,
    pub fingerprint: TimbralFingerprint,
}

pub struct SpectralAnalyzer {
    grid: FrameGrid,
    stft: Stft,
    n_mels: usize,
    db_floor: f32,
}

impl SpectralAnalyzer {
    pub fn new(grid: FrameGrid, n_mels: usize, db_floor: f32) -> Self {
        Self {
            grid,
            stft: Stft::new(grid.frame_length),
            n_mels: n_mels.max(1),
            db_floor,
        }
    }

    pub fn spectral_analysis(&self, waveform: &Waveform) -> SpectralAnalysis {
        let frames = self.stft.magnitudes(waveform.samples(), &self.grid);
        let fingerprint = self.fingerprint_from_magnitudes(&frames, waveform.sample_rate());

        let bins = self.stft.num_bins();
        let magnitudes = Array2::from_shape_fn((bins, frames.len()), |(bin, frame)| frames[frame][bin]);

        SpectralAnalysis {
            spectrogram: Spectrogram {
                magnitudes,
                sample_rate: waveform.sample_rate(),
                grid: self.grid,
                db_floor: self.db_floor,
            },
            fingerprint,
        }
    }

    pub fn fingerprint(&self, waveform: &Waveform) -> TimbralFingerprint {
        let frames = self.stft.magnitudes(waveform.samples(), &self.grid);
        self.fingerprint_from_magnitudes(&frames, waveform.sample_rate())
    }

    fn fingerprint_from_magnitudes(&self, frames: &[Vec<f32>], sample_rate: u32) -> TimbralFingerprint {
        if frames.is_empty() {
            return TimbralFingerprint::default();
        }
        let bank = MelFilterbank::new(
            sample_rate,
            self.grid.frame_length,
            self.n_mels,
            0.0,
            sample_rate as f32 * 0.5,
        );
        let mut log_mel: Vec<Vec<f32>> = frames
            .iter()
            .map(|frame| {
                let power: Vec<f32> = frame.iter().map(|m| m * m).collect();
                bank.log_energies(&power)
            })
            .collect();
        clamp_dynamic_range(&mut log_mel, LOG_MEL_RANGE_DB);

        let mut sums = [0.0_f64; MFCC_COUNT];
        for energies in &log_mel {
            for (sum, c) in sums.iter_mut().zip(dct_ii(energies, MFCC_COUNT)) {
                *sum += c as f64;
            }
        }
        let count = log_mel.len() as f64;
        let mut mean = [0.0_f32; MFCC_COUNT];
        for (m, sum) in mean.iter_mut().zip(sums) {
            *m = (sum / count) as f32;
        }
        TimbralFingerprint(mean)
    }
}

impl FeatureAnalyzer for SpectralAnalyzer {
    type Output = SpectralAnalysis;

    fn analyze(&self, waveform: &Waveform) -> SpectralAnalysis {
        self.spectral_analysis(waveform)
    }

    fn analyzer_type(&self) -> &'static str {
        "spectral"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Waveform {
        let len = (sample_rate as f32 * seconds) as usize;
        let samples = (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        Waveform::new(samples, sample_rate).unwrap()
    }

    fn analyzer() -> SpectralAnalyzer {
        SpectralAnalyzer::new(FrameGrid::default(), 128, -80.0)
    }

    #[test]
    fn spectrogram_shape_matches_grid() {
        let wf = sine(440.0, 22_050, 1.0);
        let analysis = analyzer().spectral_analysis(&wf);
        let grid = FrameGrid::default();
        assert_eq!(analysis.spectrogram.num_bins(), grid.frame_length / 2 + 1);
        assert_eq!(analysis.spectrogram.num_frames(), grid.frame_count(wf.len()));
        assert!(analysis.spectrogram.magnitudes().iter().all(|&m| m >= 0.0));
    }

    #[test]
    fn tone_peak_lands_on_nearest_bin() {
        let wf = sine(440.0, 22_050, 1.0);
        let spec = analyzer().spectral_analysis(&wf).spectrogram;
        let expected = (440.0 * 2048.0 / 22_050.0_f32).round() as usize;
        assert_eq!(spec.peak_bin(), Some(expected));
        assert!((spec.bin_frequency(expected) - 440.0).abs() < 22_050.0 / 2048.0);
    }

    #[test]
    fn decibels_are_peak_referenced_and_floored() {
        let wf = sine(1000.0, 22_050, 0.5);
        let db = analyzer().spectral_analysis(&wf).spectrogram.to_decibels();
        let max = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min = db.iter().copied().fold(f32::INFINITY, f32::min);
        assert!(max.abs() < 1e-4);
        assert!(min >= -80.0);
        assert!(db.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn silent_clip_is_floor_everywhere() {
        let wf = Waveform::new(vec![0.0; 22_050], 22_050).unwrap();
        let analysis = analyzer().spectral_analysis(&wf);
        assert_eq!(analysis.spectrogram.peak_bin(), None);
        assert!(analysis.spectrogram.to_decibels().iter().all(|&v| v == -80.0));
        assert!(analysis.fingerprint.0.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let wf = sine(330.0, 22_050, 0.75);
        let a = analyzer().fingerprint(&wf);
        let b = analyzer().fingerprint(&wf);
        assert_eq!(a, b);
        assert_eq!(a.coefficients().len(), MFCC_COUNT);
        assert_eq!(a.projection(), [a.0[0], a.0[1], a.0[2]]);
    }

    #[test]
    fn short_clip_still_yields_full_fingerprint() {
        let wf = Waveform::new(vec![0.1, -0.2, 0.3], 22_050).unwrap();
        let analysis = analyzer().spectral_analysis(&wf);
        assert_eq!(analysis.spectrogram.num_frames(), 1);
        assert_eq!(analysis.fingerprint.0.len(), MFCC_COUNT);
    }
}
