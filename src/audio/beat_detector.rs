use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::fft::Stft;
use super::mel::{clamp_dynamic_range, MelFilterbank};
use super::{FeatureAnalyzer, FrameGrid, Waveform};
use crate::config::TempoConfig;

/// Below this peak onset strength a clip is treated as silent.
const SILENT_ONSET: f32 = 1e-6;

/// Peak onset must stand this far (mean dB flux) above the median frame,
/// otherwise the envelope is leakage ripple from a steady sound.
const MIN_ONSET_CONTRAST: f32 = 1.0;

/// Dynamic range of the log-mel frames the onset envelope is computed from.
const ONSET_RANGE_DB: f32 = 80.0;

/// Global tempo plus the frames where beats fall.
///
/// `beat_frames` is strictly increasing and every entry is a valid frame
/// index. A tempo of 0 with no beats is the degenerate result for silent or
/// very short clips.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BeatTrack {
    pub tempo_bpm: f32,
    pub beat_frames: Vec<usize>,
}

impl BeatTrack {
    pub fn degenerate() -> Self {
        Self::default()
    }

    pub fn is_degenerate(&self) -> bool {
        self.tempo_bpm == 0.0 && self.beat_frames.is_empty()
    }
}

pub struct BeatTracker {
    grid: FrameGrid,
    stft: Stft,
    n_mels: usize,
    tempo: TempoConfig,
}

impl BeatTracker {
    pub fn new(grid: FrameGrid, n_mels: usize, tempo: TempoConfig) -> Self {
        Self {
            grid,
            stft: Stft::new(grid.frame_length),
            n_mels: n_mels.max(1),
            tempo,
        }
    }

    pub fn track(&self, waveform: &Waveform) -> BeatTrack {
        let onset = self.onset_strength(waveform);
        let peak = onset.iter().copied().fold(0.0, f32::max);
        if peak <= SILENT_ONSET {
            warn!("No onset activity in {:.2}s clip; returning empty beat track", waveform.duration_seconds());
            return BeatTrack::degenerate();
        }
        let typical = median(&onset);
        if peak - typical < MIN_ONSET_CONTRAST {
            warn!(
                "Onset peak {:.3} barely above median {:.3}; returning empty beat track",
                peak, typical
            );
            return BeatTrack::degenerate();
        }

        let frame_rate = self.grid.frame_rate(waveform.sample_rate());
        let Some(tempo_bpm) = self.estimate_tempo(&onset, frame_rate) else {
            warn!(
                "Could not estimate tempo from {} onset frames; returning empty beat track",
                onset.len()
            );
            return BeatTrack::degenerate();
        };

        let beat_frames = self.align_beats(&onset, tempo_bpm, frame_rate);
        debug!("Tempo {:.1} BPM, {} beats", tempo_bpm, beat_frames.len());

        BeatTrack {
            tempo_bpm,
            beat_frames,
        }
    }

    /// Positive log-mel flux between consecutive frames, averaged over bands.
    /// One value per frame; the first frame has no predecessor and is 0.
    /// Zero-padded tail frames are also 0: the clip ending inside the window
    /// is not an onset.
    pub fn onset_strength(&self, waveform: &Waveform) -> Vec<f32> {
        let power = self.stft.power(waveform.samples(), &self.grid);
        let bank = MelFilterbank::new(
            waveform.sample_rate(),
            self.grid.frame_length,
            self.n_mels,
            0.0,
            waveform.sample_rate() as f32 * 0.5,
        );
        let mut log_mel: Vec<Vec<f32>> = power.iter().map(|frame| bank.log_energies(frame)).collect();
        clamp_dynamic_range(&mut log_mel, ONSET_RANGE_DB);

        let complete = complete_frames(&self.grid, waveform.len());
        let mut onset = Vec::with_capacity(log_mel.len());
        for (t, frame) in log_mel.iter().enumerate() {
            if t == 0 || t >= complete {
                onset.push(0.0);
                continue;
            }
            let previous = &log_mel[t - 1];
            let flux: f32 = frame
                .iter()
                .zip(previous)
                .map(|(&now, &before)| (now - before).max(0.0))
                .sum();
            onset.push(flux / frame.len().max(1) as f32);
        }
        onset
    }

    /// Periodicity of the onset envelope within the configured tempo range.
    ///
    /// Autocorrelation at each candidate lag is weighted by a log-normal
    /// prior around `start_bpm` (one octave wide) and the best lag is refined
    /// by parabolic interpolation. `None` when the envelope is too short to
    /// hold two of the slowest periods or shows no positive periodicity.
    pub fn estimate_tempo(&self, onset: &[f32], frame_rate: f32) -> Option<f32> {
        let shortest = 60.0 * frame_rate / self.tempo.max_bpm;
        let longest = 60.0 * frame_rate / self.tempo.min_bpm;
        if !(shortest.is_finite() && longest.is_finite() && shortest > 0.0 && longest >= shortest) {
            warn!(
                "Tempo range {}..{} BPM at {:.2} frames/s gives no usable lags",
                self.tempo.min_bpm, self.tempo.max_bpm, frame_rate
            );
            return None;
        }
        if 2.0 * longest.ceil() > onset.len() as f32 {
            return None;
        }
        let min_lag = (shortest.floor() as usize).max(1);
        let max_lag = (longest.ceil() as usize).max(min_lag + 1);
        if onset.len() < 2 * max_lag {
            return None;
        }

        let mean = onset.iter().sum::<f32>() / onset.len() as f32;
        let centered: Vec<f32> = onset.iter().map(|&v| v - mean).collect();
        let energy: f32 = centered.iter().map(|v| v * v).sum();
        if energy <= 0.0 {
            return None;
        }
        let autocorr = |lag: usize| -> f32 {
            centered[..centered.len() - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum::<f32>()
                / energy
        };
        let correlations: Vec<f32> = (min_lag - 1..=max_lag + 1).map(autocorr).collect();
        let r = |lag: usize| correlations[lag + 1 - min_lag];

        let mut best: Option<(usize, f32)> = None;
        for lag in min_lag..=max_lag {
            let bpm = 60.0 * frame_rate / lag as f32;
            let score = r(lag) * self.tempo_prior(bpm);
            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((lag, score));
            }
        }
        let (lag, _) = best?;

        let (before, at, after) = (r(lag - 1), r(lag), r(lag + 1));
        let curvature = before - 2.0 * at + after;
        let offset = if curvature < 0.0 {
            (0.5 * (before - after) / curvature).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        let bpm = 60.0 * frame_rate / (lag as f32 + offset);
        Some(bpm.clamp(self.tempo.min_bpm, self.tempo.max_bpm))
    }

    fn tempo_prior(&self, bpm: f32) -> f32 {
        let octaves = (bpm / self.tempo.start_bpm).log2();
        (-0.5 * octaves * octaves).exp()
    }

    /// Dynamic-programming beat alignment.
    ///
    /// Each frame's cumulative score is its smoothed onset strength plus the
    /// best predecessor's score, where predecessors between half and twice the
    /// beat period back pay `tightness * ln(gap / period)^2`. The last beat is
    /// the final cumulative-score peak above half the median peak; beats are
    /// recovered by backtracking and weak beats at either end are trimmed.
    pub fn align_beats(&self, onset: &[f32], tempo_bpm: f32, frame_rate: f32) -> Vec<usize> {
        if onset.is_empty() || tempo_bpm <= 0.0 {
            return Vec::new();
        }
        let period = 60.0 * frame_rate / tempo_bpm;
        if !(period.is_finite() && period >= 1.0) {
            return Vec::new();
        }

        let std = std_dev(onset);
        if std <= 0.0 {
            return Vec::new();
        }
        let normalized: Vec<f32> = onset.iter().map(|v| v / std).collect();
        let local = smooth_onsets(&normalized, period);

        let min_gap = ((period / 2.0).round() as usize).max(1);
        let max_gap = ((2.0 * period).round() as usize).max(min_gap);

        let start_threshold = 0.01 * local.iter().copied().fold(0.0, f32::max);
        let mut cumulative = vec![0.0_f32; local.len()];
        let mut backlink: Vec<Option<usize>> = vec![None; local.len()];
        let mut started = false;
        for t in 0..local.len() {
            cumulative[t] = local[t];
            if !started && local[t] < start_threshold {
                continue;
            }
            started = true;
            if t < min_gap {
                continue;
            }
            let earliest = t.saturating_sub(max_gap);
            let mut best: Option<(usize, f32)> = None;
            for prev in earliest..=t - min_gap {
                let gap = (t - prev) as f32;
                let cost = -self.tempo.tightness * (gap / period).ln().powi(2);
                let score = cumulative[prev] + cost;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((prev, score));
                }
            }
            if let Some((prev, score)) = best {
                cumulative[t] += score;
                backlink[t] = Some(prev);
            }
        }

        let Some(last) = last_beat(&cumulative) else {
            return Vec::new();
        };
        let mut beats = vec![last];
        let mut cursor = last;
        while let Some(prev) = backlink[cursor] {
            beats.push(prev);
            cursor = prev;
        }
        beats.reverse();

        trim_weak_beats(&mut beats, &local);
        beats
    }
}

impl FeatureAnalyzer for BeatTracker {
    type Output = BeatTrack;

    fn analyze(&self, waveform: &Waveform) -> BeatTrack {
        self.track(waveform)
    }

    fn analyzer_type(&self) -> &'static str {
        "beat"
    }
}

/// Frames that lie entirely inside the clip. A clip shorter than one frame
/// counts its single frame as complete.
fn complete_frames(grid: &FrameGrid, num_samples: usize) -> usize {
    if num_samples <= grid.frame_length {
        return grid.frame_count(num_samples);
    }
    (num_samples - grid.frame_length) / grid.hop_length + 1
}

fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    sorted[sorted.len() / 2]
}

fn std_dev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let sum_sq: f32 = values.iter().map(|&v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f32).sqrt()
}

/// Convolves with a Gaussian whose width scales with the beat period.
fn smooth_onsets(onset: &[f32], period: f32) -> Vec<f32> {
    let half = period.round().max(1.0) as isize;
    let kernel: Vec<f32> = (-half..=half)
        .map(|k| {
            let x = k as f32 * 32.0 / period;
            (-0.5 * x * x).exp()
        })
        .collect();

    (0..onset.len() as isize)
        .map(|t| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(i, &w)| {
                    let source = t + i as isize - half;
                    (source >= 0 && (source as usize) < onset.len()).then(|| onset[source as usize] * w)
                })
                .sum::<f32>()
        })
        .collect()
}

fn last_beat(cumulative: &[f32]) -> Option<usize> {
    let n = cumulative.len();
    if n == 0 {
        return None;
    }
    let is_peak = |t: usize| {
        let left = t == 0 || cumulative[t] > cumulative[t - 1];
        let right = t + 1 == n || cumulative[t] >= cumulative[t + 1];
        left && right
    };
    let mut peaks: Vec<f32> = (0..n).filter(|&t| is_peak(t)).map(|t| cumulative[t]).collect();
    if peaks.is_empty() {
        return (0..n).max_by(|&a, &b| cumulative[a].total_cmp(&cumulative[b]));
    }
    peaks.sort_by(f32::total_cmp);
    let median = peaks[peaks.len() / 2];
    (0..n)
        .rev()
        .find(|&t| is_peak(t) && cumulative[t] >= 0.5 * median)
}

/// Drops leading and trailing beats whose smoothed onset is below half the
/// RMS of the smoothed onset envelope.
fn trim_weak_beats(beats: &mut Vec<usize>, local: &[f32]) {
    if beats.is_empty() || local.is_empty() {
        return;
    }
    let rms = (local.iter().map(|v| v * v).sum::<f32>() / local.len() as f32).sqrt();
    let threshold = 0.5 * rms;
    let strong = |&beat: &usize| local[beat] > threshold;
    let Some(first) = beats.iter().position(strong) else {
        beats.clear();
        return;
    };
    let last = beats.iter().rposition(strong).unwrap_or(first);
    beats.truncate(last + 1);
    beats.drain(..first);
}
