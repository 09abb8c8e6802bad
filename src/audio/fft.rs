use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::FrameGrid;

/// Short-time Fourier transform over a [`FrameGrid`].
///
/// Each frame is Hann-windowed and zero-padded to `frame_length` before the
/// forward FFT; only the non-negative frequency half is kept.
pub struct Stft {
    frame_length: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl Stft {
    pub fn new(frame_length: usize) -> Self {
        let frame_length = frame_length.max(1);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_length);

        Self {
            frame_length,
            fft,
            window: hann_window(frame_length),
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn num_bins(&self) -> usize {
        self.frame_length / 2 + 1
    }

    /// Magnitude spectrum of every frame on the grid, frame-major.
    pub fn magnitudes(&self, samples: &[f32], grid: &FrameGrid) -> Vec<Vec<f32>> {
        let mut buffer = vec![Complex::new(0.0, 0.0); self.frame_length];
        (0..grid.frame_count(samples.len()))
            .map(|index| self.magnitude_frame(grid.frame(samples, index), &mut buffer))
            .collect()
    }

    /// Power (squared magnitude) spectrum of every frame, frame-major.
    pub fn power(&self, samples: &[f32], grid: &FrameGrid) -> Vec<Vec<f32>> {
        let mut frames = self.magnitudes(samples, grid);
        for frame in &mut frames {
            for value in frame.iter_mut() {
                *value *= *value;
            }
        }
        frames
    }

    fn magnitude_frame(&self, frame: &[f32], buffer: &mut [Complex<f32>]) -> Vec<f32> {
        for (i, cell) in buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().filter(|s| s.is_finite()).unwrap_or(0.0);
            *cell = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(buffer);

        buffer[..self.num_bins()].iter().map(|c| c.norm()).collect()
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Centre frequency in Hz of an FFT bin.
pub fn bin_frequency(bin: usize, sample_rate: u32, frame_length: usize) -> f32 {
    bin as f32 * sample_rate as f32 / frame_length.max(1) as f32
}
