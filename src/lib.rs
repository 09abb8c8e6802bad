//! Clip-level audio analysis: energy envelope, tempo and beats, spectrogram,
//! timbral fingerprint and a coarse mood label.

pub mod audio;
pub mod config;
pub mod error;
pub mod mood;
pub mod pipeline;

pub use audio::{FrameGrid, Waveform};
pub use config::AnalysisConfig;
pub use error::{ConfigError, DecodeError};
pub use mood::{Mood, MoodClassifier};
pub use pipeline::{analyze, Analysis, AnalysisPipeline, AnalysisResult};
