use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::FrameGrid;
use crate::error::ConfigError;

/// Tuning for every stage of the analysis pipeline.
///
/// All fields have defaults, so a config file only needs to name the values
/// it overrides:
///
/// ```json
/// { "max_duration_seconds": 15.0, "frame_grid": { "frame_length": 4096, "hop_length": 2048 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Only the leading window of this many seconds is analyzed.
    pub max_duration_seconds: f32,
    /// Rate the decoded clip is resampled to. `None` keeps the native rate.
    pub target_sample_rate: Option<u32>,
    /// Shared framing for energy, onset, spectrogram and cepstral frames.
    pub frame_grid: FrameGrid,
    /// Mel bands feeding both the onset envelope and the cepstral fingerprint.
    pub n_mels: usize,
    /// Lowest decibel value reported by the spectrogram (relative to peak).
    pub db_floor: f32,
    pub tempo: TempoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub min_bpm: f32,
    pub max_bpm: f32,
    /// Centre of the tempo prior; periodicity peaks far from it are damped.
    pub start_bpm: f32,
    /// How strongly the beat aligner penalises deviation from the period.
    pub tightness: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_duration_seconds: 30.0,
            target_sample_rate: Some(22_050),
            frame_grid: FrameGrid::default(),
            n_mels: 128,
            db_floor: -80.0,
            tempo: TempoConfig::default(),
        }
    }
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: 60.0,
            max_bpm: 240.0,
            start_bpm: 120.0,
            tightness: 100.0,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_duration_seconds.is_finite() && self.max_duration_seconds > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_duration_seconds must be positive, got {}",
                self.max_duration_seconds
            )));
        }
        if self.target_sample_rate == Some(0) {
            return Err(ConfigError::Invalid("target_sample_rate must be positive".into()));
        }
        let grid = &self.frame_grid;
        if grid.frame_length < 2 || grid.hop_length == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame grid {}/{} is too small",
                grid.frame_length, grid.hop_length
            )));
        }
        if grid.hop_length > grid.frame_length {
            return Err(ConfigError::Invalid(format!(
                "hop length {} exceeds frame length {}",
                grid.hop_length, grid.frame_length
            )));
        }
        if self.n_mels == 0 {
            return Err(ConfigError::Invalid("n_mels must be at least 1".into()));
        }
        if !(self.db_floor.is_finite() && self.db_floor < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "db_floor must be negative, got {}",
                self.db_floor
            )));
        }
        let tempo = &self.tempo;
        if !(tempo.min_bpm > 0.0 && tempo.min_bpm < tempo.max_bpm) {
            return Err(ConfigError::Invalid(format!(
                "tempo range {}..{} is empty",
                tempo.min_bpm, tempo.max_bpm
            )));
        }
        if !(tempo.start_bpm > 0.0 && tempo.tightness > 0.0) {
            return Err(ConfigError::Invalid(
                "start_bpm and tightness must be positive".into(),
            ));
        }
        Ok(())
    }
}
