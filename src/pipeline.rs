use anyhow::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

use crate::audio::{
    AudioDecoder, BeatTrack, BeatTracker, DecodeOptions, EnergyAnalyzer, EnergyEnvelope,
    FeatureAnalyzer, SpectralAnalysis, SpectralAnalyzer, Spectrogram, TimbralFingerprint, Waveform,
};
use crate::config::AnalysisConfig;
use crate::error::{ConfigError, DecodeError};
use crate::mood::{Mood, MoodClassifier};

/// Everything derived from one clip, in a form that serializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sample_rate: u32,
    /// Hop of the shared frame grid; frame `i` starts at `i * hop_length` samples.
    pub hop_length: usize,
    pub duration_seconds: f32,

    /// Per-frame RMS
    pub energy_envelope: Vec<f32>,

    /// 0 when no tempo could be estimated
    pub tempo_bpm: f32,
    pub beat_frame_indices: Vec<usize>,
    pub beat_times_seconds: Vec<f32>,

    pub timbral_fingerprint: TimbralFingerprint,
    pub mood_label: Mood,
    pub mood_color: String,
}

impl AnalysisResult {
    pub fn save_json<P: AsRef<Path>>(&self, output_path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(output_path, json)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let json = std::fs::read_to_string(input_path)?;
        let result: AnalysisResult = serde_json::from_str(&json)?;
        Ok(result)
    }
}

/// Pipeline output plus the decoded clip and magnitude grid for rendering.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub waveform: Waveform,
    pub spectrogram: Spectrogram,
}

/// Decode once, fan out to the three independent analyzers, join, classify.
pub struct AnalysisPipeline {
    config: AnalysisConfig,
    energy: EnergyAnalyzer,
    beats: BeatTracker,
    spectral: SpectralAnalyzer,
    classifier: MoodClassifier,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        Self::with_classifier(config, MoodClassifier::shared())
    }

    pub fn with_classifier(config: AnalysisConfig, classifier: MoodClassifier) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, classifier))
    }

    fn build(config: AnalysisConfig, classifier: MoodClassifier) -> Self {
        let grid = config.frame_grid;
        Self {
            energy: EnergyAnalyzer::new(grid),
            beats: BeatTracker::new(grid, config.n_mels, config.tempo.clone()),
            spectral: SpectralAnalyzer::new(grid, config.n_mels, config.db_floor),
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Decodes and analyzes one clip. `max_duration_seconds` is the cap for
    /// this call and takes precedence over `config().max_duration_seconds`;
    /// pass the config value to honour it. A cap that is not a positive
    /// finite number fails with [`DecodeError::InvalidDuration`].
    pub fn analyze(&self, audio_bytes: &[u8], max_duration_seconds: f32) -> Result<Analysis, DecodeError> {
        self.analyze_with_hint(audio_bytes, max_duration_seconds, None)
    }

    /// Like [`analyze`](Self::analyze) with a container hint such as a file
    /// extension. The hint only speeds up probing.
    pub fn analyze_with_hint(
        &self,
        audio_bytes: &[u8],
        max_duration_seconds: f32,
        extension_hint: Option<&str>,
    ) -> Result<Analysis, DecodeError> {
        let decoder = AudioDecoder::new(DecodeOptions {
            max_duration_seconds,
            target_sample_rate: self.config.target_sample_rate,
            extension_hint: extension_hint.map(str::to_string),
        });
        let waveform = decoder.decode(audio_bytes)?;
        Ok(self.analyze_waveform(waveform))
    }

    /// Runs the analyzers against an already decoded clip. Never fails.
    pub fn analyze_waveform(&self, waveform: Waveform) -> Analysis {
        let started = Instant::now();
        let (energy, (beats, spectral)) = rayon::join(
            || timed(&self.energy, &waveform),
            || {
                rayon::join(
                    || timed(&self.beats, &waveform),
                    || timed(&self.spectral, &waveform),
                )
            },
        );
        let EnergyEnvelope { values: energy_envelope } = energy;
        let BeatTrack {
            tempo_bpm,
            beat_frames,
        } = beats;
        let SpectralAnalysis {
            spectrogram,
            fingerprint,
        } = spectral;

        let mood = self.classifier.classify(&fingerprint);
        let grid = self.config.frame_grid;
        let sample_rate = waveform.sample_rate();

        info!(
            "Analyzed {:.2}s clip in {:.1}ms: {:.0} BPM, {} beats, mood {}",
            waveform.duration_seconds(),
            started.elapsed().as_secs_f64() * 1000.0,
            tempo_bpm,
            beat_frames.len(),
            mood
        );

        let result = AnalysisResult {
            sample_rate,
            hop_length: grid.hop_length,
            duration_seconds: waveform.duration_seconds(),
            energy_envelope,
            tempo_bpm,
            beat_times_seconds: grid.frames_to_seconds(&beat_frames, sample_rate),
            beat_frame_indices: beat_frames,
            timbral_fingerprint: fingerprint,
            mood_label: mood,
            mood_color: mood.color().to_string(),
        };

        Analysis {
            result,
            waveform,
            spectrogram,
        }
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::build(AnalysisConfig::default(), MoodClassifier::shared())
    }
}

fn timed<A: FeatureAnalyzer>(analyzer: &A, waveform: &Waveform) -> A::Output {
    let started = Instant::now();
    let output = analyzer.analyze(waveform);
    debug!(
        "{} analyzer took {:.1}ms",
        analyzer.analyzer_type(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    output
}

/// One-shot analysis with the default configuration; the argument is the
/// duration cap.
pub fn analyze(audio_bytes: &[u8], max_duration_seconds: f32) -> Result<Analysis, DecodeError> {
    AnalysisPipeline::default().analyze(audio_bytes, max_duration_seconds)
}
