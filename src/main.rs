use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use mood_analyzer::{AnalysisConfig, AnalysisPipeline, AnalysisResult};

#[derive(Parser)]
#[command(name = "mood-analyzer")]
#[command(about = "Analyze the energy, beats, spectrum and mood of an audio clip")]
struct Args {
    /// Audio file to analyze (MP3, WAV, M4A, FLAC, OGG)
    #[arg()]
    input_file: PathBuf,

    /// Output file for the analysis (JSON)
    #[arg(short, long, default_value = "analysis.json")]
    output: PathBuf,

    /// Analysis config (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only the leading window of this many seconds is analyzed
    #[arg(long)]
    max_duration: Option<f32>,

    /// Resample to this rate before analysis
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Include the decibel spectrogram grid in the output
    #[arg(long)]
    spectrogram: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    result: &'a AnalysisResult,
    /// `[frequency_bin][frame]` in dB relative to the loudest bin
    #[serde(skip_serializing_if = "Option::is_none")]
    spectrogram_db: Option<Vec<Vec<f32>>>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(max_duration) = args.max_duration {
        config.max_duration_seconds = max_duration;
    }
    if let Some(sample_rate) = args.sample_rate {
        config.target_sample_rate = Some(sample_rate);
    }

    info!("Input file: {}", args.input_file.display());
    info!(
        "Max duration: {:.1}s, frame {} / hop {}",
        config.max_duration_seconds, config.frame_grid.frame_length, config.frame_grid.hop_length
    );

    let bytes = std::fs::read(&args.input_file)
        .with_context(|| format!("reading {}", args.input_file.display()))?;
    let pipeline = AnalysisPipeline::new(config)?;
    let analysis = pipeline.analyze_with_hint(
        &bytes,
        pipeline.config().max_duration_seconds,
        extension(&args.input_file),
    )?;
    let result = &analysis.result;

    info!("Duration: {:.2} seconds", result.duration_seconds);
    info!("Tempo: {} BPM", result.tempo_bpm.round() as u32);
    info!("Beats detected: {}", result.beat_frame_indices.len());
    info!("Mood: {} ({})", result.mood_label, result.mood_color);

    let report = Report {
        result,
        spectrogram_db: args.spectrogram.then(|| {
            analysis
                .spectrogram
                .to_decibels()
                .outer_iter()
                .map(|row| row.to_vec())
                .collect()
        }),
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("writing {}", args.output.display()))?;
    let file_size = std::fs::metadata(&args.output)?.len();
    info!(
        "Analysis saved to {} ({:.1} KB)",
        args.output.display(),
        file_size as f64 / 1024.0
    );

    Ok(())
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
