//! End-to-end runs of the analysis pipeline over synthesized WAV clips.

mod support;

use mood_analyzer::audio::FrameGrid;
use mood_analyzer::{analyze, AnalysisPipeline, AnalysisResult, DecodeError};
use support::mp3::{silent_mp3, SAMPLES_PER_FRAME, SAMPLE_RATE as MP3_RATE};
use support::wav::{click_track, sine, wav_bytes, RATE};
use tempfile::tempdir;

#[test]
fn pure_tone_has_flat_energy_and_peaks_at_its_bin() {
    let bytes = wav_bytes(&sine(440.0, 5.0, RATE), RATE);
    let analysis = analyze(&bytes, 30.0).expect("analyze sine");
    let result = &analysis.result;

    assert_eq!(result.sample_rate, RATE);
    assert!(result.energy_envelope.iter().all(|&e| e >= 0.0));

    let n = result.energy_envelope.len() as f32;
    let mean = result.energy_envelope.iter().sum::<f32>() / n;
    let variance = result
        .energy_envelope
        .iter()
        .map(|e| (e - mean).powi(2))
        .sum::<f32>()
        / n;
    assert!(variance.sqrt() / mean < 0.05, "energy should be near constant");

    let expected_bin = (440.0_f32 * 2048.0 / RATE as f32).round() as usize;
    assert_eq!(analysis.spectrogram.peak_bin(), Some(expected_bin));
}

#[test]
fn silence_has_no_tempo_or_beats() {
    let bytes = wav_bytes(&vec![0.0; 2 * RATE as usize], RATE);
    let result = analyze(&bytes, 30.0).expect("analyze silence").result;
    assert_eq!(result.tempo_bpm, 0.0);
    assert!(result.beat_frame_indices.is_empty());
    assert_eq!(result.mood_color, result.mood_label.color());
}

#[test]
fn short_clips_are_kept_whole() {
    let bytes = wav_bytes(&sine(220.0, 5.0, RATE), RATE);
    let analysis = analyze(&bytes, 30.0).expect("analyze short clip");
    assert_eq!(analysis.waveform.len(), 5 * RATE as usize);
}

#[test]
fn long_clips_are_cut_to_the_leading_window() {
    let bytes = wav_bytes(&sine(220.0, 45.0, RATE), RATE);
    let analysis = analyze(&bytes, 30.0).expect("analyze long clip");
    assert_eq!(analysis.waveform.len(), 30 * RATE as usize);
    assert!((analysis.result.duration_seconds - 30.0).abs() < 1e-3);
}

#[test]
fn energy_envelope_covers_every_frame() {
    for seconds in [0.05, 1.0, 2.5] {
        let bytes = wav_bytes(&sine(330.0, seconds, RATE), RATE);
        let analysis = analyze(&bytes, 30.0).expect("analyze");
        let frames = FrameGrid::default().frame_count(analysis.waveform.len());
        assert_eq!(analysis.result.energy_envelope.len(), frames);
        assert_eq!(analysis.spectrogram.num_frames(), frames);
    }
}

#[test]
fn beats_are_increasing_and_in_range() {
    let bytes = wav_bytes(&click_track(0.5, 10.0, RATE), RATE);
    let result = analyze(&bytes, 30.0).expect("analyze clicks").result;
    let frames = result.energy_envelope.len();

    assert!(result.tempo_bpm > 0.0);
    assert!(!result.beat_frame_indices.is_empty());
    assert!(result.beat_frame_indices.windows(2).all(|w| w[0] < w[1]));
    assert!(result.beat_frame_indices.iter().all(|&b| b < frames));
    assert!(result.beat_times_seconds.iter().all(|&t| t <= result.duration_seconds));
}

#[test]
fn repeated_runs_are_identical() {
    let bytes = wav_bytes(&click_track(0.4, 4.0, RATE), RATE);
    let pipeline = AnalysisPipeline::default();
    let first = pipeline.analyze(&bytes, 30.0).expect("first run").result;
    let second = pipeline.analyze(&bytes, 30.0).expect("second run").result;
    assert_eq!(first.timbral_fingerprint.coefficients().len(), 20);
    assert_eq!(first, second);
}

#[test]
fn mp3_streams_decode_through_the_pipeline() {
    let frames = 40;
    let bytes = silent_mp3(frames);
    let expected = (frames * SAMPLES_PER_FRAME) as f32 * RATE as f32 / MP3_RATE as f32;

    let pipeline = AnalysisPipeline::default();
    for hint in [Some("mp3"), None] {
        let analysis = pipeline
            .analyze_with_hint(&bytes, 30.0, hint)
            .expect("decode mp3");
        assert_eq!(analysis.result.sample_rate, RATE);
        let len = analysis.waveform.len() as f32;
        assert!((len - expected).abs() <= SAMPLES_PER_FRAME as f32, "decoded {len} samples");
        assert!(analysis.waveform.samples().iter().all(|s| s.abs() < 1e-4));
        assert_eq!(analysis.result.tempo_bpm, 0.0);
    }
}

#[test]
fn undecodable_input_is_an_error() {
    assert!(matches!(analyze(&[], 30.0), Err(DecodeError::Empty)));
    let garbage: Vec<u8> = (0..4096).map(|i| (i * 31 % 251) as u8).collect();
    assert!(analyze(&garbage, 30.0).is_err());
}

#[test]
fn result_survives_json_round_trip() {
    let bytes = wav_bytes(&click_track(0.5, 3.0, RATE), RATE);
    let result = analyze(&bytes, 30.0).expect("analyze").result;

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("analysis.json");
    result.save_json(&path).expect("save");
    let loaded = AnalysisResult::load_json(&path).expect("load");
    assert_eq!(loaded, result);
}
