use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::f32::consts::PI;
use std::io::Cursor;

use mood_analyzer::audio::Waveform;
use mood_analyzer::AnalysisPipeline;

const RATE: u32 = 22_050;

fn tone(seconds: usize) -> Vec<f32> {
    (0..seconds * RATE as usize)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            let click = if (t * 2.0).fract() < 0.01 { 0.8 } else { 0.0 };
            0.3 * (2.0 * PI * 440.0 * t).sin() + click
        })
        .collect()
}

fn wav_bytes(samples: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
    for &sample in samples {
        writer
            .write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
    cursor.into_inner()
}

fn bench_analyze_waveform(c: &mut Criterion) {
    let pipeline = AnalysisPipeline::default();
    for seconds in [5, 30] {
        let waveform = Waveform::new(tone(seconds), RATE).expect("waveform");
        c.bench_with_input(
            BenchmarkId::new("analyze_waveform", seconds),
            &waveform,
            |b, waveform| {
                b.iter(|| pipeline.analyze_waveform(black_box(waveform.clone())));
            },
        );
    }
}

fn bench_decode_and_analyze(c: &mut Criterion) {
    let pipeline = AnalysisPipeline::default();
    let bytes = wav_bytes(&tone(30));
    c.bench_function("analyze_wav_30s", |b| {
        b.iter(|| pipeline.analyze(black_box(&bytes), 30.0).expect("analyze"));
    });
}

criterion_group!(benches, bench_analyze_waveform, bench_decode_and_analyze);
criterion_main!(benches);
