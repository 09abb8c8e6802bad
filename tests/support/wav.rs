use std::f32::consts::PI;
use std::io::Cursor;

pub const RATE: u32 = 22_050;

/// Encodes mono float samples as an in-memory WAV file.
pub fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
    cursor.into_inner()
}

pub fn sine(freq: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32).round() as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Short decaying noise bursts every `interval` seconds.
pub fn click_track(interval: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32).round() as usize;
    let period = (interval * sample_rate as f32).round() as usize;
    let click_len = sample_rate as usize / 100;
    let mut seed = 0x2545_f491_u32;
    (0..n)
        .map(|i| {
            let offset = i % period;
            if offset >= click_len {
                return 0.0;
            }
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let noise = (seed as f32 / u32::MAX as f32) * 2.0 - 1.0;
            noise * (1.0 - offset as f32 / click_len as f32)
        })
        .collect()
}
