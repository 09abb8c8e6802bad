use log::{debug, info, warn};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::Waveform;
use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    /// Only this many leading seconds are kept.
    pub max_duration_seconds: f32,
    /// Resample to this rate after downmixing. `None` keeps the native rate.
    pub target_sample_rate: Option<u32>,
    /// Container/codec hint such as `"mp3"` or `"wav"`; probing works without it.
    pub extension_hint: Option<String>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_duration_seconds: 30.0,
            target_sample_rate: Some(22_050),
            extension_hint: None,
        }
    }
}

/// Turns encoded audio bytes into a mono [`Waveform`] capped at the leading
/// `max_duration_seconds`.
pub struct AudioDecoder {
    options: DecodeOptions,
}

impl AudioDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Waveform, DecodeError> {
        let max_duration = self.options.max_duration_seconds;
        if !(max_duration.is_finite() && max_duration > 0.0) {
            return Err(DecodeError::InvalidDuration(max_duration));
        }
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let max_seconds = max_duration as f64;

        let (mono, native_rate) =
            decode_mono(bytes, self.options.extension_hint.as_deref(), max_seconds)?;
        let native_seconds = mono.len() as f64 / native_rate as f64;

        let sample_rate = self.options.target_sample_rate.unwrap_or(native_rate).max(1);
        let mut samples = resample_linear(&mono, native_rate, sample_rate);
        samples.truncate(frames_for(max_seconds, sample_rate));

        info!(
            "Decoded {:.2}s of audio at {}Hz into {} mono samples at {}Hz",
            native_seconds,
            native_rate,
            samples.len(),
            sample_rate
        );
        Waveform::new(samples, sample_rate)
    }
}

fn frames_for(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round() as usize
}

/// Decodes the first audio track, averaging channels into mono and stopping
/// once `max_seconds` worth of frames has been collected.
fn decode_mono(
    bytes: &[u8],
    extension_hint: Option<&str>,
    max_seconds: f64,
) -> Result<(Vec<f32>, u32), DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Unsupported("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .filter(|&rate| rate > 0)
        .ok_or(DecodeError::NoSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let max_frames = frames_for(max_seconds, sample_rate);
    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    while mono.len() < max_frames {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) if mono.is_empty() => return Err(DecodeError::Corrupt(e.to_string())),
            Err(e) => {
                warn!("Stopping at unreadable packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) if mono.is_empty() => return Err(DecodeError::Corrupt(e.to_string())),
            Err(e) => {
                warn!("Stopping at decoder error: {}", e);
                break;
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        if buf.capacity() < decoded.capacity() * channels {
            *buf = SampleBuffer::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);

        mono.extend(
            buf.samples()
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if mono.is_empty() {
        return Err(DecodeError::Empty);
    }
    mono.truncate(max_frames);
    debug!("Collected {} mono frames at {}Hz", mono.len(), sample_rate);
    Ok((mono, sample_rate))
}

/// Linear-interpolation resampler. Output covers the same duration at the
/// new rate, rounded to whole samples.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() || from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let step = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64 / step).round() as usize).max(1);
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let index = (pos as usize).min(last);
            let frac = (pos - index as f64).clamp(0.0, 1.0) as f32;
            let here = samples[index];
            let next = samples.get(index + 1).copied().unwrap_or(here);
            here + (next - here) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn wav_bytes(frames: usize, channels: u16, sample_rate: u32, value: f32) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames {
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn native_rate_decoder(max_duration_seconds: f32) -> AudioDecoder {
        AudioDecoder::new(DecodeOptions {
            max_duration_seconds,
            target_sample_rate: None,
            extension_hint: Some("wav".to_string()),
        })
    }

    #[test]
    fn empty_input_is_rejected() {
        let decoder = AudioDecoder::new(DecodeOptions::default());
        assert!(matches!(decoder.decode(&[]), Err(DecodeError::Empty)));
    }

    #[test]
    fn garbage_is_unsupported() {
        let decoder = AudioDecoder::new(DecodeOptions::default());
        let garbage = vec![0x5a_u8; 4096];
        assert!(decoder.decode(&garbage).is_err());
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let bytes = wav_bytes(1000, 2, 8000, 0.5);
        let wf = native_rate_decoder(30.0).decode(&bytes).unwrap();
        assert_eq!(wf.sample_rate(), 8000);
        assert_eq!(wf.len(), 1000);
        assert!(wf.samples().iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn long_clip_is_cut_to_the_cap() {
        let bytes = wav_bytes(8000 * 3, 1, 8000, 0.1);
        let wf = native_rate_decoder(2.0).decode(&bytes).unwrap();
        assert_eq!(wf.len(), 16_000);
    }

    #[test]
    fn resampling_hits_target_rate_and_length() {
        let bytes = wav_bytes(44_100, 1, 44_100, 0.25);
        let decoder = AudioDecoder::new(DecodeOptions::default());
        let wf = decoder.decode(&bytes).unwrap();
        assert_eq!(wf.sample_rate(), 22_050);
        assert_eq!(wf.len(), 22_050);
    }

    #[test]
    fn non_positive_cap_is_rejected() {
        let bytes = wav_bytes(800, 1, 8000, 0.1);
        for cap in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let result = native_rate_decoder(cap).decode(&bytes);
            assert!(
                matches!(result, Err(DecodeError::InvalidDuration(_))),
                "cap {cap} gave {result:?}"
            );
        }
    }

    #[test]
    fn upsampling_interpolates_between_neighbours() {
        assert_eq!(resample_linear(&[0.0, 1.0], 1, 2), vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn downsampling_by_two_keeps_even_samples() {
        let input = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_eq!(resample_linear(&input, 2, 1), vec![0.0, 2.0, 4.0, 6.0]);
    }
}
