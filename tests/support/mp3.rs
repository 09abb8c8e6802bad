/// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, mono, no CRC.
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0xC0];

/// 144 * bitrate / sample_rate, no padding.
const FRAME_LEN: usize = 417;

pub const SAMPLES_PER_FRAME: usize = 1152;
pub const SAMPLE_RATE: u32 = 44_100;

/// A silent MP3 stream of `frames` frames. Side info and main data are all
/// zero: no reservoir, no Huffman data, so every granule decodes to silence.
pub fn silent_mp3(frames: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * FRAME_LEN);
    for _ in 0..frames {
        bytes.extend_from_slice(&FRAME_HEADER);
        bytes.resize(bytes.len() + FRAME_LEN - FRAME_HEADER.len(), 0);
    }
    bytes
}
