use thiserror::Error;

/// Failure to turn input bytes into a usable waveform.
///
/// Decoding is deterministic, so none of these are worth retrying with the
/// same bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("audio input is empty")]
    Empty,
    #[error("unsupported audio: {0}")]
    Unsupported(String),
    #[error("corrupt audio stream: {0}")]
    Corrupt(String),
    #[error("audio track does not declare a sample rate")]
    NoSampleRate,
    #[error("maximum duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid analysis config: {0}")]
    Invalid(String),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum ClusteringError {
    #[error("cannot fit {clusters} clusters to {points} points")]
    TooFewPoints { points: usize, clusters: usize },
    #[error("clustering needs at least one cluster")]
    NoClusters,
    #[error("non-finite value in point {0}")]
    NonFinite(usize),
}
