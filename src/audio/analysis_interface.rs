use super::Waveform;

/// Common interface for the per-clip analyzers that read a decoded
/// [`Waveform`].
///
/// Implementations are pure: the same waveform always yields the same output,
/// and degenerate input (silence, a clip shorter than one frame) produces a
/// well-defined low-information output instead of an error. Because they only
/// borrow the waveform, independent analyzers can run side by side on the
/// same clip.
///
/// # Available Implementations
/// - `EnergyAnalyzer`: framed RMS envelope
/// - `BeatTracker`: global tempo and beat frames
/// - `SpectralAnalyzer`: spectrogram and timbral fingerprint
///
/// # Example Usage
/// ```rust
/// use mood_analyzer::audio::{EnergyAnalyzer, FeatureAnalyzer, FrameGrid, Waveform};
///
/// let waveform = Waveform::new(vec![0.25; 4096], 22_050).unwrap();
/// let analyzer = EnergyAnalyzer::new(FrameGrid::default());
/// let envelope = analyzer.analyze(&waveform);
/// assert_eq!(analyzer.analyzer_type(), "energy");
/// assert!(envelope.values.iter().all(|&v| v >= 0.0));
/// ```
pub trait FeatureAnalyzer: Sync {
    type Output: Send;

    /// Analyze a whole clip.
    fn analyze(&self, waveform: &Waveform) -> Self::Output;

    /// Short identifier used in logs.
    fn analyzer_type(&self) -> &'static str;
}
