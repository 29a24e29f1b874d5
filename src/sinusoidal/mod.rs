//! Sinusoidal analysis, modification and synthesis.
//!
//! The pipeline runs scheduler -> peak analyzer -> track associator, then
//! optionally the track modifier, then the synthesizer. [`SinusoidalAnalyzer`]
//! and [`ProsodyModifier`] chain these stages for the common cases.

pub mod frames;
pub mod model;
pub mod modify;
pub mod peaks;
pub mod synthesis;
pub mod tracks;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{AnalysisParams, ModificationParams, SynthesisParams, TrackingParams};
use crate::dsp::spectrum;
use crate::error::{Result, SinusoidalError};
use crate::pitch::{self, PitchMarks};

pub use frames::{FrameScheduler, Schedule};
pub use model::{
    AnalysisFrame, FramePeaks, Sinusoid, SinusoidalTrack, SinusoidalTracks, TrackPoint,
    TrackState, TrackStatistics, ZERO_AMP_SHIFT,
};
pub use modify::TrackModifier;
pub use peaks::PeakAnalyzer;
pub use synthesis::Synthesizer;
pub use tracks::TrackAssociator;

/// A progress bar in the crate's style, or a hidden one when `hidden`.
pub(crate) fn progress_bar(len: u64, hidden: bool, unit: &str) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let template = format!(
        "[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {} ({{eta}} remaining)",
        unit
    );
    if let Ok(style) = ProgressStyle::default_bar().template(&template) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Turns a signal into sinusoidal tracks.
pub struct SinusoidalAnalyzer {
    sampling_rate: u32,
    analysis: AnalysisParams,
    tracking: TrackingParams,
    silent: bool,
}

impl SinusoidalAnalyzer {
    pub fn new(sampling_rate: u32, analysis: AnalysisParams, tracking: TrackingParams) -> Result<Self> {
        analysis.validate(sampling_rate)?;
        tracking.validate()?;
        Ok(Self {
            sampling_rate,
            analysis,
            tracking,
            silent: false,
        })
    }

    /// Hides the progress bar.
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn analysis_params(&self) -> &AnalysisParams {
        &self.analysis
    }

    pub fn analyze_fixed_rate(&self, signal: &[f64]) -> Result<SinusoidalTracks> {
        self.analyze(signal, &Schedule::FixedRate)
    }

    /// Pitch-synchronous analysis. With `fixed_skip` frames advance by the
    /// configured skip instead of sitting between pitch marks.
    pub fn analyze_pitch_synchronous(
        &self,
        signal: &[f64],
        marks: &PitchMarks,
        fixed_skip: bool,
    ) -> Result<SinusoidalTracks> {
        self.analyze(
            signal,
            &Schedule::PitchSynchronous {
                marks: marks.clone(),
                fixed_skip,
            },
        )
    }

    pub fn analyze(&self, signal: &[f64], schedule: &Schedule) -> Result<SinusoidalTracks> {
        if signal.is_empty() {
            return Err(SinusoidalError::EmptySignal);
        }
        log::info!(
            "Analysing {} samples at {} Hz ({:?} window)",
            signal.len(),
            self.sampling_rate,
            self.analysis.window_type
        );
        let scheduler = FrameScheduler::new(self.sampling_rate, self.analysis.clone())?;
        let analyzer = PeakAnalyzer::new(self.sampling_rate, &self.analysis)?;
        let pb = progress_bar(0, self.silent, "frames");
        let frames = scheduler.analyze(signal, &analyzer, schedule, &pb)?;

        let mut tracks = TrackAssociator::new(self.sampling_rate, &self.tracking)?.generate(&frames)?;
        tracks.abs_max_original = spectrum::abs_max(signal);
        tracks.total_energy = spectrum::energy(signal);
        tracks.statistics().log("Tracks");
        Ok(tracks)
    }
}

/// Pitch-synchronous analysis, modification and resynthesis in one call.
pub struct ProsodyModifier {
    analyzer: SinusoidalAnalyzer,
    synthesis: SynthesisParams,
}

impl ProsodyModifier {
    pub fn new(analyzer: SinusoidalAnalyzer, synthesis: SynthesisParams) -> Result<Self> {
        synthesis.validate()?;
        Ok(Self {
            analyzer,
            synthesis,
        })
    }

    /// Modifies `signal` according to `modification`, given its F0 contour.
    pub fn process(
        &self,
        signal: &[f64],
        f0s: &[f64],
        modification: &ModificationParams,
    ) -> Result<Vec<f64>> {
        if signal.is_empty() {
            return Err(SinusoidalError::EmptySignal);
        }
        let fs = self.analyzer.sampling_rate();
        let marks = pitch::contour_to_pitch_marks(
            f0s,
            fs,
            signal.len(),
            modification.f0_window_size,
            modification.f0_skip_size,
            true,
        )?;
        let tracks = self.analyzer.analyze_pitch_synchronous(signal, &marks, false)?;
        let modified = TrackModifier::new(modification.clone())?.modify(&tracks, f0s, &marks)?;
        Synthesizer::new(&self.synthesis)?.synthesize(&modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::ScaleContour;
    use std::f64::consts::PI;

    fn tone(fs: u32, hz: f64, amp: f64, seconds: f64) -> Vec<f64> {
        let n = (fs as f64 * seconds) as usize;
        (0..n)
            .map(|i| amp * (2.0 * PI * hz * i as f64 / fs as f64).sin())
            .collect()
    }

    fn analyzer(fs: u32) -> SinusoidalAnalyzer {
        SinusoidalAnalyzer::new(fs, AnalysisParams::default(), TrackingParams::default())
            .unwrap()
            .with_silent(true)
    }

    #[test]
    fn test_analyze_records_signal_level() {
        let x = tone(8000, 500.0, 0.5, 0.3);
        let tracks = analyzer(8000).analyze_fixed_rate(&x).unwrap();
        assert!((tracks.abs_max_original - 0.5).abs() < 1e-3);
        assert!(tracks.total_energy > 0.0);
        assert_eq!(tracks.sampling_rate, 8000);
    }

    #[test]
    fn test_empty_signal() {
        assert!(matches!(
            analyzer(8000).analyze_fixed_rate(&[]),
            Err(SinusoidalError::EmptySignal)
        ));
    }

    #[test]
    fn test_silence_has_no_tracks() {
        assert!(matches!(
            analyzer(8000).analyze_fixed_rate(&vec![0.0; 4000]),
            Err(SinusoidalError::NoTracks)
        ));
    }

    #[test]
    fn test_prosody_modifier_time_stretch() {
        let fs = 16000;
        let x = tone(fs, 400.0, 0.5, 0.5);
        let f0s = vec![200.0; 50];
        let modifier = ProsodyModifier::new(
            analyzer(fs),
            SynthesisParams::default().with_abs_max_desired(0.5).with_silent(true),
        )
        .unwrap();
        let plan = ModificationParams::new(ScaleContour::constant(2.0), ScaleContour::identity());
        let y = modifier.process(&x, &f0s, &plan).unwrap();
        let ratio = y.len() as f64 / x.len() as f64;
        assert!((ratio - 2.0).abs() < 0.1, "length ratio {}", ratio);
        assert!((spectrum::abs_max(&y) - 0.5).abs() < 1e-9);
    }
}
