use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::dsp::WindowType;
use crate::error::{Result, SinusoidalError};
use crate::pitch::ScaleContour;
use crate::sinusoidal::model::ZERO_AMP_SHIFT;

/// Smallest analysis window in seconds, the 100 Hz resolution floor.
pub const MIN_WINDOW_SIZE: f64 = 0.020;
pub const DEFAULT_DELTA_IN_HZ: f64 = 50.0;
pub const DEFAULT_ANALYSIS_PERIODS: f64 = 2.5;

/// Contents of a `sinmod.toml` file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisParams,
    #[serde(default)]
    pub tracking: TrackingParams,
    #[serde(default)]
    pub synthesis: SynthesisParams,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisParams {
    #[serde(default)]
    pub window_type: WindowType,
    /// Seconds.
    #[serde(default = "default_window_size")]
    pub window_size: f64,
    /// Seconds.
    #[serde(default = "default_skip_size")]
    pub skip_size: f64,
    /// Overrides the sampling-rate dependent FFT size.
    #[serde(default)]
    pub fft_size: Option<usize>,
    #[serde(default = "default_true")]
    pub refine_parabola: bool,
    #[serde(default = "default_true")]
    pub refine_bias: bool,
    #[serde(default)]
    pub spectral_reassignment: bool,
    /// Widen the peak-picking neighbourhood in higher Bark bands.
    #[serde(default)]
    pub freq_dependent_neighbours: bool,
    #[serde(default = "default_neighbours")]
    pub neighbours: usize,
    /// Peaks this many dB below the strongest peak of their frame are
    /// discarded. Zero or less keeps every peak.
    #[serde(default = "default_peak_range_db")]
    pub peak_range_db: f64,
    #[serde(default)]
    pub start_freq_hz: f64,
    /// Defaults to the Nyquist frequency.
    #[serde(default)]
    pub end_freq_hz: Option<f64>,
    /// Pitch periods covered by one pitch-synchronous window.
    #[serde(default = "default_num_periods")]
    pub num_periods: f64,
    /// Seconds.
    #[serde(default = "default_min_window_size")]
    pub min_window_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrackingParams {
    #[serde(default = "default_delta_in_hz")]
    pub delta_in_hz: f64,
    /// Seconds between a track's outermost real point and its guard point.
    #[serde(default = "default_zero_amp_shift")]
    pub zero_amp_shift: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SynthesisParams {
    #[serde(default = "default_abs_max_desired")]
    pub abs_max_desired: f64,
    #[serde(default)]
    pub silent: bool,
}

/// Time and pitch scale plans for the track modifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModificationParams {
    pub time_scale: ScaleContour,
    pub pitch_scale: ScaleContour,
    /// Window and skip, in seconds, at which the pitch contour is sampled.
    pub f0_window_size: f64,
    pub f0_skip_size: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            window_type: WindowType::default(),
            window_size: default_window_size(),
            skip_size: default_skip_size(),
            fft_size: None,
            refine_parabola: true,
            refine_bias: true,
            spectral_reassignment: false,
            freq_dependent_neighbours: false,
            neighbours: default_neighbours(),
            peak_range_db: default_peak_range_db(),
            start_freq_hz: 0.0,
            end_freq_hz: None,
            num_periods: default_num_periods(),
            min_window_size: default_min_window_size(),
        }
    }
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            delta_in_hz: default_delta_in_hz(),
            zero_amp_shift: default_zero_amp_shift(),
        }
    }
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            abs_max_desired: default_abs_max_desired(),
            silent: false,
        }
    }
}

impl AnalysisParams {
    pub fn with_window_type(mut self, window_type: WindowType) -> Self {
        self.window_type = window_type;
        self
    }

    pub fn with_window_size(mut self, seconds: f64) -> Self {
        self.window_size = seconds;
        self
    }

    pub fn with_skip_size(mut self, seconds: f64) -> Self {
        self.skip_size = seconds;
        self
    }

    pub fn with_fft_size(mut self, fft_size: usize) -> Self {
        self.fft_size = Some(fft_size);
        self
    }

    pub fn with_refinement(mut self, parabola: bool, bias: bool) -> Self {
        self.refine_parabola = parabola;
        self.refine_bias = bias;
        self
    }

    pub fn with_spectral_reassignment(mut self, on: bool) -> Self {
        self.spectral_reassignment = on;
        self
    }

    pub fn with_freq_dependent_neighbours(mut self, on: bool) -> Self {
        self.freq_dependent_neighbours = on;
        self
    }

    pub fn with_peak_range_db(mut self, db: f64) -> Self {
        self.peak_range_db = db;
        self
    }

    pub fn with_freq_range(mut self, start_hz: f64, end_hz: Option<f64>) -> Self {
        self.start_freq_hz = start_hz;
        self.end_freq_hz = end_hz;
        self
    }

    pub fn with_num_periods(mut self, periods: f64) -> Self {
        self.num_periods = periods;
        self
    }

    pub fn validate(&self, sampling_rate: u32) -> Result<()> {
        if sampling_rate == 0 {
            return invalid("sampling rate must be positive".into());
        }
        if !(self.window_size > 0.0) || !(self.skip_size > 0.0) {
            return invalid(format!(
                "window/skip sizes must be positive, got {}/{}",
                self.window_size, self.skip_size
            ));
        }
        if !(self.min_window_size > 0.0) {
            return invalid(format!(
                "minimum window size must be positive, got {}",
                self.min_window_size
            ));
        }
        if !(self.num_periods > 0.0) || !self.num_periods.is_finite() {
            return invalid(format!(
                "periods per window must be positive, got {}",
                self.num_periods
            ));
        }
        if self.fft_size == Some(0) {
            return invalid("FFT size must be positive".into());
        }
        let nyquist = 0.5 * sampling_rate as f64;
        let end = self.end_freq_hz.unwrap_or(nyquist);
        if self.start_freq_hz < 0.0 || end > nyquist || self.start_freq_hz >= end {
            return invalid(format!(
                "analysis range {}..{} Hz is outside 0..{} Hz or inverted",
                self.start_freq_hz, end, nyquist
            ));
        }
        Ok(())
    }
}

impl TrackingParams {
    pub fn with_delta_in_hz(mut self, delta: f64) -> Self {
        self.delta_in_hz = delta;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.delta_in_hz > 0.0) {
            return invalid(format!("deltaInHz must be positive, got {}", self.delta_in_hz));
        }
        if !(self.zero_amp_shift > 0.0) {
            return invalid(format!(
                "guard interval must be positive, got {}",
                self.zero_amp_shift
            ));
        }
        Ok(())
    }
}

impl SynthesisParams {
    pub fn with_abs_max_desired(mut self, level: f64) -> Self {
        self.abs_max_desired = level;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.abs_max_desired >= 0.0) || !self.abs_max_desired.is_finite() {
            return invalid(format!(
                "output level must be finite and non-negative, got {}",
                self.abs_max_desired
            ));
        }
        Ok(())
    }
}

impl ModificationParams {
    pub fn new(time_scale: ScaleContour, pitch_scale: ScaleContour) -> Self {
        Self {
            time_scale,
            pitch_scale,
            f0_window_size: default_window_size(),
            f0_skip_size: default_skip_size(),
        }
    }

    pub fn with_f0_sizing(mut self, window: f64, skip: f64) -> Self {
        self.f0_window_size = window;
        self.f0_skip_size = skip;
        self
    }

    pub fn is_identity(&self) -> bool {
        self.time_scale.is_identity() && self.pitch_scale.is_identity()
    }

    pub fn validate(&self) -> Result<()> {
        self.time_scale.validate()?;
        self.pitch_scale.validate()?;
        if !(self.f0_skip_size > 0.0) || self.f0_window_size < 0.0 {
            return invalid(format!(
                "pitch contour window/skip must be positive, got {}/{}",
                self.f0_window_size, self.f0_skip_size
            ));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(SinusoidalError::InvalidParameter(msg))
}

fn default_true() -> bool { true }
fn default_window_size() -> f64 { 0.020 }
fn default_skip_size() -> f64 { 0.010 }
fn default_neighbours() -> usize { 1 }
fn default_peak_range_db() -> f64 { 35.0 }
fn default_num_periods() -> f64 { DEFAULT_ANALYSIS_PERIODS }
fn default_min_window_size() -> f64 { MIN_WINDOW_SIZE }
fn default_delta_in_hz() -> f64 { DEFAULT_DELTA_IN_HZ }
fn default_zero_amp_shift() -> f64 { ZERO_AMP_SHIFT }
fn default_abs_max_desired() -> f64 { 0.9 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Ignoring malformed config {}: {}", path.display(), e);
            None
        }
    }
}

/// `sinmod.toml` in the working directory, then the per-user config file.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("sinmod.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("sinmod").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("sinmod").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
