//! Spectral peak picking and refinement for one analysis frame.
//!
//! Peaks are strict local maxima of the dB magnitude spectrum. Their bin
//! positions are refined by fitting a parabola through the three bins around
//! each maximum (PARSHL), then corrected for the window-dependent bias of that
//! fit (CQIFFT, Abe & Smith 2004). Optionally the frequency is re-estimated by
//! spectral reassignment with the derivative window.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

use crate::config::AnalysisParams;
use crate::dsp::spectrum;
use crate::dsp::WindowType;
use crate::error::Result;

use super::model::{FramePeaks, Sinusoid};

/// Frames with less energy than this yield no peaks.
pub const MIN_ENERGY_TH: f64 = 1e-10;

/// Upper edges, in Hz, of the bands used for frequency-dependent
/// neighbourhoods. Bins above the last edge use the sixth band.
const BAND_EDGES_HZ: [f64; 5] = [500.0, 1270.0, 2700.0, 6400.0, 15500.0];

/// Largest average separation, in Hz, tolerated between noise peaks.
const MAX_NOISE_SEPARATION_HZ: f64 = 100.0;

/// Window-dependent CQIFFT correction, tabulated for a maximum bias of 0.01%.
#[derive(Debug, Clone, Copy)]
struct BiasCorrection {
    freq: f64,
    amp: f64,
}

impl BiasCorrection {
    fn for_window(window_type: WindowType) -> Self {
        let (zp_f, zp_a, c): (f64, f64, [f64; 4]) = match window_type {
            WindowType::Hann => (1.5, 1.9, [0.247560, 0.084372, -0.090608, -0.055781]),
            WindowType::Hamming => (1.5, 2.0, [0.256498, 0.075977, -0.116927, -0.062882]),
            WindowType::Blackman => (1.2, 1.7, [0.124188, 0.013752, -0.038073, -0.006195]),
            WindowType::Rectangular => (2.9, 3.5, [1.279369, 1.756245, -1.173273, -3.241966]),
        };
        Self {
            freq: c[0] * zp_f.powi(-2) + c[1] * zp_f.powi(-4),
            amp: c[2] * zp_a.powi(-4) + c[3] * zp_a.powi(-6),
        }
    }

    /// Corrects a parabolic estimate `(bin, db)` found around integer bin
    /// `origin`.
    fn apply(&self, origin: usize, bin: f64, db: f64) -> (f64, f64) {
        let del = bin - origin as f64;
        (
            bin + self.freq * (del - 0.5) * (del + 0.5) * del,
            db + self.amp * del * del,
        )
    }
}

/// One candidate peak while it is being refined.
#[derive(Debug, Clone, Copy)]
struct Peak {
    bin: usize,
    refined_bin: f64,
    db: f64,
}

/// Extracts sinusoids from windowed frames.
///
/// The analyzer holds no per-frame state: the FFT size is resolved for each
/// frame, so one analyzer can be shared by parallel workers.
#[derive(Debug, Clone)]
pub struct PeakAnalyzer {
    sampling_rate: u32,
    fft_size: usize,
    window_type: WindowType,
    refine_parabola: bool,
    bias: Option<BiasCorrection>,
    reassign: bool,
    freq_dependent_neighbours: bool,
    neighbours: usize,
    peak_range_db: f64,
    start_freq_hz: f64,
    end_freq_hz: f64,
}

impl PeakAnalyzer {
    pub fn new(sampling_rate: u32, params: &AnalysisParams) -> Result<Self> {
        params.validate(sampling_rate)?;
        let refine_parabola = params.refine_parabola;
        Ok(Self {
            sampling_rate,
            fft_size: params
                .fft_size
                .unwrap_or_else(|| spectrum::default_fft_size(sampling_rate)),
            window_type: params.window_type,
            refine_parabola,
            bias: (refine_parabola && params.refine_bias)
                .then(|| BiasCorrection::for_window(params.window_type)),
            reassign: params.spectral_reassignment,
            freq_dependent_neighbours: params.freq_dependent_neighbours,
            neighbours: params.neighbours.max(1),
            peak_range_db: params.peak_range_db,
            start_freq_hz: params.start_freq_hz,
            end_freq_hz: params
                .end_freq_hz
                .unwrap_or(0.5 * sampling_rate as f64),
        })
    }

    #[inline]
    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    #[inline]
    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// FFT size that will be used for a frame of `frame_len` samples.
    #[inline]
    pub fn fft_size_for(&self, frame_len: usize) -> usize {
        spectrum::fft_size_for_frame(self.fft_size, frame_len)
    }

    /// Peak-picking half-width for every non-negative frequency bin.
    pub fn neighbourhoods(&self, fft_size: usize) -> Vec<usize> {
        let bins = spectrum::num_bins(fft_size);
        if !self.freq_dependent_neighbours {
            return vec![self.neighbours; bins];
        }
        let fs = self.sampling_rate as f64;
        let cap = (0.5 * MAX_NOISE_SEPARATION_HZ / fs * fft_size as f64 + 0.5).floor() as usize;
        let vals: Vec<usize> = (0..6).map(|i| (i + 1).min(cap).max(1)).collect();
        (0..bins)
            .map(|k| {
                let hz = k as f64 / (bins - 1) as f64 * 0.5 * fs;
                let band = BAND_EDGES_HZ
                    .iter()
                    .position(|&edge| hz < edge)
                    .unwrap_or(BAND_EDGES_HZ.len());
                vals[band]
            })
            .collect()
    }

    /// Analyses one windowed frame.
    ///
    /// `derivative` is the same frame weighted by the derivative of the
    /// analysis window; it is only consulted when spectral reassignment is on.
    pub fn analyze(
        &self,
        planner: &mut FftPlanner<f64>,
        frame: &[f64],
        derivative: Option<&[f64]>,
    ) -> FramePeaks {
        if frame.is_empty() || spectrum::energy(frame) < MIN_ENERGY_TH {
            return FramePeaks::Silent;
        }

        let fft_size = self.fft_size_for(frame.len());
        let bins = spectrum::num_bins(fft_size);
        let mut dft = spectrum::circular_buffer(frame, fft_size);
        spectrum::forward(planner, &mut dft);
        let db = spectrum::magnitude_db(&dft, bins);

        let mut peaks = self.pick_peaks(&db, fft_size);
        if peaks.is_empty() {
            return FramePeaks::Silent;
        }

        if self.refine_parabola {
            for p in peaks.iter_mut() {
                if let Some((bin, peak_db)) = parabolic_peak(&db, p.bin) {
                    let (bin, peak_db) = match self.bias {
                        Some(bias) => bias.apply(p.bin, bin, peak_db),
                        None => (bin, peak_db),
                    };
                    p.refined_bin = bin;
                    p.db = peak_db;
                }
            }
        }

        if self.reassign {
            if let Some(d) = derivative {
                self.reassign_frequencies(planner, &dft, d, fft_size, &mut peaks);
            }
        }

        let max_bin = (bins - 1) as f64;
        let sinusoids = peaks
            .iter()
            .map(|p| {
                let c = dft[p.bin];
                // DC and Nyquist have no mirrored negative-frequency half.
                let sides = if p.bin == 0 || p.bin == bins - 1 { 1.0 } else { 2.0 };
                Sinusoid::new(
                    sides * spectrum::db_to_amp(p.db),
                    (PI * p.refined_bin / max_bin).clamp(0.0, PI),
                    c.im.atan2(c.re),
                )
            })
            .collect();
        FramePeaks::Peaks(sinusoids)
    }

    /// Strict local maxima inside the analysis band, in increasing bin order.
    /// The DC and Nyquist bins are compared against their inner neighbours
    /// only.
    fn pick_peaks(&self, db: &[f64], fft_size: usize) -> Vec<Peak> {
        let bins = db.len();
        if bins < 3 {
            return Vec::new();
        }
        let neighs = self.neighbourhoods(fft_size);
        let hz_to_bin = |hz: f64| hz / self.sampling_rate as f64 * fft_size as f64;
        let start = hz_to_bin(self.start_freq_hz).ceil().max(0.0) as usize;
        let end = (hz_to_bin(self.end_freq_hz).floor() as usize).min(bins - 1);
        if end < start {
            return Vec::new();
        }

        let mut peaks: Vec<Peak> = (start..=end)
            .filter(|&k| {
                let n = neighs[k];
                let lo = k.saturating_sub(n);
                let hi = (k + n).min(bins - 1);
                (lo..=hi).all(|j| j == k || db[k] > db[j])
            })
            .map(|k| Peak {
                bin: k,
                refined_bin: k as f64,
                db: db[k],
            })
            .collect();

        if self.peak_range_db > 0.0 {
            let strongest = peaks.iter().map(|p| p.db).fold(f64::NEG_INFINITY, f64::max);
            peaks.retain(|p| p.db >= strongest - self.peak_range_db);
        }
        peaks
    }

    fn reassign_frequencies(
        &self,
        planner: &mut FftPlanner<f64>,
        dft: &[Complex<f64>],
        derivative: &[f64],
        fft_size: usize,
        peaks: &mut [Peak],
    ) {
        let mut ddft = spectrum::circular_buffer(derivative, fft_size);
        spectrum::forward(planner, &mut ddft);
        let bin_width = 2.0 * PI / fft_size as f64;
        let last = spectrum::num_bins(fft_size) - 1;
        for p in peaks.iter_mut() {
            let km = (p.refined_bin.round().max(0.0) as usize).min(last);
            let x = dft[km];
            let power = x.norm_sqr();
            if power <= 0.0 {
                continue;
            }
            let ratio = ddft[km] / x;
            let omega = km as f64 * bin_width - ratio.im;
            let current = p.refined_bin * bin_width;
            if (omega - current).abs() <= bin_width && omega >= 0.0 {
                p.refined_bin = omega / bin_width;
            }
        }
    }
}

/// Vertex `(bin, dB)` of the parabola through bins `k - 1`, `k`, `k + 1`, or
/// `None` at the spectrum edges and for a degenerate (flat) triplet.
fn parabolic_peak(db: &[f64], k: usize) -> Option<(f64, f64)> {
    if k == 0 || k + 1 >= db.len() {
        return None;
    }
    let (alpha, beta, gamma) = (db[k - 1], db[k], db[k + 1]);
    let denom = alpha - 2.0 * beta + gamma;
    if denom.abs() < 1e-12 {
        return None;
    }
    let p = 0.5 * (alpha - gamma) / denom;
    Some((k as f64 + p, beta - 0.25 * p * (alpha - gamma)))
}
