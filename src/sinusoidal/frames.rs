//! Frame placement, windowing and the per-frame analysis loop.

use indicatif::ProgressBar;
use rayon::prelude::*;
use rustfft::FftPlanner;

use crate::config::AnalysisParams;
use crate::dsp::Window;
use crate::error::{Result, SinusoidalError};
use crate::pitch::PitchMarks;

use super::model::AnalysisFrame;
use super::peaks::PeakAnalyzer;

/// How frames are laid over the signal.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fixed window and skip from the analysis parameters.
    FixedRate,
    /// Windows spanning a number of local pitch periods. Frames sit between
    /// successive pitch marks, or advance by the fixed skip when
    /// `fixed_skip` is set.
    PitchSynchronous { marks: PitchMarks, fixed_skip: bool },
}

/// Placement of one frame on the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub index: usize,
    /// First sample, possibly negative; samples outside the signal read as 0.
    pub start: i64,
    /// Odd window length in samples.
    pub len: usize,
}

impl FrameSpec {
    #[inline]
    pub fn centre(&self) -> i64 {
        self.start + (self.len / 2) as i64
    }

    pub fn time(&self, sampling_rate: u32) -> f64 {
        self.centre() as f64 / sampling_rate as f64
    }
}

/// A frame multiplied by its analysis window.
#[derive(Debug, Clone)]
pub struct WindowedFrame {
    pub index: usize,
    pub time: f64,
    pub samples: Vec<f64>,
    /// The frame weighted by the window's derivative, for reassignment.
    pub derivative: Option<Vec<f64>>,
}

/// Seconds to an odd number of samples.
pub fn odd_samples(seconds: f64, sampling_rate: u32) -> usize {
    let n = (seconds * sampling_rate as f64 + 0.5).floor().max(1.0) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

pub struct FrameScheduler {
    sampling_rate: u32,
    params: AnalysisParams,
}

impl FrameScheduler {
    pub fn new(sampling_rate: u32, params: AnalysisParams) -> Result<Self> {
        params.validate(sampling_rate)?;
        Ok(Self {
            sampling_rate,
            params,
        })
    }

    /// Frame placements for a signal of `len` samples.
    pub fn plan(&self, len: usize, schedule: &Schedule) -> Result<Vec<FrameSpec>> {
        if len == 0 {
            return Err(SinusoidalError::EmptySignal);
        }
        match schedule {
            Schedule::FixedRate => Ok(self.fixed_rate(len)),
            Schedule::PitchSynchronous { marks, fixed_skip } => {
                if marks.is_empty() {
                    return Err(SinusoidalError::MissingPitchMarks);
                }
                if marks.len() < 2 {
                    return Err(SinusoidalError::InvalidParameter(
                        "pitch-synchronous analysis needs at least two pitch marks".into(),
                    ));
                }
                if *fixed_skip {
                    Ok(self.pitch_synchronous_fixed_skip(len, marks))
                } else {
                    Ok(self.pitch_synchronous(marks))
                }
            }
        }
    }

    fn skip_samples(&self) -> f64 {
        (self.params.skip_size * self.sampling_rate as f64 + 0.5).floor().max(1.0)
    }

    fn fixed_rate(&self, len: usize) -> Vec<FrameSpec> {
        let ws = odd_samples(self.params.window_size, self.sampling_rate);
        let ss = self.skip_samples();
        let count = ((len as f64 - 0.5 * ws as f64) / ss).floor().max(0.0) as usize;
        (0..count)
            .map(|i| FrameSpec {
                index: i,
                start: (i as f64 * ss) as i64,
                len: ws,
            })
            .collect()
    }

    /// Window length covering `num_periods` periods of `t0` samples, never
    /// shorter than the minimum window.
    fn period_window(&self, t0: f64) -> usize {
        let min_ws = odd_samples(self.params.min_window_size, self.sampling_rate);
        let ws = (self.params.num_periods * t0).floor().max(0.0) as usize;
        let ws = ws.max(min_ws);
        if ws % 2 == 0 {
            ws + 1
        } else {
            ws
        }
    }

    fn centred(&self, index: usize, centre: i64, t0: f64) -> FrameSpec {
        let len = self.period_window(t0);
        FrameSpec {
            index,
            start: centre - (len / 2) as i64,
            len,
        }
    }

    fn pitch_synchronous(&self, marks: &PitchMarks) -> Vec<FrameSpec> {
        marks
            .marks
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let t0 = (w[1] - w[0]) as f64;
                let centre = ((w[0] + w[1]) / 2) as i64;
                self.centred(i, centre, t0)
            })
            .collect()
    }

    fn pitch_synchronous_fixed_skip(&self, len: usize, marks: &PitchMarks) -> Vec<FrameSpec> {
        let min_ws = odd_samples(self.params.min_window_size, self.sampling_rate) as f64;
        let ss = self.skip_samples();
        let count = ((len as f64 - 0.5 * min_ws) / ss).floor().max(0.0) as usize;
        (0..count)
            .map(|i| {
                let centre = (i as f64 * ss + 0.5 * min_ws).floor();
                let k = marks.enclosing_period(centre);
                let t0 = (marks.marks[k + 1] - marks.marks[k]) as f64;
                self.centred(i, centre as i64, t0)
            })
            .collect()
    }

    /// Cuts and windows one frame, zero-padding outside the signal.
    pub fn extract(&self, signal: &[f64], spec: &FrameSpec) -> WindowedFrame {
        let raw: Vec<f64> = (0..spec.len as i64)
            .map(|i| {
                let n = spec.start + i;
                if n >= 0 && (n as usize) < signal.len() {
                    signal[n as usize]
                } else {
                    0.0
                }
            })
            .collect();
        let window = Window::new(self.params.window_type, spec.len);
        let derivative = self.params.spectral_reassignment.then(|| {
            raw.iter()
                .zip(window.derivative())
                .map(|(x, d)| x * d)
                .collect()
        });
        let mut samples = raw;
        window.apply(&mut samples);
        WindowedFrame {
            index: spec.index,
            time: spec.time(self.sampling_rate),
            samples,
            derivative,
        }
    }

    /// Analyses every scheduled frame and keeps the ones that produced peaks,
    /// in time order.
    ///
    /// Frames are analysed in parallel, one FFT planner per worker.
    pub fn analyze(
        &self,
        signal: &[f64],
        analyzer: &PeakAnalyzer,
        schedule: &Schedule,
        progress: &ProgressBar,
    ) -> Result<Vec<AnalysisFrame>> {
        let plan = self.plan(signal.len(), schedule)?;
        progress.set_length(plan.len() as u64);

        let analysed: Vec<Option<AnalysisFrame>> = plan
            .par_iter()
            .map_init(FftPlanner::<f64>::new, |planner, spec| {
                let frame = self.extract(signal, spec);
                let peaks = analyzer.analyze(planner, &frame.samples, frame.derivative.as_deref());
                progress.inc(1);
                peaks.into_peaks().map(|peaks| {
                    log::debug!(
                        "frame {} at {:.3}s: {} peaks",
                        frame.index,
                        frame.time,
                        peaks.len()
                    );
                    AnalysisFrame {
                        time: frame.time,
                        peaks: peaks
                            .into_iter()
                            .map(|s| s.with_frame_index(frame.index))
                            .collect(),
                    }
                })
            })
            .collect();
        progress.finish_and_clear();

        let total = analysed.len();
        let frames: Vec<AnalysisFrame> = analysed.into_iter().flatten().collect();
        log::info!(
            "Analysed {} frames, {} with sinusoids",
            total,
            frames.len()
        );
        Ok(frames)
    }
}
