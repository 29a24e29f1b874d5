//! Additive resynthesis with cubic phase interpolation (McAulay & Quatieri).
//!
//! Between consecutive points of a track the amplitude is interpolated
//! linearly and the phase by the cubic that matches phase and frequency at both
//! ends, unwrapped with the integer `M` that makes the phase smoothest.

use rayon::prelude::*;
use std::f64::consts::PI;

use crate::config::SynthesisParams;
use crate::dsp::spectrum;
use crate::error::{Result, SinusoidalError};

use super::model::{SinusoidalTrack, SinusoidalTracks, TrackState};
use super::progress_bar;

pub struct Synthesizer {
    abs_max_desired: f64,
    silent: bool,
}

impl Synthesizer {
    pub fn new(params: &SynthesisParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            abs_max_desired: params.abs_max_desired,
            silent: params.silent,
        })
    }

    /// Renders the tracks and rescales the result so its absolute maximum is
    /// the configured output level.
    pub fn synthesize(&self, tracks: &SinusoidalTracks) -> Result<Vec<f64>> {
        let tracks = apply_perceptual_masking(tracks);
        let mut y = self.render(tracks)?;
        let max = spectrum::abs_max(&y);
        if max > 0.0 {
            let gain = self.abs_max_desired / max;
            y.iter_mut().for_each(|s| *s *= gain);
        } else {
            log::warn!("Synthesized signal is all zeros, skipping normalisation");
        }
        Ok(y)
    }

    /// Sum of all tracks, unnormalised. The buffer holds
    /// `round(original_duration * fs) + 1` samples.
    pub fn render(&self, tracks: &SinusoidalTracks) -> Result<Vec<f64>> {
        if tracks.is_empty() {
            return Err(SinusoidalError::NoTracks);
        }
        let fs = tracks.sampling_rate as f64;
        let len = (tracks.original_duration * fs).round().max(0.0) as usize + 1;

        log::info!(
            "Synthesizing {} tracks into {} samples",
            tracks.len(),
            len
        );
        let pb = progress_bar(tracks.len() as u64, self.silent, "tracks");
        let y = tracks
            .tracks
            .par_iter()
            .fold(
                || vec![0.0; len],
                |mut buf, track| {
                    render_track(track, fs, &mut buf);
                    pb.inc(1);
                    buf
                },
            )
            .reduce(
                || vec![0.0; len],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );
        pb.finish_and_clear();
        Ok(y)
    }
}

/// Phase and frequency cubic between two track points, over `t` in `[0, T]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CubicPhase {
    phase: f64,
    freq: f64,
    alpha: f64,
    beta: f64,
}

impl CubicPhase {
    fn new(phase0: f64, freq0: f64, phase1: f64, freq1: f64, span: f64) -> Self {
        let m = ((phase0 + freq0 * span - phase1 + 0.5 * span * (freq1 - freq0)) / (2.0 * PI))
            .round();
        let e = phase1 - phase0 - freq0 * span + 2.0 * PI * m;
        let df = freq1 - freq0;
        Self {
            phase: phase0,
            freq: freq0,
            alpha: 3.0 / (span * span) * e - df / span,
            beta: -2.0 / (span * span * span) * e + df / (span * span),
        }
    }

    #[inline]
    fn at(&self, t: f64) -> f64 {
        self.phase + t * (self.freq + t * (self.alpha + t * self.beta))
    }
}

/// Adds one track into `buf`.
fn render_track(track: &SinusoidalTrack, fs: f64, buf: &mut [f64]) {
    for pair in track.points().windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.state == TrackState::TurnedOff {
            continue;
        }
        let n0 = (a.time * fs).round() as i64;
        let n1 = (b.time * fs).round() as i64;
        let span = n1 - n0;
        if span <= 0 {
            continue;
        }
        let t_span = span as f64;

        let (mut amp0, mut freq0, mut phase0) = (a.amplitude, a.frequency, a.phase);
        let (mut amp1, mut freq1, mut phase1) = (b.amplitude, b.frequency, b.phase);
        if a.state == TrackState::TurnedOn {
            amp0 = 0.0;
            freq0 = freq1;
            phase0 = phase1 - freq1 * t_span;
        }
        if b.state == TrackState::TurnedOff {
            amp1 = 0.0;
            freq1 = freq0;
            phase1 = phase0 + freq0 * t_span;
        }

        let cubic = CubicPhase::new(phase0, freq0, phase1, freq1, t_span);
        let lo = n0.max(0);
        let hi = n1.min(buf.len() as i64);
        for n in lo..hi {
            let t = (n - n0) as f64;
            let amp = amp0 + (amp1 - amp0) * t / t_span;
            buf[n as usize] += amp * cubic.at(t).cos();
        }
    }
}

/// Hook for removing perceptually masked components before rendering.
/// Currently returns its input unchanged.
pub fn apply_perceptual_masking(tracks: &SinusoidalTracks) -> &SinusoidalTracks {
    tracks
}
