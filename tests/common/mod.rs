#![allow(dead_code)]

use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};
use sinmod::{AnalysisParams, SinusoidalAnalyzer, TrackingParams};

pub fn gen_sine(freq_hz: f64, sr: u32, seconds: f64, amp: f64) -> Vec<f64> {
    let n = (sr as f64 * seconds) as usize;
    (0..n)
        .map(|i| amp * (2.0 * PI * freq_hz * i as f64 / sr as f64).sin())
        .collect()
}

/// A tone that switches frequency at `switch_at` seconds with continuous phase.
pub fn gen_switch(freq_a: f64, freq_b: f64, sr: u32, seconds: f64, switch_at: f64, amp: f64) -> Vec<f64> {
    let n = (sr as f64 * seconds) as usize;
    let switch = (sr as f64 * switch_at) as usize;
    let mut phase = 0.0f64;
    (0..n)
        .map(|i| {
            let f = if i < switch { freq_a } else { freq_b };
            let s = amp * phase.sin();
            phase += 2.0 * PI * f / sr as f64;
            s
        })
        .collect()
}

pub fn quiet_analyzer(sr: u32) -> SinusoidalAnalyzer {
    SinusoidalAnalyzer::new(sr, AnalysisParams::default(), TrackingParams::default())
        .unwrap()
        .with_silent(true)
}

/// Frequency in Hz of the largest magnitude bin over the middle of `signal`.
pub fn dominant_frequency(signal: &[f64], sr: u32) -> f64 {
    let n = 8192.min(signal.len());
    let start = (signal.len() - n) / 2;
    let mut buf: Vec<Complex<f64>> = signal[start..start + n]
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos();
            Complex::new(s * w, 0.0)
        })
        .collect();
    FftPlanner::new().plan_fft_forward(n).process(&mut buf);
    let (bin, _) = buf[..n / 2]
        .iter()
        .enumerate()
        .map(|(k, c)| (k, c.norm()))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    bin as f64 * sr as f64 / n as f64
}

pub fn to_hz(omega: f64, sr: u32) -> f64 {
    omega * sr as f64 / (2.0 * PI)
}
