//! FFT helpers shared by the peak analyzer.
//!
//! `rustfft` plans power-of-two sizes with radix-4 kernels and everything else
//! with mixed-radix/Bluestein algorithms, so a single planner covers both the
//! fast path and the arbitrary-length fallback.

use rustfft::{num_complex::Complex, FftPlanner};

/// Floor added to the power spectrum before taking the logarithm.
const DB_FLOOR: f64 = 1e-20;

pub const COMPLEX_ZERO: Complex<f64> = Complex::new(0.0, 0.0);

/// Default FFT size for a sampling rate: 1024 up to 10 kHz, 2048 up to 20 kHz,
/// 4096 otherwise.
pub fn default_fft_size(sampling_rate: u32) -> usize {
    if sampling_rate <= 10_000 {
        1024
    } else if sampling_rate <= 20_000 {
        2048
    } else {
        4096
    }
}

/// Smallest usable FFT size for a frame: at least the frame length and even.
pub fn fft_size_for_frame(requested: usize, frame_len: usize) -> usize {
    let size = requested.max(frame_len).max(2);
    if size % 2 == 1 {
        size + 1
    } else {
        size
    }
}

/// Number of non-negative frequency bins, `fft_size / 2 + 1`.
#[inline]
pub fn num_bins(fft_size: usize) -> usize {
    fft_size / 2 + 1
}

/// Places `frame` into a zero-padded buffer of `fft_size` points, rotated so the
/// frame's middle sample lands on index 0.
///
/// The resulting phase spectrum is referenced to the frame centre.
pub fn circular_buffer(frame: &[f64], fft_size: usize) -> Vec<Complex<f64>> {
    debug_assert!(fft_size >= frame.len());
    let mut buffer = vec![COMPLEX_ZERO; fft_size];
    let mid = frame.len() / 2;
    for (i, &s) in frame[mid..].iter().enumerate() {
        buffer[i].re = s;
    }
    for (i, &s) in frame[..mid].iter().enumerate() {
        buffer[fft_size - mid + i].re = s;
    }
    buffer
}

/// Forward FFT of `buffer` in place.
pub fn forward(planner: &mut FftPlanner<f64>, buffer: &mut [Complex<f64>]) {
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(buffer);
}

/// Magnitude spectrum in dB over the first `bins` bins.
pub fn magnitude_db(spectrum: &[Complex<f64>], bins: usize) -> Vec<f64> {
    spectrum[..bins]
        .iter()
        .map(|c| 10.0 * (c.re * c.re + c.im * c.im + DB_FLOOR).log10())
        .collect()
}

#[inline]
pub fn db_to_amp(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Sum of squares.
#[inline]
pub fn energy(x: &[f64]) -> f64 {
    x.iter().map(|s| s * s).sum()
}

#[inline]
pub fn abs_max(x: &[f64]) -> f64 {
    x.iter().map(|s| s.abs()).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_default_fft_size() {
        assert_eq!(default_fft_size(8000), 1024);
        assert_eq!(default_fft_size(16000), 2048);
        assert_eq!(default_fft_size(10000), 1024);
        assert_eq!(default_fft_size(10001), 2048);
        assert_eq!(default_fft_size(20000), 2048);
        assert_eq!(default_fft_size(44100), 4096);
    }

    #[test]
    fn test_fft_size_for_frame() {
        assert_eq!(fft_size_for_frame(1024, 321), 1024);
        assert_eq!(fft_size_for_frame(256, 321), 322);
        assert_eq!(fft_size_for_frame(256, 256), 256);
    }

    #[test]
    fn test_circular_buffer_rotation() {
        let frame = [1.0, 2.0, 3.0, 4.0, 5.0];
        let buf = circular_buffer(&frame, 8);
        let re: Vec<f64> = buf.iter().map(|c| c.re).collect();
        assert_eq!(re, vec![3.0, 4.0, 5.0, 0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_centered_cosine_has_zero_phase() {
        // A cosine peaking at the frame centre must come out with ~zero phase.
        let n = 255;
        let fft_size = 1024;
        let k = 32.0;
        let omega = 2.0 * PI * k / fft_size as f64;
        let mid = n / 2;
        let frame: Vec<f64> = (0..n)
            .map(|i| (omega * (i as f64 - mid as f64)).cos())
            .collect();
        let mut buf = circular_buffer(&frame, fft_size);
        let mut planner = FftPlanner::new();
        forward(&mut planner, &mut buf);
        let phase = buf[32].im.atan2(buf[32].re);
        assert!(phase.abs() < 1e-6, "phase at peak = {}", phase);
    }

    #[test]
    fn test_non_power_of_two_fft() {
        let n = 322;
        let mut buf: Vec<Complex<f64>> = (0..n)
            .map(|i| Complex::new((2.0 * PI * 7.0 * i as f64 / n as f64).cos(), 0.0))
            .collect();
        let mut planner = FftPlanner::new();
        forward(&mut planner, &mut buf);
        let db = magnitude_db(&buf, num_bins(n));
        let peak = db
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(7));
    }

    #[test]
    fn test_db_floor_keeps_silence_finite() {
        let db = magnitude_db(&[COMPLEX_ZERO; 4], 3);
        assert!(db.iter().all(|v| v.is_finite()));
        assert!((db[0] + 200.0).abs() < 1e-9);
    }
}
