//! Analysis windows.
//!
//! Every window handed to the peak analyzer is normalised so its weights sum
//! to one, which makes the magnitude of a spectral peak independent of the
//! frame length.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

use crate::error::SinusoidalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Rectangular,
    Hann,
    #[default]
    Hamming,
    Blackman,
}

impl FromStr for WindowType {
    type Err = SinusoidalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rectangular" | "rect" | "boxcar" => Ok(WindowType::Rectangular),
            "hann" | "hanning" => Ok(WindowType::Hann),
            "hamming" => Ok(WindowType::Hamming),
            "blackman" => Ok(WindowType::Blackman),
            other => Err(SinusoidalError::InvalidWindowType(other.to_string())),
        }
    }
}

/// A window of fixed length with weights summing to one.
#[derive(Debug, Clone)]
pub struct Window {
    window_type: WindowType,
    weights: Vec<f64>,
}

impl Window {
    pub fn new(window_type: WindowType, size: usize) -> Self {
        let mut weights = raw_window(window_type, size);
        let sum: f64 = weights.iter().sum();
        if sum > 0.0 {
            weights.iter_mut().for_each(|w| *w /= sum);
        }
        Self {
            window_type,
            weights,
        }
    }

    #[inline]
    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// First derivative of the weights by central differences, one-sided at
    /// the ends.
    pub fn derivative(&self) -> Vec<f64> {
        let w = &self.weights;
        let n = w.len();
        if n < 2 {
            return vec![0.0; n];
        }
        (0..n)
            .map(|i| match i {
                0 => w[1] - w[0],
                i if i == n - 1 => w[n - 1] - w[n - 2],
                i => 0.5 * (w[i + 1] - w[i - 1]),
            })
            .collect()
    }

    /// Multiplies `frame` by the window in place.
    #[inline]
    pub fn apply(&self, frame: &mut [f64]) {
        for (sample, &w) in frame.iter_mut().zip(self.weights.iter()) {
            *sample *= w;
        }
    }
}

fn raw_window(window_type: WindowType, size: usize) -> Vec<f64> {
    match size {
        0 => return Vec::new(),
        1 => return vec![1.0],
        _ => {}
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / denom;
            match window_type {
                WindowType::Rectangular => 1.0,
                WindowType::Hann => 0.5 * (1.0 - x.cos()),
                WindowType::Hamming => 0.54 - 0.46 * x.cos(),
                WindowType::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_sum_to_one() {
        for wt in [
            WindowType::Rectangular,
            WindowType::Hann,
            WindowType::Hamming,
            WindowType::Blackman,
        ] {
            let w = Window::new(wt, 321);
            let sum: f64 = w.weights().iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "{:?} sums to {}", wt, sum);
        }
    }

    #[test]
    fn test_window_symmetric_and_peaked() {
        let w = Window::new(WindowType::Hamming, 101);
        let ws = w.weights();
        for i in 0..50 {
            assert!((ws[i] - ws[100 - i]).abs() < 1e-15);
        }
        assert!(ws.iter().all(|&v| v <= ws[50] + 1e-15));
    }

    #[test]
    fn test_degenerate_sizes() {
        assert!(Window::new(WindowType::Hann, 0).is_empty());
        assert_eq!(Window::new(WindowType::Hann, 1).weights(), &[1.0]);
    }

    #[test]
    fn test_apply_in_place() {
        let w = Window::new(WindowType::Rectangular, 4);
        let mut frame = vec![4.0, 8.0, -4.0, 0.0];
        w.apply(&mut frame);
        assert_eq!(frame, vec![1.0, 2.0, -1.0, 0.0]);
    }

    #[test]
    fn test_derivative_antisymmetric() {
        let w = Window::new(WindowType::Hann, 65);
        let d = w.derivative();
        assert_eq!(d.len(), 65);
        assert!(d[32].abs() < 1e-15);
        assert!(d[10] > 0.0 && d[54] < 0.0);
        assert!((d[10] + d[54]).abs() < 1e-15);
    }

    #[test]
    fn test_parse_window_type() {
        assert_eq!("Hanning".parse::<WindowType>().unwrap(), WindowType::Hann);
        assert_eq!("blackman".parse::<WindowType>().unwrap(), WindowType::Blackman);
        assert!(matches!(
            "kaiser".parse::<WindowType>(),
            Err(SinusoidalError::InvalidWindowType(_))
        ));
    }
}
