//! Pitch marks, F0 contours and piecewise scale contours.
//!
//! F0 contours are sampled at a fixed rate: value `i` describes the frame
//! centred at `i * skip + 0.5 * window` seconds. Values at or below
//! [`MIN_VOICED_F0`] are treated as unvoiced.

use crate::error::{Result, SinusoidalError};

/// F0 values at or below this many Hz are unvoiced.
pub const MIN_VOICED_F0: f64 = 10.0;

/// Pitch assumed where the contour is unvoiced, Hz.
pub const UNVOICED_F0: f64 = 100.0;

/// Period-onset sample indices, strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitchMarks {
    pub marks: Vec<usize>,
    /// Samples past the end of the signal covered by an extrapolated final
    /// mark, 0 when none was added.
    pub total_zeros_to_pad: usize,
}

impl PitchMarks {
    pub fn new(marks: Vec<usize>) -> Result<Self> {
        if marks.is_empty() {
            return Err(SinusoidalError::MissingPitchMarks);
        }
        if marks.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SinusoidalError::InvalidParameter(
                "pitch marks must be strictly increasing".into(),
            ));
        }
        Ok(Self {
            marks,
            total_zeros_to_pad: 0,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Index of the mark closest to `sample`.
    pub fn closest(&self, sample: i64) -> usize {
        closest_index_by(&self.marks, |&m| m as f64, sample as f64)
    }

    /// Index of the mark period `[marks[k], marks[k + 1])` enclosing `sample`,
    /// clamped to the first/last period.
    pub fn enclosing_period(&self, sample: f64) -> usize {
        if self.marks.len() < 2 {
            return 0;
        }
        let pos = self.marks.partition_point(|&m| (m as f64) <= sample);
        pos.saturating_sub(1).min(self.marks.len() - 2)
    }
}

/// Index in `sorted` whose key is nearest to `x`; ties go to the lower index.
pub(crate) fn closest_index_by<T, F>(sorted: &[T], key: F, x: f64) -> usize
where
    F: Fn(&T) -> f64,
{
    if sorted.is_empty() {
        return 0;
    }
    let pos = sorted.partition_point(|v| key(v) < x);
    if pos == 0 {
        return 0;
    }
    if pos == sorted.len() {
        return sorted.len() - 1;
    }
    let below = x - key(&sorted[pos - 1]);
    let above = key(&sorted[pos]) - x;
    if above < below {
        pos
    } else {
        pos - 1
    }
}

/// Fills unvoiced stretches of an F0 contour by linear interpolation between
/// the neighbouring voiced values.
///
/// A leading unvoiced stretch starts from the mean voiced value, a trailing one
/// holds the last voiced value. A contour without voiced values is returned
/// unchanged.
pub fn interpolate_unvoiced(f0s: &[f64]) -> Vec<f64> {
    let voiced: Vec<usize> = f0s
        .iter()
        .enumerate()
        .filter(|(_, &f)| f > MIN_VOICED_F0)
        .map(|(i, _)| i)
        .collect();
    if voiced.is_empty() {
        return f0s.to_vec();
    }

    let mut anchors: Vec<(usize, f64)> = voiced.iter().map(|&i| (i, f0s[i])).collect();
    if voiced[0] != 0 {
        let mean = anchors.iter().map(|a| a.1).sum::<f64>() / anchors.len() as f64;
        anchors.insert(0, (0, mean));
    }
    let last = f0s.len() - 1;
    if let Some(&(idx, val)) = anchors.last() {
        if idx != last {
            anchors.push((last, val));
        }
    }

    let mut out = Vec::with_capacity(f0s.len());
    let mut seg = 0;
    for i in 0..f0s.len() {
        while seg + 1 < anchors.len() - 1 && anchors[seg + 1].0 <= i {
            seg += 1;
        }
        let (x0, y0) = anchors[seg];
        match anchors.get(seg + 1) {
            Some(&(x1, y1)) if x1 > x0 => {
                let t = (i as f64 - x0 as f64) / (x1 - x0) as f64;
                out.push(y0 + t * (y1 - y0));
            }
            _ => out.push(y0),
        }
    }
    out
}

/// Places pitch marks one local period apart over a signal of `len` samples.
///
/// `ws`/`ss` are the contour's window and skip sizes in seconds. With
/// `pad_final`, a last mark is extrapolated past the end of the signal when
/// the marks do not already reach its final sample.
pub fn contour_to_pitch_marks(
    f0s: &[f64],
    sampling_rate: u32,
    len: usize,
    ws: f64,
    ss: f64,
    pad_final: bool,
) -> Result<PitchMarks> {
    if f0s.is_empty() {
        return Err(SinusoidalError::MissingPitchContour);
    }
    if ss <= 0.0 || ws < 0.0 {
        return Err(SinusoidalError::InvalidParameter(format!(
            "contour window/skip must be positive, got {}/{}",
            ws, ss
        )));
    }
    let fs = sampling_rate as f64;
    let interp = interpolate_unvoiced(f0s);
    let numfrm = f0s.len() as i64;

    let mut marks = Vec::new();
    let mut prev = 1.0f64;
    for i in 1..=len {
        let t = (i as f64 - 1.0) / fs;
        let ind = (((t - 0.5 * ws) / ss + 0.5).floor() as i64 + 1).clamp(1, numfrm) as usize;
        let f0 = interp[ind - 1];
        let t0 = if f0 > MIN_VOICED_F0 {
            fs / f0
        } else {
            fs / UNVOICED_F0
        };
        if i == 1 || i as f64 - t0 >= prev {
            marks.push(i - 1);
            prev = i as f64;
        }
    }

    if marks.len() < 2 {
        return Err(SinusoidalError::InvalidParameter(format!(
            "signal of {} samples is too short for a pitch mark grid",
            len
        )));
    }

    let mut total_zeros_to_pad = 0;
    let last = marks[marks.len() - 1];
    if pad_final && last + 1 != len {
        let period = last - marks[marks.len() - 2];
        let extra = last + period;
        total_zeros_to_pad = extra.saturating_sub(len - 1);
        marks.push(extra);
    }

    Ok(PitchMarks {
        marks,
        total_zeros_to_pad,
    })
}

/// Estimates a fixed-rate F0 contour from pitch marks: each value is the
/// inverse of the period ending at the mark closest to the frame centre.
pub fn pitch_marks_to_contour(marks: &[usize], ws: f64, ss: f64, sampling_rate: u32) -> Vec<f64> {
    if marks.len() < 2 || ss <= 0.0 {
        return Vec::new();
    }
    let fs = sampling_rate as f64;
    let times: Vec<f64> = marks.iter().map(|&m| m as f64 / fs).collect();
    let last = times[times.len() - 1];
    let numfrm = ((last - 0.5 * ws) / ss + 0.5).floor();
    if numfrm <= 0.0 {
        return Vec::new();
    }
    (0..numfrm as usize)
        .map(|i| {
            let centre = i as f64 * ss + 0.5 * ws;
            let ind = closest_index_by(&times, |&t| t, centre).max(1);
            1.0 / (times[ind] - times[ind - 1])
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePoint {
    /// Seconds on the unmodified time axis.
    pub time: f64,
    pub scale: f64,
}

/// A scale factor varying piecewise-linearly over time, held constant beyond
/// the first and last breakpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleContour {
    points: Vec<ScalePoint>,
}

impl Default for ScaleContour {
    fn default() -> Self {
        Self::identity()
    }
}

impl ScaleContour {
    pub fn identity() -> Self {
        Self::constant(1.0)
    }

    pub fn constant(scale: f64) -> Self {
        Self {
            points: vec![ScalePoint { time: 0.0, scale }],
        }
    }

    /// Builds a contour from scale values and their instants.
    ///
    /// Without `times`, breakpoint `i` of `n` sits at `(i + 0.5) / n` of
    /// `duration`.
    pub fn from_breakpoints(scales: &[f64], times: Option<&[f64]>, duration: f64) -> Result<Self> {
        if scales.is_empty() {
            return Err(SinusoidalError::InvalidParameter(
                "scale contour needs at least one value".into(),
            ));
        }
        let n = scales.len();
        let times: Vec<f64> = match times {
            Some(t) if t.len() != n => {
                return Err(SinusoidalError::LengthMismatch {
                    what: "scale contour times",
                    expected: n,
                    found: t.len(),
                })
            }
            Some(t) => t.to_vec(),
            None => (0..n)
                .map(|i| (i as f64 + 0.5) / n as f64 * duration)
                .collect(),
        };
        let contour = Self {
            points: times
                .into_iter()
                .zip(scales.iter())
                .map(|(time, &scale)| ScalePoint { time, scale })
                .collect(),
        };
        contour.validate()?;
        Ok(contour)
    }

    pub fn validate(&self) -> Result<()> {
        for p in &self.points {
            if !p.scale.is_finite() || p.scale <= 0.0 {
                return Err(SinusoidalError::InvalidParameter(format!(
                    "scale factors must be finite and positive, got {}",
                    p.scale
                )));
            }
            if !p.time.is_finite() || p.time < 0.0 {
                return Err(SinusoidalError::InvalidParameter(format!(
                    "scale breakpoint times must be non-negative, got {}",
                    p.time
                )));
            }
        }
        if self.points.windows(2).any(|w| w[1].time < w[0].time) {
            return Err(SinusoidalError::InvalidParameter(
                "scale breakpoint times must be non-decreasing".into(),
            ));
        }
        Ok(())
    }

    pub fn points(&self) -> &[ScalePoint] {
        &self.points
    }

    pub fn is_identity(&self) -> bool {
        self.points.iter().all(|p| p.scale == 1.0)
    }

    /// Scale factor in effect at `time`.
    pub fn scale_at(&self, time: f64) -> f64 {
        let pts = &self.points;
        let first = pts[0];
        if time <= first.time {
            return first.scale;
        }
        let pos = pts.partition_point(|p| p.time <= time);
        if pos == pts.len() {
            return pts[pts.len() - 1].scale;
        }
        let (a, b) = (pts[pos - 1], pts[pos]);
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.scale;
        }
        a.scale + (time - a.time) / span * (b.scale - a.scale)
    }

    /// Maps an instant of the original time axis onto the scaled axis by
    /// integrating the scale factor from zero.
    pub fn warp(&self, time: f64) -> f64 {
        if time <= 0.0 {
            return time * self.scale_at(0.0);
        }
        let mut acc = 0.0;
        let mut prev_t = 0.0;
        let mut prev_s = self.scale_at(0.0);
        for p in self.points.iter().filter(|p| p.time > 0.0 && p.time < time) {
            acc += 0.5 * (prev_s + p.scale) * (p.time - prev_t);
            prev_t = p.time;
            prev_s = p.scale;
        }
        acc + 0.5 * (prev_s + self.scale_at(time)) * (time - prev_t)
    }
}

/// Multiplies the voiced values of a contour by the pitch scale in effect at
/// each frame centre.
pub fn pitch_scale_contour(f0s: &[f64], ws: f64, ss: f64, scale: &ScaleContour) -> Vec<f64> {
    f0s.iter()
        .enumerate()
        .map(|(i, &f0)| {
            if f0 > MIN_VOICED_F0 {
                f0 * scale.scale_at(i as f64 * ss + 0.5 * ws)
            } else {
                f0
            }
        })
        .collect()
}

/// Resamples a contour onto the time-scaled axis, keeping its frame rate.
///
/// Each output frame takes the value of the input frame whose warped centre is
/// nearest.
pub fn time_scale_contour(f0s: &[f64], ws: f64, ss: f64, scale: &ScaleContour) -> Vec<f64> {
    if f0s.is_empty() || ss <= 0.0 {
        return Vec::new();
    }
    let warped: Vec<f64> = (0..f0s.len())
        .map(|i| scale.warp(i as f64 * ss + 0.5 * ws))
        .collect();
    let last = warped[warped.len() - 1];
    let numfrm = (((last - 0.5 * ws) / ss + 0.5).floor().max(0.0) as usize) + 1;
    (0..numfrm)
        .map(|j| {
            let centre = j as f64 * ss + 0.5 * ws;
            f0s[closest_index_by(&warped, |&t| t, centre)]
        })
        .collect()
}

/// Reads whitespace/newline separated numbers, ignoring `#` comments.
pub fn parse_values<T: std::str::FromStr>(text: &str) -> Result<Vec<T>> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(str::split_whitespace)
        .map(|tok| {
            tok.parse::<T>().map_err(|_| {
                SinusoidalError::InvalidParameter(format!("cannot parse value '{}'", tok))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_unvoiced_gap() {
        let f0s = [0.0, 100.0, 0.0, 0.0, 160.0, 0.0];
        let out = interpolate_unvoiced(&f0s);
        assert!((out[0] - 130.0).abs() < 1e-9, "leading = {}", out[0]);
        assert!((out[2] - 120.0).abs() < 1e-9);
        assert!((out[3] - 140.0).abs() < 1e-9);
        assert!((out[5] - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_all_unvoiced_unchanged() {
        let f0s = [0.0, 5.0, 0.0];
        assert_eq!(interpolate_unvoiced(&f0s), f0s.to_vec());
    }

    #[test]
    fn test_contour_to_pitch_marks_constant_f0() {
        let fs = 16000;
        let f0s = vec![200.0; 100];
        let pm = contour_to_pitch_marks(&f0s, fs, 16000, 0.02, 0.01, false).unwrap();
        assert_eq!(pm.marks[0], 0);
        for w in pm.marks.windows(2) {
            assert_eq!(w[1] - w[0], 80, "period between {} and {}", w[0], w[1]);
        }
        assert_eq!(pm.total_zeros_to_pad, 0);
    }

    #[test]
    fn test_contour_to_pitch_marks_padding() {
        let f0s = vec![200.0; 10];
        let pm = contour_to_pitch_marks(&f0s, 16000, 1000, 0.02, 0.01, true).unwrap();
        let last = *pm.marks.last().unwrap();
        assert!(last >= 999, "last mark {}", last);
        assert_eq!(pm.total_zeros_to_pad, last - 999);
    }

    #[test]
    fn test_contour_to_pitch_marks_empty() {
        assert!(matches!(
            contour_to_pitch_marks(&[], 16000, 100, 0.02, 0.01, false),
            Err(SinusoidalError::MissingPitchContour)
        ));
    }

    #[test]
    fn test_pitch_marks_to_contour() {
        let marks: Vec<usize> = (0..200).map(|i| i * 80).collect();
        let f0s = pitch_marks_to_contour(&marks, 0.02, 0.01, 16000);
        assert!(!f0s.is_empty());
        assert!(f0s.iter().all(|&f| (f - 200.0).abs() < 1e-6));
    }

    #[test]
    fn test_pitch_marks_validation() {
        assert!(matches!(
            PitchMarks::new(vec![]),
            Err(SinusoidalError::MissingPitchMarks)
        ));
        assert!(PitchMarks::new(vec![0, 10, 10]).is_err());
        let pm = PitchMarks::new(vec![0, 100, 200, 300]).unwrap();
        assert_eq!(pm.closest(149), 1);
        assert_eq!(pm.closest(151), 2);
        assert_eq!(pm.enclosing_period(250.0), 2);
        assert_eq!(pm.enclosing_period(1000.0), 2);
    }

    #[test]
    fn test_constant_scale_warp() {
        let c = ScaleContour::constant(2.0);
        assert!((c.warp(0.75) - 1.5).abs() < 1e-12);
        assert!(ScaleContour::identity().is_identity());
        assert!(!c.is_identity());
    }

    #[test]
    fn test_piecewise_scale_warp() {
        let c = ScaleContour::from_breakpoints(&[1.0, 3.0], Some(&[0.0, 1.0]), 0.0).unwrap();
        assert!((c.scale_at(0.5) - 2.0).abs() < 1e-12);
        assert!((c.warp(1.0) - 2.0).abs() < 1e-12, "warp(1) = {}", c.warp(1.0));
        // Beyond the last breakpoint the scale holds at 3.
        assert!((c.warp(2.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_breakpoint_times() {
        let c = ScaleContour::from_breakpoints(&[1.0, 2.0], None, 2.0).unwrap();
        assert!((c.points()[0].time - 0.5).abs() < 1e-12);
        assert!((c.points()[1].time - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_scales_rejected() {
        assert!(ScaleContour::from_breakpoints(&[0.0], None, 1.0).is_err());
        assert!(ScaleContour::from_breakpoints(&[f64::NAN], None, 1.0).is_err());
        assert!(matches!(
            ScaleContour::from_breakpoints(&[1.0, 2.0], Some(&[0.0]), 1.0),
            Err(SinusoidalError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_time_scale_contour_doubles_length() {
        let f0s: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let out = time_scale_contour(&f0s, 0.02, 0.01, &ScaleContour::constant(2.0));
        assert!(
            (out.len() as i64 - 99).abs() <= 1,
            "scaled contour has {} frames",
            out.len()
        );
        assert_eq!(out[0], 100.0);
        assert_eq!(*out.last().unwrap(), 149.0);
    }

    #[test]
    fn test_pitch_scale_contour_skips_unvoiced() {
        let out = pitch_scale_contour(&[0.0, 100.0], 0.02, 0.01, &ScaleContour::constant(1.5));
        assert_eq!(out, vec![0.0, 150.0]);
    }

    #[test]
    fn test_parse_values() {
        let v: Vec<f64> = parse_values("100.0 # first\n0\n\n 120.5\n").unwrap();
        assert_eq!(v, vec![100.0, 0.0, 120.5]);
        assert!(parse_values::<usize>("12 x").is_err());
    }
}
