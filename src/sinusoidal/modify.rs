//! Time and pitch scale modification of sinusoidal tracks.
//!
//! The phase of each active point is split into an excitation part, the
//! linear phase accumulated since the nearest pitch mark, and a system part,
//! the remainder. The system part is kept; the excitation part is recomputed
//! against a pitch-mark grid derived from the modified F0 contour at the
//! point's new position.

use std::f64::consts::PI;

use crate::config::ModificationParams;
use crate::error::{Result, SinusoidalError};
use crate::pitch::{self, PitchMarks};

use super::model::{SinusoidalTrack, SinusoidalTracks, TrackPoint, TrackState};

pub struct TrackModifier {
    params: ModificationParams,
}

impl TrackModifier {
    pub fn new(params: ModificationParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ModificationParams {
        &self.params
    }

    /// Returns a modified copy of `tracks` with the same track and point
    /// layout.
    ///
    /// `f0s` is the pitch contour of the analysed signal, sampled at the
    /// window/skip sizes in the modification parameters, and `marks` its pitch
    /// marks. The contour may be empty when both scales are identity.
    pub fn modify(
        &self,
        tracks: &SinusoidalTracks,
        f0s: &[f64],
        marks: &PitchMarks,
    ) -> Result<SinusoidalTracks> {
        if marks.is_empty() {
            return Err(SinusoidalError::MissingPitchMarks);
        }
        let fs = tracks.sampling_rate as f64;
        let modified_marks = self.modified_pitch_marks(tracks, f0s, marks)?;

        let mut out = SinusoidalTracks::new(tracks.sampling_rate);
        out.abs_max_original = tracks.abs_max_original;
        out.total_energy = tracks.total_energy;
        for track in &tracks.tracks {
            out.push(self.modify_track(track, fs, marks, &modified_marks));
        }
        out.update_duration();

        log::info!(
            "Modified {} tracks: {:.3}s -> {:.3}s",
            out.len(),
            tracks.original_duration,
            out.original_duration
        );
        out.statistics().log("Modified tracks");
        Ok(out)
    }

    /// Pitch marks of the modified signal. An identity plan reuses the
    /// analysis marks so that unmodified tracks come back unchanged.
    fn modified_pitch_marks(
        &self,
        tracks: &SinusoidalTracks,
        f0s: &[f64],
        marks: &PitchMarks,
    ) -> Result<PitchMarks> {
        if self.params.is_identity() {
            return Ok(marks.clone());
        }
        if f0s.is_empty() {
            return Err(SinusoidalError::MissingPitchContour);
        }
        let (ws, ss) = (self.params.f0_window_size, self.params.f0_skip_size);
        let scaled = pitch::pitch_scale_contour(f0s, ws, ss, &self.params.pitch_scale);
        let scaled = pitch::time_scale_contour(&scaled, ws, ss, &self.params.time_scale);
        let duration = self.params.time_scale.warp(tracks.original_duration);
        let len = ((duration * tracks.sampling_rate as f64).round() as usize).max(2);
        pitch::contour_to_pitch_marks(&scaled, tracks.sampling_rate, len, ws, ss, false)
    }

    fn modify_track(
        &self,
        track: &SinusoidalTrack,
        fs: f64,
        marks: &PitchMarks,
        modified_marks: &PitchMarks,
    ) -> SinusoidalTrack {
        let pts = track.points();
        let mut out: Vec<Option<TrackPoint>> = vec![None; pts.len()];

        for (j, p) in pts.iter().enumerate() {
            if p.state == TrackState::Active {
                out[j] = Some(self.modify_active(p, fs, marks, modified_marks));
            }
        }

        // Guards keep their original distance to the neighbouring point.
        for j in 0..pts.len() {
            let p = pts[j];
            match p.state {
                TrackState::TurnedOn => {
                    let next = out.get(j + 1).copied().flatten();
                    out[j] = Some(match next {
                        Some(n) => {
                            let gap = pts[j + 1].time - p.time;
                            let time = n.time - gap;
                            TrackPoint {
                                time,
                                amplitude: 0.0,
                                frequency: n.frequency,
                                phase: n.phase - n.frequency * (n.time - time) * fs,
                                ..p
                            }
                        }
                        None => TrackPoint {
                            time: self.params.time_scale.warp(p.time),
                            ..p
                        },
                    });
                }
                TrackState::TurnedOff => {
                    let prev = if j > 0 { out[j - 1] } else { None };
                    out[j] = Some(match prev {
                        Some(q) => {
                            let gap = p.time - pts[j - 1].time;
                            TrackPoint {
                                time: q.time + gap,
                                amplitude: 0.0,
                                frequency: q.frequency,
                                phase: q.phase + q.frequency * gap * fs,
                                ..p
                            }
                        }
                        None => TrackPoint {
                            time: self.params.time_scale.warp(p.time),
                            ..p
                        },
                    });
                }
                TrackState::Active => {}
            }
        }

        SinusoidalTrack::from_points(out.into_iter().flatten().collect())
    }

    fn modify_active(
        &self,
        p: &TrackPoint,
        fs: f64,
        marks: &PitchMarks,
        modified_marks: &PitchMarks,
    ) -> TrackPoint {
        let n = (p.time * fs).round() as i64;
        let excitation = p.frequency * excitation_offset(marks, n);
        let system = p.phase - excitation;

        let time = self.params.time_scale.warp(p.time);
        let n_mod = (time * fs).round() as i64;
        let mut frequency = self.params.pitch_scale.scale_at(p.time) * p.frequency;
        let mut amplitude = p.amplitude;
        if frequency > PI {
            amplitude = 0.0;
            frequency = PI;
        }
        let excitation_mod = frequency * excitation_offset(modified_marks, n_mod);

        TrackPoint {
            time,
            amplitude,
            frequency,
            phase: system + excitation_mod,
            state: TrackState::Active,
            frame_index: p.frame_index,
        }
    }
}

/// Samples from the pitch mark closest to `n` to `n`.
fn excitation_offset(marks: &PitchMarks, n: i64) -> f64 {
    let k = marks.closest(n);
    (n - marks.marks[k] as i64) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingParams;
    use crate::pitch::ScaleContour;
    use crate::sinusoidal::model::{AnalysisFrame, Sinusoid};
    use crate::sinusoidal::tracks::TrackAssociator;

    const FS: u32 = 16000;

    /// 10 ms frames of a 200 Hz harmonic series, plus its contour and marks.
    fn fixture() -> (SinusoidalTracks, Vec<f64>, PitchMarks) {
        let w0 = 2.0 * PI * 200.0 / FS as f64;
        let frames: Vec<AnalysisFrame> = (1..30)
            .map(|i| {
                let t = i as f64 * 0.01;
                let n = (t * FS as f64).round();
                AnalysisFrame {
                    time: t,
                    peaks: (1..=3)
                        .map(|h| {
                            let w = h as f64 * w0;
                            Sinusoid::new(1.0 / h as f64, w, w * n + 0.3 * h as f64)
                                .with_frame_index(i)
                        })
                        .collect(),
                }
            })
            .collect();
        let tracks = TrackAssociator::new(FS, &TrackingParams::default())
            .unwrap()
            .generate(&frames)
            .unwrap();
        let f0s = vec![200.0; 32];
        let marks = pitch::contour_to_pitch_marks(&f0s, FS, 4800, 0.02, 0.01, false).unwrap();
        (tracks, f0s, marks)
    }

    fn modifier(time: f64, pitch: f64) -> TrackModifier {
        TrackModifier::new(ModificationParams::new(
            ScaleContour::constant(time),
            ScaleContour::constant(pitch),
        ))
        .unwrap()
    }

    #[test]
    fn test_identity_is_idempotent() {
        let (tracks, f0s, marks) = fixture();
        let out = modifier(1.0, 1.0).modify(&tracks, &f0s, &marks).unwrap();
        assert_eq!(out.len(), tracks.len());
        for (a, b) in tracks.tracks.iter().zip(&out.tracks) {
            assert_eq!(a.len(), b.len());
            for (p, q) in a.points().iter().zip(b.points()) {
                assert!((p.time - q.time).abs() < 1e-9, "time {} vs {}", p.time, q.time);
                assert!((p.phase - q.phase).abs() < 1e-9, "phase {} vs {}", p.phase, q.phase);
                assert_eq!(p.state, q.state);
                assert_eq!(p.frequency, q.frequency);
            }
        }
        assert!((out.original_duration - tracks.original_duration).abs() < 1e-9);
    }

    #[test]
    fn test_identity_without_contour() {
        let (tracks, _, marks) = fixture();
        assert!(modifier(1.0, 1.0).modify(&tracks, &[], &marks).is_ok());
    }

    #[test]
    fn test_missing_pitch_marks() {
        let (tracks, f0s, _) = fixture();
        let empty = PitchMarks {
            marks: Vec::new(),
            total_zeros_to_pad: 0,
        };
        assert!(matches!(
            modifier(2.0, 1.0).modify(&tracks, &f0s, &empty),
            Err(SinusoidalError::MissingPitchMarks)
        ));
    }

    #[test]
    fn test_missing_contour() {
        let (tracks, _, marks) = fixture();
        assert!(matches!(
            modifier(2.0, 1.0).modify(&tracks, &[], &marks),
            Err(SinusoidalError::MissingPitchContour)
        ));
    }

    #[test]
    fn test_time_scale_stretches_times() {
        let (tracks, f0s, marks) = fixture();
        let out = modifier(2.0, 1.0).modify(&tracks, &f0s, &marks).unwrap();
        for (a, b) in tracks.tracks.iter().zip(&out.tracks) {
            for (p, q) in a.points().iter().zip(b.points()) {
                if p.state == TrackState::Active {
                    assert!((q.time - 2.0 * p.time).abs() < 1e-9);
                    assert_eq!(q.frequency, p.frequency);
                }
            }
            let pts = b.points();
            assert!((pts[1].time - pts[0].time - 0.005).abs() < 1e-9);
            let n = pts.len();
            assert!((pts[n - 1].time - pts[n - 2].time - 0.005).abs() < 1e-9);
            assert!(pts.windows(2).all(|w| w[1].time > w[0].time));
        }
        assert!((out.original_duration - (2.0 * 0.29 + 0.005)).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_scale_moves_frequencies() {
        let (tracks, f0s, marks) = fixture();
        let out = modifier(1.0, 1.5).modify(&tracks, &f0s, &marks).unwrap();
        for (a, b) in tracks.tracks.iter().zip(&out.tracks) {
            for (p, q) in a.points().iter().zip(b.points()) {
                assert!((q.frequency - 1.5 * p.frequency).abs() < 1e-12);
                assert!((q.time - p.time).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_early_guard_keeps_its_gap() {
        let mut tracks = SinusoidalTracks::new(FS);
        let mut track = SinusoidalTrack::new();
        for (t, state, amp) in [
            (-0.002, TrackState::TurnedOn, 0.0),
            (0.003, TrackState::Active, 1.0),
            (0.013, TrackState::Active, 1.0),
            (0.018, TrackState::TurnedOff, 0.0),
        ] {
            track.push(TrackPoint {
                time: t,
                amplitude: amp,
                frequency: 0.2,
                phase: 0.0,
                state,
                frame_index: None,
            });
        }
        tracks.push(track);
        let (_, f0s, marks) = fixture();

        let same = modifier(1.0, 1.0).modify(&tracks, &f0s, &marks).unwrap();
        assert!((same.tracks[0].points()[0].time + 0.002).abs() < 1e-12);

        let out = modifier(2.0, 1.0).modify(&tracks, &f0s, &marks).unwrap();
        let pts = out.tracks[0].points();
        assert!((pts[0].time - 0.001).abs() < 1e-9, "guard at {}", pts[0].time);
        assert!((pts[1].time - pts[0].time - 0.005).abs() < 1e-9);
    }

    #[test]
    fn test_frequencies_above_nyquist_are_muted() {
        let mut tracks = SinusoidalTracks::new(FS);
        let mut track = SinusoidalTrack::new();
        for (t, state, amp) in [
            (0.005, TrackState::TurnedOn, 0.0),
            (0.01, TrackState::Active, 1.0),
            (0.015, TrackState::TurnedOff, 0.0),
        ] {
            track.push(TrackPoint {
                time: t,
                amplitude: amp,
                frequency: 2.5,
                phase: 0.0,
                state,
                frame_index: None,
            });
        }
        tracks.push(track);
        let (_, f0s, marks) = fixture();
        let out = modifier(1.0, 2.0).modify(&tracks, &f0s, &marks).unwrap();
        let pts = out.tracks[0].points();
        assert_eq!(pts[1].amplitude, 0.0);
        assert!(pts.iter().all(|p| p.frequency <= PI));
    }
}
