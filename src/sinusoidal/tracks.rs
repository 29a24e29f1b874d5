//! Frame-to-frame association of peaks into tracks.
//!
//! Every live track proposes to the nearest peak of the next frame within
//! `delta_in_hz`. A peak claimed twice keeps the closer claimant; the loser
//! excludes that peak and proposes again. Peaks nobody keeps start new tracks,
//! tracks left without a peak are turned off.

use std::collections::VecDeque;
use std::f64::consts::PI;

use crate::config::TrackingParams;
use crate::error::{Result, SinusoidalError};

use super::model::{
    AnalysisFrame, Sinusoid, SinusoidalTrack, SinusoidalTracks, TrackPoint, TrackState,
};

pub struct TrackAssociator {
    sampling_rate: u32,
    /// Radians per sample.
    delta: f64,
    zero_amp_shift: f64,
}

impl TrackAssociator {
    pub fn new(sampling_rate: u32, params: &TrackingParams) -> Result<Self> {
        params.validate()?;
        if sampling_rate == 0 {
            return Err(SinusoidalError::InvalidParameter(
                "sampling rate must be positive".into(),
            ));
        }
        Ok(Self {
            sampling_rate,
            delta: params.delta_in_hz * 2.0 * PI / sampling_rate as f64,
            zero_amp_shift: params.zero_amp_shift,
        })
    }

    /// Links the peaks of consecutive frames into tracks.
    ///
    /// `frames` must be in increasing time order and contain no empty frame.
    pub fn generate(&self, frames: &[AnalysisFrame]) -> Result<SinusoidalTracks> {
        let mut tracks: Vec<SinusoidalTrack> = Vec::new();
        let mut live: Vec<usize> = Vec::new();
        let mut last_time = f64::NEG_INFINITY;

        for frame in frames {
            if frame.time <= 0.0 || frame.time <= last_time {
                log::debug!("skipping frame at {:.4}s", frame.time);
                continue;
            }
            last_time = frame.time;

            let track_freqs: Vec<f64> = live
                .iter()
                .map(|&t| tracks[t].last().map_or(0.0, |p| p.frequency))
                .collect();
            let claims = match_peaks(&track_freqs, &frame.peaks, self.delta);

            let mut matched = vec![false; live.len()];
            for (peak_idx, claim) in claims.iter().enumerate() {
                let peak = &frame.peaks[peak_idx];
                match claim {
                    Some(slot) => {
                        matched[*slot] = true;
                        tracks[live[*slot]].push(TrackPoint::active(frame.time, peak));
                    }
                    None => tracks.push(self.birth(frame.time, peak)),
                }
            }

            let mut still_live = Vec::with_capacity(live.len() + frame.peaks.len());
            for (slot, &t) in live.iter().enumerate() {
                if matched[slot] {
                    still_live.push(t);
                } else {
                    self.turn_off(&mut tracks[t]);
                }
            }
            // Tracks born this frame sit at the end of `tracks`.
            let born = claims.iter().filter(|c| c.is_none()).count();
            still_live.extend(tracks.len() - born..tracks.len());
            live = still_live;
        }

        for &t in &live {
            self.turn_off(&mut tracks[t]);
        }

        if tracks.is_empty() {
            return Err(SinusoidalError::NoTracks);
        }

        let mut out = SinusoidalTracks::new(self.sampling_rate);
        for mut track in tracks {
            track.shrink_to_fit();
            out.push(track);
        }
        Ok(out)
    }

    /// A new track: a zero-amplitude guard point, then the peak itself.
    fn birth(&self, time: f64, peak: &Sinusoid) -> SinusoidalTrack {
        let guard_time = time - self.zero_amp_shift;
        let lead = self.zero_amp_shift * self.sampling_rate as f64;
        let mut track = SinusoidalTrack::with_capacity(8);
        track.push(TrackPoint {
            time: guard_time,
            amplitude: 0.0,
            frequency: peak.frequency,
            phase: peak.phase - peak.frequency * lead,
            state: TrackState::TurnedOn,
            frame_index: None,
        });
        track.push(TrackPoint::active(time, peak));
        track
    }

    /// Appends the zero-amplitude guard point that ends a track.
    fn turn_off(&self, track: &mut SinusoidalTrack) {
        let Some(&last) = track.last() else {
            return;
        };
        if last.state == TrackState::TurnedOff {
            return;
        }
        let lag = self.zero_amp_shift * self.sampling_rate as f64;
        track.push(TrackPoint {
            time: last.time + self.zero_amp_shift,
            amplitude: 0.0,
            frequency: last.frequency,
            phase: last.phase + last.frequency * lag,
            state: TrackState::TurnedOff,
            frame_index: None,
        });
    }
}

/// Assigns peaks to tracks. Returns, per peak, the index of the track that
/// keeps it.
///
/// Tracks propose in order; a claimed peak goes to the strictly closer track,
/// so an earlier claim wins ties. Among equidistant peaks a track prefers the
/// lower bin.
fn match_peaks(track_freqs: &[f64], peaks: &[Sinusoid], delta: f64) -> Vec<Option<usize>> {
    let mut claims: Vec<Option<usize>> = vec![None; peaks.len()];
    let mut excluded = vec![vec![false; peaks.len()]; track_freqs.len()];
    let mut queue: VecDeque<usize> = (0..track_freqs.len()).collect();

    while let Some(t) = queue.pop_front() {
        let f = track_freqs[t];
        let mut best: Option<(usize, f64)> = None;
        for (p, peak) in peaks.iter().enumerate() {
            if excluded[t][p] {
                continue;
            }
            let dist = (peak.frequency - f).abs();
            if dist <= delta && best.map_or(true, |(_, d)| dist < d) {
                best = Some((p, dist));
            }
        }
        let Some((p, dist)) = best else {
            continue;
        };
        match claims[p] {
            None => claims[p] = Some(t),
            Some(holder) => {
                let held = (peaks[p].frequency - track_freqs[holder]).abs();
                if dist < held {
                    claims[p] = Some(t);
                    excluded[holder][p] = true;
                    queue.push_back(holder);
                } else {
                    excluded[t][p] = true;
                    queue.push_back(t);
                }
            }
        }
    }
    claims
}
