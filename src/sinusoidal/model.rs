//! Sinusoids, tracks and track collections.

use serde::Serialize;

/// Guard interval, in seconds, between a track's first/last real sample and the
/// zero-amplitude sample that turns it on/off.
pub const ZERO_AMP_SHIFT: f64 = 0.005;

/// One spectral component estimated at one analysis instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sinusoid {
    /// Linear amplitude.
    pub amplitude: f64,
    /// Radians per sample, in `[0, PI]`.
    pub frequency: f64,
    /// Radians, interpreted modulo 2π.
    pub phase: f64,
    /// Index of the analysis frame this sinusoid was measured in. `None` for
    /// synthetic guard samples.
    pub frame_index: Option<usize>,
}

impl Sinusoid {
    pub fn new(amplitude: f64, frequency: f64, phase: f64) -> Self {
        Self {
            amplitude,
            frequency,
            phase,
            frame_index: None,
        }
    }

    pub fn with_frame_index(mut self, frame_index: usize) -> Self {
        self.frame_index = Some(frame_index);
        self
    }
}

/// Result of analysing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePeaks {
    /// Frame energy was below the analysis threshold or no peak qualified.
    Silent,
    /// Peaks in increasing bin order.
    Peaks(Vec<Sinusoid>),
}

impl FramePeaks {
    pub fn is_silent(&self) -> bool {
        matches!(self, FramePeaks::Silent)
    }

    pub fn into_peaks(self) -> Option<Vec<Sinusoid>> {
        match self {
            FramePeaks::Silent => None,
            FramePeaks::Peaks(p) => Some(p),
        }
    }
}

/// Peaks of one retained analysis frame together with its centre time.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFrame {
    /// Seconds.
    pub time: f64,
    pub peaks: Vec<Sinusoid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackState {
    Active,
    TurnedOn,
    TurnedOff,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    /// Seconds.
    pub time: f64,
    pub amplitude: f64,
    /// Radians per sample.
    pub frequency: f64,
    pub phase: f64,
    pub state: TrackState,
    pub frame_index: Option<usize>,
}

impl TrackPoint {
    pub fn active(time: f64, sinusoid: &Sinusoid) -> Self {
        Self {
            time,
            amplitude: sinusoid.amplitude,
            frequency: sinusoid.frequency,
            phase: sinusoid.phase,
            state: TrackState::Active,
            frame_index: sinusoid.frame_index,
        }
    }
}

/// One continuous spectral trajectory.
///
/// Points are appended in strictly increasing time order; they are never
/// inserted or reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinusoidalTrack {
    points: Vec<TrackPoint>,
}

impl SinusoidalTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Builds a track from points that already satisfy the time ordering.
    pub(crate) fn from_points(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    /// Appends a point. Points at or before the current last time are dropped
    /// and `false` is returned.
    pub fn push(&mut self, point: TrackPoint) -> bool {
        if let Some(last) = self.points.last() {
            if point.time <= last.time {
                return false;
            }
        }
        self.points.push(point);
        true
    }

    #[inline]
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn first(&self) -> Option<&TrackPoint> {
        self.points.first()
    }

    #[inline]
    pub fn last(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    /// A track is live until its last point is `TurnedOff`.
    pub fn is_live(&self) -> bool {
        self.points
            .last()
            .map_or(false, |p| p.state != TrackState::TurnedOff)
    }

    pub fn start_time(&self) -> f64 {
        self.points.first().map_or(0.0, |p| p.time)
    }

    pub fn end_time(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time)
    }

    pub fn duration(&self) -> f64 {
        self.end_time() - self.start_time()
    }

    pub fn active_count(&self) -> usize {
        self.points
            .iter()
            .filter(|p| p.state == TrackState::Active)
            .count()
    }

    /// Mean frequency over the active points, radians per sample.
    pub fn mean_frequency(&self) -> f64 {
        let (sum, n) = self
            .points
            .iter()
            .filter(|p| p.state == TrackState::Active)
            .fold((0.0, 0usize), |(s, n), p| (s + p.frequency, n + 1));
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    /// Releases any spare capacity left over from growth.
    pub fn shrink_to_fit(&mut self) {
        self.points.shrink_to_fit();
    }
}

/// A set of tracks extracted from (or destined for) one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SinusoidalTracks {
    pub tracks: Vec<SinusoidalTrack>,
    pub sampling_rate: u32,
    /// Seconds; the largest last-point time over all tracks.
    pub original_duration: f64,
    /// Absolute maximum of the analysed signal, 0 if unknown.
    pub abs_max_original: f64,
    /// Energy of the analysed signal, 0 if unknown.
    pub total_energy: f64,
}

impl SinusoidalTracks {
    pub fn new(sampling_rate: u32) -> Self {
        Self {
            tracks: Vec::new(),
            sampling_rate,
            original_duration: 0.0,
            abs_max_original: 0.0,
            total_energy: 0.0,
        }
    }

    pub fn push(&mut self, track: SinusoidalTrack) {
        self.original_duration = self.original_duration.max(track.end_time());
        self.tracks.push(track);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Recomputes `original_duration` from the tracks' last points.
    pub fn update_duration(&mut self) {
        self.original_duration = self
            .tracks
            .iter()
            .map(SinusoidalTrack::end_time)
            .fold(0.0, f64::max);
    }

    pub fn statistics(&self) -> TrackStatistics {
        TrackStatistics::from_tracks(self)
    }
}

/// Summary numbers over a track set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackStatistics {
    pub total_tracks: usize,
    pub total_active_sinusoids: usize,
    pub min_duration: f64,
    pub mean_duration: f64,
    pub max_duration: f64,
    pub original_duration: f64,
}

impl TrackStatistics {
    pub fn from_tracks(tracks: &SinusoidalTracks) -> Self {
        let total_tracks = tracks.len();
        let total_active_sinusoids = tracks.tracks.iter().map(|t| t.active_count()).sum();
        let durations = tracks.tracks.iter().map(SinusoidalTrack::duration);
        let (min_duration, max_duration, sum) = durations.fold(
            (f64::INFINITY, 0.0f64, 0.0),
            |(lo, hi, s), d| (lo.min(d), hi.max(d), s + d),
        );
        Self {
            total_tracks,
            total_active_sinusoids,
            min_duration: if total_tracks == 0 { 0.0 } else { min_duration },
            mean_duration: if total_tracks == 0 {
                0.0
            } else {
                sum / total_tracks as f64
            },
            max_duration,
            original_duration: tracks.original_duration,
        }
    }

    pub fn log(&self, label: &str) {
        log::info!(
            "{}: {} tracks, {} active sinusoids, duration min/mean/max = {:.3}/{:.3}/{:.3}s",
            label,
            self.total_tracks,
            self.total_active_sinusoids,
            self.min_duration,
            self.mean_duration,
            self.max_duration
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(time: f64, amplitude: f64, state: TrackState) -> TrackPoint {
        TrackPoint {
            time,
            amplitude,
            frequency: 0.1,
            phase: 0.0,
            state,
            frame_index: None,
        }
    }

    #[test]
    fn test_push_rejects_non_increasing_time() {
        let mut track = SinusoidalTrack::new();
        assert!(track.push(point(0.1, 0.0, TrackState::TurnedOn)));
        assert!(track.push(point(0.2, 1.0, TrackState::Active)));
        assert!(!track.push(point(0.2, 1.0, TrackState::Active)));
        assert!(!track.push(point(0.15, 1.0, TrackState::Active)));
        assert_eq!(track.len(), 2);
    }

    #[test]
    fn test_liveness_follows_last_state() {
        let mut track = SinusoidalTrack::new();
        assert!(!track.is_live());
        track.push(point(0.0, 0.0, TrackState::TurnedOn));
        track.push(point(0.1, 1.0, TrackState::Active));
        assert!(track.is_live());
        track.push(point(0.2, 0.0, TrackState::TurnedOff));
        assert!(!track.is_live());
        assert_eq!(track.active_count(), 1);
        assert!((track.duration() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_tracks_duration_and_deep_copy() {
        let mut tracks = SinusoidalTracks::new(16000);
        let mut a = SinusoidalTrack::new();
        a.push(point(0.0, 0.0, TrackState::TurnedOn));
        a.push(point(0.7, 0.0, TrackState::TurnedOff));
        tracks.push(a);
        assert!((tracks.original_duration - 0.7).abs() < 1e-12);

        let mut copy = tracks.clone();
        copy.tracks[0] = SinusoidalTrack::from_points(vec![
            point(0.0, 0.0, TrackState::TurnedOn),
            point(0.9, 0.0, TrackState::TurnedOff),
        ]);
        copy.update_duration();
        assert!((copy.original_duration - 0.9).abs() < 1e-12);
        assert!((tracks.tracks[0].end_time() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_statistics() {
        let mut tracks = SinusoidalTracks::new(8000);
        for end in [0.2, 0.4] {
            let mut t = SinusoidalTrack::new();
            t.push(point(0.0, 0.0, TrackState::TurnedOn));
            t.push(point(0.1, 1.0, TrackState::Active));
            t.push(point(end, 0.0, TrackState::TurnedOff));
            tracks.push(t);
        }
        let stats = tracks.statistics();
        assert_eq!(stats.total_tracks, 2);
        assert_eq!(stats.total_active_sinusoids, 2);
        assert!((stats.mean_duration - 0.3).abs() < 1e-12);
        assert!((stats.min_duration - 0.2).abs() < 1e-12);
        assert!((stats.max_duration - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = SinusoidalTracks::new(8000).statistics();
        assert_eq!(stats.total_tracks, 0);
        assert_eq!(stats.min_duration, 0.0);
    }
}
