//! Sinusoidal modelling of speech and music signals.
//!
//! A signal is cut into frames, each frame's spectral peaks become
//! [`Sinusoid`]s, and peaks of consecutive frames are linked into
//! [`SinusoidalTrack`]s. Tracks can be time- and pitch-scaled and are
//! resynthesised with cubic phase interpolation.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod encode;
pub mod error;
pub mod pitch;
pub mod sinusoidal;

pub use config::{AnalysisParams, ModificationParams, SynthesisParams, TrackingParams};
pub use dsp::{Window, WindowType};
pub use error::{Result, SinusoidalError};
pub use pitch::{PitchMarks, ScaleContour};
pub use sinusoidal::{
    ProsodyModifier, Schedule, Sinusoid, SinusoidalAnalyzer, SinusoidalTrack, SinusoidalTracks,
    Synthesizer, TrackModifier, TrackPoint, TrackState, TrackStatistics,
};
