use clap::Parser;
use std::path::PathBuf;

use sinmod::WindowType;

#[derive(Parser, Debug)]
#[command(name = "sinmod", about = "Sinusoidal analysis, prosody modification and resynthesis")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output WAV file
    #[arg(short, long, default_value = "output.wav")]
    pub output: PathBuf,

    /// Analyse pitch-synchronously (needs --f0 or --pitch-marks)
    #[arg(long)]
    pub pitch_synchronous: bool,

    /// With --pitch-synchronous, advance frames by the skip size instead of
    /// placing them between pitch marks
    #[arg(long)]
    pub fixed_skip: bool,

    /// F0 contour file, one value in Hz per line (0 = unvoiced)
    #[arg(long)]
    pub f0: Option<PathBuf>,

    /// Window size of the F0 contour in seconds
    #[arg(long, default_value_t = 0.02)]
    pub f0_window: f64,

    /// Skip size of the F0 contour in seconds
    #[arg(long, default_value_t = 0.01)]
    pub f0_skip: f64,

    /// Pitch mark file, one sample index per line
    #[arg(long)]
    pub pitch_marks: Option<PathBuf>,

    /// Time scale factor, or comma-separated breakpoints spread evenly over
    /// the signal
    #[arg(long, value_delimiter = ',', default_value = "1.0")]
    pub time_scale: Vec<f64>,

    /// Pitch scale factor, or comma-separated breakpoints
    #[arg(long, value_delimiter = ',', default_value = "1.0")]
    pub pitch_scale: Vec<f64>,

    /// Maximum frequency jump in Hz for a peak to continue a track
    #[arg(long, default_value_t = 50.0)]
    pub delta_hz: f64,

    /// Analysis window
    #[arg(long, value_enum, default_value_t = WindowType::Hamming)]
    pub window: WindowType,

    /// Analysis window size in seconds
    #[arg(long, default_value_t = 0.02)]
    pub window_size: f64,

    /// Analysis skip size in seconds
    #[arg(long, default_value_t = 0.01)]
    pub skip_size: f64,

    /// Peak level of the output signal
    #[arg(long, default_value_t = 0.9)]
    pub level: f64,

    /// Resynthesise at the input's peak level instead of --level
    #[arg(long)]
    pub keep_level: bool,

    /// Write track statistics as JSON to this file
    #[arg(long)]
    pub stats_json: Option<PathBuf>,

    /// Config file (defaults to sinmod.toml or the user config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,
}
