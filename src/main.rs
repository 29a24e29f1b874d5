mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::Path;

use cli::Cli;
use sinmod::config::{self, AnalysisParams, ModificationParams, SynthesisParams, TrackingParams};
use sinmod::encode::{write_wav, SampleDepth};
use sinmod::pitch::{self, PitchMarks, ScaleContour};
use sinmod::{audio, SinusoidalAnalyzer, Synthesizer, TrackModifier, TrackStatistics, WindowType};

#[derive(Serialize)]
struct StatsReport {
    input: String,
    sampling_rate: u32,
    analysis: TrackStatistics,
    modified: Option<TrackStatistics>,
    output_samples: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let mut analysis = AnalysisParams::default();
    let mut tracking = TrackingParams::default();
    let mut synthesis = SynthesisParams::default();

    // Explicit --config path, or auto-detect sinmod.toml / global config
    let config_path = cli.config.clone().or_else(config::discover_config);
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.window == WindowType::Hamming { cli.window = cfg.analysis.window_type; }
            if cli.window_size == 0.02 { cli.window_size = cfg.analysis.window_size; }
            if cli.skip_size == 0.01 { cli.skip_size = cfg.analysis.skip_size; }
            if cli.delta_hz == config::DEFAULT_DELTA_IN_HZ { cli.delta_hz = cfg.tracking.delta_in_hz; }
            if cli.level == 0.9 { cli.level = cfg.synthesis.abs_max_desired; }
            if !cli.quiet { cli.quiet = cfg.synthesis.silent; }
            analysis = cfg.analysis;
            tracking = cfg.tracking;
            synthesis = cfg.synthesis;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let analysis = analysis
        .with_window_type(cli.window)
        .with_window_size(cli.window_size)
        .with_skip_size(cli.skip_size);
    let tracking = tracking.with_delta_in_hz(cli.delta_hz);

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("sinmod - sinusoidal analysis and resynthesis");
    log::info!("Input: {}", cli.input.display());
    log::info!("Output: {}", cli.output.display());

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio_data = audio::decode_audio(&cli.input)
        .with_context(|| format!("Failed to decode {}", cli.input.display()))?;
    let fs = audio_data.sample_rate;
    let signal = &audio_data.samples;

    // 2. Pitch information
    let f0s = match cli.f0 {
        Some(ref path) => Some(read_values::<f64>(path).context("Failed to read F0 contour")?),
        None => None,
    };
    let marks = match (&cli.pitch_marks, &f0s) {
        (Some(path), _) => {
            let marks = read_values::<usize>(path).context("Failed to read pitch marks")?;
            Some(PitchMarks::new(marks).context("Invalid pitch marks")?)
        }
        (None, Some(f0s)) => Some(
            pitch::contour_to_pitch_marks(f0s, fs, signal.len(), cli.f0_window, cli.f0_skip, true)
                .context("Failed to derive pitch marks from the F0 contour")?,
        ),
        (None, None) => None,
    };
    if let Some(ref marks) = marks {
        log::info!("Pitch marks: {}", marks.len());
    }

    // 3. Analysis
    log::info!("Analysing...");
    let analyzer = SinusoidalAnalyzer::new(fs, analysis, tracking)
        .context("Invalid analysis parameters")?
        .with_silent(cli.quiet);
    let tracks = if cli.pitch_synchronous {
        let marks = marks
            .as_ref()
            .context("--pitch-synchronous needs --f0 or --pitch-marks")?;
        analyzer.analyze_pitch_synchronous(signal, marks, cli.fixed_skip)?
    } else {
        analyzer.analyze_fixed_rate(signal)?
    };
    let analysis_stats = tracks.statistics();

    // 4. Modification
    let duration = tracks.original_duration;
    let plan = ModificationParams::new(
        scale_contour(&cli.time_scale, duration).context("Invalid --time-scale")?,
        scale_contour(&cli.pitch_scale, duration).context("Invalid --pitch-scale")?,
    )
    .with_f0_sizing(cli.f0_window, cli.f0_skip);

    let (tracks, modified_stats) = if plan.is_identity() {
        (tracks, None)
    } else {
        log::info!("Modifying...");
        let marks = marks
            .as_ref()
            .context("Time/pitch scaling needs --f0 or --pitch-marks")?;
        let f0s = f0s.unwrap_or_else(|| {
            pitch::pitch_marks_to_contour(&marks.marks, cli.f0_window, cli.f0_skip, fs)
        });
        let modified = TrackModifier::new(plan)
            .context("Invalid modification parameters")?
            .modify(&tracks, &f0s, marks)?;
        let stats = modified.statistics();
        (modified, Some(stats))
    };

    // 5. Synthesis
    log::info!("Synthesizing...");
    let level = if cli.keep_level { tracks.abs_max_original } else { cli.level };
    let synthesizer = Synthesizer::new(
        &synthesis.with_abs_max_desired(level).with_silent(cli.quiet),
    )
    .context("Invalid synthesis parameters")?;
    let output = synthesizer.synthesize(&tracks)?;

    write_wav(&cli.output, &output, fs, SampleDepth::Int16)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    if let Some(ref path) = cli.stats_json {
        let report = StatsReport {
            input: cli.input.display().to_string(),
            sampling_rate: fs,
            analysis: analysis_stats,
            modified: modified_stats,
            output_samples: output.len(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        log::info!("Statistics written to {}", path.display());
    }

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

fn read_values<T: std::str::FromStr>(path: &Path) -> Result<Vec<T>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(pitch::parse_values(&text)?)
}

fn scale_contour(values: &[f64], duration: f64) -> Result<ScaleContour> {
    let contour = match values {
        [] => ScaleContour::identity(),
        [single] => ScaleContour::constant(*single),
        many => ScaleContour::from_breakpoints(many, None, duration)?,
    };
    contour.validate()?;
    Ok(contour)
}
