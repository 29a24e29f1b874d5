use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

use crate::error::{Result, SinusoidalError};

/// Sample format of written WAV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleDepth {
    #[default]
    Int16,
    Float32,
}

/// Writes a mono WAV file. Samples are clamped to `[-1, 1]`.
pub fn write_wav(path: &Path, samples: &[f64], sample_rate: u32, depth: SampleDepth) -> Result<()> {
    if sample_rate == 0 {
        return Err(SinusoidalError::InvalidParameter(
            "sampling rate must be positive".into(),
        ));
    }
    let (bits_per_sample, sample_format) = match depth {
        SampleDepth::Int16 => (16, SampleFormat::Int),
        SampleDepth::Float32 => (32, SampleFormat::Float),
    };
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let mut clipped = 0usize;
    for &s in samples {
        if s.abs() > 1.0 {
            clipped += 1;
        }
        let s = s.clamp(-1.0, 1.0);
        match depth {
            SampleDepth::Int16 => writer.write_sample((s * i16::MAX as f64).round() as i16)?,
            SampleDepth::Float32 => writer.write_sample(s as f32)?,
        }
    }
    writer.finalize()?;

    if clipped > 0 {
        log::warn!("{} samples clipped while writing {}", clipped, path.display());
    }
    log::info!(
        "Wrote {} samples ({:.2}s) to {}",
        samples.len(),
        samples.len() as f64 / sample_rate as f64,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int16_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&path, &[0.5, 2.0, -3.0, 0.0], 16000, SampleDepth::Int16).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![16384, i16::MAX, -i16::MAX, 0]);
    }

    #[test]
    fn test_float32() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&path, &[0.25, -0.75], 8000, SampleDepth::Float32).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_format, SampleFormat::Float);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.25, -0.75]);
    }

    #[test]
    fn test_zero_rate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_wav(&dir.path().join("x.wav"), &[0.0], 0, SampleDepth::Int16).is_err());
    }
}
