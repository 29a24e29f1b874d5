use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, SinusoidalError};

/// A mono signal and its sampling rate.
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn decode_err(what: &str, e: impl std::fmt::Display) -> SinusoidalError {
    SinusoidalError::Decode(format!("{}: {}", what, e))
}

/// Decodes the first audio track of `path`, downmixed to mono.
pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_err("failed to probe audio format", e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SinusoidalError::Decode("no audio tracks found".into()))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SinusoidalError::Decode("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_err("failed to create audio decoder", e))?;

    let mut all_samples: Vec<f64> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(decode_err("failed to read packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(decode_err("failed to decode packet", e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f64>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            all_samples.extend(
                samples
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f64>() / channels as f64),
            );
        }
    }

    if all_samples.is_empty() {
        return Err(SinusoidalError::EmptySignal);
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.2}s",
        all_samples.len(),
        sample_rate,
        all_samples.len() as f64 / sample_rate as f64
    );

    Ok(AudioData {
        samples: all_samples,
        sample_rate,
    })
}
