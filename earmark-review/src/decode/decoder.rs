//! Whole-file decoding with symphonia

use super::{AudioLoader, Track};
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decodes WAV, FLAC, MP3 and raw PCM containers from start to end
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaLoader;

impl AudioLoader for SymphoniaLoader {
    fn load(&self, path: &Path) -> Result<Track> {
        decode_file(path)
    }
}

/// Decode an entire file to interleaved f32 samples
pub fn decode_file(path: &Path) -> Result<Track> {
    debug!("Decoding entire file: {}", path.display());

    let file = std::fs::File::open(path)
        .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to probe {}: {}", path.display(), e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode(format!("No audio track in {}", path.display())))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                warn!("Error reading packet from {}: {}", path.display(), e);
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);

                let needs_new = buffer
                    .as_ref()
                    .map(|b| b.capacity() < decoded.capacity() * spec.channels.count())
                    .unwrap_or(true);
                if needs_new {
                    buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = buffer.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Decode error in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(Error::Decode(format!("{}: {}", path.display(), e))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::Decode(format!("No sample rate for {}", path.display())))?;
    let channels =
        channels.ok_or_else(|| Error::Decode(format!("No channel count for {}", path.display())))?;

    debug!(
        "Decoded {} samples ({} frames) at {} Hz",
        samples.len(),
        samples.len() / channels.max(1) as usize,
        sample_rate
    );

    Ok(Track {
        samples,
        sample_rate,
        channels,
    })
}
