//! PCM decoding using symphonia
//!
//! Accepts any container/codec enabled in symphonia. Decoding is streamed:
//! measuring a track keeps no samples, and cutting an excerpt keeps only the
//! frames inside the window and stops after its last frame. Memory use is
//! bounded by the excerpt length, not by how far the upload decompresses.

use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::ExcerptWindow;
use crate::{Error, Result};

/// Decoded audio, interleaved (L, R, L, R, ... for stereo)
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
}

impl PcmBuffer {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Frames covered by `window` at `rate`, as `[first, end)`
///
/// The first frame is `floor(start * rate)` and the length is
/// `round((end - start) * rate)`.
pub fn frame_range(window: &ExcerptWindow, rate: u32) -> (u64, u64) {
    let rate = rate as f64;
    let first = (window.start.max(0.0) * rate).floor() as u64;
    let length = (window.length().max(0.0) * rate).round() as u64;
    (first, first.saturating_add(length))
}

/// An uploaded file held in memory, reopened for each decoding pass
#[derive(Debug, Clone)]
pub struct AudioSource {
    bytes: Arc<[u8]>,
    extension: Option<String>,
}

impl AudioSource {
    /// `extension` is only a probing hint; the container is detected from
    /// the bytes.
    pub fn new(bytes: Vec<u8>, extension: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            extension: extension.map(str::to_string),
        }
    }

    fn open(&self) -> Result<TrackReader> {
        let cursor = Cursor::new(Arc::clone(&self.bytes));
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = &self.extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Audio(format!("Unsupported audio format: {}", e)))?;
        let format = probed.format;

        let (track_id, codec_params) = {
            let track = format
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
                .ok_or_else(|| Error::Audio("No audio track found".to_string()))?;
            (track.id, track.codec_params.clone())
        };

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Audio(format!("Unsupported codec: {}", e)))?;

        Ok(TrackReader {
            format,
            decoder,
            track_id,
            sample_rate: codec_params.sample_rate,
            n_frames: codec_params.n_frames,
        })
    }
}

/// First audio track of an opened container
struct TrackReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    /// Declared by the container, when it knows
    sample_rate: Option<u32>,
    n_frames: Option<u64>,
}

impl TrackReader {
    /// Decode packets in order, handing each interleaved buffer to `sink`
    /// until it returns `Ok(false)` or the stream ends
    ///
    /// Corrupt packets are skipped, matching how players treat them.
    fn decode_with<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(SignalSpec, &[f32]) -> Result<bool>,
    {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(());
                }
                Err(SymphoniaError::ResetRequired) => return Ok(()),
                Err(e) => return Err(Error::Audio(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Audio(format!("Failed to decode packet: {}", e))),
            };

            let spec = *decoded.spec();
            if spec.rate == 0 || spec.channels.count() == 0 {
                return Err(Error::Audio("Track has no playable audio".to_string()));
            }

            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            if !sink(spec, buf.samples())? {
                return Ok(());
            }
        }
    }
}

fn check_track_length(duration: f64, max_seconds: f64) -> Result<()> {
    if duration > max_seconds {
        return Err(Error::Audio(format!(
            "Track is longer than the {:.0}s limit",
            max_seconds
        )));
    }
    Ok(())
}

/// Duration of the track in seconds, rejecting tracks over `max_seconds`
///
/// Uses the frame count the container declares; otherwise decodes without
/// keeping samples and stops as soon as the limit is passed.
pub fn track_duration(source: &AudioSource, max_seconds: f64) -> Result<f64> {
    let reader = source.open()?;

    match (reader.n_frames, reader.sample_rate) {
        (Some(frames), Some(rate)) if frames > 0 && rate > 0 => {
            let duration = frames as f64 / rate as f64;
            check_track_length(duration, max_seconds)?;
            Ok(duration)
        }
        _ => decoded_duration(reader, max_seconds),
    }
}

fn decoded_duration(mut reader: TrackReader, max_seconds: f64) -> Result<f64> {
    let mut frames: u64 = 0;
    let mut rate: u32 = 0;

    reader.decode_with(|spec, samples| {
        rate = spec.rate;
        frames += (samples.len() / spec.channels.count()) as u64;
        check_track_length(frames as f64 / rate as f64, max_seconds)?;
        Ok(true)
    })?;

    if frames == 0 {
        return Err(Error::Audio("Track has no playable audio".to_string()));
    }
    Ok(frames as f64 / rate as f64)
}

/// Decode only the frames inside `window`
pub fn decode_window(source: &AudioSource, window: &ExcerptWindow) -> Result<PcmBuffer> {
    let mut reader = source.open()?;

    let mut spec: Option<SignalSpec> = None;
    let mut range = (0u64, 0u64);
    let mut position: u64 = 0;
    let mut samples = Vec::new();

    reader.decode_with(|packet_spec, decoded| {
        let channels = packet_spec.channels.count();
        if spec.is_none() {
            spec = Some(packet_spec);
            range = frame_range(window, packet_spec.rate);
            samples.reserve(((range.1 - range.0) as usize).saturating_mul(channels));
        }

        let (first, end) = range;
        let frames = (decoded.len() / channels) as u64;
        let lo = first.max(position);
        let hi = end.min(position + frames);
        if lo < hi {
            let from = (lo - position) as usize * channels;
            let to = (hi - position) as usize * channels;
            samples.extend_from_slice(&decoded[from..to]);
        }

        position += frames;
        Ok(position < end)
    })?;

    let spec = spec.ok_or_else(|| Error::Audio("Track has no playable audio".to_string()))?;
    let pcm = PcmBuffer {
        sample_rate: spec.rate,
        channels: spec.channels.count() as u16,
        samples,
    };

    debug!(
        "Decoded {} frames ({:.2}s) at {} Hz, {} channel(s), stopped at frame {}",
        pcm.frames(),
        pcm.duration_seconds(),
        pcm.sample_rate,
        pcm.channels,
        position
    );

    Ok(pcm)
}
