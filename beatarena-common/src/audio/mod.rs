//! Audio excerpt handling
//!
//! An uploaded track is measured, a bounded-length window is chosen (by the
//! producer or at random), and only that window is decoded and re-encoded as
//! a 16-bit PCM WAV. Only the excerpt is stored and played during voting.

pub mod decode;
pub mod excerpt;
pub mod wav;

pub use decode::{decode_window, frame_range, track_duration, AudioSource, PcmBuffer};
pub use excerpt::{select_window, ExcerptWindow};
pub use wav::encode_wav;

use crate::{Error, Result};
use rand::Rng;

/// Bounds applied while cutting an excerpt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExcerptLimits {
    /// Longest excerpt kept, in seconds
    pub max_excerpt_seconds: f64,
    /// Longest uploaded track accepted, in seconds
    pub max_track_seconds: f64,
}

/// Result of cutting an excerpt out of an uploaded track
#[derive(Debug, Clone)]
pub struct Excerpt {
    /// Window that was cut, in seconds from the start of the track
    pub window: ExcerptWindow,
    /// Duration of the whole uploaded track in seconds
    pub track_duration: f64,
    /// Encoded WAV bytes
    pub wav: Vec<u8>,
}

/// Measure `bytes`, choose the excerpt window and encode it as WAV
///
/// `extension` is a decoder hint (e.g. "mp3"); `requested` is the window the
/// producer picked, if any.
pub fn extract_excerpt<R: Rng + ?Sized>(
    bytes: Vec<u8>,
    extension: Option<&str>,
    requested: Option<ExcerptWindow>,
    limits: ExcerptLimits,
    rng: &mut R,
) -> Result<Excerpt> {
    let source = AudioSource::new(bytes, extension);
    let track_duration = track_duration(&source, limits.max_track_seconds)?;
    let window = select_window(track_duration, requested, limits.max_excerpt_seconds, rng)?;

    let pcm = decode_window(&source, &window)?;
    if pcm.frames() == 0 {
        return Err(Error::Audio("Excerpt window contains no audio".to_string()));
    }
    let wav = encode_wav(&pcm)?;

    Ok(Excerpt {
        window,
        track_duration,
        wav,
    })
}
