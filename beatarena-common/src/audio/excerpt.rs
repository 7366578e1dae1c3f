//! Excerpt window selection
//!
//! A window is a `[start, end)` range in seconds. It is never longer than the
//! configured maximum and always lies inside the track.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Slack allowed when a requested end overshoots the decoded duration
/// (container durations and decoded frame counts rarely agree exactly)
pub const END_TOLERANCE_SECONDS: f64 = 0.001;

/// Excerpt window in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExcerptWindow {
    pub start: f64,
    pub end: f64,
}

impl ExcerptWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Choose the excerpt window for a track of `duration` seconds
///
/// Without a request, a track no longer than `max_seconds` is taken whole and
/// a longer one gets a random start in `[0, duration - max_seconds]`.
/// A requested window is validated and its end clamped to the duration.
pub fn select_window<R: Rng + ?Sized>(
    duration: f64,
    requested: Option<ExcerptWindow>,
    max_seconds: f64,
    rng: &mut R,
) -> Result<ExcerptWindow> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(Error::Audio("Track has no playable audio".to_string()));
    }

    match requested {
        Some(window) => validate_window(window, duration, max_seconds),
        None => Ok(random_window(duration, max_seconds, rng)),
    }
}

fn random_window<R: Rng + ?Sized>(duration: f64, max_seconds: f64, rng: &mut R) -> ExcerptWindow {
    if duration <= max_seconds {
        return ExcerptWindow::new(0.0, duration);
    }

    let latest_start = duration - max_seconds;
    let start = rng.gen_range(0.0..=latest_start);
    ExcerptWindow::new(start, start + max_seconds)
}

fn validate_window(window: ExcerptWindow, duration: f64, max_seconds: f64) -> Result<ExcerptWindow> {
    let ExcerptWindow { start, end } = window;

    if !(start.is_finite() && end.is_finite()) {
        return Err(Error::InvalidInput("Extract bounds must be numbers".to_string()));
    }
    if start < 0.0 {
        return Err(Error::InvalidInput("Extract start must not be negative".to_string()));
    }
    if end <= start {
        return Err(Error::InvalidInput("Extract end must be after extract start".to_string()));
    }
    if end > duration + END_TOLERANCE_SECONDS {
        return Err(Error::InvalidInput(format!(
            "Extract end {:.3}s is past the end of the track ({:.3}s)",
            end, duration
        )));
    }

    let end = end.min(duration);
    if start >= end {
        return Err(Error::InvalidInput("Extract start is past the end of the track".to_string()));
    }
    if end - start > max_seconds + END_TOLERANCE_SECONDS {
        return Err(Error::InvalidInput(format!(
            "Extract is {:.3}s long, maximum is {:.0}s",
            end - start,
            max_seconds
        )));
    }

    // Rounding overshoot is trimmed so the excerpt never exceeds the maximum
    let end = end.min(start + max_seconds);

    Ok(ExcerptWindow::new(start, end))
}
