//! The background-color probe: one query, one bounded read loop, always an
//! answer.
//!
//! [`probe`] dispatches the combined OSC 11 + DA1 query, then parses reply
//! events until the DA1 sentinel arrives, the deadline elapses, or the
//! stream ends. It never fails: whatever goes wrong, the caller gets a
//! color back, defaulting to opaque white (a light background is the safer
//! wrong guess for readability).

use std::io::{self, Write};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use crate::color::{Rgb, is_dark};
use crate::events::{EventParser, TerminalEvent};
use crate::query::send_query;
use crate::source::{Chunk, ChunkSource};
use crate::terminal::RawModeGuard;

/// How long a probe waits for the terminal before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything that can go wrong inside a probe.
///
/// None of these escalate to the caller; [`probe`] logs them and degrades
/// to its default answer instead.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Raw mode could not be entered: the descriptor is not a real
    /// terminal, or the platform call failed. The probe continues without
    /// raw mode.
    #[error("descriptor does not support raw mode: {0}")]
    UnsupportedDescriptor(#[source] io::Error),

    /// The deadline elapsed before the device-attributes sentinel arrived.
    /// The probe keeps whatever color it captured.
    #[error("deadline elapsed before the device attributes report")]
    QueryTimeout,

    /// Bytes matched neither recognized report shape. The offending
    /// sequence is skipped and parsing continues.
    #[error("malformed report payload: {0}")]
    MalformedSequence(String),

    /// The query write failed (stream closed, broken pipe). The probe
    /// still waits out the deadline; the terminal simply will not answer.
    #[error("failed to write terminal query: {0}")]
    WriteFailure(#[source] io::Error),
}

/// The outcome of one probe: a color, plus whether it is the fallback.
///
/// Constructed once per probe call; callers own it afterwards and are
/// expected to cache it for the lifetime of a session rather than
/// re-probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    color: Rgb,
    defaulted: bool,
}

impl ProbeResult {
    /// The background color the terminal reported, or opaque white if it
    /// never did.
    #[must_use]
    pub fn color(&self) -> Rgb {
        self.color
    }

    /// True when no background-color report arrived and the color is the
    /// white fallback.
    #[must_use]
    pub fn is_defaulted(&self) -> bool {
        self.defaulted
    }

    /// The light/dark verdict the rendering layer consumes: true when the
    /// background's relative luminance is below the midpoint.
    #[must_use]
    pub fn has_dark_background(&self) -> bool {
        is_dark(self.color)
    }
}

impl Default for ProbeResult {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            defaulted: true,
        }
    }
}

/// Query a terminal for its background color.
///
/// The algorithm, bounded end to end by `timeout`:
/// 1. If `allow_raw_mode` and the source exposes a descriptor, try to
///    enter raw mode; failure only means querying proceeds best-effort.
/// 2. Send the combined background-color + device-attributes query, once.
/// 3. Read and parse reply events. A background-color report updates the
///    candidate color but does not stop the loop - only the DA1 sentinel
///    does, because the color report may arrive first. Timeout and stream
///    end also stop the loop, keeping whatever was captured.
/// 4. Restore raw mode (by dropping the guard) before returning, on every
///    path.
///
/// Never returns an error: the theming consumer always needs some answer,
/// and a default light background is an acceptable degraded outcome.
pub fn probe<S, W>(
    source: &mut S,
    output: &mut W,
    timeout: Duration,
    allow_raw_mode: bool,
) -> ProbeResult
where
    S: ChunkSource,
    W: Write,
{
    let deadline = Instant::now() + timeout;

    let guard = if allow_raw_mode {
        enter_raw_mode(source)
    } else {
        None
    };

    if let Err(err) = send_query(output) {
        debug!("{err}");
    }

    let mut parser = EventParser::new();
    let mut result = ProbeResult::default();

    'reading: loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("{}", ProbeError::QueryTimeout);
            break;
        }

        match source.read_chunk(remaining) {
            Ok(Chunk::Data(bytes)) => {
                for event in parser.feed(&bytes) {
                    match event {
                        TerminalEvent::BackgroundColor(color) => {
                            debug!("background color report: {color:?}");
                            result.color = color;
                            result.defaulted = false;
                        }
                        TerminalEvent::PrimaryDeviceAttributes(attributes) => {
                            debug!("device attributes report: {attributes:?}");
                            break 'reading;
                        }
                        TerminalEvent::Unrecognized => {}
                    }
                }
            }
            Ok(Chunk::TimedOut) => {}
            Ok(Chunk::Eof) => {
                debug!("stream closed before the device attributes report");
                break;
            }
            Err(err) => {
                debug!("terminal read failed: {err}");
                break;
            }
        }
    }

    drop(guard);
    result
}

/// Attempt raw mode on the source's descriptor, best effort.
fn enter_raw_mode<S: ChunkSource>(source: &S) -> Option<RawModeGuard> {
    let fd = source.raw_fd()?;
    match RawModeGuard::enter(fd) {
        Ok(guard) => Some(guard),
        Err(err) => {
            debug!("{err}");
            None
        }
    }
}
