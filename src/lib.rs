//! Terminal background color probing for local and remote terminals.
//!
//! A single round trip over the OSC 11 / DA1 sub-protocol answers the one
//! question a theming layer needs: is this terminal's background light or
//! dark? The probe works against a local terminal descriptor (raw mode,
//! `poll(2)`) or against a remote pseudo-terminal reachable only through a
//! session's byte streams (no raw mode, abandoned-read timeout), always
//! under a hard deadline, and always returns an answer - opaque white when
//! the terminal never tells.

pub mod color;
pub mod events;
pub mod probe;
pub mod query;
pub mod session;
pub mod source;
pub mod terminal;

use std::time::Duration;

use anyhow::Result;
use log::debug;

pub use color::{Rgb, classify_color, is_dark, luminance, parse_rgb};
pub use events::{EventParser, TerminalEvent};
pub use probe::{DEFAULT_TIMEOUT, ProbeError, ProbeResult, probe};
pub use session::{SessionIo, pty_background, stream_background};

/// Detect the controlling terminal's background color.
///
/// Opens `/dev/tty` and runs the local-path probe against it: raw mode when
/// the terminal permits it, the OSC 11 / DA1 round trip, and a default of
/// opaque white if nothing comes back before `timeout`.
///
/// # Errors
///
/// Fails only when the process has no controlling terminal to probe; the
/// probe itself always produces a result.
pub fn detect_background(timeout: Duration) -> Result<ProbeResult> {
    let tty = terminal::open_terminal_device()?;
    let result = pty_background(&tty, timeout)?;

    debug!("color={:?}", result.color());
    debug!("lum={}", luminance(result.color()));
    debug!("dark={}", result.has_dark_background());

    Ok(result)
}
