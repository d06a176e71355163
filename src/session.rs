//! The two probe call sites: a local pty that may toggle raw mode, and a
//! remote or emulated session that must not.
//!
//! A session hands the probe an input stream, an output stream, and - when
//! the terminal is locally addressable - a pseudo-terminal handle. The
//! dispatch and parsing logic is identical either way; the paths differ
//! only in whether raw mode is attempted:
//! - [`pty_background`] owns a descriptor and may safely toggle its mode
//! - [`stream_background`] speaks the same protocol directly over the
//!   session's streams, without touching the remote client's terminal mode

use std::fs::File;
use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;

use crate::probe::{ProbeResult, probe};
use crate::source::{StreamSource, TtySource};

/// The I/O surface a session exposes to the probe.
///
/// Mirrors what an SSH session offers: its channel as input and output
/// streams, an optional pseudo-terminal handle when one was allocated
/// locally, and the terminal type the client declared. The terminal type
/// is carried for the rendering layer; the probe itself never reads it.
#[derive(Debug)]
pub struct SessionIo<R, W> {
    /// Readable side of the session.
    pub input: R,
    /// Writable side of the session.
    pub output: W,
    /// Local pseudo-terminal handle, when the terminal is addressable as a
    /// descriptor. Absent for remote or emulated terminals.
    pub pty: Option<File>,
    /// The terminal type string the client declared (e.g. `xterm-256color`).
    pub term: String,
}

impl<R, W> SessionIo<R, W>
where
    R: Read + Send + 'static,
    W: Write,
{
    /// Probe this session's terminal for its background color.
    ///
    /// Selects the pty path when a pty handle exists, the stream path
    /// otherwise. Always produces a result; a pty that cannot be probed
    /// degrades to the default instead of failing the session.
    pub fn background(self, timeout: Duration) -> ProbeResult {
        match self.pty {
            Some(ref pty) => pty_background(pty, timeout).unwrap_or_else(|err| {
                debug!("pty probe unavailable: {err:#}");
                ProbeResult::default()
            }),
            None => {
                let mut output = self.output;
                stream_background(self.input, &mut output, timeout)
            }
        }
    }
}

/// Probe a locally-addressable pseudo-terminal, raw mode permitted.
///
/// # Errors
///
/// Fails only when the handle cannot be prepared for reading (duplicate or
/// flag change failed); the probe itself never fails.
pub fn pty_background(pty: &File, timeout: Duration) -> Result<ProbeResult> {
    let reader = pty
        .try_clone()
        .context("Failed to duplicate the pty handle")?;
    let mut source =
        TtySource::new(reader).context("Failed to prepare the pty handle for reading")?;

    let mut writer = pty;
    Ok(probe(&mut source, &mut writer, timeout, true))
}

/// Probe over plain session streams, without raw-mode control.
///
/// For terminals that are remote or emulated, where toggling the client's
/// terminal mode is impossible or unsafe. Same protocol, best-effort
/// reading; a terminal that never answers costs the timeout and yields the
/// default.
pub fn stream_background<R, W>(input: R, output: &mut W, timeout: Duration) -> ProbeResult
where
    R: Read + Send + 'static,
    W: Write,
{
    let mut source = StreamSource::new(input);
    probe(&mut source, output, timeout, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::query::PROBE_QUERY;
    use std::io::Cursor;
    use std::time::Instant;

    #[test]
    fn test_stream_background_end_to_end() {
        let input = Cursor::new(b"\x1b]11;rgb:0000/0000/0000\x07\x1b[?1;2c".to_vec());
        let mut output = Vec::new();

        let start = Instant::now();
        let result = stream_background(input, &mut output, Duration::from_secs(1));

        assert_eq!(result.color(), Rgb::new(0, 0, 0));
        assert!(result.has_dark_background());
        assert_eq!(output, PROBE_QUERY);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_stream_background_defaults_on_silence() {
        // An empty stream closes immediately; EOF ends the probe early.
        let input = Cursor::new(Vec::new());
        let mut output = Vec::new();

        let result = stream_background(input, &mut output, Duration::from_millis(100));

        assert_eq!(result.color(), Rgb::WHITE);
        assert!(result.is_defaulted());
    }

    #[test]
    fn test_session_without_pty_takes_the_stream_path() {
        let session = SessionIo {
            input: Cursor::new(b"\x1b]11;rgb:ffff/ffff/ffff\x07\x1b[c".to_vec()),
            output: Vec::new(),
            pty: None,
            term: "xterm-256color".to_string(),
        };

        let result = session.background(Duration::from_secs(1));

        assert_eq!(result.color(), Rgb::WHITE);
        assert!(!result.is_defaulted());
        assert!(!result.has_dark_background());
    }
}
