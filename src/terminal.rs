//! Terminal device access and scoped raw-mode control.
//!
//! Reading escape-sequence replies reliably requires the terminal to
//! deliver input byte-for-byte, without line buffering or echo. This module
//! provides:
//! - Opening the controlling terminal (`/dev/tty`) for direct access
//! - [`RawModeGuard`], a scoped raw-mode acquisition whose drop restores
//!   the saved attributes on every exit path

use std::fs::{File, OpenOptions};
use std::os::unix::io::RawFd;

use anyhow::{Context, Result};
use log::debug;
use termios::{ECHO, ICANON, TCSANOW, Termios, tcsetattr};

use crate::probe::ProbeError;

/// Open the controlling terminal for direct access.
///
/// Opens `/dev/tty` with both read and write permissions, which allows
/// direct communication with the terminal regardless of how stdin/stdout
/// are redirected.
///
/// # Errors
///
/// Fails when the process has no controlling terminal.
pub fn open_terminal_device() -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
        .context("Failed to open /dev/tty")
}

/// Exclusive, scoped ownership of a descriptor's raw input mode.
///
/// [`RawModeGuard::enter`] snapshots the current attributes and disables
/// canonical input processing and echo; dropping the guard restores the
/// snapshot. The guard is tied to one acquisition, so restoration happens
/// exactly once no matter how the enclosing probe exits.
///
/// The descriptor must stay open for the guard's lifetime; the probe keeps
/// the owning [`File`] alive alongside it.
#[derive(Debug)]
pub struct RawModeGuard {
    fd: RawFd,
    saved: Termios,
}

impl RawModeGuard {
    /// Put the descriptor into raw input mode (no canonical mode, no echo).
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::UnsupportedDescriptor`] when the descriptor is
    /// not a terminal or its attributes cannot be changed. Callers treat
    /// this as a reason to query without raw mode, not as a failure.
    pub fn enter(fd: RawFd) -> Result<Self, ProbeError> {
        let saved = Termios::from_fd(fd).map_err(ProbeError::UnsupportedDescriptor)?;

        let mut raw = saved;
        raw.c_lflag &= !(ICANON | ECHO);
        tcsetattr(fd, TCSANOW, &raw).map_err(ProbeError::UnsupportedDescriptor)?;

        Ok(Self { fd, saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = tcsetattr(self.fd, TCSANOW, &self.saved) {
            debug!("failed to restore terminal attributes: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_enter_rejects_non_terminal_descriptor() {
        let null = File::open("/dev/null").expect("/dev/null should open");
        let err = RawModeGuard::enter(null.as_raw_fd()).unwrap_err();
        assert!(matches!(err, ProbeError::UnsupportedDescriptor(_)));
    }

    #[test]
    fn test_raw_mode_round_trip_on_a_tty() {
        // Only meaningful when the test runner has a controlling terminal.
        let Ok(tty) = open_terminal_device() else {
            return;
        };
        let fd = tty.as_raw_fd();
        let before = Termios::from_fd(fd).expect("tty attributes should be readable");

        {
            let _guard = RawModeGuard::enter(fd).expect("tty should support raw mode");
            let during = Termios::from_fd(fd).expect("tty attributes should be readable");
            assert_eq!(during.c_lflag & ICANON, 0);
            assert_eq!(during.c_lflag & ECHO, 0);
        }

        let after = Termios::from_fd(fd).expect("tty attributes should be readable");
        assert_eq!(after.c_lflag, before.c_lflag);
    }
}
