//! Deadline-bounded, chunked input sources.
//!
//! The probe must never block past its deadline, even against a terminal
//! that answers partially or not at all. [`ChunkSource`] is the seam: each
//! call waits for whatever bytes are currently available, bounded by the
//! caller-supplied wait, and distinguishes "nothing yet" from "stream
//! closed".
//!
//! Two implementations cover the two call sites:
//! - [`TtySource`] for a real descriptor (local tty or pty slave), using
//!   non-blocking reads behind `poll(2)`
//! - [`StreamSource`] for remote or emulated sessions where only a byte
//!   stream exists, using a detached reader thread so a read still pending
//!   at the deadline is abandoned rather than joined

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use log::debug;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::poll::{PollFd, PollFlags, poll};

/// Read size per chunk; terminal reports are far smaller than this.
const CHUNK_SIZE: usize = 64;

/// Longest single `poll(2)` slice, so the read loop re-checks its deadline
/// at least four times a second.
const POLL_SLICE_MS: u8 = 250;

/// One bounded read from a terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Bytes that arrived within the wait.
    Data(Vec<u8>),
    /// Nothing arrived before the wait elapsed; the caller decides whether
    /// its own deadline still has time left.
    TimedOut,
    /// The stream is closed; no further bytes will ever arrive.
    Eof,
}

/// A source of input chunks with a bounded wait per read.
pub trait ChunkSource {
    /// Wait up to `wait` for the next batch of bytes.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the underlying stream. Callers treat
    /// an error like [`Chunk::Eof`]: stop reading, keep what was captured.
    fn read_chunk(&mut self, wait: Duration) -> io::Result<Chunk>;

    /// The raw descriptor behind this source, when there is one.
    ///
    /// The probe only attempts raw mode on sources that expose one.
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

/// Chunked reads from a terminal descriptor via `poll(2)`.
///
/// The descriptor is switched to non-blocking for the lifetime of the
/// source; the original flags are restored on drop.
#[derive(Debug)]
pub struct TtySource {
    file: File,
    saved_flags: OFlag,
}

impl TtySource {
    /// Take over a descriptor-backed file for chunked reading.
    ///
    /// # Errors
    ///
    /// Fails when the descriptor flags cannot be read or changed.
    pub fn new(file: File) -> io::Result<Self> {
        let flags = fcntl(&file, FcntlArg::F_GETFL).map_err(io::Error::from)?;
        let saved_flags = OFlag::from_bits_truncate(flags);

        fcntl(&file, FcntlArg::F_SETFL(saved_flags | OFlag::O_NONBLOCK))
            .map_err(io::Error::from)?;

        Ok(Self { file, saved_flags })
    }
}

impl ChunkSource for TtySource {
    fn read_chunk(&mut self, wait: Duration) -> io::Result<Chunk> {
        let slice = u8::try_from(wait.as_millis())
            .unwrap_or(POLL_SLICE_MS)
            .min(POLL_SLICE_MS);

        let pollfd = PollFd::new(self.file.as_fd(), PollFlags::POLLIN);
        match poll(&mut [pollfd], slice) {
            Ok(0) => Ok(Chunk::TimedOut),
            Ok(_) => {
                let mut buf = [0u8; CHUNK_SIZE];
                match self.file.read(&mut buf) {
                    Ok(0) => {
                        debug!("got EOF");
                        Ok(Chunk::Eof)
                    }
                    Ok(n) => Ok(Chunk::Data(buf[..n].to_vec())),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(Chunk::TimedOut),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(io::Error::from(err)),
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.file.as_raw_fd())
    }
}

impl Drop for TtySource {
    fn drop(&mut self) {
        if let Err(err) = fcntl(&self.file, FcntlArg::F_SETFL(self.saved_flags)) {
            debug!("failed to restore descriptor flags: {err}");
        }
    }
}

/// Chunked reads from a plain byte stream, for sessions with no local
/// descriptor (remote or emulated terminals reachable only through
/// session I/O).
///
/// A detached reader thread performs the blocking reads and forwards
/// chunks over a channel; [`ChunkSource::read_chunk`] is a
/// `recv_timeout`. When the probe's deadline fires while a read is still
/// pending, the source is simply dropped and the thread is left to finish
/// or die with its stream - it is never joined, so the probe returns
/// promptly.
#[derive(Debug)]
pub struct StreamSource {
    chunks: Receiver<Vec<u8>>,
}

impl StreamSource {
    /// Spawn the reader thread over the given input stream.
    pub fn new<R: Read + Send + 'static>(mut input: R) -> Self {
        let (tx, chunks) = mpsc::channel::<Vec<u8>>();

        let spawned = thread::Builder::new()
            .name("umbra-session-read".into())
            .spawn(move || {
                let mut buf = [0u8; CHUNK_SIZE];
                loop {
                    match input.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                // Receiver gone: the probe finished first.
                                break;
                            }
                        }
                    }
                }
            });

        // A failed spawn drops the sender, which the receiver observes as
        // a closed stream.
        if let Err(err) = spawned {
            debug!("failed to spawn session reader: {err}");
        }

        Self { chunks }
    }
}

impl ChunkSource for StreamSource {
    fn read_chunk(&mut self, wait: Duration) -> io::Result<Chunk> {
        match self.chunks.recv_timeout(wait) {
            Ok(bytes) => Ok(Chunk::Data(bytes)),
            Err(RecvTimeoutError::Timeout) => Ok(Chunk::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Ok(Chunk::Eof),
        }
    }
}
