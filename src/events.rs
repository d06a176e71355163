//! Typed terminal report events and the incremental escape-sequence parser.
//!
//! Terminals answer the probe's queries asynchronously, with no length
//! prefix, possibly split across reads. This module turns that byte stream
//! into a lazy sequence of [`TerminalEvent`]s:
//! - The OSC 11 background-color report becomes
//!   [`TerminalEvent::BackgroundColor`]
//! - The DA1 primary-device-attributes report becomes
//!   [`TerminalEvent::PrimaryDeviceAttributes`]
//! - Everything else is consumed and folded into
//!   [`TerminalEvent::Unrecognized`] so parsing never stalls on noise
//!
//! A truncated sequence at the end of a chunk is carried over and retried
//! when the next chunk arrives.

use log::debug;

use crate::color::{Rgb, parse_rgb};
use crate::probe::ProbeError;

/// Escape introducer.
const ESC: u8 = 0x1b;

/// BEL, one of the two OSC terminators.
const BEL: u8 = 0x07;

/// Upper bound on buffered bytes while waiting for a terminator. A stream
/// that never terminates a sequence gets flushed as noise instead of
/// growing the buffer without bound.
const MAX_PENDING: usize = 256;

/// A single parsed terminal report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// The terminal's reported background color (OSC 11 reply).
    BackgroundColor(Rgb),
    /// The primary device attributes report (DA1 reply). Its arrival means
    /// the terminal has answered everything it is going to answer for this
    /// request batch; the attribute codes themselves are not interpreted.
    PrimaryDeviceAttributes(Vec<u16>),
    /// Any other consumed bytes: noise, unknown escapes, malformed reports.
    Unrecognized,
}

/// Outcome of scanning the front of the pending buffer.
enum Scan {
    /// A complete event, consuming the given number of bytes.
    Event(TerminalEvent, usize),
    /// The buffer holds a sequence prefix; wait for more bytes.
    Incomplete,
}

/// Incremental parser over chunked terminal output.
///
/// Feed it whatever bytes are currently available; it yields the events
/// completed so far and keeps a partial trailing sequence for the next
/// call.
#[derive(Debug, Default)]
pub struct EventParser {
    pending: Vec<u8>,
}

impl EventParser {
    /// Create a parser with an empty carry-over buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of bytes and return the events completed by it.
    ///
    /// Unterminated trailing bytes are kept and retried on the next call,
    /// up to a fixed cap; past that they are flushed as
    /// [`TerminalEvent::Unrecognized`].
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TerminalEvent> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while !self.pending.is_empty() {
            match scan(&self.pending) {
                Scan::Event(event, used) => {
                    self.pending.drain(..used);
                    events.push(event);
                }
                Scan::Incomplete => {
                    if self.pending.len() > MAX_PENDING {
                        debug!(
                            "flushing {} unterminated bytes as noise",
                            self.pending.len()
                        );
                        self.pending.clear();
                        events.push(TerminalEvent::Unrecognized);
                    }
                    break;
                }
            }
        }
        events
    }
}

/// Scan the front of a non-empty buffer for the next event.
fn scan(buf: &[u8]) -> Scan {
    if buf[0] != ESC {
        // A run of non-escape bytes can never become a report.
        let run = buf.iter().position(|&b| b == ESC).unwrap_or(buf.len());
        return Scan::Event(TerminalEvent::Unrecognized, run);
    }
    if buf.len() < 2 {
        return Scan::Incomplete;
    }
    match buf[1] {
        b']' => scan_osc(buf),
        b'[' => scan_csi(buf),
        // Some other two-byte escape; consume it and move on.
        _ => Scan::Event(TerminalEvent::Unrecognized, 2),
    }
}

/// Scan an OSC sequence (`ESC ]` ... `BEL` or `ESC \`).
fn scan_osc(buf: &[u8]) -> Scan {
    let mut i = 2;
    while i < buf.len() {
        match buf[i] {
            BEL => return Scan::Event(osc_event(&buf[2..i]), i + 1),
            ESC => {
                let Some(&next) = buf.get(i + 1) else {
                    return Scan::Incomplete;
                };
                if next == b'\\' {
                    return Scan::Event(osc_event(&buf[2..i]), i + 2);
                }
                // An escape that is not ST means the report was never
                // terminated; surrender the bytes before it as noise.
                return Scan::Event(TerminalEvent::Unrecognized, i);
            }
            _ => i += 1,
        }
    }
    Scan::Incomplete
}

/// Interpret a terminated OSC payload.
fn osc_event(payload: &[u8]) -> TerminalEvent {
    let Ok(text) = std::str::from_utf8(payload) else {
        return TerminalEvent::Unrecognized;
    };
    let Some(spec) = text.trim_start().strip_prefix("11;") else {
        return TerminalEvent::Unrecognized;
    };
    match parse_rgb(spec) {
        Ok(rgb) => TerminalEvent::BackgroundColor(rgb),
        Err(err) => {
            debug!(
                "discarding report: {}",
                ProbeError::MalformedSequence(format!("{err:#}"))
            );
            TerminalEvent::Unrecognized
        }
    }
}

/// Scan a CSI sequence (`ESC [` params ... final byte).
fn scan_csi(buf: &[u8]) -> Scan {
    let mut i = 2;
    while i < buf.len() {
        let b = buf[i];
        // 0x40-0x7e is the CSI final-byte range.
        if (0x40..=0x7e).contains(&b) {
            let event = if b == b'c' {
                TerminalEvent::PrimaryDeviceAttributes(parse_attributes(&buf[2..i]))
            } else {
                TerminalEvent::Unrecognized
            };
            return Scan::Event(event, i + 1);
        }
        i += 1;
    }
    Scan::Incomplete
}

/// Parse DA1 parameter bytes (`?1;2` in `ESC [ ? 1 ; 2 c`) into attribute
/// codes. Non-numeric fragments are skipped; the sentinel is valid with any
/// payload, including an empty one.
fn parse_attributes(params: &[u8]) -> Vec<u16> {
    params
        .split(|&b| b == b';')
        .filter_map(|chunk| {
            let s = std::str::from_utf8(chunk).ok()?;
            s.trim_start_matches(['?', '>']).trim().parse().ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_report_bel_terminated() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b]11;rgb:0000/0000/0000\x07");
        assert_eq!(
            events,
            vec![TerminalEvent::BackgroundColor(Rgb::new(0, 0, 0))]
        );
    }

    #[test]
    fn test_background_report_st_terminated() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b]11;rgb:1234/5678/9abc\x1b\\");
        assert_eq!(
            events,
            vec![TerminalEvent::BackgroundColor(Rgb::new(
                0x1234, 0x5678, 0x9abc
            ))]
        );
    }

    #[test]
    fn test_device_attributes_report() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b[?1;2c");
        assert_eq!(
            events,
            vec![TerminalEvent::PrimaryDeviceAttributes(vec![1, 2])]
        );
    }

    #[test]
    fn test_device_attributes_empty_payload_is_still_sentinel() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b[c");
        assert_eq!(events, vec![TerminalEvent::PrimaryDeviceAttributes(vec![])]);
    }

    #[test]
    fn test_color_then_sentinel_in_one_chunk() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b]11;rgb:ffff/ffff/ffff\x07\x1b[?1;2c");
        assert_eq!(
            events,
            vec![
                TerminalEvent::BackgroundColor(Rgb::WHITE),
                TerminalEvent::PrimaryDeviceAttributes(vec![1, 2]),
            ]
        );
    }

    #[test]
    fn test_report_split_across_chunks() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"\x1b]11;rgb:ff").is_empty());
        assert!(parser.feed(b"ff/ffff/ff").is_empty());
        let events = parser.feed(b"ff\x07");
        assert_eq!(events, vec![TerminalEvent::BackgroundColor(Rgb::WHITE)]);
    }

    #[test]
    fn test_noise_is_consumed_without_stalling() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"hello world\x1b[?62;22c");
        assert_eq!(
            events,
            vec![
                TerminalEvent::Unrecognized,
                TerminalEvent::PrimaryDeviceAttributes(vec![62, 22]),
            ]
        );
    }

    #[test]
    fn test_unrelated_csi_report_is_unrecognized() {
        let mut parser = EventParser::new();
        // DSR reply, not DA1
        let events = parser.feed(b"\x1b[0n");
        assert_eq!(events, vec![TerminalEvent::Unrecognized]);
    }

    #[test]
    fn test_wrong_osc_number_is_unrecognized() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b]10;rgb:0000/0000/0000\x07");
        assert_eq!(events, vec![TerminalEvent::Unrecognized]);
    }

    #[test]
    fn test_malformed_color_payload_is_unrecognized() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b]11;nonsense\x07");
        assert_eq!(events, vec![TerminalEvent::Unrecognized]);

        // Parsing continues after the bad report
        let events = parser.feed(b"\x1b[?1;2c");
        assert_eq!(
            events,
            vec![TerminalEvent::PrimaryDeviceAttributes(vec![1, 2])]
        );
    }

    #[test]
    fn test_osc_payload_with_leading_whitespace() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b] 11;rgb:ffff/8000/0000\x07");
        assert_eq!(
            events,
            vec![TerminalEvent::BackgroundColor(Rgb::new(0xffff, 0x8000, 0))]
        );
    }

    #[test]
    fn test_stray_escape_pair_is_consumed() {
        let mut parser = EventParser::new();
        let events = parser.feed(b"\x1b\\\x1b[c");
        assert_eq!(
            events,
            vec![
                TerminalEvent::Unrecognized,
                TerminalEvent::PrimaryDeviceAttributes(vec![]),
            ]
        );
    }

    #[test]
    fn test_osc_interrupted_by_new_escape() {
        let mut parser = EventParser::new();
        // The OSC report is cut off by a DA1 report instead of a terminator.
        let events = parser.feed(b"\x1b]11;rgb:00\x1b[?1c");
        assert_eq!(
            events,
            vec![
                TerminalEvent::Unrecognized,
                TerminalEvent::PrimaryDeviceAttributes(vec![1]),
            ]
        );
    }

    #[test]
    fn test_unterminated_sequence_flushed_past_cap() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"\x1b]11;").is_empty());
        let events = parser.feed(&[b'a'; MAX_PENDING]);
        assert_eq!(events, vec![TerminalEvent::Unrecognized]);

        // The parser recovers cleanly afterwards
        let events = parser.feed(b"\x1b[?1;2c");
        assert_eq!(
            events,
            vec![TerminalEvent::PrimaryDeviceAttributes(vec![1, 2])]
        );
    }
}
