//! The escape sequences the probe sends, and their one-shot dispatch.
//!
//! A probe asks two questions in a single write: the OSC 11 background-color
//! query, then the DA1 primary-device-attributes query. Terminals answer
//! requests in order, so the DA1 reply doubles as a deterministic "no more
//! answers are coming" sentinel even when the terminal ignores OSC 11.

use std::io::Write;

use crate::probe::ProbeError;

/// OSC 11 background-color query (`ESC ] 11 ; ? BEL`).
pub const BACKGROUND_COLOR_QUERY: &[u8] = b"\x1b]11;?\x07";

/// DA1 primary-device-attributes query (`ESC [ c`).
pub const DEVICE_ATTRIBUTES_QUERY: &[u8] = b"\x1b[c";

/// Both queries, pre-concatenated so the dispatch is a single write.
pub const PROBE_QUERY: &[u8] = b"\x1b]11;?\x07\x1b[c";

/// Write the combined query to the terminal, exactly once per probe.
///
/// # Errors
///
/// Returns [`ProbeError::WriteFailure`] if the write or flush fails (stream
/// closed, broken pipe). The caller treats this as non-fatal: the terminal
/// simply never answers and the probe falls back to its default.
pub fn send_query<W: Write>(output: &mut W) -> Result<(), ProbeError> {
    output
        .write_all(PROBE_QUERY)
        .map_err(ProbeError::WriteFailure)?;
    output.flush().map_err(ProbeError::WriteFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_combined_query_is_both_requests_in_order() {
        assert_eq!(
            PROBE_QUERY,
            [BACKGROUND_COLOR_QUERY, DEVICE_ATTRIBUTES_QUERY].concat()
        );
    }

    #[test]
    fn test_send_query_writes_the_combined_sequence() -> io::Result<()> {
        let mut sink = Vec::new();
        send_query(&mut sink).expect("write to a Vec cannot fail");
        assert_eq!(sink, PROBE_QUERY);
        Ok(())
    }

    #[test]
    fn test_send_query_reports_write_failure() {
        let err = send_query(&mut BrokenPipe).unwrap_err();
        assert!(matches!(err, ProbeError::WriteFailure(_)));
    }
}
