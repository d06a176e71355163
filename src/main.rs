//! Terminal background color detection utility.
//!
//! Probes the controlling terminal with an OSC 11 background-color query
//! (with a DA1 query as the done-signal) and reports whether the background
//! is dark or light based on its relative luminance.
//!
//! # Usage
//!
//! The program outputs one of three possible values:
//! - `"light"` - for light backgrounds (luminance >= 0.5)
//! - `"dark"` - for dark backgrounds (luminance < 0.5)
//! - `"unknown"` - when there is no terminal to probe
//!
//! Exit codes:
//! - 0: Successfully determined background color
//! - 2: Unable to determine background color
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard log filtering (e.g. `RUST_LOG=debug`) showing the
//!   probe's reply events, parsed color, and luminance on stderr.

use std::process;

use log::debug;
use umbra::{DEFAULT_TIMEOUT, classify_color, detect_background};

/// Probe the controlling terminal and print its background classification.
fn main() {
    env_logger::init();

    match detect_background(DEFAULT_TIMEOUT) {
        Ok(result) => {
            print!("{}", classify_color(result.color()));
            process::exit(0);
        }
        Err(err) => {
            debug!("unable to determine background color: {err:#}");
            print!("unknown");
            process::exit(2);
        }
    }
}
