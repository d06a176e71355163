//! Color parsing and luminance calculation utilities.
//!
//! This module provides functions for:
//! - Parsing the color formats terminals report (X11 `rgb:`, hex, CSS-style)
//! - Converting reported colors into 16-bit RGB channels
//! - Calculating relative luminance for light/dark classification

use anyhow::{Context, Result, anyhow};
use regex::Regex;

/// Threshold for determining if a color is dark or light based on luminance.
/// Colors with luminance below this value are considered dark.
const DARK_THRESHOLD: f64 = 0.5;

/// RGB color with 16-bit channels, the resolution X11 color reports use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    /// Red component (0-65535)
    pub r: u16,
    /// Green component (0-65535)
    pub g: u16,
    /// Blue component (0-65535)
    pub b: u16,
}

impl Rgb {
    /// Opaque white, the fallback when a terminal never reports a color.
    pub const WHITE: Self = Self {
        r: u16::MAX,
        g: u16::MAX,
        b: u16::MAX,
    };

    /// Create a new RGB color from individual components.
    ///
    /// # Arguments
    ///
    /// * `r` - Red component (0-65535)
    /// * `g` - Green component (0-65535)
    /// * `b` - Blue component (0-65535)
    #[must_use]
    pub fn new(r: u16, g: u16, b: u16) -> Self {
        Self { r, g, b }
    }
}

/// Parse a color string reported by a terminal into an [`Rgb`].
///
/// This function supports the formats commonly returned by terminals:
/// - `rgb:RRRR/GGGG/BBBB` - X11 RGB format, 1 to 4 hex digits per channel
/// - `rgba:RRRR/GGGG/BBBB/AAAA` - X11 RGBA format (alpha ignored)
/// - `#RRGGBB` - Standard hex color format
/// - `#RRGGBBAA` - Hex color with alpha (alpha ignored)
/// - `rgb(R, G, B)` - CSS-style RGB function with 8-bit values
///
/// 8-bit inputs are widened to 16 bits; short X11 components are scaled the
/// way X11 scales them, by shifting into the high nibbles.
///
/// # Errors
///
/// Returns an error if:
/// - The string is not in a recognized color format
/// - A component value is invalid (non-hex characters, out of range)
/// - An X11 component has an invalid length (not 1 to 4 hex digits)
///
/// # Examples
///
/// ```
/// # use umbra::color::{Rgb, parse_rgb};
/// assert_eq!(parse_rgb("rgb:ffff/8080/0000").unwrap(), Rgb::new(0xffff, 0x8080, 0x0000));
/// assert_eq!(parse_rgb("#ff8000").unwrap(), Rgb::new(0xffff, 0x8080, 0x0000));
/// assert_eq!(parse_rgb("rgb(255, 128, 0)").unwrap(), Rgb::new(0xffff, 0x8080, 0x0000));
/// ```
pub fn parse_rgb(s: &str) -> Result<Rgb> {
    let s = s.trim();

    // Handle rgb: or rgba: format
    if s.starts_with("rgb:") || s.starts_with("rgba:") {
        let color_part = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid rgb: format - missing colon"))?
            .1;
        let parts: Vec<&str> = color_part.split('/').collect();

        if parts.len() == 3 || parts.len() == 4 {
            let r = x11_channel(parts[0])
                .with_context(|| format!("Failed to parse red component: {}", parts[0]))?;
            let g = x11_channel(parts[1])
                .with_context(|| format!("Failed to parse green component: {}", parts[1]))?;
            let b = x11_channel(parts[2])
                .with_context(|| format!("Failed to parse blue component: {}", parts[2]))?;
            return Ok(Rgb::new(r, g, b));
        }
        return Err(anyhow!(
            "Invalid rgb: format - expected 3 or 4 components, got {}",
            parts.len()
        ));
    }

    // Handle #hex format
    if s.starts_with('#') && (s.len() == 7 || s.len() == 9) {
        let r = u16::from_str_radix(&s[1..3], 16)
            .with_context(|| format!("Failed to parse red hex component: {}", &s[1..3]))?;
        let g = u16::from_str_radix(&s[3..5], 16)
            .with_context(|| format!("Failed to parse green hex component: {}", &s[3..5]))?;
        let b = u16::from_str_radix(&s[5..7], 16)
            .with_context(|| format!("Failed to parse blue hex component: {}", &s[5..7]))?;
        return Ok(Rgb::new(widen(r), widen(g), widen(b)));
    }

    // Handle rgb() format
    let re =
        Regex::new(r"rgb\((\d+),\s*(\d+),\s*(\d+)\)").context("Failed to compile RGB regex")?;
    if let Some(caps) = re.captures(s) {
        let r = caps[1]
            .parse::<u8>()
            .with_context(|| format!("Failed to parse red component: {}", &caps[1]))?;
        let g = caps[2]
            .parse::<u8>()
            .with_context(|| format!("Failed to parse green component: {}", &caps[2]))?;
        let b = caps[3]
            .parse::<u8>()
            .with_context(|| format!("Failed to parse blue component: {}", &caps[3]))?;
        return Ok(Rgb::new(
            widen(u16::from(r)),
            widen(u16::from(g)),
            widen(u16::from(b)),
        ));
    }

    Err(anyhow!("Unrecognized color format: {}", s))
}

/// Parse one X11 hex component of 1 to 4 digits into a 16-bit channel.
///
/// X11 treats short components as the high digits of the full value, so
/// `ff` means `ff00` and `f` means `f000`.
fn x11_channel(hex: &str) -> Result<u16> {
    if hex.is_empty() || hex.len() > 4 {
        return Err(anyhow!(
            "Invalid hex length: expected 1 to 4 characters, got {}",
            hex.len()
        ));
    }
    let n = u16::from_str_radix(hex, 16).with_context(|| format!("Invalid hex string: {hex}"))?;

    // Component length is at most 4, so the shift stays below 16.
    #[allow(clippy::cast_possible_truncation)]
    let shift = (4 - hex.len() as u32) * 4;
    Ok(n << shift)
}

/// Widen an 8-bit channel value to 16 bits (`0xff` becomes `0xffff`).
fn widen(channel: u16) -> u16 {
    channel * 0x0101
}

/// Calculate relative luminance of an RGB color using the sRGB formula.
///
/// This implements the standard relative luminance calculation as defined by
/// the W3C Web Content Accessibility Guidelines (WCAG). The formula accounts
/// for the non-linear nature of human vision by first converting sRGB values
/// to linear RGB, then applying luminance coefficients.
///
/// # Returns
///
/// Relative luminance value between 0.0 (black) and 1.0 (white)
///
/// # Formula
///
/// L = 0.2126 × R + 0.7152 × G + 0.0722 × B
///
/// Where R, G, B are the linearized RGB values.
#[must_use]
pub fn luminance(rgb: Rgb) -> f64 {
    let r = f64::from(rgb.r) / f64::from(u16::MAX);
    let g = f64::from(rgb.g) / f64::from(u16::MAX);
    let b = f64::from(rgb.b) / f64::from(u16::MAX);

    // Convert sRGB component to linear RGB
    let lin = |c: f64| -> f64 {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };

    0.2126 * lin(r) + 0.7152 * lin(g) + 0.0722 * lin(b)
}

/// Determine if a color is dark based on its relative luminance.
///
/// This is the flag the rendering layer consumes when picking a theme.
#[must_use]
pub fn is_dark(rgb: Rgb) -> bool {
    luminance(rgb) < DARK_THRESHOLD
}

/// Classify a color as `"dark"` or `"light"`.
#[must_use]
pub fn classify_color(rgb: Rgb) -> &'static str {
    if is_dark(rgb) { "dark" } else { "light" }
}
