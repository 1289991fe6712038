//! Color values in the gateway's 6-hex-digit notation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::errors::Error;

/// A color in the gateway's notation: six hex digits, `RRGGBB`.
///
/// Values are normalized to uppercase so they compare and log consistently
/// regardless of how the caller typed them.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use tradfri_gateway_rs::HexColor;
///
/// let red = HexColor::from_str("ff0000").unwrap();
/// assert_eq!(red.as_str(), "FF0000");
/// assert!(HexColor::from_str("red").is_err());
/// assert!(HexColor::from_str("ff00").is_err());
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HexColor(String);

impl HexColor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this value is one of the fixed-palette colors a
    /// white-spectrum bulb accepts.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::str::FromStr;
    /// use tradfri_gateway_rs::HexColor;
    ///
    /// assert!(HexColor::from_str("efd275").unwrap().in_white_palette());
    /// assert!(!HexColor::from_str("ff0000").unwrap().in_white_palette());
    /// ```
    pub fn in_white_palette(&self) -> bool {
        PaletteColor::iter().any(|palette| palette.hex() == self.0)
    }
}

impl FromStr for HexColor {
    type Err = Error;

    /// Parse from a 6-hex-digit string (e.g. `"FF0000"`), case-insensitive.
    fn from_str(s: &str) -> Result<Self, Error> {
        if s.len() == 6 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(HexColor(s.to_ascii_uppercase()))
        } else {
            Err(Error::invalid_color(s, "6 hex digits"))
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PaletteColor> for HexColor {
    fn from(palette: PaletteColor) -> Self {
        HexColor(palette.hex().to_string())
    }
}

/// The fixed palette a white-spectrum bulb can show.
///
/// White-spectrum hardware has no RGB channels; the gateway only accepts
/// these predefined values for it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum PaletteColor {
    /// Warm white
    Warm,
    /// Cold white
    White,
    /// Warm glow, the yellowest the hardware goes
    Yellow,
}

impl PaletteColor {
    /// The hex value the gateway expects for this palette entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::PaletteColor;
    ///
    /// assert_eq!(PaletteColor::Warm.hex(), "F1E0B5");
    /// ```
    pub fn hex(&self) -> &'static str {
        match self {
            PaletteColor::Warm => "F1E0B5",
            PaletteColor::White => "F5FAF6",
            PaletteColor::Yellow => "EFD275",
        }
    }
}

impl fmt::Display for PaletteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaletteColor::Warm => "warm",
            PaletteColor::White => "white",
            PaletteColor::Yellow => "yellow",
        };
        write!(f, "{}", name)
    }
}
