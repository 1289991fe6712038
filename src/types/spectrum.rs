//! Color capabilities a bulb was manufactured with.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which colors a bulb can physically produce.
///
/// Full-color hardware accepts any [`HexColor`](crate::HexColor); white
/// spectrum hardware only accepts the [`PaletteColor`](crate::PaletteColor)
/// values.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Spectrum {
    /// Full RGB color.
    Rgb,
    /// Shades of white only.
    White,
}

impl fmt::Display for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Spectrum::Rgb => write!(f, "rgb"),
            Spectrum::White => write!(f, "white"),
        }
    }
}
