//! Value types for light control parameters.

mod brightness;
mod color;
mod spectrum;

pub use brightness::Brightness;
pub use color::{HexColor, PaletteColor};
pub use spectrum::Spectrum;
