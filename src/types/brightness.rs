//! Brightness control for Trådfri lights.

use serde::{Deserialize, Serialize};

/// Brightness level from 0 to 100 percent.
///
/// The gateway treats 0 as "dimmed to nothing" rather than "off"; power is
/// a separate attribute.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Default for Brightness {
    fn default() -> Self {
        Self::new()
    }
}

impl Brightness {
    const MIN: u8 = 0;
    const MAX: u8 = 100;

    /// Create a new Brightness at the maximum (100%).
    pub fn new() -> Self {
        Brightness { value: Self::MAX }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Returns None if value is outside the valid range (0-100).
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::Brightness;
    ///
    /// assert!(Brightness::create(0).is_some());
    /// assert!(Brightness::create(100).is_some());
    /// assert!(Brightness::create(101).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        if Self::is_valid(value) {
            Some(Brightness { value })
        } else {
            None
        }
    }

    /// Returns the default (100%) if value is invalid.
    pub fn create_or(value: u8) -> Self {
        if Self::is_valid(value) {
            Brightness { value }
        } else {
            Self::new()
        }
    }

    fn is_valid(value: u8) -> bool {
        (Self::MIN..=Self::MAX).contains(&value)
    }
}
