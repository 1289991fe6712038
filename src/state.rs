//! Observed light state tracking.

use serde::{Deserialize, Serialize};

use crate::operation::LightOperation;
use crate::types::{Brightness, HexColor};

/// The last known state of a bulb.
///
/// Every field is optional: gateway reports only carry the attributes the
/// bulb exposes, and partial updates leave the rest untouched.
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LightState {
    on: Option<bool>,
    brightness: Option<Brightness>,
    color: Option<HexColor>,
}

impl LightState {
    /// Whether the bulb is emitting light.
    pub fn on(&self) -> Option<bool> {
        self.on
    }

    /// The last known brightness.
    pub fn brightness(&self) -> Option<&Brightness> {
        self.brightness.as_ref()
    }

    /// The last known color.
    pub fn color(&self) -> Option<&HexColor> {
        self.color.as_ref()
    }

    /// Update this state with values from another state.
    ///
    /// Values set in `other` overwrite values in `self`; attributes `other`
    /// does not carry keep their current value.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::{Brightness, LightOperation, LightState, PaletteColor};
    ///
    /// let mut state = LightState::from(&LightOperation::from(&Brightness::create(30).unwrap()));
    /// assert_eq!(state.brightness().unwrap().value(), 30);
    /// assert!(state.color().is_none());
    ///
    /// state.update(&LightState::from(&LightOperation::from(&PaletteColor::Warm)));
    /// assert_eq!(state.brightness().unwrap().value(), 30);
    /// assert_eq!(state.color().unwrap().as_str(), "F1E0B5");
    /// ```
    pub fn update(&mut self, other: &Self) {
        if let Some(on) = other.on {
            self.on = Some(on);
        }
        if let Some(brightness) = other.brightness {
            self.brightness = Some(brightness);
        }
        if let Some(color) = &other.color {
            self.color = Some(color.clone());
        }
    }

    pub(crate) fn apply(&mut self, operation: &LightOperation) {
        if let Some(on) = operation.on {
            self.on = Some(on);
        }
        if let Some(brightness) = operation.brightness {
            self.brightness = Brightness::create(brightness);
        }
        if let Some(color) = &operation.color {
            self.color = Some(color.clone());
        }
    }
}

impl From<&LightOperation> for LightState {
    fn from(operation: &LightOperation) -> Self {
        LightState {
            on: operation.on,
            brightness: operation.brightness.and_then(Brightness::create),
            color: operation.color.clone(),
        }
    }
}
