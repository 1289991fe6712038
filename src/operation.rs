//! Control operations to send to Trådfri lights.

use serde::{Deserialize, Serialize};

use crate::types::{Brightness, HexColor, PaletteColor};

/// One control operation for a light.
///
/// Operations can carry multiple attributes (power, brightness, color) that
/// the gateway applies to the bulb as a single command.
///
/// # Creating Operations
///
/// You can create an operation in two ways:
///
/// 1. **From a single attribute** using the [`From`] trait:
///    ```
///    use tradfri_gateway_rs::{LightOperation, PaletteColor};
///    let operation = LightOperation::from(&PaletteColor::Warm);
///    ```
///
/// 2. **Builder pattern** for combining multiple attributes:
///    ```
///    use std::str::FromStr;
///    use tradfri_gateway_rs::{LightOperation, Brightness, HexColor};
///    let mut operation = LightOperation::new();
///    operation.on(true);
///    operation.brightness(&Brightness::create(80).unwrap());
///    operation.color(&HexColor::from_str("FF0000").unwrap());
///    ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LightOperation {
    pub(crate) on: Option<bool>,
    pub(crate) brightness: Option<u8>,
    pub(crate) color: Option<HexColor>,
}

impl LightOperation {
    /// Create a new empty operation.
    ///
    /// At least one attribute must be set for the operation to be valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::LightOperation;
    ///
    /// let operation = LightOperation::new();
    /// assert_eq!(operation.is_valid(), false);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if this operation contains at least one attribute.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::LightOperation;
    ///
    /// let mut operation = LightOperation::new();
    /// assert_eq!(operation.is_valid(), false);
    ///
    /// operation.on(false);
    /// assert_eq!(operation.is_valid(), true);
    /// ```
    pub fn is_valid(&self) -> bool {
        self.on.is_some() || self.brightness.is_some() || self.color.is_some()
    }

    /// Set the power state.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::LightOperation;
    ///
    /// let mut operation = LightOperation::new();
    /// operation.on(true);
    /// assert_eq!(operation.get_on(), Some(true));
    /// ```
    pub fn on(&mut self, on: bool) {
        self.on = Some(on);
    }

    /// Set the brightness level.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::{LightOperation, Brightness};
    ///
    /// let mut operation = LightOperation::new();
    /// operation.brightness(&Brightness::create(100).unwrap());
    /// assert_eq!(operation.is_valid(), true);
    /// ```
    pub fn brightness(&mut self, brightness: &Brightness) {
        self.brightness = Some(brightness.value);
    }

    /// Set the color.
    ///
    /// No spectrum check happens here; [`Light::set_color`](crate::Light::set_color)
    /// rejects colors the bulb's hardware cannot show.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::str::FromStr;
    /// use tradfri_gateway_rs::{LightOperation, HexColor};
    ///
    /// let mut operation = LightOperation::new();
    /// operation.color(&HexColor::from_str("4A418A").unwrap());
    /// assert_eq!(operation.is_valid(), true);
    /// ```
    pub fn color(&mut self, color: &HexColor) {
        self.color = Some(color.clone());
    }

    /// Set the color from the white-spectrum palette.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::{LightOperation, PaletteColor};
    ///
    /// let mut operation = LightOperation::new();
    /// operation.palette(&PaletteColor::Yellow);
    /// assert_eq!(operation.get_color().unwrap().as_str(), "EFD275");
    /// ```
    pub fn palette(&mut self, palette: &PaletteColor) {
        self.color = Some(HexColor::from(*palette));
    }

    pub fn get_on(&self) -> Option<bool> {
        self.on
    }

    pub fn get_brightness(&self) -> Option<u8> {
        self.brightness
    }

    pub fn get_color(&self) -> Option<&HexColor> {
        self.color.as_ref()
    }
}

impl From<&Brightness> for LightOperation {
    fn from(brightness: &Brightness) -> Self {
        let mut op = LightOperation::new();
        op.brightness(brightness);
        op
    }
}

impl From<&HexColor> for LightOperation {
    fn from(color: &HexColor) -> Self {
        let mut op = LightOperation::new();
        op.color(color);
        op
    }
}

impl From<&PaletteColor> for LightOperation {
    fn from(palette: &PaletteColor) -> Self {
        let mut op = LightOperation::new();
        op.palette(palette);
        op
    }
}
