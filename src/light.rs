//! Individual light control.

use std::str::FromStr;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::accessory::LightRecord;
use crate::errors::Error;
use crate::operation::LightOperation;
use crate::session::SessionInner;
use crate::state::LightState;
use crate::types::{Brightness, HexColor, Spectrum};

type Result<T> = std::result::Result<T, Error>;

/// A pure snapshot of a light's identity and capability.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeviceData {
    pub device_id: u32,
    pub name: String,
    pub spectrum: Spectrum,
}

/// Represents one lightbulb-class accessory behind a gateway session.
///
/// `Light` handles are created by the session's device registry as observe
/// events arrive; obtain one with [`Session::light`](crate::Session::light)
/// or [`Session::lights`](crate::Session::lights). Every mutating call is
/// forwarded through the owning session.
///
/// When the gateway reports a device again, the registry entry is replaced
/// wholesale: a handle obtained earlier keeps addressing the right device,
/// but its state snapshot no longer refreshes. Fetch a fresh handle when in
/// doubt.
///
/// # Example
///
/// ```ignore
/// let light = session.light(65539)?;
/// light.set_brightness(40).await?;
/// light.identify().await?;
/// ```
#[derive(Debug)]
pub struct Light {
    device_id: u32,
    name: String,
    spectrum: Spectrum,
    state: Mutex<LightState>,
    session: Weak<SessionInner>,
}

impl Light {
    const IDENTIFY_COLOR: &str = "FF0000";
    const IDENTIFY_PACING: Duration = Duration::from_millis(1000);

    pub(crate) fn new(
        device_id: u32,
        name: &str,
        record: &LightRecord,
        session: Weak<SessionInner>,
    ) -> Self {
        Light {
            device_id,
            name: String::from(name),
            spectrum: record.spectrum,
            state: Mutex::new(record.state.clone()),
            session,
        }
    }

    /// The gateway-assigned instance id, stable for the accessory's
    /// lifetime.
    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spectrum(&self) -> Spectrum {
        self.spectrum
    }

    /// Snapshot of identity and capability; no side effects.
    pub fn device_data(&self) -> DeviceData {
        DeviceData {
            device_id: self.device_id,
            name: self.name.clone(),
            spectrum: self.spectrum,
        }
    }

    /// Snapshot of the in-memory desired state.
    pub fn state(&self) -> LightState {
        self.state.lock().unwrap().clone()
    }

    pub(crate) fn apply_operation(&self, operation: &LightOperation) {
        self.state.lock().unwrap().apply(operation);
    }

    pub(crate) fn replace_state(&self, state: LightState) {
        *self.state.lock().unwrap() = state;
    }

    /// Flip the current on/off state. An unknown power state is treated as
    /// off, so the first toggle of a never-reported bulb turns it on.
    pub async fn toggle(&self) -> Result<()> {
        let on = self.state().on().unwrap_or(false);
        let mut operation = LightOperation::new();
        operation.on(!on);
        self.operate(operation).await
    }

    pub async fn turn_on(&self) -> Result<()> {
        let mut operation = LightOperation::new();
        operation.on(true);
        self.operate(operation).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        let mut operation = LightOperation::new();
        operation.on(false);
        self.operate(operation).await
    }

    /// Set absolute brightness (0-100).
    ///
    /// Out-of-range values fail with [`Error::InvalidBrightness`] before
    /// anything is transmitted.
    pub async fn set_brightness(&self, value: u8) -> Result<()> {
        let brightness = Brightness::create(value).ok_or(Error::InvalidBrightness(value))?;
        self.operate(LightOperation::from(&brightness)).await
    }

    /// Set the color from a 6-hex-digit string.
    ///
    /// Full-color bulbs accept any value; white-spectrum bulbs only accept
    /// the fixed palette. Rejected values fail with [`Error::InvalidColor`]
    /// before anything is transmitted.
    pub async fn set_color(&self, value: &str) -> Result<()> {
        let color = HexColor::from_str(value)?;
        if self.spectrum == Spectrum::White && !color.in_white_palette() {
            return Err(Error::invalid_color(
                value,
                "a white-spectrum palette value",
            ));
        }
        self.operate(LightOperation::from(&color)).await
    }

    /// Flash the bulb so it can be spotted among others: red at full
    /// brightness, then alternating off/on, six steps 1000 ms apart, with
    /// the pre-call state restored afterwards.
    pub async fn identify(&self) -> Result<()> {
        let mut attention = LightOperation::new();
        attention.on(true);
        attention.color(&HexColor::from_str(Self::IDENTIFY_COLOR)?);
        attention.brightness(&Brightness::new());

        let mut off = LightOperation::new();
        off.on(false);
        let mut on = LightOperation::new();
        on.on(true);

        let operations = [attention, off.clone(), on.clone(), off.clone(), on, off];

        self.session()?
            .execute_operations(self, &operations, Self::IDENTIFY_PACING, true)
            .await
    }

    async fn operate(&self, operation: LightOperation) -> Result<()> {
        self.session()?.operate(self, operation).await
    }

    fn session(&self) -> Result<Arc<SessionInner>> {
        self.session.upgrade().ok_or(Error::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orphan_light(spectrum: Spectrum) -> Light {
        let record = LightRecord {
            spectrum,
            state: LightState::default(),
        };
        Light::new(65537, "Test bulb", &record, Weak::new())
    }

    #[test]
    fn device_data_is_a_plain_snapshot() {
        let light = orphan_light(Spectrum::Rgb);
        let data = light.device_data();
        assert_eq!(data.device_id, 65537);
        assert_eq!(data.name, "Test bulb");
        assert_eq!(data.spectrum, Spectrum::Rgb);
    }

    #[tokio::test]
    async fn brightness_is_validated_before_any_session_work() {
        let light = orphan_light(Spectrum::Rgb);
        assert_eq!(
            light.set_brightness(101).await,
            Err(Error::InvalidBrightness(101))
        );
    }

    #[tokio::test]
    async fn color_is_validated_against_the_spectrum() {
        let white = orphan_light(Spectrum::White);
        assert!(matches!(
            white.set_color("00FF00").await,
            Err(Error::InvalidColor { .. })
        ));
        // Palette values pass validation; the dropped session is the next
        // failure in line.
        assert_eq!(
            white.set_color("EFD275").await,
            Err(Error::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn malformed_colors_are_rejected_for_any_spectrum() {
        let rgb = orphan_light(Spectrum::Rgb);
        assert!(matches!(
            rgb.set_color("red").await,
            Err(Error::InvalidColor { .. })
        ));
    }

    #[tokio::test]
    async fn operations_fail_once_the_session_is_gone() {
        let light = orphan_light(Spectrum::Rgb);
        assert_eq!(light.toggle().await, Err(Error::NotAuthenticated));
        assert_eq!(light.turn_on().await, Err(Error::NotAuthenticated));
        assert_eq!(light.identify().await, Err(Error::NotAuthenticated));
    }
}
