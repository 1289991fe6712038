//! Devices as the gateway reports them.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::state::LightState;
use crate::types::Spectrum;

/// Device categories a Trådfri gateway reports.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, EnumIter, PartialEq, Eq)]
pub enum AccessoryKind {
    Remote = 0,
    SlaveRemote = 1,
    Lightbulb = 2,
    Plug = 3,
    MotionSensor = 4,
    SignalRepeater = 6,
    Blind = 7,
    SoundRemote = 8,
    AirPurifier = 10,
}

impl AccessoryKind {
    /// Look up a kind from the gateway's numeric category code.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::AccessoryKind;
    ///
    /// assert_eq!(AccessoryKind::create(2), Some(AccessoryKind::Lightbulb));
    /// assert_eq!(AccessoryKind::create(5), None);
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        AccessoryKind::iter().find(|kind| *kind as u8 == value)
    }

    pub fn id(&self) -> u8 {
        *self as u8
    }
}

/// The light-specific portion of an accessory report.
///
/// Present only when the accessory is a bulb.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LightRecord {
    pub spectrum: Spectrum,
    pub state: LightState,
}

/// One device as enumerated or pushed by the gateway.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Accessory {
    /// Gateway-assigned stable instance id.
    pub instance_id: u32,
    pub name: String,
    pub kind: AccessoryKind,
    #[serde(default)]
    pub light: Option<LightRecord>,
}

impl Accessory {
    pub fn is_light(&self) -> bool {
        self.kind == AccessoryKind::Lightbulb
    }
}
