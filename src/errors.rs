/// All error types that can occur when talking to a Trådfri gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No gateway answered a discovery scan.
    #[error("no gateway found on the local network")]
    DiscoveryFailed,

    /// The gateway rejected a security code or credential pair.
    #[error("gateway rejected the credentials: {reason}")]
    AuthenticationFailed { reason: String },

    /// A device operation was attempted before a successful connect, or
    /// after the session dropped.
    #[error("session is not authenticated; connect to the gateway first")]
    NotAuthenticated,

    /// A transmission to a specific device failed.
    #[error("command for device {device_id} failed: {reason}")]
    DeviceCommand { device_id: u32, reason: String },

    /// The restoring write at the end of a reverting sequence failed.
    #[error("state restore for device {device_id} failed")]
    RevertFailed {
        device_id: u32,
        #[source]
        source: Box<Error>,
    },

    /// Attempted to send a [`crate::LightOperation`] with no attributes set.
    #[error("invalid operation; no attributes set")]
    NoAttribute,

    /// Brightness outside the 0-100 range.
    #[error("brightness {0} is out of range (0-100)")]
    InvalidBrightness(u8),

    /// A color value the target bulb cannot accept.
    #[error("invalid color {value:?}; expected {expected}")]
    InvalidColor {
        value: String,
        expected: &'static str,
    },

    /// The requested device id is not in the registry.
    #[error("no light with device id {0} is registered")]
    NotFound(u32),

    /// Failed to serialize a [`crate::GatewayIdentity`] to JSON.
    #[error("failed to encode identity: {0:?}")]
    IdentityEncode(serde_json::Error),

    /// Failed to deserialize a [`crate::GatewayIdentity`] from JSON.
    #[error("failed to decode identity: {0:?}")]
    IdentityDecode(serde_json::Error),
}

impl Error {
    /// Create a new authentication failure
    pub fn auth_failed(reason: &str) -> Self {
        Error::AuthenticationFailed {
            reason: reason.to_string(),
        }
    }

    /// Create a new device command error
    pub fn device_command(device_id: u32, reason: &str) -> Self {
        Error::DeviceCommand {
            device_id,
            reason: reason.to_string(),
        }
    }

    /// Create a new revert failure wrapping the write error that caused it
    pub fn revert_failed(device_id: u32, source: Error) -> Self {
        Error::RevertFailed {
            device_id,
            source: Box::new(source),
        }
    }

    /// Create a new invalid color error
    pub fn invalid_color(value: &str, expected: &'static str) -> Self {
        Error::InvalidColor {
            value: value.to_string(),
            expected,
        }
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
