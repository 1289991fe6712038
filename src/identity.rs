//! Credentials issued by a gateway during the security-code exchange.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// An identity name and the pre-shared key the gateway bound to it.
///
/// Returned by [`Session::authenticate`](crate::Session::authenticate).
/// The security code printed on the gateway is only needed once; persist
/// this value (see [`to_json`](Self::to_json)) and pass it to
/// [`Session::connect`](crate::Session::connect) on later runs.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GatewayIdentity {
    pub(crate) identity: String,
    pub(crate) psk: String,
}

impl GatewayIdentity {
    pub fn new(identity: &str, psk: &str) -> Self {
        GatewayIdentity {
            identity: String::from(identity),
            psk: String::from(psk),
        }
    }

    /// The identity name registered with the gateway.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The pre-shared key for the secure transport.
    pub fn psk(&self) -> &str {
        &self.psk
    }

    /// Serialize for storage.
    ///
    /// # Examples
    ///
    /// ```
    /// use tradfri_gateway_rs::GatewayIdentity;
    ///
    /// let identity = GatewayIdentity::new("app-1", "secret");
    /// let json = identity.to_json().unwrap();
    /// assert_eq!(GatewayIdentity::from_json(&json).unwrap(), identity);
    /// ```
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::IdentityEncode)
    }

    /// Restore a value produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::IdentityDecode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let identity = GatewayIdentity::new("tradfri-app-42", "pskpskpsk");
        let json = identity.to_json().unwrap();
        assert_eq!(GatewayIdentity::from_json(&json).unwrap(), identity);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            GatewayIdentity::from_json("not json"),
            Err(Error::IdentityDecode(_))
        ));
    }
}
