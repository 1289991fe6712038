//! Gateway discovery contract.

use std::net::IpAddr;

use crate::errors::Error;
use crate::runtime::BoxFuture;

type Result<T> = std::result::Result<T, Error>;

/// A gateway found on the local network.
#[derive(Debug, Clone)]
pub struct GatewayDetails {
    /// Advertised gateway name
    pub name: String,
    /// All addresses the gateway answers on
    pub addresses: Vec<IpAddr>,
}

impl GatewayDetails {
    /// The address a session should be bound to, when the gateway
    /// advertised one.
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }
}

/// Contract for locating a gateway on the local network.
///
/// The broadcast/mDNS mechanics belong to the implementing collaborator; a
/// [`Session`](crate::Session) only needs the resulting address.
/// Implementations resolve to [`Error::DiscoveryFailed`] when nothing
/// answers.
pub trait DiscoverGateway: Send + Sync {
    /// Scan the local network once for a gateway.
    fn discover(&self) -> BoxFuture<'_, Result<GatewayDetails>>;
}
