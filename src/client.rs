//! Protocol-client contract between a session and the secure channel.

use futures::stream::BoxStream;

use crate::accessory::Accessory;
use crate::errors::Error;
use crate::identity::GatewayIdentity;
use crate::operation::LightOperation;
use crate::runtime::BoxFuture;
use crate::state::LightState;

type Result<T> = std::result::Result<T, Error>;

/// Push notifications delivered by the gateway while observing.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A device report: first sighting of a device or a refresh of a
    /// known one.
    DeviceUpdated(Accessory),
    /// The secure channel dropped; no further events will arrive.
    ConnectionLost,
}

/// The event stream side of [`GatewayClient::observe_devices`].
pub type EventStream = BoxStream<'static, GatewayEvent>;

/// The secure-channel protocol client a [`Session`](crate::Session) drives.
///
/// Implementations own the transport specifics (DTLS handshake, CoAP
/// encoding); the session layer only needs these five calls. Methods return
/// boxed futures so the trait can be used behind `Arc<dyn GatewayClient>`.
pub trait GatewayClient: Send + Sync {
    /// Exchange the security code printed on the gateway for a long-lived
    /// credential pair. Fails with [`Error::AuthenticationFailed`] when the
    /// gateway rejects the code.
    fn authenticate<'a>(&'a self, security_code: &'a str)
    -> BoxFuture<'a, Result<GatewayIdentity>>;

    /// Open the secure channel with a previously obtained credential pair.
    fn connect<'a>(&'a self, identity: &'a GatewayIdentity) -> BoxFuture<'a, Result<()>>;

    /// Enumerate the devices currently known to the gateway and start the
    /// push stream for subsequent changes.
    fn observe_devices(&self) -> BoxFuture<'_, Result<(Vec<Accessory>, EventStream)>>;

    /// Transmit one desired-state delta to a light.
    ///
    /// With `ack_required` the future resolves only once the gateway has
    /// acknowledged the write; sequenced operations rely on that for their
    /// ordering guarantee.
    fn operate_light<'a>(
        &'a self,
        device_id: u32,
        operation: &'a LightOperation,
        ack_required: bool,
    ) -> BoxFuture<'a, Result<()>>;

    /// Push a full desired state for a device in one write.
    fn update_device<'a>(
        &'a self,
        device_id: u32,
        state: &'a LightState,
    ) -> BoxFuture<'a, Result<()>>;
}
