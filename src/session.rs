//! Gateway session management: authentication lifecycle, the live device
//! registry, and the operation sequencer.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, warn};
use uuid::Uuid;

use crate::accessory::Accessory;
use crate::client::{GatewayClient, GatewayEvent};
use crate::errors::Error;
use crate::identity::GatewayIdentity;
use crate::light::Light;
use crate::operation::LightOperation;
use crate::runtime::{self, JoinHandle};

type Result<T> = std::result::Result<T, Error>;

/// Per-light result of a fan-out call.
///
/// Returned by [`Session::execute_operations_multiple`] in the same order
/// as the lights passed in; a failed light never hides the others.
#[derive(Debug)]
pub struct LightOutcome {
    pub device_id: u32,
    pub outcome: Result<()>,
}

/// A session with one Trådfri gateway.
///
/// The session owns the secure channel, the authentication lifecycle, the
/// live device registry, and the operation sequencer. Cloning is cheap and
/// yields another handle to the same session. There is no in-place
/// re-authentication: to reconnect after a connection loss, build a fresh
/// session.
///
/// # Example
///
/// ```ignore
/// let session = Session::new(address, Arc::new(client));
/// let identity = session.authenticate("oXkfpJW8mHnZbsQz").await?;
/// session.start_observing().await?;
/// for light in session.lights() {
///     println!("{}: {}", light.device_id(), light.name());
/// }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session bound to a gateway address.
    ///
    /// Nothing is transmitted until [`authenticate`](Self::authenticate) or
    /// [`connect`](Self::connect) is called.
    pub fn new(address: IpAddr, client: Arc<dyn GatewayClient>) -> Self {
        Session {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                address,
                client,
                authenticated: AtomicBool::new(false),
                observing: AtomicBool::new(false),
                lights: Mutex::new(HashMap::new()),
                operation_locks: Mutex::new(HashMap::new()),
                observe_task: Mutex::new(None),
            }),
        }
    }

    /// The gateway address this session is bound to.
    pub fn address(&self) -> IpAddr {
        self.inner.address
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::SeqCst)
    }

    pub fn is_observing(&self) -> bool {
        self.inner.observing.load(Ordering::SeqCst)
    }

    /// One-time bootstrap authentication with the security code printed on
    /// the gateway.
    ///
    /// On success the freshly minted credential pair is used for a full
    /// connect right away, and returned so the caller can persist it for
    /// [`connect`](Self::connect) on later runs.
    pub async fn authenticate(&self, security_code: &str) -> Result<GatewayIdentity> {
        let identity = self.inner.client.authenticate(security_code).await?;
        debug!(
            "session {}: security code accepted, connecting as {:?}",
            self.inner.id,
            identity.identity()
        );
        self.connect(&identity).await?;
        Ok(identity)
    }

    /// Open the secure channel with a previously obtained credential pair.
    pub async fn connect(&self, identity: &GatewayIdentity) -> Result<()> {
        match self.inner.client.connect(identity).await {
            Ok(()) => {
                self.inner.authenticated.store(true, Ordering::SeqCst);
                debug!(
                    "session {}: authenticated with gateway {}",
                    self.inner.id, self.inner.address
                );
                Ok(())
            }
            Err(e) => {
                self.inner.authenticated.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Subscribe to device updates and run the initial enumeration.
    ///
    /// The registry is live once this returns: every device the gateway
    /// already knew is registered, and a background pump keeps applying
    /// subsequent events. Calling this while already observing is a no-op.
    pub async fn start_observing(&self) -> Result<()> {
        self.inner.require_authenticated()?;
        if self.inner.observing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (accessories, mut events) = match self.inner.client.observe_devices().await {
            Ok(pair) => pair,
            Err(e) => {
                self.inner.observing.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        for accessory in &accessories {
            self.inner.apply_accessory(accessory);
        }
        debug!(
            "session {}: observing; initial enumeration registered {} lights",
            self.inner.id,
            self.inner.lights.lock().unwrap().len()
        );

        // The pump holds only a weak handle so a forgotten session does not
        // stay alive through its own background task. The running flag is
        // the portable stop signal: not every runtime can abort a task.
        let running = Arc::new(AtomicBool::new(true));
        let pump_running = Arc::clone(&running);
        let weak = Arc::downgrade(&self.inner);
        let task = runtime::spawn(async move {
            let mut reason = "event stream ended";
            while let Some(event) = events.next().await {
                if !pump_running.load(Ordering::SeqCst) {
                    return;
                }
                let Some(inner) = weak.upgrade() else { return };
                match event {
                    GatewayEvent::DeviceUpdated(accessory) => inner.apply_accessory(&accessory),
                    GatewayEvent::ConnectionLost => {
                        reason = "connection to the gateway lost";
                        break;
                    }
                }
            }
            // A voluntary stop is not a disconnect.
            if !pump_running.load(Ordering::SeqCst) {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                inner.mark_disconnected(reason);
            }
        });
        *self.inner.observe_task.lock().unwrap() = Some(ObservePump { running, task });
        Ok(())
    }

    /// Stop consuming device updates. The registry keeps its current
    /// contents and the session stays authenticated; observing can be
    /// started again later. Also runs when the last session handle is
    /// dropped.
    pub fn stop_observing(&self) {
        self.inner.stop_observing();
    }

    /// Look up a registered light by device id; never touches the network.
    pub fn light(&self, device_id: u32) -> Result<Arc<Light>> {
        self.inner.light(device_id)
    }

    /// Snapshot of all registered lights, in no particular order.
    pub fn lights(&self) -> Vec<Arc<Light>> {
        self.inner.lights()
    }

    /// Push a light's in-memory desired state to the gateway as one write.
    ///
    /// Building block for the sequencer's revert step; rarely needed
    /// directly.
    pub async fn sync_light_state(&self, light: &Light) -> Result<()> {
        self.inner.sync_light_state(light).await
    }

    /// Run an ordered, paced, optionally reverting operation sequence
    /// against one light.
    ///
    /// Operations transmit strictly in order, each as a standalone
    /// acknowledged write followed by a `pacing` delay (the last step
    /// included). With `revert`, the pre-sequence state is merged back over
    /// the end state (snapshot fields win) and pushed as one final update.
    /// Sequences for the same light are serialized internally; a failed
    /// step aborts the remainder but still attempts the revert. A sequence
    /// containing an attribute-less operation fails with
    /// [`Error::NoAttribute`] before anything is transmitted.
    pub async fn execute_operations(
        &self,
        light: &Light,
        operations: &[LightOperation],
        pacing: Duration,
        revert: bool,
    ) -> Result<()> {
        self.inner
            .execute_operations(light, operations, pacing, revert)
            .await
    }

    /// Fan the same operation sequence out to several lights at once.
    ///
    /// Sequences run concurrently with independent pacing; no failure
    /// short-circuits the others. The returned outcomes follow the input
    /// order.
    pub async fn execute_operations_multiple(
        &self,
        lights: &[Arc<Light>],
        operations: &[LightOperation],
        pacing: Duration,
        revert: bool,
    ) -> Vec<LightOutcome> {
        let sequences = lights.iter().map(|light| async move {
            LightOutcome {
                device_id: light.device_id(),
                outcome: self
                    .inner
                    .execute_operations(light, operations, pacing, revert)
                    .await,
            }
        });
        futures::future::join_all(sequences).await
    }
}

/// A spawned event pump and the flag that tells it to stop.
struct ObservePump {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

pub(crate) struct SessionInner {
    id: Uuid,
    address: IpAddr,
    client: Arc<dyn GatewayClient>,
    authenticated: AtomicBool,
    observing: AtomicBool,
    lights: Mutex<HashMap<u32, Arc<Light>>>,
    operation_locks: Mutex<HashMap<u32, Arc<runtime::Mutex<()>>>>,
    observe_task: Mutex<Option<ObservePump>>,
}

impl SessionInner {
    fn require_authenticated(&self) -> Result<()> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotAuthenticated)
        }
    }

    /// Insert or replace the registry entry for a lightbulb report.
    ///
    /// Replacement builds a brand-new [`Light`]; handles handed out earlier
    /// keep working but stop refreshing.
    fn apply_accessory(self: &Arc<Self>, accessory: &Accessory) {
        if !accessory.is_light() {
            debug!(
                "session {}: ignoring {:?} accessory {}",
                self.id, accessory.kind, accessory.instance_id
            );
            return;
        }
        let Some(record) = &accessory.light else {
            warn!(
                "session {}: lightbulb accessory {} carried no light record",
                self.id, accessory.instance_id
            );
            return;
        };

        let light = Arc::new(Light::new(
            accessory.instance_id,
            &accessory.name,
            record,
            Arc::downgrade(self),
        ));
        let replaced = self
            .lights
            .lock()
            .unwrap()
            .insert(accessory.instance_id, light);
        if replaced.is_none() {
            debug!(
                "session {}: registered light {} ({:?})",
                self.id, accessory.instance_id, accessory.name
            );
        }
    }

    fn mark_disconnected(&self, reason: &str) {
        self.observing.store(false, Ordering::SeqCst);
        if self.authenticated.swap(false, Ordering::SeqCst) {
            warn!(
                "session {}: {}; the session is no longer authenticated",
                self.id, reason
            );
        }
    }

    fn stop_observing(&self) {
        self.observing.store(false, Ordering::SeqCst);
        if let Some(pump) = self.observe_task.lock().unwrap().take() {
            pump.running.store(false, Ordering::SeqCst);
            pump.task.abort();
        }
    }

    fn light(&self, device_id: u32) -> Result<Arc<Light>> {
        self.lights
            .lock()
            .unwrap()
            .get(&device_id)
            .cloned()
            .ok_or(Error::NotFound(device_id))
    }

    fn lights(&self) -> Vec<Arc<Light>> {
        self.lights.lock().unwrap().values().cloned().collect()
    }

    /// One async mutex per device id, created on first use. Held across a
    /// whole sequence so same-light calls queue instead of racing.
    fn operation_lock(&self, device_id: u32) -> Arc<runtime::Mutex<()>> {
        self.operation_locks
            .lock()
            .unwrap()
            .entry(device_id)
            .or_insert_with(|| Arc::new(runtime::Mutex::new(())))
            .clone()
    }

    /// Single-shot desired-state delta, outside any sequence.
    pub(crate) async fn operate(&self, light: &Light, operation: LightOperation) -> Result<()> {
        self.require_authenticated()?;
        let lock = self.operation_lock(light.device_id());
        let _guard = lock.lock().await;

        self.client
            .operate_light(light.device_id(), &operation, false)
            .await?;
        light.apply_operation(&operation);
        Ok(())
    }

    async fn sync_light_state(&self, light: &Light) -> Result<()> {
        self.require_authenticated()?;
        let lock = self.operation_lock(light.device_id());
        let _guard = lock.lock().await;

        let state = light.state();
        self.client.update_device(light.device_id(), &state).await
    }

    pub(crate) async fn execute_operations(
        &self,
        light: &Light,
        operations: &[LightOperation],
        pacing: Duration,
        revert: bool,
    ) -> Result<()> {
        self.require_authenticated()?;
        if operations.iter().any(|operation| !operation.is_valid()) {
            return Err(Error::NoAttribute);
        }
        let lock = self.operation_lock(light.device_id());
        let _guard = lock.lock().await;

        debug!(
            "session {}: sequencing {} operations for device {} (pacing {:?}, revert {})",
            self.id,
            operations.len(),
            light.device_id(),
            pacing,
            revert
        );
        let snapshot = light.state();

        let mut step_error = None;
        for operation in operations {
            match self
                .client
                .operate_light(light.device_id(), operation, true)
                .await
            {
                Ok(()) => {
                    light.apply_operation(operation);
                    runtime::delay(pacing).await;
                }
                Err(e) => {
                    step_error = Some(e);
                    break;
                }
            }
        }

        if revert {
            let mut restored = light.state();
            restored.update(&snapshot);
            light.replace_state(restored.clone());
            if let Err(revert_error) = self
                .client
                .update_device(light.device_id(), &restored)
                .await
            {
                match step_error {
                    // The aborted step stays the caller-visible error.
                    Some(_) => warn!(
                        "session {}: state restore for device {} failed after an aborted sequence: {}",
                        self.id,
                        light.device_id(),
                        revert_error
                    ),
                    None => return Err(Error::revert_failed(light.device_id(), revert_error)),
                }
            }
        }

        match step_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.stop_observing();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use std::sync::atomic::AtomicU32;

    use futures::channel::mpsc;

    use crate::accessory::{AccessoryKind, LightRecord};
    use crate::client::EventStream;
    use crate::runtime::BoxFuture;
    use crate::state::LightState;
    use crate::types::{Brightness, HexColor, Spectrum};

    use super::*;

    #[derive(Debug, Clone)]
    enum Transmission {
        Operate {
            device_id: u32,
            operation: LightOperation,
            ack_required: bool,
            at: tokio::time::Instant,
        },
        Update {
            device_id: u32,
            state: LightState,
            at: tokio::time::Instant,
        },
    }

    impl Transmission {
        fn operate(&self) -> (u32, &LightOperation, bool, tokio::time::Instant) {
            match self {
                Transmission::Operate {
                    device_id,
                    operation,
                    ack_required,
                    at,
                } => (*device_id, operation, *ack_required, *at),
                Transmission::Update { .. } => panic!("expected an operate transmission"),
            }
        }

        fn update(&self) -> (u32, &LightState, tokio::time::Instant) {
            match self {
                Transmission::Update {
                    device_id,
                    state,
                    at,
                } => (*device_id, state, *at),
                Transmission::Operate { .. } => panic!("expected an update transmission"),
            }
        }
    }

    #[derive(Default)]
    struct FakeGateway {
        transmissions: Mutex<Vec<Transmission>>,
        accessories: Mutex<Vec<Accessory>>,
        events: Mutex<Option<mpsc::UnboundedReceiver<GatewayEvent>>>,
        reject_code: bool,
        reject_connect: bool,
        failing_devices: Mutex<HashSet<u32>>,
        failing_updates: Mutex<HashSet<u32>>,
        observe_calls: AtomicU32,
    }

    impl FakeGateway {
        fn transmissions(&self) -> Vec<Transmission> {
            self.transmissions.lock().unwrap().clone()
        }

        fn clear_transmissions(&self) {
            self.transmissions.lock().unwrap().clear();
        }
    }

    impl GatewayClient for FakeGateway {
        fn authenticate<'a>(
            &'a self,
            security_code: &'a str,
        ) -> BoxFuture<'a, Result<GatewayIdentity>> {
            Box::pin(async move {
                if self.reject_code {
                    return Err(Error::auth_failed("security code rejected"));
                }
                Ok(GatewayIdentity::new(
                    "fake-identity",
                    &format!("psk-for-{security_code}"),
                ))
            })
        }

        fn connect<'a>(&'a self, _identity: &'a GatewayIdentity) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                if self.reject_connect {
                    return Err(Error::auth_failed("credentials revoked"));
                }
                Ok(())
            })
        }

        fn observe_devices(&self) -> BoxFuture<'_, Result<(Vec<Accessory>, EventStream)>> {
            Box::pin(async move {
                self.observe_calls.fetch_add(1, Ordering::SeqCst);
                let initial = self.accessories.lock().unwrap().clone();
                let stream: EventStream = match self.events.lock().unwrap().take() {
                    Some(receiver) => receiver.boxed(),
                    None => futures::stream::pending().boxed(),
                };
                Ok((initial, stream))
            })
        }

        fn operate_light<'a>(
            &'a self,
            device_id: u32,
            operation: &'a LightOperation,
            ack_required: bool,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                if self.failing_devices.lock().unwrap().contains(&device_id) {
                    return Err(Error::device_command(device_id, "gateway refused the write"));
                }
                self.transmissions.lock().unwrap().push(Transmission::Operate {
                    device_id,
                    operation: operation.clone(),
                    ack_required,
                    at: tokio::time::Instant::now(),
                });
                Ok(())
            })
        }

        fn update_device<'a>(
            &'a self,
            device_id: u32,
            state: &'a LightState,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                if self.failing_updates.lock().unwrap().contains(&device_id) {
                    return Err(Error::device_command(
                        device_id,
                        "gateway refused the update",
                    ));
                }
                self.transmissions.lock().unwrap().push(Transmission::Update {
                    device_id,
                    state: state.clone(),
                    at: tokio::time::Instant::now(),
                });
                Ok(())
            })
        }
    }

    fn make_state(on: Option<bool>, brightness: Option<u8>, color: Option<&str>) -> LightState {
        let mut operation = LightOperation::new();
        if let Some(on) = on {
            operation.on(on);
        }
        if let Some(value) = brightness {
            operation.brightness(&Brightness::create(value).unwrap());
        }
        if let Some(value) = color {
            operation.color(&HexColor::from_str(value).unwrap());
        }
        LightState::from(&operation)
    }

    fn bulb(instance_id: u32, name: &str, spectrum: Spectrum, state: LightState) -> Accessory {
        Accessory {
            instance_id,
            name: String::from(name),
            kind: AccessoryKind::Lightbulb,
            light: Some(LightRecord { spectrum, state }),
        }
    }

    fn remote(instance_id: u32, name: &str) -> Accessory {
        Accessory {
            instance_id,
            name: String::from(name),
            kind: AccessoryKind::Remote,
            light: None,
        }
    }

    fn brightness_op(value: u8) -> LightOperation {
        LightOperation::from(&Brightness::create(value).unwrap())
    }

    fn power_op(on: bool) -> LightOperation {
        let mut operation = LightOperation::new();
        operation.on(on);
        operation
    }

    fn gateway_address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 0, 129))
    }

    async fn observed_session(gateway: Arc<FakeGateway>) -> Session {
        let session = Session::new(gateway_address(), gateway);
        session
            .connect(&GatewayIdentity::new("fake-identity", "psk"))
            .await
            .unwrap();
        session.start_observing().await.unwrap();
        session
    }

    /// Give the event pump enough scheduler turns to drain pending events.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn authenticate_chains_into_a_full_connect() {
        let gateway = Arc::new(FakeGateway::default());
        let session = Session::new(gateway_address(), gateway);

        assert!(!session.is_authenticated());
        let identity = session.authenticate("oXkfpJW8mHnZbsQz").await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(identity.identity(), "fake-identity");
        assert_eq!(identity.psk(), "psk-for-oXkfpJW8mHnZbsQz");
    }

    #[tokio::test]
    async fn rejected_security_code_leaves_the_session_unauthenticated() {
        let gateway = Arc::new(FakeGateway {
            reject_code: true,
            ..FakeGateway::default()
        });
        let session = Session::new(gateway_address(), gateway);

        assert!(matches!(
            session.authenticate("wrong").await,
            Err(Error::AuthenticationFailed { .. })
        ));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn rejected_credentials_leave_the_session_unauthenticated() {
        let gateway = Arc::new(FakeGateway {
            reject_connect: true,
            ..FakeGateway::default()
        });
        let session = Session::new(gateway_address(), gateway);

        assert!(matches!(
            session.connect(&GatewayIdentity::new("old", "revoked")).await,
            Err(Error::AuthenticationFailed { .. })
        ));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn observing_requires_authentication() {
        let gateway = Arc::new(FakeGateway::default());
        let session = Session::new(gateway_address(), gateway);
        assert_eq!(session.start_observing().await, Err(Error::NotAuthenticated));
        assert!(!session.is_observing());
    }

    #[tokio::test]
    async fn initial_enumeration_fills_the_registry_synchronously() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![
                bulb(65537, "Hall", Spectrum::Rgb, make_state(Some(true), Some(80), None)),
                bulb(65538, "Desk", Spectrum::White, make_state(Some(false), None, None)),
                remote(65539, "Switch"),
            ]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway).await;

        assert!(session.is_observing());
        assert_eq!(session.lights().len(), 2);
        assert_eq!(session.light(65537).unwrap().name(), "Hall");
        assert_eq!(session.light(65538).unwrap().spectrum(), Spectrum::White);
        assert!(matches!(session.light(65539), Err(Error::NotFound(65539))));
    }

    #[tokio::test]
    async fn start_observing_twice_subscribes_once() {
        let gateway = Arc::new(FakeGateway::default());
        let session = observed_session(gateway.clone()).await;

        session.start_observing().await.unwrap();
        assert_eq!(gateway.observe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn events_after_stop_observing_never_reach_the_registry() {
        let (events_tx, events_rx) = mpsc::unbounded();
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), None, None),
            )]),
            events: Mutex::new(Some(events_rx)),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway).await;

        session.stop_observing();
        assert!(!session.is_observing());

        // Delivery may fail once the pump is torn down; either way the
        // report must not be applied.
        let report = bulb(65538, "Ghost", Spectrum::Rgb, make_state(Some(true), None, None));
        let _ = events_tx.unbounded_send(GatewayEvent::DeviceUpdated(report));
        settle().await;

        assert_eq!(session.lights().len(), 1);
        assert!(matches!(session.light(65538), Err(Error::NotFound(65538))));
        // Stopping observation is not a disconnect.
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn observing_can_restart_after_a_stop() {
        let (stale_tx, stale_rx) = mpsc::unbounded();
        let gateway = Arc::new(FakeGateway {
            events: Mutex::new(Some(stale_rx)),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        session.stop_observing();

        let (events_tx, events_rx) = mpsc::unbounded();
        *gateway.events.lock().unwrap() = Some(events_rx);
        session.start_observing().await.unwrap();
        assert!(session.is_observing());
        assert_eq!(gateway.observe_calls.load(Ordering::SeqCst), 2);

        // Only the fresh subscription feeds the registry now.
        let _ = stale_tx.unbounded_send(GatewayEvent::DeviceUpdated(bulb(
            65539,
            "Stale",
            Spectrum::Rgb,
            make_state(Some(true), None, None),
        )));
        events_tx
            .unbounded_send(GatewayEvent::DeviceUpdated(bulb(
                65538,
                "Desk",
                Spectrum::Rgb,
                make_state(Some(true), None, None),
            )))
            .unwrap();
        settle().await;

        assert_eq!(session.lights().len(), 1);
        assert!(session.light(65538).is_ok());
        assert!(matches!(session.light(65539), Err(Error::NotFound(65539))));
    }

    #[tokio::test]
    async fn duplicate_events_leave_one_registry_entry() {
        let (events_tx, events_rx) = mpsc::unbounded();
        let gateway = Arc::new(FakeGateway {
            events: Mutex::new(Some(events_rx)),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway).await;

        let report = bulb(65537, "Hall", Spectrum::Rgb, make_state(Some(true), None, None));
        events_tx
            .unbounded_send(GatewayEvent::DeviceUpdated(report.clone()))
            .unwrap();
        events_tx
            .unbounded_send(GatewayEvent::DeviceUpdated(report))
            .unwrap();
        settle().await;

        assert_eq!(session.lights().len(), 1);
        assert!(session.light(65537).is_ok());
    }

    #[tokio::test]
    async fn non_lightbulb_events_never_create_entries() {
        let (events_tx, events_rx) = mpsc::unbounded();
        let gateway = Arc::new(FakeGateway {
            events: Mutex::new(Some(events_rx)),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway).await;

        events_tx
            .unbounded_send(GatewayEvent::DeviceUpdated(remote(65537, "Switch")))
            .unwrap();
        // A lightbulb report without its light record is dropped too.
        let mut broken = remote(65538, "Odd");
        broken.kind = AccessoryKind::Lightbulb;
        events_tx
            .unbounded_send(GatewayEvent::DeviceUpdated(broken))
            .unwrap();
        settle().await;

        assert!(session.lights().is_empty());
        assert!(matches!(session.light(65537), Err(Error::NotFound(65537))));
    }

    #[tokio::test]
    async fn update_events_replace_the_entry_and_stale_handles_stop_refreshing() {
        let (events_tx, events_rx) = mpsc::unbounded();
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            events: Mutex::new(Some(events_rx)),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway).await;
        let stale = session.light(65537).unwrap();

        events_tx
            .unbounded_send(GatewayEvent::DeviceUpdated(bulb(
                65537,
                "Hallway",
                Spectrum::Rgb,
                make_state(Some(false), Some(10), None),
            )))
            .unwrap();
        settle().await;

        let fresh = session.light(65537).unwrap();
        assert_eq!(session.lights().len(), 1);
        assert_eq!(fresh.name(), "Hallway");
        assert_eq!(fresh.state(), make_state(Some(false), Some(10), None));
        // The earlier handle still addresses the same device but kept its
        // old snapshot.
        assert_eq!(stale.device_id(), fresh.device_id());
        assert_eq!(stale.name(), "Hall");
        assert_eq!(stale.state(), make_state(Some(true), Some(80), None));
    }

    #[tokio::test]
    async fn connection_loss_clears_the_authenticated_flag() {
        let (events_tx, events_rx) = mpsc::unbounded();
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), None, None),
            )]),
            events: Mutex::new(Some(events_rx)),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        events_tx
            .unbounded_send(GatewayEvent::ConnectionLost)
            .unwrap();
        settle().await;

        assert!(!session.is_authenticated());
        assert!(!session.is_observing());

        // Guard property: nothing is transmitted once unauthenticated.
        gateway.clear_transmissions();
        assert_eq!(light.toggle().await, Err(Error::NotAuthenticated));
        assert_eq!(
            session
                .execute_operations(&light, &[power_op(true)], Duration::ZERO, false)
                .await,
            Err(Error::NotAuthenticated)
        );
        assert_eq!(session.sync_light_state(&light).await, Err(Error::NotAuthenticated));
        assert!(gateway.transmissions().is_empty());
    }

    #[tokio::test]
    async fn direct_operations_are_unacknowledged_single_writes() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        light.toggle().await.unwrap();
        light.set_brightness(40).await.unwrap();

        let sent = gateway.transmissions();
        assert_eq!(sent.len(), 2);
        let (device_id, operation, ack_required, _) = sent[0].operate();
        assert_eq!(device_id, 65537);
        assert_eq!(operation, &power_op(false));
        assert!(!ack_required);
        let (_, operation, ack_required, _) = sent[1].operate();
        assert_eq!(operation, &brightness_op(40));
        assert!(!ack_required);

        // The in-memory desired state tracked both writes.
        assert_eq!(light.state(), make_state(Some(false), Some(40), None));
    }

    #[tokio::test]
    async fn sync_light_state_pushes_the_current_snapshot() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), Some("F1E0B5")),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        session.sync_light_state(&light).await.unwrap();

        let sent = gateway.transmissions();
        assert_eq!(sent.len(), 1);
        let (device_id, state, _) = sent[0].update();
        assert_eq!(device_id, 65537);
        assert_eq!(state, &make_state(Some(true), Some(80), Some("F1E0B5")));
    }

    #[tokio::test]
    async fn operations_with_no_attributes_are_rejected_up_front() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        let operations = [power_op(false), LightOperation::new()];
        let outcome = session
            .execute_operations(&light, &operations, Duration::ZERO, true)
            .await;

        assert_eq!(outcome, Err(Error::NoAttribute));
        // Not even the valid leading step went out.
        assert!(gateway.transmissions().is_empty());
        assert_eq!(light.state(), make_state(Some(true), Some(80), None));
    }

    #[tokio::test(start_paused = true)]
    async fn sequences_transmit_in_order_with_pacing() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        let operations = [brightness_op(10), brightness_op(20), brightness_op(30)];
        let pacing = Duration::from_millis(500);
        session
            .execute_operations(&light, &operations, pacing, false)
            .await
            .unwrap();

        let sent = gateway.transmissions();
        assert_eq!(sent.len(), 3);
        let (_, _, _, first_at) = sent[0].operate();
        for (index, (transmission, expected)) in sent.iter().zip(&operations).enumerate() {
            let (device_id, operation, ack_required, at) = transmission.operate();
            assert_eq!(device_id, 65537);
            assert_eq!(operation, expected);
            assert!(ack_required);
            assert!(at.duration_since(first_at) >= pacing * index as u32);
        }
    }

    #[tokio::test]
    async fn revert_merges_the_snapshot_over_the_end_state() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        let mut recolor = brightness_op(10);
        recolor.color(&HexColor::from_str("4A418A").unwrap());
        session
            .execute_operations(
                &light,
                &[power_op(false), recolor],
                Duration::ZERO,
                true,
            )
            .await
            .unwrap();

        let sent = gateway.transmissions();
        assert_eq!(sent.len(), 3);
        // Snapshot fields win; the color the snapshot never had survives
        // from the sequence.
        let expected = make_state(Some(true), Some(80), Some("4A418A"));
        let (_, state, _) = sent[2].update();
        assert_eq!(state, &expected);
        assert_eq!(light.state(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn identify_transmits_the_fixed_pattern_and_restores_state() {
        let initial = make_state(Some(true), Some(80), Some("F1E0B5"));
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(65537, "Hall", Spectrum::Rgb, initial.clone())]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        light.identify().await.unwrap();

        let mut attention = LightOperation::new();
        attention.on(true);
        attention.color(&HexColor::from_str("FF0000").unwrap());
        attention.brightness(&Brightness::create(100).unwrap());
        let expected = [
            attention,
            power_op(false),
            power_op(true),
            power_op(false),
            power_op(true),
            power_op(false),
        ];

        let sent = gateway.transmissions();
        assert_eq!(sent.len(), 7);
        let pacing = Duration::from_millis(1000);
        let mut previous_at = None;
        for (transmission, expected) in sent[..6].iter().zip(&expected) {
            let (_, operation, ack_required, at) = transmission.operate();
            assert_eq!(operation, expected);
            assert!(ack_required);
            if let Some(previous) = previous_at {
                assert!(at.duration_since(previous) >= pacing);
            }
            previous_at = Some(at);
        }

        // One revert update, paced like any other step, restoring the
        // pre-call state.
        let (_, state, at) = sent[6].update();
        assert_eq!(state, &initial);
        assert_eq!(light.state(), initial);
        if let Some(previous) = previous_at {
            assert!(at.duration_since(previous) >= pacing);
        }
    }

    #[tokio::test]
    async fn failed_step_aborts_the_rest_but_still_attempts_the_revert() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        gateway.failing_devices.lock().unwrap().insert(65537);
        let outcome = session
            .execute_operations(
                &light,
                &[power_op(false), brightness_op(10)],
                Duration::ZERO,
                true,
            )
            .await;
        assert!(matches!(outcome, Err(Error::DeviceCommand { .. })));

        // No step went out, but the best-effort restore did.
        let sent = gateway.transmissions();
        assert_eq!(sent.len(), 1);
        let (_, state, _) = sent[0].update();
        assert_eq!(state, &make_state(Some(true), Some(80), None));
    }

    #[tokio::test]
    async fn revert_failure_on_a_successful_run_is_reported_distinctly() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        gateway.failing_updates.lock().unwrap().insert(65537);
        let outcome = session
            .execute_operations(&light, &[power_op(false)], Duration::ZERO, true)
            .await;
        assert!(matches!(
            outcome,
            Err(Error::RevertFailed { device_id: 65537, .. })
        ));
    }

    #[tokio::test]
    async fn revert_failure_never_masks_the_original_step_error() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        gateway.failing_devices.lock().unwrap().insert(65537);
        gateway.failing_updates.lock().unwrap().insert(65537);
        let outcome = session
            .execute_operations(&light, &[power_op(false)], Duration::ZERO, true)
            .await;
        assert!(matches!(outcome, Err(Error::DeviceCommand { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_runs_every_light_to_completion() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![
                bulb(65537, "Hall", Spectrum::Rgb, make_state(Some(true), Some(80), None)),
                bulb(65538, "Desk", Spectrum::Rgb, make_state(Some(false), Some(20), None)),
            ]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let lights = [session.light(65537).unwrap(), session.light(65538).unwrap()];

        gateway.failing_devices.lock().unwrap().insert(65537);
        let started = tokio::time::Instant::now();
        let outcomes = session
            .execute_operations_multiple(
                &lights,
                &[power_op(true), power_op(false)],
                Duration::from_millis(500),
                true,
            )
            .await;

        // Outcomes follow the input order and both are reported.
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].device_id, 65537);
        assert!(matches!(outcomes[0].outcome, Err(Error::DeviceCommand { .. })));
        assert_eq!(outcomes[1].device_id, 65538);
        assert!(outcomes[1].outcome.is_ok());

        // The healthy light got its full sequence and revert.
        let device_2: Vec<_> = gateway
            .transmissions()
            .into_iter()
            .filter(|t| match t {
                Transmission::Operate { device_id, .. } => *device_id == 65538,
                Transmission::Update { device_id, .. } => *device_id == 65538,
            })
            .collect();
        assert_eq!(device_2.len(), 3);
        let (_, state, _) = device_2[2].update();
        assert_eq!(state, &make_state(Some(false), Some(20), None));

        // Pacing is per light: two paced steps finished in ~2 steps of
        // wall-clock, not four.
        assert!(started.elapsed() < Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn same_light_sequences_are_serialized() {
        let gateway = Arc::new(FakeGateway {
            accessories: Mutex::new(vec![bulb(
                65537,
                "Hall",
                Spectrum::Rgb,
                make_state(Some(true), Some(80), None),
            )]),
            ..FakeGateway::default()
        });
        let session = observed_session(gateway.clone()).await;
        let light = session.light(65537).unwrap();

        let first_ops = [brightness_op(10), brightness_op(20)];
        let second_ops = [brightness_op(30), brightness_op(40)];
        let first =
            session.execute_operations(&light, &first_ops, Duration::from_millis(100), false);
        let second =
            session.execute_operations(&light, &second_ops, Duration::from_millis(100), false);
        let (a, b) = futures::join!(first, second);
        a.unwrap();
        b.unwrap();

        let brightnesses: Vec<u8> = gateway
            .transmissions()
            .iter()
            .map(|t| t.operate().1.get_brightness().unwrap())
            .collect();
        assert!(
            brightnesses == vec![10, 20, 30, 40] || brightnesses == vec![30, 40, 10, 20],
            "sequences interleaved: {brightnesses:?}"
        );
    }
}
