//! Walk a full gateway session against a simulated Trådfri gateway.
//!
//! This example demonstrates:
//! - Locating the gateway through the discovery seam (with a timeout)
//! - Exchanging the gateway security code for a reusable credential pair
//! - Observing the device registry and listing the known lights
//! - The identify blink pattern and a paced multi-light sequence
//!
//! Run with: cargo run --example identify_light

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use tradfri_gateway_rs::runtime::{self, BoxFuture};
use tradfri_gateway_rs::{
    Accessory, AccessoryKind, Brightness, DiscoverGateway, Error, EventStream, GatewayClient,
    GatewayDetails, GatewayIdentity, LightOperation, LightRecord, LightState, PaletteColor,
    Session, Spectrum,
};

/// Stand-in for an mDNS responder: reports one gateway immediately.
struct StaticDiscovery;

impl DiscoverGateway for StaticDiscovery {
    fn discover(&self) -> BoxFuture<'_, Result<GatewayDetails, Error>> {
        Box::pin(async {
            Ok(GatewayDetails {
                name: String::from("gw-b072bf257a41"),
                addresses: vec![IpAddr::V4(Ipv4Addr::new(192, 168, 0, 129))],
            })
        })
    }
}

/// Loopback gateway: accepts any security code and prints every write it
/// would forward to a bulb.
struct SimulatedGateway;

impl SimulatedGateway {
    fn bulb(instance_id: u32, name: &str, spectrum: Spectrum) -> Accessory {
        let mut on = LightOperation::new();
        on.on(true);
        Accessory {
            instance_id,
            name: String::from(name),
            kind: AccessoryKind::Lightbulb,
            light: Some(LightRecord {
                spectrum,
                state: LightState::from(&on),
            }),
        }
    }
}

impl GatewayClient for SimulatedGateway {
    fn authenticate<'a>(
        &'a self,
        _security_code: &'a str,
    ) -> BoxFuture<'a, Result<GatewayIdentity, Error>> {
        Box::pin(async { Ok(GatewayIdentity::new("demo-client", "demo-pre-shared-key")) })
    }

    fn connect<'a>(&'a self, identity: &'a GatewayIdentity) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            println!("gateway: DTLS handshake with identity {:?}", identity.identity());
            Ok(())
        })
    }

    fn observe_devices(&self) -> BoxFuture<'_, Result<(Vec<Accessory>, EventStream), Error>> {
        Box::pin(async {
            let devices = vec![
                Self::bulb(65537, "Hallway", Spectrum::Rgb),
                Self::bulb(65538, "Reading lamp", Spectrum::White),
            ];
            let stream: EventStream = Box::pin(futures::stream::pending());
            Ok((devices, stream))
        })
    }

    fn operate_light<'a>(
        &'a self,
        device_id: u32,
        operation: &'a LightOperation,
        ack_required: bool,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let ack = if ack_required { "confirmed" } else { "fire-and-forget" };
            println!("gateway: device {device_id} <- {operation:?} ({ack})");
            Ok(())
        })
    }

    fn update_device<'a>(
        &'a self,
        device_id: u32,
        state: &'a LightState,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            println!("gateway: device {device_id} restored to {state:?}");
            Ok(())
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Looking for a Trådfri gateway...");

    let discovery = StaticDiscovery;
    let details = runtime::timeout(Duration::from_secs(5), discovery.discover()).await??;
    let address = details
        .primary_address()
        .ok_or("gateway advertised no address")?;
    println!("Found {} at {}", details.name, address);

    let session = Session::new(address, Arc::new(SimulatedGateway));

    // First run: trade the security code from the gateway label for a
    // credential pair. Store the JSON and use `connect` on later runs.
    let identity = session.authenticate("oXkfpJW8mHnZbsQz").await?;
    println!("Credentials to store: {}", identity.to_json()?);

    session.start_observing().await?;
    let mut lights = session.lights();
    lights.sort_by_key(|light| light.device_id());

    println!("\nKnown lights:");
    for light in &lights {
        println!(
            "  - {} ({}, {} spectrum)",
            light.name(),
            light.device_id(),
            light.spectrum()
        );
    }

    // Blink the first bulb red so it can be spotted on the ceiling. The
    // pattern runs for a few seconds and restores the previous state.
    if let Some(light) = lights.first() {
        println!("\nIdentifying {}...", light.name());
        light.identify().await?;
    }

    // Wind every bulb down together: warm color, dimmed, then off.
    let mut dim = LightOperation::from(&PaletteColor::Warm);
    dim.brightness(&Brightness::create(30).ok_or("brightness out of range")?);
    let mut off = LightOperation::new();
    off.on(false);

    println!("\nGood night...");
    let outcomes = session
        .execute_operations_multiple(&lights, &[dim, off], Duration::from_millis(400), false)
        .await;
    for outcome in outcomes {
        match outcome.outcome {
            Ok(()) => println!("  ✓ device {} wound down", outcome.device_id),
            Err(e) => eprintln!("  ✗ device {} failed: {}", outcome.device_id, e),
        }
    }

    session.stop_observing();
    println!("\nDone!");
    Ok(())
}
