//! # tradfri_gateway_rs
//!
//! An async Rust library for managing sessions with an IKEA Trådfri smart
//! lighting gateway.
//!
//! This crate provides a **runtime-agnostic** session layer for a Trådfri
//! gateway: authentication with the security code printed on the gateway,
//! a live registry of the lights the gateway knows, and an operation
//! sequencer for ordered, paced, reversible light programs.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::net::IpAddr;
//! use std::str::FromStr;
//! use std::sync::Arc;
//! use tradfri_gateway_rs::{GatewayClient, Session};
//!
//! // Works with any async runtime!
//! async fn first_run(client: Arc<dyn GatewayClient>) -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(IpAddr::from_str("192.168.0.129")?, client);
//!
//!     // Exchange the security code from the gateway label for a
//!     // credential pair, and persist it for later runs.
//!     let identity = session.authenticate("oXkfpJW8mHnZbsQz").await?;
//!     println!("store this: {}", identity.to_json()?);
//!
//!     // Enumerate the devices and keep following gateway updates.
//!     session.start_observing().await?;
//!     for light in session.lights() {
//!         light.toggle().await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Runtime Agnostic**: Works with tokio, async-std, or smol async runtimes
//! - **Authenticated Sessions**: Security-code bootstrap yielding a reusable
//!   [`GatewayIdentity`] credential pair
//! - **Live Device Registry**: Gateway observation keeps [`Session::lights`]
//!   fresh without polling
//! - **Light Control**: Power, brightness (0-100) and hex colors through
//!   [`Light`], validated against the bulb's [`Spectrum`]
//! - **Operation Sequences**: Ordered, paced, optionally reverting programs
//!   with [`Session::execute_operations`]
//! - **Multi-Light Fan-out**: One sequence across many bulbs with
//!   [`Session::execute_operations_multiple`]
//! - **Identify**: Make a bulb blink red to locate it with [`Light::identify`]
//! - **Discovery**: Find the gateway on the local network through the
//!   [`DiscoverGateway`] seam
//!
//! ## Communication
//!
//! A Trådfri gateway speaks CoAP over DTLS on the local network. This crate
//! models everything above that wire: implement [`GatewayClient`] for your
//! transport (or bring an existing one) and the session layer drives it.
//!
//! ## Runtime Selection
//!
//! This library is runtime-agnostic. Select your preferred runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! tradfri-gateway-rs = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! tradfri-gateway-rs = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! tradfri-gateway-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! smol = "2"
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime

mod accessory;
mod client;
mod discovery;
mod errors;
mod identity;
mod light;
mod operation;
pub mod runtime;
mod session;
mod state;
mod types;

// Re-export public API
pub use accessory::{Accessory, AccessoryKind, LightRecord};
pub use client::{EventStream, GatewayClient, GatewayEvent};
pub use discovery::{DiscoverGateway, GatewayDetails};
pub use errors::Error;
pub use identity::GatewayIdentity;
pub use light::{DeviceData, Light};
pub use operation::LightOperation;
pub use session::{LightOutcome, Session};
pub use state::LightState;
pub use types::{Brightness, HexColor, PaletteColor, Spectrum};
