//! # Blockwright World
//!
//! The command channel between Blockwright and a running world: a
//! newline-delimited JSON protocol over TCP, the client that speaks it,
//! a typed façade implementing [`blockwright_core::World`], and the
//! dispatcher that serves it.

pub mod client;
pub mod dispatcher;
pub mod facade;
pub mod protocol;
pub mod simulated;

pub use client::TransportClient;
pub use dispatcher::{Dispatcher, HostError, WorldHost};
pub use facade::WorldClient;
pub use protocol::{Command, Envelope, Reply};
pub use simulated::SimulatedWorld;
