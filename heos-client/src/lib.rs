//! # heos-client
//!
//! Async client for the HEOS control protocol.
//!
//! This crate provides:
//! - [`Connection`]: the command and event channels to one device, with a
//!   single in-flight command per channel
//! - Event listeners and a typed event stream
//! - Command wrappers grouped as [`system`], [`player`], [`group`] and [`browse`]
//! - SSDP [`discovery`]

pub mod browse;
pub mod connection;
mod correlator;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod group;
pub mod observer;
pub mod player;
pub mod system;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{Channel, Connection, ConnectionConfig, ConnectionStatus, Endpoint};
pub use discovery::{discover, DiscoveryOptions};
pub use dispatcher::{listener, EventDispatcher, Listener};
pub use error::ClientError;
pub use observer::{Observer, TracingObserver};

pub use heos_protocol::{Command, DeviceError, DeviceErrorCode, EventKind, HeosEvent, Query};
