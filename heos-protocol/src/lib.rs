//! # heos-protocol
//!
//! Wire protocol of the HEOS control interface.
//!
//! This crate provides:
//! - CRLF framing for the command and event channels
//! - Request line building (`heos://<command>?k=v&k=v`)
//! - Decoding of JSON envelopes and their flat `k=v` bodies
//! - The command and event catalogues with their result extraction tables
//! - Protocol errors and device error codes

pub mod codec;
pub mod command;
pub mod error;
pub mod event;
pub mod frame;
pub mod message;
pub mod query;

pub use codec::{decode_message, Request};
pub use command::{Command, Extraction};
pub use error::{DeviceError, DeviceErrorCode, ProtocolError};
pub use event::{EventKind, HeosEvent};
pub use frame::{CommandFramer, EventFramer};
pub use message::{Body, CommandResult, Envelope, FieldValue, LoginState, Message};
pub use query::{Query, QueryValue};

/// TCP port of the control interface.
pub const HEOS_PORT: u16 = 1255;

/// Terminator of every request and response.
pub const DELIMITER: &[u8] = b"\r\n";

/// Scheme prefix of request lines.
pub const SCHEME: &str = "heos://";

/// Command prefix shared by all unsolicited events.
pub const EVENT_PREFIX: &str = "event/";

/// Body prefix of the interim "still processing" response.
pub const COMMAND_UNDER_PROCESS: &str = "command under process";

pub const ON: &str = "on";
pub const OFF: &str = "off";

pub const SIGNED_IN: &str = "signed_in";
pub const SIGNED_OUT: &str = "signed_out";

/// Maximum size of one accumulated command channel message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
