//! Diagnostic hooks for connection internals.

use crate::connection::{Channel, ConnectionStatus};
use heos_protocol::{Command, Message, ProtocolError};

/// Receives notifications about things the connection handles silently.
///
/// Every method has an empty default, so implementors only override what they
/// care about. Calls happen on the read loop tasks and must not block.
pub trait Observer: Send + Sync {
    fn status_changed(&self, _from: ConnectionStatus, _to: ConnectionStatus) {}

    /// A framed message could not be decoded, or was too large to frame.
    fn message_dropped(&self, _channel: Channel, _error: &ProtocolError) {}

    /// A response arrived while no command was pending on the channel.
    fn unmatched_response(&self, _channel: Channel, _message: &Message) {}

    /// The device reported that it is still working on `command`.
    fn command_processing(&self, _channel: Channel, _command: Command) {}

    /// An event with an identifier this library does not know.
    fn unknown_event(&self, _message: &Message) {}
}

/// Forwards every notification to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn status_changed(&self, from: ConnectionStatus, to: ConnectionStatus) {
        tracing::debug!("Connection status {} -> {}", from, to);
    }

    fn message_dropped(&self, channel: Channel, error: &ProtocolError) {
        tracing::warn!("Dropped message on {} channel: {}", channel, error);
    }

    fn unmatched_response(&self, channel: Channel, message: &Message) {
        tracing::warn!(
            "No pending command on {} channel for response {}",
            channel,
            message.command()
        );
    }

    fn command_processing(&self, channel: Channel, command: Command) {
        tracing::debug!("Device still processing {} on {} channel", command, channel);
    }

    fn unknown_event(&self, message: &Message) {
        tracing::warn!("Ignoring unknown event {}", message.command());
    }
}
