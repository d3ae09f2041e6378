//! Client error types.

use crate::connection::{Channel, ConnectionStatus};
use heos_protocol::{DeviceError, ProtocolError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The channel has no open socket.
    #[error("{0} channel is not connected")]
    NotReady(Channel),

    /// Another command is still in flight on the channel.
    #[error("a command is already pending on the {0} channel")]
    CommandPending(Channel),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out")]
    Timeout,

    #[error("invalid connection state: {0}")]
    InvalidState(ConnectionStatus),

    #[error("command failed: {0}")]
    Command(#[from] DeviceError),

    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns whether the same call might succeed if issued again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::CommandPending(_) => true,
            ClientError::Command(err) => err.code().is_transient(),
            _ => false,
        }
    }

    /// Returns the device-reported failure, if this is one.
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            ClientError::Command(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_error(id: i64) -> ClientError {
        ClientError::Command(DeviceError {
            id,
            text: "text".to_string(),
            system_errno: None,
        })
    }

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::CommandPending(Channel::Command).is_retryable());
        assert!(device_error(13).is_retryable());

        assert!(!device_error(9).is_retryable());
        assert!(!ClientError::ConnectionClosed.is_retryable());
        assert!(!ClientError::NotReady(Channel::Event).is_retryable());
        assert!(!ClientError::validation("level").is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ClientError::NotReady(Channel::Event).to_string(),
            "event channel is not connected"
        );
        assert_eq!(
            ClientError::CommandPending(Channel::Command).to_string(),
            "a command is already pending on the command channel"
        );
        assert_eq!(
            ClientError::InvalidState(ConnectionStatus::Closed).to_string(),
            "invalid connection state: closed"
        );
        assert_eq!(
            device_error(9).to_string(),
            "command failed: device error 9: text"
        );
    }

    #[test]
    fn test_device_error_accessor() {
        assert_eq!(device_error(2).device_error().map(|e| e.id), Some(2));
        assert!(ClientError::Timeout.device_error().is_none());
    }
}
