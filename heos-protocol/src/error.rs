//! Protocol error types and device error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur while framing or decoding messages.
///
/// None of these is fatal to a channel: the offending message is dropped and
/// the channel keeps reading.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 in message")]
    InvalidUtf8,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid request line: {0}")]
    InvalidRequest(String),
}

/// Structured failure reported by a device (`result=fail`).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("device error {id}: {text}")]
pub struct DeviceError {
    /// Error id from the `eid` field.
    pub id: i64,
    /// Human-readable text from the `text` field.
    pub text: String,
    /// Underlying system errno (`syserrno`), reported for system errors only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_errno: Option<i64>,
}

impl DeviceError {
    pub fn code(&self) -> DeviceErrorCode {
        DeviceErrorCode::from(self.id)
    }
}

/// Error codes reported by a device in the `eid` field of a failed response.
///
/// Unknown codes are preserved as [`DeviceErrorCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum DeviceErrorCode {
    UnrecognizedCommand,
    InvalidId,
    WrongNumberOfArguments,
    DataNotAvailable,
    ResourceNotAvailable,
    InvalidCredentials,
    CommandNotExecuted,
    UserNotLoggedIn,
    ParameterOutOfRange,
    UserNotFound,
    InternalError,
    SystemError,
    ProcessingPreviousCommand,
    MediaCantBePlayed,
    OptionNotSupported,
    TooManyCommands,
    ReachedSkipLimit,
    Other(i64),
}

impl DeviceErrorCode {
    /// Returns whether the device might accept the same command later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeviceErrorCode::ResourceNotAvailable
                | DeviceErrorCode::ProcessingPreviousCommand
                | DeviceErrorCode::TooManyCommands
        )
    }
}

impl From<i64> for DeviceErrorCode {
    fn from(id: i64) -> Self {
        match id {
            1 => DeviceErrorCode::UnrecognizedCommand,
            2 => DeviceErrorCode::InvalidId,
            3 => DeviceErrorCode::WrongNumberOfArguments,
            4 => DeviceErrorCode::DataNotAvailable,
            5 => DeviceErrorCode::ResourceNotAvailable,
            6 => DeviceErrorCode::InvalidCredentials,
            7 => DeviceErrorCode::CommandNotExecuted,
            8 => DeviceErrorCode::UserNotLoggedIn,
            9 => DeviceErrorCode::ParameterOutOfRange,
            10 => DeviceErrorCode::UserNotFound,
            11 => DeviceErrorCode::InternalError,
            12 => DeviceErrorCode::SystemError,
            13 => DeviceErrorCode::ProcessingPreviousCommand,
            14 => DeviceErrorCode::MediaCantBePlayed,
            15 => DeviceErrorCode::OptionNotSupported,
            16 => DeviceErrorCode::TooManyCommands,
            17 => DeviceErrorCode::ReachedSkipLimit,
            other => DeviceErrorCode::Other(other),
        }
    }
}

impl From<DeviceErrorCode> for i64 {
    fn from(code: DeviceErrorCode) -> Self {
        match code {
            DeviceErrorCode::UnrecognizedCommand => 1,
            DeviceErrorCode::InvalidId => 2,
            DeviceErrorCode::WrongNumberOfArguments => 3,
            DeviceErrorCode::DataNotAvailable => 4,
            DeviceErrorCode::ResourceNotAvailable => 5,
            DeviceErrorCode::InvalidCredentials => 6,
            DeviceErrorCode::CommandNotExecuted => 7,
            DeviceErrorCode::UserNotLoggedIn => 8,
            DeviceErrorCode::ParameterOutOfRange => 9,
            DeviceErrorCode::UserNotFound => 10,
            DeviceErrorCode::InternalError => 11,
            DeviceErrorCode::SystemError => 12,
            DeviceErrorCode::ProcessingPreviousCommand => 13,
            DeviceErrorCode::MediaCantBePlayed => 14,
            DeviceErrorCode::OptionNotSupported => 15,
            DeviceErrorCode::TooManyCommands => 16,
            DeviceErrorCode::ReachedSkipLimit => 17,
            DeviceErrorCode::Other(id) => id,
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceErrorCode::UnrecognizedCommand => write!(f, "unrecognized command"),
            DeviceErrorCode::InvalidId => write!(f, "invalid ID"),
            DeviceErrorCode::WrongNumberOfArguments => {
                write!(f, "wrong number of command arguments")
            }
            DeviceErrorCode::DataNotAvailable => write!(f, "requested data not available"),
            DeviceErrorCode::ResourceNotAvailable => write!(f, "resource currently not available"),
            DeviceErrorCode::InvalidCredentials => write!(f, "invalid credentials"),
            DeviceErrorCode::CommandNotExecuted => write!(f, "command could not be executed"),
            DeviceErrorCode::UserNotLoggedIn => write!(f, "user not logged in"),
            DeviceErrorCode::ParameterOutOfRange => write!(f, "parameter out of range"),
            DeviceErrorCode::UserNotFound => write!(f, "user not found"),
            DeviceErrorCode::InternalError => write!(f, "internal error"),
            DeviceErrorCode::SystemError => write!(f, "system error"),
            DeviceErrorCode::ProcessingPreviousCommand => write!(f, "processing previous command"),
            DeviceErrorCode::MediaCantBePlayed => write!(f, "media can't be played"),
            DeviceErrorCode::OptionNotSupported => write!(f, "option not supported"),
            DeviceErrorCode::TooManyCommands => write!(f, "too many commands in message queue"),
            DeviceErrorCode::ReachedSkipLimit => write!(f, "reached skip limit"),
            DeviceErrorCode::Other(id) => write!(f, "error {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_code_mapping() {
        for id in 1..=17 {
            let code = DeviceErrorCode::from(id);
            assert!(!matches!(code, DeviceErrorCode::Other(_)));
            assert_eq!(i64::from(code), id);
        }

        assert_eq!(DeviceErrorCode::from(9), DeviceErrorCode::ParameterOutOfRange);
        assert_eq!(DeviceErrorCode::from(1061), DeviceErrorCode::Other(1061));
        assert_eq!(i64::from(DeviceErrorCode::Other(1061)), 1061);
    }

    #[test]
    fn test_device_error_code_transient() {
        assert!(DeviceErrorCode::ProcessingPreviousCommand.is_transient());
        assert!(DeviceErrorCode::TooManyCommands.is_transient());
        assert!(DeviceErrorCode::ResourceNotAvailable.is_transient());

        assert!(!DeviceErrorCode::InvalidId.is_transient());
        assert!(!DeviceErrorCode::ParameterOutOfRange.is_transient());
        assert!(!DeviceErrorCode::Other(42).is_transient());
    }

    #[test]
    fn test_device_error_code_serialization() {
        let json = serde_json::to_string(&DeviceErrorCode::UserNotLoggedIn).unwrap();
        assert_eq!(json, "8");

        let parsed: DeviceErrorCode = serde_json::from_str("13").unwrap();
        assert_eq!(parsed, DeviceErrorCode::ProcessingPreviousCommand);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::MessageTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));

        let err = ProtocolError::InvalidUtf8;
        assert!(err.to_string().contains("UTF-8"));

        let err = ProtocolError::UnknownCommand("player/nope".to_string());
        assert!(err.to_string().contains("player/nope"));

        let err = ProtocolError::UnknownEvent("event/nope".to_string());
        assert!(err.to_string().contains("event/nope"));

        let err = ProtocolError::MissingField("pid");
        assert!(err.to_string().contains("pid"));

        let err = ProtocolError::InvalidRequest("http://x".to_string());
        assert!(err.to_string().contains("http://x"));
    }

    #[test]
    fn test_device_error_display() {
        let err = DeviceError {
            id: 9,
            text: "Parameter out of range".to_string(),
            system_errno: None,
        };
        assert_eq!(err.to_string(), "device error 9: Parameter out of range");
        assert_eq!(err.code(), DeviceErrorCode::ParameterOutOfRange);
    }
}
