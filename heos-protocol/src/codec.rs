//! Request line encoding and response decoding.

use crate::command::Command;
use crate::error::ProtocolError;
use crate::message::{FieldValue, Message};
use crate::query::{Query, QueryValue};
use crate::{DELIMITER, SCHEME};
use bytes::{BufMut, Bytes, BytesMut};

/// One outbound command line: `heos://<command>[?k=v&k=v]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub query: Query,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            query: Query::new(),
        }
    }

    pub fn with_query(command: Command, query: Query) -> Self {
        Self { command, query }
    }

    /// Renders the line without the trailing delimiter.
    pub fn line(&self) -> String {
        if self.query.is_empty() {
            format!("{}{}", SCHEME, self.command)
        } else {
            format!("{}{}?{}", SCHEME, self.command, self.query)
        }
    }

    /// Encodes the line with its CRLF terminator.
    pub fn encode(&self) -> Bytes {
        let line = self.line();
        let mut buf = BytesMut::with_capacity(line.len() + DELIMITER.len());
        buf.put_slice(line.as_bytes());
        buf.put_slice(DELIMITER);
        buf.freeze()
    }

    /// Parses a request line, with or without its delimiter.
    ///
    /// Query values are typed the same way as response bodies and keep their order.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        let rest = line
            .strip_prefix(SCHEME)
            .ok_or_else(|| ProtocolError::InvalidRequest(line.to_string()))?;

        let (command, raw_query) = match rest.split_once('?') {
            Some((command, query)) => (command, query),
            None => (rest, ""),
        };
        let command: Command = command.parse()?;

        let mut query = Query::new();
        for token in raw_query.split('&').filter(|t| !t.is_empty()) {
            let (key, value) = token.split_once('=').unwrap_or((token, ""));
            let value = match FieldValue::decode(key, value) {
                FieldValue::Number(n) => QueryValue::Number(n),
                FieldValue::Numbers(n) => QueryValue::List(n),
                FieldValue::Text(s) => QueryValue::Text(s),
            };
            query.set(key, value);
        }

        Ok(Self { command, query })
    }
}

/// Decodes one framed message.
pub fn decode_message(data: &[u8]) -> Result<Message, ProtocolError> {
    let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;
    Message::from_json(text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_without_query() {
        let request = Request::new(Command::GetPlayers);
        assert_eq!(request.line(), "heos://player/get_players");
        assert_eq!(&request.encode()[..], b"heos://player/get_players\r\n");
    }

    #[test]
    fn test_line_with_query() {
        let request = Request::with_query(
            Command::SetPlayState,
            Query::new().with("pid", 1).with("state", "play"),
        );
        assert_eq!(
            request.line(),
            "heos://player/set_play_state?pid=1&state=play"
        );
    }

    #[test]
    fn test_line_with_list() {
        let request = Request::with_query(
            Command::GetQueue,
            Query::new().with("pid", 1).with("range", vec![0i64, 99]),
        );
        assert_eq!(
            &request.encode()[..],
            b"heos://player/get_queue?pid=1&range=0,99\r\n"
        );
    }

    #[test]
    fn test_parse_request() {
        let request = Request::parse("heos://player/get_queue?pid=1&range=0,99\r\n").unwrap();
        assert_eq!(request.command, Command::GetQueue);
        assert_eq!(request.query.get("pid"), Some(&QueryValue::Number(1)));
        assert_eq!(
            request.query.get("range"),
            Some(&QueryValue::List(vec![0i64, 99]))
        );

        let request =
            Request::parse("heos://player/set_play_mode?pid=1&repeat=off&shuffle=on").unwrap();
        assert_eq!(request.query.to_string(), "pid=1&repeat=off&shuffle=on");

        let request = Request::parse("heos://system/heart_beat").unwrap();
        assert_eq!(request.command, Command::HeartBeat);
        assert!(request.query.is_empty());
    }

    #[test]
    fn test_parse_request_errors() {
        assert!(matches!(
            Request::parse("http://player/get_players"),
            Err(ProtocolError::InvalidRequest(_))
        ));
        assert!(matches!(
            Request::parse("heos://player/unknown"),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_decode_message() {
        let msg = decode_message(
            b"{\"heos\":{\"command\":\"player/get_volume\",\"result\":\"success\",\"message\":\"pid=1&level=50\"}}",
        )
        .unwrap();
        assert_eq!(msg.body().number("level"), Some(50));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let result = decode_message(&[0xff, 0xfe, 0x00]);
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8)));
    }
}
