//! Decoding of wire messages.
//!
//! Every response and event is one JSON document:
//!
//! ```text
//! {"heos": {"command": "...", "result": "success"|"fail", "message": "k=v&k=v"},
//!  "payload": ..., "options": ...}
//! ```
//!
//! The `message` string is a flat, ampersand-joined body which [`Body::parse`]
//! turns into typed fields. `payload` and `options` travel next to it untouched.

use crate::error::{DeviceError, ProtocolError};
use crate::{COMMAND_UNDER_PROCESS, EVENT_PREFIX, ON, SIGNED_IN, SIGNED_OUT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Body keys whose values are integers (or comma-separated integer lists).
pub const NUMERIC_FIELDS: &[&str] = &[
    "cid", "count", "cur_pos", "dqid", "duration", "eid", "gid", "id", "level", "pid", "qid",
    "range", "returned", "sid", "sqid", "step", "syserrno",
];

/// Returns whether `key` is decoded as a number.
pub fn is_numeric_field(key: &str) -> bool {
    NUMERIC_FIELDS.contains(&key)
}

/// A single decoded body value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(i64),
    Numbers(Vec<i64>),
    Text(String),
}

impl FieldValue {
    /// Decodes `raw` according to the type declared for `key`.
    ///
    /// Numeric keys whose value does not parse as an integer keep the raw text,
    /// since some ids (containers, for example) are strings on certain sources.
    pub fn decode(key: &str, raw: &str) -> Self {
        if !is_numeric_field(key) {
            return FieldValue::Text(raw.to_string());
        }

        if raw.contains(',') {
            let parsed: Result<Vec<i64>, _> = raw.split(',').map(|v| v.trim().parse()).collect();
            return match parsed {
                Ok(numbers) => FieldValue::Numbers(numbers),
                Err(_) => FieldValue::Text(raw.to_string()),
            };
        }

        match raw.trim().parse() {
            Ok(n) => FieldValue::Number(n),
            Err(_) => FieldValue::Text(raw.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_numbers(&self) -> Option<&[i64]> {
        match self {
            FieldValue::Numbers(n) => Some(n),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Number(n) => Value::from(*n),
            FieldValue::Numbers(n) => Value::from(n.clone()),
            FieldValue::Text(s) => Value::from(s.clone()),
        }
    }
}

/// Login state markers that appear as bare tokens in a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    SignedIn,
    SignedOut,
}

impl LoginState {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            SIGNED_IN => Some(LoginState::SignedIn),
            SIGNED_OUT => Some(LoginState::SignedOut),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoginState::SignedIn => SIGNED_IN,
            LoginState::SignedOut => SIGNED_OUT,
        }
    }
}

/// The typed decoding of a flat `k=v&k=v` message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    fields: BTreeMap<String, FieldValue>,
    fragment: Option<LoginState>,
}

impl Body {
    /// Parses a flat body. Never fails: unknown keys are kept as text.
    pub fn parse(raw: &str) -> Self {
        let mut body = Body::default();
        if raw.is_empty() {
            return body;
        }

        for token in raw.split('&') {
            if token.is_empty() {
                continue;
            }
            if let Some(state) = LoginState::from_token(token) {
                body.fragment = Some(state);
                continue;
            }
            let (key, value) = token.split_once('=').unwrap_or((token, ""));
            body.fields
                .insert(key.to_string(), FieldValue::decode(key, value));
        }

        body
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn number(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_i64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    /// Returns the value of `key` as a list; a single number becomes a one-element list.
    pub fn numbers(&self, key: &str) -> Option<Vec<i64>> {
        match self.get(key)? {
            FieldValue::Number(n) => Some(vec![*n]),
            FieldValue::Numbers(n) => Some(n.clone()),
            FieldValue::Text(_) => None,
        }
    }

    /// Returns whether `key` carries the `on` sentinel.
    pub fn is_on(&self, key: &str) -> bool {
        self.text(key) == Some(ON)
    }

    pub fn fragment(&self) -> Option<LoginState> {
        self.fragment
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.fragment.is_none()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the value of `key` as JSON, or `null` when absent.
    pub fn json(&self, key: &str) -> Value {
        self.get(key).map(FieldValue::to_json).unwrap_or(Value::Null)
    }

    /// Converts the body into a JSON object; the login marker is stored as `fragment`.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.to_json());
        }
        if let Some(fragment) = self.fragment {
            map.insert("fragment".to_string(), Value::from(fragment.as_str()));
        }
        Value::Object(map)
    }
}

/// Outcome reported by the device for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandResult {
    Success,
    Fail,
}

/// The outer `heos` object of every wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Command or event identifier, e.g. `player/get_volume` or `event/groups_changed`.
    pub command: String,

    /// Present on command responses, absent on events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,

    /// Flat body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "heos", alias = "envelope")]
    envelope: Envelope,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    options: Option<Value>,
}

/// One decoded response or event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(rename = "heos")]
    envelope: Envelope,
    #[serde(skip)]
    body: Body,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Value>,
}

impl Message {
    pub fn new(envelope: Envelope) -> Self {
        let body = Body::parse(envelope.message.as_deref().unwrap_or(""));
        Self {
            envelope,
            body,
            payload: None,
            options: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Decodes a message from its JSON text (without the trailing delimiter).
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let wire: WireMessage = serde_json::from_str(text)?;
        let mut message = Self::new(wire.envelope);
        message.payload = wire.payload;
        message.options = wire.options;
        Ok(message)
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn command(&self) -> &str {
        &self.envelope.command
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Raw body text, empty when the envelope carries none.
    pub fn raw_body(&self) -> &str {
        self.envelope.message.as_deref().unwrap_or("")
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn options(&self) -> Option<&Value> {
        self.options.as_ref()
    }

    /// Returns whether this is an unsolicited event rather than a command response.
    pub fn is_event(&self) -> bool {
        self.envelope.command.starts_with(EVENT_PREFIX)
    }

    pub fn is_failure(&self) -> bool {
        self.envelope.result == Some(CommandResult::Fail)
    }

    /// Returns whether the device is still working on the command.
    pub fn is_processing(&self) -> bool {
        self.raw_body().starts_with(COMMAND_UNDER_PROCESS)
    }

    /// Extracts the structured error of a failed response.
    pub fn device_error(&self) -> Option<DeviceError> {
        if !self.is_failure() {
            return None;
        }
        Some(DeviceError {
            id: self.body.number("eid").unwrap_or_default(),
            text: self.body.text("text").unwrap_or_default().to_string(),
            system_errno: self.body.number("syserrno"),
        })
    }
}
