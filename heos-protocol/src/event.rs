//! Unsolicited change events and their listener arguments.

use crate::error::ProtocolError;
use crate::message::{Body, LoginState, Message};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Event types delivered on the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SourcesChanged,
    PlayersChanged,
    GroupsChanged,
    PlayerStateChanged,
    PlayerNowPlayingChanged,
    PlayerNowPlayingProgress,
    PlayerPlaybackError,
    PlayerQueueChanged,
    PlayerVolumeChanged,
    RepeatModeChanged,
    ShuffleModeChanged,
    GroupVolumeChanged,
    UserChanged,
}

impl EventKind {
    pub const ALL: &'static [EventKind] = &[
        EventKind::SourcesChanged,
        EventKind::PlayersChanged,
        EventKind::GroupsChanged,
        EventKind::PlayerStateChanged,
        EventKind::PlayerNowPlayingChanged,
        EventKind::PlayerNowPlayingProgress,
        EventKind::PlayerPlaybackError,
        EventKind::PlayerQueueChanged,
        EventKind::PlayerVolumeChanged,
        EventKind::RepeatModeChanged,
        EventKind::ShuffleModeChanged,
        EventKind::GroupVolumeChanged,
        EventKind::UserChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SourcesChanged => "event/sources_changed",
            EventKind::PlayersChanged => "event/players_changed",
            EventKind::GroupsChanged => "event/groups_changed",
            EventKind::PlayerStateChanged => "event/player_state_changed",
            EventKind::PlayerNowPlayingChanged => "event/player_now_playing_changed",
            EventKind::PlayerNowPlayingProgress => "event/player_now_playing_progress",
            EventKind::PlayerPlaybackError => "event/player_playback_error",
            EventKind::PlayerQueueChanged => "event/player_queue_changed",
            EventKind::PlayerVolumeChanged => "event/player_volume_changed",
            EventKind::RepeatModeChanged => "event/repeat_mode_changed",
            EventKind::ShuffleModeChanged => "event/shuffle_mode_changed",
            EventKind::GroupVolumeChanged => "event/group_volume_changed",
            EventKind::UserChanged => "event/user_changed",
        }
    }

    /// Positional listener arguments for this event type.
    ///
    /// Missing fields show up as `null` so listeners always receive the same arity.
    pub fn arguments(&self, body: &Body) -> Vec<Value> {
        match self {
            EventKind::SourcesChanged | EventKind::PlayersChanged | EventKind::GroupsChanged => {
                Vec::new()
            }
            EventKind::PlayerStateChanged => vec![body.json("pid"), body.json("state")],
            EventKind::PlayerNowPlayingChanged | EventKind::PlayerQueueChanged => {
                vec![body.json("pid")]
            }
            EventKind::PlayerNowPlayingProgress => vec![
                body.json("pid"),
                body.json("cur_pos"),
                body.json("duration"),
            ],
            EventKind::PlayerPlaybackError => vec![body.json("pid"), body.json("error")],
            EventKind::PlayerVolumeChanged => vec![
                body.json("pid"),
                body.json("level"),
                Value::Bool(body.is_on("mute")),
            ],
            EventKind::RepeatModeChanged => vec![body.json("pid"), body.json("repeat")],
            EventKind::ShuffleModeChanged => {
                vec![body.json("pid"), Value::Bool(body.is_on("shuffle"))]
            }
            EventKind::GroupVolumeChanged => vec![
                body.json("gid"),
                body.json("level"),
                Value::Bool(body.is_on("mute")),
            ],
            EventKind::UserChanged => vec![signed_in_user(body)],
        }
    }
}

fn signed_in_user(body: &Body) -> Value {
    match body.fragment() {
        Some(LoginState::SignedIn) => body.json("un"),
        _ => Value::Null,
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .find(|e| e.as_str() == s)
            .copied()
            .ok_or_else(|| ProtocolError::UnknownEvent(s.to_string()))
    }
}

/// A decoded event with typed fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeosEvent {
    SourcesChanged,
    PlayersChanged,
    GroupsChanged,
    PlayerStateChanged {
        pid: i64,
        state: String,
    },
    PlayerNowPlayingChanged {
        pid: i64,
    },
    PlayerNowPlayingProgress {
        pid: i64,
        cur_pos: i64,
        duration: i64,
    },
    PlayerPlaybackError {
        pid: i64,
        error: String,
    },
    PlayerQueueChanged {
        pid: i64,
    },
    PlayerVolumeChanged {
        pid: i64,
        level: i64,
        mute: bool,
    },
    RepeatModeChanged {
        pid: i64,
        repeat: String,
    },
    ShuffleModeChanged {
        pid: i64,
        shuffle: bool,
    },
    GroupVolumeChanged {
        gid: i64,
        level: i64,
        mute: bool,
    },
    UserChanged {
        username: Option<String>,
    },
}

impl HeosEvent {
    /// Decodes an event message.
    pub fn from_message(message: &Message) -> Result<Self, ProtocolError> {
        let kind: EventKind = message.command().parse()?;
        Self::decode(kind, message.body())
    }

    pub fn decode(kind: EventKind, body: &Body) -> Result<Self, ProtocolError> {
        let number = |key: &'static str| body.number(key).ok_or(ProtocolError::MissingField(key));
        let text = |key: &'static str| {
            body.text(key)
                .map(str::to_string)
                .ok_or(ProtocolError::MissingField(key))
        };

        let event = match kind {
            EventKind::SourcesChanged => HeosEvent::SourcesChanged,
            EventKind::PlayersChanged => HeosEvent::PlayersChanged,
            EventKind::GroupsChanged => HeosEvent::GroupsChanged,
            EventKind::PlayerStateChanged => HeosEvent::PlayerStateChanged {
                pid: number("pid")?,
                state: text("state")?,
            },
            EventKind::PlayerNowPlayingChanged => HeosEvent::PlayerNowPlayingChanged {
                pid: number("pid")?,
            },
            EventKind::PlayerNowPlayingProgress => HeosEvent::PlayerNowPlayingProgress {
                pid: number("pid")?,
                cur_pos: number("cur_pos")?,
                duration: number("duration")?,
            },
            EventKind::PlayerPlaybackError => HeosEvent::PlayerPlaybackError {
                pid: number("pid")?,
                error: text("error")?,
            },
            EventKind::PlayerQueueChanged => HeosEvent::PlayerQueueChanged {
                pid: number("pid")?,
            },
            EventKind::PlayerVolumeChanged => HeosEvent::PlayerVolumeChanged {
                pid: number("pid")?,
                level: number("level")?,
                mute: body.is_on("mute"),
            },
            EventKind::RepeatModeChanged => HeosEvent::RepeatModeChanged {
                pid: number("pid")?,
                repeat: text("repeat")?,
            },
            EventKind::ShuffleModeChanged => HeosEvent::ShuffleModeChanged {
                pid: number("pid")?,
                shuffle: body.is_on("shuffle"),
            },
            EventKind::GroupVolumeChanged => HeosEvent::GroupVolumeChanged {
                gid: number("gid")?,
                level: number("level")?,
                mute: body.is_on("mute"),
            },
            EventKind::UserChanged => HeosEvent::UserChanged {
                username: signed_in_user(body).as_str().map(str::to_string),
            },
        };

        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            HeosEvent::SourcesChanged => EventKind::SourcesChanged,
            HeosEvent::PlayersChanged => EventKind::PlayersChanged,
            HeosEvent::GroupsChanged => EventKind::GroupsChanged,
            HeosEvent::PlayerStateChanged { .. } => EventKind::PlayerStateChanged,
            HeosEvent::PlayerNowPlayingChanged { .. } => EventKind::PlayerNowPlayingChanged,
            HeosEvent::PlayerNowPlayingProgress { .. } => EventKind::PlayerNowPlayingProgress,
            HeosEvent::PlayerPlaybackError { .. } => EventKind::PlayerPlaybackError,
            HeosEvent::PlayerQueueChanged { .. } => EventKind::PlayerQueueChanged,
            HeosEvent::PlayerVolumeChanged { .. } => EventKind::PlayerVolumeChanged,
            HeosEvent::RepeatModeChanged { .. } => EventKind::RepeatModeChanged,
            HeosEvent::ShuffleModeChanged { .. } => EventKind::ShuffleModeChanged,
            HeosEvent::GroupVolumeChanged { .. } => EventKind::GroupVolumeChanged,
            HeosEvent::UserChanged { .. } => EventKind::UserChanged,
        }
    }
}
