//! Typed records for command payloads.
//!
//! Unknown fields are ignored, so newer firmware adding fields does not break
//! decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Playback state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Play,
    Pause,
    Stop,
}

impl PlayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayState::Play => "play",
            PlayState::Pause => "pause",
            PlayState::Stop => "stop",
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlayState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "play" => Ok(PlayState::Play),
            "pause" => Ok(PlayState::Pause),
            "stop" => Ok(PlayState::Stop),
            other => Err(format!("unknown play state: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatMode {
    #[serde(rename = "on_all")]
    All,
    #[serde(rename = "on_one")]
    One,
    #[serde(rename = "off")]
    Off,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::All => "on_all",
            RepeatMode::One => "on_one",
            RepeatMode::Off => "off",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repeat and shuffle settings of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayMode {
    pub repeat: RepeatMode,
    pub shuffle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Wired,
    Wifi,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub pid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
    pub model: String,
    pub version: String,
    pub network: Network,
    /// `variable` or `fixed`.
    pub lineout: Value,
    /// Present for fixed line outs: `none`, `ir`, `trigger` or `network`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Leader,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub name: String,
    pub pid: i64,
    pub role: GroupRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub gid: i64,
    pub players: Vec<GroupMember>,
}

impl GroupInfo {
    pub fn leader(&self) -> Option<&GroupMember> {
        self.players.iter().find(|p| p.role == GroupRole::Leader)
    }
}

/// What is currently playing on a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingMedia {
    /// `song` or `station`.
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(default)]
    pub song: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub qid: Option<i64>,
    #[serde(default)]
    pub sid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub song: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub image_url: String,
    pub qid: i64,
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub album_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickselectInfo {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicSourceInfo {
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    /// `music_service`, `heos_server`, `heos_service`, `dlna_server`, ...
    #[serde(rename = "type")]
    pub source_type: String,
    pub sid: i64,
    /// `"true"` or `"false"` on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_username: Option<String>,
}

impl MusicSourceInfo {
    pub fn is_available(&self) -> bool {
        self.available.as_deref() == Some("true")
    }
}

/// One entry of a browse or search result.
///
/// Entries are either music sources or media items; fields that do not apply
/// are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    /// `yes` or `no`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// `yes` or `no`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

impl BrowseEntry {
    pub fn is_container(&self) -> bool {
        self.container.as_deref() == Some("yes")
    }

    pub fn is_playable(&self) -> bool {
        self.playable.as_deref() == Some("yes")
    }
}

/// Result of `browse/browse` and `browse/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseResult {
    pub results: Vec<BrowseEntry>,
    #[serde(default)]
    pub options: Value,
    /// Total number of entries available.
    #[serde(default)]
    pub count: Option<i64>,
    /// Number of entries in this page.
    #[serde(default)]
    pub returned: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteriaInfo {
    pub name: String,
    pub scid: i64,
    /// `yes` or `no`.
    #[serde(default)]
    pub wildcard: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

/// Firmware update status reported by `player/check_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FirmwareUpdate {
    #[serde(rename = "update_none")]
    None,
    #[serde(rename = "update_exist")]
    Available,
}

/// How `browse/add_to_queue` inserts items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddCriteria {
    PlayNow = 1,
    PlayNext = 2,
    AddToEnd = 3,
    ReplaceAndPlay = 4,
}

/// The membership reported after `group/set_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChange {
    pub gid: i64,
    #[serde(default)]
    pub name: String,
    /// Player ids, leader first.
    #[serde(default, deserialize_with = "deserialize_pids")]
    pub pid: Vec<i64>,
}

fn deserialize_pids<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Pids {
        One(i64),
        Many(Vec<i64>),
    }

    Ok(match Pids::deserialize(deserializer)? {
        Pids::One(pid) => vec![pid],
        Pids::Many(pids) => pids,
    })
}

/// Decodes an extracted response value into a typed record.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    value: Value,
) -> Result<T, crate::ClientError> {
    Ok(serde_json::from_value(value)?)
}
