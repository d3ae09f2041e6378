//! Command catalogue and per-command response extraction.

use crate::error::ProtocolError;
use crate::message::{LoginState, Message};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Commands understood by a device, grouped by namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // System
    RegisterForChangeEvents,
    CheckAccount,
    SignIn,
    SignOut,
    HeartBeat,
    Reboot,
    PrettifyJsonResponse,

    // Player
    GetPlayers,
    GetPlayerInfo,
    GetPlayState,
    SetPlayState,
    GetNowPlayingMedia,
    GetPlayerVolume,
    SetPlayerVolume,
    PlayerVolumeUp,
    PlayerVolumeDown,
    GetPlayerMute,
    SetPlayerMute,
    TogglePlayerMute,
    GetPlayMode,
    SetPlayMode,
    GetQueue,
    PlayQueue,
    RemoveFromQueue,
    SaveQueue,
    ClearQueue,
    MoveQueueItem,
    PlayNext,
    PlayPrevious,
    SetQuickselect,
    PlayQuickselect,
    GetQuickselects,
    CheckUpdate,

    // Group
    GetGroups,
    GetGroupInfo,
    SetGroup,
    GetGroupVolume,
    SetGroupVolume,
    GroupVolumeUp,
    GroupVolumeDown,
    GetGroupMute,
    SetGroupMute,
    ToggleGroupMute,

    // Browse
    GetMusicSources,
    GetSourceInfo,
    Browse,
    GetSearchCriteria,
    Search,
    PlayStream,
    PlayPreset,
    PlayInput,
    AddToQueue,
    RenamePlaylist,
    DeletePlaylist,
    RetrieveMetadata,
    GetServiceOptions,
    SetServiceOption,
}

/// How the value of a successful response is surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Acknowledgement only; resolves to `null`.
    Nothing,
    /// The structured `payload` field.
    Payload,
    /// A single body field.
    Field(&'static str),
    /// `true` when a body field equals `on`.
    IsOn(&'static str),
    /// `{repeat, shuffle}` with `shuffle` as a boolean.
    PlayMode,
    /// The signed-in user name, or `null` when signed out.
    Account,
    /// `payload.update`.
    UpdateAvailable,
    /// The whole body when it names a group, `null` after ungrouping.
    Group,
    /// `{results, options, count, returned}` for browse and search.
    BrowseResults,
}

impl Command {
    pub const ALL: &'static [Command] = &[
        Command::RegisterForChangeEvents,
        Command::CheckAccount,
        Command::SignIn,
        Command::SignOut,
        Command::HeartBeat,
        Command::Reboot,
        Command::PrettifyJsonResponse,
        Command::GetPlayers,
        Command::GetPlayerInfo,
        Command::GetPlayState,
        Command::SetPlayState,
        Command::GetNowPlayingMedia,
        Command::GetPlayerVolume,
        Command::SetPlayerVolume,
        Command::PlayerVolumeUp,
        Command::PlayerVolumeDown,
        Command::GetPlayerMute,
        Command::SetPlayerMute,
        Command::TogglePlayerMute,
        Command::GetPlayMode,
        Command::SetPlayMode,
        Command::GetQueue,
        Command::PlayQueue,
        Command::RemoveFromQueue,
        Command::SaveQueue,
        Command::ClearQueue,
        Command::MoveQueueItem,
        Command::PlayNext,
        Command::PlayPrevious,
        Command::SetQuickselect,
        Command::PlayQuickselect,
        Command::GetQuickselects,
        Command::CheckUpdate,
        Command::GetGroups,
        Command::GetGroupInfo,
        Command::SetGroup,
        Command::GetGroupVolume,
        Command::SetGroupVolume,
        Command::GroupVolumeUp,
        Command::GroupVolumeDown,
        Command::GetGroupMute,
        Command::SetGroupMute,
        Command::ToggleGroupMute,
        Command::GetMusicSources,
        Command::GetSourceInfo,
        Command::Browse,
        Command::GetSearchCriteria,
        Command::Search,
        Command::PlayStream,
        Command::PlayPreset,
        Command::PlayInput,
        Command::AddToQueue,
        Command::RenamePlaylist,
        Command::DeletePlaylist,
        Command::RetrieveMetadata,
        Command::GetServiceOptions,
        Command::SetServiceOption,
    ];

    /// Wire identifier, e.g. `player/get_play_state`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::RegisterForChangeEvents => "system/register_for_change_events",
            Command::CheckAccount => "system/check_account",
            Command::SignIn => "system/sign_in",
            Command::SignOut => "system/sign_out",
            Command::HeartBeat => "system/heart_beat",
            Command::Reboot => "system/reboot",
            Command::PrettifyJsonResponse => "system/prettify_json_response",
            Command::GetPlayers => "player/get_players",
            Command::GetPlayerInfo => "player/get_player_info",
            Command::GetPlayState => "player/get_play_state",
            Command::SetPlayState => "player/set_play_state",
            Command::GetNowPlayingMedia => "player/get_now_playing_media",
            Command::GetPlayerVolume => "player/get_volume",
            Command::SetPlayerVolume => "player/set_volume",
            Command::PlayerVolumeUp => "player/volume_up",
            Command::PlayerVolumeDown => "player/volume_down",
            Command::GetPlayerMute => "player/get_mute",
            Command::SetPlayerMute => "player/set_mute",
            Command::TogglePlayerMute => "player/toggle_mute",
            Command::GetPlayMode => "player/get_play_mode",
            Command::SetPlayMode => "player/set_play_mode",
            Command::GetQueue => "player/get_queue",
            Command::PlayQueue => "player/play_queue",
            Command::RemoveFromQueue => "player/remove_from_queue",
            Command::SaveQueue => "player/save_queue",
            Command::ClearQueue => "player/clear_queue",
            Command::MoveQueueItem => "player/move_queue_item",
            Command::PlayNext => "player/play_next",
            Command::PlayPrevious => "player/play_previous",
            Command::SetQuickselect => "player/set_quickselect",
            Command::PlayQuickselect => "player/play_quickselect",
            Command::GetQuickselects => "player/get_quickselects",
            Command::CheckUpdate => "player/check_update",
            Command::GetGroups => "group/get_groups",
            Command::GetGroupInfo => "group/get_group_info",
            Command::SetGroup => "group/set_group",
            Command::GetGroupVolume => "group/get_volume",
            Command::SetGroupVolume => "group/set_volume",
            Command::GroupVolumeUp => "group/volume_up",
            Command::GroupVolumeDown => "group/volume_down",
            Command::GetGroupMute => "group/get_mute",
            Command::SetGroupMute => "group/set_mute",
            Command::ToggleGroupMute => "group/toggle_mute",
            Command::GetMusicSources => "browse/get_music_sources",
            Command::GetSourceInfo => "browse/get_source_info",
            Command::Browse => "browse/browse",
            Command::GetSearchCriteria => "browse/get_search_criteria",
            Command::Search => "browse/search",
            Command::PlayStream => "browse/play_stream",
            Command::PlayPreset => "browse/play_preset",
            Command::PlayInput => "browse/play_input",
            Command::AddToQueue => "browse/add_to_queue",
            Command::RenamePlaylist => "browse/rename_playlist",
            Command::DeletePlaylist => "browse/delete_playlist",
            Command::RetrieveMetadata => "browse/retrieve_metadata",
            Command::GetServiceOptions => "browse/get_service_options",
            Command::SetServiceOption => "browse/set_service_option",
        }
    }

    /// Returns how a successful response to this command is surfaced.
    pub fn extraction(&self) -> Extraction {
        match self {
            Command::RegisterForChangeEvents => Extraction::IsOn("enable"),
            Command::CheckAccount => Extraction::Account,

            Command::GetPlayers
            | Command::GetPlayerInfo
            | Command::GetNowPlayingMedia
            | Command::GetQueue
            | Command::GetQuickselects
            | Command::GetGroups
            | Command::GetGroupInfo
            | Command::GetMusicSources
            | Command::GetSourceInfo
            | Command::GetSearchCriteria
            | Command::RetrieveMetadata
            | Command::GetServiceOptions
            | Command::SetServiceOption => Extraction::Payload,

            Command::GetPlayState => Extraction::Field("state"),
            Command::GetPlayerVolume | Command::GetGroupVolume => Extraction::Field("level"),
            Command::GetPlayerMute | Command::GetGroupMute => Extraction::IsOn("state"),
            Command::GetPlayMode => Extraction::PlayMode,
            Command::CheckUpdate => Extraction::UpdateAvailable,
            Command::SetGroup => Extraction::Group,
            Command::Browse | Command::Search => Extraction::BrowseResults,

            Command::SignIn
            | Command::SignOut
            | Command::HeartBeat
            | Command::Reboot
            | Command::PrettifyJsonResponse
            | Command::SetPlayState
            | Command::SetPlayerVolume
            | Command::PlayerVolumeUp
            | Command::PlayerVolumeDown
            | Command::SetPlayerMute
            | Command::TogglePlayerMute
            | Command::SetPlayMode
            | Command::PlayQueue
            | Command::RemoveFromQueue
            | Command::SaveQueue
            | Command::ClearQueue
            | Command::MoveQueueItem
            | Command::PlayNext
            | Command::PlayPrevious
            | Command::SetQuickselect
            | Command::PlayQuickselect
            | Command::SetGroupVolume
            | Command::GroupVolumeUp
            | Command::GroupVolumeDown
            | Command::SetGroupMute
            | Command::ToggleGroupMute
            | Command::PlayStream
            | Command::PlayPreset
            | Command::PlayInput
            | Command::AddToQueue
            | Command::RenamePlaylist
            | Command::DeletePlaylist => Extraction::Nothing,
        }
    }

    /// Extracts the caller-facing value from a successful response.
    pub fn extract(&self, message: &Message) -> Value {
        let body = message.body();
        match self.extraction() {
            Extraction::Nothing => Value::Null,
            Extraction::Payload => message.payload().cloned().unwrap_or(Value::Null),
            Extraction::Field(key) => body.json(key),
            Extraction::IsOn(key) => Value::Bool(body.is_on(key)),
            Extraction::PlayMode => json!({
                "repeat": body.json("repeat"),
                "shuffle": body.is_on("shuffle"),
            }),
            Extraction::Account => match body.fragment() {
                Some(LoginState::SignedIn) => body.json("un"),
                _ => Value::Null,
            },
            Extraction::UpdateAvailable => message
                .payload()
                .and_then(|p| p.get("update"))
                .cloned()
                .unwrap_or(Value::Null),
            Extraction::Group => {
                if body.contains("gid") {
                    body.to_json()
                } else {
                    Value::Null
                }
            }
            Extraction::BrowseResults => json!({
                "results": message.payload().cloned().unwrap_or_else(|| json!([])),
                "options": message.options().cloned().unwrap_or_else(|| json!([])),
                "count": body.json("count"),
                "returned": body.json("returned"),
            }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| ProtocolError::UnknownCommand(s.to_string()))
    }
}
