//! `player/*` commands.

use crate::connection::Connection;
use crate::error::ClientError;
use crate::types::{
    decode, FirmwareUpdate, NowPlayingMedia, PlayMode, PlayState, PlayerInfo, QueueItem,
    QuickselectInfo, RepeatMode,
};
use heos_protocol::{Command, Query, OFF, ON};

/// Default number of steps for relative volume changes.
pub const DEFAULT_VOLUME_STEP: u8 = 5;

/// Default number of queue items fetched at once.
pub const DEFAULT_QUEUE_COUNT: i64 = 25;

/// Longest name accepted for a saved playlist.
pub const MAX_PLAYLIST_NAME_LEN: usize = 128;

pub(crate) fn check_level(level: u8) -> Result<(), ClientError> {
    if !(1..=100).contains(&level) {
        return Err(ClientError::validation(format!(
            "volume level must be between 1 and 100, got {}",
            level
        )));
    }
    Ok(())
}

pub(crate) fn check_step(step: u8) -> Result<(), ClientError> {
    if !(1..=10).contains(&step) {
        return Err(ClientError::validation(format!(
            "volume step must be between 1 and 10, got {}",
            step
        )));
    }
    Ok(())
}

pub(crate) fn check_playlist_name(name: &str) -> Result<(), ClientError> {
    if name.chars().count() > MAX_PLAYLIST_NAME_LEN {
        return Err(ClientError::validation(format!(
            "playlist name must be at most {} characters",
            MAX_PLAYLIST_NAME_LEN
        )));
    }
    Ok(())
}

/// Inclusive index range covering `count` items from `from`.
pub(crate) fn range(from: i64, count: i64, max_count: i64) -> Result<Vec<i64>, ClientError> {
    if from < 0 {
        return Err(ClientError::validation(
            "start index must be greater or equal to 0",
        ));
    }
    if !(1..=max_count).contains(&count) {
        return Err(ClientError::validation(format!(
            "number of entries must be between 1 and {}",
            max_count
        )));
    }
    Ok(vec![from, from + count - 1])
}

fn on_off(on: bool) -> &'static str {
    if on {
        ON
    } else {
        OFF
    }
}

fn pid(pid: i64) -> Query {
    Query::new().with("pid", pid)
}

pub async fn get_players(connection: &Connection) -> Result<Vec<PlayerInfo>, ClientError> {
    decode(connection.send(Command::GetPlayers, Query::new()).await?)
}

pub async fn get_player_info(
    connection: &Connection,
    player: i64,
) -> Result<PlayerInfo, ClientError> {
    decode(connection.send(Command::GetPlayerInfo, pid(player)).await?)
}

pub async fn get_play_state(
    connection: &Connection,
    player: i64,
) -> Result<PlayState, ClientError> {
    decode(connection.send(Command::GetPlayState, pid(player)).await?)
}

pub async fn set_play_state(
    connection: &Connection,
    player: i64,
    state: PlayState,
) -> Result<(), ClientError> {
    let query = pid(player).with("state", state.as_str());
    connection.send(Command::SetPlayState, query).await?;
    Ok(())
}

pub async fn get_now_playing_media(
    connection: &Connection,
    player: i64,
) -> Result<NowPlayingMedia, ClientError> {
    decode(connection.send(Command::GetNowPlayingMedia, pid(player)).await?)
}

pub async fn get_volume(connection: &Connection, player: i64) -> Result<i64, ClientError> {
    decode(connection.send(Command::GetPlayerVolume, pid(player)).await?)
}

pub async fn set_volume(
    connection: &Connection,
    player: i64,
    level: u8,
) -> Result<(), ClientError> {
    check_level(level)?;
    let query = pid(player).with("level", level);
    connection.send(Command::SetPlayerVolume, query).await?;
    Ok(())
}

pub async fn volume_up(connection: &Connection, player: i64, step: u8) -> Result<(), ClientError> {
    check_step(step)?;
    let query = pid(player).with("step", step);
    connection.send(Command::PlayerVolumeUp, query).await?;
    Ok(())
}

pub async fn volume_down(
    connection: &Connection,
    player: i64,
    step: u8,
) -> Result<(), ClientError> {
    check_step(step)?;
    let query = pid(player).with("step", step);
    connection.send(Command::PlayerVolumeDown, query).await?;
    Ok(())
}

pub async fn get_mute(connection: &Connection, player: i64) -> Result<bool, ClientError> {
    decode(connection.send(Command::GetPlayerMute, pid(player)).await?)
}

pub async fn set_mute(connection: &Connection, player: i64, mute: bool) -> Result<(), ClientError> {
    let query = pid(player).with("state", on_off(mute));
    connection.send(Command::SetPlayerMute, query).await?;
    Ok(())
}

pub async fn toggle_mute(connection: &Connection, player: i64) -> Result<(), ClientError> {
    connection.send(Command::TogglePlayerMute, pid(player)).await?;
    Ok(())
}

pub async fn get_play_mode(connection: &Connection, player: i64) -> Result<PlayMode, ClientError> {
    decode(connection.send(Command::GetPlayMode, pid(player)).await?)
}

pub async fn set_play_mode(
    connection: &Connection,
    player: i64,
    repeat: RepeatMode,
    shuffle: bool,
) -> Result<(), ClientError> {
    let query = pid(player)
        .with("repeat", repeat.as_str())
        .with("shuffle", on_off(shuffle));
    connection.send(Command::SetPlayMode, query).await?;
    Ok(())
}

/// Fetches `count` queue items starting at index `from` (at most 100 at once).
pub async fn get_queue(
    connection: &Connection,
    player: i64,
    from: i64,
    count: i64,
) -> Result<Vec<QueueItem>, ClientError> {
    let query = pid(player).with("range", range(from, count, 100)?);
    decode(connection.send(Command::GetQueue, query).await?)
}

pub async fn play_queue_item(
    connection: &Connection,
    player: i64,
    qid: i64,
) -> Result<(), ClientError> {
    if qid < 0 {
        return Err(ClientError::validation("queue id must be greater or equal to 0"));
    }
    let query = pid(player).with("qid", qid);
    connection.send(Command::PlayQueue, query).await?;
    Ok(())
}

pub async fn remove_from_queue(
    connection: &Connection,
    player: i64,
    qids: &[i64],
) -> Result<(), ClientError> {
    if qids.is_empty() {
        return Err(ClientError::validation("at least one queue item must be removed"));
    }
    let query = pid(player).with("qid", qids);
    connection.send(Command::RemoveFromQueue, query).await?;
    Ok(())
}

pub async fn save_queue(
    connection: &Connection,
    player: i64,
    name: &str,
) -> Result<(), ClientError> {
    check_playlist_name(name)?;
    let query = pid(player).with("name", name);
    connection.send(Command::SaveQueue, query).await?;
    Ok(())
}

pub async fn clear_queue(connection: &Connection, player: i64) -> Result<(), ClientError> {
    connection.send(Command::ClearQueue, pid(player)).await?;
    Ok(())
}

/// Moves the queue items `sqids` to position `dqid`.
pub async fn move_queue_items(
    connection: &Connection,
    player: i64,
    sqids: &[i64],
    dqid: i64,
) -> Result<(), ClientError> {
    if sqids.is_empty() {
        return Err(ClientError::validation("at least one queue item must be moved"));
    }
    if dqid < 0 {
        return Err(ClientError::validation(
            "destination queue id must be greater or equal to 0",
        ));
    }
    let query = pid(player).with("sqid", sqids).with("dqid", dqid);
    connection.send(Command::MoveQueueItem, query).await?;
    Ok(())
}

pub async fn play_next(connection: &Connection, player: i64) -> Result<(), ClientError> {
    connection.send(Command::PlayNext, pid(player)).await?;
    Ok(())
}

pub async fn play_previous(connection: &Connection, player: i64) -> Result<(), ClientError> {
    connection.send(Command::PlayPrevious, pid(player)).await?;
    Ok(())
}

pub async fn set_quickselect(
    connection: &Connection,
    player: i64,
    id: i64,
) -> Result<(), ClientError> {
    let query = pid(player).with("id", id);
    connection.send(Command::SetQuickselect, query).await?;
    Ok(())
}

pub async fn play_quickselect(
    connection: &Connection,
    player: i64,
    id: i64,
) -> Result<(), ClientError> {
    let query = pid(player).with("id", id);
    connection.send(Command::PlayQuickselect, query).await?;
    Ok(())
}

/// Lists quickselects, or only `id` when given.
pub async fn get_quickselects(
    connection: &Connection,
    player: i64,
    id: Option<i64>,
) -> Result<Vec<QuickselectInfo>, ClientError> {
    let query = pid(player).with_opt("id", id);
    decode(connection.send(Command::GetQuickselects, query).await?)
}

pub async fn check_update(
    connection: &Connection,
    player: i64,
) -> Result<FirmwareUpdate, ClientError> {
    decode(connection.send(Command::CheckUpdate, pid(player)).await?)
}
