//! `browse/*` commands.

use crate::connection::Connection;
use crate::error::ClientError;
use crate::player::{check_playlist_name, range};
use crate::types::{decode, AddCriteria, BrowseResult, MusicSourceInfo, SearchCriteriaInfo};
use heos_protocol::{Command, Query};
use serde_json::Value;

/// Largest page a browse or search returns.
pub const MAX_BROWSE_COUNT: i64 = 50;

pub async fn get_music_sources(
    connection: &Connection,
) -> Result<Vec<MusicSourceInfo>, ClientError> {
    decode(connection.send(Command::GetMusicSources, Query::new()).await?)
}

pub async fn get_source_info(
    connection: &Connection,
    sid: i64,
) -> Result<MusicSourceInfo, ClientError> {
    let query = Query::new().with("sid", sid);
    decode(connection.send(Command::GetSourceInfo, query).await?)
}

/// Browses a source, or a container within it.
///
/// Paging only applies to containers; top-level source listings are returned
/// whole.
pub async fn browse(
    connection: &Connection,
    sid: i64,
    cid: Option<&str>,
    from: i64,
    count: i64,
) -> Result<BrowseResult, ClientError> {
    let range = range(from, count, MAX_BROWSE_COUNT)?;
    let mut query = Query::new().with("sid", sid);
    if let Some(cid) = cid {
        query = query.with("cid", cid).with("range", range);
    }
    decode(connection.send(Command::Browse, query).await?)
}

pub async fn get_search_criteria(
    connection: &Connection,
    sid: i64,
) -> Result<Vec<SearchCriteriaInfo>, ClientError> {
    let query = Query::new().with("sid", sid);
    decode(connection.send(Command::GetSearchCriteria, query).await?)
}

pub async fn search(
    connection: &Connection,
    sid: i64,
    search: &str,
    scid: i64,
    from: i64,
    count: i64,
) -> Result<BrowseResult, ClientError> {
    if search.is_empty() {
        return Err(ClientError::validation("search string must not be empty"));
    }
    let query = Query::new()
        .with("sid", sid)
        .with("search", search)
        .with("scid", scid)
        .with("range", range(from, count, MAX_BROWSE_COUNT)?);
    decode(connection.send(Command::Search, query).await?)
}

/// Plays a station from a source.
pub async fn play_station(
    connection: &Connection,
    pid: i64,
    sid: i64,
    mid: &str,
    name: &str,
    cid: Option<&str>,
) -> Result<(), ClientError> {
    let query = Query::new()
        .with("pid", pid)
        .with("sid", sid)
        .with_opt("cid", cid)
        .with("mid", mid)
        .with("name", name);
    connection.send(Command::PlayStream, query).await?;
    Ok(())
}

pub async fn play_url(connection: &Connection, pid: i64, url: &str) -> Result<(), ClientError> {
    let query = Query::new().with("pid", pid).with("url", url);
    connection.send(Command::PlayStream, query).await?;
    Ok(())
}

/// Plays a HEOS favorite; presets are numbered from 1.
pub async fn play_preset(
    connection: &Connection,
    pid: i64,
    preset: i64,
) -> Result<(), ClientError> {
    if preset < 1 {
        return Err(ClientError::validation("preset must be greater or equal to 1"));
    }
    let query = Query::new().with("pid", pid).with("preset", preset);
    connection.send(Command::PlayPreset, query).await?;
    Ok(())
}

/// Plays an input such as `inputs/aux_in_1`, optionally from another player `spid`.
pub async fn play_input(
    connection: &Connection,
    pid: i64,
    input: &str,
    spid: Option<i64>,
) -> Result<(), ClientError> {
    let query = Query::new()
        .with("pid", pid)
        .with_opt("spid", spid)
        .with("input", input);
    connection.send(Command::PlayInput, query).await?;
    Ok(())
}

/// Adds a container, or a single track of it when `mid` is given, to the queue.
pub async fn add_to_queue(
    connection: &Connection,
    pid: i64,
    sid: i64,
    cid: &str,
    criteria: AddCriteria,
    mid: Option<&str>,
) -> Result<(), ClientError> {
    let query = Query::new()
        .with("pid", pid)
        .with("sid", sid)
        .with("cid", cid)
        .with("aid", criteria as i64)
        .with_opt("mid", mid);
    connection.send(Command::AddToQueue, query).await?;
    Ok(())
}

pub async fn rename_playlist(
    connection: &Connection,
    sid: i64,
    cid: &str,
    name: &str,
) -> Result<(), ClientError> {
    check_playlist_name(name)?;
    let query = Query::new().with("sid", sid).with("cid", cid).with("name", name);
    connection.send(Command::RenamePlaylist, query).await?;
    Ok(())
}

pub async fn delete_playlist(
    connection: &Connection,
    sid: i64,
    cid: &str,
) -> Result<(), ClientError> {
    let query = Query::new().with("sid", sid).with("cid", cid);
    connection.send(Command::DeletePlaylist, query).await?;
    Ok(())
}

pub async fn retrieve_metadata(
    connection: &Connection,
    sid: i64,
    cid: &str,
) -> Result<Value, ClientError> {
    let query = Query::new().with("sid", sid).with("cid", cid);
    connection.send(Command::RetrieveMetadata, query).await
}

pub async fn get_service_options(connection: &Connection, sid: i64) -> Result<Value, ClientError> {
    let query = Query::new().with("sid", sid);
    connection.send(Command::GetServiceOptions, query).await
}

/// Applies a service option; `values` carries the option specific parameters.
pub async fn set_service_option(
    connection: &Connection,
    sid: i64,
    option: i64,
    values: Query,
) -> Result<Value, ClientError> {
    let mut query = values;
    query.set("sid", sid);
    query.set("option", option);
    connection.send(Command::SetServiceOption, query).await
}
