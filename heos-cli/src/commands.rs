//! Command execution.

use crate::{Commands, PlayerCommand};
use colored::Colorize;
use heos_client::types::{
    BrowseResult, GroupInfo, MusicSourceInfo, PlayState, PlayerInfo, QueueItem,
};
use heos_client::{browse, group, player, system, Connection};
use heos_protocol::Request;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub async fn execute(connection: &Connection, cmd: Commands) -> CliResult<String> {
    match cmd {
        Commands::Repl | Commands::Discover { .. } | Commands::Watch => unreachable!(),

        Commands::Players => Ok(format_players(&player::get_players(connection).await?)),

        Commands::Player { action } => execute_player(connection, action).await,

        Commands::Groups => Ok(format_groups(&group::get_groups(connection).await?)),

        Commands::Group { leader, members } => {
            if members.is_empty() {
                group::ungroup(connection, leader).await?;
                return Ok(format!("{} {}", "Ungrouped".green(), leader));
            }
            match group::set_group(connection, leader, &members).await? {
                Some(change) => Ok(format!(
                    "{} {} (gid: {}, players: {:?})",
                    "Grouped".green(),
                    change.name.cyan(),
                    change.gid,
                    change.pid
                )),
                None => Ok(format!("{} {}", "Ungrouped".green(), leader)),
            }
        }

        Commands::Sources => Ok(format_sources(&browse::get_music_sources(connection).await?)),

        Commands::Browse {
            sid,
            cid,
            from,
            count,
        } => {
            let result = browse::browse(connection, sid, cid.as_deref(), from, count).await?;
            Ok(format_browse(&result))
        }

        Commands::Send { line } => {
            let value = send_line(connection, &line).await?;
            Ok(format_json(&value))
        }
    }
}

async fn execute_player(connection: &Connection, action: PlayerCommand) -> CliResult<String> {
    match action {
        PlayerCommand::Info { pid } => {
            let info = player::get_player_info(connection, pid).await?;
            Ok(format_json(&serde_json::to_value(info)?))
        }

        PlayerCommand::Now { pid } => {
            let media = player::get_now_playing_media(connection, pid).await?;
            Ok(format!(
                "{} - {}\n  Album: {}\n  Type: {}",
                media.artist.cyan(),
                media.song.bold(),
                media.album,
                media.media_type
            ))
        }

        PlayerCommand::State { pid, state } => match state {
            Some(state) => {
                let state: PlayState = state.parse()?;
                player::set_play_state(connection, pid, state).await?;
                Ok(format!("{} {}", "State".green(), state.to_string().yellow()))
            }
            None => Ok(player::get_play_state(connection, pid)
                .await?
                .to_string()
                .yellow()
                .to_string()),
        },

        PlayerCommand::Volume { pid, level } => match level {
            Some(level) => {
                player::set_volume(connection, pid, level).await?;
                Ok(format!("{} {}", "Volume".green(), level))
            }
            None => Ok(player::get_volume(connection, pid).await?.to_string()),
        },

        PlayerCommand::Mute { pid, state } => {
            match state.as_deref() {
                None => {
                    let muted = player::get_mute(connection, pid).await?;
                    return Ok(on_off(muted).to_string());
                }
                Some("on") => player::set_mute(connection, pid, true).await?,
                Some("off") => player::set_mute(connection, pid, false).await?,
                Some("toggle") => player::toggle_mute(connection, pid).await?,
                Some(other) => return Err(format!("unknown mute state: {}", other).into()),
            }
            Ok("OK".green().to_string())
        }

        PlayerCommand::Queue { pid, from, count } => {
            Ok(format_queue(&player::get_queue(connection, pid, from, count).await?))
        }

        PlayerCommand::Next { pid } => {
            player::play_next(connection, pid).await?;
            Ok("OK".green().to_string())
        }

        PlayerCommand::Previous { pid } => {
            player::play_previous(connection, pid).await?;
            Ok("OK".green().to_string())
        }
    }
}

/// Streams change events as JSON lines until Ctrl+C or disconnect.
pub async fn watch(connection: &Connection) -> CliResult<()> {
    // Subscribe before registering so no event is missed
    let mut events = connection.subscribe_events();
    system::register_for_change_events(connection, true).await?;

    eprintln!(
        "{} events from {}",
        "Watching".green(),
        connection.endpoint().to_string().cyan()
    );
    eprintln!("{}", "Press Ctrl+C to stop...".dimmed());

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(e) => println!("{}", serde_json::to_string(&e)?),
                    Err(RecvError::Lagged(n)) => {
                        eprintln!("{}: lagged {} events", "Warning".yellow(), n);
                    }
                    Err(RecvError::Closed) => {
                        eprintln!("{}", "Connection closed".red());
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{}", "Stopping watch...".dimmed());
                let _ = system::register_for_change_events(connection, false).await;
                break;
            }
        }
    }

    Ok(())
}

/// Sends a command line such as `player/get_volume?pid=1`, with or without
/// the `heos://` prefix.
pub async fn send_line(connection: &Connection, line: &str) -> CliResult<Value> {
    let line = line.trim();
    let request = if line.starts_with(heos_protocol::SCHEME) {
        Request::parse(line)?
    } else {
        Request::parse(&format!("{}{}", heos_protocol::SCHEME, line))?
    };
    Ok(connection.send(request.command, request.query).await?)
}

pub fn format_players(players: &[PlayerInfo]) -> String {
    if players.is_empty() {
        return "No players".yellow().to_string();
    }
    let mut output = String::new();
    for p in players {
        output.push_str(&format!(
            "  [{}] {} ({} {})\n",
            p.pid.to_string().cyan(),
            p.name.bold(),
            p.model,
            p.version.dimmed()
        ));
    }
    output
}

pub fn format_groups(groups: &[GroupInfo]) -> String {
    if groups.is_empty() {
        return "No groups".yellow().to_string();
    }
    let mut output = String::new();
    for g in groups {
        let players: Vec<_> = g.players.iter().map(|m| m.name.as_str()).collect();
        output.push_str(&format!(
            "  [{}] {}: {}\n",
            g.gid.to_string().cyan(),
            g.name.bold(),
            players.join(", ")
        ));
    }
    output
}

pub fn format_sources(sources: &[MusicSourceInfo]) -> String {
    let mut output = String::new();
    for s in sources {
        let name = if s.is_available() {
            s.name.bold()
        } else {
            s.name.dimmed()
        };
        output.push_str(&format!("  [{}] {}\n", s.sid.to_string().cyan(), name));
    }
    output
}

pub fn format_browse(result: &BrowseResult) -> String {
    if result.results.is_empty() {
        return "No entries".yellow().to_string();
    }
    let mut output = String::new();
    for entry in &result.results {
        let id = entry
            .cid
            .as_deref()
            .or(entry.mid.as_deref())
            .unwrap_or("-");
        let marker = if entry.is_container() { "+" } else { " " };
        output.push_str(&format!("  {} {} [{}]\n", marker, entry.name, id.cyan()));
    }
    if let (Some(returned), Some(count)) = (result.returned, result.count) {
        output.push_str(&format!("{}", format!("  {} of {}\n", returned, count).dimmed()));
    }
    output
}

pub fn format_queue(items: &[QueueItem]) -> String {
    if items.is_empty() {
        return "Queue is empty".yellow().to_string();
    }
    let mut output = String::new();
    for item in items {
        output.push_str(&format!(
            "  [{}] {} - {}\n",
            item.qid.to_string().cyan(),
            item.artist,
            item.song
        ));
    }
    output
}

pub fn on_off(on: bool) -> &'static str {
    if on {
        heos_protocol::ON
    } else {
        heos_protocol::OFF
    }
}

pub fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
