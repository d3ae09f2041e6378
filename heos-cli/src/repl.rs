//! Interactive REPL.

use crate::commands::{
    format_browse, format_groups, format_json, format_players, format_queue, format_sources,
    on_off, send_line,
};
use colored::Colorize;
use heos_client::player::DEFAULT_VOLUME_STEP;
use heos_client::types::PlayState;
use heos_client::{browse, group, player, system, Connection};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::PathBuf;

const HELP_TEXT: &str = r#"
Available commands:
  help                          Show this help
  account                       Show the signed in account
  heartbeat                     Check the device responds

  players                       List players
  info <pid>                    Show player details
  now <pid>                     Show now playing media
  state <pid> [play|pause|stop] Get or set the play state
  volume <pid> [level]          Get or set the volume
  up <pid> [step]               Raise the volume
  down <pid> [step]             Lower the volume
  mute <pid> [on|off|toggle]    Get or set mute
  next <pid>                    Play the next track
  prev <pid>                    Play the previous track
  queue <pid> [from] [count]    Show the queue

  groups                        List groups
  group <leader> [member...]    Group players, or ungroup a leader

  sources                       List music sources
  browse <sid> [cid]            Browse a source

  send <command?query>          Send a raw command

  quit, exit                    Exit the REPL
"#;

pub async fn run(connection: Connection) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "HEOS CLI".bold().cyan());
    println!("Connecting to {}...", connection.endpoint());

    connection.connect().await?;
    println!("{}", "Connected!".green());

    // Create readline editor
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    // Load history
    let history_path = home::home_dir()
        .map(|h| h.join(".heos_history"))
        .unwrap_or_else(|| PathBuf::from(".heos_history"));
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "heos>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&connection, line).await {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break, // Exit command
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    // Save history
    let _ = rl.save_history(&history_path);

    let _ = connection.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

async fn execute_repl_command(
    connection: &Connection,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(Some(String::new()));
    }

    let cmd = parts[0].to_lowercase();
    let args = &parts[1..];

    // Commands that take a player id first
    let pid = || -> Result<i64, Box<dyn std::error::Error>> {
        match args.first() {
            Some(arg) => Ok(arg.parse()?),
            None => Err(format!("Usage: {} <pid> ...", cmd).into()),
        }
    };

    match cmd.as_str() {
        "help" | "?" => Ok(Some(HELP_TEXT.to_string())),

        "quit" | "exit" | "q" => Ok(None),

        "account" => match system::check_account(connection).await? {
            Some(user) => Ok(Some(format!("Signed in as {}", user.cyan()))),
            None => Ok(Some("Signed out".yellow().to_string())),
        },

        "heartbeat" | "hb" => {
            system::heart_beat(connection).await?;
            Ok(Some("OK".green().to_string()))
        }

        "players" | "p" => Ok(Some(format_players(
            &player::get_players(connection).await?,
        ))),

        "info" => {
            let info = player::get_player_info(connection, pid()?).await?;
            Ok(Some(format_json(&serde_json::to_value(info)?)))
        }

        "now" => {
            let media = player::get_now_playing_media(connection, pid()?).await?;
            Ok(Some(format!(
                "{} - {} ({})",
                media.artist.cyan(),
                media.song.bold(),
                media.album
            )))
        }

        "state" => {
            let pid = pid()?;
            match args.get(1) {
                Some(state) => {
                    let state: PlayState = state.parse()?;
                    player::set_play_state(connection, pid, state).await?;
                    Ok(Some(format!("{} {}", "State".green(), state.to_string().yellow())))
                }
                None => Ok(Some(
                    player::get_play_state(connection, pid).await?.to_string(),
                )),
            }
        }

        "volume" | "vol" => {
            let pid = pid()?;
            match args.get(1) {
                Some(level) => {
                    player::set_volume(connection, pid, level.parse()?).await?;
                    Ok(Some(format!("{} {}", "Volume".green(), level)))
                }
                None => Ok(Some(player::get_volume(connection, pid).await?.to_string())),
            }
        }

        "up" | "down" => {
            let pid = pid()?;
            let step = match args.get(1) {
                Some(step) => step.parse()?,
                None => DEFAULT_VOLUME_STEP,
            };
            if cmd == "up" {
                player::volume_up(connection, pid, step).await?;
            } else {
                player::volume_down(connection, pid, step).await?;
            }
            Ok(Some(player::get_volume(connection, pid).await?.to_string()))
        }

        "mute" => {
            let pid = pid()?;
            match args.get(1).copied() {
                None => {
                    let muted = player::get_mute(connection, pid).await?;
                    return Ok(Some(on_off(muted).to_string()));
                }
                Some("on") => player::set_mute(connection, pid, true).await?,
                Some("off") => player::set_mute(connection, pid, false).await?,
                Some("toggle") => player::toggle_mute(connection, pid).await?,
                Some(_) => return Ok(Some("Usage: mute <pid> [on|off|toggle]".to_string())),
            }
            Ok(Some("OK".green().to_string()))
        }

        "next" => {
            player::play_next(connection, pid()?).await?;
            Ok(Some("OK".green().to_string()))
        }

        "prev" | "previous" => {
            player::play_previous(connection, pid()?).await?;
            Ok(Some("OK".green().to_string()))
        }

        "queue" => {
            let pid = pid()?;
            let from = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
            let count = args
                .get(2)
                .and_then(|s| s.parse().ok())
                .unwrap_or(player::DEFAULT_QUEUE_COUNT);
            Ok(Some(format_queue(
                &player::get_queue(connection, pid, from, count).await?,
            )))
        }

        "groups" | "g" => Ok(Some(format_groups(&group::get_groups(connection).await?))),

        "group" => {
            let leader = pid()?;
            let members = args[1..]
                .iter()
                .map(|s| s.parse())
                .collect::<Result<Vec<i64>, _>>()?;
            if members.is_empty() {
                group::ungroup(connection, leader).await?;
                return Ok(Some(format!("{} {}", "Ungrouped".green(), leader)));
            }
            match group::set_group(connection, leader, &members).await? {
                Some(change) => Ok(Some(format!(
                    "{} {} (gid: {})",
                    "Grouped".green(),
                    change.name.cyan(),
                    change.gid
                ))),
                None => Ok(Some(format!("{} {}", "Ungrouped".green(), leader))),
            }
        }

        "sources" | "s" => Ok(Some(format_sources(
            &browse::get_music_sources(connection).await?,
        ))),

        "browse" | "b" => {
            if args.is_empty() {
                return Ok(Some("Usage: browse <sid> [cid]".to_string()));
            }
            let sid: i64 = args[0].parse()?;
            let cid = args.get(1).copied();
            let result = browse::browse(connection, sid, cid, 0, browse::MAX_BROWSE_COUNT).await?;
            Ok(Some(format_browse(&result)))
        }

        "send" => {
            if args.is_empty() {
                return Ok(Some("Usage: send <command?query>".to_string()));
            }
            let value = send_line(connection, &args.join(" ")).await?;
            Ok(Some(format_json(&value)))
        }

        _ => Ok(Some(format!(
            "Unknown command: {}. Type 'help' for help.",
            cmd
        ))),
    }
}
