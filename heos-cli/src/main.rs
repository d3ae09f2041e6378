//! heos-cli - Command-line interface for HEOS devices
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use heos_client::{discover, Connection, ConnectionConfig, DiscoveryOptions, Endpoint};
use heos_protocol::HEOS_PORT;
use std::net::IpAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "heos-cli")]
#[command(about = "Command-line interface for HEOS speakers")]
#[command(version)]
struct Cli {
    /// Device address; discovered on the local network when omitted
    #[arg(long, env = "HEOS_HOST")]
    host: Option<IpAddr>,

    /// Device port
    #[arg(short, long, default_value_t = HEOS_PORT)]
    port: u16,

    /// Discovery timeout in milliseconds
    #[arg(long, default_value = "5000")]
    discovery_timeout: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Start interactive REPL
    Repl,

    /// Search the local network for devices
    Discover {
        /// Stop after this many devices (0 waits for the full timeout)
        #[arg(short = 'n', long, default_value = "0")]
        max: usize,
    },

    /// List players
    Players,

    /// Player commands
    Player {
        #[command(subcommand)]
        action: PlayerCommand,
    },

    /// List groups
    Groups,

    /// Group players under a leader, or ungroup when no members are given
    Group {
        /// Leader player id
        leader: i64,

        /// Member player ids
        #[arg(value_delimiter = ',')]
        members: Vec<i64>,
    },

    /// List music sources
    Sources,

    /// Browse a source or one of its containers
    Browse {
        /// Source id
        sid: i64,

        /// Container id
        #[arg(short, long)]
        cid: Option<String>,

        /// First item
        #[arg(long, default_value = "0")]
        from: i64,

        /// Number of items
        #[arg(long, default_value = "50")]
        count: i64,
    },

    /// Send a raw command line such as `player/get_volume?pid=1`
    Send {
        /// Command with optional query
        line: String,
    },

    /// Stream change events until interrupted
    Watch,
}

#[derive(Subcommand)]
pub(crate) enum PlayerCommand {
    /// Show player details
    Info { pid: i64 },

    /// Show now playing media
    Now { pid: i64 },

    /// Get or set the play state (play, pause, stop)
    State { pid: i64, state: Option<String> },

    /// Get or set the volume (1-100)
    Volume { pid: i64, level: Option<u8> },

    /// Get or set mute (on, off, toggle)
    Mute { pid: i64, state: Option<String> },

    /// Show the queue
    Queue {
        pid: i64,

        #[arg(long, default_value = "0")]
        from: i64,

        #[arg(long, default_value = "25")]
        count: i64,
    },

    /// Play the next track
    Next { pid: i64 },

    /// Play the previous track
    Previous { pid: i64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let discovery_timeout = Duration::from_millis(cli.discovery_timeout);

    // Discovery needs no connection
    if let Some(Commands::Discover { max }) = &cli.command {
        let options = DiscoveryOptions::new()
            .with_max_devices(*max)
            .with_timeout(discovery_timeout);
        let devices = discover(&options).await?;
        if devices.is_empty() {
            println!("{}", "No devices found".yellow());
        }
        for device in devices {
            println!("{}", device.to_string().cyan());
        }
        return Ok(());
    }

    let endpoint = match cli.host {
        Some(host) => Endpoint::new(host).with_port(cli.port),
        None => {
            let options = DiscoveryOptions::new().with_timeout(discovery_timeout);
            match discover(&options).await?.into_iter().next() {
                Some(endpoint) => endpoint.with_port(cli.port),
                None => {
                    eprintln!("{}: no device found, use --host", "Error".red());
                    std::process::exit(1);
                }
            }
        }
    };

    let connection = Connection::new(ConnectionConfig::new(endpoint));

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(connection).await?;
        }
        Some(Commands::Discover { .. }) => unreachable!(), // Already handled above
        Some(Commands::Watch) => {
            connect(&connection).await?;
            commands::watch(&connection).await?;
            connection.close().await?;
        }
        Some(cmd) => {
            connect(&connection).await?;

            match commands::execute(&connection, cmd).await {
                Ok(output) => {
                    println!("{}", output);
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }

            connection.close().await?;
        }
    }

    Ok(())
}

async fn connect(connection: &Connection) -> Result<(), heos_client::ClientError> {
    connection.connect().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })
}
