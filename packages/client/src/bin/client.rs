//! Lounge console client.
//!
//! Joins a room on a relay server and keeps a simulated local player in sync
//! with the other members. Reconnects after a dropped connection (max 5
//! attempts with 5 second interval) and rejoins the room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lounge-client -- --server https://relay.example --room abc123 --username Alice
//! cargo run --bin lounge-client -- -u Bob --servers https://a.example --servers https://b.example
//! ```

use std::time::Duration;

use clap::Parser;

use lounge_client::{
    ClientConfig, ClientProfile, PlaybackSettings,
    domain::RoomIdentity,
    ui::{ConsoleOptions, run_console},
};
use lounge_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "lounge-client")]
#[command(about = "Playback synchronization client for Lounge rooms", long_about = None)]
struct Args {
    /// Name shown to the other members
    #[arg(short = 'u', long)]
    username: String,

    /// Relay server of the room to join
    #[arg(short = 's', long, requires = "room")]
    server: Option<String>,

    /// Room to join; a new room is created on the fastest relay when omitted
    #[arg(short = 'r', long, requires = "server")]
    room: Option<String>,

    /// Room password
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Avatar image URL
    #[arg(long)]
    avatar: Option<String>,

    /// Candidate relays for room creation
    #[arg(long)]
    servers: Vec<String>,

    /// Delay between two polls (milliseconds)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Allowed gap to the host before reporting out of sync (milliseconds)
    #[arg(long, default_value_t = 3000)]
    sync_flexibility_ms: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let config = ClientConfig::default()
        .with_playback(PlaybackSettings {
            client_poll_interval: Duration::from_millis(args.poll_interval_ms),
            sync_flexibility: Duration::from_millis(args.sync_flexibility_ms),
        })
        .with_servers(args.servers);

    let mut profile = ClientProfile::new(args.username);
    if let Some(avatar) = args.avatar {
        profile = profile.with_avatar_url(avatar);
    }

    let room = args
        .server
        .zip(args.room)
        .map(|(server, room)| RoomIdentity::new(server, room, args.password));

    if let Err(e) = run_console(ConsoleOptions {
        config,
        profile,
        room,
    })
    .await
    {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
