//! Interactive console session.

use std::sync::Arc;

use lounge_shared::time::{Clock, SystemClock, get_timestamp};

use crate::{
    client::LoungeClient,
    collaborator::{LiveSettings, PlayerClient},
    config::{ClientConfig, ClientProfile},
    domain::RoomIdentity,
    infrastructure::player::SimulatedPlayer,
};

use super::{
    console::{ConsoleCommand, HELP, redisplay_prompt, spawn_line_reader},
    formatter::NoticeFormatter,
};

/// What the console should join
#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    pub config: ClientConfig,
    pub profile: ClientProfile,
    /// Room to join; a new room on the best relay when absent
    pub room: Option<RoomIdentity>,
}

/// Join a room and relay console input until the user quits
pub async fn run_console(options: ConsoleOptions) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let player = Arc::new(SimulatedPlayer::new(clock.clone()));
    let settings = Arc::new(LiveSettings::new(options.config.playback));
    let username = options.profile.username.clone();

    let mut client = LoungeClient::new(options.config, options.profile, player.clone())
        .with_settings(settings.clone())
        .with_clock(clock);
    let mut notices = client
        .take_notices()
        .ok_or("notice stream already taken")?;

    let outcome = match options.room {
        Some(identity) => client.connect_and_join(identity).await?,
        None => client.create_and_join_room().await?,
    };
    println!(
        "\nYou are '{}' in room '{}' on {}. Type /help for commands.\n",
        username, outcome.identity.room, outcome.identity.server
    );

    let mut input = spawn_line_reader(&username);

    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else {
                    break;
                };
                match ConsoleCommand::parse(&line) {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = execute(&client, &player, &settings, command).await {
                            println!("! {}", e);
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            Some(notice) = notices.recv() => {
                print!("{}", NoticeFormatter::format_notice(&notice, get_timestamp()));
                redisplay_prompt(&username);
            }
        }
    }

    client.disconnect().await?;
    tracing::info!("Left the room");
    Ok(())
}

async fn execute(
    client: &LoungeClient,
    player: &SimulatedPlayer,
    settings: &LiveSettings,
    command: ConsoleCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        ConsoleCommand::Chat(msg) => client.send_message(msg)?,
        ConsoleCommand::Play => player.press_play().await?,
        ConsoleCommand::Pause => player.press_pause().await?,
        ConsoleCommand::PartyPausing(enabled) => client.set_party_pausing(enabled)?,
        ConsoleCommand::PartySend { is_pause } => client.send_party_pause(is_pause)?,
        ConsoleCommand::Host(username) => client.transfer_host(username)?,
        ConsoleCommand::Users => print!("{}", NoticeFormatter::format_users(&client.snapshot())),
        ConsoleCommand::Interval(interval) => {
            settings.set_client_poll_interval(interval);
            println!("Poll interval set to {:?}", interval);
        }
        ConsoleCommand::Help => print!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
