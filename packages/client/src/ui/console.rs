//! Console input: a blocking `rustyline` reader feeding the async runner.

use std::{io::Write, time::Duration};

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

/// One line of user input, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Chat(String),
    Play,
    Pause,
    PartyPausing(bool),
    PartySend { is_pause: bool },
    Host(String),
    Users,
    Interval(Duration),
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  <text>                 send a chat message
  /play, /pause          drive the local player
  /partypause on|off     toggle party pausing
  /partysend pause|play  ask the room to pause or resume together
  /host <name>           hand the host role to another user
  /users                 show the room
  /interval <ms>         change the poll interval
  /quit                  leave the room
";

impl ConsoleCommand {
    /// Parse a trimmed, non-empty input line
    pub fn parse(line: &str) -> Result<Self, String> {
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Self::Chat(line.to_string()));
        };
        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        match (name, arg) {
            ("play", None) => Ok(Self::Play),
            ("pause", None) => Ok(Self::Pause),
            ("partypause", Some("on")) => Ok(Self::PartyPausing(true)),
            ("partypause", Some("off")) => Ok(Self::PartyPausing(false)),
            ("partysend", Some("pause")) => Ok(Self::PartySend { is_pause: true }),
            ("partysend", Some("play")) => Ok(Self::PartySend { is_pause: false }),
            ("host", Some(username)) => Ok(Self::Host(username.to_string())),
            ("users", None) => Ok(Self::Users),
            ("interval", Some(ms)) => match ms.parse::<u64>() {
                Ok(0) => Err("interval must be at least 1ms".to_string()),
                Ok(ms) => Ok(Self::Interval(Duration::from_millis(ms))),
                Err(e) => Err(format!("invalid interval '{ms}': {e}")),
            },
            ("help", None) => Ok(Self::Help),
            ("quit", None) | ("exit", None) => Ok(Self::Quit),
            _ => Err(format!("unknown command '{line}', try /help")),
        }
    }
}

/// Redisplay the prompt after printing a notice
pub fn redisplay_prompt(username: &str) {
    print!("{}> ", username);
    std::io::stdout().flush().ok();
}

/// Read lines on a dedicated thread; the channel closes on Ctrl+C, Ctrl+D or error
pub fn spawn_line_reader(username: &str) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
    let prompt = format!("{}> ", username);

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}
