//! Interfaces of the collaborators the session engine drives.
//!
//! The media player and the settings store live outside this crate; the
//! engine only talks to them through these traits.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{domain::PlayerState, error::PlayerError};

const DEFAULT_CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_SYNC_FLEXIBILITY: Duration = Duration::from_millis(3000);

/// Media player driven by the room
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerClient: Send + Sync {
    /// Resume playback
    async fn press_play(&self) -> Result<(), PlayerError>;

    /// Pause playback
    async fn press_pause(&self) -> Result<(), PlayerError>;

    /// Sample the current playback state
    async fn poll_client(&self) -> Result<PlayerState, PlayerError>;
}

/// Live user settings, read on every use
pub trait SettingsSource: Send + Sync {
    /// Delay between two polls
    fn client_poll_interval(&self) -> Duration;

    /// Allowed gap to the host before the status turns `notok`
    fn sync_flexibility(&self) -> Duration;
}

/// Values held by [`LiveSettings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub client_poll_interval: Duration,
    pub sync_flexibility: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            client_poll_interval: DEFAULT_CLIENT_POLL_INTERVAL,
            sync_flexibility: DEFAULT_SYNC_FLEXIBILITY,
        }
    }
}

/// Settings backed by a `watch` channel so changes are visible on the next read
#[derive(Debug, Clone)]
pub struct LiveSettings {
    values: Arc<watch::Sender<PlaybackSettings>>,
}

impl LiveSettings {
    pub fn new(initial: PlaybackSettings) -> Self {
        let (values, _) = watch::channel(initial);
        Self {
            values: Arc::new(values),
        }
    }

    pub fn current(&self) -> PlaybackSettings {
        *self.values.borrow()
    }

    pub fn set_client_poll_interval(&self, interval: Duration) {
        self.values
            .send_modify(|values| values.client_poll_interval = interval);
    }

    pub fn set_sync_flexibility(&self, flexibility: Duration) {
        self.values
            .send_modify(|values| values.sync_flexibility = flexibility);
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSettings> {
        self.values.subscribe()
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self::new(PlaybackSettings::default())
    }
}

impl SettingsSource for LiveSettings {
    fn client_poll_interval(&self) -> Duration {
        self.current().client_poll_interval
    }

    fn sync_flexibility(&self) -> Duration {
        self.current().sync_flexibility
    }
}
