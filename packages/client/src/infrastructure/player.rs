//! In-memory player used by the console and by tests.

use std::sync::Arc;

use async_trait::async_trait;
use lounge_shared::time::Clock;
use tokio::sync::Mutex;

use crate::{
    collaborator::PlayerClient,
    domain::{PlaybackState, PlayerState},
    error::PlayerError,
};

#[derive(Debug)]
struct Timeline {
    state: PlaybackState,
    /// Position at `anchored_at`, in milliseconds
    position: f64,
    anchored_at: i64,
    duration: Option<f64>,
}

impl Timeline {
    fn position_at(&self, now: i64) -> f64 {
        let position = match self.state {
            PlaybackState::Playing => self.position + (now - self.anchored_at).max(0) as f64,
            _ => self.position,
        };
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn transition(&mut self, state: PlaybackState, now: i64) {
        self.position = self.position_at(now);
        self.anchored_at = now;
        self.state = state;
    }
}

/// Player whose position advances with a [`Clock`] while playing
pub struct SimulatedPlayer {
    clock: Arc<dyn Clock>,
    timeline: Mutex<Timeline>,
}

impl SimulatedPlayer {
    /// A paused player at position zero
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            clock,
            timeline: Mutex::new(Timeline {
                state: PlaybackState::Paused,
                position: 0.0,
                anchored_at: now,
                duration: None,
            }),
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration_millis: f64) -> Self {
        self.timeline.get_mut().duration = Some(duration_millis);
        self
    }

    /// Jump to `position` milliseconds
    pub async fn seek(&self, position: f64) {
        let now = self.clock.now_millis();
        let mut timeline = self.timeline.lock().await;
        timeline.position = position.max(0.0);
        timeline.anchored_at = now;
    }

    pub async fn state(&self) -> PlaybackState {
        self.timeline.lock().await.state
    }
}

#[async_trait]
impl PlayerClient for SimulatedPlayer {
    async fn press_play(&self) -> Result<(), PlayerError> {
        let now = self.clock.now_millis();
        self.timeline
            .lock()
            .await
            .transition(PlaybackState::Playing, now);
        tracing::debug!("Simulated player: play");
        Ok(())
    }

    async fn press_pause(&self) -> Result<(), PlayerError> {
        let now = self.clock.now_millis();
        self.timeline
            .lock()
            .await
            .transition(PlaybackState::Paused, now);
        tracing::debug!("Simulated player: pause");
        Ok(())
    }

    async fn poll_client(&self) -> Result<PlayerState, PlayerError> {
        let now = self.clock.now_millis();
        let timeline = self.timeline.lock().await;
        Ok(PlayerState {
            time: Some(timeline.position_at(now)),
            duration: timeline.duration,
            state: timeline.state,
            playback_rate: 1.0,
        })
    }
}
