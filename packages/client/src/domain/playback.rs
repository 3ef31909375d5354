//! Playback state of the local player and of the room host.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Coarse playback state reported by a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Buffering,
    #[default]
    Stopped,
}

/// Snapshot sampled from the local player collaborator.
///
/// Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub state: PlaybackState,
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
}

fn default_playback_rate() -> f64 {
    1.0
}

impl PlayerState {
    pub fn new(state: PlaybackState, time: Option<f64>) -> Self {
        Self {
            time,
            duration: None,
            state,
            playback_rate: default_playback_rate(),
        }
    }
}

/// Playback state published by the host (`host-update` payload)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostState {
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub state: PlaybackState,
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
}

/// Host state together with the local time it was received at
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedHostState {
    pub state: HostState,
    pub received_at: i64,
}

impl TrackedHostState {
    /// Host position extrapolated to `now_millis`
    pub fn expected_time(&self, now_millis: i64) -> Option<f64> {
        let time = self.state.time?;
        if self.state.state == PlaybackState::Playing {
            let elapsed = (now_millis - self.received_at).max(0) as f64;
            Some(time + elapsed * self.state.playback_rate)
        } else {
            Some(time)
        }
    }
}

/// Status attached to every poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Good,
    NotOk,
    Error,
}

/// Map a sampled client time onto a [`SyncStatus`].
///
/// `Error` when the player has no position, `Good` when there is nothing to
/// compare against or the gap to the host stays within `flexibility`.
pub fn derive_status(
    client_time: Option<f64>,
    host: Option<&TrackedHostState>,
    now_millis: i64,
    flexibility: Duration,
) -> SyncStatus {
    let Some(client_time) = client_time else {
        return SyncStatus::Error;
    };
    let Some(host_time) = host.and_then(|h| h.expected_time(now_millis)) else {
        return SyncStatus::Good;
    };

    if (client_time - host_time).abs() <= flexibility.as_millis() as f64 {
        SyncStatus::Good
    } else {
        SyncStatus::NotOk
    }
}

/// Action to perform on the local player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    Play,
    Pause,
}

impl PlaybackAction {
    pub fn from_intent(is_pause: bool) -> Self {
        if is_pause { Self::Pause } else { Self::Play }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(state: PlaybackState, time: f64, received_at: i64) -> TrackedHostState {
        TrackedHostState {
            state: HostState {
                time: Some(time),
                duration: None,
                state,
                playback_rate: 1.0,
            },
            received_at,
        }
    }

    #[test]
    fn test_derive_status_without_client_time_is_error() {
        // テスト項目: プレイヤーが再生位置を返さない場合は Error
        // given (前提条件):
        let host = host(PlaybackState::Paused, 0.0, 0);

        // when (操作):
        let status = derive_status(None, Some(&host), 0, Duration::from_secs(3));

        // then (期待する結果):
        assert_eq!(status, SyncStatus::Error);
    }

    #[test]
    fn test_derive_status_without_host_is_good() {
        // テスト項目: host の状態が不明な場合は Good
        // given (前提条件):
        let client_time = Some(42_000.0);

        // when (操作):
        let status = derive_status(client_time, None, 0, Duration::from_secs(3));

        // then (期待する結果):
        assert_eq!(status, SyncStatus::Good);
    }

    #[test]
    fn test_derive_status_extrapolates_playing_host() {
        // テスト項目: 再生中の host の位置を経過時間で補正して比較する
        // given (前提条件): host は 10s 地点で再生中、5s 経過
        let host = host(PlaybackState::Playing, 10_000.0, 1_000);

        // when (操作):
        let in_sync = derive_status(Some(15_500.0), Some(&host), 6_000, Duration::from_secs(1));
        let drifted = derive_status(Some(10_000.0), Some(&host), 6_000, Duration::from_secs(1));

        // then (期待する結果):
        assert_eq!(in_sync, SyncStatus::Good);
        assert_eq!(drifted, SyncStatus::NotOk);
    }

    #[test]
    fn test_derive_status_paused_host_is_not_extrapolated() {
        // テスト項目: 一時停止中の host の位置は補正されない
        // given (前提条件):
        let host = host(PlaybackState::Paused, 10_000.0, 0);

        // when (操作):
        let status = derive_status(Some(10_200.0), Some(&host), 60_000, Duration::from_secs(1));

        // then (期待する結果):
        assert_eq!(status, SyncStatus::Good);
    }

    #[test]
    fn test_player_state_serializes_camel_case() {
        // テスト項目: PlayerState が camelCase で直列化される
        // given (前提条件):
        let state = PlayerState::new(PlaybackState::Playing, Some(1_000.0));

        // when (操作):
        let json = serde_json::to_value(&state).unwrap();

        // then (期待する結果):
        assert_eq!(json["playbackRate"], 1.0);
        assert_eq!(json["state"], "playing");
        assert_eq!(json["time"], 1_000.0);
    }
}
