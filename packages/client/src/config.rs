//! Client configuration.

use std::time::Duration;

use uuid::Uuid;

use crate::collaborator::PlaybackSettings;

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL_SECS: u64 = 5;
const DEFAULT_MAX_PENDING_POLLS: usize = 32;
const DEFAULT_MAX_POLL_AGE: Duration = Duration::from_secs(30);
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_RELAY_PATH: &str = "socket";

/// Bounds for polls waiting for a `poll-result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    /// Oldest records are evicted beyond this count
    pub max_pending: usize,
    /// Records older than this are evicted
    pub max_age: Duration,
}

impl Default for PollWindow {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING_POLLS,
            max_age: DEFAULT_MAX_POLL_AGE,
        }
    }
}

/// Transport re-establishment after an unexpected drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl ReconnectPolicy {
    /// Policy that never re-establishes a dropped transport
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            interval: Duration::ZERO,
        }
    }

    /// Check if another attempt is allowed after `attempts_made` failed ones.
    pub fn should_attempt(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            interval: Duration::from_secs(RECONNECT_INTERVAL_SECS),
        }
    }
}

/// Engine configuration
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use lounge_client::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_join_timeout(Duration::from_secs(3))
///     .with_servers(vec!["https://relay.example".to_string()]);
/// assert_eq!(config.servers.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Initial poll interval and sync flexibility
    pub playback: PlaybackSettings,
    pub poll_window: PollWindow,
    pub join_timeout: Duration,
    pub disconnect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub health_timeout: Duration,
    /// Candidate relay servers for health probing
    pub servers: Vec<String>,
    /// Path of the relay endpoint below the server address
    pub relay_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackSettings::default(),
            poll_window: PollWindow::default(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            servers: Vec::new(),
            relay_path: DEFAULT_RELAY_PATH.to_string(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_playback(mut self, playback: PlaybackSettings) -> Self {
        self.playback = playback;
        self
    }

    #[must_use]
    pub fn with_poll_window(mut self, poll_window: PollWindow) -> Self {
        self.poll_window = poll_window;
        self
    }

    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    #[must_use]
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_servers(mut self, servers: Vec<String>) -> Self {
        self.servers = servers;
        self
    }

    #[must_use]
    pub fn with_relay_path(mut self, relay_path: impl Into<String>) -> Self {
        self.relay_path = relay_path.into();
        self
    }
}

/// Local identity announced in every `join`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    pub username: String,
    pub avatar_url: Option<String>,
    /// Stable per client instance
    pub uuid: String,
}

impl ClientProfile {
    /// Create a profile with a freshly generated uuid
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            avatar_url: None,
            uuid: Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_attempt_within_limit() {
        // テスト項目: 再接続回数が上限未満の場合、再接続すべきと判定される
        // given (前提条件):
        let policy = ReconnectPolicy::default();

        // when (操作):
        let result = policy.should_attempt(3);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_attempt_at_limit() {
        // テスト項目: 再接続回数が上限に達した場合、再接続すべきではないと判定される
        // given (前提条件):
        let policy = ReconnectPolicy::default();

        // when (操作):
        let result = policy.should_attempt(MAX_RECONNECT_ATTEMPTS);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_one_before_limit() {
        // テスト項目: 上限の1回前の再接続試行では再接続すべきと判定される
        // given (前提条件):
        let policy = ReconnectPolicy::default();

        // when (操作):
        let result = policy.should_attempt(MAX_RECONNECT_ATTEMPTS - 1);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_disabled_policy_never_attempts() {
        // テスト項目: 無効化したポリシーでは初回から再接続しない
        // given (前提条件):
        let policy = ReconnectPolicy::disabled();

        // when (操作):
        let result = policy.should_attempt(0);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_profiles_get_distinct_uuids() {
        // テスト項目: プロファイルごとに異なる uuid が生成される
        // given (前提条件):
        let a = ClientProfile::new("alice");

        // when (操作):
        let b = ClientProfile::new("alice");

        // then (期待する結果):
        assert_ne!(a.uuid, b.uuid);
        assert!(Uuid::parse_str(&a.uuid).is_ok());
    }
}
