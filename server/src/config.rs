//! Runtime settings for the session server.

use crate::game::Rules;
use shared::TICK_MILLIS;
use std::time::Duration;

/// Settings applied to every session the lobby creates.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_interval: Duration,
    /// How long a session may wait for an opponent before it is torn down.
    /// `None` keeps waiting sessions alive forever.
    pub idle_timeout: Option<Duration>,
    /// Capacity of each session's command queue.
    pub command_buffer: usize,
    pub rules: Rules,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(TICK_MILLIS),
            idle_timeout: Some(Duration::from_secs(120)),
            command_buffer: 256,
            rules: Rules::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub max_sessions: usize,
    /// Capacity of each connection's outbound queue. A client that falls this
    /// many messages behind is disconnected.
    pub outbound_buffer: usize,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            max_sessions: 64,
            outbound_buffer: 64,
            session: SessionConfig::default(),
        }
    }
}
