//! Wire protocol and field constants shared by the session server and clients.
//!
//! Every message is a JSON object tagged by its `type` field, so a frame such as
//! `{"type":"move","direction":"up"}` maps directly onto [`ClientMessage::Move`].

use serde::{Deserialize, Serialize};

/// Interval between two simulation ticks in milliseconds (~62.5 Hz).
pub const TICK_MILLIS: u64 = 16;

/// Distance a paddle travels in one tick while a direction is pending.
pub const PADDLE_STEP: f32 = 0.1;
/// Default bound for the paddle centre, `y` stays within `[-MAX_PADDLE_Y, MAX_PADDLE_Y]`.
pub const MAX_PADDLE_Y: f32 = 2.5;
/// Horizontal line past which the ball can touch a paddle.
pub const PADDLE_X: f32 = 1.8;
/// Vertical distance from the paddle centre that still counts as a hit.
pub const PADDLE_REACH: f32 = 0.6;

/// Top and bottom walls sit at `y = ±WALL_Y`.
pub const WALL_Y: f32 = 2.5;
/// Goal lines sit at `x = ±GOAL_X`.
pub const GOAL_X: f32 = 2.0;

/// Horizontal serve speed after a point.
pub const SERVE_SPEED_X: f32 = 0.05;
/// Vertical serve speed after a point.
pub const SERVE_SPEED_Y: f32 = 0.03;

/// Paddle movement intent sent by a client.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Sign applied to the paddle step, `up` moves towards positive y.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

/// Messages sent from a client to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Move { direction: Direction },
}

/// Messages sent from the server to a seated client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once when the connection is given a seat. `player` is 1 or 2.
    Welcome { player: u8 },
    /// Sent to both seats after every tick.
    State {
        paddle1: PaddleView,
        paddle2: PaddleView,
        ball: BallView,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PaddleView {
    pub y: f32,
    pub score: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BallView {
    pub x: f32,
    pub y: f32,
}

impl ClientMessage {
    /// Parses a text frame, returning `None` for anything that is not a valid command.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
