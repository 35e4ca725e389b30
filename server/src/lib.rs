//! # Pong Session Server Library
//!
//! This library provides an authoritative server for two-player Pong matches.
//! Each match lives in its own session; the server owns the ball and paddles,
//! applies player intents on a fixed tick and pushes the resulting state to
//! both players.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Clients only send movement intents (`up` / `down`). Paddle positions, ball
//! physics, bounces and scoring are decided here and broadcast after every
//! tick, so every client renders the same match.
//!
//! ### Session Lifecycle
//! A session admits at most two players. It waits with one player seated,
//! starts ticking when the second seat fills, pauses when a player leaves and
//! ends when both seats are empty, after an idle timeout, or when closed.
//!
//! ### Failure Isolation
//! A player whose socket stops accepting messages is removed from its seat the
//! moment a broadcast to it fails. Sessions share no state, so one misbehaving
//! session never affects another.
//!
//! ## Architecture Design
//!
//! ### One Task per Session
//! Every session is owned by a single runner task. Joins, leaves, inputs and
//! ticks are queued to that task and handled one at a time, which removes the
//! need for locking inside a session and guarantees that no input is applied
//! halfway through a tick.
//!
//! ### Non-blocking Broadcast
//! Each connection has a bounded outbound queue drained by its own writer
//! task. The runner only ever `try_send`s into it, so a slow client is
//! detected by a full queue instead of stalling the tick.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Field geometry, paddle clamping, ball motion, wall and paddle bounces,
//! scoring and serves. Pure data, no I/O.
//!
//! ### Session Module (`session`)
//! Seats, phase transitions and state broadcast for one match.
//!
//! ### Runner Module (`runner`)
//! The per-session task with its tick scheduler and idle timer, and the
//! [`runner::SessionHandle`] used to reach it.
//!
//! ### Lobby Module (`lobby`)
//! Places incoming connections into sessions with a free seat and opens new
//! sessions on demand.
//!
//! ### Network Module (`network`)
//! WebSocket accept loop, JSON framing and per-connection reader and writer.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!
//!     // Serve until Ctrl+C, then close every session
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod game;
pub mod lobby;
pub mod network;
pub mod runner;
pub mod session;
