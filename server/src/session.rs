//! Authoritative state of one two-player match.
//!
//! A [`Session`] owns both seats and the [`Field`]. It is a plain state machine:
//! nothing in here awaits or spawns, so every operation can be driven from the
//! session's runner task or directly from tests.
//!
//! Lifecycle:
//! - `Empty` → `Waiting` when the first player is seated
//! - `Waiting` → `Running` when the second seat fills (the match restarts)
//! - `Running` → `Waiting` / `Empty` when players leave
//! - any → `Terminated` on [`Session::close`]

use crate::connection::{ConnectionHandle, ConnectionId, SendError};
use crate::game::{Field, Rules, SeatIndex};
use log::{debug, info, warn};
use shared::{Direction, ServerMessage};

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No seat occupied.
    Empty,
    /// One seat occupied, waiting for an opponent.
    Waiting,
    /// Both seats occupied, ticking.
    Running,
    /// Torn down, no further players accepted.
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session is full")]
    SessionFull,
    #[error("connection is not seated in this session")]
    UnknownConnection,
    #[error("session has ended")]
    SessionClosed,
    #[error("could not reach connection: {0}")]
    Unreachable(#[from] SendError),
}

/// A connected player and the direction they asked for since the last tick.
#[derive(Debug)]
struct Seat {
    conn: ConnectionHandle,
    pending: Option<Direction>,
}

/// What a single call to [`Session::tick`] did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Whether the field was advanced at all.
    pub advanced: bool,
    pub scorer: Option<SeatIndex>,
    /// Seats dropped because the state broadcast could not be delivered.
    pub dropped: Vec<ConnectionId>,
}

pub struct Session {
    id: SessionId,
    seats: [Option<Seat>; 2],
    field: Field,
    tick: u64,
    phase: SessionPhase,
}

impl Session {
    pub fn new(id: SessionId, rules: Rules) -> Self {
        Self {
            id,
            seats: [None, None],
            field: Field::new(rules),
            tick: 0,
            phase: SessionPhase::Empty,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn occupied(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    pub fn seat_of(&self, conn: ConnectionId) -> Option<SeatIndex> {
        SeatIndex::ALL.into_iter().find(|seat| {
            self.seats[seat.slot()]
                .as_ref()
                .is_some_and(|s| s.conn.id() == conn)
        })
    }

    /// Seats a connection in the first free seat and welcomes it.
    ///
    /// Seat one is always filled before seat two. Filling the second seat restarts
    /// the match and moves the session to `Running`. A connection that is already
    /// seated gets its existing seat back.
    pub fn add_player(&mut self, conn: ConnectionHandle) -> Result<SeatIndex, SessionError> {
        if self.phase == SessionPhase::Terminated {
            return Err(SessionError::SessionClosed);
        }
        if let Some(seat) = self.seat_of(conn.id()) {
            return Ok(seat);
        }

        let seat = SeatIndex::ALL
            .into_iter()
            .find(|seat| self.seats[seat.slot()].is_none())
            .ok_or(SessionError::SessionFull)?;

        conn.send(ServerMessage::Welcome {
            player: seat.number(),
        })?;

        info!(
            "Session {}: {} took seat {}",
            self.id,
            conn.id(),
            seat.number()
        );
        self.seats[seat.slot()] = Some(Seat {
            conn,
            pending: None,
        });

        if self.occupied() == 2 {
            self.field.reset();
            self.tick = 0;
            self.set_phase(SessionPhase::Running);
        } else {
            self.set_phase(SessionPhase::Waiting);
        }

        Ok(seat)
    }

    /// Clears the seat held by `conn`. Returns false if it was not seated.
    pub fn remove_player(&mut self, conn: ConnectionId) -> bool {
        let Some(seat) = self.seat_of(conn) else {
            return false;
        };

        self.seats[seat.slot()] = None;
        info!("Session {}: {} left seat {}", self.id, conn, seat.number());

        if self.phase != SessionPhase::Terminated {
            let next = if self.occupied() == 0 {
                SessionPhase::Empty
            } else {
                SessionPhase::Waiting
            };
            self.set_phase(next);
        }
        true
    }

    /// Records the latest direction for the seat held by `conn`, replacing any
    /// direction not yet applied.
    pub fn handle_input(
        &mut self,
        conn: ConnectionId,
        direction: Direction,
    ) -> Result<SeatIndex, SessionError> {
        let seat = self
            .seat_of(conn)
            .ok_or(SessionError::UnknownConnection)?;
        if let Some(s) = self.seats[seat.slot()].as_mut() {
            s.pending = Some(direction);
        }
        Ok(seat)
    }

    /// Advances one simulation step and broadcasts the result to both seats.
    ///
    /// Does nothing unless the session is `Running`. Pending directions are
    /// consumed by the step. A seat whose outbound queue rejects the state
    /// message is removed as if it had disconnected.
    pub fn tick(&mut self) -> TickReport {
        if !self.is_running() {
            return TickReport::default();
        }

        let directions = [0, 1].map(|slot| {
            self.seats[slot]
                .as_mut()
                .and_then(|seat| seat.pending.take())
        });

        let scorer = self.field.step(directions);
        self.tick += 1;

        if let Some(seat) = scorer {
            info!(
                "Session {}: seat {} scored ({} - {})",
                self.id,
                seat.number(),
                self.field.paddle(SeatIndex::One).score,
                self.field.paddle(SeatIndex::Two).score
            );
        }

        let dropped = self.broadcast_state();
        for conn in &dropped {
            self.remove_player(*conn);
        }

        TickReport {
            advanced: true,
            scorer,
            dropped,
        }
    }

    /// Tears the session down. Seats are released, which drops their outbound
    /// handles and lets the transport close the sockets.
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Terminated {
            return;
        }
        self.seats = [None, None];
        self.set_phase(SessionPhase::Terminated);
    }

    pub fn state_message(&self) -> ServerMessage {
        ServerMessage::State {
            paddle1: self.field.paddle(SeatIndex::One).view(),
            paddle2: self.field.paddle(SeatIndex::Two).view(),
            ball: self.field.ball.view(),
        }
    }

    fn broadcast_state(&self) -> Vec<ConnectionId> {
        let message = self.state_message();
        let mut failed = Vec::new();

        for seat in self.seats.iter().flatten() {
            if let Err(e) = seat.conn.send(message.clone()) {
                warn!(
                    "Session {}: dropping {} after failed send: {}",
                    self.id,
                    seat.conn.id(),
                    e
                );
                failed.push(seat.conn.id());
            }
        }
        failed
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!("Session {}: {:?} -> {:?}", self.id, self.phase, phase);
            self.phase = phase;
        }
    }
}
