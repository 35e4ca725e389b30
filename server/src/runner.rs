//! Task that owns one [`Session`] and serializes everything that touches it.
//!
//! Joins, leaves, inputs and ticks are all handled on the same task, one at a
//! time, so an input can never land in the middle of a tick. Other tasks talk to
//! the session through a cloneable [`SessionHandle`].

use crate::config::SessionConfig;
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::game::SeatIndex;
use crate::session::{Session, SessionError, SessionId, SessionPhase};
use log::{debug, info, warn};
use shared::Direction;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// Requests queued to a session's runner.
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        conn: ConnectionHandle,
        reply: oneshot::Sender<Result<SeatIndex, SessionError>>,
    },
    Leave {
        conn: ConnectionId,
    },
    Input {
        conn: ConnectionId,
        direction: Direction,
    },
    Close,
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Starts a runner task for a fresh session.
    pub fn spawn(id: SessionId, cfg: SessionConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(cfg.command_buffer.max(1));
        let session = Session::new(id, cfg.rules.clone());
        let task = tokio::spawn(run_session(session, rx, cfg));
        (Self { id, tx }, task)
    }

    /// A handle with no runner behind it. Commands pile up in the returned
    /// receiver and are never answered.
    #[cfg(test)]
    pub(crate) fn detached(id: SessionId) -> (Self, mpsc::Receiver<SessionCommand>) {
        let (tx, rx) = mpsc::channel(16);
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// True once the runner has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn join(&self, conn: ConnectionHandle) -> Result<SeatIndex, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SessionCommand::Join { conn, reply })
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        response.await.map_err(|_| SessionError::SessionClosed)?
    }

    pub async fn leave(&self, conn: ConnectionId) {
        // A runner that already exited has nothing left to remove.
        let _ = self.tx.send(SessionCommand::Leave { conn }).await;
    }

    /// Queues a movement intent without waiting. Returns false if it was dropped
    /// because the queue is full or the session has ended.
    pub fn input(&self, conn: ConnectionId, direction: Direction) -> bool {
        match self.tx.try_send(SessionCommand::Input { conn, direction }) {
            Ok(()) => true,
            Err(e) => {
                debug!("Session {}: dropped input from {}: {}", self.id, conn, e);
                false
            }
        }
    }

    pub async fn close(&self) {
        let _ = self.tx.send(SessionCommand::Close).await;
    }
}

async fn run_session(
    mut session: Session,
    mut commands: mpsc::Receiver<SessionCommand>,
    cfg: SessionConfig,
) {
    let mut ticker = interval(cfg.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut idle_deadline: Option<Instant> = None;

    info!("Session {} started", session.id());

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    // Every handle is gone, nobody can reach this session any more.
                    session.close();
                    break;
                };
                let was_running = session.is_running();
                apply_command(&mut session, command);
                if !was_running && session.is_running() {
                    ticker.reset();
                }
            }

            _ = ticker.tick(), if session.is_running() => {
                let report = session.tick();
                if session.tick_count() % 600 == 0 {
                    debug!(
                        "Session {}: tick {}, {} seats",
                        session.id(),
                        session.tick_count(),
                        session.occupied()
                    );
                }
                if !report.dropped.is_empty() {
                    debug!("Session {}: dropped {:?} during broadcast", session.id(), report.dropped);
                }
            }

            _ = wait_until(idle_deadline) => {
                info!("Session {}: no opponent arrived in time, closing", session.id());
                session.close();
            }
        }

        match session.phase() {
            SessionPhase::Empty | SessionPhase::Terminated => break,
            SessionPhase::Waiting => {
                if idle_deadline.is_none() {
                    idle_deadline = cfg.idle_timeout.map(|timeout| Instant::now() + timeout);
                }
            }
            SessionPhase::Running => idle_deadline = None,
        }
    }

    info!(
        "Session {} ended after {} ticks",
        session.id(),
        session.tick_count()
    );
}

fn apply_command(session: &mut Session, command: SessionCommand) {
    match command {
        SessionCommand::Join { conn, reply } => {
            let result = session.add_player(conn);
            if let Err(e) = &result {
                debug!("Session {}: join rejected: {}", session.id(), e);
            }
            if reply.send(result).is_err() {
                warn!("Session {}: join caller went away", session.id());
            }
        }
        SessionCommand::Leave { conn } => {
            session.remove_player(conn);
        }
        SessionCommand::Input { conn, direction } => {
            if let Err(e) = session.handle_input(conn, direction) {
                debug!("Session {}: ignored input from {}: {}", session.id(), conn, e);
            }
        }
        SessionCommand::Close => session.close(),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
