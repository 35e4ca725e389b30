//! Session allocation for incoming players
//!
//! The lobby decides which session a newly accepted connection plays in:
//! - Sessions are tried in creation order, so a waiting player is matched
//!   before a new session is opened
//! - A session answering `SessionFull` (or one that has already ended) is skipped
//! - When no existing session has room a new one is spawned, up to a fixed cap
//!
//! Ended sessions are pruned lazily whenever the lobby is consulted. The lobby
//! never touches session state directly, it only talks to runners through their
//! [`SessionHandle`]s. Its own bookkeeping sits behind a mutex that is never
//! held while waiting on an existing session's runner.

use crate::config::SessionConfig;
use crate::connection::ConnectionHandle;
use crate::game::SeatIndex;
use crate::runner::SessionHandle;
use crate::session::{SessionError, SessionId};
use log::{debug, info};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("all {max_sessions} sessions are in use")]
    LobbyFull { max_sessions: usize },
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A live session and the task running it
struct SessionEntry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Where a connection ended up after [`Lobby::join`]
#[derive(Debug, Clone)]
pub struct Placement {
    pub session: SessionHandle,
    pub seat: SeatIndex,
}

/// Sessions keyed by a monotonically increasing id, which also gives the
/// creation order used when looking for a free seat.
struct Registry {
    /// Live sessions indexed by id
    sessions: BTreeMap<SessionId, SessionEntry>,
    /// Next id handed to a new session
    next_session_id: SessionId,
}

impl Registry {
    /// Id of the newest session opened so far, 0 before the first one
    fn newest_id(&self) -> SessionId {
        self.next_session_id - 1
    }

    /// Handles of live sessions opened after `after`, oldest first
    fn handles_after(&mut self, after: SessionId) -> Vec<SessionHandle> {
        self.prune();
        self.sessions
            .range(after + 1..)
            .map(|(_, entry)| entry.handle.clone())
            .collect()
    }

    fn open(&mut self, config: SessionConfig) -> SessionHandle {
        let id = self.next_session_id;
        self.next_session_id += 1;

        let (handle, task) = SessionHandle::spawn(id, config);
        info!("Opened session {} ({} live)", id, self.sessions.len() + 1);
        self.sessions.insert(
            id,
            SessionEntry {
                handle: handle.clone(),
                task,
            },
        );
        handle
    }

    /// Forgets sessions whose runner has exited
    fn prune(&mut self) {
        self.sessions.retain(|id, entry| {
            let alive = !entry.handle.is_closed();
            if !alive {
                debug!("Pruning ended session {}", id);
            }
            alive
        });
    }
}

/// Owns every running session of this server
pub struct Lobby {
    /// Session bookkeeping
    registry: Mutex<Registry>,
    /// Maximum number of concurrent sessions
    max_sessions: usize,
    /// Settings passed to every new session
    config: SessionConfig,
}

impl Lobby {
    /// Creates an empty lobby
    ///
    /// Session ids start from 1 and increment for each new session.
    pub fn new(max_sessions: usize, config: SessionConfig) -> Self {
        Self {
            registry: Mutex::new(Registry {
                sessions: BTreeMap::new(),
                next_session_id: 1,
            }),
            max_sessions,
            config,
        }
    }

    /// Seats a connection in the oldest session with a free seat
    ///
    /// Existing sessions are asked without holding the lobby lock, so a busy
    /// runner only delays this connection. Sessions opened concurrently in the
    /// meantime are tried under the lock before a new one is opened. Fails with
    /// `LobbyFull` when the session cap is reached, or with the session's own
    /// error when the connection could not be welcomed.
    pub async fn join(&self, conn: ConnectionHandle) -> Result<Placement, LobbyError> {
        let (existing, seen) = {
            let mut registry = self.registry.lock().await;
            (registry.handles_after(0), registry.newest_id())
        };
        if let Some(placement) = offer(existing, &conn).await? {
            return Ok(placement);
        }

        let mut registry = self.registry.lock().await;
        let newer = registry.handles_after(seen);
        if let Some(placement) = offer(newer, &conn).await? {
            return Ok(placement);
        }

        if registry.sessions.len() >= self.max_sessions {
            return Err(LobbyError::LobbyFull {
                max_sessions: self.max_sessions,
            });
        }

        // Seat the connection before releasing the lock so nobody else can
        // fill the fresh session first.
        let session = registry.open(self.config.clone());
        let seat = session.join(conn).await?;
        Ok(Placement { session, seat })
    }

    /// Number of sessions that are still running
    pub async fn session_count(&self) -> usize {
        let mut registry = self.registry.lock().await;
        registry.prune();
        registry.sessions.len()
    }

    /// Closes every session and waits for their runners to finish
    pub async fn shutdown(&self) {
        let sessions = std::mem::take(&mut self.registry.lock().await.sessions);
        info!("Closing {} sessions", sessions.len());
        for entry in sessions.values() {
            entry.handle.close().await;
        }
        for (id, entry) in sessions {
            if let Err(e) = entry.task.await {
                debug!("Session {} task ended abnormally: {}", id, e);
            }
        }
    }
}

/// Offers `conn` to each session in turn, skipping full and ended ones
async fn offer(
    sessions: Vec<SessionHandle>,
    conn: &ConnectionHandle,
) -> Result<Option<Placement>, LobbyError> {
    for session in sessions {
        match session.join(conn.clone()).await {
            Ok(seat) => return Ok(Some(Placement { session, seat })),
            Err(SessionError::SessionFull) | Err(SessionError::SessionClosed) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;
    use shared::ServerMessage;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::Receiver;
    use tokio::time::timeout;
    use tokio_test::assert_ok;

    fn test_lobby(max_sessions: usize) -> Lobby {
        Lobby::new(
            max_sessions,
            SessionConfig {
                idle_timeout: Some(Duration::from_secs(5)),
                ..SessionConfig::default()
            },
        )
    }

    fn player(id: u64) -> (ConnectionHandle, Receiver<ServerMessage>) {
        ConnectionHandle::channel(ConnectionId(id), 1024)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairs_players_into_sessions() {
        let lobby = test_lobby(4);
        let (p1, _rx1) = player(1);
        let (p2, _rx2) = player(2);
        let (p3, _rx3) = player(3);

        let first = assert_ok!(lobby.join(p1).await);
        let second = assert_ok!(lobby.join(p2).await);
        let third = assert_ok!(lobby.join(p3).await);

        assert_eq!(first.session.id(), 1);
        assert_eq!(first.seat, SeatIndex::One);
        assert_eq!(second.session.id(), 1);
        assert_eq!(second.seat, SeatIndex::Two);
        assert_eq!(third.session.id(), 2);
        assert_eq!(third.seat, SeatIndex::One);
        assert_eq!(lobby.session_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_when_session_cap_reached() {
        let lobby = test_lobby(1);
        let (p1, _rx1) = player(1);
        let (p2, _rx2) = player(2);
        let (p3, _rx3) = player(3);

        assert_ok!(lobby.join(p1).await);
        assert_ok!(lobby.join(p2).await);
        assert_eq!(
            lobby.join(p3).await.unwrap_err(),
            LobbyError::LobbyFull { max_sessions: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_freed_seat_is_filled_before_new_session() {
        let lobby = test_lobby(4);
        let (p1, _rx1) = player(1);
        let (p2, _rx2) = player(2);
        assert_ok!(lobby.join(p1).await);
        let placed = assert_ok!(lobby.join(p2).await);

        placed.session.leave(ConnectionId(2)).await;

        let (p3, _rx3) = player(3);
        let third = assert_ok!(lobby.join(p3).await);
        assert_eq!(third.session.id(), 1);
        assert_eq!(third.seat, SeatIndex::Two);
        assert_eq!(lobby.session_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_sessions_are_pruned() {
        let lobby = test_lobby(1);
        let (p1, _rx1) = player(1);
        let placed = assert_ok!(lobby.join(p1).await);

        placed.session.leave(ConnectionId(1)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lobby.session_count().await, 0);

        let (p2, _rx2) = player(2);
        let next = assert_ok!(lobby.join(p2).await);
        assert_eq!(next.session.id(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_connection_is_reported() {
        let lobby = test_lobby(1);
        let (p1, rx1) = player(1);
        drop(rx1);

        let err = lobby.join(p1).await.unwrap_err();
        assert!(matches!(err, LobbyError::Session(SessionError::Unreachable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_every_session() {
        let lobby = test_lobby(4);
        let (p1, mut rx1) = player(1);
        let (p2, mut rx2) = player(2);
        let (p3, mut rx3) = player(3);
        assert_ok!(lobby.join(p1).await);
        assert_ok!(lobby.join(p2).await);
        assert_ok!(lobby.join(p3).await);

        lobby.shutdown().await;

        assert_eq!(lobby.session_count().await, 0);
        for rx in [&mut rx1, &mut rx2, &mut rx3] {
            while rx.recv().await.is_some() {}
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_session_does_not_block_lobby() {
        let lobby = Arc::new(test_lobby(4));
        let (stalled, _commands) = SessionHandle::detached(99);
        lobby.registry.lock().await.sessions.insert(
            99,
            SessionEntry {
                handle: stalled,
                task: tokio::spawn(async {}),
            },
        );

        // This join waits forever on the stalled runner's reply.
        let (p1, _rx1) = player(1);
        let pending = tokio::spawn({
            let lobby = Arc::clone(&lobby);
            async move { lobby.join(p1).await }
        });
        tokio::task::yield_now().await;

        let live = assert_ok!(timeout(Duration::from_millis(100), lobby.session_count()).await);
        assert_eq!(live, 1);
        assert!(!pending.is_finished());

        pending.abort();
    }
}
