//! WebSocket transport feeding the lobby and session runners

use crate::config::ServerConfig;
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::lobby::Lobby;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ClientMessage;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::interval;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Accepts WebSocket connections and hands each one to the lobby
pub struct Server {
    listener: TcpListener,
    lobby: Arc<Lobby>,
    outbound_buffer: usize,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            lobby: Arc::new(Lobby::new(config.max_sessions, config.session)),
            outbound_buffer: config.outbound_buffer,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until `shutdown` completes, then closes every session
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        let mut next_id: u64 = 0;
        let mut status = interval(Duration::from_secs(30));

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            next_id += 1;
                            let id = ConnectionId(next_id);
                            let lobby = Arc::clone(&self.lobby);
                            let outbound_buffer = self.outbound_buffer;

                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(stream, peer, id, lobby, outbound_buffer).await
                                {
                                    debug!("{} from {} ended with error: {}", id, peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                _ = status.tick() => {
                    let live = self.lobby.session_count().await;
                    debug!("{} live sessions", live);
                }

                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        self.lobby.shutdown().await;
    }
}

/// Drives one client from handshake to disconnect
///
/// Outbound messages are written by a separate task that drains the
/// connection's queue, so a slow socket never blocks the session runner. The
/// queue's only senders live in the session, which means the writer finishes
/// on its own once the player has been removed or the session has ended.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    lobby: Arc<Lobby>,
    outbound_buffer: usize,
) -> Result<(), WsError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", peer, e);
    }

    let ws = accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    let (conn, mut outbound) = ConnectionHandle::channel(id, outbound_buffer);
    let joined = lobby.join(conn).await;
    let placement = match joined {
        Ok(placement) => placement,
        Err(e) => {
            warn!("Rejecting {} from {}: {}", id, peer, e);
            write
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Again,
                    reason: e.to_string().into(),
                })))
                .await?;
            return Ok(());
        }
    };

    info!(
        "{} from {} playing in session {} as player {}",
        id,
        peer,
        placement.session.id(),
        placement.seat.number()
    );

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", id, e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(text)).await {
                debug!("Write to {} failed: {}", id, e);
                return;
            }
        }
        let _ = write.close().await;
    });

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientMessage::parse(&text) {
                Some(ClientMessage::Move { direction }) => {
                    placement.session.input(id, direction);
                }
                None => warn!("Ignoring malformed message from {}: {:?}", id, text),
            },
            Ok(Message::Close(_)) => break,
            // Pings are answered by tungstenite itself.
            Ok(_) => {}
            Err(e) => {
                debug!("Read from {} failed: {}", id, e);
                break;
            }
        }
    }

    placement.session.leave(id).await;
    info!("{} from {} disconnected", id, peer);

    if let Err(e) = writer.await {
        debug!("Writer for {} ended abnormally: {}", id, e);
    }
    Ok(())
}
