//! Connection acceptor — the scene stream's TCP side.
//!
//! LIFECYCLE
//! =========
//! 1. Accept → disable Nagle → assign a `Uuid` → create a bounded queue
//! 2. Spawn the connection task, then register with the node
//! 3. Connection task writes queued frames and watches the read half
//! 4. Write error or peer close → `ClientGone` → node removes the client
//! 5. Node drops the queue sender → connection task exits quietly
//!
//! Projector nodes never send anything meaningful; inbound bytes are read
//! only to notice the peer going away.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::frame::FrameBytes;
use crate::state::{Event, GoneReason};

/// Pause after an accept error that is not tied to a single connection
/// (fd exhaustion, out of memory) so the loop does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Bind the scene listener.
///
/// # Errors
///
/// Returns the bind error; callers log it and keep running without clients.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    info!(%port, "acceptor: scene TCP server listening");
    Ok(listener)
}

/// Accept connections until the node stops.
pub fn spawn_acceptor(listener: TcpListener, events: mpsc::Sender<Event>, queue_depth: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    match accept_backoff(&e) {
                        Some(pause) => {
                            warn!(error = %e, backoff_ms = pause.as_millis(), "acceptor: accept failed");
                            tokio::time::sleep(pause).await;
                        }
                        None => debug!(error = %e, "acceptor: connection dropped during accept"),
                    }
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!(%peer, error = %e, "acceptor: failed to disable Nagle");
            }

            let id = Uuid::new_v4();
            let (tx, rx) = mpsc::channel::<FrameBytes>(queue_depth.max(1));
            spawn_connection(id, stream, rx, events.clone());
            if events.send(Event::ClientConnected { id, peer, tx }).await.is_err() {
                debug!("acceptor: node stopped, no longer accepting");
                break;
            }
        }
    })
}

/// How long to wait before accepting again after `err`.
///
/// Errors that only concern the connection being accepted retry at once.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

/// Drive one connection: drain its queue into the socket and watch for EOF.
fn spawn_connection(id: Uuid, stream: TcpStream, mut rx: mpsc::Receiver<FrameBytes>, events: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let (mut reader, mut writer) = stream.into_split();
        let mut scratch = [0_u8; 512];

        let reason = loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        // Node removed us; nothing to report.
                        return;
                    };
                    if let Err(e) = writer.write_all(&frame).await {
                        break GoneReason::WriteFailed(e.to_string());
                    }
                }
                read = reader.read(&mut scratch) => match read {
                    Ok(0) => break GoneReason::Closed,
                    Ok(_) => {}
                    Err(e) => break GoneReason::ReadFailed(e.to_string()),
                }
            }
        };

        match &reason {
            GoneReason::Closed => info!(%id, "acceptor: projector node disconnected"),
            _ => error!(%id, %reason, "acceptor: connection failed"),
        }
        if events.send(Event::ClientGone { id, reason }).await.is_err() {
            debug!(%id, "acceptor: node stopped before disconnect was reported");
        }
    });
}

#[cfg(test)]
#[path = "acceptor_test.rs"]
mod tests;
