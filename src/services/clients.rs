//! Client registry — the set of connected projector sockets.
//!
//! DESIGN
//! ======
//! Each connection is keyed by a `Uuid` assigned at accept time and owns a
//! bounded outbound queue drained by its writer task. The registry never
//! touches sockets directly; it only offers shared frame buffers to queues.
//!
//! - Full queue: the frame is dropped for that client only.
//! - Closed queue: the writer task is gone, so the client is removed.
//!
//! Removal is idempotent so a client reported gone by both its writer and
//! a failed offer is only counted once.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::frame::FrameBytes;

/// One connected projector node.
pub struct ClientHandle {
    pub peer: SocketAddr,
    tx: mpsc::Sender<FrameBytes>,
    /// Frames dropped because this client's queue was full.
    pub dropped: u64,
}

/// Result of offering one frame to every client.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub queued: usize,
    pub dropped: usize,
    pub removed: Vec<Uuid>,
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<Uuid, ClientHandle>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: Uuid, peer: SocketAddr, tx: mpsc::Sender<FrameBytes>) {
        self.clients.insert(id, ClientHandle { peer, tx, dropped: 0 });
        info!(%id, %peer, clients = self.clients.len(), "clients: projector node connected");
    }

    /// Remove a client. Returns `false` if it was already gone.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let Some(handle) = self.clients.remove(&id) else {
            return false;
        };
        info!(%id, peer = %handle.peer, dropped = handle.dropped, clients = self.clients.len(), "clients: projector node removed");
        true
    }

    #[cfg(test)]
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.clients.contains_key(&id)
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&ClientHandle> {
        self.clients.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Offer one frame to every client queue without waiting.
    pub fn broadcast(&mut self, frame: &FrameBytes) -> Delivery {
        let mut delivery = Delivery::default();
        for (id, handle) in &mut self.clients {
            match handle.tx.try_send(FrameBytes::clone(frame)) {
                Ok(()) => delivery.queued += 1,
                Err(TrySendError::Full(_)) => {
                    handle.dropped += 1;
                    delivery.dropped += 1;
                    debug!(%id, dropped = handle.dropped, "clients: queue full, frame dropped");
                }
                Err(TrySendError::Closed(_)) => delivery.removed.push(*id),
            }
        }
        for id in &delivery.removed {
            self.remove(*id);
        }
        delivery
    }
}

#[cfg(test)]
#[path = "clients_test.rs"]
mod tests;
