//! The coordinator task.
//!
//! All socket tasks push their events into one ordered queue. A single task
//! drains it and owns the [`RoomCoordinator`] together with the outbound
//! channel of every live connection, so room state is never touched
//! concurrently.

use std::collections::HashMap;

use inkroom_core::{
    ClientMessage, HistoryStore, MemoryHistoryStore, MemoryPresenceRegistry, PresenceRegistry,
    RoomCoordinator, ServerMessage,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Events fed to the coordinator task.
#[derive(Debug)]
pub enum HubEvent {
    /// A socket was accepted.
    Connect {
        connection_id: String,
        tx: mpsc::UnboundedSender<ServerMessage>,
    },
    /// A decoded message from a connection.
    Message {
        from: String,
        message: ClientMessage,
    },
    /// The socket closed or failed.
    Disconnect { connection_id: String },
}

/// Sending half of the coordinator queue, cloned into every socket task.
pub type HubTx = mpsc::UnboundedSender<HubEvent>;

/// Coordinator state plus the outbound channel of each connection.
pub struct Hub<H = MemoryHistoryStore, P = MemoryPresenceRegistry> {
    coordinator: RoomCoordinator<H, P>,
    connections: HashMap<String, mpsc::UnboundedSender<ServerMessage>>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(RoomCoordinator::default())
    }
}

impl<H, P> Hub<H, P>
where
    H: HistoryStore + 'static,
    P: PresenceRegistry + 'static,
{
    pub fn new(coordinator: RoomCoordinator<H, P>) -> Self {
        Self {
            coordinator,
            connections: HashMap::new(),
        }
    }

    pub fn coordinator(&self) -> &RoomCoordinator<H, P> {
        &self.coordinator
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Process one event and push the resulting deliveries.
    pub fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connect { connection_id, tx } => {
                info!("New connection: {}", connection_id);
                self.connections.insert(connection_id, tx);
            }
            HubEvent::Message { from, message } => {
                debug!("Message from {} for room {}", from, message.room_id());
                for delivery in self.coordinator.handle_message(&from, message) {
                    self.send(&delivery.to, delivery.message);
                }
            }
            HubEvent::Disconnect { connection_id } => {
                self.coordinator.disconnect(&connection_id);
                self.connections.remove(&connection_id);
                info!("Connection closed: {}", connection_id);
            }
        }
    }

    /// Fire-and-forget delivery. Closed or unknown connections are skipped.
    fn send(&self, to: &str, message: ServerMessage) {
        match self.connections.get(to) {
            Some(tx) => {
                if tx.send(message).is_err() {
                    debug!("Dropping message for closed connection {}", to);
                }
            }
            None => debug!("Dropping message for unknown connection {}", to),
        }
    }

    /// Drain the queue until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HubEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        info!("Coordinator queue closed");
    }

    /// Start the coordinator task and return its queue.
    pub fn spawn(self) -> HubTx {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(rx));
        tx
    }
}
