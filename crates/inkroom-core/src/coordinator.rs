//! Room coordinator: routes inbound events to rooms and decides who hears
//! about the result.
//!
//! The coordinator is a plain state machine. It never performs I/O; every
//! transition returns the [`Delivery`] list the transport has to send.
//! Callers must feed it events one at a time in arrival order.

use std::collections::HashMap;

use crate::history::{HistoryStore, MemoryHistoryStore};
use crate::model::Timeline;
use crate::presence::{MemoryPresenceRegistry, PresenceRegistry};
use crate::sync::{ClientMessage, CursorEvent, Delivery, ServerMessage};

/// Owns all room state of one process.
pub struct RoomCoordinator<H = MemoryHistoryStore, P = MemoryPresenceRegistry> {
    history: H,
    presence: P,
    /// Connections joined to each room, in join order.
    members: HashMap<String, Vec<String>>,
    /// Room each joined connection belongs to.
    joined: HashMap<String, String>,
}

impl Default for RoomCoordinator {
    fn default() -> Self {
        Self::new(MemoryHistoryStore::new(), MemoryPresenceRegistry::new())
    }
}

impl<H: HistoryStore, P: PresenceRegistry> RoomCoordinator<H, P> {
    pub fn new(history: H, presence: P) -> Self {
        Self {
            history,
            presence,
            members: HashMap::new(),
            joined: HashMap::new(),
        }
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn presence(&self) -> &P {
        &self.presence
    }

    /// Room the connection is joined to, if any.
    pub fn room_of(&self, connection_id: &str) -> Option<&str> {
        self.joined.get(connection_id).map(String::as_str)
    }

    /// Connections currently joined to the room.
    pub fn members(&self, room_id: &str) -> &[String] {
        self.members.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dispatch one inbound message from `from`.
    pub fn handle_message(&mut self, from: &str, message: ClientMessage) -> Vec<Delivery> {
        match message {
            ClientMessage::JoinRoom { room_id } => self.join(from, &room_id),
            ClientMessage::HistoryChange { room_id, timeline } => {
                self.history_change(from, &room_id, timeline)
            }
            ClientMessage::CursorMove { room_id, x, y } => self.cursor_move(from, &room_id, x, y),
        }
    }

    /// Join a room, creating it on first use, and hand the joiner the
    /// current timeline. Other members are not notified.
    ///
    /// A connection belongs to at most one room: joining a different room
    /// moves it out of the previous one first.
    pub fn join(&mut self, connection_id: &str, room_id: &str) -> Vec<Delivery> {
        if let Some(previous) = self.joined.get(connection_id).cloned() {
            if previous != room_id {
                log::info!(
                    "Connection {} moving from room {} to {}",
                    connection_id,
                    previous,
                    room_id
                );
                self.leave(connection_id, &previous);
            }
        }

        let timeline = self.history.get(room_id);
        let participant = self.presence.register(room_id, connection_id);

        let members = self.members.entry(room_id.to_string()).or_default();
        if !members.iter().any(|id| id == connection_id) {
            members.push(connection_id.to_string());
        }
        self.joined
            .insert(connection_id.to_string(), room_id.to_string());

        log::info!(
            "Connection {} joined room {} as {} ({} members)",
            connection_id,
            room_id,
            participant.display_name,
            self.presence.participants(room_id).len()
        );

        self.deliver(
            room_id,
            connection_id,
            ServerMessage::LoadInitialData { timeline },
        )
    }

    /// Replace the room's timeline with the submitted one and broadcast it
    /// to every member, the sender included. Unknown rooms are ignored.
    pub fn history_change(
        &mut self,
        connection_id: &str,
        room_id: &str,
        timeline: Timeline,
    ) -> Vec<Delivery> {
        if !self.history.contains(room_id) {
            log::debug!(
                "Dropping history change from {} for unknown room {}",
                connection_id,
                room_id
            );
            return Vec::new();
        }

        let timeline = self.history.replace(room_id, timeline);
        self.deliver(
            room_id,
            connection_id,
            ServerMessage::HistoryUpdated { timeline },
        )
    }

    /// Forward a pointer position to the other members of the room.
    /// Dropped when the sender has no participant entry in that room.
    pub fn cursor_move(&mut self, connection_id: &str, room_id: &str, x: f64, y: f64) -> Vec<Delivery> {
        let Some(participant) = self.presence.lookup(room_id, connection_id) else {
            log::debug!(
                "Dropping cursor from unregistered connection {} in room {}",
                connection_id,
                room_id
            );
            return Vec::new();
        };

        let event = CursorEvent {
            x,
            y,
            connection_id: participant.connection_id.clone(),
            display_name: participant.display_name.clone(),
            display_color: participant.display_color.clone(),
        };
        self.deliver(room_id, connection_id, ServerMessage::CursorMove(event))
    }

    /// Forget the connection. Room history is kept and nobody is notified.
    pub fn disconnect(&mut self, connection_id: &str) {
        if let Some(room_id) = self.joined.get(connection_id).cloned() {
            self.leave(connection_id, &room_id);
            log::info!("Connection {} left room {}", connection_id, room_id);
        }
    }

    fn leave(&mut self, connection_id: &str, room_id: &str) {
        self.presence.unregister(room_id, connection_id);
        if let Some(members) = self.members.get_mut(room_id) {
            members.retain(|id| id != connection_id);
            if members.is_empty() {
                self.members.remove(room_id);
            }
        }
        self.joined.remove(connection_id);
    }

    fn deliver(&self, room_id: &str, sender: &str, message: ServerMessage) -> Vec<Delivery> {
        let recipients = message.recipients(sender);
        recipients
            .resolve(self.members(room_id))
            .into_iter()
            .map(|to| Delivery {
                to: to.to_string(),
                message: message.clone(),
            })
            .collect()
    }
}
