//! Per-room display identities used to attribute remote cursors.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Names handed out to participants.
pub const PARTICIPANT_NAMES: &[&str] = &[
    "Lion", "Tiger", "Bear", "Wolf", "Fox", "Eagle", "Shark", "Panther",
];

/// Colors handed out to participants.
pub const PARTICIPANT_COLORS: &[&str] = &[
    "#EF4444", "#F97316", "#EAB308", "#22C55E", "#3B82F6", "#8B5CF6", "#EC4899",
];

/// Ephemeral identity of one connection inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: String,
    pub display_name: String,
    pub display_color: String,
}

/// Registry of participants per room.
pub trait PresenceRegistry: Send {
    /// Assign a display identity to the connection. Registering again
    /// replaces the previous identity.
    fn register(&mut self, room_id: &str, connection_id: &str) -> Participant;

    /// Forget the connection. No-op when it is not registered.
    fn unregister(&mut self, room_id: &str, connection_id: &str);

    fn lookup(&self, room_id: &str, connection_id: &str) -> Option<&Participant>;

    /// All participants of a room, in no particular order.
    fn participants(&self, room_id: &str) -> Vec<Participant>;
}

/// In-memory presence registry drawing names and colors at random, with
/// replacement. Two participants may end up with the same name and color.
pub struct MemoryPresenceRegistry<R = StdRng> {
    rooms: HashMap<String, HashMap<String, Participant>>,
    rng: R,
}

impl MemoryPresenceRegistry<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for MemoryPresenceRegistry<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> MemoryPresenceRegistry<R> {
    /// Create a registry using the given random source.
    pub fn with_rng(rng: R) -> Self {
        Self {
            rooms: HashMap::new(),
            rng,
        }
    }

    fn pick<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

impl<R: Rng + Send> PresenceRegistry for MemoryPresenceRegistry<R> {
    fn register(&mut self, room_id: &str, connection_id: &str) -> Participant {
        let participant = Participant {
            connection_id: connection_id.to_string(),
            display_name: self.pick(PARTICIPANT_NAMES).to_string(),
            display_color: self.pick(PARTICIPANT_COLORS).to_string(),
        };
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string(), participant.clone());
        participant
    }

    fn unregister(&mut self, room_id: &str, connection_id: &str) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.remove(connection_id);
            if room.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }

    fn lookup(&self, room_id: &str, connection_id: &str) -> Option<&Participant> {
        self.rooms.get(room_id)?.get(connection_id)
    }

    fn participants(&self, room_id: &str) -> Vec<Participant> {
        self.rooms
            .get(room_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }
}
