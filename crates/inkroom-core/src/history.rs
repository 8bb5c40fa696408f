//! Per-room timeline storage.

use std::collections::HashMap;

use crate::model::Timeline;

/// Store holding the authoritative timeline of every room.
///
/// Implementations are owned by a single coordinator and never accessed
/// concurrently, so methods take `&mut self` instead of locking.
pub trait HistoryStore: Send {
    /// Current timeline of a room. An unknown room is created holding only
    /// the empty board.
    fn get(&mut self, room_id: &str) -> Timeline;

    /// Overwrite the room's timeline with `timeline` and return what is now
    /// stored. The timeline is not validated.
    fn replace(&mut self, room_id: &str, timeline: Timeline) -> Timeline;

    /// Whether the room has been created.
    fn contains(&self, room_id: &str) -> bool;

    /// Number of rooms created so far.
    fn room_count(&self) -> usize;
}

/// In-memory history store. Rooms live until the process exits.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    rooms: HashMap<String, Timeline>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn get(&mut self, room_id: &str) -> Timeline {
        if let Some(timeline) = self.rooms.get(room_id) {
            return timeline.clone();
        }
        let timeline = Timeline::new();
        self.rooms.insert(room_id.to_string(), timeline.clone());
        log::info!("Creating room {} ({} rooms)", room_id, self.room_count());
        timeline
    }

    fn replace(&mut self, room_id: &str, timeline: Timeline) -> Timeline {
        if !timeline.cursor_in_bounds() {
            log::debug!(
                "Storing out-of-range step {} for room {} ({} snapshots)",
                timeline.cursor,
                room_id,
                timeline.len()
            );
        }
        self.rooms.insert(room_id.to_string(), timeline.clone());
        timeline
    }

    fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
