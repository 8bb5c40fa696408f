//! InkRoom Core Library
//!
//! Room-scoped state synchronization for the InkRoom shared whiteboard:
//! the snapshot timeline model, per-room history and presence stores, the
//! sync protocol messages, the room coordinator and the client replica.

pub mod coordinator;
pub mod history;
pub mod model;
pub mod presence;
pub mod replica;
pub mod sync;

pub use coordinator::RoomCoordinator;
pub use history::{HistoryStore, MemoryHistoryStore};
pub use kurbo::Point;
pub use model::{Snapshot, Stroke, TextLabel, Timeline, Tool};
pub use presence::{MemoryPresenceRegistry, Participant, PresenceRegistry};
pub use replica::{ClientReplica, Key, ToolKind};
pub use sync::{ClientMessage, CursorEvent, Delivery, ProtocolError, Recipients, ServerMessage};
