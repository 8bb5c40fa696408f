//! Sync protocol messages and broadcast policy.
//!
//! Each WebSocket text frame carries one JSON object tagged by `type`:
//! ```json
//! { "type": "join_room", "roomId": "abc" }
//! { "type": "history_change", "roomId": "abc", "history": [...], "step": 1 }
//! { "type": "cursor_move", "roomId": "abc", "x": 10.0, "y": 20.0 }
//! ```
//!
//! Every edit carries the sender's whole timeline. The coordinator stores
//! whichever `history_change` it processes last and rebroadcasts it, so two
//! concurrent edits are never merged: the later one replaces the earlier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Timeline;

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join a room and request its current timeline
    JoinRoom { room_id: String },
    /// Submit the whole local timeline after an edit, undo, redo or clear
    HistoryChange {
        room_id: String,
        #[serde(flatten)]
        timeline: Timeline,
    },
    /// Pointer position on the canvas
    CursorMove { room_id: String, x: f64, y: f64 },
}

impl ClientMessage {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(ProtocolError::Decode)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// The room the message is addressed to.
    pub fn room_id(&self) -> &str {
        match self {
            ClientMessage::JoinRoom { room_id }
            | ClientMessage::HistoryChange { room_id, .. }
            | ClientMessage::CursorMove { room_id, .. } => room_id,
        }
    }
}

/// A remote pointer, attributed to its participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorEvent {
    pub x: f64,
    pub y: f64,
    pub connection_id: String,
    pub display_name: String,
    pub display_color: String,
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room timeline sent to a connection that just joined
    LoadInitialData {
        #[serde(flatten)]
        timeline: Timeline,
    },
    /// Room timeline after an accepted `history_change`
    HistoryUpdated {
        #[serde(flatten)]
        timeline: Timeline,
    },
    /// Another participant moved their pointer
    CursorMove(CursorEvent),
}

impl ServerMessage {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(ProtocolError::Decode)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Who receives this message when `sender` triggered it.
    pub fn recipients(&self, sender: &str) -> Recipients {
        match self {
            ServerMessage::LoadInitialData { .. } => Recipients::Only(sender.to_string()),
            ServerMessage::HistoryUpdated { .. } => Recipients::Room { except: None },
            ServerMessage::CursorMove(_) => Recipients::Room {
                except: Some(sender.to_string()),
            },
        }
    }
}

/// Delivery target of an outbound message, relative to one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// A single connection.
    Only(String),
    /// Every member of the room, optionally leaving one connection out.
    Room { except: Option<String> },
}

impl Recipients {
    /// Resolve against the room's current members.
    pub fn resolve<'a>(&'a self, members: &'a [String]) -> Vec<&'a str> {
        match self {
            Recipients::Only(id) => vec![id.as_str()],
            Recipients::Room { except } => members
                .iter()
                .map(String::as_str)
                .filter(|id| except.as_deref() != Some(*id))
                .collect(),
        }
    }
}

/// One outbound message addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: String,
    pub message: ServerMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Snapshot, Stroke, Tool};
    use kurbo::Point;

    #[test]
    fn test_join_room_deserialize() {
        let msg = ClientMessage::from_json(r#"{"type":"join_room","roomId":"abc"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                room_id: "abc".to_string()
            }
        );
        assert_eq!(msg.room_id(), "abc");
    }

    #[test]
    fn test_history_change_deserialize() {
        let json = r##"{
            "type": "history_change",
            "roomId": "abc",
            "history": [
                {"lines": [], "texts": []},
                {"lines": [{"points": [1, 2, 3, 4], "tool": "pen", "color": "#000000"}], "texts": []}
            ],
            "step": 1
        }"##;
        let msg = ClientMessage::from_json(json).unwrap();
        match msg {
            ClientMessage::HistoryChange { room_id, timeline } => {
                assert_eq!(room_id, "abc");
                assert_eq!(timeline.cursor, 1);
                assert_eq!(timeline.len(), 2);
                assert_eq!(
                    timeline.snapshots[1].strokes[0].points,
                    vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]
                );
            }
            other => panic!("Wrong message type: {other:?}"),
        }
    }

    #[test]
    fn test_cursor_move_deserialize() {
        let json = r#"{"type":"cursor_move","roomId":"abc","x":10.5,"y":-3}"#;
        let msg = ClientMessage::from_json(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CursorMove {
                room_id: "abc".to_string(),
                x: 10.5,
                y: -3.0
            }
        );
    }

    #[test]
    fn test_malformed_messages_rejected() {
        assert!(ClientMessage::from_json("not json").is_err());
        assert!(ClientMessage::from_json(r#"{"type":"shout","roomId":"abc"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"cursor_move","x":1,"y":2}"#).is_err());
    }

    #[test]
    fn test_server_timeline_messages_serialize_flat() {
        let mut timeline = Timeline::new();
        timeline.push_edit(|s: &mut Snapshot| {
            s.strokes.push(Stroke::new(Point::new(1.0, 1.0), Tool::Pen, "#000000"))
        });
        let msg = ServerMessage::HistoryUpdated { timeline };

        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "history_updated");
        assert_eq!(json["step"], 1);
        assert_eq!(json["history"].as_array().unwrap().len(), 2);

        let initial = ServerMessage::LoadInitialData {
            timeline: Timeline::new(),
        };
        assert_eq!(
            serde_json::to_value(&initial).unwrap(),
            serde_json::json!({
                "type": "load_initial_data",
                "history": [{ "lines": [], "texts": [] }],
                "step": 0
            })
        );
    }

    #[test]
    fn test_cursor_event_serialize() {
        let msg = ServerMessage::CursorMove(CursorEvent {
            x: 1.0,
            y: 2.0,
            connection_id: "conn-1".to_string(),
            display_name: "Fox".to_string(),
            display_color: "#22C55E".to_string(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "cursor_move",
                "x": 1.0,
                "y": 2.0,
                "connectionId": "conn-1",
                "displayName": "Fox",
                "displayColor": "#22C55E"
            })
        );
        assert_eq!(ServerMessage::from_json(&msg.to_json().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_recipients_policy() {
        let members = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let load = ServerMessage::LoadInitialData {
            timeline: Timeline::new(),
        };
        assert_eq!(load.recipients("b").resolve(&members), vec!["b"]);

        let update = ServerMessage::HistoryUpdated {
            timeline: Timeline::new(),
        };
        assert_eq!(update.recipients("b").resolve(&members), vec!["a", "b", "c"]);

        let cursor = ServerMessage::CursorMove(CursorEvent {
            x: 0.0,
            y: 0.0,
            connection_id: "b".to_string(),
            display_name: "Bear".to_string(),
            display_color: "#EF4444".to_string(),
        });
        assert_eq!(cursor.recipients("b").resolve(&members), vec!["a", "c"]);
    }
}
