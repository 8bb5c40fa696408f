//! Client-side replica of a room.
//!
//! Local gestures are applied optimistically to the replica's own timeline;
//! whenever a gesture completes, the whole timeline is queued as a
//! `history_change` for the transport to send. Server updates replace the
//! local timeline wholesale; a stroke or text edit still in progress is
//! carried over onto the incoming timeline and sent when it ends.

use std::collections::HashMap;

use kurbo::Point;

use crate::model::{Stroke, TextLabel, Timeline, Tool};
use crate::sync::{ClientMessage, CursorEvent, ServerMessage};

/// Pen colors offered by the toolbar.
pub const PEN_COLORS: &[&str] = &["#000000", "#EF4444", "#22C55E", "#3B82F6", "#EAB308"];

/// Tool selected in the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolKind {
    #[default]
    Pen,
    Eraser,
    Text,
}

impl ToolKind {
    fn stroke_tool(self) -> Option<Tool> {
        match self {
            ToolKind::Pen => Some(Tool::Pen),
            ToolKind::Eraser => Some(Tool::Eraser),
            ToolKind::Text => None,
        }
    }
}

/// Keyboard input while a text label is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    /// Confirm the edit.
    Enter,
    /// Leave the edit.
    Escape,
    Other,
}

/// Unsent work that survives a server update.
enum PendingWork {
    Stroke(Stroke),
    Label(TextLabel),
}

/// Local replica of one room's whiteboard.
pub struct ClientReplica {
    room_id: Option<String>,
    timeline: Timeline,
    tool: ToolKind,
    color: String,
    /// A pen or eraser gesture is in progress.
    drawing: bool,
    /// Label currently receiving keystrokes.
    editing: Option<String>,
    cursors: HashMap<String, CursorEvent>,
    outgoing: Vec<ClientMessage>,
}

impl Default for ClientReplica {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientReplica {
    pub fn new() -> Self {
        Self {
            room_id: None,
            timeline: Timeline::new(),
            tool: ToolKind::default(),
            color: PEN_COLORS[0].to_string(),
            drawing: false,
            editing: None,
            cursors: HashMap::new(),
            outgoing: Vec::new(),
        }
    }

    // --- Accessors ---

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Id of the label being edited, if any.
    pub fn editing_label(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// Last known pointer of every other participant, by connection id.
    pub fn remote_cursors(&self) -> &HashMap<String, CursorEvent> {
        &self.cursors
    }

    // --- Room ---

    /// Queue a join request. The timeline arrives as `load_initial_data`.
    pub fn join(&mut self, room_id: &str) {
        self.room_id = Some(room_id.to_string());
        self.outgoing.push(ClientMessage::JoinRoom {
            room_id: room_id.to_string(),
        });
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Apply a message from the server.
    pub fn apply_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::LoadInitialData { timeline } | ServerMessage::HistoryUpdated { timeline } => {
                let pending = self.pending_work();
                self.timeline = timeline;
                match pending {
                    Some(PendingWork::Stroke(stroke)) => {
                        self.timeline.push_edit(|s| s.strokes.push(stroke));
                    }
                    Some(PendingWork::Label(label)) => self.carry_label(label),
                    None => {
                        self.drawing = false;
                        self.editing = None;
                    }
                }
            }
            ServerMessage::CursorMove(event) => {
                self.cursors.insert(event.connection_id.clone(), event);
            }
        }
    }

    /// Copy of the stroke or label the user is still working on.
    fn pending_work(&self) -> Option<PendingWork> {
        let current = self.timeline.current()?;
        if self.drawing {
            return current.strokes.last().cloned().map(PendingWork::Stroke);
        }
        let id = self.editing.as_deref()?;
        current.label(id).cloned().map(PendingWork::Label)
    }

    /// Put an edited label onto a freshly received timeline: in place when
    /// the label is already there, as a new snapshot otherwise.
    fn carry_label(&mut self, label: TextLabel) {
        if let Some(existing) = self.current_label_mut(&label.id) {
            *existing = label;
        } else {
            self.timeline.push_edit(|s| s.labels.push(label));
        }
    }

    // --- Pointer ---

    /// Start a pen or eraser stroke in a new snapshot.
    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if self.editing.is_some() {
            return;
        }
        let Some(tool) = self.tool.stroke_tool() else {
            return;
        };

        let stroke = Stroke::new(Point::new(x, y), tool, self.color.clone());
        self.timeline.push_edit(|s| s.strokes.push(stroke));
        self.drawing = true;
    }

    /// Report the pointer to other participants and grow the active stroke.
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if let Some(room_id) = &self.room_id {
            self.outgoing.push(ClientMessage::CursorMove {
                room_id: room_id.clone(),
                x,
                y,
            });
        }

        if !self.drawing {
            return;
        }
        if let Some(stroke) = self
            .timeline
            .current_mut()
            .and_then(|s| s.strokes.last_mut())
        {
            stroke.add_point(Point::new(x, y));
        }
    }

    /// Finish the active stroke and submit the timeline.
    pub fn pointer_up(&mut self) {
        if self.drawing {
            self.drawing = false;
            self.send_history();
        }
    }

    /// Click on empty canvas. Ends an active text edit; otherwise, with the
    /// text tool, places a new empty label and starts editing it.
    pub fn canvas_click(&mut self, x: f64, y: f64) {
        if self.editing.is_some() {
            self.finish_editing();
            return;
        }
        if self.tool != ToolKind::Text {
            return;
        }

        let label = TextLabel::new(Point::new(x, y), self.color.clone());
        let id = label.id.clone();
        self.timeline.push_edit(|s| s.labels.push(label));
        self.editing = Some(id);
    }

    /// Click on an existing label. Starts editing it when the text tool is
    /// selected.
    pub fn label_click(&mut self, id: &str) {
        if self.editing.is_some() || self.tool != ToolKind::Text {
            return;
        }
        if self.timeline.current().is_some_and(|s| s.label(id).is_some()) {
            self.editing = Some(id.to_string());
        }
    }

    // --- Text editing ---

    /// Feed a key press to the label being edited. Keystrokes stay local
    /// until the edit ends.
    pub fn key(&mut self, key: Key) {
        let Some(id) = self.editing.clone() else {
            return;
        };

        match key {
            Key::Enter | Key::Escape => {
                self.finish_editing();
            }
            Key::Backspace => {
                if let Some(label) = self.current_label_mut(&id) {
                    label.text.pop();
                }
            }
            Key::Char(c) => {
                if let Some(label) = self.current_label_mut(&id) {
                    label.text.push(c);
                }
            }
            Key::Other => {}
        }
    }

    fn current_label_mut(&mut self, id: &str) -> Option<&mut TextLabel> {
        self.timeline.current_mut()?.label_mut(id)
    }

    fn finish_editing(&mut self) {
        if self.editing.take().is_some() {
            self.send_history();
        }
    }

    // --- Toolbar ---

    /// Step back one snapshot. No-op at the first snapshot.
    pub fn undo(&mut self) -> bool {
        if !self.timeline.undo() {
            return false;
        }
        self.editing = None;
        self.send_history();
        true
    }

    /// Step forward one snapshot. No-op at the last snapshot.
    pub fn redo(&mut self) -> bool {
        if !self.timeline.redo() {
            return false;
        }
        self.editing = None;
        self.send_history();
        true
    }

    /// Reset the board and its history to the empty state.
    pub fn clear(&mut self) {
        self.timeline.clear();
        self.editing = None;
        self.drawing = false;
        self.send_history();
    }

    fn send_history(&mut self) {
        if let Some(room_id) = &self.room_id {
            self.outgoing.push(ClientMessage::HistoryChange {
                room_id: room_id.clone(),
                timeline: self.timeline.clone(),
            });
        }
    }
}
