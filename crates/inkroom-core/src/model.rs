//! Whiteboard data model: strokes, text labels, snapshots and the timeline.
//!
//! Field names on the wire follow the browser canvas client: a snapshot is
//! `{ "lines": [...], "texts": [...] }`, stroke points are a flat
//! `[x0, y0, x1, y1, ...]` array and a timeline is `{ "history", "step" }`.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Font size given to newly placed text labels.
pub const DEFAULT_FONT_SIZE: f64 = 24.0;

/// Drawing tool a stroke was made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    /// Renders as a clearing brush on the client.
    Eraser,
}

/// A freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Points in drawing order. Grows while the gesture is in progress.
    #[serde(with = "flat_points")]
    pub points: Vec<Point>,
    pub tool: Tool,
    pub color: String,
}

impl Stroke {
    /// Start a stroke at a single point.
    pub fn new(start: Point, tool: Tool, color: impl Into<String>) -> Self {
        Self {
            points: vec![start],
            tool,
            color: color.into(),
        }
    }

    /// Append a point to the stroke.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A text label placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLabel {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub color: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

impl TextLabel {
    /// Create an empty label with a fresh random id.
    pub fn new(position: Point, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            x: position.x,
            y: position.y,
            text: String::new(),
            color: color.into(),
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// One full whiteboard state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "lines", default)]
    pub strokes: Vec<Stroke>,
    #[serde(rename = "texts", default)]
    pub labels: Vec<TextLabel>,
}

impl Snapshot {
    /// The cleared board.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.labels.is_empty()
    }

    pub fn label(&self, id: &str) -> Option<&TextLabel> {
        self.labels.iter().find(|l| l.id == id)
    }

    pub fn label_mut(&mut self, id: &str) -> Option<&mut TextLabel> {
        self.labels.iter_mut().find(|l| l.id == id)
    }
}

/// Linear history of snapshots with a cursor marking the current one.
///
/// `snapshots[0]` is the cleared board. Undo and redo only move the cursor;
/// a new edit drops everything after the cursor before appending.
///
/// The cursor is kept as a signed integer because timelines submitted by
/// clients are stored verbatim, out-of-range values included. Readers go
/// through [`Timeline::current`], which clamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(rename = "history")]
    pub snapshots: Vec<Snapshot>,
    #[serde(rename = "step")]
    pub cursor: i64,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    /// A timeline holding only the empty board.
    pub fn new() -> Self {
        Self {
            snapshots: vec![Snapshot::empty()],
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Whether the cursor points at an existing snapshot.
    pub fn cursor_in_bounds(&self) -> bool {
        self.cursor >= 0 && (self.cursor as usize) < self.snapshots.len()
    }

    /// Cursor clamped into `0..len`. Returns 0 for an empty timeline.
    pub fn clamped_cursor(&self) -> usize {
        let last = self.snapshots.len().saturating_sub(1);
        if self.cursor < 0 {
            0
        } else {
            (self.cursor as usize).min(last)
        }
    }

    /// The snapshot under the (clamped) cursor.
    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.clamped_cursor())
    }

    pub fn current_mut(&mut self) -> Option<&mut Snapshot> {
        let index = self.clamped_cursor();
        self.snapshots.get_mut(index)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.saturating_add(1) < self.snapshots.len() as i64
    }

    /// Step the cursor back. Returns false at the first snapshot.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor = self.clamped_cursor() as i64 - 1;
        true
    }

    /// Step the cursor forward. Returns false at the last snapshot.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor = self.clamped_cursor() as i64 + 1;
        true
    }

    /// Record a new edit: copy the current snapshot, apply `edit` to the
    /// copy, drop the redo branch and append the result as the new current.
    pub fn push_edit(&mut self, edit: impl FnOnce(&mut Snapshot)) {
        if self.snapshots.is_empty() {
            *self = Self::new();
        }
        let keep = self.clamped_cursor() + 1;
        self.snapshots.truncate(keep);

        let mut next = self.snapshots[keep - 1].clone();
        edit(&mut next);
        self.snapshots.push(next);
        self.cursor = (self.snapshots.len() - 1) as i64;
    }

    /// Reset to the empty board, discarding all history.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Serde adapter for the flat `[x0, y0, x1, y1, ...]` point encoding.
mod flat_points {
    use kurbo::Point;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(points: &[Point], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(points.len() * 2))?;
        for point in points {
            seq.serialize_element(&point.x)?;
            seq.serialize_element(&point.y)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Point>, D::Error> {
        let coords = Vec::<f64>::deserialize(deserializer)?;
        if coords.len() % 2 != 0 {
            log::debug!("Dropping dangling coordinate in {}-value point list", coords.len());
        }
        Ok(coords
            .chunks_exact(2)
            .map(|pair| Point::new(pair[0], pair[1]))
            .collect())
    }
}
