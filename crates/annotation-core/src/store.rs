//! In-memory annotation store scoped to the current playback frame
//!
//! The store exclusively owns the annotation document. It knows nothing about
//! rendering or persistence; the annotator repaints and schedules a flush
//! after every mutating call that reports a change.

use framemark_shared::{Point, Style, Vec2};
use serde::Deserialize;

use crate::document::{
    frame_index, new_id, quantize_time, AnnotationDocument, Drawing, DrawingId, Shape, Snapshot,
    SnapshotId, SnapshotMarker, StillImage,
};
use crate::history::UndoHistory;

/// Partial update applied by `update_drawing`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DrawingPatch {
    pub translate: Option<Vec2>,
    pub resize_to: Option<Point>,
    /// Ignored for kinds without text
    pub text: Option<String>,
    pub style: Option<Style>,
    /// Points a note at a location; ignored for other kinds
    pub target: Option<Point>,
    pub clear_target: bool,
}

impl DrawingPatch {
    pub fn translate(delta: Vec2) -> Self {
        Self {
            translate: Some(delta),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

pub struct AnnotationStore {
    document: AnnotationDocument,
    current_time: f64,
    history: UndoHistory<AnnotationDocument>,
    revision: u64,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new(AnnotationDocument::default())
    }
}

impl AnnotationStore {
    pub fn new(document: AnnotationDocument) -> Self {
        Self {
            history: UndoHistory::new(document.clone()),
            document,
            current_time: 0.0,
            revision: 0,
        }
    }

    /// Loads the host document, falling back to empty on malformed input
    pub fn from_json(json: Option<&str>) -> Self {
        Self::new(json.map(AnnotationDocument::parse_or_empty).unwrap_or_default())
    }

    pub fn document(&self) -> &AnnotationDocument {
        &self.document
    }

    /// Incremented on every applied mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn current_frame(&self) -> i64 {
        frame_index(self.current_time)
    }

    /// Returns whether the displayed frame changed
    pub fn set_current_time(&mut self, time: f64) -> bool {
        let before = self.current_frame();
        self.current_time = time.max(0.0);
        before != self.current_frame()
    }

    pub fn drawing(&self, id: &str) -> Option<&Drawing> {
        self.document.drawing(id)
    }

    pub fn current_drawings(&self) -> impl Iterator<Item = &Drawing> {
        self.document.drawings_at(self.current_frame())
    }

    pub fn add_drawing(&mut self, shape: Shape, style: Style) -> DrawingId {
        let id = new_id();
        log::debug!("Adding {} drawing {}", shape.kind_name(), id);
        self.document.drawings.push(Drawing {
            id: id.clone(),
            time: quantize_time(self.current_time),
            style,
            shape,
        });
        self.record();
        id
    }

    pub fn add_note(
        &mut self,
        anchor: Point,
        text: impl Into<String>,
        target: Option<Point>,
        style: Style,
    ) -> DrawingId {
        self.add_drawing(
            Shape::Note {
                x: anchor.x,
                y: anchor.y,
                text: text.into(),
                target_x: target.map(|t| t.x),
                target_y: target.map(|t| t.y),
            },
            style,
        )
    }

    /// Applies `patch` in place; unknown ids are a silent no-op
    pub fn update_drawing(&mut self, id: &str, patch: &DrawingPatch) -> bool {
        if !self.apply_patch(id, patch) {
            return false;
        }
        self.record();
        true
    }

    /// Moves a drawing without recording an undo step; used while dragging
    pub(crate) fn nudge_drawing(&mut self, id: &str, delta: Vec2) -> bool {
        let changed = self.apply_patch(id, &DrawingPatch::translate(delta));
        if changed {
            self.revision += 1;
        }
        changed
    }

    fn apply_patch(&mut self, id: &str, patch: &DrawingPatch) -> bool {
        let Some(drawing) = self.document.drawing_mut(id) else {
            log::debug!("update_drawing: unknown id {id}");
            return false;
        };

        if let Some(delta) = patch.translate {
            drawing.shape.translate(delta);
        }
        if let Some(to) = patch.resize_to {
            drawing.shape.resize_to(to);
        }
        if let Some(style) = &patch.style {
            drawing.style = style.clone();
        }
        match &mut drawing.shape {
            Shape::Text { text, .. } => {
                if let Some(new_text) = &patch.text {
                    *text = new_text.clone();
                }
            }
            Shape::Note {
                text,
                target_x,
                target_y,
                ..
            } => {
                if let Some(new_text) = &patch.text {
                    *text = new_text.clone();
                }
                if patch.clear_target {
                    *target_x = None;
                    *target_y = None;
                }
                if let Some(target) = patch.target {
                    *target_x = Some(target.x);
                    *target_y = Some(target.y);
                }
            }
            _ => {}
        }
        true
    }

    pub fn delete_drawing(&mut self, id: &str) -> bool {
        let before = self.document.drawings.len();
        self.document.drawings.retain(|d| d.id != id);
        if self.document.drawings.len() == before {
            log::debug!("delete_drawing: unknown id {id}");
            return false;
        }
        self.record();
        true
    }

    /// Removes every drawing on the displayed frame; other frames are untouched
    pub fn clear_current_frame(&mut self) -> usize {
        let frame = self.current_frame();
        let before = self.document.drawings.len();
        self.document.drawings.retain(|d| d.frame() != frame);
        let removed = before - self.document.drawings.len();
        if removed > 0 {
            self.record();
        }
        removed
    }

    pub fn add_snapshot(
        &mut self,
        image: StillImage,
        time: f64,
        markers: Vec<SnapshotMarker>,
    ) -> SnapshotId {
        let id = new_id();
        self.document.snapshots.push(Snapshot {
            id: id.clone(),
            time: quantize_time(time),
            image,
            markers,
        });
        self.record();
        id
    }

    pub fn delete_snapshot(&mut self, id: &str) -> bool {
        let before = self.document.snapshots.len();
        self.document.snapshots.retain(|s| s.id != id);
        if self.document.snapshots.len() == before {
            log::debug!("delete_snapshot: unknown id {id}");
            return false;
        }
        self.record();
        true
    }

    /// Swaps the captured data URL for the stored location after upload
    ///
    /// Undo entries are rewritten too, so stepping through history never
    /// brings the data URL back.
    pub fn set_snapshot_url(&mut self, id: &str, url: impl Into<String>) -> bool {
        let url = url.into();
        let replace = |document: &mut AnnotationDocument| {
            match document.snapshots.iter_mut().find(|s| s.id == id) {
                Some(snapshot) => {
                    snapshot.image.url = url.clone();
                    true
                }
                None => false,
            }
        };
        if !replace(&mut self.document) {
            return false;
        }
        self.history.for_each_mut(|document| {
            replace(document);
        });
        self.revision += 1;
        true
    }

    /// Topmost drawing of the current frame under `point`
    pub fn hit_test(&self, point: Point, tolerance: f64) -> Option<DrawingId> {
        let frame = self.current_frame();
        self.document
            .drawings
            .iter()
            .rev()
            .filter(|d| d.frame() == frame)
            .find(|d| d.shape.hit_test(point, tolerance, d.style.width))
            .map(|d| d.id.clone())
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(document) => {
                self.document = document;
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(document) => {
                self.document = document;
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    /// Records the current document as an undo step
    pub(crate) fn record(&mut self) {
        self.revision += 1;
        self.history.push_snapshot(self.document.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x: f64) -> Shape {
        Shape::Line {
            start: Point::new(x, 0.0),
            end: Point::new(x, 100.0),
        }
    }

    #[test]
    fn test_add_drawing_stamps_quantized_time() {
        let mut store = AnnotationStore::default();
        store.set_current_time(1.033);
        let id = store.add_drawing(line(0.0), Style::default());

        let drawing = store.drawing(&id).unwrap();
        assert!((drawing.time - 31.0 / 30.0).abs() < 1e-12);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_clear_current_frame_is_frame_scoped() {
        let mut store = AnnotationStore::default();
        store.set_current_time(0.5);
        let keep_early = store.add_drawing(line(1.0), Style::default());
        store.set_current_time(2.0);
        store.add_drawing(line(2.0), Style::default());
        store.add_note(Point::new(3.0, 3.0), "here", None, Style::default());
        store.set_current_time(2.01); // same frame after quantization
        store.set_current_time(3.0);
        let keep_late = store.add_drawing(line(3.0), Style::default());

        store.set_current_time(2.01);
        assert_eq!(store.clear_current_frame(), 2);

        let remaining: Vec<_> = store.document().drawings.iter().map(|d| d.id.clone()).collect();
        assert_eq!(remaining, vec![keep_early, keep_late]);
        assert_eq!(store.clear_current_frame(), 0);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut store = AnnotationStore::default();
        store.add_drawing(line(0.0), Style::default());
        let revision = store.revision();

        assert!(!store.update_drawing("missing", &DrawingPatch::text("x")));
        assert!(!store.delete_drawing("missing"));
        assert!(!store.delete_snapshot("missing"));
        assert_eq!(store.revision(), revision);
        assert_eq!(store.document().drawings.len(), 1);
    }

    #[test]
    fn test_update_note_text_and_target() {
        let mut store = AnnotationStore::default();
        let id = store.add_note(Point::new(10.0, 10.0), "draft", None, Style::default());

        let patch = DrawingPatch {
            text: Some("final".to_string()),
            target: Some(Point::new(40.0, 50.0)),
            ..DrawingPatch::default()
        };
        assert!(store.update_drawing(&id, &patch));

        let shape = &store.drawing(&id).unwrap().shape;
        assert_eq!(shape.note_target(), Some(Point::new(40.0, 50.0)));
        assert!(matches!(shape, Shape::Note { text, .. } if text == "final"));
    }

    #[test]
    fn test_hit_test_prefers_topmost_on_current_frame() {
        let mut store = AnnotationStore::default();
        let bottom = store.add_drawing(line(50.0), Style::default());
        let top = store.add_drawing(line(51.0), Style::default());
        assert_eq!(store.hit_test(Point::new(50.5, 50.0), 4.0), Some(top));

        store.set_current_time(5.0);
        assert_eq!(store.hit_test(Point::new(50.5, 50.0), 4.0), None);
        store.set_current_time(0.0);
        let hit = store.hit_test(Point::new(50.5, 50.0), 4.0).unwrap();
        store.delete_drawing(&hit);
        assert_eq!(store.hit_test(Point::new(50.0, 50.0), 4.0), Some(bottom));
    }

    #[test]
    fn test_undo_redo_restores_documents() {
        let mut store = AnnotationStore::default();
        let id = store.add_drawing(line(0.0), Style::default());
        store.delete_drawing(&id);
        assert!(store.document().drawings.is_empty());

        assert!(store.undo());
        assert_eq!(store.document().drawings.len(), 1);
        assert!(store.undo());
        assert!(store.document().drawings.is_empty());
        assert!(!store.undo());
        assert!(store.redo());
        assert_eq!(store.document().drawings[0].id, id);
    }

    #[test]
    fn test_snapshot_lifecycle() {
        let mut store = AnnotationStore::default();
        let image = StillImage {
            url: "data:image/png;base64,AAAA".to_string(),
            width: 640,
            height: 360,
        };
        let id = store.add_snapshot(image, 4.0, Vec::new());
        assert!(store.set_snapshot_url(&id, "https://cdn.example.com/s/1.png"));
        assert_eq!(
            store.document().snapshots[0].image.url,
            "https://cdn.example.com/s/1.png"
        );
        assert!(store.delete_snapshot(&id));
        assert!(store.document().snapshots.is_empty());
    }

    #[test]
    fn test_uploaded_url_survives_undo_and_redo() {
        let mut store = AnnotationStore::default();
        let image = StillImage {
            url: "data:image/png;base64,AAAA".to_string(),
            width: 640,
            height: 360,
        };
        let id = store.add_snapshot(image, 0.0, Vec::new());
        store.add_drawing(line(0.0), Style::default());
        assert!(store.set_snapshot_url(&id, "https://cdn.example.com/s/2.png"));

        assert!(store.undo());
        assert!(store.document().drawings.is_empty());
        assert_eq!(
            store.document().snapshots[0].image.url,
            "https://cdn.example.com/s/2.png"
        );
        assert!(store.redo());
        assert_eq!(
            store.document().snapshots[0].image.url,
            "https://cdn.example.com/s/2.png"
        );
    }
}
