//! DOM overlay reconciliation and seek-bar markers
//!
//! Text and note drawings are editable DOM elements stacked above the
//! canvas. Each repaint computes the wanted set of elements and the
//! reconciler turns it into the minimal create/update/remove operations.

use std::collections::HashMap;

use framemark_shared::{Rect, Size};
use serde::Serialize;

use crate::document::{Drawing, DrawingId, Shape, Snapshot, SnapshotId};
use crate::transform::Transform;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayKind {
    Text,
    Note,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayElement {
    pub id: DrawingId,
    pub kind: OverlayKind,
    /// Offset inside the overlay layer before its CSS transform
    pub left: f64,
    pub top: f64,
    pub text: String,
    pub color: String,
    pub editable: bool,
    pub selected: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum OverlayOp {
    Create { element: OverlayElement },
    Update { element: OverlayElement },
    Remove { id: DrawingId },
    Focus { id: DrawingId },
}

/// Overlay elements for the text and note drawings among `drawings`
pub fn overlay_elements<'a>(
    drawings: impl IntoIterator<Item = &'a Drawing>,
    natural: Size,
    displayed: Size,
    selected: Option<&str>,
    editable: bool,
) -> Vec<OverlayElement> {
    let fit_x = displayed.width / natural.width;
    let fit_y = displayed.height / natural.height;

    drawings
        .into_iter()
        .filter_map(|drawing| {
            let (kind, x, y, text) = match &drawing.shape {
                Shape::Text { x, y, text } => (OverlayKind::Text, *x, *y, text),
                Shape::Note { x, y, text, .. } => (OverlayKind::Note, *x, *y, text),
                _ => return None,
            };
            Some(OverlayElement {
                id: drawing.id.clone(),
                kind,
                left: x * fit_x,
                top: y * fit_y,
                text: text.clone(),
                color: drawing.style.color.clone(),
                editable,
                selected: selected == Some(drawing.id.as_str()),
            })
        })
        .collect()
}

/// Viewport boxes of overlay text, used to route pointer events
pub fn overlay_regions<'a>(
    drawings: impl IntoIterator<Item = &'a Drawing>,
    transform: &Transform,
) -> Vec<Rect> {
    drawings
        .into_iter()
        .filter_map(|drawing| drawing.shape.label_box())
        .map(|rect| {
            Rect::from_corners(
                transform.to_viewport_coords(rect.min),
                transform.to_viewport_coords(rect.max),
            )
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct OverlayReconciler {
    current: HashMap<DrawingId, OverlayElement>,
}

impl OverlayReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Forgets all elements so the next pass recreates them
    pub fn reset(&mut self) {
        self.current.clear();
    }

    pub fn reconcile(&mut self, wanted: Vec<OverlayElement>, focus: Option<&str>) -> Vec<OverlayOp> {
        let mut ops = Vec::new();
        let mut next = HashMap::with_capacity(wanted.len());

        let mut stale: Vec<_> = self
            .current
            .keys()
            .filter(|id| !wanted.iter().any(|e| &e.id == *id))
            .cloned()
            .collect();
        stale.sort();
        ops.extend(stale.into_iter().map(|id| OverlayOp::Remove { id }));

        for element in wanted {
            match self.current.get(&element.id) {
                None => ops.push(OverlayOp::Create {
                    element: element.clone(),
                }),
                Some(previous) if *previous != element => ops.push(OverlayOp::Update {
                    element: element.clone(),
                }),
                Some(_) => {}
            }
            next.insert(element.id.clone(), element);
        }

        if let Some(id) = focus.filter(|id| next.contains_key(*id)) {
            ops.push(OverlayOp::Focus { id: id.to_string() });
        }

        self.current = next;
        ops
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekMarker {
    pub id: SnapshotId,
    pub time: f64,
    /// Position along the seek bar, 0-100
    pub offset_percent: f64,
}

pub fn seek_markers(snapshots: &[Snapshot], duration: f64) -> Vec<SeekMarker> {
    snapshots
        .iter()
        .map(|snapshot| {
            let offset_percent = if duration.is_finite() && duration > 0.0 {
                (snapshot.time / duration * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            };
            SeekMarker {
                id: snapshot.id.clone(),
                time: snapshot.time,
                offset_percent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StillImage;
    use framemark_shared::{Point, Style};

    fn text(id: &str, x: f64, body: &str) -> Drawing {
        Drawing {
            id: id.to_string(),
            time: 0.0,
            style: Style::default(),
            shape: Shape::Text {
                x,
                y: 20.0,
                text: body.to_string(),
            },
        }
    }

    fn elements(drawings: &[Drawing]) -> Vec<OverlayElement> {
        overlay_elements(
            drawings,
            Size::new(1920.0, 1080.0),
            Size::new(960.0, 540.0),
            None,
            true,
        )
    }

    #[test]
    fn test_elements_are_scaled_to_layout_space() {
        let drawings = vec![text("a", 100.0, "hello")];
        let wanted = elements(&drawings);
        assert_eq!(wanted[0].left, 50.0);
        assert_eq!(wanted[0].top, 10.0);
        assert_eq!(wanted[0].kind, OverlayKind::Text);
    }

    #[test]
    fn test_reconcile_emits_minimal_ops() {
        let mut reconciler = OverlayReconciler::new();
        let first = vec![text("a", 0.0, "one"), text("b", 10.0, "two")];
        let ops = reconciler.reconcile(elements(&first), None);
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| matches!(op, OverlayOp::Create { .. })));

        // Unchanged pass is silent
        assert!(reconciler.reconcile(elements(&first), None).is_empty());

        let second = vec![text("b", 10.0, "changed"), text("c", 30.0, "three")];
        let ops = reconciler.reconcile(elements(&second), Some("c"));
        assert_eq!(ops[0], OverlayOp::Remove { id: "a".to_string() });
        assert!(matches!(&ops[1], OverlayOp::Update { element } if element.text == "changed"));
        assert!(matches!(&ops[2], OverlayOp::Create { element } if element.id == "c"));
        assert_eq!(ops[3], OverlayOp::Focus { id: "c".to_string() });
        assert_eq!(reconciler.len(), 2);
    }

    #[test]
    fn test_reset_recreates_elements() {
        let mut reconciler = OverlayReconciler::new();
        let drawings = vec![text("a", 0.0, "one")];
        reconciler.reconcile(elements(&drawings), None);
        reconciler.reset();
        let ops = reconciler.reconcile(elements(&drawings), None);
        assert!(matches!(&ops[0], OverlayOp::Create { .. }));
    }

    #[test]
    fn test_seek_marker_offsets() {
        let snapshot = |id: &str, time: f64| Snapshot {
            id: id.to_string(),
            time,
            image: StillImage {
                url: String::new(),
                width: 1,
                height: 1,
            },
            markers: Vec::new(),
        };
        let snapshots = vec![snapshot("s1", 5.0), snapshot("s2", 30.0)];
        let markers = seek_markers(&snapshots, 20.0);
        assert_eq!(markers[0].offset_percent, 25.0);
        assert_eq!(markers[1].offset_percent, 100.0);
        assert_eq!(seek_markers(&snapshots, f64::NAN)[0].offset_percent, 0.0);
    }

    #[test]
    fn test_overlay_regions_follow_transform() {
        let mut transform = Transform::new(framemark_config::ZoomSettings::default());
        transform.set_media_sizes(Size::new(200.0, 100.0), Size::new(100.0, 50.0));
        let drawings = vec![text("a", 40.0, "ab")];
        let regions = overlay_regions(&drawings, &transform);
        assert_eq!(regions[0].min, Point::new(20.0, 10.0));
    }
}
