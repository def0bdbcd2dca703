//! Snapshot markers
//!
//! A snapshot stores the composited still plus one marker per visible
//! drawing, positioned in [0, 1] of the media size so markers survive any
//! rescaling of the stored image.

use framemark_shared::Size;

use crate::document::{Drawing, SnapshotMarker};

pub fn snapshot_markers<'a>(
    drawings: impl IntoIterator<Item = &'a Drawing>,
    media: Size,
) -> Vec<SnapshotMarker> {
    if media.is_empty() {
        return Vec::new();
    }
    drawings
        .into_iter()
        .map(|drawing| {
            let anchor = drawing.shape.anchor();
            SnapshotMarker {
                drawing_id: drawing.id.clone(),
                kind: drawing.shape.kind_name().to_string(),
                x: (anchor.x / media.width).clamp(0.0, 1.0),
                y: (anchor.y / media.height).clamp(0.0, 1.0),
            }
        })
        .collect()
}
