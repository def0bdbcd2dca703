//! Annotation document model
//!
//! The document is the JSON blob persisted per video: an ordered list of
//! drawings (insertion order is z-order) and an ordered list of snapshots.
//! Text and note entries live in the drawing list, distinguished by `kind`.

use framemark_config::FRAME_RATE;
use framemark_shared::{Point, Style};
use serde::{Deserialize, Serialize};

pub type DrawingId = String;
pub type SnapshotId = String;

/// Rounds a playback time to the nearest 1/30 s tick
pub fn quantize_time(time: f64) -> f64 {
    frame_index(time) as f64 / FRAME_RATE
}

/// Integer frame number of a playback time; frame equality is decided here
/// rather than by comparing floats
pub fn frame_index(time: f64) -> i64 {
    (time * FRAME_RATE).round() as i64
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Geometry of a drawing, tagged by tool kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Shape {
    Freehand {
        points: Vec<Point>,
    },
    Line {
        start: Point,
        end: Point,
    },
    Rectangle {
        start: Point,
        end: Point,
    },
    Ellipse {
        center: Point,
        #[serde(rename = "radiusX")]
        radius_x: f64,
        #[serde(rename = "radiusY")]
        radius_y: f64,
    },
    Arrow {
        start: Point,
        end: Point,
    },
    Curve {
        start: Point,
        control: Point,
        end: Point,
    },
    Angle {
        vertex: Point,
        control: Point,
        end: Point,
        /// Degrees in [0, 360)
        clockwise: f64,
        /// Degrees in [0, 360)
        #[serde(rename = "counterClockwise")]
        counter_clockwise: f64,
    },
    Crosshair {
        center: Point,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
    },
    Note {
        x: f64,
        y: f64,
        text: String,
        #[serde(rename = "targetX", default, skip_serializing_if = "Option::is_none")]
        target_x: Option<f64>,
        #[serde(rename = "targetY", default, skip_serializing_if = "Option::is_none")]
        target_y: Option<f64>,
    },
}

impl Shape {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Freehand { .. } => "freehand",
            Shape::Line { .. } => "line",
            Shape::Rectangle { .. } => "rectangle",
            Shape::Ellipse { .. } => "ellipse",
            Shape::Arrow { .. } => "arrow",
            Shape::Curve { .. } => "curve",
            Shape::Angle { .. } => "angle",
            Shape::Crosshair { .. } => "crosshair",
            Shape::Text { .. } => "text",
            Shape::Note { .. } => "note",
        }
    }

    /// Text and note drawings are rendered as DOM overlays
    pub fn is_overlay(&self) -> bool {
        matches!(self, Shape::Text { .. } | Shape::Note { .. })
    }

    pub fn note_target(&self) -> Option<Point> {
        match self {
            Shape::Note {
                target_x: Some(x),
                target_y: Some(y),
                ..
            } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drawing {
    pub id: DrawingId,
    /// Frame-quantized playback time in seconds
    pub time: f64,
    #[serde(default)]
    pub style: Style,
    #[serde(flatten)]
    pub shape: Shape,
}

impl Drawing {
    pub fn frame(&self) -> i64 {
        frame_index(self.time)
    }
}

/// Reference to a captured still image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StillImage {
    /// Data URL right after capture, replaced by the stored URL once uploaded
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Marker positioned relative to the snapshot, in [0, 1] of each axis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMarker {
    pub drawing_id: DrawingId,
    pub kind: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: SnapshotId,
    pub time: f64,
    pub image: StillImage,
    #[serde(default)]
    pub markers: Vec<SnapshotMarker>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDocument {
    #[serde(default)]
    pub drawings: Vec<Drawing>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

impl AnnotationDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a host document, never failing
    ///
    /// A blob that is not a JSON object yields an empty document. Entries that
    /// fail to decode are dropped individually so one bad drawing does not
    /// discard the rest.
    pub fn parse_or_empty(json: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Malformed annotation document, starting empty: {e}");
                return Self::default();
            }
        };

        let serde_json::Value::Object(mut root) = value else {
            log::warn!("Annotation document is not an object, starting empty");
            return Self::default();
        };

        let drawings = decode_entries::<Drawing>(root.remove("drawings"), "drawing");
        let snapshots = decode_entries::<Snapshot>(root.remove("snapshots"), "snapshot");

        let mut document = Self {
            drawings,
            snapshots,
        };
        document.dedupe_ids();
        document
    }

    pub fn to_json(&self) -> String {
        // Every field is plain data, serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"drawings":[],"snapshots":[]}"#.to_string())
    }

    pub fn drawing(&self, id: &str) -> Option<&Drawing> {
        self.drawings.iter().find(|d| d.id == id)
    }

    pub fn drawing_mut(&mut self, id: &str) -> Option<&mut Drawing> {
        self.drawings.iter_mut().find(|d| d.id == id)
    }

    /// Drawings of one frame, in z-order
    pub fn drawings_at(&self, frame: i64) -> impl Iterator<Item = &Drawing> {
        self.drawings.iter().filter(move |d| d.frame() == frame)
    }

    fn dedupe_ids(&mut self) {
        let mut seen = std::collections::HashSet::new();
        for drawing in &mut self.drawings {
            if !seen.insert(drawing.id.clone()) {
                log::warn!("Duplicate drawing id {}, reassigning", drawing.id);
                drawing.id = new_id();
                seen.insert(drawing.id.clone());
            }
        }
    }
}

fn decode_entries<T: serde::de::DeserializeOwned>(
    value: Option<serde_json::Value>,
    label: &str,
) -> Vec<T> {
    let Some(serde_json::Value::Array(entries)) = value else {
        return Vec::new();
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<T>(entry) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                log::warn!("Skipping malformed {label} #{index}: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_time() {
        assert!((quantize_time(1.033) - 31.0 / 30.0).abs() < 1e-12);
        assert_eq!(frame_index(1.033), 31);
        assert_eq!(frame_index(0.0), 0);
        // Values within half a tick land on the same frame
        assert_eq!(frame_index(2.0 + 0.016), frame_index(2.0));
    }

    #[test]
    fn test_drawing_json_shape() {
        let drawing = Drawing {
            id: "d1".to_string(),
            time: 1.0,
            style: Style::default(),
            shape: Shape::Note {
                x: 10.0,
                y: 20.0,
                text: "look here".to_string(),
                target_x: Some(50.0),
                target_y: Some(60.0),
            },
        };

        let json = serde_json::to_value(&drawing).unwrap();
        assert_eq!(json["kind"], "note");
        assert_eq!(json["targetX"], 50.0);
        assert_eq!(json["text"], "look here");

        let angle: Drawing = serde_json::from_str(
            r#"{"id":"a","time":0.5,"kind":"angle",
                "vertex":{"x":0,"y":0},"control":{"x":1,"y":0},"end":{"x":0,"y":1},
                "clockwise":90,"counterClockwise":270}"#,
        )
        .unwrap();
        assert!(matches!(angle.shape, Shape::Angle { clockwise, .. } if clockwise == 90.0));
        assert_eq!(angle.style, Style::default());
    }

    #[test]
    fn test_parse_or_empty_falls_back() {
        assert_eq!(AnnotationDocument::parse_or_empty("not json"), AnnotationDocument::default());
        assert_eq!(AnnotationDocument::parse_or_empty("[1,2]"), AnnotationDocument::default());
        assert_eq!(AnnotationDocument::parse_or_empty("{}"), AnnotationDocument::default());
    }

    #[test]
    fn test_parse_skips_bad_entries() {
        let document = AnnotationDocument::parse_or_empty(
            r#"{"drawings":[
                {"id":"ok","time":0,"kind":"crosshair","center":{"x":1,"y":2}},
                {"id":"bad","time":0,"kind":"hexagon"},
                {"id":"ok","time":0,"kind":"line","start":{"x":0,"y":0},"end":{"x":3,"y":4}}
            ]}"#,
        );

        assert_eq!(document.drawings.len(), 2);
        assert_eq!(document.drawings[0].id, "ok");
        // The duplicate id was reassigned rather than dropped
        assert_ne!(document.drawings[1].id, "ok");
        assert!(document.snapshots.is_empty());
    }
}
