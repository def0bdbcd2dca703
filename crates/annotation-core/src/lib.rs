//! Video annotation engine
//!
//! Platform-independent core of the annotator: document model and store,
//! zoom/pan transform, tool state machine, stage event routing, canvas
//! display lists, overlay reconciliation, snapshots and save scheduling.
//! The browser bridge only adapts DOM APIs to the [`Surface`] and
//! [`SaveSink`] traits and forwards events into a [`Stage`].

pub mod annotator;
pub mod controls;
pub mod document;
pub mod geometry;
pub mod handle;
pub mod history;
pub mod overlay;
pub mod persistence;
pub mod render;
pub mod snapshot;
pub mod stage;
pub mod store;
pub mod transform;

pub use annotator::{Annotator, MediaSource, Surface};
pub use controls::{AngleDraftPhase, Tool};
pub use document::{
    frame_index, quantize_time, AnnotationDocument, Drawing, DrawingId, Shape, Snapshot,
    SnapshotId, SnapshotMarker, StillImage,
};
pub use handle::AnnotatorHandle;
pub use persistence::{FlushStatus, SaveRequest, SaveSink, SinkOutcome, SnapshotUpload};
pub use render::{DrawCommand, RenderFrame};
pub use stage::{AbortController, AbortSignal, Layer, Stage};
pub use store::DrawingPatch;
pub use transform::Transform;
