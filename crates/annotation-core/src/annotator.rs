//! Annotation session
//!
//! One [`Annotator`] owns all state of an annotated video: the document
//! store, the zoom/pan transform, the tool state machine, overlay
//! bookkeeping and the persistence scheduler. Every handler runs to
//! completion, applies at most one mutation and repaints before returning,
//! so the surface always shows the latest document.

use framemark_config::AnnotatorSettings;
use framemark_shared::events::{KeyEvent, PinchEvent, PinchPhase, PointerEvent, WheelEvent};
use framemark_shared::{FramemarkError, FramemarkResult, Point, Size, Style, Vec2};

use crate::controls::interaction::MIN_DRAG_DISTANCE;
use crate::controls::{AngleDraftPhase, Effects, Interaction, InteractionContext, Tool};
use crate::document::{AnnotationDocument, DrawingId, Shape, SnapshotId, StillImage};
use crate::overlay::{overlay_elements, overlay_regions, seek_markers, OverlayReconciler};
use crate::persistence::{FlushStatus, Persistence, SaveSink, SinkOutcome};
use crate::render::{display_list, RenderFrame, Scene};
use crate::snapshot::snapshot_markers;
use crate::stage::{Layer, Layers};
use crate::store::{AnnotationStore, DrawingPatch};
use crate::transform::Transform;

/// Presentation target of an annotator
pub trait Surface {
    fn present(&mut self, frame: &RenderFrame);

    /// Composites the media frame and the annotation canvas into a still
    fn capture_still(&mut self) -> FramemarkResult<StillImage>;
}

/// Video the annotator is attached to
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MediaSource {
    pub src: String,
    pub natural_size: Size,
    pub displayed_size: Size,
    /// Seconds; zero while unknown
    pub duration: f64,
    /// Replaces the current document when present
    pub annotations: Option<String>,
}

pub struct Annotator {
    settings: AnnotatorSettings,
    store: AnnotationStore,
    transform: Transform,
    interaction: Interaction,
    overlays: OverlayReconciler,
    persistence: Persistence,
    surface: Box<dyn Surface>,
    source: MediaSource,
    /// Latest host time seen, milliseconds
    clock: f64,
    pending_focus: Option<DrawingId>,
}

impl Annotator {
    pub fn new(
        settings: AnnotatorSettings,
        surface: Box<dyn Surface>,
        sink: Option<Box<dyn SaveSink>>,
    ) -> Self {
        let store = AnnotationStore::from_json(settings.initial_document.as_deref());
        let interaction = Interaction::new(settings.default_style.clone(), settings.read_only);
        let persistence = Persistence::new(&settings, sink);
        log::info!(
            "Annotator created for {} ({} drawings, read-only: {})",
            settings.video_src,
            store.document().drawings.len(),
            settings.read_only
        );
        Self {
            transform: Transform::new(settings.zoom),
            source: MediaSource {
                src: settings.video_src.clone(),
                ..MediaSource::default()
            },
            settings,
            store,
            interaction,
            overlays: OverlayReconciler::new(),
            persistence,
            surface,
            clock: 0.0,
            pending_focus: None,
        }
    }

    pub fn settings(&self) -> &AnnotatorSettings {
        &self.settings
    }

    pub fn is_read_only(&self) -> bool {
        self.settings.read_only
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn document(&self) -> &AnnotationDocument {
        self.store.document()
    }

    pub fn document_json(&self) -> String {
        self.store.document().to_json()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn current_time(&self) -> f64 {
        self.store.current_time()
    }

    pub fn tool(&self) -> Tool {
        self.interaction.tool()
    }

    pub fn angle_phase(&self) -> AngleDraftPhase {
        self.interaction.angle_phase()
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn flush_status(&self) -> &FlushStatus {
        self.persistence.status()
    }

    /// Deadline of the pending debounced save, host milliseconds
    pub fn next_flush_due(&self) -> Option<f64> {
        self.persistence.next_due()
    }

    pub fn advance_clock(&mut self, now: f64) {
        if now.is_finite() && now > self.clock {
            self.clock = now;
        }
    }

    fn ensure_writable(&self, operation: &str) -> FramemarkResult<()> {
        if self.settings.read_only {
            return Err(FramemarkError::read_only(operation));
        }
        Ok(())
    }

    fn context(&mut self) -> (&mut Interaction, InteractionContext<'_>) {
        (
            &mut self.interaction,
            InteractionContext {
                store: &mut self.store,
                transform: &mut self.transform,
            },
        )
    }

    // Lifecycle

    /// Binds the session to a (new) media source and repaints from scratch
    pub fn load_source(&mut self, source: MediaSource) {
        log::info!("Loading media source {}", source.src);
        self.cancel_interaction();
        if let Some(json) = source.annotations.as_deref() {
            self.store = AnnotationStore::from_json(Some(json));
            self.persistence.rebase();
        }
        self.store.set_current_time(0.0);
        self.transform.reset();
        self.transform
            .set_media_sizes(source.natural_size, source.displayed_size);
        self.source = source;
        self.overlays.reset();
        self.render();
    }

    /// Swaps the presentation target; overlays are recreated on the next pass
    pub fn set_surface(&mut self, surface: Box<dyn Surface>) {
        self.surface = surface;
        self.overlays.reset();
    }

    /// Drops gesture state and forces pending work out; called on detach
    pub fn detached(&mut self) {
        self.cancel_interaction();
        self.flush();
        self.overlays.reset();
    }

    pub fn cancel_interaction(&mut self) {
        let (interaction, mut cx) = self.context();
        interaction.cancel(&mut cx);
    }

    pub fn set_media_sizes(&mut self, natural: Size, displayed: Size) {
        self.transform.set_media_sizes(natural, displayed);
        self.source.natural_size = self.transform.natural_size();
        self.source.displayed_size = self.transform.displayed_size();
        self.render();
    }

    pub fn set_duration(&mut self, duration: f64) {
        if duration.is_finite() && duration >= 0.0 {
            self.source.duration = duration;
            self.render();
        }
    }

    /// Moves the playhead; gestures in progress are abandoned when the
    /// displayed frame changes
    pub fn set_playback_time(&mut self, time: f64) {
        if !time.is_finite() {
            return;
        }
        if self.store.set_current_time(time) {
            self.cancel_interaction();
            self.render();
        }
    }

    // Stage event handlers

    pub fn on_canvas_pointer_down(&mut self, event: &PointerEvent, layers: &mut Layers) {
        self.advance_clock(event.time_stamp);
        let (interaction, mut cx) = self.context();
        let effects = interaction.canvas_pointer_down(event, &mut cx);
        self.apply(effects, Some(layers));
    }

    pub fn on_stage_pointer_down(&mut self, event: &PointerEvent, layers: &mut Layers) {
        self.advance_clock(event.time_stamp);
        let (interaction, mut cx) = self.context();
        let effects = interaction.stage_pointer_down(event, &mut cx);
        self.apply(effects, Some(layers));
    }

    pub fn on_pointer_move(&mut self, event: &PointerEvent, layers: &mut Layers) {
        self.advance_clock(event.time_stamp);
        let (interaction, mut cx) = self.context();
        let effects = interaction.pointer_move(event, &mut cx);
        self.apply(effects, Some(layers));
    }

    pub fn on_pointer_up(&mut self, event: &PointerEvent, layers: &mut Layers) {
        self.advance_clock(event.time_stamp);
        let (interaction, mut cx) = self.context();
        let effects = interaction.pointer_up(event, &mut cx);
        self.apply(effects, Some(layers));
    }

    pub fn on_key(&mut self, event: &KeyEvent, layers: &mut Layers) {
        self.advance_clock(event.time_stamp);
        let (interaction, mut cx) = self.context();
        let effects = interaction.key_down(event, &mut cx);
        self.apply(effects, Some(layers));
    }

    /// Wheel up zooms in around the pointer
    pub fn on_wheel(&mut self, event: &WheelEvent, layers: &mut Layers) {
        self.advance_clock(event.time_stamp);
        if event.delta_y == 0.0 || !event.delta_y.is_finite() {
            return;
        }
        self.transform.zoom_at(event.position, -event.delta_y.signum());
        self.apply(Effects::repaint(), Some(layers));
    }

    pub fn on_pinch(&mut self, event: &PinchEvent, layers: &mut Layers) {
        self.advance_clock(event.time_stamp);
        match event.phase {
            PinchPhase::Start => self.transform.begin_pinch(),
            PinchPhase::Update { scale } => self.transform.update_pinch(scale, event.center),
            PinchPhase::End => self.transform.end_pinch(),
        }
        self.apply(Effects::repaint(), Some(layers));
    }

    // Host API

    pub fn select_tool(&mut self, tool: Tool) {
        let (interaction, mut cx) = self.context();
        let effects = interaction.select_tool(tool, &mut cx);
        self.apply(effects, None);
    }

    pub fn set_style(&mut self, style: Style) {
        self.interaction.set_style(style);
    }

    pub fn zoom(&self) -> f64 {
        self.transform.zoom()
    }

    pub fn zoom_in(&mut self) {
        self.transform.step_zoom(1.0);
        self.render();
    }

    pub fn zoom_out(&mut self) {
        self.transform.step_zoom(-1.0);
        self.render();
    }

    pub fn set_zoom_factor(&mut self, factor: f64) {
        self.transform.set_factor(factor);
        self.render();
    }

    pub fn reset_view(&mut self) {
        self.transform.reset();
        self.render();
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.transform.pan_by(Vec2::new(dx, dy));
        self.render();
    }

    pub fn add_drawing(&mut self, shape: Shape, style: Option<Style>) -> FramemarkResult<DrawingId> {
        self.ensure_writable("add_drawing")?;
        let style = style.unwrap_or_else(|| self.interaction.style().clone());
        let id = self.store.add_drawing(shape, style);
        self.after_mutation();
        Ok(id)
    }

    pub fn add_note(
        &mut self,
        anchor: Point,
        text: &str,
        target: Option<Point>,
    ) -> FramemarkResult<DrawingId> {
        self.ensure_writable("add_note")?;
        let style = self.interaction.style().clone();
        let id = self.store.add_note(anchor, text, target, style);
        self.after_mutation();
        Ok(id)
    }

    /// `Ok(false)` when the id is unknown
    pub fn update_drawing(&mut self, id: &str, patch: &DrawingPatch) -> FramemarkResult<bool> {
        self.ensure_writable("update_drawing")?;
        let changed = self.store.update_drawing(id, patch);
        if changed {
            self.after_mutation();
        }
        Ok(changed)
    }

    pub fn update_text(&mut self, id: &str, text: &str) -> FramemarkResult<bool> {
        self.update_drawing(id, &DrawingPatch::text(text))
    }

    pub fn delete_drawing(&mut self, id: &str) -> FramemarkResult<bool> {
        self.ensure_writable("delete_drawing")?;
        let deleted = self.store.delete_drawing(id);
        if deleted {
            self.interaction.forget(id);
            self.after_mutation();
        }
        Ok(deleted)
    }

    pub fn clear_current_frame(&mut self) -> FramemarkResult<usize> {
        self.ensure_writable("clear_current_frame")?;
        self.cancel_interaction();
        let removed = self.store.clear_current_frame();
        if removed > 0 {
            log::debug!("Cleared {removed} drawings on frame {}", self.store.current_frame());
            self.after_mutation();
        }
        Ok(removed)
    }

    /// Captures the composited frame; any draft in progress is left alone
    pub fn capture_snapshot(&mut self) -> FramemarkResult<SnapshotId> {
        self.ensure_writable("capture_snapshot")?;
        let image = self.surface.capture_still()?;
        let markers = snapshot_markers(self.store.current_drawings(), self.transform.natural_size());
        let time = self.store.current_time();
        let id = self.store.add_snapshot(image, time, markers);
        if let Some(snapshot) = self.store.document().snapshots.last() {
            self.persistence.upload_snapshot(snapshot);
        }
        self.after_mutation();
        Ok(id)
    }

    pub fn delete_snapshot(&mut self, id: &str) -> FramemarkResult<bool> {
        self.ensure_writable("delete_snapshot")?;
        let deleted = self.store.delete_snapshot(id);
        if deleted {
            self.after_mutation();
        }
        Ok(deleted)
    }

    pub fn undo(&mut self) -> FramemarkResult<bool> {
        self.ensure_writable("undo")?;
        self.cancel_interaction();
        let applied = self.store.undo();
        if applied {
            self.after_mutation();
        }
        Ok(applied)
    }

    pub fn redo(&mut self) -> FramemarkResult<bool> {
        self.ensure_writable("redo")?;
        self.cancel_interaction();
        let applied = self.store.redo();
        if applied {
            self.after_mutation();
        }
        Ok(applied)
    }

    // Persistence

    /// Sends a due debounced save
    pub fn tick(&mut self, now: f64) -> bool {
        self.advance_clock(now);
        let revision = self.store.revision();
        self.persistence.tick(self.clock, self.store.document(), revision)
    }

    /// Saves immediately, skipping the debounce
    pub fn flush(&mut self) -> bool {
        let revision = self.store.revision();
        self.persistence.flush_now(self.store.document(), revision)
    }

    /// Applies a settled sink request; failures are returned for the host
    pub fn settle(&mut self, outcome: SinkOutcome) -> Option<FramemarkError> {
        match outcome {
            SinkOutcome::Saved { revision } => self.persistence.settle_save(revision, Ok(())),
            SinkOutcome::SaveFailed { revision, message } => {
                self.persistence.settle_save(revision, Err(message))
            }
            SinkOutcome::Uploaded { snapshot_id, url } => {
                if let Some(url) = url {
                    if self.store.set_snapshot_url(&snapshot_id, url) {
                        self.persistence.schedule(self.clock);
                    }
                }
                None
            }
            SinkOutcome::UploadFailed {
                snapshot_id,
                message,
            } => Some(self.persistence.upload_failed(&snapshot_id, message)),
        }
    }

    // Rendering

    fn after_mutation(&mut self) {
        self.persistence.schedule(self.clock);
        self.render();
    }

    fn apply(&mut self, effects: Effects, layers: Option<&mut Layers>) {
        if effects.document_changed {
            self.persistence.schedule(self.clock);
        }
        if let Some(id) = effects.focus {
            self.pending_focus = Some(id);
        }
        if effects.repaint || effects.document_changed || effects.transform_changed {
            self.render();
        }
        if let Some(layers) = layers {
            self.sync_layers(layers);
        }
    }

    /// Pointer routing state derived from the session
    pub fn sync_layers(&self, layers: &mut Layers) {
        layers.set_transparent(Layer::Canvas, self.interaction.canvas_passthrough());
        layers.set_overlay_regions(overlay_regions(self.store.current_drawings(), &self.transform));
    }

    /// Full repaint: canvas display list, overlay diff, seek-bar markers
    pub fn render(&mut self) {
        let unit = self.transform.screen_unit();
        let canvas_size = self.transform.natural_size();
        let scene = Scene {
            canvas_size,
            unit,
            drawings: self.store.current_drawings().collect(),
            selected: self.interaction.selected(),
            draft: self.interaction.preview(MIN_DRAG_DISTANCE * unit),
            draft_style: self.interaction.style(),
            loupe: self.interaction.loupe(),
        };
        let commands = display_list(&scene);

        let wanted = overlay_elements(
            self.store.current_drawings(),
            self.transform.natural_size(),
            self.transform.displayed_size(),
            self.interaction.selected(),
            !self.settings.read_only,
        );
        let focus = self.pending_focus.take();
        let overlay_ops = self.overlays.reconcile(wanted, focus.as_deref());

        let frame = RenderFrame {
            canvas_size,
            commands,
            overlay_ops,
            seek_markers: seek_markers(&self.store.document().snapshots, self.source.duration),
            css_transform: self.transform.css_transform(),
            canvas_passthrough: self.interaction.canvas_passthrough(),
        };
        self.surface.present(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DrawCommand;
    use framemark_shared::events::{Modifiers, MouseButton, PointerPhase};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Frames(Rc<RefCell<Vec<RenderFrame>>>);

    struct TestSurface {
        frames: Frames,
        fail_capture: bool,
    }

    impl Surface for TestSurface {
        fn present(&mut self, frame: &RenderFrame) {
            self.frames.0.borrow_mut().push(frame.clone());
        }

        fn capture_still(&mut self) -> FramemarkResult<StillImage> {
            if self.fail_capture {
                return Err(FramemarkError::Capture {
                    message: "tainted canvas".to_string(),
                });
            }
            Ok(StillImage {
                url: "data:image/png;base64,AAAA".to_string(),
                width: 640,
                height: 360,
            })
        }
    }

    fn annotator(read_only: bool) -> (Annotator, Frames) {
        let frames = Frames::default();
        let settings = AnnotatorSettings {
            read_only,
            ..AnnotatorSettings::default()
        };
        let surface = TestSurface {
            frames: frames.clone(),
            fail_capture: false,
        };
        let mut annotator = Annotator::new(settings, Box::new(surface), None);
        annotator.load_source(MediaSource {
            src: "clip.mp4".to_string(),
            natural_size: Size::new(640.0, 360.0),
            displayed_size: Size::new(640.0, 360.0),
            duration: 10.0,
            annotations: None,
        });
        (annotator, frames)
    }

    fn crosshair() -> Shape {
        Shape::Crosshair {
            center: Point::new(20.0, 20.0),
        }
    }

    #[test]
    fn test_mutations_repaint() {
        let (mut annotator, frames) = annotator(false);
        let before = frames.0.borrow().len();
        annotator.add_drawing(crosshair(), None).unwrap();
        let frames = frames.0.borrow();
        assert_eq!(frames.len(), before + 1);
        assert!(frames
            .last()
            .unwrap()
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Ellipse { .. })));
    }

    #[test]
    fn test_read_only_rejects_mutations() {
        let (mut annotator, _) = annotator(true);
        assert_eq!(
            annotator.add_drawing(crosshair(), None),
            Err(FramemarkError::read_only("add_drawing"))
        );
        assert!(annotator.clear_current_frame().is_err());
        assert!(annotator.capture_snapshot().is_err());
        assert!(annotator.document().drawings.is_empty());
    }

    #[test]
    fn test_unknown_ids_are_ok_false() {
        let (mut annotator, _) = annotator(false);
        assert_eq!(annotator.delete_drawing("nope"), Ok(false));
        assert_eq!(annotator.update_text("nope", "x"), Ok(false));
        assert_eq!(annotator.delete_snapshot("nope"), Ok(false));
    }

    #[test]
    fn test_capture_failure_leaves_document_untouched() {
        let frames = Frames::default();
        let surface = TestSurface {
            frames,
            fail_capture: true,
        };
        let mut annotator = Annotator::new(AnnotatorSettings::default(), Box::new(surface), None);
        assert!(matches!(
            annotator.capture_snapshot(),
            Err(FramemarkError::Capture { .. })
        ));
        assert!(annotator.document().snapshots.is_empty());
    }

    #[test]
    fn test_frame_change_abandons_draft() {
        let (mut annotator, _) = annotator(false);
        let mut layers = Layers::default();
        annotator.select_tool(Tool::Line);
        let down = PointerEvent::new(PointerPhase::Down, Point::new(10.0, 10.0), MouseButton::Primary);
        annotator.on_canvas_pointer_down(&down, &mut layers);
        annotator.set_playback_time(2.0);

        let up = PointerEvent::new(PointerPhase::Up, Point::new(90.0, 90.0), MouseButton::Primary);
        annotator.on_pointer_up(&up, &mut layers);
        assert!(annotator.document().drawings.is_empty());
    }

    #[test]
    fn test_wheel_zooms_within_bounds() {
        let (mut annotator, frames) = annotator(false);
        let mut layers = Layers::default();
        for _ in 0..200 {
            annotator.on_wheel(
                &WheelEvent {
                    position: Point::new(100.0, 100.0),
                    delta_y: -120.0,
                    modifiers: Modifiers::NONE,
                    time_stamp: 0.0,
                },
                &mut layers,
            );
        }
        assert_eq!(annotator.zoom(), annotator.settings().zoom.max);
        let css = frames.0.borrow().last().unwrap().css_transform.clone();
        assert!(css.ends_with("scale(8.00000)"), "{css}");
    }

    #[test]
    fn test_text_tool_focuses_new_overlay() {
        let (mut annotator, frames) = annotator(false);
        let mut layers = Layers::default();
        annotator.select_tool(Tool::Text);
        let down = PointerEvent::new(PointerPhase::Down, Point::new(50.0, 60.0), MouseButton::Primary);
        annotator.on_canvas_pointer_down(&down, &mut layers);

        let frames = frames.0.borrow();
        let ops = &frames.last().unwrap().overlay_ops;
        assert!(matches!(ops.first(), Some(crate::overlay::OverlayOp::Create { .. })));
        assert!(matches!(ops.last(), Some(crate::overlay::OverlayOp::Focus { .. })));
        drop(frames);
        assert!(layers.target_at(Point::new(52.0, 62.0)) == Layer::Overlay);
    }
}
