//! Browser surface: stage DOM layout, Canvas2D replay of display lists,
//! overlay elements and seek-bar markers

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;

use framemark_core::overlay::{OverlayElement, OverlayKind, OverlayOp, SeekMarker};
use framemark_core::render::DrawCommand;
use framemark_core::{MediaSource, RenderFrame, StillImage, Surface};
use framemark_shared::{FramemarkError, FramemarkResult, Size, Style};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, HtmlVideoElement,
};

/// Marks elements created by the annotator inside the host's stage
const LAYER_ATTRIBUTE: &str = "data-framemark";

pub(crate) fn js_error(context: &str, err: JsValue) -> FramemarkError {
    FramemarkError::JsInterop {
        message: format!("{context}: {err:?}"),
    }
}

fn set_styles(element: &HtmlElement, styles: &[(&str, &str)]) -> Result<(), JsValue> {
    let style = element.style();
    for (name, value) in styles {
        style.set_property(name, value)?;
    }
    Ok(())
}

fn create<T: JsCast>(document: &Document, tag: &str, layer: &str) -> Result<T, JsValue> {
    let element = document.create_element(tag)?;
    element.set_attribute(LAYER_ATTRIBUTE, layer)?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("<{tag}> has an unexpected type")))
}

fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| JsValue::from_str("2d context has an unexpected type"))
}

/// Elements making up the layer stack inside the stage
#[derive(Clone)]
pub struct StageDom {
    pub document: Document,
    pub stage: HtmlElement,
    /// Media wrapper: video plus canvas, transformed as one
    pub wrapper: HtmlElement,
    pub video: HtmlVideoElement,
    pub canvas: HtmlCanvasElement,
    pub overlay: HtmlElement,
    pub seek_bar: HtmlElement,
}

impl StageDom {
    /// Builds the layers inside the stage element, replacing any left over
    /// from an earlier attachment
    pub fn build(stage_id: &str, video_src: &str) -> FramemarkResult<Self> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| FramemarkError::Internal {
                message: "No document available".to_string(),
            })?;
        let stage = document
            .get_element_by_id(stage_id)
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
            .ok_or_else(|| FramemarkError::ElementNotFound {
                id: stage_id.to_string(),
            })?;

        Self::assemble(document, stage, video_src).map_err(|e| js_error("Building stage layers", e))
    }

    fn assemble(document: Document, stage: HtmlElement, video_src: &str) -> Result<Self, JsValue> {
        Self::remove_layers(&stage)?;
        set_styles(
            &stage,
            &[
                ("position", "relative"),
                ("overflow", "hidden"),
                ("touch-action", "none"),
                ("user-select", "none"),
            ],
        )?;

        let wrapper: HtmlElement = create(&document, "div", "media")?;
        set_styles(
            &wrapper,
            &[
                ("position", "absolute"),
                ("left", "0"),
                ("top", "0"),
                ("width", "100%"),
                ("transform-origin", "0 0"),
            ],
        )?;

        let video: HtmlVideoElement = create(&document, "video", "video")?;
        video.set_cross_origin(Some("anonymous"));
        video.set_attribute("playsinline", "")?;
        video.set_attribute("preload", "metadata")?;
        video.set_src(video_src);
        set_styles(&video, &[("display", "block"), ("width", "100%")])?;

        let canvas: HtmlCanvasElement = create(&document, "canvas", "canvas")?;
        set_styles(
            &canvas,
            &[
                ("position", "absolute"),
                ("left", "0"),
                ("top", "0"),
                ("width", "100%"),
                ("height", "100%"),
            ],
        )?;

        let overlay: HtmlElement = create(&document, "div", "overlay")?;
        set_styles(
            &overlay,
            &[
                ("position", "absolute"),
                ("left", "0"),
                ("top", "0"),
                ("width", "100%"),
                ("height", "100%"),
                ("transform-origin", "0 0"),
                ("pointer-events", "none"),
            ],
        )?;

        let seek_bar: HtmlElement = create(&document, "div", "seek-bar")?;
        seek_bar.set_class_name("fm-seek-bar");
        set_styles(
            &seek_bar,
            &[
                ("position", "absolute"),
                ("left", "0"),
                ("right", "0"),
                ("bottom", "0"),
                ("height", "8px"),
            ],
        )?;

        wrapper.append_child(&video)?;
        wrapper.append_child(&canvas)?;
        stage.append_child(&wrapper)?;
        stage.append_child(&overlay)?;
        stage.append_child(&seek_bar)?;

        Ok(Self {
            document,
            stage,
            wrapper,
            video,
            canvas,
            overlay,
            seek_bar,
        })
    }

    fn remove_layers(stage: &HtmlElement) -> Result<(), JsValue> {
        while let Some(old) = stage.query_selector(&format!(":scope > [{LAYER_ATTRIBUTE}]"))? {
            old.remove();
        }
        Ok(())
    }

    /// Removes everything `build` added
    pub fn teardown(&self) {
        if let Err(err) = Self::remove_layers(&self.stage) {
            log::warn!("Removing stage layers failed: {err:?}");
        }
    }

    /// Intrinsic and laid-out size of the video; empty until metadata loads
    pub fn media_sizes(&self) -> (Size, Size) {
        let natural = Size::new(self.video.video_width() as f64, self.video.video_height() as f64);
        let displayed = Size::new(
            self.video.client_width() as f64,
            self.video.client_height() as f64,
        );
        (natural, displayed)
    }

    pub fn media_source(&self, src: &str, annotations: Option<String>) -> MediaSource {
        let (natural_size, displayed_size) = self.media_sizes();
        let duration = self.video.duration();
        MediaSource {
            src: src.to_string(),
            natural_size,
            displayed_size,
            duration: if duration.is_finite() { duration } else { 0.0 },
            annotations,
        }
    }
}

/// Replays render frames onto the stage DOM
pub struct CanvasSurface {
    dom: StageDom,
    context: CanvasRenderingContext2d,
    overlays: HashMap<String, HtmlElement>,
    /// Overlay contents, kept for composited captures
    labels: BTreeMap<String, OverlayElement>,
    seek_markers: Vec<SeekMarker>,
}

impl CanvasSurface {
    pub fn new(dom: StageDom) -> FramemarkResult<Self> {
        let context = context_2d(&dom.canvas).map_err(|e| js_error("Canvas context", e))?;
        Ok(Self {
            dom,
            context,
            overlays: HashMap::new(),
            labels: BTreeMap::new(),
            seek_markers: Vec::new(),
        })
    }

    fn try_present(&mut self, frame: &RenderFrame) -> Result<(), JsValue> {
        let width = frame.canvas_size.width.round().max(1.0) as u32;
        let height = frame.canvas_size.height.round().max(1.0) as u32;
        if self.dom.canvas.width() != width || self.dom.canvas.height() != height {
            self.dom.canvas.set_width(width);
            self.dom.canvas.set_height(height);
        }

        for command in &frame.commands {
            self.draw(command)?;
        }

        set_styles(&self.dom.wrapper, &[("transform", &frame.css_transform)])?;
        set_styles(&self.dom.overlay, &[("transform", &frame.css_transform)])?;
        let pointer_events = if frame.canvas_passthrough { "none" } else { "auto" };
        set_styles(&self.dom.canvas, &[("pointer-events", pointer_events)])?;

        for op in &frame.overlay_ops {
            self.apply_overlay(op)?;
        }
        if frame.seek_markers != self.seek_markers {
            self.render_seek_markers(&frame.seek_markers)?;
            self.seek_markers = frame.seek_markers.clone();
        }
        Ok(())
    }

    fn stroke_with(&self, style: &Style, dashed: bool) -> Result<(), JsValue> {
        let ctx = &self.context;
        ctx.set_stroke_style_str(&style.color);
        ctx.set_line_width(style.width);
        ctx.set_line_cap("round");
        ctx.set_line_join("round");
        let dash = if dashed {
            js_sys::Array::of2(&(style.width * 3.0).into(), &(style.width * 2.0).into())
        } else {
            js_sys::Array::new()
        };
        ctx.set_line_dash(&dash)?;
        ctx.stroke();
        Ok(())
    }

    fn draw(&self, command: &DrawCommand) -> Result<(), JsValue> {
        let ctx = &self.context;
        match command {
            DrawCommand::Clear { width, height } => ctx.clear_rect(0.0, 0.0, *width, *height),
            DrawCommand::Polyline {
                points,
                style,
                closed,
                dashed,
            } => {
                let Some((first, rest)) = points.split_first() else {
                    return Ok(());
                };
                ctx.begin_path();
                if rest.is_empty() {
                    ctx.set_fill_style_str(&style.color);
                    ctx.arc(first.x, first.y, style.width * 0.5, 0.0, TAU)?;
                    ctx.fill();
                    return Ok(());
                }
                ctx.move_to(first.x, first.y);
                for point in rest {
                    ctx.line_to(point.x, point.y);
                }
                if *closed {
                    ctx.close_path();
                }
                self.stroke_with(style, *dashed)?;
            }
            DrawCommand::Ellipse {
                center,
                radius_x,
                radius_y,
                style,
            } => {
                ctx.begin_path();
                ctx.ellipse(center.x, center.y, radius_x.abs(), radius_y.abs(), 0.0, 0.0, TAU)?;
                self.stroke_with(style, false)?;
            }
            DrawCommand::QuadraticCurve {
                start,
                control,
                end,
                style,
            } => {
                ctx.begin_path();
                ctx.move_to(start.x, start.y);
                ctx.quadratic_curve_to(control.x, control.y, end.x, end.y);
                self.stroke_with(style, false)?;
            }
            DrawCommand::Arc {
                center,
                radius,
                start_angle,
                end_angle,
                anticlockwise,
                style,
            } => {
                ctx.begin_path();
                ctx.arc_with_anticlockwise(
                    center.x,
                    center.y,
                    *radius,
                    *start_angle,
                    *end_angle,
                    *anticlockwise,
                )?;
                self.stroke_with(style, false)?;
            }
            DrawCommand::Disc {
                center,
                radius,
                color,
            } => {
                ctx.begin_path();
                ctx.set_fill_style_str(color);
                ctx.arc(center.x, center.y, *radius, 0.0, TAU)?;
                ctx.fill();
            }
            DrawCommand::Label {
                position,
                text,
                color,
                font_px,
            } => {
                ctx.set_font(&format!("{font_px:.1}px sans-serif"));
                ctx.set_text_align("center");
                ctx.set_text_baseline("middle");
                ctx.set_fill_style_str(color);
                ctx.fill_text(text, position.x, position.y)?;
            }
            DrawCommand::Loupe {
                center,
                radius,
                source,
                ring,
            } => {
                let (dx, dy, size) = (center.x - radius, center.y - radius, radius * 2.0);
                ctx.save();
                ctx.begin_path();
                ctx.arc(center.x, center.y, *radius, 0.0, TAU)?;
                ctx.clip();
                ctx.draw_image_with_html_video_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                    &self.dom.video,
                    source.min.x,
                    source.min.y,
                    source.width(),
                    source.height(),
                    dx,
                    dy,
                    size,
                    size,
                )?;
                // Drawings already painted this pass are magnified too
                ctx.draw_image_with_html_canvas_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                    &self.dom.canvas,
                    source.min.x,
                    source.min.y,
                    source.width(),
                    source.height(),
                    dx,
                    dy,
                    size,
                    size,
                )?;
                ctx.restore();
                ctx.begin_path();
                ctx.arc(center.x, center.y, *radius, 0.0, TAU)?;
                self.stroke_with(ring, false)?;
            }
        }
        Ok(())
    }

    fn write_element(&self, element: &HtmlElement, data: &OverlayElement) -> Result<(), JsValue> {
        let class = match data.kind {
            OverlayKind::Text => "fm-overlay fm-text",
            OverlayKind::Note => "fm-overlay fm-note",
        };
        element.set_class_name(class);
        element.set_attribute("data-id", &data.id)?;
        element.set_content_editable(if data.editable { "true" } else { "false" });
        // Rewriting unchanged text would reset the caret while typing
        if element.text_content().as_deref() != Some(data.text.as_str()) {
            element.set_text_content(Some(&data.text));
        }
        let outline = if data.selected {
            "2px solid #0a84ff"
        } else {
            "none"
        };
        set_styles(
            element,
            &[
                ("position", "absolute"),
                ("left", &format!("{:.2}px", data.left)),
                ("top", &format!("{:.2}px", data.top)),
                ("color", &data.color),
                ("outline", outline),
                ("pointer-events", "auto"),
                ("white-space", "pre"),
            ],
        )
    }

    fn apply_overlay(&mut self, op: &OverlayOp) -> Result<(), JsValue> {
        match op {
            OverlayOp::Create { element: data } => {
                let element: HtmlElement = create(&self.dom.document, "div", "label")?;
                self.write_element(&element, data)?;
                self.dom.overlay.append_child(&element)?;
                self.overlays.insert(data.id.clone(), element);
                self.labels.insert(data.id.clone(), data.clone());
            }
            OverlayOp::Update { element: data } => {
                if let Some(element) = self.overlays.get(&data.id) {
                    self.write_element(element, data)?;
                }
                self.labels.insert(data.id.clone(), data.clone());
            }
            OverlayOp::Remove { id } => {
                if let Some(element) = self.overlays.remove(id) {
                    element.remove();
                }
                self.labels.remove(id);
            }
            OverlayOp::Focus { id } => {
                if let Some(element) = self.overlays.get(id) {
                    element.focus()?;
                }
            }
        }
        Ok(())
    }

    fn render_seek_markers(&self, markers: &[SeekMarker]) -> Result<(), JsValue> {
        self.dom.seek_bar.set_inner_html("");
        for marker in markers {
            let element: HtmlElement = create(&self.dom.document, "div", "seek-marker")?;
            element.set_class_name("fm-seek-marker");
            element.set_attribute("data-id", &marker.id)?;
            element.set_attribute("data-time", &marker.time.to_string())?;
            set_styles(
                &element,
                &[
                    ("position", "absolute"),
                    ("left", &format!("{:.3}%", marker.offset_percent)),
                    ("cursor", "pointer"),
                ],
            )?;
            self.dom.seek_bar.append_child(&element)?;
        }
        Ok(())
    }

    fn try_capture(&self) -> Result<StillImage, JsValue> {
        let width = self.dom.canvas.width();
        let height = self.dom.canvas.height();
        let still: HtmlCanvasElement = self
            .dom
            .document
            .create_element("canvas")?
            .dyn_into()
            .map_err(|_| JsValue::from_str("<canvas> has an unexpected type"))?;
        still.set_width(width);
        still.set_height(height);

        let ctx = context_2d(&still)?;
        let (w, h) = (width as f64, height as f64);
        ctx.draw_image_with_html_video_element_and_dw_and_dh(&self.dom.video, 0.0, 0.0, w, h)?;
        ctx.draw_image_with_html_canvas_element_and_dw_and_dh(&self.dom.canvas, 0.0, 0.0, w, h)?;

        // Overlay positions are in displayed pixels
        let displayed = self.dom.video.client_width().max(1) as f64;
        let fit = w / displayed;
        ctx.set_text_baseline("top");
        ctx.set_text_align("left");
        ctx.set_font(&format!("{:.1}px sans-serif", 14.0 * fit));
        for label in self.labels.values() {
            ctx.set_fill_style_str(&label.color);
            ctx.fill_text(&label.text, label.left * fit, label.top * fit)?;
        }

        Ok(StillImage {
            url: still.to_data_url()?,
            width,
            height,
        })
    }
}

impl Surface for CanvasSurface {
    fn present(&mut self, frame: &RenderFrame) {
        if let Err(err) = self.try_present(frame) {
            log::error!("Presenting frame failed: {err:?}");
        }
    }

    fn capture_still(&mut self) -> FramemarkResult<StillImage> {
        self.try_capture().map_err(|err| FramemarkError::Capture {
            message: format!("{err:?}"),
        })
    }
}
