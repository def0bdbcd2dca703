//! Zoom/pan transform between viewport space and media-intrinsic space
//!
//! The presentation transform is applied as CSS to the media wrapper and the
//! overlay layer. The canvas pixel buffer always matches the media's natural
//! size, so drawing math happens in media space and never sees the zoom.

use framemark_config::ZoomSettings;
use framemark_shared::{Point, Size, Vec2};
use nalgebra_glm as glm;

#[derive(Debug, Clone)]
pub struct Transform {
    settings: ZoomSettings,
    /// User-adjustable factor; zoom is always re-derived as base * factor
    factor: f64,
    pinch_start_factor: Option<f64>,
    pan: Vec2,
    natural_size: Size,
    displayed_size: Size,
}

impl Transform {
    pub fn new(settings: ZoomSettings) -> Self {
        let mut transform = Self {
            settings,
            factor: 1.0,
            pinch_start_factor: None,
            pan: Vec2::ZERO,
            natural_size: Size::default(),
            displayed_size: Size::default(),
        };
        transform.set_factor(settings.default_factor);
        transform
    }

    pub fn zoom(&self) -> f64 {
        (self.settings.base * self.factor).clamp(self.settings.min, self.settings.max)
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn natural_size(&self) -> Size {
        self.natural_size
    }

    pub fn displayed_size(&self) -> Size {
        self.displayed_size
    }

    /// False until both media sizes are known; no mapping exists before that
    pub fn has_media(&self) -> bool {
        !self.natural_size.is_empty() && !self.displayed_size.is_empty()
    }

    /// Screen pixels per media pixel along x
    pub fn media_scale(&self) -> f64 {
        self.zoom() * self.displayed_size.width / self.natural_size.width
    }

    /// Media pixels covering one screen pixel; sizes fixed on screen are
    /// multiplied by this before drawing on the canvas
    pub fn screen_unit(&self) -> f64 {
        let scale = self.media_scale();
        if scale.is_finite() && scale > 0.0 {
            1.0 / scale
        } else {
            1.0
        }
    }

    /// Updates media sizes; empty sizes (metadata not loaded yet) are ignored
    pub fn set_media_sizes(&mut self, natural: Size, displayed: Size) {
        if !natural.is_empty() {
            self.natural_size = natural;
        }
        if !displayed.is_empty() {
            self.displayed_size = displayed;
        }
    }

    /// Sets the user factor, clamping the composed zoom into bounds
    pub fn set_factor(&mut self, factor: f64) {
        if !factor.is_finite() {
            return;
        }
        let zoom = (self.settings.base * factor).clamp(self.settings.min, self.settings.max);
        self.factor = zoom / self.settings.base;
    }

    /// One additive zoom step; positive `direction` zooms in
    pub fn step_zoom(&mut self, direction: f64) {
        if direction == 0.0 || !direction.is_finite() {
            return;
        }
        self.set_factor(self.factor + self.settings.step * direction.signum());
    }

    /// Steps the zoom while keeping the media point under `anchor` fixed
    pub fn zoom_at(&mut self, anchor: Point, direction: f64) {
        if !self.has_media() {
            self.step_zoom(direction);
            return;
        }
        let media = self.to_media_coords(anchor);
        self.step_zoom(direction);
        self.pin(media, anchor);
    }

    pub fn begin_pinch(&mut self) {
        self.pinch_start_factor = Some(self.factor);
    }

    /// Applies a pinch gesture; `scale` is relative to the gesture start
    pub fn update_pinch(&mut self, scale: f64, center: Point) {
        let Some(start) = self.pinch_start_factor else {
            return;
        };
        if scale.is_nan() || scale <= 0.0 {
            return;
        }
        if !self.has_media() {
            self.set_factor(start * scale);
            return;
        }
        let media = self.to_media_coords(center);
        self.set_factor(start * scale);
        self.pin(media, center);
    }

    pub fn end_pinch(&mut self) {
        self.pinch_start_factor = None;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan = Vec2::new(self.pan.x + delta.x, self.pan.y + delta.y);
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        self.pan = pan;
    }

    pub fn reset(&mut self) {
        self.set_factor(self.settings.default_factor);
        self.pan = Vec2::ZERO;
        self.pinch_start_factor = None;
    }

    /// Media → viewport matrix: translate(pan) · scale(zoom) · scale(displayed / natural)
    fn matrix(&self) -> glm::DMat3 {
        let fit = glm::vec2(
            self.displayed_size.width / self.natural_size.width,
            self.displayed_size.height / self.natural_size.height,
        );
        let zoom = self.zoom();
        glm::translation2d(&glm::vec2(self.pan.x, self.pan.y))
            * glm::scaling2d(&glm::vec2(zoom, zoom))
            * glm::scaling2d(&fit)
    }

    pub fn to_viewport_coords(&self, media: Point) -> Point {
        let v = self.matrix() * glm::vec3(media.x, media.y, 1.0);
        Point::new(v.x, v.y)
    }

    pub fn to_media_coords(&self, viewport: Point) -> Point {
        let Some(inverse) = self.matrix().try_inverse() else {
            return viewport;
        };
        let m = inverse * glm::vec3(viewport.x, viewport.y, 1.0);
        Point::new(m.x, m.y)
    }

    /// Re-pans so `media` lands on `viewport` at the current zoom
    fn pin(&mut self, media: Point, viewport: Point) {
        let now = self.to_viewport_coords(media);
        self.pan_by(Vec2::new(viewport.x - now.x, viewport.y - now.y));
    }

    /// CSS transform for the media wrapper and overlay layer; expects
    /// `transform-origin: 0 0` on both
    pub fn css_transform(&self) -> String {
        format!(
            "translate({:.3}px, {:.3}px) scale({:.5})",
            self.pan.x,
            self.pan.y,
            self.zoom()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ZoomSettings {
        ZoomSettings {
            base: 0.5,
            default_factor: 2.0,
            min: 0.25,
            max: 4.0,
            step: 0.25,
        }
    }

    fn sized() -> Transform {
        let mut transform = Transform::new(settings());
        transform.set_media_sizes(Size::new(1920.0, 1080.0), Size::new(960.0, 540.0));
        transform
    }

    fn assert_point_close(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_default_zoom_composes_base_and_factor() {
        let transform = Transform::new(settings());
        assert_eq!(transform.zoom(), 1.0);
    }

    #[test]
    fn test_zoom_stays_clamped_for_any_event_sequence() {
        let mut transform = sized();
        for i in 0..500 {
            let direction = if (i / 37) % 2 == 0 { 1.0 } else { -1.0 };
            transform.zoom_at(Point::new((i % 300) as f64, 20.0), direction);
            assert!(transform.zoom() >= 0.25 && transform.zoom() <= 4.0);
        }
        for _ in 0..200 {
            transform.step_zoom(1.0);
        }
        assert_eq!(transform.zoom(), 4.0);
        // The factor never drifts past the clamp, so one step back moves off the bound
        transform.step_zoom(-1.0);
        assert!((transform.zoom() - 3.875).abs() < 1e-9);
    }

    #[test]
    fn test_coordinate_round_trip() {
        let mut transform = sized();
        transform.set_factor(3.0);
        transform.set_pan(Vec2::new(-120.0, 35.0));

        let media = Point::new(640.0, 200.0);
        let viewport = transform.to_viewport_coords(media);
        assert_point_close(transform.to_media_coords(viewport), media);
    }

    #[test]
    fn test_media_mapping_accounts_for_display_scale() {
        let transform = sized();
        // zoom 1.0, displayed at half the natural size
        assert_point_close(
            transform.to_media_coords(Point::new(100.0, 100.0)),
            Point::new(200.0, 200.0),
        );
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let mut transform = sized();
        let anchor = Point::new(300.0, 120.0);
        let before = transform.to_media_coords(anchor);
        transform.zoom_at(anchor, 1.0);
        transform.zoom_at(anchor, 1.0);
        assert!(transform.zoom() > 1.0);
        assert_point_close(transform.to_media_coords(anchor), before);
    }

    #[test]
    fn test_pinch_is_relative_to_gesture_start() {
        let mut transform = sized();
        transform.begin_pinch();
        transform.update_pinch(1.5, Point::new(0.0, 0.0));
        transform.update_pinch(1.5, Point::new(0.0, 0.0));
        // Repeated updates with the same scale do not compound
        assert!((transform.zoom() - 1.5).abs() < 1e-9);
        transform.end_pinch();
        transform.update_pinch(3.0, Point::new(0.0, 0.0));
        assert!((transform.zoom() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_screen_unit_follows_zoom_and_fit() {
        let mut transform = sized();
        // displayed at half size, zoom 1.0: one screen pixel covers two media pixels
        assert!((transform.screen_unit() - 2.0).abs() < 1e-9);
        transform.set_factor(4.0);
        assert!((transform.screen_unit() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_css_transform_string() {
        let mut transform = sized();
        transform.set_pan(Vec2::new(10.0, -4.5));
        assert_eq!(
            transform.css_transform(),
            "translate(10.000px, -4.500px) scale(1.00000)"
        );
    }

    #[test]
    fn test_zoom_before_media_sizes_keeps_pan_finite() {
        let mut transform = Transform::new(settings());
        assert!(!transform.has_media());
        transform.zoom_at(Point::new(40.0, 30.0), 1.0);
        // factor 2.0 + 0.25 at base 0.5
        assert!((transform.zoom() - 1.125).abs() < 1e-9);
        assert_eq!(transform.pan(), Vec2::ZERO);
        assert_eq!(
            transform.css_transform(),
            "translate(0.000px, 0.000px) scale(1.12500)"
        );
    }
}
