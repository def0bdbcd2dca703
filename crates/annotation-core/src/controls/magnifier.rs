//! Magnifier loupe placement

use framemark_shared::events::Modifiers;
use framemark_shared::{Point, Rect, Size};

/// Loupe radius in screen pixels
pub const LOUPE_RADIUS: f64 = 70.0;
pub const LOUPE_MAGNIFICATION: f64 = 2.0;
/// Magnification while Shift is held
pub const LOUPE_BOOSTED_MAGNIFICATION: f64 = 4.0;
/// Gap between the cursor and the loupe rim
const LOUPE_GAP: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loupe {
    /// Media point being magnified
    pub focus: Point,
    /// Center of the rendered loupe circle
    pub handle: Point,
    pub radius: f64,
    pub magnification: f64,
}

impl Loupe {
    /// Places a loupe for `focus`, up and to the left of the cursor when it
    /// fits, flipping to the other side near the media edges
    ///
    /// `unit` is the number of media pixels per screen pixel, so the loupe
    /// keeps the same on-screen size at every zoom.
    pub fn at(focus: Point, modifiers: Modifiers, bounds: Size, unit: f64) -> Self {
        let radius = (LOUPE_RADIUS * unit)
            .min(bounds.width * 0.5)
            .min(bounds.height * 0.5)
            .max(1.0);
        let offset = radius + LOUPE_GAP * unit;

        let mut x = focus.x - offset;
        if x - radius < 0.0 {
            x = focus.x + offset;
        }
        let mut y = focus.y - offset;
        if y - radius < 0.0 {
            y = focus.y + offset;
        }

        let handle = Point::new(
            x.clamp(radius, (bounds.width - radius).max(radius)),
            y.clamp(radius, (bounds.height - radius).max(radius)),
        );

        let magnification = if modifiers.shift {
            LOUPE_BOOSTED_MAGNIFICATION
        } else {
            LOUPE_MAGNIFICATION
        };

        Self {
            focus,
            handle,
            radius,
            magnification,
        }
    }

    /// Region of the media copied into the loupe
    pub fn source_rect(&self) -> Rect {
        let half = self.radius / self.magnification;
        Rect::from_center(self.focus, half, half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loupe_prefers_upper_left() {
        let loupe = Loupe::at(Point::new(500.0, 400.0), Modifiers::NONE, Size::new(1280.0, 720.0), 1.0);
        assert!(loupe.handle.x < 500.0 && loupe.handle.y < 400.0);
        assert_eq!(loupe.magnification, LOUPE_MAGNIFICATION);
    }

    #[test]
    fn test_loupe_flips_near_edges_and_stays_inside() {
        let bounds = Size::new(640.0, 360.0);
        let loupe = Loupe::at(Point::new(10.0, 10.0), Modifiers::shift(), bounds, 1.0);
        assert!(loupe.handle.x > 10.0 && loupe.handle.y > 10.0);
        assert!(loupe.handle.x + loupe.radius <= bounds.width);
        assert!(loupe.handle.y + loupe.radius <= bounds.height);
        assert_eq!(loupe.magnification, LOUPE_BOOSTED_MAGNIFICATION);
    }

    #[test]
    fn test_source_rect_shrinks_with_magnification() {
        let loupe = Loupe::at(Point::new(300.0, 300.0), Modifiers::shift(), Size::new(1000.0, 1000.0), 1.0);
        let source = loupe.source_rect();
        assert_eq!(source.width(), 2.0 * LOUPE_RADIUS / LOUPE_BOOSTED_MAGNIFICATION);
        assert_eq!(source.center(), Point::new(300.0, 300.0));
    }

    #[test]
    fn test_loupe_keeps_screen_size_when_zoomed_out() {
        let loupe = Loupe::at(Point::new(900.0, 900.0), Modifiers::NONE, Size::new(1920.0, 1920.0), 2.0);
        assert_eq!(loupe.radius, 2.0 * LOUPE_RADIUS);
    }
}
