use crate::core::{Color, Origin, Point, Rect, Vec2};

/// One timed snapshot of an element's drawable attributes, produced by an
/// external generator.
///
/// Snapshots are immutable; the aggregator keeps its own buffer sorted even
/// when the caller pushes them out of order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct State {
    /// Time in milliseconds.
    pub time: f64,
    pub position: Vec2,
    pub scale: Vec2,
    /// Rotation in radians around the origin anchor.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub color: Color,
    /// Opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub flip_h: bool,
    #[serde(default)]
    pub flip_v: bool,
    #[serde(default)]
    pub additive: bool,
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for State {
    fn default() -> Self {
        Self {
            time: 0.0,
            position: Vec2::new(320.0, 240.0),
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
            color: Color::WHITE,
            opacity: 1.0,
            flip_h: false,
            flip_v: false,
            additive: false,
        }
    }
}

impl State {
    /// Whether the element is on screen in this state: visible opacity,
    /// non-zero scale on both axes, and the rotated bounding box of the
    /// placed image intersecting `screen_bounds`.
    pub fn is_visible(&self, image_size: Vec2, origin: Origin, screen_bounds: &Rect) -> bool {
        if self.opacity <= 0.0 {
            return false;
        }
        if self.scale.x == 0.0 || self.scale.y == 0.0 {
            return false;
        }
        let bounds = self.screen_box(image_size, origin);
        rects_overlap(&bounds, screen_bounds)
    }

    /// Axis-aligned bounding box of the placed, scaled, rotated image.
    pub fn screen_box(&self, image_size: Vec2, origin: Origin) -> Rect {
        let size = Vec2::new(
            image_size.x * self.scale.x.abs(),
            image_size.y * self.scale.y.abs(),
        );
        let anchor = origin.anchor_factor();
        let top_left = self.position - Vec2::new(size.x * anchor.x, size.y * anchor.y);

        let corners = [
            top_left,
            top_left + Vec2::new(size.x, 0.0),
            top_left + Vec2::new(0.0, size.y),
            top_left + size,
        ];

        let (sin, cos) = self.rotation.sin_cos();
        let pivot = self.position;
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for corner in corners {
            let rel = corner - pivot;
            let rotated = pivot + Vec2::new(rel.x * cos - rel.y * sin, rel.x * sin + rel.y * cos);
            min.x = min.x.min(rotated.x);
            min.y = min.y.min(rotated.y);
            max.x = max.x.max(rotated.x);
            max.y = max.y.max(rotated.y);
        }
        Rect::new(min.x, min.y, max.x, max.y)
    }
}

fn rects_overlap(a: &Rect, b: &Rect) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}
