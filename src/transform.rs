use crate::core::{Affine, Vec2};

/// Composed 2D placement for nested coordinate frames.
///
/// Each frame applies, innermost first: move the pivot to the local origin,
/// scale, rotate, then translate. Accumulated rotation and scale are kept
/// alongside the affine so rotation and scale instruction values can be
/// re-expressed in the outer frame.
#[derive(Clone, Debug)]
pub struct Placement {
    affine: Affine,
    rotation: f64,
    scale: f64,
}

impl Placement {
    pub fn identity() -> Self {
        Self {
            affine: Affine::IDENTITY,
            rotation: 0.0,
            scale: 1.0,
        }
    }

    /// A frame nested inside `parent` (or a root frame when `None`).
    pub fn new(
        parent: Option<&Placement>,
        pivot: Vec2,
        translation: Vec2,
        rotation: f64,
        scale: f64,
    ) -> Self {
        let local = Affine::translate(translation)
            * Affine::rotate(rotation)
            * Affine::scale(scale)
            * Affine::translate(-pivot);
        match parent {
            Some(p) => Self {
                affine: p.affine * local,
                rotation: p.rotation + rotation,
                scale: p.scale * scale,
            },
            None => Self {
                affine: local,
                rotation,
                scale,
            },
        }
    }

    pub fn is_identity(&self) -> bool {
        self.affine == Affine::IDENTITY
    }

    /// Whether the composed frame carries any rotation.
    pub fn has_rotation(&self) -> bool {
        self.rotation != 0.0
    }

    /// Transform a position into the outer frame.
    pub fn position(&self, position: Vec2) -> Vec2 {
        (self.affine * position.to_point()).to_vec2()
    }

    /// Transform a single-axis x position. A rotated frame cannot address
    /// one axis; the value passes through untransformed.
    pub fn position_x(&self, x: f64) -> f64 {
        if self.has_rotation() {
            return x;
        }
        let coeffs = self.affine.as_coeffs();
        coeffs[0] * x + coeffs[4]
    }

    /// Transform a single-axis y position; see [`Placement::position_x`].
    pub fn position_y(&self, y: f64) -> f64 {
        if self.has_rotation() {
            return y;
        }
        let coeffs = self.affine.as_coeffs();
        coeffs[3] * y + coeffs[5]
    }

    /// Rotation is additive across frames.
    pub fn rotation(&self, rotation: f64) -> f64 {
        rotation + self.rotation
    }

    /// Uniform scale is multiplicative across frames.
    pub fn scale(&self, scale: f64) -> f64 {
        scale * self.scale
    }

    pub fn scale_vec(&self, scale: Vec2) -> Vec2 {
        scale * self.scale
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::identity()
    }
}
