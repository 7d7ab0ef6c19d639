// SPDX-License-Identifier: MIT OR Apache-2.0
//! 2D placement of an item's content on the canvas.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Pivot, translation, rotation and scale of a playlist item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemTransform {
    /// Point (in content space) that rotation and scale are applied around
    pub pivot: Point,
    /// Offset applied after rotation and scale
    pub translation: Vec2,
    /// Rotation in degrees, clockwise
    pub rotation: f64,
    /// Horizontal scale factor
    pub scale_x: f64,
    /// Vertical scale factor
    pub scale_y: f64,
}

impl Default for ItemTransform {
    fn default() -> Self {
        Self {
            pivot: Point::ORIGIN,
            translation: Vec2::ZERO,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }
}

impl ItemTransform {
    /// Create an identity transform around the given pivot
    pub fn with_pivot(pivot: Point) -> Self {
        Self {
            pivot,
            ..Self::default()
        }
    }

    /// Whether the transform leaves content untouched
    pub fn is_identity(&self) -> bool {
        self.translation == Vec2::ZERO
            && self.rotation == 0.0
            && self.scale_x == 1.0
            && self.scale_y == 1.0
    }

    /// Convert to an affine matrix.
    ///
    /// Order: T(translation) * T(pivot) * R(rotation) * S(scale) * T(-pivot)
    pub fn to_affine(&self) -> Affine {
        let pivot = self.pivot.to_vec2();
        Affine::translate(self.translation)
            * Affine::translate(pivot)
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
            * Affine::translate(-pivot)
    }
}
