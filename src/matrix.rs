//! 2D affine transform and axis-aligned rectangle math.
//!
//! The scene graph only ever needs 2D affine composition, so this wraps `glam::Affine2` rather
//! than hand-rolling a 3x3 matrix type — `glam` is already the math crate the
//! rest of the pack reaches for (see `myth`'s use of `glam::Affine3A` for its
//! 3D scene graph; `Affine2` is its 2D counterpart).

use glam::{Affine2, Mat2, Vec2};

/// An axis-aligned bounding box in world or screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect { min_x: 0.0, min_y: 0.0, max_x: 0.0, max_y: 0.0 };

    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { min_x: x, min_y: y, max_x: x + w, max_y: y + h }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn is_empty(&self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    /// Intersects two rects; the result is empty (possibly with min > max) if
    /// they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Expands the rect outward by `margin` on every side.
    pub fn expand(&self, margin: BoundsMargin) -> Rect {
        Rect {
            min_x: self.min_x - margin.left,
            min_y: self.min_y - margin.top,
            max_x: self.max_x + margin.right,
            max_y: self.max_y + margin.bottom,
        }
    }

    /// The bounding box of four arbitrary points (used after transforming a
    /// node's local corners by its world matrix).
    pub fn from_points(points: &[Vec2; 4]) -> Rect {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect { min_x, min_y, max_x, max_y }
    }
}

/// A scalar or 4-tuple expansion of the viewport used by the out-of-bounds
/// test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsMargin {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl BoundsMargin {
    pub fn uniform(margin: f32) -> Self {
        Self { top: margin, right: margin, bottom: margin, left: margin }
    }
}

impl Default for BoundsMargin {
    fn default() -> Self {
        Self::uniform(100.0)
    }
}

/// Builds the local transform matrix for a node from its geometry properties.
///
/// Mount subtracts `(mountX*w, mountY*h)` from the
/// position; pivot rotates/scales around `(pivotX*w, pivotY*h)` in local
/// space. Concretely:
///
/// `local = T(pos) * T(pivot) * R(rotation) * S(scale) * T(-pivot)`
///
/// where `pos = (x - mountX*w, y - mountY*h)` and `pivot = (pivotX*w, pivotY*h)`.
#[allow(clippy::too_many_arguments)]
pub fn local_transform(
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    mount_x: f32,
    mount_y: f32,
    pivot_x: f32,
    pivot_y: f32,
    scale_x: f32,
    scale_y: f32,
    rotation: f32,
) -> Affine2 {
    let pos = Vec2::new(x - mount_x * w, y - mount_y * h);
    let pivot = Vec2::new(pivot_x * w, pivot_y * h);

    let to_pos = Affine2::from_translation(pos);
    let to_pivot = Affine2::from_translation(pivot);
    let rotate = Affine2::from_mat2(Mat2::from_angle(rotation));
    let scale = Affine2::from_scale(Vec2::new(scale_x, scale_y));
    let from_pivot = Affine2::from_translation(-pivot);

    to_pos * to_pivot * rotate * scale * from_pivot
}

/// The four local-space corners of a node's `w x h` rect, in `(top-left,
/// top-right, bottom-right, bottom-left)` winding.
pub fn local_corners(w: f32, h: f32) -> [Vec2; 4] {
    [
        Vec2::new(0.0, 0.0),
        Vec2::new(w, 0.0),
        Vec2::new(w, h),
        Vec2::new(0.0, h),
    ]
}

pub fn transform_corners(matrix: &Affine2, corners: &[Vec2; 4]) -> [Vec2; 4] {
    [
        matrix.transform_point2(corners[0]),
        matrix.transform_point2(corners[1]),
        matrix.transform_point2(corners[2]),
        matrix.transform_point2(corners[3]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_local_transform_at_identity_geometry_is_identity() {
        let m = local_transform(0.0, 0.0, 100.0, 50.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 0.0);
        assert!(m.abs_diff_eq(Affine2::IDENTITY, 1e-6));
    }

    #[test]
    fn mount_offsets_position() {
        let m = local_transform(100.0, 100.0, 40.0, 20.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0, 0.0);
        let p = m.transform_point2(Vec2::new(0.0, 0.0));
        // mount 0.5 centers the node on (x, y): top-left lands at (x - w/2, y - h/2)
        assert!((p.x - 80.0).abs() < 1e-4);
        assert!((p.y - 90.0).abs() < 1e-4);
    }

    #[test]
    fn rect_intersect_of_disjoint_rects_is_empty() {
        let a = Rect::from_xywh(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_xywh(20.0, 20.0, 10.0, 10.0);
        let i = a.intersect(&b);
        assert!(i.is_empty());
    }

    #[test]
    fn rect_intersect_overlap() {
        let a = Rect::from_xywh(0.0, 0.0, 100.0, 100.0);
        let b = Rect::from_xywh(50.0, 50.0, 100.0, 100.0);
        let i = a.intersect(&b);
        assert_eq!(i, Rect::new(50.0, 50.0, 100.0, 100.0));
    }
}
