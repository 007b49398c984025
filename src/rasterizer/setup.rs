//! Triangle setup: perspective divide, viewport mapping, orientation handling and the
//! fixed-point edge functions used for coverage.

use nalgebra as na;
use na::{Vector3, Vector4};

use super::tile::PixelRect;
use super::{Viewport, Winding};
use crate::primitive::{AttributeValue, CullMode};

/// Fractional bits of the sub-pixel grid raster positions are snapped to.
pub(crate) const SUBPIXEL_BITS: u32 = 8;
const SUBPIXEL_SCALE: f32 = (1 << SUBPIXEL_BITS) as f32;
const HALF_PIXEL: i64 = 1 << (SUBPIXEL_BITS - 1);
// Keeps edge function products well inside i64.
const GUARD_BAND: i64 = 1 << 29;

/// Output of the vertex shader for one vertex.
#[derive(Debug, Clone)]
pub(crate) struct ShadedVertex {
    pub clip: Vector4<f32>,
    pub outputs: Vec<AttributeValue>,
}

/// Raster position on the sub-pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FixedPoint {
    pub x: i64,
    pub y: i64,
}

/// Signed edge function of `p` relative to the directed edge `a -> b`.
/// Positive on the left of the edge as seen on screen with y growing down.
fn edge_function(a: FixedPoint, b: FixedPoint, p: FixedPoint) -> i64 {
    return (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x);
}

/// Everything the pixel loop needs about one triangle, already in the configured winding.
#[derive(Debug, Clone)]
pub(crate) struct TriangleSetup {
    pub triangle_index: u32,
    raster: [FixedPoint; 3],
    // Winding sign, so that inside is always positive.
    sign: i64,
    area: i64,
    // Edge i is the one opposite vertex i.
    top_left: [bool; 3],
    pub depth: Vector3<f32>,
    inv_w: Vector3<f32>,
    pub outputs: [Vec<AttributeValue>; 3],
    pub bounds: PixelRect,
    swapped: bool,
}

/// What happened to a triangle during setup.
#[derive(Debug)]
pub(crate) enum SetupOutcome {
    Ready(TriangleSetup),
    Culled,
    Degenerate,
    OffScreen,
}

/// Transforms the three shaded vertices of triangle `triangle_index` into a rasterizable setup.
pub(crate) fn setup_triangle(
    triangle_index: u32,
    vertices: [ShadedVertex; 3],
    viewport: &Viewport,
    winding: Winding,
    cull_mode: CullMode,
) -> SetupOutcome {
    let [v_0, mut v_1, mut v_2] = vertices;

    // No clipping stage, so anything at or behind the eye is dropped outright.
    for vertex in [&v_0, &v_1, &v_2] {
        if !(vertex.clip.w > 0.0) || !vertex.clip.iter().all(|c| c.is_finite()) {
            return SetupOutcome::Degenerate;
        }
    }

    let mut raster = [FixedPoint { x: 0, y: 0 }; 3];
    for (i, vertex) in [&v_0, &v_1, &v_2].into_iter().enumerate() {
        match to_fixed_point(vertex.clip, viewport) {
            Some(point) => raster[i] = point,
            None => return SetupOutcome::Degenerate,
        }
    }

    let sign = winding.sign();
    let mut area = sign * edge_function(raster[0], raster[1], raster[2]);
    if area == 0 {
        return SetupOutcome::Degenerate;
    }
    let mut swapped = false;
    if area < 0 {
        if cull_mode == CullMode::CullBack {
            return SetupOutcome::Culled;
        }
        // Flip to the configured orientation, taking all per-vertex data along.
        std::mem::swap(&mut v_1, &mut v_2);
        raster.swap(1, 2);
        area = sign * edge_function(raster[0], raster[1], raster[2]);
        swapped = true;
    }
    let Some(bounds) = covered_pixels(&raster, viewport) else {
        return SetupOutcome::OffScreen;
    };

    let inv_w = Vector3::new(1.0 / v_0.clip.w, 1.0 / v_1.clip.w, 1.0 / v_2.clip.w);
    let depth = Vector3::new(
        v_0.clip.z * inv_w.x,
        v_1.clip.z * inv_w.y,
        v_2.clip.z * inv_w.z,
    );
    let top_left = [
        is_top_left(raster[1], raster[2], sign),
        is_top_left(raster[2], raster[0], sign),
        is_top_left(raster[0], raster[1], sign),
    ];

    return SetupOutcome::Ready(TriangleSetup {
        triangle_index,
        raster,
        sign,
        area,
        top_left,
        depth,
        inv_w,
        outputs: [v_0.outputs, v_1.outputs, v_2.outputs],
        bounds,
        swapped,
    });
}

/// Perspective divide plus viewport mapping, snapped to the sub-pixel grid.
/// `None` for positions outside the guard band.
fn to_fixed_point(clip: Vector4<f32>, viewport: &Viewport) -> Option<FixedPoint> {
    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    // NDC y points up, raster rows grow down.
    let x_raster = (ndc_x + 1.0) / 2.0 * viewport.width as f32;
    let y_raster = (1.0 - ndc_y) / 2.0 * viewport.height as f32;
    let x = (x_raster * SUBPIXEL_SCALE).round();
    let y = (y_raster * SUBPIXEL_SCALE).round();
    let limit = GUARD_BAND as f32;
    if !(x.abs() <= limit && y.abs() <= limit) {
        return None;
    }
    return Some(FixedPoint { x: x as i64, y: y as i64 });
}

/// Pixels whose centers fall inside the triangle bounding box, clipped to the viewport.
fn covered_pixels(raster: &[FixedPoint; 3], viewport: &Viewport) -> Option<PixelRect> {
    let min_x = raster.iter().map(|p| p.x).min()?;
    let max_x = raster.iter().map(|p| p.x).max()?;
    let min_y = raster.iter().map(|p| p.y).min()?;
    let max_y = raster.iter().map(|p| p.y).max()?;
    let step = 1 << SUBPIXEL_BITS;

    // Pixel p has its center at p * step + HALF_PIXEL.
    let first_x = (min_x - HALF_PIXEL + step - 1).div_euclid(step).max(0);
    let last_x = (max_x - HALF_PIXEL).div_euclid(step).min(viewport.width as i64 - 1);
    let first_y = (min_y - HALF_PIXEL + step - 1).div_euclid(step).max(0);
    let last_y = (max_y - HALF_PIXEL).div_euclid(step).min(viewport.height as i64 - 1);
    if first_x > last_x || first_y > last_y {
        return None;
    }
    return Some(PixelRect {
        x_0: first_x as u32,
        y_0: first_y as u32,
        x_1: last_x as u32 + 1,
        y_1: last_y as u32 + 1,
    });
}

/// Whether samples exactly on edge `a -> b` belong to the triangle.
///
/// The edge function grows along its gradient; the edge is a left edge when the inside lies
/// towards +x, and a top edge when it is horizontal with the inside below it.
fn is_top_left(a: FixedPoint, b: FixedPoint, sign: i64) -> bool {
    let gradient_x = sign * (b.y - a.y);
    let gradient_y = -sign * (b.x - a.x);
    return gradient_x > 0 || (gradient_x == 0 && gradient_y > 0);
}

impl TriangleSetup {
    /// Edge values at the center of pixel (x, y) if the pixel is covered, following the
    /// top-left rule for samples lying exactly on an edge.
    pub fn coverage(&self, x: u32, y: u32) -> Option<[i64; 3]> {
        let step = 1 << SUBPIXEL_BITS;
        let sample = FixedPoint {
            x: x as i64 * step + HALF_PIXEL,
            y: y as i64 * step + HALF_PIXEL,
        };
        let [v_0, v_1, v_2] = self.raster;
        let weights = [
            self.sign * edge_function(v_1, v_2, sample),
            self.sign * edge_function(v_2, v_0, sample),
            self.sign * edge_function(v_0, v_1, sample),
        ];
        for i in 0..3 {
            if weights[i] < 0 || (weights[i] == 0 && !self.top_left[i]) {
                return None;
            }
        }
        return Some(weights);
    }

    /// Screen-space barycentric coordinates from edge values.
    pub fn affine_weights(&self, weights: [i64; 3]) -> Vector3<f32> {
        let area = self.area as f64;
        return Vector3::new(
            (weights[0] as f64 / area) as f32,
            (weights[1] as f64 / area) as f32,
            (weights[2] as f64 / area) as f32,
        );
    }

    /// Barycentric coordinates corrected by each vertex' 1/w.
    pub fn perspective_weights(&self, affine: Vector3<f32>) -> Vector3<f32> {
        let corrected = affine.component_mul(&self.inv_w);
        return corrected / corrected.sum();
    }

    /// Value of the barycentric debug channel: (primitive id, triangle index, u, v), with
    /// u and v the weights of the second and third vertex in submission order.
    pub fn barycentric_id(&self, primitive_id: u32, weights: Vector3<f32>) -> Vector4<f32> {
        let (u, v) = match self.swapped {
            true => (weights.z, weights.y),
            false => (weights.y, weights.z),
        };
        return Vector4::new(primitive_id as f32, self.triangle_index as f32, u, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::vector;

    fn viewport(width: u32, height: u32) -> Viewport {
        return Viewport { x: 0, y: 0, width, height };
    }

    fn vertex(x: f32, y: f32, w: f32) -> ShadedVertex {
        return ShadedVertex {
            clip: vector![x * w, y * w, 0.0, w],
            outputs: vec![AttributeValue::Vec2(vector![x, y])],
        };
    }

    fn unit_triangle() -> [ShadedVertex; 3] {
        return [vertex(0.0, 0.0, 1.0), vertex(1.0, 0.0, 1.0), vertex(0.0, 1.0, 1.0)];
    }

    fn ready(outcome: SetupOutcome) -> TriangleSetup {
        return match outcome {
            SetupOutcome::Ready(setup) => setup,
            other => panic!("expected a rasterizable triangle, got {:?}", other),
        };
    }

    #[test]
    fn maps_ndc_to_raster_with_y_flip() {
        let point = to_fixed_point(vector![1.0, 1.0, 0.0, 1.0], &viewport(4, 4)).unwrap();
        assert_eq!(point, FixedPoint { x: 4 * 256, y: 0 });
        let point = to_fixed_point(vector![-2.0, -2.0, 0.0, 2.0], &viewport(4, 4)).unwrap();
        assert_eq!(point, FixedPoint { x: 0, y: 4 * 256 });
    }

    #[test]
    fn counter_clockwise_triangle_is_front_facing() {
        let setup = ready(setup_triangle(0, unit_triangle(), &viewport(4, 4), Winding::CounterClockwise, CullMode::CullBack));
        assert!(!setup.swapped);
        assert!(setup.area > 0);
        assert_eq!(setup.bounds, PixelRect { x_0: 2, y_0: 0, x_1: 4, y_1: 2 });
    }

    #[test]
    fn back_face_is_culled_or_flipped() {
        let outcome = setup_triangle(0, unit_triangle(), &viewport(4, 4), Winding::Clockwise, CullMode::CullBack);
        assert!(matches!(outcome, SetupOutcome::Culled));

        let setup = ready(setup_triangle(0, unit_triangle(), &viewport(4, 4), Winding::Clockwise, CullMode::Disabled));
        assert!(setup.swapped);
        assert!(setup.area > 0);
        // Outputs travel with their vertex.
        assert_eq!(setup.outputs[1][0], AttributeValue::Vec2(vector![0.0, 1.0]));
    }

    #[test]
    fn zero_area_and_behind_eye_are_degenerate() {
        let line = [vertex(0.0, 0.0, 1.0), vertex(0.5, 0.5, 1.0), vertex(1.0, 1.0, 1.0)];
        assert!(matches!(
            setup_triangle(0, line, &viewport(8, 8), Winding::CounterClockwise, CullMode::Disabled),
            SetupOutcome::Degenerate
        ));
        let mut behind = unit_triangle();
        behind[2].clip.w = -1.0;
        assert!(matches!(
            setup_triangle(0, behind, &viewport(8, 8), Winding::CounterClockwise, CullMode::Disabled),
            SetupOutcome::Degenerate
        ));
    }

    #[test]
    fn triangle_outside_viewport_is_off_screen() {
        let far_right = [vertex(2.0, 0.0, 1.0), vertex(3.0, 0.0, 1.0), vertex(2.0, 1.0, 1.0)];
        assert!(matches!(
            setup_triangle(0, far_right, &viewport(8, 8), Winding::CounterClockwise, CullMode::Disabled),
            SetupOutcome::OffScreen
        ));
    }

    #[test]
    fn opposite_edges_never_agree_on_ownership() {
        let a = FixedPoint { x: 100, y: 300 };
        let b = FixedPoint { x: 700, y: 50 };
        for sign in [1, -1] {
            assert_ne!(is_top_left(a, b, sign), is_top_left(b, a, sign));
        }
        let c = FixedPoint { x: 700, y: 300 };
        assert_ne!(is_top_left(a, c, 1), is_top_left(c, a, 1));
    }

    #[test]
    fn perspective_weights_favour_near_vertex() {
        let near_and_far = [vertex(-1.0, -1.0, 1.0), vertex(1.0, -1.0, 4.0), vertex(-1.0, 1.0, 4.0)];
        let setup = ready(setup_triangle(0, near_and_far, &viewport(8, 8), Winding::CounterClockwise, CullMode::Disabled));
        let affine = vector![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];
        let corrected = setup.perspective_weights(affine);
        assert_relative_eq!(corrected.sum(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(corrected, vector![4.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0], epsilon = 1e-6);
    }

    #[test]
    fn barycentric_id_reports_submission_order() {
        let setup = ready(setup_triangle(7, unit_triangle(), &viewport(4, 4), Winding::Clockwise, CullMode::Disabled));
        let id = setup.barycentric_id(3, vector![0.5, 0.2, 0.3]);
        // Swapped, so the weight of setup vertex 2 is the submitted second vertex.
        assert_eq!(id, vector![3.0, 7.0, 0.3, 0.2]);
    }
}
