//! Rasterization: queued triangles in, shaded pixels out.
//!
//! Each job claims a batch of up to four triangles through a shared counter,
//! sets the batch up in lane form, then walks each surviving triangle's
//! bounding box four pixels at a time with incrementally evaluated integer
//! edge functions. Depth and color are written through one lane-wise blend
//! mask so a pixel's depth update and color update always land together.
//!
//! Coverage on shared edges uses the ordered tie-break rule (see
//! [`edge_accepts_zero`]) so adjacent triangles neither double-shade nor
//! leave seams.

use crate::buffer::Framebuffer;
use crate::pipeline::queue::{QueuedTriangle, TriangleQueue};
use crate::shader::Varyings;
use crate::simd::{F32x4, I32x4, LANES};
use glam::{Vec2, Vec3, Vec4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// State shared by all raster jobs of one frame.
pub(crate) struct RasterShared {
    pub queue: Arc<TriangleQueue>,
    pub target: Arc<Framebuffer>,
    /// Next unclaimed batch.
    pub cursor: AtomicUsize,
}

/// Claim one batch of triangles and rasterize it.
pub(crate) fn run_batch(shared: &RasterShared) {
    let batch = shared.cursor.fetch_add(1, Ordering::Relaxed);
    let total = shared.queue.len();

    let first = batch * LANES;
    if first >= total {
        return;
    }
    let count = (total - first).min(LANES);

    let mut triangles: [Option<&QueuedTriangle>; LANES] = [None; LANES];
    for (lane, slot) in triangles.iter_mut().enumerate().take(count) {
        *slot = Some(shared.queue.get(first + lane));
    }

    rasterize_group(&triangles, &shared.target);
}

/// Tie-break: does a sample on the edge line (E == 0) belong to this
/// triangle? `a` is the edge function's x gradient, `b` its y gradient.
#[inline]
fn edge_accepts_zero(a: i32, b: i32) -> bool {
    if a > 0 {
        return true;
    }
    if a < 0 {
        return false;
    }
    b >= 0
}

/// Per-edge coverage mask for four samples: E > 0, or E == 0 on an accepting
/// edge.
#[inline]
fn edge_mask(e: I32x4, accepts_zero: I32x4) -> I32x4 {
    let zero = I32x4::splat(0);
    e.cmp_gt(zero) | (e.cmp_eq(zero) & accepts_zero)
}

/// Perspective-correct interpolation of the three vertex varying records at
/// four samples.
///
/// Each attribute is premultiplied by its vertex's reciprocal-w, combined
/// with the normalized barycentric weights, then divided by the interpolated
/// reciprocal-w (`factor`).
#[inline]
pub(crate) fn interpolate_quad(
    varyings: &[Varyings; 3],
    weights: [F32x4; 3],
    w_rcp: [F32x4; 3],
    factor: F32x4,
) -> [Varyings; LANES] {
    let mut quad = [Varyings::ZERO; LANES];
    let corrected = [
        weights[0] * w_rcp[0],
        weights[1] * w_rcp[1],
        weights[2] * w_rcp[2],
    ];

    let blend = |a0: f32, a1: f32, a2: f32| -> [f32; LANES] {
        let mixed = F32x4::splat(a0) * corrected[0]
            + F32x4::splat(a1) * corrected[1]
            + F32x4::splat(a2) * corrected[2];
        (mixed * factor).to_array()
    };

    for i in 0..varyings[0].vec4.len() {
        let x = blend(varyings[0].vec4[i].x, varyings[1].vec4[i].x, varyings[2].vec4[i].x);
        let y = blend(varyings[0].vec4[i].y, varyings[1].vec4[i].y, varyings[2].vec4[i].y);
        let z = blend(varyings[0].vec4[i].z, varyings[1].vec4[i].z, varyings[2].vec4[i].z);
        let w = blend(varyings[0].vec4[i].w, varyings[1].vec4[i].w, varyings[2].vec4[i].w);
        for lane in 0..LANES {
            quad[lane].vec4[i] = Vec4::new(x[lane], y[lane], z[lane], w[lane]);
        }
    }
    for i in 0..varyings[0].vec3.len() {
        let x = blend(varyings[0].vec3[i].x, varyings[1].vec3[i].x, varyings[2].vec3[i].x);
        let y = blend(varyings[0].vec3[i].y, varyings[1].vec3[i].y, varyings[2].vec3[i].y);
        let z = blend(varyings[0].vec3[i].z, varyings[1].vec3[i].z, varyings[2].vec3[i].z);
        for lane in 0..LANES {
            quad[lane].vec3[i] = Vec3::new(x[lane], y[lane], z[lane]);
        }
    }
    for i in 0..varyings[0].vec2.len() {
        let x = blend(varyings[0].vec2[i].x, varyings[1].vec2[i].x, varyings[2].vec2[i].x);
        let y = blend(varyings[0].vec2[i].y, varyings[1].vec2[i].y, varyings[2].vec2[i].y);
        for lane in 0..LANES {
            quad[lane].vec2[i] = Vec2::new(x[lane], y[lane]);
        }
    }
    quad
}

fn rasterize_group(triangles: &[Option<&QueuedTriangle>; LANES], target: &Framebuffer) {
    let width = target.width();
    let height = target.height();

    // Screen positions of the group in lane form: vertex-major, axis per
    // register. Missing lanes stay at the origin and die on the area test.
    let pos = |lane: usize, v: usize| -> Vec4 {
        triangles[lane].map_or(Vec4::W, |t| t.pos[v])
    };

    let mut xf = [F32x4::splat(0.0); 3];
    let mut yf = [F32x4::splat(0.0); 3];
    let mut zf = [F32x4::splat(0.0); 3];
    let mut wr = [F32x4::splat(1.0); 3];
    for v in 0..3 {
        // Half-pixel shift puts the integer grid on sample centers.
        let half = F32x4::splat(0.5);
        xf[v] = half + F32x4::from_array([pos(0, v).x, pos(1, v).x, pos(2, v).x, pos(3, v).x]);
        yf[v] = half + F32x4::from_array([pos(0, v).y, pos(1, v).y, pos(2, v).y, pos(3, v).y]);
        zf[v] = F32x4::from_array([pos(0, v).z, pos(1, v).z, pos(2, v).z, pos(3, v).z]);
        wr[v] = F32x4::from_array([pos(0, v).w, pos(1, v).w, pos(2, v).w, pos(3, v).w]);
    }

    // Bounding boxes clamped to the frame. A box that misses the frame
    // entirely ends up inverted and its pixel loops never run.
    let min_x = xf[0].min(xf[1]).min(xf[2]).max(F32x4::splat(0.0)).to_i32_round();
    let max_x = xf[0]
        .max(xf[1])
        .max(xf[2])
        .min(F32x4::splat((width - 1) as f32))
        .to_i32_round();
    let min_y = yf[0].min(yf[1]).min(yf[2]).max(F32x4::splat(0.0)).to_i32_round();
    let max_y = yf[0]
        .max(yf[1])
        .max(yf[2])
        .min(F32x4::splat((height - 1) as f32))
        .to_i32_round();

    // Integer sample coordinates for exact edge functions.
    let xi: [I32x4; 3] = [xf[0].to_i32_round(), xf[1].to_i32_round(), xf[2].to_i32_round()];
    let yi: [I32x4; 3] = [yf[0].to_i32_round(), yf[1].to_i32_round(), yf[2].to_i32_round()];

    // Edge function coefficients, counter-clockwise convention:
    // E_v(x, y) = a_v*x + b_v*y + c_v is the edge opposite vertex v.
    let a0 = yi[2] - yi[1];
    let a1 = yi[0] - yi[2];
    let a2 = yi[1] - yi[0];

    let b0 = xi[1] - xi[2];
    let b1 = xi[2] - xi[0];
    let b2 = xi[0] - xi[1];

    let c0 = xi[2] * yi[1] - xi[1] * yi[2];
    let c1 = xi[0] * yi[2] - xi[2] * yi[0];
    let c2 = xi[1] * yi[0] - xi[0] * yi[1];

    // Signed double area; non-positive lanes are back-facing or degenerate.
    let double_area = b1 * a2 - b2 * a1;
    let inv_area = double_area.to_f32().recip();

    // Affine depth deltas, pre-normalized by the area.
    let z_d1 = (zf[1] - zf[0]) * inv_area;
    let z_d2 = (zf[2] - zf[0]) * inv_area;

    let area = double_area.to_array();
    let inv_area = inv_area.to_array();
    let (min_x, max_x) = (min_x.to_array(), max_x.to_array());
    let (min_y, max_y) = (min_y.to_array(), max_y.to_array());
    let (a0, a1, a2) = (a0.to_array(), a1.to_array(), a2.to_array());
    let (b0, b1, b2) = (b0.to_array(), b1.to_array(), b2.to_array());
    let (c0, c1, c2) = (c0.to_array(), c1.to_array(), c2.to_array());
    let z0 = zf[0].to_array();
    let (z_d1, z_d2) = (z_d1.to_array(), z_d2.to_array());
    let w_rcp = [wr[0].to_array(), wr[1].to_array(), wr[2].to_array()];

    for lane in 0..LANES {
        let Some(triangle) = triangles[lane] else {
            break;
        };
        if area[lane] <= 0 {
            continue;
        }

        rasterize_one(
            triangle,
            target,
            TriangleSetup {
                min_x: min_x[lane],
                max_x: max_x[lane],
                min_y: min_y[lane],
                max_y: max_y[lane],
                edges: [
                    (a0[lane], b0[lane], c0[lane]),
                    (a1[lane], b1[lane], c1[lane]),
                    (a2[lane], b2[lane], c2[lane]),
                ],
                inv_area: inv_area[lane],
                z0: z0[lane],
                z_delta: [z_d1[lane], z_d2[lane]],
                w_rcp: [w_rcp[0][lane], w_rcp[1][lane], w_rcp[2][lane]],
            },
        );
    }
}

struct TriangleSetup {
    min_x: i32,
    max_x: i32,
    min_y: i32,
    max_y: i32,
    /// (a, b, c) per edge.
    edges: [(i32, i32, i32); 3],
    inv_area: f32,
    z0: f32,
    z_delta: [f32; 2],
    w_rcp: [f32; 3],
}

fn rasterize_one(triangle: &QueuedTriangle, target: &Framebuffer, setup: TriangleSetup) {
    if setup.min_x > setup.max_x || setup.min_y > setup.max_y {
        return;
    }

    let width = target.width();
    let depth_base = target.depth_ptr();
    let color_base = target.color_ptr();

    let [(a0, b0, c0), (a1, b1, c1), (a2, b2, c2)] = setup.edges;

    let accept = |a: i32, b: i32| I32x4::splat(if edge_accepts_zero(a, b) { -1 } else { 0 });
    let (tb0, tb1, tb2) = (accept(a0, b0), accept(a1, b1), accept(a2, b2));

    // E at the box origin for the group's four columns.
    let cols = I32x4::splat(setup.min_x) + I32x4::iota();
    let at_origin = |a: i32, b: i32, c: i32| {
        I32x4::splat(a) * cols + I32x4::splat(b * setup.min_y + c)
    };
    let mut e0_row = at_origin(a0, b0, c0);
    let mut e1_row = at_origin(a1, b1, c1);
    let mut e2_row = at_origin(a2, b2, c2);

    // Column step covers four pixels; row step is one scanline.
    let a0_step = I32x4::splat(a0 << 2);
    let a1_step = I32x4::splat(a1 << 2);
    let a2_step = I32x4::splat(a2 << 2);
    let (b0_step, b1_step, b2_step) = (I32x4::splat(b0), I32x4::splat(b1), I32x4::splat(b2));

    let inv_area = F32x4::splat(setup.inv_area);
    let z0 = F32x4::splat(setup.z0);
    let z_d1 = F32x4::splat(setup.z_delta[0]);
    let z_d2 = F32x4::splat(setup.z_delta[1]);
    let z_step = F32x4::splat(((a1 << 2) as f32) * setup.z_delta[0] + ((a2 << 2) as f32) * setup.z_delta[1]);
    let w_rcp = [
        F32x4::splat(setup.w_rcp[0]),
        F32x4::splat(setup.w_rcp[1]),
        F32x4::splat(setup.w_rcp[2]),
    ];

    // Mask group lanes that run past the box (and thus the frame) edge.
    let max_col = I32x4::splat(setup.max_x);

    for y in setup.min_y..=setup.max_y {
        let mut e0 = e0_row;
        let mut e1 = e1_row;
        let mut e2 = e2_row;
        let mut depth = z0 + e1.to_f32() * z_d1 + e2.to_f32() * z_d2;
        let mut col = cols;

        let mut x = setup.min_x;
        while x <= setup.max_x {
            let coverage = edge_mask(e0, tb0) & edge_mask(e1, tb1) & edge_mask(e2, tb2);
            let in_row = col.cmp_le(max_col);
            let mask = coverage & in_row;

            if mask.any() {
                let index = y as usize * width + x as usize;
                let depth_ptr = unsafe { depth_base.add(index) };
                let previous = unsafe { F32x4::load(depth_ptr) };

                // Strictly nearer wins.
                let nearer = depth.cmp_lt(previous);
                let write = nearer & mask;

                if write.any() {
                    unsafe { F32x4::select(write, depth, previous).store(depth_ptr) };

                    // Normalized barycentric weights.
                    let w0 = e0.to_f32() * inv_area;
                    let w1 = e1.to_f32() * inv_area;
                    let w2 = e2.to_f32() * inv_area;

                    let w_interp = w_rcp[0] * w0 + w_rcp[1] * w1 + w_rcp[2] * w2;
                    let factor = w_interp.recip();

                    let quad = interpolate_quad(&triangle.varyings, [w0, w1, w2], w_rcp, factor);

                    // Scalar fan-out: one shading call per surviving lane.
                    let lanes = write.to_array();
                    let mut colors = [0i32; 4];
                    for (lane, color) in colors.iter_mut().enumerate() {
                        if lanes[lane] != 0 {
                            *color = triangle.program.shade_fragment(&quad[lane]).to_u32() as i32;
                        }
                    }

                    let color_ptr = unsafe { color_base.add(index) } as *mut i32;
                    let original = unsafe { I32x4::load(color_ptr) };
                    let blended = I32x4::select(write, I32x4::from_array(colors), original);
                    unsafe { blended.store(color_ptr) };
                }
            }

            e0 = e0 + a0_step;
            e1 = e1 + a1_step;
            e2 = e2 + a2_step;
            depth = depth + z_step;
            col = col + I32x4::splat(4);
            x += 4;
        }

        e0_row = e0_row + b0_step;
        e1_row = e1_row + b1_step;
        e2_row = e2_row + b2_step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tie_break_order() {
        // a > 0 accepts regardless of b.
        assert!(edge_accepts_zero(1, -5));
        // a < 0 rejects regardless of b.
        assert!(!edge_accepts_zero(-1, 5));
        // Horizontal gradient zero: sign of b decides, b == 0 accepts.
        assert!(edge_accepts_zero(0, 1));
        assert!(!edge_accepts_zero(0, -1));
        assert!(edge_accepts_zero(0, 0));
    }

    #[test]
    fn edge_mask_combines_sign_and_tie_break() {
        let e = I32x4::from_array([3, 0, -2, 0]);
        let accepting = I32x4::splat(-1);
        let rejecting = I32x4::splat(0);
        assert_eq!(edge_mask(e, accepting).to_array(), [-1, -1, 0, -1]);
        assert_eq!(edge_mask(e, rejecting).to_array(), [-1, 0, 0, 0]);
    }

    #[test]
    fn interpolation_at_vertices_reproduces_attributes() {
        // Unit barycentric weights must round-trip each vertex's varyings,
        // whatever the vertex w values are.
        let mut varyings = [Varyings::ZERO; 3];
        varyings[0].vec2[0] = Vec2::new(0.25, 0.5);
        varyings[1].vec2[0] = Vec2::new(0.75, 0.125);
        varyings[2].vec2[0] = Vec2::new(0.0, 1.0);
        varyings[0].vec3[0] = Vec3::new(1.0, 2.0, 3.0);
        varyings[1].vec3[0] = Vec3::new(-1.0, 0.5, 2.0);
        varyings[2].vec3[0] = Vec3::new(4.0, -2.0, 0.0);

        let w_rcp = [F32x4::splat(1.0), F32x4::splat(0.5), F32x4::splat(2.0)];

        for v in 0..3 {
            let unit = |i: usize| F32x4::splat(if i == v { 1.0 } else { 0.0 });
            let weights = [unit(0), unit(1), unit(2)];
            let w_interp = w_rcp[0] * weights[0] + w_rcp[1] * weights[1] + w_rcp[2] * weights[2];
            let quad = interpolate_quad(&varyings, weights, w_rcp, w_interp.recip());

            assert_relative_eq!(quad[0].vec2[0].x, varyings[v].vec2[0].x, epsilon = 1e-5);
            assert_relative_eq!(quad[0].vec2[0].y, varyings[v].vec2[0].y, epsilon = 1e-5);
            assert_relative_eq!(quad[0].vec3[0].x, varyings[v].vec3[0].x, epsilon = 1e-5);
            assert_relative_eq!(quad[0].vec3[0].y, varyings[v].vec3[0].y, epsilon = 1e-5);
            assert_relative_eq!(quad[0].vec3[0].z, varyings[v].vec3[0].z, epsilon = 1e-5);
        }
    }

    #[test]
    fn interpolation_midpoint_is_perspective_correct() {
        // Two vertices with equal weight but different w: the attribute
        // must bias toward the nearer vertex (larger 1/w).
        let mut varyings = [Varyings::ZERO; 3];
        varyings[0].vec2[0] = Vec2::new(0.0, 0.0);
        varyings[1].vec2[0] = Vec2::new(1.0, 0.0);
        varyings[2].vec2[0] = Vec2::new(0.0, 0.0);

        let w_rcp = [F32x4::splat(1.0), F32x4::splat(3.0), F32x4::splat(1.0)];
        let weights = [F32x4::splat(0.5), F32x4::splat(0.5), F32x4::splat(0.0)];
        let w_interp = w_rcp[0] * weights[0] + w_rcp[1] * weights[1];
        let quad = interpolate_quad(&varyings, weights, w_rcp, w_interp.recip());

        // (0.5*3*1) / (0.5*1 + 0.5*3) = 0.75, not the affine 0.5.
        assert_relative_eq!(quad[0].vec2[0].x, 0.75, epsilon = 1e-5);
    }
}
