//! Triangle setup: draw-call buffers in, screen-space triangles out.
//!
//! One job processes one chunk of the index buffer; chunks are claimed
//! through a shared counter so workers self-balance. Within a chunk,
//! triangles are perspective-divided four at a time in lane form.

use crate::config::SETUP_CHUNK_TRIANGLES;
use crate::pipeline::queue::{QueuedTriangle, TriangleQueue};
use crate::pipeline::DrawCall;
use crate::shader::Varyings;
use crate::simd::{F32x4, LANES};
use glam::{Mat4, Vec4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// State shared by all setup jobs of one draw call.
pub(crate) struct SetupShared {
    pub draw: DrawCall,
    pub viewport: Mat4,
    pub queue: Arc<TriangleQueue>,
    /// Next unclaimed chunk.
    pub cursor: AtomicUsize,
}

/// Claim one chunk and push its triangles to the shared queue.
pub(crate) fn run_chunk(shared: &SetupShared) {
    let chunk = shared.cursor.fetch_add(1, Ordering::Relaxed);
    let triangle_count = shared.draw.indices.len() / 3;

    let first = chunk * SETUP_CHUNK_TRIANGLES;
    if first >= triangle_count {
        return;
    }
    let last = (first + SETUP_CHUNK_TRIANGLES).min(triangle_count);

    let indices = &shared.draw.indices;
    let vertices = &shared.draw.vertices;
    let stride = shared.draw.vertex_stride;
    debug_assert!(stride > 0);

    let mut triangle = first;
    while triangle < last {
        let group = (last - triangle).min(LANES);

        // Vertex step + viewport transform, four triangles at a time.
        // Unused lanes keep w = 1 so the lane-wide reciprocal stays finite.
        let mut positions = [[Vec4::W; 3]; LANES];
        let mut varyings = [[Varyings::ZERO; 3]; LANES];

        for lane in 0..group {
            let base = (triangle + lane) * 3;
            for v in 0..3 {
                let index = indices[base + v] as usize;
                let record = &vertices[index * stride..(index + 1) * stride];
                let out = shared.draw.program.process_vertex(record);
                positions[lane][v] = shared.viewport * out.clip;
                varyings[lane][v] = out.varyings;
            }
        }

        for v in 0..3 {
            // Transpose the group's vertex v into per-axis lanes.
            let x = F32x4::from_array(positions.map(|p| p[v].x));
            let y = F32x4::from_array(positions.map(|p| p[v].y));
            let w = F32x4::from_array(positions.map(|p| p[v].w));

            // Perspective division. Z is deliberately left undivided: depth
            // then interpolates affinely in screen space.
            let w_rcp = w.recip();
            let x = (x * w_rcp).to_array();
            let y = (y * w_rcp).to_array();
            let w_rcp = w_rcp.to_array();

            for lane in 0..group {
                let p = &mut positions[lane][v];
                *p = Vec4::new(x[lane], y[lane], p.z, w_rcp[lane]);
            }
        }

        for lane in 0..group {
            shared.queue.push(QueuedTriangle {
                pos: positions[lane],
                varyings: varyings[lane],
                program: Arc::clone(&shared.draw.program),
            });
        }

        triangle += group;
    }
}
