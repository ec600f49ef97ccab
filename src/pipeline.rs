//! Frame orchestration: the renderer context that ties the job system, the
//! triangle queue and the framebuffer together.
//!
//! A frame is two fan-out/barrier rounds on the job system:
//!
//! ```text
//! clear → setup jobs (chunked index buffer) → drain
//!       → raster jobs (triangle batches)    → drain → read target
//! ```
//!
//! Setup must fully drain before rasterization starts because raster jobs
//! read the triangle list setup publishes; `render` enforces that. Between
//! the two drains no other synchronization exists, and triangle order within
//! a stage is unspecified.

pub(crate) mod queue;
pub(crate) mod raster;
pub(crate) mod setup;

pub use queue::{QueuedTriangle, TriangleQueue};

use crate::buffer::Framebuffer;
use crate::config::{JOB_RING_CAPACITY, MAX_QUEUED_TRIANGLES, SETUP_CHUNK_TRIANGLES, WORKER_THREADS};
use crate::jobs::JobSystem;
use crate::shader::PixelProgram;
use crate::simd::LANES;
use glam::{Mat4, Vec4};
use log::{debug, warn};
use raster::RasterShared;
use setup::SetupShared;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

/// One draw call: externally-owned buffers plus the program that shades
/// them. The vertex and index data are read-only for the duration of the
/// frame; the caller mutates or replaces them between frames.
#[derive(Clone)]
pub struct DrawCall {
    /// Flat per-vertex float fields, `vertex_stride` per record.
    pub vertices: Arc<[f32]>,
    /// Vertex indices in triples; length must be a multiple of 3.
    pub indices: Arc<[u32]>,
    pub vertex_stride: usize,
    /// Vertex and fragment steps for this draw, uniforms included.
    pub program: Arc<dyn PixelProgram>,
}

/// Maps normalized device coordinates to pixel coordinates, y pointing
/// down, leaving z and w untouched.
pub fn viewport_matrix(width: usize, height: usize) -> Mat4 {
    let half_w = 0.5 * width as f32;
    let half_h = 0.5 * height as f32;
    Mat4::from_cols(
        Vec4::new(half_w, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -half_h, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(half_w, half_h, 0.0, 1.0),
    )
}

/// A self-contained rasterizer instance: job pool, triangle list, render
/// target. Instances are independent; tests can run several side by side.
pub struct Renderer {
    jobs: JobSystem,
    queue: Arc<TriangleQueue>,
    target: Arc<Framebuffer>,
    viewport: Mat4,
}

impl Renderer {
    /// Renderer with the reference worker pool size.
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_workers(width, height, WORKER_THREADS)
    }

    /// Renderer with an explicit pool size. Zero workers runs every job on
    /// the calling thread inside the drain barriers, which makes frames
    /// deterministic; overlapping triangles from concurrent batches are
    /// otherwise subject to the documented last-writer race.
    pub fn with_workers(width: usize, height: usize, workers: usize) -> Self {
        Self {
            jobs: JobSystem::new(workers, JOB_RING_CAPACITY),
            queue: Arc::new(TriangleQueue::new(MAX_QUEUED_TRIANGLES)),
            target: Arc::new(Framebuffer::new(width, height)),
            viewport: viewport_matrix(width, height),
        }
    }

    pub fn target(&self) -> &Framebuffer {
        &self.target
    }

    pub fn worker_count(&self) -> usize {
        self.jobs.worker_count()
    }

    /// Render one frame of draw calls into the target.
    ///
    /// # Panics
    /// Panics if a draw call's index count is not a multiple of 3, or if an
    /// index addresses past the vertex buffer (caller contract violations).
    pub fn render(&mut self, draws: &[DrawCall]) {
        self.target.clear();
        self.queue.reset();

        // Stage 1: triangle setup, one job per chunk of the index buffer.
        for draw in draws {
            assert!(
                draw.indices.len() % 3 == 0,
                "index buffer length {} is not a multiple of 3",
                draw.indices.len()
            );
            let triangles = draw.indices.len() / 3;
            if triangles == 0 {
                continue;
            }

            let shared = Arc::new(SetupShared {
                draw: draw.clone(),
                viewport: self.viewport,
                queue: Arc::clone(&self.queue),
                cursor: AtomicUsize::new(0),
            });

            for _ in 0..triangles.div_ceil(SETUP_CHUNK_TRIANGLES) {
                let shared = Arc::clone(&shared);
                self.jobs.submit(Box::new(move || setup::run_chunk(&shared)));
            }
        }
        self.jobs.drain();

        let queued = self.queue.len();
        if self.queue.dropped() > 0 {
            warn!(
                "triangle queue full: {} triangles dropped this frame",
                self.queue.dropped()
            );
        }
        debug!("frame: {queued} triangles queued for raster");
        if queued == 0 {
            return;
        }

        // Stage 2: rasterization, one job per batch of triangles.
        let shared = Arc::new(RasterShared {
            queue: Arc::clone(&self.queue),
            target: Arc::clone(&self.target),
            cursor: AtomicUsize::new(0),
        });
        for _ in 0..queued.div_ceil(LANES) {
            let shared = Arc::clone(&shared);
            self.jobs.submit(Box::new(move || raster::run_batch(&shared)));
        }
        self.jobs.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_maps_ndc_corners() {
        let vp = viewport_matrix(200, 100);
        let top_left = vp * Vec4::new(-1.0, 1.0, 0.0, 1.0);
        let bottom_right = vp * Vec4::new(1.0, -1.0, 0.5, 1.0);
        assert_eq!(top_left.truncate().truncate(), glam::Vec2::new(0.0, 0.0));
        assert_eq!(
            bottom_right.truncate().truncate(),
            glam::Vec2::new(200.0, 100.0)
        );
        // z and w pass through for the later perspective divide.
        assert_eq!(bottom_right.z, 0.5);
        assert_eq!(bottom_right.w, 1.0);
    }

    #[test]
    fn viewport_scales_translation_by_w() {
        // Clip-space w must scale the translation so the divide lands on
        // the same pixel as dividing first.
        let vp = viewport_matrix(100, 100);
        let clip = Vec4::new(0.5, 0.5, 0.25, 2.0);
        let screen = vp * clip;
        let divided = vp * (clip / clip.w);
        assert!((screen.x / screen.w - divided.x).abs() < 1e-5);
        assert!((screen.y / screen.w - divided.y).abs() < 1e-5);
    }
}
