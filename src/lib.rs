//! rasterflow: a parallel software triangle rasterizer.
//!
//! Indexed triangles go in; shaded pixels land in a packed color buffer and
//! an f32 depth buffer, with no hardware pipeline involved. The crate is
//! built from three pieces:
//!
//! - a [`jobs::JobSystem`]: bounded lock-free job ring, fixed worker pool,
//!   and a `drain` barrier;
//! - a triangle **setup stage** that runs the pluggable vertex step,
//!   applies the viewport transform and performs 4-wide perspective
//!   division;
//! - a **rasterization stage** that walks triangle bounding boxes four
//!   pixels at a time with integer edge functions, depth-tests against live
//!   buffer state and shades surviving lanes through the pluggable fragment
//!   step.
//!
//! [`Renderer`] owns all shared state; there are no process-wide globals,
//! so independent instances coexist and tests can render deterministically
//! with a zero-worker pool.
//!
//! ```no_run
//! use rasterflow::{DrawCall, Renderer};
//! use std::sync::Arc;
//! # use rasterflow::{PixelProgram, Rgba, Varyings, VertexOutput};
//! # struct Flat;
//! # impl PixelProgram for Flat {
//! #     fn process_vertex(&self, v: &[f32]) -> VertexOutput {
//! #         VertexOutput { clip: glam::Vec4::new(v[0], v[1], v[2], 1.0), varyings: Varyings::ZERO }
//! #     }
//! #     fn shade_fragment(&self, _: &Varyings) -> Rgba { Rgba::new(255, 255, 255, 255) }
//! # }
//!
//! let mut renderer = Renderer::new(1024, 512);
//! let draw = DrawCall {
//!     vertices: Arc::from(vec![-0.5f32, -0.5, 0.5, 0.5, -0.5, 0.5, 0.0, 0.5, 0.5]),
//!     indices: Arc::from(vec![0u32, 1, 2]),
//!     vertex_stride: 3,
//!     program: Arc::new(Flat),
//! };
//! renderer.render(&[draw]);
//! let pixels = renderer.target().color();
//! ```
//!
//! Known limitations, matching the reference pipeline this reimplements: no
//! clipping against the frustum (triangles straddling the camera plane
//! produce meaningless but non-crashing output), and no per-pixel
//! synchronization between workers rasterizing different triangles over the
//! same pixels at the same instant.

pub mod buffer;
pub mod config;
pub mod jobs;
pub mod pipeline;
pub mod shader;
pub mod simd;
pub mod texture;

pub use buffer::{Framebuffer, DEPTH_FAR};
pub use pipeline::{viewport_matrix, DrawCall, Renderer};
pub use shader::{PixelProgram, Rgba, Varyings, VertexOutput};
pub use texture::Texture;
