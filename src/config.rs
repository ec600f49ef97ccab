//! Reference sizing for the pipeline. These are build-time parameters, not
//! runtime configuration; frame dimensions alone are constructor arguments
//! so independent renderer instances can differ.

/// Frame size used by the demo binary.
pub const FRAME_WIDTH: usize = 1024;
pub const FRAME_HEIGHT: usize = 512;

/// Worker threads in the pool (the submitting thread helps during drain).
pub const WORKER_THREADS: usize = 7;

/// Job ring capacity. Must cover the worst-case concurrent batch count of a
/// frame; overflow surfaces as a returned signal, not an abort.
pub const JOB_RING_CAPACITY: usize = 4096;

/// Triangles per setup chunk; one job processes one chunk.
pub const SETUP_CHUNK_TRIANGLES: usize = 64;

/// Capacity of the shared ready-to-rasterize triangle list.
pub const MAX_QUEUED_TRIANGLES: usize = 4096;

/// Varying attribute arities carried per vertex. Compile-time layout of the
/// pipeline, not a runtime schema.
pub const VARYING_VEC4S: usize = 0;
pub const VARYING_VEC3S: usize = 1;
pub const VARYING_VEC2S: usize = 1;
