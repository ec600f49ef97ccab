//! The pluggable vertex and fragment steps, and the data that flows between
//! them.
//!
//! A [`PixelProgram`] is injected per draw call; per-draw uniform data (the
//! MVP matrix, an optional texture) are fields of the implementing type and
//! opaque to the pipeline.

use crate::config::{VARYING_VEC2S, VARYING_VEC3S, VARYING_VEC4S};
use glam::{Vec2, Vec3, Vec4};

/// Per-vertex attributes produced by the vertex step and interpolated per
/// pixel. Fixed arity groups; counts are build-time constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Varyings {
    pub vec4: [Vec4; VARYING_VEC4S],
    pub vec3: [Vec3; VARYING_VEC3S],
    pub vec2: [Vec2; VARYING_VEC2S],
}

impl Varyings {
    pub const ZERO: Self = Self {
        vec4: [Vec4::ZERO; VARYING_VEC4S],
        vec3: [Vec3::ZERO; VARYING_VEC3S],
        vec2: [Vec2::ZERO; VARYING_VEC2S],
    };
}

impl Default for Varyings {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Output of one vertex-step invocation.
#[derive(Debug, Clone, Copy)]
pub struct VertexOutput {
    /// Clip-space position (pre viewport transform, pre perspective divide).
    pub clip: Vec4,
    pub varyings: Varyings,
}

/// RGBA pixel: bytes are [R, G, B, A] in memory order.
/// As a u32 on little-endian: 0xAABBGGRR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Rgba(pub u32);

impl Rgba {
    #[inline]
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(u32::from_le_bytes([r, g, b, a]))
    }

    #[inline]
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn r(self) -> u8 {
        self.0.to_le_bytes()[0]
    }
    #[inline]
    pub fn g(self) -> u8 {
        self.0.to_le_bytes()[1]
    }
    #[inline]
    pub fn b(self) -> u8 {
        self.0.to_le_bytes()[2]
    }
    #[inline]
    pub fn a(self) -> u8 {
        self.0.to_le_bytes()[3]
    }
}

/// The programmable stages of one draw call.
///
/// `process_vertex` receives the raw vertex record (stride-sized slice of
/// the draw's vertex buffer) and produces a clip-space position plus the
/// varying record. `shade_fragment` receives the perspective-correct
/// interpolated varyings of one covered, depth-passing pixel and produces
/// its packed color.
///
/// Both steps run concurrently on worker threads and must not fail; there
/// is no error channel in the pipeline.
pub trait PixelProgram: Send + Sync {
    fn process_vertex(&self, vertex: &[f32]) -> VertexOutput;

    fn shade_fragment(&self, varyings: &Varyings) -> Rgba;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_packs_little_endian() {
        let c = Rgba::new(0x11, 0x22, 0x33, 0x44);
        assert_eq!(c.to_u32(), 0x4433_2211);
        assert_eq!(c.r(), 0x11);
        assert_eq!(c.g(), 0x22);
        assert_eq!(c.b(), 0x33);
        assert_eq!(c.a(), 0x44);
    }
}
