//! Renders a spinning textured cube through the full pipeline and writes
//! the last frame to `spin.ppm`. Stands in for a windowing collaborator;
//! everything above the pixel buffers is out of the library's scope.

use anyhow::{Context, Result};
use glam::{Mat4, Vec2, Vec3};
use log::info;
use rasterflow::config::{FRAME_HEIGHT, FRAME_WIDTH};
use rasterflow::{DrawCall, PixelProgram, Renderer, Rgba, Texture, Varyings, VertexOutput};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;

const FRAMES: usize = 60;

/// Vertex layout: position(3) uv(2) normal(3).
const VERTEX_STRIDE: usize = 8;

/// Textured draw with a single directional light.
struct Lit {
    mvp: Mat4,
    model: Mat4,
    texture: Texture,
    light_dir: Vec3,
}

impl PixelProgram for Lit {
    fn process_vertex(&self, vertex: &[f32]) -> VertexOutput {
        let position = Vec3::new(vertex[0], vertex[1], vertex[2]);
        let normal = Vec3::new(vertex[5], vertex[6], vertex[7]);

        let mut varyings = Varyings::ZERO;
        varyings.vec2[0] = Vec2::new(vertex[3], vertex[4]);
        varyings.vec3[0] = (self.model * normal.extend(0.0)).truncate();

        VertexOutput {
            clip: self.mvp * position.extend(1.0),
            varyings,
        }
    }

    fn shade_fragment(&self, varyings: &Varyings) -> Rgba {
        let uv = varyings.vec2[0];
        let normal = varyings.vec3[0].normalize_or_zero();

        let [r, g, b, _] = self.texture.sample(uv.x, uv.y);
        let lambert = normal.dot(-self.light_dir).max(0.0) * 0.85 + 0.15;

        Rgba::new(
            (r as f32 * lambert) as u8,
            (g as f32 * lambert) as u8,
            (b as f32 * lambert) as u8,
            255,
        )
    }
}

/// 8x8 checkerboard, RGB.
fn checkerboard() -> Texture {
    const SIZE: usize = 64;
    const CELL: usize = 8;
    let mut data = Vec::with_capacity(SIZE * SIZE * 3);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let light = ((x / CELL) + (y / CELL)) % 2 == 0;
            if light {
                data.extend_from_slice(&[222, 184, 135]);
            } else {
                data.extend_from_slice(&[139, 90, 43]);
            }
        }
    }
    Texture::from_bytes(SIZE, SIZE, 3, Arc::from(data))
}

/// Indexed unit cube: 4 vertices per face, counter-clockwise from outside.
fn cube() -> (Arc<[f32]>, Arc<[u32]>) {
    // (face normal, four corners)
    let faces: [(Vec3, [Vec3; 4]); 6] = [
        (
            Vec3::Z,
            [
                Vec3::new(-1.0, -1.0, 1.0),
                Vec3::new(1.0, -1.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(-1.0, 1.0, 1.0),
            ],
        ),
        (
            Vec3::NEG_Z,
            [
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(-1.0, 1.0, -1.0),
                Vec3::new(1.0, 1.0, -1.0),
            ],
        ),
        (
            Vec3::X,
            [
                Vec3::new(1.0, -1.0, 1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(1.0, 1.0, -1.0),
                Vec3::new(1.0, 1.0, 1.0),
            ],
        ),
        (
            Vec3::NEG_X,
            [
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(-1.0, -1.0, 1.0),
                Vec3::new(-1.0, 1.0, 1.0),
                Vec3::new(-1.0, 1.0, -1.0),
            ],
        ),
        (
            Vec3::Y,
            [
                Vec3::new(-1.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, -1.0),
                Vec3::new(-1.0, 1.0, -1.0),
            ],
        ),
        (
            Vec3::NEG_Y,
            [
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(1.0, -1.0, 1.0),
                Vec3::new(-1.0, -1.0, 1.0),
            ],
        ),
    ];
    let uvs = [
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 0.0),
    ];

    let mut vertices = Vec::with_capacity(6 * 4 * VERTEX_STRIDE);
    let mut indices = Vec::with_capacity(6 * 6);
    for (face, (normal, corners)) in faces.into_iter().enumerate() {
        let base = (face * 4) as u32;
        for (corner, uv) in corners.iter().zip(uvs) {
            vertices.extend_from_slice(&[
                corner.x, corner.y, corner.z, uv.x, uv.y, normal.x, normal.y, normal.z,
            ]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (Arc::from(vertices), Arc::from(indices))
}

fn write_ppm(path: &str, width: usize, height: usize, pixels: &[u32]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {path}"))?;
    let mut out = BufWriter::new(file);
    write!(out, "P6\n{width} {height}\n255\n")?;
    for &pixel in pixels {
        let rgba = Rgba(pixel);
        out.write_all(&[rgba.r(), rgba.g(), rgba.b()])?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut renderer = Renderer::new(FRAME_WIDTH, FRAME_HEIGHT);
    let (vertices, indices) = cube();
    let texture = checkerboard();

    let aspect = FRAME_WIDTH as f32 / FRAME_HEIGHT as f32;
    let projection = Mat4::perspective_rh_gl(60f32.to_radians(), aspect, 0.1, 100.0);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 1.5, 4.5), Vec3::ZERO, Vec3::Y);
    let light_dir = Vec3::new(0.4, -1.0, -0.6).normalize();

    for frame in 0..FRAMES {
        let start = Instant::now();

        let angle = frame as f32 * (std::f32::consts::TAU / FRAMES as f32);
        let model = Mat4::from_rotation_y(angle) * Mat4::from_rotation_x(angle * 0.5);

        let draw = DrawCall {
            vertices: Arc::clone(&vertices),
            indices: Arc::clone(&indices),
            vertex_stride: VERTEX_STRIDE,
            program: Arc::new(Lit {
                mvp: projection * view * model,
                model,
                texture: texture.clone(),
                light_dir,
            }),
        };
        renderer.render(&[draw]);

        info!(
            "frame {frame:2}: {:.2} ms",
            start.elapsed().as_secs_f64() * 1e3
        );
    }

    write_ppm(
        "spin.ppm",
        FRAME_WIDTH,
        FRAME_HEIGHT,
        renderer.target().color(),
    )?;
    info!("wrote spin.ppm");
    Ok(())
}
