//! The orchestrator: owns the render targets and runs primitives through the pipeline.
//!
//! Vertex shading and triangle setup run on the calling thread. Surviving triangles are
//! then binned into screen tiles and every non-empty tile is rasterized by a single pool
//! worker, so no two workers ever touch the same pixel and the result does not depend on
//! the number of workers.

mod setup;
mod tile;

use std::sync::{mpsc, Arc};

use nalgebra as na;
use na::Vector4;
use threadpool::ThreadPool;

use crate::frame::{DepthBuffer, FrameBuffer};
use crate::primitive::{AttributeValue, Primitive};
use crate::shader::{ShaderInputType, ShaderOutputChannel};
use setup::{setup_triangle, SetupOutcome, ShadedVertex};
use tile::{shade_tile, DrawContext, TileGrid, TileJob, TileResult, TileTarget};

/// Orientation, as seen on screen, of front-facing triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Winding {
    Clockwise,
    #[default]
    CounterClockwise,
}

impl Winding {
    /// Sign making edge functions of front-facing triangles positive inside.
    fn sign(self) -> i64 {
        return match self {
            Winding::Clockwise => -1,
            Winding::CounterClockwise => 1,
        };
    }
}

/// Region the pipeline renders into. `x` and `y` locate it on a larger surface for
/// consumers compositing several views; render targets are always `width` by `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        return Self { x: 0, y: 0, width, height };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizerConfig {
    pub viewport: Viewport,
    pub winding: Winding,
    /// Edge length of the square screen tiles handed to workers.
    pub tile_size: u32,
    /// Number of tile workers, one means everything runs on the calling thread.
    pub workers: usize,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        return Self {
            viewport: Viewport::new(800, 800),
            winding: Winding::default(),
            tile_size: 32,
            workers: std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1),
        };
    }
}

/// Counters describing what a single draw call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawStats {
    pub triangles: usize,
    pub rasterized: usize,
    pub culled: usize,
    pub degenerate: usize,
    pub off_screen: usize,
    pub fragments: u64,
    pub depth_rejected: u64,
    pub tiles: usize,
}

pub struct Rasterizer {
    config: RasterizerConfig,
    frame: FrameBuffer,
    depth: DepthBuffer,
    // Fill for channels allocated after the last clear.
    clear_color: Vector4<f32>,
    pool: Option<ThreadPool>,
}

impl Rasterizer {
    pub fn new(config: RasterizerConfig) -> Self {
        let Viewport { width, height, .. } = config.viewport;
        assert!(width > 0 && height > 0, "viewport must not be empty, got {}x{}", width, height);
        assert!(config.tile_size > 0, "tile size must be positive");

        let pool = match config.workers {
            0 | 1 => None,
            workers => Some(
                threadpool::Builder::new()
                    .num_threads(workers)
                    .thread_name(String::from("raster-tile"))
                    .build(),
            ),
        };
        log::info!(
            "rasterizer {}x{} ({:?}), {} px tiles, {} worker(s)",
            width,
            height,
            config.winding,
            config.tile_size,
            config.workers.max(1)
        );

        return Self {
            config,
            frame: FrameBuffer::new(width, height),
            depth: DepthBuffer::new(width, height),
            clear_color: Vector4::zeros(),
            pool,
        };
    }

    pub fn config(&self) -> &RasterizerConfig {
        return &self.config;
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        return &self.frame;
    }

    pub fn depth_buffer(&self) -> &DepthBuffer {
        return &self.depth;
    }

    /// Resets every allocated channel to `color` and the depth buffer to `depth`.
    /// Has to be called before the first draw of every frame, draws never clear.
    pub fn clear_buffers(&mut self, color: Vector4<f32>, depth: f32) {
        self.frame.clear(color);
        self.depth.clear(depth);
        self.clear_color = color;
    }

    /// [`Rasterizer::clear_buffers`] with the depth reset to infinitely far.
    pub fn clear_buffers_default(&mut self, color: Vector4<f32>) {
        self.clear_buffers(color, f32::INFINITY);
    }

    /// Runs every triangle of `primitive` through the pipeline into the render targets.
    ///
    /// Panics if the primitive is incomplete: missing shaders, an index buffer that is not
    /// a triangle list, or attributes the vertex shader reads that are missing, of the
    /// wrong width or too short.
    pub fn draw(&mut self, primitive: &Primitive) -> DrawStats {
        let vertex_shader = match primitive.vertex_shader() {
            Some(shader) => Arc::clone(shader),
            None => panic!("primitive {} has no vertex shader bound", primitive.id()),
        };
        let fragment_shader = match primitive.fragment_shader() {
            Some(shader) => Arc::clone(shader),
            None => panic!("primitive {} has no fragment shader bound", primitive.id()),
        };
        let indices = primitive.indices();
        let vertices = primitive.vertices();
        let attributes = primitive.attributes();
        assert!(
            indices.len() % 3 == 0,
            "index buffer of primitive {} holds {} entries, not a triangle list",
            primitive.id(),
            indices.len()
        );

        // Attribute slots the vertex shader actually reads, everything else is left alone.
        let mut consumed = vec![false; attributes.len()];
        for input in ShaderInputType::ALL {
            let Some(slot) = vertex_shader.input_mapping(input) else {
                continue;
            };
            assert!(
                slot < attributes.len(),
                "vertex shader reads {:?} from slot {}, but primitive {} has {} attribute buffer(s)",
                input,
                slot,
                primitive.id(),
                attributes.len()
            );
            let attribute = &attributes[slot];
            assert_eq!(
                attribute.components(),
                input.components(),
                "attribute slot {} bound to {:?} has the wrong width",
                slot,
                input
            );
            assert!(
                attribute.index_len() >= indices.len(),
                "attribute slot {} indexes {} vertices, geometry needs {}",
                slot,
                attribute.index_len(),
                indices.len()
            );
            consumed[slot] = true;
        }

        let mut channels = Vec::new();
        for channel in ShaderOutputChannel::ALL {
            if let Some(slot) = fragment_shader.output_mapping(channel) {
                assert!(
                    channel == ShaderOutputChannel::Barycentric || slot < fragment_shader.num_output_channel(),
                    "fragment shader maps {:?} to slot {} past its {} outputs",
                    channel,
                    slot,
                    fragment_shader.num_output_channel()
                );
                if self.frame.allocate(channel, self.clear_color) {
                    log::debug!("allocated {:?} channel", channel);
                }
                channels.push((channel, slot));
            }
        }

        // Camera code may be writing the block from another thread, so draw from a snapshot.
        let uniforms = match primitive.ubo().read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };

        let mut stats = DrawStats {
            triangles: primitive.triangle_count(),
            ..Default::default()
        };
        let mut setups = Vec::new();
        let mut inputs = Vec::with_capacity(attributes.len());
        for triangle in 0..primitive.triangle_count() {
            let shaded: [ShadedVertex; 3] = std::array::from_fn(|corner| {
                let slot = 3 * triangle + corner;
                let vertex_index = indices[slot] as usize;
                assert!(
                    vertex_index < vertices.len(),
                    "index {} points past {} vertices",
                    vertex_index,
                    vertices.len()
                );
                inputs.clear();
                for (attribute, read) in attributes.iter().zip(&consumed) {
                    inputs.push(match *read {
                        true => attribute.value(slot),
                        false => AttributeValue::Vec4(Vector4::zeros()),
                    });
                }
                let mut outputs = Vec::with_capacity(vertex_shader.num_outputs());
                let clip = vertex_shader.do_shading(vertices[vertex_index], &uniforms, &inputs, &mut outputs);
                assert_eq!(
                    outputs.len(),
                    vertex_shader.num_outputs(),
                    "vertex shader pushed a different number of outputs than it declares"
                );
                ShadedVertex { clip, outputs }
            });

            match setup_triangle(
                triangle as u32,
                shaded,
                &self.config.viewport,
                self.config.winding,
                primitive.cull_mode(),
            ) {
                SetupOutcome::Ready(setup) => setups.push(setup),
                SetupOutcome::Culled => stats.culled += 1,
                SetupOutcome::Degenerate => {
                    log::trace!("primitive {}: triangle {} is degenerate", primitive.id(), triangle);
                    stats.degenerate += 1;
                }
                SetupOutcome::OffScreen => {
                    log::trace!("primitive {}: triangle {} is off screen", primitive.id(), triangle);
                    stats.off_screen += 1;
                }
            }
        }
        stats.rasterized = setups.len();

        let grid = TileGrid::new(self.config.viewport.width, self.config.viewport.height, self.config.tile_size);
        let bins = grid.bin(&setups);
        let jobs: Vec<TileJob> = bins
            .into_iter()
            .enumerate()
            .filter(|(_, triangles)| !triangles.is_empty())
            .map(|(tile, triangles)| TileJob {
                target: TileTarget::extract(grid.rect(tile), &self.frame, &self.depth, &channels),
                triangles,
            })
            .collect();
        stats.tiles = jobs.len();

        let context = Arc::new(DrawContext {
            primitive_id: primitive.id(),
            setups,
            vertex_shader,
            fragment_shader,
            uniforms,
            textures: primitive.textures().to_vec(),
            channels,
        });
        let results = self.run_jobs(&context, jobs);

        for result in results {
            result.target.store(&mut self.frame, &mut self.depth, &context.channels);
            stats.fragments += result.fragments;
            stats.depth_rejected += result.depth_rejected;
        }
        log::debug!("primitive {}: {:?}", primitive.id(), stats);
        return stats;
    }

    fn run_jobs(&self, context: &Arc<DrawContext>, jobs: Vec<TileJob>) -> Vec<TileResult> {
        let pool = match &self.pool {
            Some(pool) if jobs.len() > 1 => pool,
            _ => return jobs.into_iter().map(|job| shade_tile(context, job)).collect(),
        };

        let job_count = jobs.len();
        let (sender, receiver) = mpsc::channel();
        for job in jobs {
            let sender = sender.clone();
            let context = Arc::clone(context);
            pool.execute(move || {
                // The draw call keeps the receiver alive until every tile is back.
                let _ = sender.send(shade_tile(&context, job));
            });
        }
        drop(sender);

        let results: Vec<TileResult> = receiver.iter().take(job_count).collect();
        if results.len() != job_count {
            panic!(
                "{} of {} tile workers panicked while drawing primitive {}",
                job_count - results.len(),
                job_count,
                context.primitive_id
            );
        }
        return results;
    }
}
