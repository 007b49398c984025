//! Screen tiles. Each tile is rasterized by exactly one worker, which owns a private copy
//! of the tile's depth and color cells for the duration of a draw.

use std::sync::Arc;

use nalgebra as na;
use na::Vector4;

use super::setup::TriangleSetup;
use crate::frame::{DepthBuffer, FrameBuffer};
use crate::primitive::{AttributeValue, Uniforms};
use crate::shader::{FragmentShader, ShaderOutputChannel, VertexShader};
use crate::texture::Texture;

/// Pixel rectangle, start inclusive and end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PixelRect {
    pub x_0: u32,
    pub y_0: u32,
    pub x_1: u32,
    pub y_1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        return self.x_1 - self.x_0;
    }

    pub fn height(&self) -> u32 {
        return self.y_1 - self.y_0;
    }

    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let rect = PixelRect {
            x_0: self.x_0.max(other.x_0),
            y_0: self.y_0.max(other.y_0),
            x_1: self.x_1.min(other.x_1),
            y_1: self.y_1.min(other.y_1),
        };
        if rect.x_0 >= rect.x_1 || rect.y_0 >= rect.y_1 {
            return None;
        }
        return Some(rect);
    }
}

/// Regular grid of square tiles covering the frame; border tiles are cut to fit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    columns: u32,
    rows: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        return Self {
            width,
            height,
            tile_size,
            columns: width.div_ceil(tile_size),
            rows: height.div_ceil(tile_size),
        };
    }

    pub fn tile_count(&self) -> usize {
        return (self.columns * self.rows) as usize;
    }

    pub fn rect(&self, tile: usize) -> PixelRect {
        let column = tile as u32 % self.columns;
        let row = tile as u32 / self.columns;
        return PixelRect {
            x_0: column * self.tile_size,
            y_0: row * self.tile_size,
            x_1: ((column + 1) * self.tile_size).min(self.width),
            y_1: ((row + 1) * self.tile_size).min(self.height),
        };
    }

    /// Lists, per tile, the setups whose bounds touch it, in submission order.
    pub fn bin(&self, setups: &[TriangleSetup]) -> Vec<Vec<u32>> {
        let mut bins = vec![Vec::new(); self.tile_count()];
        for (i, setup) in setups.iter().enumerate() {
            let bounds = setup.bounds;
            for row in bounds.y_0 / self.tile_size..=(bounds.y_1 - 1) / self.tile_size {
                for column in bounds.x_0 / self.tile_size..=(bounds.x_1 - 1) / self.tile_size {
                    bins[(row * self.columns + column) as usize].push(i as u32);
                }
            }
        }
        return bins;
    }
}

/// Private copy of the cells of one tile.
#[derive(Debug)]
pub(crate) struct TileTarget {
    rect: PixelRect,
    depth: Vec<f32>,
    // Same order as `DrawContext::channels`.
    channels: Vec<Vec<Vector4<f32>>>,
}

impl TileTarget {
    pub fn extract(
        rect: PixelRect,
        frame: &FrameBuffer,
        depth: &DepthBuffer,
        channels: &[(ShaderOutputChannel, usize)],
    ) -> Self {
        let stride = frame.width() as usize;
        let rows = || {
            (rect.y_0..rect.y_1).map(move |y| {
                let start = y as usize * stride + rect.x_0 as usize;
                start..start + rect.width() as usize
            })
        };

        let mut tile_depth = Vec::with_capacity((rect.width() * rect.height()) as usize);
        for row in rows() {
            tile_depth.extend_from_slice(&depth.data()[row]);
        }
        let mut tile_channels = Vec::with_capacity(channels.len());
        for (channel, _) in channels {
            let pixels = frame
                .channel(*channel)
                .expect("output channels are allocated before tiles are extracted");
            let mut tile_pixels = Vec::with_capacity(tile_depth.len());
            for row in rows() {
                tile_pixels.extend_from_slice(&pixels[row]);
            }
            tile_channels.push(tile_pixels);
        }

        return Self {
            rect,
            depth: tile_depth,
            channels: tile_channels,
        };
    }

    /// Writes the tile back into the full-size targets.
    pub fn store(&self, frame: &mut FrameBuffer, depth: &mut DepthBuffer, channels: &[(ShaderOutputChannel, usize)]) {
        let stride = frame.width() as usize;
        let tile_width = self.rect.width() as usize;
        for (local_row, y) in (self.rect.y_0..self.rect.y_1).enumerate() {
            let start = y as usize * stride + self.rect.x_0 as usize;
            let local = local_row * tile_width;
            depth.data_mut()[start..start + tile_width].copy_from_slice(&self.depth[local..local + tile_width]);
            for (k, (channel, _)) in channels.iter().enumerate() {
                if let Some(pixels) = frame.channel_mut(*channel) {
                    pixels[start..start + tile_width].copy_from_slice(&self.channels[k][local..local + tile_width]);
                }
            }
        }
    }
}

/// Read-only state of one draw call, shared by all tile workers.
pub(crate) struct DrawContext {
    pub primitive_id: u32,
    pub setups: Vec<TriangleSetup>,
    pub vertex_shader: Arc<dyn VertexShader>,
    pub fragment_shader: Arc<dyn FragmentShader>,
    pub uniforms: Uniforms,
    pub textures: Vec<Arc<dyn Texture>>,
    /// Channels written by this draw with their fragment shader slot.
    pub channels: Vec<(ShaderOutputChannel, usize)>,
}

pub(crate) struct TileJob {
    pub target: TileTarget,
    pub triangles: Vec<u32>,
}

pub(crate) struct TileResult {
    pub target: TileTarget,
    pub fragments: u64,
    pub depth_rejected: u64,
}

/// Rasterizes the binned triangles of one tile in submission order.
pub(crate) fn shade_tile(context: &DrawContext, job: TileJob) -> TileResult {
    let TileJob { mut target, triangles } = job;
    let mut fragments = 0;
    let mut depth_rejected = 0;
    let mut outputs = vec![Vector4::zeros(); context.fragment_shader.num_output_channel()];
    let mut interpolated = Vec::with_capacity(context.vertex_shader.num_outputs());
    let tile_rect = target.rect;

    for triangle in triangles {
        let setup = &context.setups[triangle as usize];
        let Some(rect) = setup.bounds.intersect(&tile_rect) else {
            continue;
        };
        // @OPTI edge values could be stepped incrementally instead of evaluated per pixel.
        for y in rect.y_0..rect.y_1 {
            for x in rect.x_0..rect.x_1 {
                let Some(edges) = setup.coverage(x, y) else {
                    continue;
                };
                let affine = setup.affine_weights(edges);
                let z = affine.dot(&setup.depth);
                let local = ((y - tile_rect.y_0) * tile_rect.width() + (x - tile_rect.x_0)) as usize;
                // Written as a negation so a NaN depth never passes.
                if !(z < target.depth[local]) {
                    depth_rejected += 1;
                    continue;
                }
                target.depth[local] = z;

                let weights = setup.perspective_weights(affine);
                interpolated.clear();
                for slot in 0..setup.outputs[0].len() {
                    interpolated.push(AttributeValue::blend(
                        [&setup.outputs[0][slot], &setup.outputs[1][slot], &setup.outputs[2][slot]],
                        weights,
                    ));
                }

                outputs.fill(Vector4::zeros());
                context.fragment_shader.do_shading(
                    &mut outputs,
                    context.vertex_shader.as_ref(),
                    &context.uniforms,
                    &interpolated,
                    &context.textures,
                );
                fragments += 1;

                for (k, (channel, slot)) in context.channels.iter().enumerate() {
                    target.channels[k][local] = match channel {
                        ShaderOutputChannel::Barycentric => setup.barycentric_id(context.primitive_id, weights),
                        _ => outputs[*slot],
                    };
                }
            }
        }
    }

    return TileResult {
        target,
        fragments,
        depth_rejected,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::vector;

    #[test]
    fn grid_cuts_border_tiles() {
        let grid = TileGrid::new(10, 5, 4);
        assert_eq!(grid.tile_count(), 6);
        assert_eq!(grid.rect(2), PixelRect { x_0: 8, y_0: 0, x_1: 10, y_1: 4 });
        assert_eq!(grid.rect(5), PixelRect { x_0: 8, y_0: 4, x_1: 10, y_1: 5 });
    }

    #[test]
    fn oversized_tile_covers_whole_frame() {
        let grid = TileGrid::new(10, 5, u32::MAX);
        assert_eq!(grid.tile_count(), 1);
        assert_eq!(grid.rect(0), PixelRect { x_0: 0, y_0: 0, x_1: 10, y_1: 5 });
    }

    #[test]
    fn rect_intersection() {
        let a = PixelRect { x_0: 0, y_0: 0, x_1: 4, y_1: 4 };
        let b = PixelRect { x_0: 3, y_0: 2, x_1: 8, y_1: 8 };
        assert_eq!(a.intersect(&b), Some(PixelRect { x_0: 3, y_0: 2, x_1: 4, y_1: 4 }));
        let c = PixelRect { x_0: 4, y_0: 0, x_1: 8, y_1: 4 };
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn tile_round_trips_through_targets() {
        let channels = [(ShaderOutputChannel::FinalColor, 0)];
        let mut frame = FrameBuffer::new(4, 3);
        frame.allocate(ShaderOutputChannel::FinalColor, Vector4::zeros());
        let mut depth = DepthBuffer::new(4, 3);
        let rect = PixelRect { x_0: 1, y_0: 1, x_1: 3, y_1: 3 };

        let mut target = TileTarget::extract(rect, &frame, &depth, &channels);
        assert_eq!(target.depth.len(), 4);
        target.depth[3] = 0.25;
        target.channels[0][3] = vector![1.0, 0.0, 0.0, 1.0];
        target.store(&mut frame, &mut depth, &channels);

        // Local pixel 3 is (2, 2) on screen.
        assert_eq!(depth.get(2, 2), Some(0.25));
        assert_eq!(depth.get(1, 1), Some(f32::INFINITY));
        assert_eq!(frame.pixel(ShaderOutputChannel::FinalColor, 2, 2), Some(vector![1.0, 0.0, 0.0, 1.0]));
        assert_eq!(frame.pixel(ShaderOutputChannel::FinalColor, 3, 2), Some(Vector4::zeros()));
    }
}
