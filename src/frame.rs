//! Render targets: a multi-channel color buffer and a depth buffer, both row-major with
//! (0, 0) at the top left corner.

use nalgebra as na;
use na::Vector4;

use crate::shader::{Ordinal, ShaderOutputChannel};

/// Color targets keyed by output channel. Channels nobody asked for stay unallocated.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    channels: [Option<Vec<Vector4<f32>>>; ShaderOutputChannel::COUNT],
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        return Self {
            width,
            height,
            channels: Default::default(),
        };
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    fn pixel_count(&self) -> usize {
        return self.width as usize * self.height as usize;
    }

    /// Makes sure `channel` exists, filling a fresh one with `fill`.
    /// Returns true if the channel had to be allocated.
    pub fn allocate(&mut self, channel: ShaderOutputChannel, fill: Vector4<f32>) -> bool {
        let pixel_count = self.pixel_count();
        let slot = &mut self.channels[channel.ordinal()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(vec![fill; pixel_count]);
        return true;
    }

    pub fn is_allocated(&self, channel: ShaderOutputChannel) -> bool {
        return self.channels[channel.ordinal()].is_some();
    }

    /// Channels currently holding data, in ordinal order.
    pub fn active_channels(&self) -> Vec<ShaderOutputChannel> {
        return ShaderOutputChannel::ALL
            .into_iter()
            .filter(|channel| self.is_allocated(*channel))
            .collect();
    }

    /// Sets every pixel of every allocated channel to `color`.
    pub fn clear(&mut self, color: Vector4<f32>) {
        for pixels in self.channels.iter_mut().flatten() {
            pixels.fill(color);
        }
    }

    /// Whole channel as a flat row-major slice.
    pub fn channel(&self, channel: ShaderOutputChannel) -> Option<&[Vector4<f32>]> {
        return self.channels[channel.ordinal()].as_deref();
    }

    pub(crate) fn channel_mut(&mut self, channel: ShaderOutputChannel) -> Option<&mut [Vector4<f32>]> {
        return self.channels[channel.ordinal()].as_deref_mut();
    }

    pub fn pixel(&self, channel: ShaderOutputChannel, x: u32, y: u32) -> Option<Vector4<f32>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y * self.width + x) as usize;
        return self.channel(channel).map(|pixels| pixels[index]);
    }
}

/// Per-pixel depth, smaller is nearer.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        return Self {
            width,
            height,
            data: vec![f32::INFINITY; width as usize * height as usize],
        };
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    pub fn clear(&mut self, depth: f32) {
        self.data.fill(depth);
    }

    pub fn data(&self) -> &[f32] {
        return &self.data;
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f32] {
        return &mut self.data;
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        return Some(self.data[(y * self.width + x) as usize]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::vector;

    #[test]
    fn channels_are_allocated_on_demand() {
        let mut frame = FrameBuffer::new(3, 2);
        assert!(frame.active_channels().is_empty());
        assert!(frame.allocate(ShaderOutputChannel::ViewSpaceNormal, Vector4::zeros()));
        assert!(!frame.allocate(ShaderOutputChannel::ViewSpaceNormal, Vector4::repeat(1.0)));
        assert_eq!(frame.active_channels(), vec![ShaderOutputChannel::ViewSpaceNormal]);
        assert_eq!(frame.channel(ShaderOutputChannel::ViewSpaceNormal).map(|pixels| pixels.len()), Some(6));
        assert_eq!(frame.pixel(ShaderOutputChannel::FinalColor, 0, 0), None);
    }

    #[test]
    fn clear_touches_only_allocated_channels() {
        let mut frame = FrameBuffer::new(2, 2);
        frame.allocate(ShaderOutputChannel::FinalColor, Vector4::zeros());
        frame.clear(vector![0.1, 0.2, 0.3, 1.0]);
        assert_eq!(frame.pixel(ShaderOutputChannel::FinalColor, 1, 1), Some(vector![0.1, 0.2, 0.3, 1.0]));
        assert!(!frame.is_allocated(ShaderOutputChannel::Uv));
        assert_eq!(frame.pixel(ShaderOutputChannel::FinalColor, 2, 0), None);
    }

    #[test]
    fn depth_starts_far_and_clears() {
        let mut depth = DepthBuffer::new(2, 1);
        assert_eq!(depth.get(1, 0), Some(f32::INFINITY));
        depth.clear(0.5);
        assert_eq!(depth.data(), &[0.5, 0.5]);
        assert_eq!(depth.get(0, 1), None);
    }
}
