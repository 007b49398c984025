//! Programmable stages of the pipeline.
//!
//! A vertex shader takes one object-space position plus the attributes bound to the
//! primitive and produces a clip-space position and a bundle of outputs. The rasterizer
//! interpolates that bundle and hands it to the fragment shader, which fills one color for
//! every output channel it maps.

pub mod analysis;

use std::marker::PhantomData;
use std::sync::Arc;

use nalgebra as na;
use na::{Vector3, Vector4};

use crate::primitive::{AttributeValue, Uniforms};
use crate::texture::Texture;

/// Enumerations with a dense ordinal, usable as keys of a [`SlotTable`].
pub trait Ordinal: Copy {
    fn ordinal(self) -> usize;
}

/// Semantic labels of attributes a vertex shader may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderInputType {
    Uv2,
    VertexColor3,
    VertexColor4,
    VertexNormal3,
}

impl ShaderInputType {
    pub const COUNT: usize = 4;
    pub const ALL: [ShaderInputType; Self::COUNT] = [
        ShaderInputType::Uv2,
        ShaderInputType::VertexColor3,
        ShaderInputType::VertexColor4,
        ShaderInputType::VertexNormal3,
    ];

    /// Width the bound attribute buffer must have.
    pub fn components(self) -> usize {
        return match self {
            ShaderInputType::Uv2 => 2,
            ShaderInputType::VertexColor3 | ShaderInputType::VertexNormal3 => 3,
            ShaderInputType::VertexColor4 => 4,
        };
    }
}

impl Ordinal for ShaderInputType {
    fn ordinal(self) -> usize {
        return self as usize;
    }
}

/// Semantic labels of the frame buffer channels a fragment shader may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderOutputChannel {
    FinalColor,
    Uv,
    VertexColor,
    WorldSpaceNormal,
    ViewSpaceNormal,
    WorldPosition,
    ViewPosition,
    /// Filled by the rasterizer itself with (primitive id, triangle index, u, v).
    Barycentric,
}

impl ShaderOutputChannel {
    pub const COUNT: usize = 8;
    pub const ALL: [ShaderOutputChannel; Self::COUNT] = [
        ShaderOutputChannel::FinalColor,
        ShaderOutputChannel::Uv,
        ShaderOutputChannel::VertexColor,
        ShaderOutputChannel::WorldSpaceNormal,
        ShaderOutputChannel::ViewSpaceNormal,
        ShaderOutputChannel::WorldPosition,
        ShaderOutputChannel::ViewPosition,
        ShaderOutputChannel::Barycentric,
    ];
}

impl Ordinal for ShaderOutputChannel {
    fn ordinal(self) -> usize {
        return self as usize;
    }
}

/// Label to physical slot indirection, stored as a fixed array indexed by the label ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTable<E, const N: usize> {
    slots: [Option<usize>; N],
    _label: PhantomData<E>,
}

pub type InputMapping = SlotTable<ShaderInputType, { ShaderInputType::COUNT }>;
pub type OutputMapping = SlotTable<ShaderOutputChannel, { ShaderOutputChannel::COUNT }>;

impl<E: Ordinal, const N: usize> Default for SlotTable<E, N> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<E: Ordinal, const N: usize> SlotTable<E, N> {
    /// Table with every label unmapped.
    pub fn new() -> Self {
        return Self {
            slots: [None; N],
            _label: PhantomData,
        };
    }

    /// Builder-style binding of `label` to `slot`.
    pub fn with(mut self, label: E, slot: usize) -> Self {
        self.bind(label, slot);
        return self;
    }

    pub fn bind(&mut self, label: E, slot: usize) {
        self.slots[label.ordinal()] = Some(slot);
    }

    pub fn unbind(&mut self, label: E) {
        self.slots[label.ordinal()] = None;
    }

    pub fn get(&self, label: E) -> Option<usize> {
        return self.slots[label.ordinal()];
    }

    /// One past the highest bound slot, zero for an empty table.
    pub fn slot_count(&self) -> usize {
        return self
            .slots
            .iter()
            .flatten()
            .map(|slot| slot + 1)
            .max()
            .unwrap_or(0);
    }
}

/// Per-vertex stage.
pub trait VertexShader: Send + Sync {
    /// Transforms one vertex. `inputs` holds one value per attribute slot of the primitive,
    /// in slot order; shaders pick theirs through [`VertexShader::input_mapping`]. Outputs
    /// are pushed in a fixed order the companion fragment shader relies on.
    fn do_shading(
        &self,
        position: Vector3<f32>,
        uniforms: &Uniforms,
        inputs: &[AttributeValue],
        outputs: &mut Vec<AttributeValue>,
    ) -> Vector4<f32>;

    /// Physical attribute slot bound to `input`, `None` if the shader does not consume it.
    fn input_mapping(&self, input: ShaderInputType) -> Option<usize>;

    /// Number of outputs pushed per vertex.
    fn num_outputs(&self) -> usize;
}

/// Per-fragment stage.
pub trait FragmentShader: Send + Sync {
    /// Writes `outputs[k]` for every channel mapped to slot `k`.
    fn do_shading(
        &self,
        outputs: &mut [Vector4<f32>],
        vertex_shader: &dyn VertexShader,
        uniforms: &Uniforms,
        interpolated: &[AttributeValue],
        textures: &[Arc<dyn Texture>],
    );

    /// Slot written for `channel`, `None` if the channel is not produced.
    fn output_mapping(&self, channel: ShaderOutputChannel) -> Option<usize>;

    /// Size of the `outputs` slice the caller has to provide.
    fn num_output_channel(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_dense() {
        for (i, input) in ShaderInputType::ALL.iter().enumerate() {
            assert_eq!(input.ordinal(), i);
        }
        for (i, channel) in ShaderOutputChannel::ALL.iter().enumerate() {
            assert_eq!(channel.ordinal(), i);
        }
    }

    #[test]
    fn slot_table_binds_and_counts() {
        let mut mapping = OutputMapping::new()
            .with(ShaderOutputChannel::FinalColor, 0)
            .with(ShaderOutputChannel::ViewPosition, 3);
        assert_eq!(mapping.get(ShaderOutputChannel::ViewPosition), Some(3));
        assert_eq!(mapping.get(ShaderOutputChannel::Uv), None);
        assert_eq!(mapping.slot_count(), 4);

        mapping.unbind(ShaderOutputChannel::ViewPosition);
        assert_eq!(mapping.slot_count(), 1);
        assert_eq!(InputMapping::default().slot_count(), 0);
    }
}
