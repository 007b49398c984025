//! Everything one draw call needs: geometry, attributes, uniforms, shaders, textures and
//! render state. Nothing is validated when set, the rasterizer checks it all on draw.

mod attribute;
mod uniform;

pub use attribute::{Attribute, AttributeBuffer, AttributeValue};
pub use uniform::{SharedUniforms, Uniforms};

use std::sync::Arc;

use nalgebra as na;
use na::Vector3;

use crate::shader::{FragmentShader, VertexShader};
use crate::texture::Texture;

/// Which triangles the rasterizer throws away before coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    /// Back faces are flipped around and drawn like front faces.
    #[default]
    Disabled,
    CullBack,
}

pub struct Primitive {
    id: u32,
    cull_mode: CullMode,
    vertices: Vec<Vector3<f32>>,
    indices: Vec<u32>,
    attributes: Vec<Attribute>,
    uniforms: SharedUniforms,
    vertex_shader: Option<Arc<dyn VertexShader>>,
    fragment_shader: Option<Arc<dyn FragmentShader>>,
    textures: Vec<Arc<dyn Texture>>,
}

impl Primitive {
    pub fn new(cull_mode: CullMode) -> Self {
        return Self {
            id: 0,
            cull_mode,
            vertices: Vec::new(),
            indices: Vec::new(),
            attributes: Vec::new(),
            uniforms: Uniforms::identity().shared(),
            vertex_shader: None,
            fragment_shader: None,
            textures: Vec::new(),
        };
    }

    pub fn set_vertex_buffer(&mut self, vertices: Vec<Vector3<f32>>) {
        self.vertices = vertices;
    }

    /// Triangle list, three indices per triangle.
    pub fn set_index_buffer(&mut self, indices: Vec<u32>) {
        self.indices = indices;
    }

    /// Adds an attribute buffer and returns the physical slot it landed in.
    pub fn append_attribute_buffer(&mut self, attribute: impl Into<Attribute>) -> usize {
        self.attributes.push(attribute.into());
        return self.attributes.len() - 1;
    }

    /// Shares the uniform block with the caller, who keeps updating it between draws.
    pub fn set_ubo(&mut self, uniforms: SharedUniforms) {
        self.uniforms = uniforms;
    }

    pub fn set_vs(&mut self, shader: Arc<dyn VertexShader>) {
        self.vertex_shader = Some(shader);
    }

    pub fn set_fs(&mut self, shader: Arc<dyn FragmentShader>) {
        self.fragment_shader = Some(shader);
    }

    pub fn add_texture(&mut self, texture: Arc<dyn Texture>) {
        self.textures.push(texture);
    }

    /// Id written into the barycentric channel.
    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn set_cull_mode(&mut self, cull_mode: CullMode) {
        self.cull_mode = cull_mode;
    }

    pub fn id(&self) -> u32 {
        return self.id;
    }

    pub fn cull_mode(&self) -> CullMode {
        return self.cull_mode;
    }

    pub fn vertices(&self) -> &[Vector3<f32>] {
        return &self.vertices;
    }

    pub fn indices(&self) -> &[u32] {
        return &self.indices;
    }

    pub fn attributes(&self) -> &[Attribute] {
        return &self.attributes;
    }

    pub fn ubo(&self) -> &SharedUniforms {
        return &self.uniforms;
    }

    pub fn vertex_shader(&self) -> Option<&Arc<dyn VertexShader>> {
        return self.vertex_shader.as_ref();
    }

    pub fn fragment_shader(&self) -> Option<&Arc<dyn FragmentShader>> {
        return self.fragment_shader.as_ref();
    }

    pub fn textures(&self) -> &[Arc<dyn Texture>] {
        return &self.textures;
    }

    pub fn triangle_count(&self) -> usize {
        return self.indices.len() / 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::vector;

    #[test]
    fn attribute_slots_follow_append_order() {
        let mut primitive = Primitive::new(CullMode::CullBack);
        primitive.set_index_buffer(vec![0, 1, 2, 2, 1, 3]);
        let uv_slot = primitive.append_attribute_buffer(AttributeBuffer::<2>::new(vec![vector![0.0, 0.0]], vec![0; 6]));
        let normal_slot =
            primitive.append_attribute_buffer(AttributeBuffer::<3>::new(vec![vector![0.0, 0.0, 1.0]], vec![0; 6]));
        assert_eq!((uv_slot, normal_slot), (0, 1));
        assert_eq!(primitive.attributes()[normal_slot].components(), 3);
        assert_eq!(primitive.triangle_count(), 2);
        assert_eq!(primitive.cull_mode(), CullMode::CullBack);
    }

    #[test]
    fn shaders_start_unbound() {
        let primitive = Primitive::new(CullMode::default());
        assert!(primitive.vertex_shader().is_none());
        assert!(primitive.fragment_shader().is_none());
        assert!(primitive.textures().is_empty());
        assert_eq!(*primitive.ubo().read().unwrap(), Uniforms::identity());
    }
}
