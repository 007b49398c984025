//! Reference shader pair producing every analysis channel at once: textured final color,
//! UV, vertex color, world and view space normals and positions.

use std::sync::Arc;

use nalgebra as na;
use na::{Vector2, Vector3, Vector4};

use super::{
    FragmentShader, InputMapping, OutputMapping, ShaderInputType, ShaderOutputChannel, VertexShader,
};
use crate::primitive::{AttributeValue, Uniforms};
use crate::texture::{SampleMode, Texture};
use crate::util::{safe_normalize, to_hom_point};

// Positions of the vertex outputs, shared by both halves of the pair.
const OUT_UV: usize = 0;
const OUT_COLOR: usize = 1;
const OUT_WORLD_NORMAL: usize = 2;
const OUT_VIEW_NORMAL: usize = 3;
const OUT_WORLD_POSITION: usize = 4;
const OUT_VIEW_POSITION: usize = 5;
const OUT_COUNT: usize = 6;

/// Forwards every attribute the analysis channels need.
#[derive(Debug, Clone, Default)]
pub struct AnalysisVertexShader {
    inputs: InputMapping,
}

impl AnalysisVertexShader {
    pub fn new(inputs: InputMapping) -> Self {
        return Self { inputs };
    }

    fn input(&self, inputs: &[AttributeValue], label: ShaderInputType) -> Option<AttributeValue> {
        return self.inputs.get(label).map(|slot| inputs[slot]);
    }
}

impl VertexShader for AnalysisVertexShader {
    fn do_shading(
        &self,
        position: Vector3<f32>,
        uniforms: &Uniforms,
        inputs: &[AttributeValue],
        outputs: &mut Vec<AttributeValue>,
    ) -> Vector4<f32> {
        let object_position = to_hom_point(position);
        let world_position = uniforms.model() * object_position;
        let view_position = uniforms.model_view() * object_position;

        let uv = match self.input(inputs, ShaderInputType::Uv2) {
            Some(value) => value.xy(),
            None => Vector2::zeros(),
        };
        // Four component colors win over three component ones, missing colors are white.
        let color = match (
            self.input(inputs, ShaderInputType::VertexColor4),
            self.input(inputs, ShaderInputType::VertexColor3),
        ) {
            (Some(rgba), _) => rgba.to_vec4(),
            (None, Some(rgb)) => rgb.xyz().push(1.0),
            (None, None) => Vector4::repeat(1.0),
        };
        let normal = match self.input(inputs, ShaderInputType::VertexNormal3) {
            Some(value) => value.xyz(),
            None => Vector3::zeros(),
        };

        outputs.push(AttributeValue::Vec2(uv));
        outputs.push(AttributeValue::Vec4(color));
        outputs.push(AttributeValue::Vec3(uniforms.world_normal_matrix() * normal));
        outputs.push(AttributeValue::Vec3(uniforms.view_normal_matrix() * normal));
        outputs.push(AttributeValue::Vec3(world_position.xyz()));
        outputs.push(AttributeValue::Vec3(view_position.xyz()));

        return uniforms.model_view_projection() * object_position;
    }

    fn input_mapping(&self, input: ShaderInputType) -> Option<usize> {
        return self.inputs.get(input);
    }

    fn num_outputs(&self) -> usize {
        return OUT_COUNT;
    }
}

/// Writes textured color plus the raw interpolated analysis values.
#[derive(Debug, Clone)]
pub struct AnalysisFragmentShader {
    outputs: OutputMapping,
    sample_mode: SampleMode,
}

impl Default for AnalysisFragmentShader {
    /// Every channel, slot equal to the channel ordinal.
    fn default() -> Self {
        let mut outputs = OutputMapping::new();
        for (slot, channel) in ShaderOutputChannel::ALL.iter().enumerate() {
            outputs.bind(*channel, slot);
        }
        return Self::new(outputs, SampleMode::Nearest);
    }
}

impl AnalysisFragmentShader {
    /// Final color is always produced, so it gets bound if the mapping left it out.
    pub fn new(mut outputs: OutputMapping, sample_mode: SampleMode) -> Self {
        if outputs.get(ShaderOutputChannel::FinalColor).is_none() {
            outputs.bind(ShaderOutputChannel::FinalColor, outputs.slot_count());
        }
        return Self { outputs, sample_mode };
    }
}

impl FragmentShader for AnalysisFragmentShader {
    fn do_shading(
        &self,
        outputs: &mut [Vector4<f32>],
        vertex_shader: &dyn VertexShader,
        _uniforms: &Uniforms,
        interpolated: &[AttributeValue],
        textures: &[Arc<dyn Texture>],
    ) {
        debug_assert_eq!(interpolated.len(), OUT_COUNT);
        let uv = interpolated[OUT_UV].xy();
        let color = interpolated[OUT_COLOR].to_vec4();

        // Without UVs there is nothing meaningful to sample with.
        let has_uv = vertex_shader.input_mapping(ShaderInputType::Uv2).is_some();
        let final_color = match textures.first() {
            Some(texture) if has_uv => texture.sample(uv, self.sample_mode).component_mul(&color),
            _ => color,
        };

        for channel in ShaderOutputChannel::ALL {
            let Some(slot) = self.outputs.get(channel) else {
                continue;
            };
            let value = match channel {
                ShaderOutputChannel::FinalColor => final_color,
                ShaderOutputChannel::Uv => Vector4::new(uv.x, uv.y, 0.0, 1.0),
                ShaderOutputChannel::VertexColor => color,
                ShaderOutputChannel::WorldSpaceNormal => {
                    safe_normalize(interpolated[OUT_WORLD_NORMAL].xyz()).push(0.0)
                }
                ShaderOutputChannel::ViewSpaceNormal => {
                    safe_normalize(interpolated[OUT_VIEW_NORMAL].xyz()).push(0.0)
                }
                ShaderOutputChannel::WorldPosition => interpolated[OUT_WORLD_POSITION].xyz().push(1.0),
                ShaderOutputChannel::ViewPosition => interpolated[OUT_VIEW_POSITION].xyz().push(1.0),
                // Owned by the rasterizer.
                ShaderOutputChannel::Barycentric => continue,
            };
            outputs[slot] = value;
        }
    }

    fn output_mapping(&self, channel: ShaderOutputChannel) -> Option<usize> {
        return self.outputs.get(channel);
    }

    fn num_output_channel(&self) -> usize {
        return self.outputs.slot_count();
    }
}

/// Explicitly constructed default shader pair, consuming the given attribute slots and
/// producing every analysis channel.
pub fn default_shaders(inputs: InputMapping) -> (Arc<AnalysisVertexShader>, Arc<AnalysisFragmentShader>) {
    return (
        Arc::new(AnalysisVertexShader::new(inputs)),
        Arc::new(AnalysisFragmentShader::default()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgba, RgbaImage};
    use nalgebra::{vector, Matrix4};

    fn shade_vertex(shader: &AnalysisVertexShader, uniforms: &Uniforms, inputs: &[AttributeValue]) -> Vec<AttributeValue> {
        let mut outputs = Vec::new();
        shader.do_shading(vector![1.0, 2.0, 3.0], uniforms, inputs, &mut outputs);
        return outputs;
    }

    #[test]
    fn vertex_outputs_follow_fixed_order() {
        let inputs = InputMapping::new()
            .with(ShaderInputType::VertexNormal3, 0)
            .with(ShaderInputType::Uv2, 1);
        let shader = AnalysisVertexShader::new(inputs);
        let model = Matrix4::new_translation(&vector![0.0, 0.0, -1.0]);
        let uniforms = Uniforms::new(model, Matrix4::identity(), Matrix4::identity());
        let outputs = shade_vertex(
            &shader,
            &uniforms,
            &[AttributeValue::Vec3(vector![0.0, 1.0, 0.0]), AttributeValue::Vec2(vector![0.25, 0.75])],
        );

        assert_eq!(outputs.len(), shader.num_outputs());
        assert_eq!(outputs[OUT_UV], AttributeValue::Vec2(vector![0.25, 0.75]));
        assert_eq!(outputs[OUT_COLOR], AttributeValue::Vec4(Vector4::repeat(1.0)));
        assert_eq!(outputs[OUT_WORLD_NORMAL], AttributeValue::Vec3(vector![0.0, 1.0, 0.0]));
        assert_eq!(outputs[OUT_WORLD_POSITION], AttributeValue::Vec3(vector![1.0, 2.0, 2.0]));
    }

    #[test]
    fn rgb_color_gets_opaque_alpha() {
        let shader = AnalysisVertexShader::new(InputMapping::new().with(ShaderInputType::VertexColor3, 0));
        let outputs = shade_vertex(&shader, &Uniforms::identity(), &[AttributeValue::Vec3(vector![0.5, 0.25, 0.0])]);
        assert_eq!(outputs[OUT_COLOR], AttributeValue::Vec4(vector![0.5, 0.25, 0.0, 1.0]));
    }

    #[test]
    fn fragment_modulates_texture_by_color() {
        let (vertex_shader, fragment_shader) =
            default_shaders(InputMapping::new().with(ShaderInputType::Uv2, 0));
        let texture: Arc<dyn Texture> = Arc::new(RgbaImage::from_pixel(1, 1, Rgba([255, 255, 0, 255])));
        let interpolated = [
            AttributeValue::Vec2(vector![0.5, 0.5]),
            AttributeValue::Vec4(vector![0.5, 1.0, 1.0, 1.0]),
            AttributeValue::Vec3(vector![0.0, 0.0, 2.0]),
            AttributeValue::Vec3(vector![0.0, 3.0, 0.0]),
            AttributeValue::Vec3(vector![1.0, 2.0, 3.0]),
            AttributeValue::Vec3(vector![4.0, 5.0, 6.0]),
        ];
        let mut outputs = vec![Vector4::zeros(); fragment_shader.num_output_channel()];
        fragment_shader.do_shading(
            &mut outputs,
            vertex_shader.as_ref(),
            &Uniforms::identity(),
            &interpolated,
            &[texture],
        );

        let slot = |channel| fragment_shader.output_mapping(channel).unwrap();
        assert_relative_eq!(outputs[slot(ShaderOutputChannel::FinalColor)], vector![0.5, 1.0, 0.0, 1.0]);
        assert_eq!(outputs[slot(ShaderOutputChannel::WorldSpaceNormal)], vector![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(outputs[slot(ShaderOutputChannel::ViewSpaceNormal)], vector![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(outputs[slot(ShaderOutputChannel::ViewPosition)], vector![4.0, 5.0, 6.0, 1.0]);
        assert_eq!(outputs[slot(ShaderOutputChannel::Barycentric)], Vector4::zeros());
    }

    #[test]
    fn final_color_is_always_mapped() {
        let shader = AnalysisFragmentShader::new(
            OutputMapping::new().with(ShaderOutputChannel::ViewSpaceNormal, 0),
            SampleMode::Bilinear,
        );
        assert_eq!(shader.output_mapping(ShaderOutputChannel::FinalColor), Some(1));
        assert_eq!(shader.num_output_channel(), 2);
    }
}
