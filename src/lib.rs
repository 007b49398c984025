//! Software triangle rasterizer producing a final color image plus geometry analysis
//! channels (UV, vertex color, normals, positions and triangle ids).

pub mod frame;
pub mod mesh;
pub mod primitive;
pub mod rasterizer;
pub mod shader;
pub mod texture;
pub mod util;

pub use frame::{DepthBuffer, FrameBuffer};
pub use primitive::{Attribute, AttributeBuffer, AttributeValue, CullMode, Primitive, SharedUniforms, Uniforms};
pub use rasterizer::{DrawStats, Rasterizer, RasterizerConfig, Viewport, Winding};
pub use shader::analysis::default_shaders;
pub use shader::{
    FragmentShader, InputMapping, OutputMapping, ShaderInputType, ShaderOutputChannel, VertexShader,
};
pub use texture::{SampleMode, Texture};
