use std::sync::{Arc, RwLock};

use nalgebra as na;
use na::{Matrix3, Matrix4};

use crate::util::normal_matrix;

/// Uniform block shared by every vertex and fragment invocation of a draw.
///
/// Holds model (M), model-view (MV) and model-view-projection (MVP) transforms along with
/// the normal matrices derived from M and MV, which are kept in sync by the setters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniforms {
    model: Matrix4<f32>,
    model_view: Matrix4<f32>,
    model_view_projection: Matrix4<f32>,
    world_normal: Matrix3<f32>,
    view_normal: Matrix3<f32>,
}

/// Handle the primitive and the camera code both keep to the same uniform block.
pub type SharedUniforms = Arc<RwLock<Uniforms>>;

impl Default for Uniforms {
    fn default() -> Self {
        return Self::identity();
    }
}

impl Uniforms {
    pub fn identity() -> Self {
        return Self::new(Matrix4::identity(), Matrix4::identity(), Matrix4::identity());
    }

    /// Builds the block from separate model, view and projection transforms.
    pub fn new(model: Matrix4<f32>, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        let model_view = view * model;
        return Self {
            model,
            model_view,
            model_view_projection: projection * model_view,
            world_normal: normal_matrix(&model),
            view_normal: normal_matrix(&model_view),
        };
    }

    /// Wraps the block for sharing between a primitive and whoever drives the camera.
    pub fn shared(self) -> SharedUniforms {
        return Arc::new(RwLock::new(self));
    }

    /// Camera update, keeps the model transform.
    pub fn set_camera(&mut self, view: Matrix4<f32>, projection: Matrix4<f32>) {
        *self = Self::new(self.model, view, projection);
    }

    /// Sets all three transforms directly, for callers that already composed MV and MVP.
    pub fn set_matrices(
        &mut self,
        model: Matrix4<f32>,
        model_view: Matrix4<f32>,
        model_view_projection: Matrix4<f32>,
    ) {
        self.model = model;
        self.model_view = model_view;
        self.model_view_projection = model_view_projection;
        self.world_normal = normal_matrix(&model);
        self.view_normal = normal_matrix(&model_view);
    }

    pub fn model(&self) -> &Matrix4<f32> {
        return &self.model;
    }

    pub fn model_view(&self) -> &Matrix4<f32> {
        return &self.model_view;
    }

    pub fn model_view_projection(&self) -> &Matrix4<f32> {
        return &self.model_view_projection;
    }

    /// Takes object-space normals to world space.
    pub fn world_normal_matrix(&self) -> &Matrix3<f32> {
        return &self.world_normal;
    }

    /// Takes object-space normals to view space.
    pub fn view_normal_matrix(&self) -> &Matrix3<f32> {
        return &self.view_normal;
    }
}
