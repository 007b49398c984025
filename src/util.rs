use nalgebra as na;
use na::{vector, Matrix3, Matrix4, Point3, Vector3, Vector4};

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 1.0];
}

/// Matrix which brings normals along with the upper 3x3 part of `transform`.
/// Falls back to identity for singular transforms, normals are meaningless there anyway.
pub fn normal_matrix(transform: &Matrix4<f32>) -> Matrix3<f32> {
    let linear = Matrix3::from_fn(|row, column| transform[(row, column)]);
    return match linear.try_inverse() {
        Some(inverse) => inverse.transpose(),
        None => Matrix3::identity(),
    };
}

/// Normalizes a vector, leaving zero vectors alone instead of producing NaNs.
pub fn safe_normalize(v: Vector3<f32>) -> Vector3<f32> {
    let norm = v.norm();
    if norm <= f32::EPSILON {
        return v;
    }
    return v / norm;
}

/// View transform for a camera placed at `look_from`, looking at `look_at`.
pub fn look_at(look_from: Vector3<f32>, look_at: Vector3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    return Matrix4::look_at_rh(&Point3::from(look_from), &Point3::from(look_at), &up);
}

/// OpenGL-style perspective projection, NDC depth in [-1, 1] with -1 at the near plane.
pub fn perspective(aspect: f32, fov_y: f32, z_near: f32, z_far: f32) -> Matrix4<f32> {
    return na::Perspective3::new(aspect, fov_y, z_near, z_far).to_homogeneous();
}
