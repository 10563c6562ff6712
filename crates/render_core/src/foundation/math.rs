//! Math type aliases used by the renderer

use nalgebra::{Matrix4, Vector3, Vector4};

/// 4x4 column-major matrix
pub type Mat4 = Matrix4<f32>;
/// 3-component vector
pub type Vec3 = Vector3<f32>;
/// 4-component vector
pub type Vec4 = Vector4<f32>;

/// Convert a matrix into the column-major array layout shaders expect
pub fn mat4_to_cols(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

/// Pad a vector to a std140 `vec3` slot (16 bytes)
pub fn vec3_padded(vector: &Vec3, w: f32) -> [f32; 4] {
    [vector.x, vector.y, vector.z, w]
}
