//! Plain-old-data structures copied verbatim into GPU memory
//!
//! Every struct here follows std140/std430 alignment: matrices are stored as
//! four column arrays and `vec3` members are padded to 16 bytes.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{mat4_to_cols, vec3_padded, Mat4, Vec3};

/// Per-frame camera and lighting data bound at set 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSceneData {
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to world
    pub inverse_view: [[f32; 4]; 4],
    /// View to clip
    pub projection: [[f32; 4]; 4],
    /// `projection * view`
    pub view_projection: [[f32; 4]; 4],
    /// Ambient light color (xyz)
    pub ambient_color: [f32; 4],
    /// Direction the main light travels (xyz)
    pub main_light_direction: [f32; 4],
    /// Main light color (xyz)
    pub main_light_color: [f32; 4],
}

impl GpuSceneData {
    /// Build scene data from camera matrices and the main light
    ///
    /// A singular view matrix leaves `inverse_view` as identity.
    pub fn new(
        view: &Mat4,
        projection: &Mat4,
        ambient_color: &Vec3,
        main_light_direction: &Vec3,
        main_light_color: &Vec3,
    ) -> Self {
        let inverse_view = view.try_inverse().unwrap_or_else(Mat4::identity);
        Self {
            view: mat4_to_cols(view),
            inverse_view: mat4_to_cols(&inverse_view),
            projection: mat4_to_cols(projection),
            view_projection: mat4_to_cols(&(projection * view)),
            ambient_color: vec3_padded(ambient_color, 0.0),
            main_light_direction: vec3_padded(main_light_direction, 0.0),
            main_light_color: vec3_padded(main_light_color, 0.0),
        }
    }
}

impl Default for GpuSceneData {
    fn default() -> Self {
        let identity = Mat4::identity();
        Self::new(
            &identity,
            &identity,
            &Vec3::new(0.1, 0.1, 0.1),
            &Vec3::new(0.0, -1.0, 0.0),
            &Vec3::new(1.0, 1.0, 1.0),
        )
    }
}

/// Per-draw push constant block of the regular pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPushConstants {
    /// Object to world
    pub model: [[f32; 4]; 4],
}

impl GpuPushConstants {
    /// Push constants for one object transform
    pub fn from_transform(transform: &Mat4) -> Self {
        Self {
            model: mat4_to_cols(transform),
        }
    }
}

/// Material uniform block bound at set 1, binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterialProperties {
    /// Specular color (xyz)
    pub specular: [f32; 4],
    /// Diffuse color (xyz)
    pub diffuse: [f32; 4],
    /// Ambient color (xyz)
    pub ambient: [f32; 4],
    /// Emitted color
    pub emission: [f32; 3],
    /// Specular exponent, packed into the emission slot's padding
    pub shininess: f32,
}

impl GpuMaterialProperties {
    /// Build from colors
    pub fn new(
        specular: &Vec3,
        diffuse: &Vec3,
        ambient: &Vec3,
        emission: &Vec3,
        shininess: f32,
    ) -> Self {
        Self {
            specular: vec3_padded(specular, 0.0),
            diffuse: vec3_padded(diffuse, 0.0),
            ambient: vec3_padded(ambient, 0.0),
            emission: [emission.x, emission.y, emission.z],
            shininess,
        }
    }
}

impl Default for GpuMaterialProperties {
    fn default() -> Self {
        let white = Vec3::new(1.0, 1.0, 1.0);
        Self::new(&white, &white, &white, &Vec3::zeros(), 32.0)
    }
}

/// One entry of an instance storage buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Instance to world
    pub transform: [[f32; 4]; 4],
}

impl InstanceData {
    /// Instance data for one transform
    pub fn from_transform(transform: &Mat4) -> Self {
        Self {
            transform: mat4_to_cols(transform),
        }
    }
}
