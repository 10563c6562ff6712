//! # Rendering core
//!
//! Resource lifetime and draw submission on top of a Vulkan device.
//!
//! ## Architecture
//!
//! - **GraphicsModule**: owns every storage and runs the frame loop
//! - **Storages**: meshes, shaders, textures, materials and instance buffers,
//!   all addressed through generation-checked handles
//! - **Pipelines**: one template specialized into cached variants keyed by
//!   the material's sampler inclusion
//! - **RenderSubmission**: per-frame draw list, sorted and batched on record
//! - **Vulkan backend**: the [`GraphicsDevice`](backends::vulkan::GraphicsDevice)
//!   seam plus descriptor pools and write batching

/// Graphics backend implementations
pub mod backends;

pub mod frame;
pub mod graphics_module;
pub mod mesh;
pub mod pipelines;
pub mod resources;
pub mod shader_data;
pub mod submission;
pub mod vertex_layout;

pub use graphics_module::{GraphicsModule, PipelineShaderCode, SamplerType};
pub use mesh::Vertex;
pub use pipelines::{PipelineKind, PipelineVariantKey, SamplerInclusion};
pub use resources::{
    InstanceBufferHandle, MaterialCreateInfo, MaterialHandle, MeshHandle, ShaderHandle,
    TextureFormatHint, TextureHandle,
};
pub use shader_data::{GpuMaterialProperties, GpuSceneData, InstanceData};
pub use submission::{InstancedRenderObject, RecordStats, RenderObject, RenderSubmission};
