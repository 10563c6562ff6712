//! # Render Core
//!
//! Resource management and draw submission core of a Vulkan renderer.
//!
//! ## Features
//!
//! - **Handle-based storages**: stale handles are caught on every access
//! - **Descriptor management**: growable pool allocator and batched writes
//! - **Pipeline variants**: specialization-constant variants built on demand
//! - **Batched submission**: draws grouped by pipeline, material and mesh
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_core::prelude::*;
//!
//! fn frame<D: GraphicsDevice, S: SwapchainTarget>(
//!     graphics: &mut GraphicsModule<D, S>,
//!     vertices: &[Vertex],
//! ) -> VulkanResult<bool> {
//!     let mesh = graphics.load_mesh(vertices, &[])?;
//!     let material = graphics.load_material(&MaterialCreateInfo::default(), SamplerType::Linear)?;
//!
//!     let mut submission = RenderSubmission::new();
//!     submission.submit(&[RenderObject {
//!         transform: Mat4::identity(),
//!         material,
//!         mesh,
//!     }]);
//!     Ok(graphics.draw_frame(&mut submission, &GpuSceneData::default()))
//! }
//! ```

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, RendererConfig},
        foundation::{
            math::{Mat4, Vec3, Vec4},
            Handle, SlotArray,
        },
        render::{
            backends::vulkan::{
                AshDevice, GraphicsDevice, SwapchainTarget, VulkanError, VulkanResult,
            },
            GpuMaterialProperties, GpuSceneData, GraphicsModule, InstanceData,
            InstancedRenderObject, MaterialCreateInfo, MaterialHandle, MeshHandle,
            PipelineShaderCode, RenderObject, RenderSubmission, SamplerType, TextureFormatHint,
            TextureHandle, Vertex,
        },
    };
}
