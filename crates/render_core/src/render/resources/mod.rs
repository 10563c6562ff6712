//! Handle-based storages of GPU resources
//!
//! Every storage wraps a [`SlotArray`](crate::foundation::SlotArray) and
//! validates handles on each access: a stale or out-of-range handle panics.

pub mod instances;
pub mod materials;
pub mod meshes;
pub mod shaders;
pub mod textures;

pub use instances::{InstanceBufferHandle, RenderInstanceManager};
pub use materials::{MaterialCreateInfo, MaterialHandle, MaterialStorage};
pub use meshes::{GpuMesh, MeshHandle, MeshStorage};
pub use shaders::{ShaderHandle, ShaderStorage};
pub use textures::{TextureFormatHint, TextureHandle, TextureStorage};
